use std::collections::HashMap;

use async_trait::async_trait;
use thiserror::Error;

/// Ошибки хранилищ онбординга
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("store rejected write: {0}")]
    Rejected(String),

    #[error("store data corrupt: {0}")]
    Corrupt(String),
}

impl From<sea_orm::DbErr> for StoreError {
    fn from(e: sea_orm::DbErr) -> Self {
        StoreError::Unavailable(e.to_string())
    }
}

impl From<reqwest::Error> for StoreError {
    fn from(e: reqwest::Error) -> Self {
        StoreError::Unavailable(e.to_string())
    }
}

/// Authoritative attribute store for the signed-in user
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait IdentityStore: Send + Sync {
    async fn fetch_attributes(&self) -> Result<HashMap<String, String>, StoreError>;

    /// Upsert the given attributes, leaving others untouched
    async fn update_attributes(&self, attributes: HashMap<String, String>)
        -> Result<(), StoreError>;
}

/// Cookie-like store. Reads and writes are synchronous; a value that cannot
/// be read is simply absent.
pub trait EdgeCache: Send {
    fn get(&self, name: &str) -> Option<String>;

    fn set(&mut self, name: &str, value: &str, max_age_secs: i64);
}

/// HTTP endpoints used when a direct identity write fails
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AttributeFallback: Send + Sync {
    /// `POST /api/user/update-attributes`
    async fn update_attributes(
        &self,
        attributes: HashMap<String, String>,
        force_update: bool,
    ) -> Result<(), StoreError>;

    /// `POST /api/onboarding/complete`
    async fn complete_onboarding(&self) -> Result<(), StoreError>;
}
