use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use sea_orm::{
    ConnectionTrait, DatabaseBackend, DatabaseConnection, Statement, TransactionTrait,
};

use super::ports::{IdentityStore, StoreError};

/// User attributes kept in `sys_user_attributes`, one row per attribute
#[derive(Clone)]
pub struct SqliteIdentityStore {
    conn: DatabaseConnection,
    user_id: String,
}

impl SqliteIdentityStore {
    pub fn for_user(conn: DatabaseConnection, user_id: impl Into<String>) -> Self {
        Self {
            conn,
            user_id: user_id.into(),
        }
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }
}

#[async_trait]
impl IdentityStore for SqliteIdentityStore {
    async fn fetch_attributes(&self) -> Result<HashMap<String, String>, StoreError> {
        let rows = self
            .conn
            .query_all(Statement::from_sql_and_values(
                DatabaseBackend::Sqlite,
                "SELECT name, value FROM sys_user_attributes WHERE user_id = ?",
                [self.user_id.clone().into()],
            ))
            .await?;

        let mut attributes = HashMap::with_capacity(rows.len());
        for row in rows {
            let name: String = row
                .try_get("", "name")
                .map_err(|e| StoreError::Corrupt(e.to_string()))?;
            let value: String = row
                .try_get("", "value")
                .map_err(|e| StoreError::Corrupt(e.to_string()))?;
            attributes.insert(name, value);
        }
        Ok(attributes)
    }

    async fn update_attributes(
        &self,
        attributes: HashMap<String, String>,
    ) -> Result<(), StoreError> {
        if attributes.is_empty() {
            return Ok(());
        }

        let now = Utc::now().to_rfc3339();
        let txn = self.conn.begin().await?;
        for (name, value) in attributes {
            txn.execute(Statement::from_sql_and_values(
                DatabaseBackend::Sqlite,
                "INSERT INTO sys_user_attributes (user_id, name, value, updated_at)
                 VALUES (?, ?, ?, ?)
                 ON CONFLICT(user_id, name) DO UPDATE
                 SET value = excluded.value, updated_at = excluded.updated_at",
                [
                    self.user_id.clone().into(),
                    name.into(),
                    value.into(),
                    now.clone().into(),
                ],
            ))
            .await?;
        }
        txn.commit().await?;

        tracing::debug!("Identity attributes updated for user {}", self.user_id);
        Ok(())
    }
}
