use std::future::Future;

use anyhow::Result;
use chrono::Utc;
use contracts::system::auth::{SignUpRequest, SignUpResponse};
use contracts::system::users::{CreateUserDto, User};

use super::repository;
use crate::shared::data::db::get_connection;
use crate::system::auth::error::SignInError;
use crate::system::auth::password;
use crate::system::onboarding::attributes::initial_attributes;
use crate::system::onboarding::identity_store::SqliteIdentityStore;
use crate::system::onboarding::IdentityStore;

/// Create a new user
pub async fn create(dto: CreateUserDto, created_by: Option<String>) -> Result<String> {
    if dto.username.trim().is_empty() {
        return Err(anyhow::anyhow!("Username cannot be empty"));
    }

    if repository::get_by_username(&dto.username).await?.is_some() {
        return Err(anyhow::anyhow!("Username already exists"));
    }

    if let Some(ref email) = dto.email {
        if !email.trim().is_empty() && !email.contains('@') {
            return Err(anyhow::anyhow!("Invalid email format"));
        }
    }

    password::validate_password_strength(&dto.password)?;
    let password_hash = password::hash_password(&dto.password)?;

    let user_id = uuid::Uuid::new_v4().to_string();
    let now = Utc::now().to_rfc3339();

    let user = User {
        id: user_id.clone(),
        username: dto.username,
        email: dto.email,
        full_name: dto.full_name,
        is_active: true,
        is_admin: dto.is_admin,
        is_confirmed: dto.is_confirmed,
        created_at: now.clone(),
        updated_at: now,
        last_login_at: None,
        created_by,
    };

    repository::create_with_password(&user, &password_hash).await?;

    Ok(user_id)
}

/// Self-service registration: unconfirmed account with a fresh onboarding record
pub async fn sign_up(request: SignUpRequest) -> Result<SignUpResponse> {
    let id = create(
        CreateUserDto {
            username: request.username,
            password: request.password,
            email: request.email,
            full_name: request.full_name,
            is_admin: false,
            is_confirmed: false,
        },
        None,
    )
    .await?;

    SqliteIdentityStore::for_user(get_connection().clone(), id.clone())
        .update_attributes(initial_attributes())
        .await?;

    tracing::info!("New account registered: {}", id);
    Ok(SignUpResponse {
        id,
        is_confirmed: false,
    })
}

/// Get user by ID
pub async fn get_by_id(id: &str) -> Result<Option<User>> {
    repository::get_by_id(id).await
}

/// Check username and password. Does not confirm accounts.
pub async fn verify_credentials(username: &str, password: &str) -> Result<User, SignInError> {
    let user = repository::get_by_username(username)
        .await?
        .ok_or(SignInError::InvalidCredentials)?;

    if !user.is_active {
        return Err(SignInError::Inactive);
    }

    let password_hash = repository::get_password_hash(&user.id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("Password hash not found"))?;

    if !password::verify_password(password, &password_hash)? {
        return Err(SignInError::InvalidCredentials);
    }

    if !user.is_confirmed {
        return Err(SignInError::NotConfirmed { user_id: user.id });
    }

    if let Err(e) = repository::update_last_login(&user.id).await {
        tracing::warn!("Failed to update last login for {}: {}", user.id, e);
    }

    Ok(user)
}

/// Run `check`; if it reports an unconfirmed account, confirm it and run
/// `check` exactly once more.
pub async fn confirm_and_retry<T, Check, CheckFut, Confirm, ConfirmFut>(
    mut check: Check,
    confirm: Confirm,
) -> Result<T, SignInError>
where
    Check: FnMut() -> CheckFut,
    CheckFut: Future<Output = Result<T, SignInError>>,
    Confirm: FnOnce(String) -> ConfirmFut,
    ConfirmFut: Future<Output = Result<()>>,
{
    match check().await {
        Err(SignInError::NotConfirmed { user_id }) => {
            tracing::info!("Confirming account {} on sign-in", user_id);
            confirm(user_id).await?;
            check().await
        }
        other => other,
    }
}

/// Credential check used by login
pub async fn sign_in(username: &str, password: &str) -> Result<User, SignInError> {
    confirm_and_retry(
        || verify_credentials(username, password),
        |user_id| async move { repository::confirm(&user_id).await },
    )
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn test_unconfirmed_account_is_confirmed_and_retried_once() {
        let check_count = AtomicU32::new(0);
        let confirm_count = AtomicU32::new(0);
        let checks = &check_count;
        let confirmed = &confirm_count;

        let result = confirm_and_retry(
            move || async move {
                if checks.fetch_add(1, Ordering::SeqCst) == 0 {
                    Err(SignInError::NotConfirmed {
                        user_id: "u-1".to_string(),
                    })
                } else {
                    Ok("signed-in")
                }
            },
            move |user_id| async move {
                assert_eq!(user_id, "u-1");
                confirmed.fetch_add(1, Ordering::SeqCst);
                Ok(())
            },
        )
        .await;

        assert_eq!(result.unwrap(), "signed-in");
        assert_eq!(check_count.load(Ordering::SeqCst), 2);
        assert_eq!(confirm_count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_invalid_credentials_skip_confirmation() {
        let confirm_count = AtomicU32::new(0);
        let confirmed = &confirm_count;

        let result: Result<(), SignInError> = confirm_and_retry(
            || async { Err(SignInError::InvalidCredentials) },
            move |_| async move {
                confirmed.fetch_add(1, Ordering::SeqCst);
                Ok(())
            },
        )
        .await;

        assert!(matches!(result, Err(SignInError::InvalidCredentials)));
        assert_eq!(confirm_count.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_failed_confirmation_is_internal_error() {
        let result: Result<(), SignInError> = confirm_and_retry(
            || async {
                Err(SignInError::NotConfirmed {
                    user_id: "u-1".to_string(),
                })
            },
            |_| async { Err(anyhow::anyhow!("db locked")) },
        )
        .await;

        assert!(matches!(result, Err(SignInError::Internal(_))));
    }
}
