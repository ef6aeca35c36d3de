use std::future::Future;
use std::time::Duration;

use axum::{
    extract::Json,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use contracts::system::auth::{
    LoginRequest, LoginResponse, RefreshRequest, RefreshResponse, SignUpRequest,
    SignUpResponse, UserInfo,
};
use contracts::system::users::User;
use sea_orm::{ConnectionTrait, DatabaseBackend, Statement};

use crate::shared::data::db::get_connection;
use crate::shared::logger;
use crate::system::auth::error::SignInError;
use crate::system::auth::extractor::CurrentUser;
use crate::system::auth::jwt;
use crate::system::onboarding::edge_cache::CookieJar;
use crate::system::onboarding::runtime;
use crate::system::onboarding::sign_in::{resolve_after_sign_in, SignedInUser};
use crate::system::users::service as user_service;

fn user_info(user: User) -> UserInfo {
    UserInfo {
        id: user.id,
        username: user.username,
        full_name: user.full_name,
        email: user.email,
        is_admin: user.is_admin,
    }
}

/// Login handler.
///
/// Credential check, token issue and onboarding resolution share one
/// deadline. On timeout nothing is rolled back.
pub async fn login(
    headers: HeaderMap,
    Json(request): Json<LoginRequest>,
) -> Result<Response, SignInError> {
    let deadline = runtime::get().sign_in_timeout;
    with_deadline(deadline, sign_in_flow(&headers, request)).await
}

/// Run `flow` until `deadline`. Work the flow already did is kept when the
/// deadline passes.
async fn with_deadline<T, F>(deadline: Duration, flow: F) -> Result<T, SignInError>
where
    F: Future<Output = Result<T, SignInError>>,
{
    match tokio::time::timeout(deadline, flow).await {
        Ok(result) => result,
        Err(_) => {
            tracing::warn!("Sign-in exceeded {}s", deadline.as_secs());
            Err(SignInError::Timeout)
        }
    }
}

async fn sign_in_flow(headers: &HeaderMap, request: LoginRequest) -> Result<Response, SignInError> {
    let onboarding = runtime::get();
    let user = user_service::sign_in(&request.username, &request.password).await?;

    let access_token = jwt::generate_access_token(&user.id, &user.username, user.is_admin).await?;
    let refresh_token = jwt::generate_refresh_token();
    store_refresh_token(&user.id, &refresh_token).await?;

    let signed_in = SignedInUser {
        id: user.id.clone(),
        username: user.username.clone(),
        email: user.email.clone(),
    };
    let mut ctx = onboarding.context_for(
        &user.id,
        CookieJar::from_headers(headers),
        Some(&access_token),
    );
    let redirect =
        resolve_after_sign_in(&mut ctx, &signed_in, &onboarding.overrides, onboarding.settle).await;
    if redirect.overridden {
        logger::log(
            logger::CATEGORY_ONBOARDING_OVERRIDE,
            &format!(
                "user={} ({}) resolved to complete by override list",
                user.username, user.id
            ),
        );
    }
    let jar = onboarding.finish(&user.id, ctx);

    tracing::info!(
        "User {} signed in, redirect to {}",
        user.username,
        redirect.redirect_path
    );

    let body = LoginResponse {
        access_token,
        refresh_token,
        user: user_info(user),
        onboarding: redirect,
    };
    let mut response = Json(body).into_response();
    jar.apply(response.headers_mut());
    Ok(response)
}

/// Registration handler
pub async fn signup(
    Json(request): Json<SignUpRequest>,
) -> Result<(StatusCode, Json<SignUpResponse>), (StatusCode, String)> {
    user_service::sign_up(request)
        .await
        .map(|response| (StatusCode::CREATED, Json(response)))
        .map_err(|e| {
            tracing::warn!("Sign-up rejected: {}", e);
            (StatusCode::BAD_REQUEST, e.to_string())
        })
}

/// Refresh token handler
pub async fn refresh(
    Json(request): Json<RefreshRequest>,
) -> Result<Json<RefreshResponse>, StatusCode> {
    let user_id = validate_refresh_token(&request.refresh_token)
        .await
        .map_err(|_| StatusCode::UNAUTHORIZED)?;

    let user = user_service::get_by_id(&user_id)
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?
        .ok_or(StatusCode::UNAUTHORIZED)?;

    let access_token = jwt::generate_access_token(&user.id, &user.username, user.is_admin)
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    Ok(Json(RefreshResponse { access_token }))
}

/// Logout handler: revokes the refresh token and drops the session cache
pub async fn logout(Json(request): Json<RefreshRequest>) -> Result<StatusCode, StatusCode> {
    if let Ok(user_id) = validate_refresh_token(&request.refresh_token).await {
        runtime::get().caches.evict(&user_id);
    }

    revoke_refresh_token(&request.refresh_token)
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    Ok(StatusCode::OK)
}

/// Get current user handler (protected by middleware)
pub async fn current_user(CurrentUser(claims): CurrentUser) -> Result<Json<UserInfo>, StatusCode> {
    let user = user_service::get_by_id(&claims.sub)
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?
        .ok_or(StatusCode::NOT_FOUND)?;

    Ok(Json(user_info(user)))
}

// Refresh tokens are stored as SHA-256 hashes

async fn store_refresh_token(user_id: &str, token: &str) -> anyhow::Result<()> {
    let created_at = chrono::Utc::now().to_rfc3339();

    get_connection()
        .execute(Statement::from_sql_and_values(
            DatabaseBackend::Sqlite,
            "INSERT INTO sys_refresh_tokens (id, user_id, token_hash, expires_at, created_at)
             VALUES (?, ?, ?, ?, ?)",
            [
                uuid::Uuid::new_v4().to_string().into(),
                user_id.to_string().into(),
                hash_token(token).into(),
                jwt::calculate_refresh_token_expiration().into(),
                created_at.into(),
            ],
        ))
        .await?;

    Ok(())
}

async fn validate_refresh_token(token: &str) -> anyhow::Result<String> {
    let now = chrono::Utc::now().to_rfc3339();

    let result = get_connection()
        .query_one(Statement::from_sql_and_values(
            DatabaseBackend::Sqlite,
            "SELECT user_id FROM sys_refresh_tokens
             WHERE token_hash = ? AND expires_at > ? AND revoked_at IS NULL",
            [hash_token(token).into(), now.into()],
        ))
        .await?;

    match result {
        Some(row) => Ok(row.try_get("", "user_id")?),
        None => Err(anyhow::anyhow!("Invalid or expired refresh token")),
    }
}

async fn revoke_refresh_token(token: &str) -> anyhow::Result<()> {
    let revoked_at = chrono::Utc::now().to_rfc3339();

    get_connection()
        .execute(Statement::from_sql_and_values(
            DatabaseBackend::Sqlite,
            "UPDATE sys_refresh_tokens SET revoked_at = ? WHERE token_hash = ?",
            [revoked_at.into(), hash_token(token).into()],
        ))
        .await?;

    Ok(())
}

fn hash_token(token: &str) -> String {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    format!("{:x}", hasher.finalize())
}
