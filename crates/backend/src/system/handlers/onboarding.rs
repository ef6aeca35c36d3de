use axum::{
    extract::Json,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use contracts::system::onboarding::{
    CompleteStepRequest, UpdateAttributesRequest, UpdateAttributesResponse,
};

use crate::shared::data::db::get_connection;
use crate::system::auth::extractor::CurrentUser;
use crate::system::auth::jwt::bearer_token;
use crate::system::onboarding::edge_cache::CookieJar;
use crate::system::onboarding::identity_store::SqliteIdentityStore;
use crate::system::onboarding::reader::read_status;
use crate::system::onboarding::service::{self, OnboardingError};
use crate::system::onboarding::{runtime, StoreError};

fn error_response(e: OnboardingError) -> (StatusCode, String) {
    let status = match &e {
        OnboardingError::InvalidStep(_) | OnboardingError::MissingPlan => StatusCode::BAD_REQUEST,
        OnboardingError::Store(StoreError::Unavailable(_)) => StatusCode::SERVICE_UNAVAILABLE,
        OnboardingError::Store(StoreError::Rejected(_)) => StatusCode::BAD_GATEWAY,
        OnboardingError::Store(StoreError::Corrupt(_)) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    tracing::warn!("Onboarding request failed: {}", e);
    (status, e.to_string())
}

fn with_cookies(body: impl IntoResponse, jar: &CookieJar) -> Response {
    let mut response = body.into_response();
    jar.apply(response.headers_mut());
    response
}

/// GET /api/onboarding/status
pub async fn status(user: CurrentUser, headers: HeaderMap) -> Response {
    let onboarding = runtime::get();
    let mut ctx = onboarding.context_for(
        user.user_id(),
        CookieJar::from_headers(&headers),
        bearer_token(&headers),
    );
    let view = read_status(&mut ctx).await;
    let jar = onboarding.finish(user.user_id(), ctx);
    with_cookies(Json(view), &jar)
}

/// POST /api/onboarding/step
pub async fn complete_step(
    user: CurrentUser,
    headers: HeaderMap,
    Json(request): Json<CompleteStepRequest>,
) -> Result<Response, (StatusCode, String)> {
    let onboarding = runtime::get();
    let mut ctx = onboarding.context_for(
        user.user_id(),
        CookieJar::from_headers(&headers),
        bearer_token(&headers),
    );
    let result = service::complete_step(&mut ctx, &request, onboarding.settle).await;
    // caches are stored even when the identity write failed
    let jar = onboarding.finish(user.user_id(), ctx);
    let completion = result.map_err(error_response)?;
    Ok(with_cookies(Json(completion.event), &jar))
}

/// POST /api/user/update-attributes
pub async fn update_attributes(
    user: CurrentUser,
    Json(request): Json<UpdateAttributesRequest>,
) -> Result<Json<UpdateAttributesResponse>, (StatusCode, String)> {
    let identity = SqliteIdentityStore::for_user(get_connection().clone(), user.user_id());
    let response = service::update_attributes(&identity, request)
        .await
        .map_err(error_response)?;
    if !response.skipped.is_empty() {
        tracing::info!(
            "update-attributes for {} skipped {:?}",
            user.user_id(),
            response.skipped
        );
    }
    Ok(Json(response))
}

/// POST /api/onboarding/complete
pub async fn complete(
    user: CurrentUser,
    headers: HeaderMap,
) -> Result<Response, (StatusCode, String)> {
    let onboarding = runtime::get();
    // No remote fallback here: this endpoint is itself the fallback target
    let mut ctx = onboarding.context_for(user.user_id(), CookieJar::from_headers(&headers), None);
    let result = service::mark_complete(&mut ctx).await;
    let jar = onboarding.finish(user.user_id(), ctx);
    let event = result.map_err(error_response)?;
    Ok(with_cookies(Json(event), &jar))
}
