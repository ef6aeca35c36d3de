use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use crate::system::{
    auth::middleware::{require_admin, require_auth},
    handlers::{auth, logs, onboarding},
};

/// Конфигурация всех роутов приложения
pub fn configure_routes() -> Router {
    let public = Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/api/system/auth/login", post(auth::login))
        .route("/api/system/auth/signup", post(auth::signup))
        .route("/api/system/auth/refresh", post(auth::refresh))
        .route("/api/system/auth/logout", post(auth::logout));

    let authenticated = Router::new()
        .route("/api/system/auth/me", get(auth::current_user))
        .route("/api/onboarding/status", get(onboarding::status))
        .route("/api/onboarding/step", post(onboarding::complete_step))
        .route("/api/onboarding/complete", post(onboarding::complete))
        .route(
            "/api/user/update-attributes",
            post(onboarding::update_attributes),
        )
        .layer(middleware::from_fn(require_auth));

    let admin = Router::new()
        .route("/api/logs", get(logs::list))
        .layer(middleware::from_fn(require_admin));

    public.merge(authenticated).merge(admin)
}
