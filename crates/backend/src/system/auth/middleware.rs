use axum::{body::Body, extract::Request, http::StatusCode, middleware::Next, response::Response};
use contracts::system::auth::TokenClaims;

use super::jwt;

/// Owned copy of the bearer token; the request must not be borrowed across
/// the validation await
fn bearer(req: &Request<Body>) -> Result<String, StatusCode> {
    jwt::bearer_token(req.headers())
        .map(str::to_string)
        .ok_or(StatusCode::UNAUTHORIZED)
}

async fn authenticate(token: String) -> Result<TokenClaims, StatusCode> {
    jwt::validate_token(&token)
        .await
        .map_err(|_| StatusCode::UNAUTHORIZED)
}

/// Middleware that requires valid JWT authentication
pub async fn require_auth(mut req: Request<Body>, next: Next) -> Result<Response, StatusCode> {
    let claims = authenticate(bearer(&req)?).await?;
    // Handlers read the claims through `CurrentUser`
    req.extensions_mut().insert(claims);
    Ok(next.run(req).await)
}

/// Middleware that requires admin privileges
pub async fn require_admin(mut req: Request<Body>, next: Next) -> Result<Response, StatusCode> {
    let claims = authenticate(bearer(&req)?).await?;
    if !claims.is_admin {
        return Err(StatusCode::FORBIDDEN);
    }
    req.extensions_mut().insert(claims);
    Ok(next.run(req).await)
}
