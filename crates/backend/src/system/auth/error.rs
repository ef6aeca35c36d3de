use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use contracts::system::auth::AuthErrorBody;
use thiserror::Error;

/// Ошибки входа, видимые пользователю
#[derive(Debug, Error)]
pub enum SignInError {
    #[error("invalid username or password")]
    InvalidCredentials,

    #[error("account is inactive")]
    Inactive,

    /// Credentials matched an account that was never confirmed
    #[error("account {user_id} is not confirmed")]
    NotConfirmed { user_id: String },

    #[error("sign-in timed out")]
    Timeout,

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl SignInError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidCredentials => StatusCode::UNAUTHORIZED,
            Self::Inactive | Self::NotConfirmed { .. } => StatusCode::FORBIDDEN,
            Self::Timeout => StatusCode::GATEWAY_TIMEOUT,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Timeout)
    }
}

impl IntoResponse for SignInError {
    fn into_response(self) -> Response {
        let message = match &self {
            Self::InvalidCredentials => "Invalid username or password",
            Self::Inactive => "This account is inactive",
            Self::NotConfirmed { .. } => "This account has not been confirmed",
            Self::Timeout => "Sign-in is taking longer than expected, please try again",
            Self::Internal(e) => {
                tracing::error!("Sign-in failed: {:#}", e);
                "Internal server error"
            }
        };
        let body = AuthErrorBody {
            error: message.to_string(),
            retryable: self.is_retryable(),
        };
        (self.status_code(), Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(
            SignInError::InvalidCredentials.status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(SignInError::Inactive.status_code(), StatusCode::FORBIDDEN);
        assert_eq!(SignInError::Timeout.status_code(), StatusCode::GATEWAY_TIMEOUT);
        assert!(SignInError::Timeout.is_retryable());
        assert!(!SignInError::InvalidCredentials.is_retryable());
    }

    #[test]
    fn test_response_status() {
        let response = SignInError::Timeout.into_response();
        assert_eq!(response.status(), StatusCode::GATEWAY_TIMEOUT);
    }
}
