//! Application error types.
//!
//! Every failure leaves the API as `{"ok": false, "message": "..."}`.
//! Auth failures carry a generic message; business-rule failures carry
//! a specific, actionable one.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;
use tracing::error;

/// Convenience alias for handler return types.
pub type AppResult<T> = Result<T, AppError>;

/// Application-level errors with HTTP status mapping.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    /// The server is missing required configuration; the message is
    /// user-visible (e.g. the setup route before its secrets are set).
    #[error("{0}")]
    ServerConfig(String),

    /// Unexpected failure. The detail is logged, never sent to clients.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// The generic 401 used for every token/credential failure, so a
    /// caller cannot learn why authentication failed.
    pub fn unauthorized() -> Self {
        AppError::Unauthorized("Unauthorized".into())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AppError::Validation(m) => (StatusCode::BAD_REQUEST, m.clone()),
            AppError::Unauthorized(m) => (StatusCode::UNAUTHORIZED, m.clone()),
            AppError::Forbidden(m) => (StatusCode::FORBIDDEN, m.clone()),
            AppError::NotFound(m) => (StatusCode::NOT_FOUND, m.clone()),
            AppError::Conflict(m) => (StatusCode::CONFLICT, m.clone()),
            AppError::ServerConfig(m) => (StatusCode::INTERNAL_SERVER_ERROR, m.clone()),
            AppError::Internal(detail) => {
                error!(%detail, "internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };
        let body = Json(json!({ "ok": false, "message": message }));
        (status, body).into_response()
    }
}

impl From<sqlx::Error> for AppError {
    fn from(e: sqlx::Error) -> Self {
        AppError::Internal(e.to_string())
    }
}

impl From<gerai_core::auth::AuthError> for AppError {
    fn from(e: gerai_core::auth::AuthError) -> Self {
        use gerai_core::auth::AuthError;
        match e {
            AuthError::CredentialError => AppError::unauthorized(),
            AuthError::TokenError(_) => AppError::unauthorized(),
            AuthError::KeyError(msg) => AppError::Internal(msg),
            AuthError::ValidationError(msg) => AppError::Validation(msg),
            AuthError::AdminExists => {
                AppError::Forbidden("Admin sudah ada. Nggak bisa nambah lagi.".into())
            }
            AuthError::EmailTaken => AppError::Conflict("Email sudah terdaftar".into()),
            AuthError::DbError(e) => AppError::from(e),
            AuthError::Internal(msg) => AppError::Internal(msg),
        }
    }
}

impl From<gerai_core::access::AccessError> for AppError {
    fn from(e: gerai_core::access::AccessError) -> Self {
        use gerai_core::access::AccessError;
        match e {
            AccessError::QuotaRace => AppError::Internal("access code quota race".into()),
            AccessError::DbError(e) => AppError::from(e),
        }
    }
}
