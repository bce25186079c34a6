//! Authentication error types

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AuthError {
    /// Reported identically for unknown identity, missing secret, and
    /// secret mismatch so the error channel cannot enumerate accounts.
    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("Too many failed login attempts. Please try again in {remaining_seconds} seconds.")]
    LockedOut { remaining_seconds: u64 },

    #[error("Session expired")]
    SessionExpired,

    #[error("Invalid token")]
    InvalidToken,

    #[error("Missing session")]
    MissingSession,

    #[error("Insufficient role")]
    InsufficientRole,

    #[error("Account service unavailable")]
    PersistenceUnavailable,

    #[error("Password hashing error: {0}")]
    PasswordHash(String),

    #[error("JWT error: {0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = match &self {
            AuthError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            AuthError::LockedOut { .. } => StatusCode::TOO_MANY_REQUESTS,
            AuthError::SessionExpired => StatusCode::UNAUTHORIZED,
            AuthError::InvalidToken => StatusCode::UNAUTHORIZED,
            AuthError::MissingSession => StatusCode::UNAUTHORIZED,
            AuthError::InsufficientRole => StatusCode::FORBIDDEN,
            AuthError::PersistenceUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            AuthError::PasswordHash(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AuthError::Jwt(_) => StatusCode::UNAUTHORIZED,
        };

        let body = match &self {
            AuthError::LockedOut { remaining_seconds } => axum::Json(json!({
                "error": self.to_string(),
                "retry_after_seconds": remaining_seconds,
            })),
            AuthError::PersistenceUnavailable => axum::Json(json!({
                "error": "Service temporarily unavailable. Please try again later."
            })),
            AuthError::PasswordHash(_) => axum::Json(json!({
                "error": "Internal error"
            })),
            _ => axum::Json(json!({
                "error": self.to_string()
            })),
        };

        (status, body).into_response()
    }
}
