//! Authentication logic.
//!
//! Provides key material resolution, the hybrid token codec, password
//! hashing, session / bearer / refresh token management, the bootstrap
//! setup token, and the database queries behind them.

pub mod access_token;
pub mod crypto;
pub mod hybrid;
pub mod keys;
pub mod password;
pub mod queries;
pub mod refresh;
pub mod session;
pub mod setup;

use thiserror::Error;

/// Authentication errors.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Invalid credentials")]
    CredentialError,

    #[error("Token error: {0}")]
    TokenError(String),

    #[error("Key error: {0}")]
    KeyError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("An admin account already exists")]
    AdminExists,

    #[error("Email is already registered")]
    EmailTaken,

    #[error("Database error: {0}")]
    DbError(#[from] sqlx::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}
