//! Auth and access-control domain models.
//!
//! These are internal domain models, distinct from API DTOs
//! (which carry `#[serde(rename)]` for the storefront wire format).

use serde::{Deserialize, Serialize};

/// Account role. Each role is its own identity namespace: an admin
/// session, access token, or refresh token never authorizes user-side
/// endpoints, and vice versa.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "user_role", rename_all = "lowercase")]
pub enum Role {
    Admin,
    User,
}

impl Role {
    /// Lowercase wire name (`admin` / `user`).
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::User => "user",
        }
    }

    /// The bearer-token kind bound to this role namespace.
    pub fn token_kind(&self) -> AccessTokenKind {
        match self {
            Role::Admin => AccessTokenKind::AdminAccess,
            Role::User => AccessTokenKind::UserAccess,
        }
    }
}

/// Discriminator carried in the `typ` claim of bearer access tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AccessTokenKind {
    #[serde(rename = "admin_access")]
    AdminAccess,
    #[serde(rename = "user_access")]
    UserAccess,
}

/// Domain user row.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct User {
    pub id: i64,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
}

/// Claims carried in a session token (cookie-delivered).
///
/// `typ` duplicates `role`; both are asserted on verification so a
/// token minted for one namespace never passes as the other.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionClaims {
    pub role: Role,
    pub typ: Role,
    /// Subject — account email.
    pub sub: String,
}

/// Claims carried in a bearer access token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessClaims {
    pub typ: AccessTokenKind,
    /// Owning user id.
    pub uid: i64,
    /// Subject — account email.
    pub sub: String,
    /// Optional capability scope (admin tokens carry `"super"`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    /// Token id, reserved for per-token revocation.
    pub jti: String,
}

/// Claims of the one-time bootstrap JWS (plain HS256, not hybrid).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetupClaims {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub jti: String,
    /// Expiry (unix timestamp).
    pub exp: i64,
}

/// Stored bearer-token record (hash only; one per user per role).
#[derive(Debug, Clone)]
pub struct AccessTokenRecord {
    pub token_hash: String,
    pub expires_at: chrono::DateTime<chrono::Utc>,
}

/// Stored refresh-token record (hash only; one per user per role).
#[derive(Debug, Clone)]
pub struct RefreshTokenRecord {
    pub token_hash: String,
    pub expires_at: chrono::DateTime<chrono::Utc>,
    pub revoked_at: Option<chrono::DateTime<chrono::Utc>>,
    pub rotated_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// Outcome of a refresh-token rotation attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RotateOutcome {
    /// No refresh token stored for this (user, role).
    NotFound,
    /// The stored token was revoked by logout.
    Revoked,
    /// The stored token expired.
    Expired,
    /// The presented token does not match the stored hash, or a
    /// concurrent rotation won the race.
    Mismatch,
    /// Rotation succeeded; the new token expires at this instant.
    Rotated {
        expires_at: chrono::DateTime<chrono::Utc>,
    },
}

/// Prepaid access code (hash never leaves the storage layer).
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct AccessCode {
    pub id: i64,
    pub label: Option<String>,
    pub scope: String,
    pub max_uses: Option<i32>,
    pub used_count: i32,
    pub expires_at: Option<chrono::DateTime<chrono::Utc>>,
    pub enabled: bool,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

/// Per-account scope grant, written when a logged-in user redeems a code.
#[derive(Debug, Clone)]
pub struct UserAccessGrant {
    pub user_id: i64,
    pub scope: String,
    pub expires_at: Option<chrono::DateTime<chrono::Utc>>,
}
