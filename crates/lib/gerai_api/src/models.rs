//! Request and response DTOs, matching the storefront wire format.
//!
//! Field names that differ from Rust conventions (`accessExpiresAt`,
//! `pageSize`, ...) are preserved via serde renames — the frontend
//! matches on them verbatim.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use gerai_core::models::AccessCode;

/// Deserializes a present-but-possibly-null field into `Some(inner)`,
/// so PATCH bodies can distinguish "leave unchanged" (absent) from
/// "clear" (null).
fn deserialize_some<'de, T, D>(deserializer: D) -> Result<Option<T>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Deserialize::deserialize(deserializer).map(Some)
}

// ---------------------------------------------------------------------------
// Auth
// ---------------------------------------------------------------------------

/// Login / registration body. Fields are optional so missing input is a
/// 400 with a message instead of a deserialization failure.
#[derive(Debug, Deserialize)]
pub struct CredentialsRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

/// Token issuance response (login / refresh). The plaintext bearer
/// token appears exactly once, in the role-specific field.
#[derive(Debug, Serialize)]
pub struct TokenIssueResponse {
    pub ok: bool,
    pub role: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub admin_access_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_access_token: Option<String>,
    #[serde(rename = "accessExpiresAt")]
    pub access_expires_at: DateTime<Utc>,
    #[serde(rename = "refreshExpiresAt")]
    pub refresh_expires_at: DateTime<Utc>,
}

/// User registration response. No tokens: registration does not log in.
#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub ok: bool,
    pub role: &'static str,
    pub email: String,
    pub id: i64,
}

/// Bootstrap response: the sole admin account plus its first bearer
/// token (shown once).
#[derive(Debug, Serialize)]
pub struct SetupResponse {
    pub ok: bool,
    pub role: &'static str,
    pub email: String,
    pub admin_access_token: String,
    #[serde(rename = "expiresAt")]
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct LogoutResponse {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<&'static str>,
}

/// `GET /api/auth/me` response.
#[derive(Debug, Serialize)]
pub struct MeResponse {
    pub ok: bool,
    pub role: &'static str,
    pub id: i64,
    pub email: String,
    #[serde(rename = "accessExpiresAt", skip_serializing_if = "Option::is_none")]
    pub access_expires_at: Option<DateTime<Utc>>,
    #[serde(rename = "refreshExpiresAt", skip_serializing_if = "Option::is_none")]
    pub refresh_expires_at: Option<DateTime<Utc>>,
}

// ---------------------------------------------------------------------------
// Access codes (admin management)
// ---------------------------------------------------------------------------

/// Public view of an access code. The token hash never leaves storage.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessCodeDto {
    pub id: i64,
    pub label: Option<String>,
    pub scope: String,
    pub max_uses: Option<i32>,
    pub used_count: i32,
    pub expires_at: Option<DateTime<Utc>>,
    pub enabled: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<AccessCode> for AccessCodeDto {
    fn from(code: AccessCode) -> Self {
        Self {
            id: code.id,
            label: code.label,
            scope: code.scope,
            max_uses: code.max_uses,
            used_count: code.used_count,
            expires_at: code.expires_at,
            enabled: code.enabled,
            created_at: code.created_at,
            updated_at: code.updated_at,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateAccessCodeRequest {
    pub label: Option<String>,
    pub scope: Option<String>,
    /// Caller-chosen plaintext (min 16 chars); generated when absent.
    pub token: Option<String>,
    pub max_uses: Option<i32>,
    pub expires_at: Option<DateTime<Utc>>,
}

/// Partial update. Absent fields stay; explicit nulls clear nullables.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateAccessCodeRequest {
    #[serde(default, deserialize_with = "deserialize_some")]
    pub label: Option<Option<String>>,
    pub scope: Option<String>,
    #[serde(default, deserialize_with = "deserialize_some")]
    pub max_uses: Option<Option<i32>>,
    #[serde(default, deserialize_with = "deserialize_some")]
    pub expires_at: Option<Option<DateTime<Utc>>>,
    pub enabled: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct ListAccessCodesQuery {
    pub q: Option<String>,
    pub page: Option<i64>,
    #[serde(rename = "pageSize")]
    pub page_size: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct ListAccessCodesResponse {
    pub ok: bool,
    pub data: Vec<AccessCodeDto>,
    pub page: i64,
    #[serde(rename = "pageSize")]
    pub page_size: i64,
    pub total: i64,
}

#[derive(Debug, Serialize)]
pub struct AccessCodeResponse {
    pub ok: bool,
    pub data: AccessCodeDto,
}

/// Create / rotate response: the only time the plaintext is visible.
#[derive(Debug, Serialize)]
pub struct AccessCodeSecretResponse {
    pub ok: bool,
    pub data: AccessCodeDto,
    pub access_token_plaintext: String,
    pub note: &'static str,
}

// ---------------------------------------------------------------------------
// Code redemption & grant status
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct RedeemRequest {
    pub code: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct RedeemData {
    pub scope: String,
    #[serde(rename = "storedAs")]
    pub stored_as: &'static str,
    #[serde(rename = "expiresAt", skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
pub struct RedeemResponse {
    pub ok: bool,
    pub data: RedeemData,
    pub note: &'static str,
}

#[derive(Debug, Serialize)]
pub struct AccessStatusResponse {
    pub ok: bool,
    pub source: &'static str,
    #[serde(rename = "hasAccess")]
    pub has_access: bool,
    pub scopes: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct NoteResponse {
    pub ok: bool,
    pub note: &'static str,
}

// ---------------------------------------------------------------------------
// Health
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub ok: bool,
    pub version: &'static str,
    #[serde(rename = "dbConnected")]
    pub db_connected: bool,
}
