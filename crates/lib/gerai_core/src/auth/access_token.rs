//! Bearer access tokens for privileged feature endpoints.
//!
//! Hybrid tokens presented via `x-admin-access-token` or an
//! `Authorization: Bearer` header. Only the SHA-256 hash is persisted;
//! issuing overwrites the previous record for the (user, role) pair, so
//! at most one bearer token per identity is live.

use super::AuthError;
use super::crypto;
use super::hybrid;
use super::keys::TokenKeys;
use crate::models::{AccessClaims, AccessTokenKind};

/// Bearer token lifetime: 10 hours.
pub const ACCESS_TOKEN_TTL_SECS: i64 = 10 * 60 * 60;

/// Issue a bearer token. The `jti` is minted here and reserved for
/// per-token revocation.
pub fn issue(
    kind: AccessTokenKind,
    uid: i64,
    sub: &str,
    scope: Option<&str>,
    keys: &TokenKeys,
) -> Result<String, AuthError> {
    let claims = AccessClaims {
        typ: kind,
        uid,
        sub: sub.to_string(),
        scope: scope.map(|s| s.to_string()),
        jti: uuid::Uuid::new_v4().to_string(),
    };
    hybrid::encode(&claims, ACCESS_TOKEN_TTL_SECS, keys)
}

/// Verify a bearer token and pin its kind. Structural claims checks
/// (positive uid, non-empty subject) ride on top of the codec.
pub fn verify(token: &str, expected_kind: AccessTokenKind, keys: &TokenKeys) -> Option<AccessClaims> {
    let decoded = hybrid::decode::<AccessClaims>(token, keys)?;
    let claims = decoded.claims;
    if claims.typ != expected_kind || claims.uid <= 0 || claims.sub.trim().is_empty() {
        return None;
    }
    Some(claims)
}

/// SHA-256 hash of a plaintext token, the only stored form.
pub fn hash_token(token: &str) -> String {
    crypto::sha256_hex(token)
}
