//! Opaque refresh tokens.
//!
//! Refresh tokens carry no claims; they are random bytes whose SHA-256
//! hash is stored per (user, role). Rotation itself lives in
//! [`super::queries::rotate_refresh_token`].

use rand::RngCore;

use super::crypto;

/// Refresh token lifetime: 30 days.
pub const REFRESH_TTL_DAYS: i64 = 30;

/// Raw entropy per token (48 bytes → 64 base64url chars).
const REFRESH_TOKEN_BYTES: usize = 48;

/// Generate a new opaque refresh token.
pub fn generate() -> String {
    let mut bytes = [0u8; REFRESH_TOKEN_BYTES];
    rand::rng().fill_bytes(&mut bytes);
    crypto::b64url_encode(&bytes)
}
