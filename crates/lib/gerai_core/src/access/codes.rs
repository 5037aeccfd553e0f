//! Access code plaintext generation and scope grammar.

use rand::RngCore;

use crate::auth::crypto;

/// Prefix marking storefront access-code plaintexts.
const TOKEN_PREFIX: &str = "acs_";
/// Raw entropy per generated code (32 bytes).
const TOKEN_BYTES: usize = 32;

/// Generate a fresh access-code plaintext: `acs_` + 32 random bytes,
/// base64url.
pub fn generate_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    rand::rng().fill_bytes(&mut bytes);
    format!("{TOKEN_PREFIX}{}", crypto::b64url_encode(&bytes))
}

/// SHA-256 hash of a code plaintext, the only stored form.
pub fn hash_token(token: &str) -> String {
    crypto::sha256_hex(token)
}

/// Scope grammar (case-insensitive): `product:*`, `product:<digits>`,
/// or `drop:<slug>` where slug is `[a-z0-9-]+`.
pub fn is_valid_scope(scope: &str) -> bool {
    let lower = scope.to_ascii_lowercase();
    if lower == "product:*" {
        return true;
    }
    if let Some(rest) = lower.strip_prefix("product:") {
        return !rest.is_empty() && rest.bytes().all(|b| b.is_ascii_digit());
    }
    if let Some(rest) = lower.strip_prefix("drop:") {
        return !rest.is_empty()
            && rest
                .bytes()
                .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-');
    }
    false
}
