//! Bootstrap setup token verification.
//!
//! The one-time admin bootstrap is authorized by a conventional HS256
//! JWS (not a hybrid token) minted out-of-band by the operator. Claims:
//! `email`, `jti` (replay nonce), `exp`.

use jsonwebtoken::{DecodingKey, Validation};

use crate::models::SetupClaims;

/// Verify a setup JWS against the setup secret, returning the claims.
///
/// Expiry is required and checked with zero leeway. The caller is
/// responsible for email allow-listing and nonce bookkeeping.
pub fn verify_setup_token(token: &str, secret: &[u8]) -> Option<SetupClaims> {
    let key = DecodingKey::from_secret(secret);
    let mut validation = Validation::default();
    validation.validate_exp = true;
    validation.leeway = 0;
    jsonwebtoken::decode::<SetupClaims>(token, &key, &validation)
        .ok()
        .map(|data| data.claims)
}
