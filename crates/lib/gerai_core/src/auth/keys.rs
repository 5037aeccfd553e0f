//! Token key material, resolved from the environment once at startup.
//!
//! Production requires every secret to be configured; development falls
//! back to fixed values with a logged warning so a bare checkout still
//! boots.

use tracing::warn;

use super::AuthError;
use super::crypto;

/// A256GCM content-encryption key size (32 bytes).
pub const ENC_KEY_SIZE: usize = 32;
/// Minimum outer signing secret length enforced in production.
const MIN_SIGN_SECRET_BYTES: usize = 32;

/// Development fallback for the outer signing secret.
const DEV_SIGN_SECRET: &str = "dev-sign-secret-change-me-please-please";
/// Development fallback for the content-encryption key (raw ASCII bytes).
const DEV_ENC_KEY: &str = "0123456789abcdef0123456789abcdef";
/// Development fallback for the access-grant cookie signing secret.
const DEV_ACCESS_SIGN_SECRET: &str = "dev-sign-secret-change-me";

/// Deployment environment, from `APP_ENV`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
}

impl Environment {
    /// `APP_ENV=production` selects production; anything else is development.
    pub fn from_env() -> Self {
        match std::env::var("APP_ENV").as_deref() {
            Ok("production") => Environment::Production,
            _ => Environment::Development,
        }
    }

    pub fn is_production(&self) -> bool {
        matches!(self, Environment::Production)
    }
}

/// Key material for the hybrid token codec and the access-grant cookie.
#[derive(Clone)]
pub struct TokenKeys {
    /// HS256 secret for the outer JWS.
    pub sign_key: Vec<u8>,
    /// A256GCM key for the inner JWE.
    pub enc_key: [u8; ENC_KEY_SIZE],
    /// HMAC-SHA256 secret for the access-grant cookie.
    pub access_sign_key: Vec<u8>,
}

impl std::fmt::Debug for TokenKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Never print key bytes.
        f.debug_struct("TokenKeys").finish_non_exhaustive()
    }
}

impl TokenKeys {
    /// Resolve all keys from the environment.
    ///
    /// | Variable             | Meaning                                       |
    /// |----------------------|-----------------------------------------------|
    /// | `JWT_SIGN_SECRET`    | outer JWS secret (≥ 32 bytes in production)   |
    /// | `JWT_ENC_KEY_B64`    | inner JWE key, base64url of exactly 32 bytes  |
    /// | `ACCESS_SIGN_SECRET` | cookie HMAC secret, defaults to the JWS secret |
    pub fn from_env(environment: Environment) -> Result<Self, AuthError> {
        Ok(Self {
            sign_key: resolve_sign_secret(environment)?,
            enc_key: resolve_enc_key(environment)?,
            access_sign_key: resolve_access_sign_secret(environment)?,
        })
    }
}

/// Resolve the outer JWS signing secret.
fn resolve_sign_secret(environment: Environment) -> Result<Vec<u8>, AuthError> {
    if let Ok(secret) = std::env::var("JWT_SIGN_SECRET")
        && !secret.is_empty()
    {
        if environment.is_production() && secret.len() < MIN_SIGN_SECRET_BYTES {
            return Err(AuthError::KeyError(format!(
                "JWT_SIGN_SECRET must be at least {MIN_SIGN_SECRET_BYTES} bytes in production"
            )));
        }
        return Ok(secret.into_bytes());
    }
    if environment.is_production() {
        return Err(AuthError::KeyError(
            "JWT_SIGN_SECRET is required in production".into(),
        ));
    }
    warn!("JWT_SIGN_SECRET not set, using development fallback");
    Ok(DEV_SIGN_SECRET.as_bytes().to_vec())
}

/// Resolve the 32-byte JWE content-encryption key.
///
/// A configured key of the wrong length is an error in every
/// environment; only a missing key falls back.
fn resolve_enc_key(environment: Environment) -> Result<[u8; ENC_KEY_SIZE], AuthError> {
    let b64 = match std::env::var("JWT_ENC_KEY_B64") {
        Ok(v) if !v.is_empty() => v,
        _ => {
            if environment.is_production() {
                return Err(AuthError::KeyError(
                    "JWT_ENC_KEY_B64 is required in production".into(),
                ));
            }
            warn!("JWT_ENC_KEY_B64 not set, using development fallback");
            let mut key = [0u8; ENC_KEY_SIZE];
            key.copy_from_slice(DEV_ENC_KEY.as_bytes());
            return Ok(key);
        }
    };
    let bytes = crypto::b64url_decode(&b64).ok_or_else(|| {
        AuthError::KeyError("JWT_ENC_KEY_B64 is not valid unpadded base64url".into())
    })?;
    bytes.try_into().map_err(|_| {
        AuthError::KeyError(format!(
            "JWT_ENC_KEY_B64 must decode to exactly {ENC_KEY_SIZE} bytes"
        ))
    })
}

/// Resolve the access-grant cookie HMAC secret.
fn resolve_access_sign_secret(environment: Environment) -> Result<Vec<u8>, AuthError> {
    if let Ok(secret) = std::env::var("ACCESS_SIGN_SECRET")
        && !secret.is_empty()
    {
        return Ok(secret.into_bytes());
    }
    if let Ok(secret) = std::env::var("JWT_SIGN_SECRET")
        && !secret.is_empty()
    {
        return Ok(secret.into_bytes());
    }
    if environment.is_production() {
        return Err(AuthError::KeyError(
            "ACCESS_SIGN_SECRET is required in production".into(),
        ));
    }
    warn!("ACCESS_SIGN_SECRET not set, using development fallback");
    Ok(DEV_ACCESS_SIGN_SECRET.as_bytes().to_vec())
}
