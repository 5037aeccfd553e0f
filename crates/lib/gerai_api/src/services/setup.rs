//! Bootstrap gate for the one-time admin creation.
//!
//! Six checks, short-circuiting in order: secrets configured, setup not
//! already closed, shared-secret header, signed one-time token, email
//! allow-list, unused nonce. The nonce is burned the moment it
//! verifies — before the account is created — so a failed later step
//! still closes the replay window.

use axum::http::HeaderMap;
use tracing::{info, warn};

use gerai_core::auth::queries::{self, normalize_email};
use gerai_core::auth::{crypto, setup};

use crate::AppState;
use crate::error::{AppError, AppResult};

/// Header carrying the shared setup secret.
pub const SETUP_KEY_HEADER: &str = "x-setup-key";
/// Header carrying the signed one-time setup token.
pub const SETUP_JWS_HEADER: &str = "x-setup-jws";

/// Setting that permanently closes the setup route.
pub const SETUP_DONE_KEY: &str = "SETUP_DONE";
/// Prefix of per-nonce ledger keys.
const SETUP_NONCE_PREFIX: &str = "SETUP_NONCE:";

/// Run the gate sequence. On success the nonce is already consumed and
/// the caller may proceed to create the admin account.
pub async fn guard(state: &AppState, headers: &HeaderMap) -> AppResult<()> {
    let setup_config = &state.config.setup;
    let (Some(setup_key), Some(jwt_secret), Some(admin_email)) = (
        &setup_config.setup_key,
        &setup_config.setup_jwt_secret,
        &setup_config.admin_email,
    ) else {
        return Err(AppError::ServerConfig("Server env setup belum lengkap".into()));
    };

    if queries::get_setting(&state.pool, SETUP_DONE_KEY).await?.as_deref() == Some("1") {
        return Err(AppError::Forbidden("Admin sudah ada. Setup ditutup.".into()));
    }

    let presented_key = header_value(headers, SETUP_KEY_HEADER)
        .ok_or_else(AppError::unauthorized)?;
    if !crypto::safe_eq(presented_key.as_bytes(), setup_key.as_bytes()) {
        return Err(AppError::unauthorized());
    }

    let jws = header_value(headers, SETUP_JWS_HEADER).ok_or_else(AppError::unauthorized)?;
    let claims =
        setup::verify_setup_token(&jws, jwt_secret.as_bytes()).ok_or_else(AppError::unauthorized)?;

    if normalize_email(&claims.email) != normalize_email(admin_email) {
        return Err(AppError::Forbidden("Email tidak diizinkan jadi admin".into()));
    }
    if claims.jti.trim().is_empty() {
        return Err(AppError::unauthorized());
    }

    let nonce_key = format!("{SETUP_NONCE_PREFIX}{}", claims.jti);
    if queries::get_setting(&state.pool, &nonce_key).await?.is_some() {
        warn!(jti = %claims.jti, "setup token replay rejected");
        return Err(AppError::unauthorized());
    }
    // Burn the nonce now; the ON CONFLICT insert settles races.
    if !queries::try_insert_setting(&state.pool, &nonce_key, "used").await? {
        warn!(jti = %claims.jti, "setup nonce lost insert race");
        return Err(AppError::unauthorized());
    }

    info!(jti = %claims.jti, "setup gate passed, nonce consumed");
    Ok(())
}

fn header_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
