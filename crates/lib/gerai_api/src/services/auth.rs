//! Authentication flows: login, token issuance, refresh, logout.
//!
//! Orchestrates the three token kinds per identity — hybrid session
//! token, hybrid bearer access token (hash stored), opaque refresh
//! token (hash stored) — on top of `gerai_core::auth`.

use chrono::{DateTime, Duration, Utc};
use sqlx::PgPool;
use tracing::info;

use gerai_core::auth::access_token::{self, ACCESS_TOKEN_TTL_SECS};
use gerai_core::auth::keys::TokenKeys;
use gerai_core::auth::refresh::{self, REFRESH_TTL_DAYS};
use gerai_core::auth::{crypto, password, queries};
use gerai_core::models::{Role, RotateOutcome, User};

use crate::error::{AppError, AppResult};
use crate::middleware::auth::Identity;

/// A freshly issued token pair. `access_token` and `refresh_token` are
/// plaintext — visible here exactly once, then only as hashes.
#[derive(Debug)]
pub struct IssuedTokens {
    pub access_token: String,
    pub access_expires_at: DateTime<Utc>,
    pub refresh_token: String,
    pub refresh_expires_at: DateTime<Utc>,
}

/// Capability scope carried by bearer tokens of a role.
fn bearer_scope(role: Role) -> Option<&'static str> {
    match role {
        Role::Admin => Some("super"),
        Role::User => None,
    }
}

/// Issue a bearer access token for an identity, overwriting the stored
/// hash for its (user, role).
pub async fn issue_access_token(
    pool: &PgPool,
    keys: &TokenKeys,
    user_id: i64,
    email: &str,
    role: Role,
) -> AppResult<(String, DateTime<Utc>)> {
    let token = access_token::issue(role.token_kind(), user_id, email, bearer_scope(role), keys)?;
    let expires_at = Utc::now() + Duration::seconds(ACCESS_TOKEN_TTL_SECS);
    queries::upsert_access_token(pool, user_id, role, &access_token::hash_token(&token), expires_at)
        .await?;
    Ok((token, expires_at))
}

/// Issue a full token pair (bearer + refresh) for an identity.
pub async fn issue_tokens(
    pool: &PgPool,
    keys: &TokenKeys,
    user_id: i64,
    email: &str,
    role: Role,
) -> AppResult<IssuedTokens> {
    let (access_token, access_expires_at) =
        issue_access_token(pool, keys, user_id, email, role).await?;

    let refresh_token = refresh::generate();
    let refresh_expires_at = Utc::now() + Duration::days(REFRESH_TTL_DAYS);
    queries::upsert_refresh_token(
        pool,
        user_id,
        role,
        &crypto::sha256_hex(&refresh_token),
        refresh_expires_at,
    )
    .await?;

    Ok(IssuedTokens {
        access_token,
        access_expires_at,
        refresh_token,
        refresh_expires_at,
    })
}

/// Authenticate credentials in a role namespace and issue tokens.
///
/// Unknown email, wrong role, and wrong password are indistinguishable
/// to the caller.
pub async fn login(
    pool: &PgPool,
    keys: &TokenKeys,
    role: Role,
    email: &str,
    password_plain: &str,
) -> AppResult<(User, IssuedTokens)> {
    let user = queries::find_user_by_email(pool, email)
        .await?
        .ok_or_else(AppError::unauthorized)?;
    if user.role != role {
        return Err(AppError::unauthorized());
    }
    if !password::verify_password(password_plain, &user.password_hash)? {
        return Err(AppError::unauthorized());
    }

    let tokens = issue_tokens(pool, keys, user.id, &user.email, role).await?;
    info!(email = %user.email, role = role.as_str(), "login");
    Ok((user, tokens))
}

/// Rotate the refresh token and re-issue the bearer access token.
///
/// Every rotation outcome short of success — missing record, revoked,
/// expired, hash mismatch, lost race — answers the same 401, after
/// which the client must log in again.
pub async fn refresh(
    pool: &PgPool,
    keys: &TokenKeys,
    identity: &Identity,
    presented_refresh: &str,
) -> AppResult<IssuedTokens> {
    let old_hash = crypto::sha256_hex(presented_refresh);
    let new_refresh = refresh::generate();
    let new_hash = crypto::sha256_hex(&new_refresh);

    let outcome = queries::rotate_refresh_token(
        pool,
        identity.user_id,
        identity.role,
        &old_hash,
        &new_hash,
        Utc::now(),
    )
    .await?;
    let RotateOutcome::Rotated {
        expires_at: refresh_expires_at,
    } = outcome
    else {
        info!(
            email = %identity.email,
            role = identity.role.as_str(),
            outcome = ?outcome,
            "refresh rejected"
        );
        return Err(AppError::Unauthorized("Refresh invalid, please login".into()));
    };

    let (access_token, access_expires_at) =
        issue_access_token(pool, keys, identity.user_id, &identity.email, identity.role).await?;

    Ok(IssuedTokens {
        access_token,
        access_expires_at,
        refresh_token: new_refresh,
        refresh_expires_at,
    })
}

/// Revoke the refresh token presented in a logout, when any.
pub async fn logout(
    pool: &PgPool,
    role: Role,
    presented_refresh: Option<&str>,
) -> AppResult<()> {
    if let Some(plain) = presented_refresh {
        queries::revoke_refresh_token_by_hash(pool, role, &crypto::sha256_hex(plain)).await?;
        info!(role = role.as_str(), "refresh token revoked on logout");
    }
    Ok(())
}
