//! Access-code and grant database queries.
//!
//! Soft-deleted codes are invisible to every query here except the
//! delete itself; redemption locks the row so quota accounting cannot
//! race.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::error;

use super::AccessError;
use crate::models::{AccessCode, UserAccessGrant};

/// Columns of the public access-code row (never the token hash).
const CODE_COLUMNS: &str =
    "id, label, scope, max_uses, used_count, expires_at, enabled, created_at, updated_at";

/// Partial update: `None` leaves a field unchanged, `Some(None)` clears
/// a nullable one.
#[derive(Debug, Default, Clone)]
pub struct AccessCodeUpdate {
    pub label: Option<Option<String>>,
    pub scope: Option<String>,
    pub max_uses: Option<Option<i32>>,
    pub expires_at: Option<Option<DateTime<Utc>>>,
    pub enabled: Option<bool>,
}

/// Create an access code from its already-hashed token.
pub async fn create_access_code(
    pool: &PgPool,
    label: Option<&str>,
    scope: &str,
    token_hash: &str,
    max_uses: Option<i32>,
    expires_at: Option<DateTime<Utc>>,
) -> Result<AccessCode, AccessError> {
    let code = sqlx::query_as::<_, AccessCode>(&format!(
        "INSERT INTO access_codes (label, scope, token_hash, max_uses, expires_at) \
         VALUES ($1, $2, $3, $4, $5) \
         RETURNING {CODE_COLUMNS}"
    ))
    .bind(label)
    .bind(scope)
    .bind(token_hash)
    .bind(max_uses)
    .bind(expires_at)
    .fetch_one(pool)
    .await?;
    Ok(code)
}

/// List non-deleted codes, newest first, optionally filtered by a
/// substring of label or scope. Returns (page items, total matches).
pub async fn list_access_codes(
    pool: &PgPool,
    q: Option<&str>,
    page: i64,
    page_size: i64,
) -> Result<(Vec<AccessCode>, i64), AccessError> {
    let offset = (page - 1) * page_size;

    if let Some(q) = q {
        let pattern = format!("%{}%", escape_like(q));
        let items = sqlx::query_as::<_, AccessCode>(&format!(
            "SELECT {CODE_COLUMNS} FROM access_codes \
             WHERE deleted_at IS NULL AND (label ILIKE $1 OR scope ILIKE $1) \
             ORDER BY created_at DESC LIMIT $2 OFFSET $3"
        ))
        .bind(&pattern)
        .bind(page_size)
        .bind(offset)
        .fetch_all(pool)
        .await?;
        let total = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM access_codes \
             WHERE deleted_at IS NULL AND (label ILIKE $1 OR scope ILIKE $1)",
        )
        .bind(&pattern)
        .fetch_one(pool)
        .await?;
        Ok((items, total))
    } else {
        let items = sqlx::query_as::<_, AccessCode>(&format!(
            "SELECT {CODE_COLUMNS} FROM access_codes \
             WHERE deleted_at IS NULL \
             ORDER BY created_at DESC LIMIT $1 OFFSET $2"
        ))
        .bind(page_size)
        .bind(offset)
        .fetch_all(pool)
        .await?;
        let total = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM access_codes WHERE deleted_at IS NULL",
        )
        .fetch_one(pool)
        .await?;
        Ok((items, total))
    }
}

/// Escape LIKE metacharacters in a user-supplied filter.
fn escape_like(q: &str) -> String {
    q.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_")
}

/// Fetch a non-deleted code by id.
pub async fn get_access_code(pool: &PgPool, id: i64) -> Result<Option<AccessCode>, AccessError> {
    let code = sqlx::query_as::<_, AccessCode>(&format!(
        "SELECT {CODE_COLUMNS} FROM access_codes WHERE id = $1 AND deleted_at IS NULL"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?;
    Ok(code)
}

/// Fetch a non-deleted code by token hash (claim-route pre-lookup;
/// disabled codes are returned so the caller can classify them).
pub async fn find_access_code_by_hash(
    pool: &PgPool,
    token_hash: &str,
) -> Result<Option<AccessCode>, AccessError> {
    let code = sqlx::query_as::<_, AccessCode>(&format!(
        "SELECT {CODE_COLUMNS} FROM access_codes WHERE token_hash = $1 AND deleted_at IS NULL"
    ))
    .bind(token_hash)
    .fetch_optional(pool)
    .await?;
    Ok(code)
}

/// Apply a partial update to a non-deleted code.
pub async fn update_access_code(
    pool: &PgPool,
    id: i64,
    update: AccessCodeUpdate,
) -> Result<Option<AccessCode>, AccessError> {
    let Some(current) = get_access_code(pool, id).await? else {
        return Ok(None);
    };

    let label = update.label.unwrap_or(current.label);
    let scope = update.scope.unwrap_or(current.scope);
    let max_uses = update.max_uses.unwrap_or(current.max_uses);
    let expires_at = update.expires_at.unwrap_or(current.expires_at);
    let enabled = update.enabled.unwrap_or(current.enabled);

    let code = sqlx::query_as::<_, AccessCode>(&format!(
        "UPDATE access_codes \
         SET label = $1, scope = $2, max_uses = $3, expires_at = $4, enabled = $5, \
             updated_at = now() \
         WHERE id = $6 AND deleted_at IS NULL \
         RETURNING {CODE_COLUMNS}"
    ))
    .bind(label)
    .bind(scope)
    .bind(max_uses)
    .bind(expires_at)
    .bind(enabled)
    .bind(id)
    .fetch_optional(pool)
    .await?;
    Ok(code)
}

/// Soft-delete a code. Returns false when it was already deleted or
/// never existed.
pub async fn soft_delete_access_code(pool: &PgPool, id: i64) -> Result<bool, AccessError> {
    let rows = sqlx::query(
        "UPDATE access_codes SET deleted_at = now(), updated_at = now() \
         WHERE id = $1 AND deleted_at IS NULL",
    )
    .bind(id)
    .execute(pool)
    .await?
    .rows_affected();
    Ok(rows == 1)
}

/// Swap in a new token hash and reset usage accounting.
pub async fn rotate_access_code_token(
    pool: &PgPool,
    id: i64,
    new_token_hash: &str,
) -> Result<Option<AccessCode>, AccessError> {
    let code = sqlx::query_as::<_, AccessCode>(&format!(
        "UPDATE access_codes \
         SET token_hash = $1, used_count = 0, updated_at = now() \
         WHERE id = $2 AND deleted_at IS NULL \
         RETURNING {CODE_COLUMNS}"
    ))
    .bind(new_token_hash)
    .bind(id)
    .fetch_optional(pool)
    .await?;
    Ok(code)
}

/// Redeem a code by hash: check eligibility and burn one use, all under
/// a row lock so two concurrent redeems of a one-use code cannot both
/// succeed.
///
/// Returns the updated code, or `None` when the hash matches nothing
/// redeemable (unknown, disabled, deleted, expired, or out of quota).
pub async fn verify_and_consume(
    pool: &PgPool,
    token_hash: &str,
    now: DateTime<Utc>,
) -> Result<Option<AccessCode>, AccessError> {
    let mut tx = pool.begin().await?;

    let row = sqlx::query_as::<_, AccessCode>(&format!(
        "SELECT {CODE_COLUMNS} FROM access_codes \
         WHERE token_hash = $1 \
           AND enabled \
           AND deleted_at IS NULL \
           AND (expires_at IS NULL OR expires_at > $2) \
         FOR UPDATE"
    ))
    .bind(token_hash)
    .bind(now)
    .fetch_optional(&mut *tx)
    .await?;

    let Some(code) = row else {
        tx.rollback().await?;
        return Ok(None);
    };

    if let Some(max) = code.max_uses
        && code.used_count >= max
    {
        tx.rollback().await?;
        return Ok(None);
    }

    let updated = sqlx::query_as::<_, AccessCode>(&format!(
        "UPDATE access_codes SET used_count = used_count + 1, updated_at = now() \
         WHERE id = $1 \
         RETURNING {CODE_COLUMNS}"
    ))
    .bind(code.id)
    .fetch_one(&mut *tx)
    .await?;

    if let Some(max) = updated.max_uses
        && updated.used_count > max
    {
        tx.rollback().await?;
        error!(code_id = updated.id, "access code quota raced past max_uses");
        return Err(AccessError::QuotaRace);
    }

    tx.commit().await?;
    Ok(Some(updated))
}

// ---------------------------------------------------------------------------
// Per-account grants
// ---------------------------------------------------------------------------

/// Grant a scope to a user (upsert refreshes the expiry).
pub async fn grant_scope(
    pool: &PgPool,
    user_id: i64,
    scope: &str,
    expires_at: Option<DateTime<Utc>>,
) -> Result<(), AccessError> {
    sqlx::query(
        "INSERT INTO user_access_grants (user_id, scope, expires_at) VALUES ($1, $2, $3) \
         ON CONFLICT (user_id, scope) DO UPDATE SET expires_at = EXCLUDED.expires_at",
    )
    .bind(user_id)
    .bind(scope)
    .bind(expires_at)
    .execute(pool)
    .await?;
    Ok(())
}

/// Unexpired grants for a user.
pub async fn user_grants(
    pool: &PgPool,
    user_id: i64,
    now: DateTime<Utc>,
) -> Result<Vec<UserAccessGrant>, AccessError> {
    let rows = sqlx::query_as::<_, (i64, String, Option<DateTime<Utc>>)>(
        "SELECT user_id, scope, expires_at FROM user_access_grants \
         WHERE user_id = $1 AND (expires_at IS NULL OR expires_at > $2) \
         ORDER BY scope",
    )
    .bind(user_id)
    .bind(now)
    .fetch_all(pool)
    .await?;
    Ok(rows
        .into_iter()
        .map(|(user_id, scope, expires_at)| UserAccessGrant {
            user_id,
            scope,
            expires_at,
        })
        .collect())
}

/// Drop a single grant.
pub async fn revoke_scope(pool: &PgPool, user_id: i64, scope: &str) -> Result<(), AccessError> {
    sqlx::query("DELETE FROM user_access_grants WHERE user_id = $1 AND scope = $2")
        .bind(user_id)
        .bind(scope)
        .execute(pool)
        .await?;
    Ok(())
}
