//! Auth-related database queries.
//!
//! All writes that race (rotation, nonce consumption, the admin
//! singleton) resolve inside the database: conditional updates,
//! `ON CONFLICT DO NOTHING`, and unique indexes — never read-then-write
//! in application code.

use chrono::{DateTime, Duration, Utc};
use sqlx::PgPool;

use super::AuthError;
use super::crypto;
use super::refresh::REFRESH_TTL_DAYS;
use crate::models::{AccessTokenRecord, RefreshTokenRecord, Role, RotateOutcome, User};

/// Canonical email form: trimmed, lowercase.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

// ---------------------------------------------------------------------------
// Users
// ---------------------------------------------------------------------------

/// Fetch a user by (normalized) email.
pub async fn find_user_by_email(pool: &PgPool, email: &str) -> Result<Option<User>, AuthError> {
    let row = sqlx::query_as::<_, User>(
        "SELECT id, email, password_hash, role FROM users WHERE email = $1",
    )
    .bind(normalize_email(email))
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

/// Create a regular user account, returning the user id.
pub async fn create_user(
    pool: &PgPool,
    email: &str,
    password_hash: &str,
) -> Result<i64, AuthError> {
    let res = sqlx::query_scalar::<_, i64>(
        "INSERT INTO users (email, password_hash, role) VALUES ($1, $2, 'user') RETURNING id",
    )
    .bind(normalize_email(email))
    .bind(password_hash)
    .fetch_one(pool)
    .await;

    match res {
        Ok(id) => Ok(id),
        Err(e) => {
            if let Some(db_err) = e.as_database_error()
                && db_err.is_unique_violation()
            {
                return Err(AuthError::EmailTaken);
            }
            Err(e.into())
        }
    }
}

/// Create the admin account, returning the user id.
///
/// The `one_admin_only` partial unique index makes a second admin
/// impossible no matter how many bootstrap requests race; the losing
/// insert surfaces as [`AuthError::AdminExists`].
pub async fn create_admin(
    pool: &PgPool,
    email: &str,
    password_hash: &str,
) -> Result<i64, AuthError> {
    let res = sqlx::query_scalar::<_, i64>(
        "INSERT INTO users (email, password_hash, role) VALUES ($1, $2, 'admin') RETURNING id",
    )
    .bind(normalize_email(email))
    .bind(password_hash)
    .fetch_one(pool)
    .await;

    match res {
        Ok(id) => Ok(id),
        Err(e) => {
            if let Some(db_err) = e.as_database_error()
                && db_err.is_unique_violation()
            {
                return Err(AuthError::AdminExists);
            }
            Err(e.into())
        }
    }
}

/// Count admin accounts (0 or 1 by construction).
pub async fn count_admins(pool: &PgPool) -> Result<i64, AuthError> {
    let count =
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users WHERE role = 'admin'")
            .fetch_one(pool)
            .await?;
    Ok(count)
}

// ---------------------------------------------------------------------------
// Bearer access token records
// ---------------------------------------------------------------------------

/// Store a bearer token hash, overwriting the previous record for this
/// (user, role). No history is kept.
pub async fn upsert_access_token(
    pool: &PgPool,
    user_id: i64,
    role: Role,
    token_hash: &str,
    expires_at: DateTime<Utc>,
) -> Result<(), AuthError> {
    sqlx::query(
        "INSERT INTO access_tokens (user_id, role, token_hash, expires_at) \
         VALUES ($1, $2, $3, $4) \
         ON CONFLICT (user_id, role) DO UPDATE \
         SET token_hash = EXCLUDED.token_hash, \
             expires_at = EXCLUDED.expires_at, \
             updated_at = now()",
    )
    .bind(user_id)
    .bind(role)
    .bind(token_hash)
    .bind(expires_at)
    .execute(pool)
    .await?;
    Ok(())
}

/// Fetch the stored bearer token record for a (user, role), if any.
pub async fn access_token_record(
    pool: &PgPool,
    user_id: i64,
    role: Role,
) -> Result<Option<AccessTokenRecord>, AuthError> {
    let row = sqlx::query_as::<_, (String, DateTime<Utc>)>(
        "SELECT token_hash, expires_at FROM access_tokens WHERE user_id = $1 AND role = $2",
    )
    .bind(user_id)
    .bind(role)
    .fetch_optional(pool)
    .await?;
    Ok(row.map(|(token_hash, expires_at)| AccessTokenRecord {
        token_hash,
        expires_at,
    }))
}

/// Introspect a presented bearer token hash: unexpired record in the
/// given role namespace whose owner still holds that role.
pub async fn find_valid_access_token_by_hash(
    pool: &PgPool,
    token_hash: &str,
    role: Role,
    now: DateTime<Utc>,
) -> Result<Option<User>, AuthError> {
    let row = sqlx::query_as::<_, User>(
        "SELECT u.id, u.email, u.password_hash, u.role \
         FROM access_tokens t \
         JOIN users u ON u.id = t.user_id \
         WHERE t.token_hash = $1 \
           AND t.role = $2 \
           AND u.role = $2 \
           AND t.expires_at > $3",
    )
    .bind(token_hash)
    .bind(role)
    .bind(now)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

// ---------------------------------------------------------------------------
// Refresh token records
// ---------------------------------------------------------------------------

/// Store a refresh token hash for a (user, role), overwriting the
/// previous record and clearing any revoked/rotated marks.
pub async fn upsert_refresh_token(
    pool: &PgPool,
    user_id: i64,
    role: Role,
    token_hash: &str,
    expires_at: DateTime<Utc>,
) -> Result<(), AuthError> {
    sqlx::query(
        "INSERT INTO refresh_tokens (user_id, role, token_hash, expires_at) \
         VALUES ($1, $2, $3, $4) \
         ON CONFLICT (user_id, role) DO UPDATE \
         SET token_hash = EXCLUDED.token_hash, \
             expires_at = EXCLUDED.expires_at, \
             revoked_at = NULL, \
             rotated_at = NULL, \
             updated_at = now()",
    )
    .bind(user_id)
    .bind(role)
    .bind(token_hash)
    .bind(expires_at)
    .execute(pool)
    .await?;
    Ok(())
}

/// Fetch the stored refresh token record for a (user, role), if any.
pub async fn refresh_token_record(
    pool: &PgPool,
    user_id: i64,
    role: Role,
) -> Result<Option<RefreshTokenRecord>, AuthError> {
    let row = sqlx::query_as::<
        _,
        (
            String,
            DateTime<Utc>,
            Option<DateTime<Utc>>,
            Option<DateTime<Utc>>,
        ),
    >(
        "SELECT token_hash, expires_at, revoked_at, rotated_at \
         FROM refresh_tokens WHERE user_id = $1 AND role = $2",
    )
    .bind(user_id)
    .bind(role)
    .fetch_optional(pool)
    .await?;
    Ok(row.map(
        |(token_hash, expires_at, revoked_at, rotated_at)| RefreshTokenRecord {
            token_hash,
            expires_at,
            revoked_at,
            rotated_at,
        },
    ))
}

/// Rotate a refresh token: verify the presented hash against the stored
/// record, then swap in the new hash with a conditional update.
///
/// The update is keyed on the old hash, so of N concurrent rotations
/// exactly one wins; the rest observe zero affected rows and are
/// reported as [`RotateOutcome::Mismatch`].
pub async fn rotate_refresh_token(
    pool: &PgPool,
    user_id: i64,
    role: Role,
    old_token_hash: &str,
    new_token_hash: &str,
    now: DateTime<Utc>,
) -> Result<RotateOutcome, AuthError> {
    let Some(record) = refresh_token_record(pool, user_id, role).await? else {
        return Ok(RotateOutcome::NotFound);
    };
    if record.revoked_at.is_some() {
        return Ok(RotateOutcome::Revoked);
    }
    if record.expires_at <= now {
        return Ok(RotateOutcome::Expired);
    }
    if !crypto::safe_eq_hex(old_token_hash, &record.token_hash) {
        return Ok(RotateOutcome::Mismatch);
    }

    let expires_at = now + Duration::days(REFRESH_TTL_DAYS);
    let rows = sqlx::query(
        "UPDATE refresh_tokens \
         SET token_hash = $1, expires_at = $2, rotated_at = $3, updated_at = now() \
         WHERE user_id = $4 AND role = $5 AND token_hash = $6 AND revoked_at IS NULL",
    )
    .bind(new_token_hash)
    .bind(expires_at)
    .bind(now)
    .bind(user_id)
    .bind(role)
    .bind(old_token_hash)
    .execute(pool)
    .await?
    .rows_affected();

    if rows == 0 {
        // A concurrent rotation or revocation got there first.
        return Ok(RotateOutcome::Mismatch);
    }
    Ok(RotateOutcome::Rotated { expires_at })
}

/// Revoke the refresh token for a (user, role). Terminal until the next
/// login overwrites the record.
pub async fn revoke_refresh_token(
    pool: &PgPool,
    user_id: i64,
    role: Role,
) -> Result<(), AuthError> {
    sqlx::query(
        "UPDATE refresh_tokens SET revoked_at = now(), updated_at = now() \
         WHERE user_id = $1 AND role = $2 AND revoked_at IS NULL",
    )
    .bind(user_id)
    .bind(role)
    .execute(pool)
    .await?;
    Ok(())
}

/// Revoke a refresh token by hash within a role namespace (logout path:
/// the cookie is all we have).
pub async fn revoke_refresh_token_by_hash(
    pool: &PgPool,
    role: Role,
    token_hash: &str,
) -> Result<(), AuthError> {
    sqlx::query(
        "UPDATE refresh_tokens SET revoked_at = now(), updated_at = now() \
         WHERE role = $1 AND token_hash = $2 AND revoked_at IS NULL",
    )
    .bind(role)
    .bind(token_hash)
    .execute(pool)
    .await?;
    Ok(())
}

// ---------------------------------------------------------------------------
// System settings
// ---------------------------------------------------------------------------

/// Read a system setting.
pub async fn get_setting(pool: &PgPool, key: &str) -> Result<Option<String>, AuthError> {
    let value =
        sqlx::query_scalar::<_, String>("SELECT value FROM system_settings WHERE key = $1")
            .bind(key)
            .fetch_optional(pool)
            .await?;
    Ok(value)
}

/// Write a system setting (upsert).
pub async fn set_setting(pool: &PgPool, key: &str, value: &str) -> Result<(), AuthError> {
    sqlx::query(
        "INSERT INTO system_settings (key, value) VALUES ($1, $2) \
         ON CONFLICT (key) DO UPDATE SET value = EXCLUDED.value, updated_at = now()",
    )
    .bind(key)
    .bind(value)
    .execute(pool)
    .await?;
    Ok(())
}

/// Insert a setting only if the key is new. Returns false when the key
/// already existed — the atomic primitive behind setup-nonce consumption.
pub async fn try_insert_setting(
    pool: &PgPool,
    key: &str,
    value: &str,
) -> Result<bool, AuthError> {
    let rows = sqlx::query(
        "INSERT INTO system_settings (key, value) VALUES ($1, $2) ON CONFLICT (key) DO NOTHING",
    )
    .bind(key)
    .bind(value)
    .execute(pool)
    .await?
    .rows_affected();
    Ok(rows == 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_normalization() {
        assert_eq!(normalize_email("  Admin@Toko.ID "), "admin@toko.id");
        assert_eq!(normalize_email("budi@toko.id"), "budi@toko.id");
    }
}
