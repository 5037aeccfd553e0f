//! Prepaid access codes and per-account scope grants.
//!
//! Access codes are opaque secrets sold or handed out out-of-band;
//! redeeming one grants a scope either to the account (logged-in users)
//! or to a signed guest cookie.

pub mod codes;
pub mod queries;

use thiserror::Error;

/// Access-control errors.
#[derive(Debug, Error)]
pub enum AccessError {
    /// The post-increment re-check found `used_count` past the quota.
    /// Row locking should make this unreachable.
    #[error("Access code quota raced past max_uses")]
    QuotaRace,

    #[error("Database error: {0}")]
    DbError(#[from] sqlx::Error),
}
