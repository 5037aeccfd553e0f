//! Stateless access-grant cookie: HMAC-signed scope entitlements for
//! guests.
//!
//! The payload is signed but not encrypted — scopes are not secret,
//! only their integrity matters. Nothing is persisted server-side; the
//! cookie value is `base64url(payload) + "." + base64url(hmac)`.
//!
//! Reads never fail: any malformation, bad signature, wrong version, or
//! expiry yields an empty scope list, because holding no access is the
//! default state rather than an error.

use axum_extra::extract::CookieJar;
use axum_extra::extract::cookie::{Cookie, SameSite};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use gerai_core::auth::crypto;

/// Cookie carrying guest scope grants.
pub const ACCESS_COOKIE: &str = "product_access";

/// Default grant lifetime: 7 days.
pub const DEFAULT_TTL_SECS: i64 = 7 * 24 * 60 * 60;

/// Paths the access cookie is issued on; clearing covers both.
const COOKIE_PATHS: [&str; 2] = ["/", "/api/user"];

/// Payload version accepted by readers.
const PAYLOAD_VERSION: u8 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct Payload {
    ver: u8,
    exp: i64,
    scopes: Vec<String>,
}

/// Cookie delivery options.
#[derive(Debug, Clone)]
pub struct WriteOptions {
    /// Cookie path; redemption flows often scope it to `/api/user`.
    pub path: &'static str,
    /// Omit Max-Age so the cookie dies with the browser session. The
    /// `exp` inside the payload still bounds it server-side.
    pub session_only: bool,
}

impl Default for WriteOptions {
    fn default() -> Self {
        Self {
            path: "/",
            session_only: false,
        }
    }
}

/// Sign `scopes` into a cookie value, returning the cookie and the
/// effective expiry.
///
/// `exp` is `now + ttl` (default 7 days), capped by `hard_expiry` when
/// given. Duplicate scopes collapse to their first occurrence.
pub fn write(
    scopes: &[String],
    ttl_secs: Option<i64>,
    hard_expiry: Option<DateTime<Utc>>,
    options: &WriteOptions,
    sign_key: &[u8],
    secure: bool,
) -> (Cookie<'static>, DateTime<Utc>) {
    let now = Utc::now();
    let mut exp = now.timestamp() + ttl_secs.unwrap_or(DEFAULT_TTL_SECS);
    if let Some(hard) = hard_expiry {
        exp = exp.min(hard.timestamp());
    }

    let mut deduped: Vec<String> = Vec::new();
    for scope in scopes {
        if !deduped.contains(scope) {
            deduped.push(scope.clone());
        }
    }

    let payload = Payload {
        ver: PAYLOAD_VERSION,
        exp,
        scopes: deduped,
    };
    let payload_bytes = serde_json::to_vec(&payload).expect("payload serializes");
    let mac = crypto::hmac_sha256(sign_key, &payload_bytes);
    let value = format!(
        "{}.{}",
        crypto::b64url_encode(&payload_bytes),
        crypto::b64url_encode(&mac)
    );

    let mut builder = Cookie::build((ACCESS_COOKIE.to_string(), value))
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .path(options.path.to_string());
    if !options.session_only {
        builder = builder.max_age(time::Duration::seconds((exp - now.timestamp()).max(0)));
    }

    let expires_at = DateTime::from_timestamp(exp, 0).unwrap_or(now);
    (builder.build(), expires_at)
}

/// Verify a cookie value and return its scopes. Empty on any failure.
pub fn decode_value(value: &str, sign_key: &[u8], now: DateTime<Utc>) -> Vec<String> {
    let Some((payload_b64, mac_b64)) = value.split_once('.') else {
        return Vec::new();
    };
    let (Some(payload_bytes), Some(mac)) = (
        crypto::b64url_decode(payload_b64),
        crypto::b64url_decode(mac_b64),
    ) else {
        return Vec::new();
    };

    let expected = crypto::hmac_sha256(sign_key, &payload_bytes);
    if !crypto::safe_eq(&expected, &mac) {
        return Vec::new();
    }

    let Ok(payload) = serde_json::from_slice::<Payload>(&payload_bytes) else {
        return Vec::new();
    };
    if payload.ver != PAYLOAD_VERSION || payload.exp < now.timestamp() {
        return Vec::new();
    }
    payload.scopes
}

/// Read and verify the access cookie from a request jar.
pub fn read_scopes(jar: &CookieJar, sign_key: &[u8]) -> Vec<String> {
    match jar.get(ACCESS_COOKIE) {
        Some(cookie) => decode_value(cookie.value(), sign_key, Utc::now()),
        None => Vec::new(),
    }
}

/// Expired twins on every path the cookie is issued on.
pub fn clear_cookies(secure: bool) -> Vec<Cookie<'static>> {
    COOKIE_PATHS
        .iter()
        .map(|path| {
            Cookie::build((ACCESS_COOKIE.to_string(), String::new()))
                .http_only(true)
                .secure(secure)
                .same_site(SameSite::Lax)
                .path(path.to_string())
                .max_age(time::Duration::ZERO)
                .build()
        })
        .collect()
}
