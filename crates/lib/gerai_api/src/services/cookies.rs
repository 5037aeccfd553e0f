//! Cookie builders for session and refresh tokens.
//!
//! All cookies are httpOnly and SameSite=Lax; `Secure` follows the
//! deployment environment. Refresh cookies are path-scoped to `/api` so
//! the long-lived secret only travels on API calls.

use axum_extra::extract::cookie::{Cookie, SameSite};
use time::Duration;

use gerai_core::auth::session::SESSION_TTL_SECS;
use gerai_core::models::Role;

/// Session cookie name for a role namespace.
pub fn session_cookie_name(role: Role) -> &'static str {
    match role {
        Role::Admin => "admin_session",
        Role::User => "user_session",
    }
}

/// Refresh cookie name for a role namespace.
pub fn refresh_cookie_name(role: Role) -> &'static str {
    match role {
        Role::Admin => "admin_refresh",
        Role::User => "user_refresh",
    }
}

/// Build the 7-day session cookie.
pub fn session_cookie(role: Role, token: &str, secure: bool) -> Cookie<'static> {
    Cookie::build((session_cookie_name(role).to_string(), token.to_string()))
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .path("/".to_string())
        .max_age(Duration::seconds(SESSION_TTL_SECS))
        .build()
}

/// Build the refresh cookie, valid for `max_age_secs` and scoped to `/api`.
pub fn refresh_cookie(role: Role, token: &str, max_age_secs: i64, secure: bool) -> Cookie<'static> {
    Cookie::build((refresh_cookie_name(role).to_string(), token.to_string()))
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .path("/api".to_string())
        .max_age(Duration::seconds(max_age_secs.max(0)))
        .build()
}

/// Expired twin of the session cookie.
pub fn clear_session_cookie(role: Role, secure: bool) -> Cookie<'static> {
    Cookie::build((session_cookie_name(role).to_string(), String::new()))
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .path("/".to_string())
        .max_age(Duration::ZERO)
        .build()
}

/// Expired twin of the refresh cookie (same `/api` path).
pub fn clear_refresh_cookie(role: Role, secure: bool) -> Cookie<'static> {
    Cookie::build((refresh_cookie_name(role).to_string(), String::new()))
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .path("/api".to_string())
        .max_age(Duration::ZERO)
        .build()
}
