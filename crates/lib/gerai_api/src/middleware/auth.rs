//! Authorization guards.
//!
//! One parameterized resolver establishes trust per request; the role
//! variants are thin axum middleware wrappers around it. Downstream
//! handlers read the injected [`Identity`] and never re-validate.

use axum::extract::{Request, State};
use axum::http::HeaderMap;
use axum::http::header::AUTHORIZATION;
use axum::middleware::Next;
use axum::response::Response;
use axum_extra::extract::CookieJar;
use chrono::Utc;

use gerai_core::auth::{access_token, crypto, queries, session};
use gerai_core::models::Role;

use crate::AppState;
use crate::error::AppError;
use crate::services::cookies;

/// Authenticated request identity, injected into request extensions.
#[derive(Debug, Clone)]
pub struct Identity {
    pub user_id: i64,
    pub email: String,
    pub role: Role,
}

/// Resolve a request into an [`Identity`] for the given role namespace.
///
/// Verifies the role's session cookie, confirms the account still
/// exists with that role, and — for feature-gated routes — checks the
/// presented bearer token against its stored hash. Token failures all
/// surface as the generic 401; only the feature-token steps carry
/// distinct messages, since reaching them already proves a valid
/// session.
pub async fn authenticate(
    state: &AppState,
    jar: &CookieJar,
    headers: &HeaderMap,
    role: Role,
    require_feature_token: bool,
) -> Result<Identity, AppError> {
    let cookie = jar
        .get(cookies::session_cookie_name(role))
        .ok_or_else(AppError::unauthorized)?;
    let claims = session::verify(cookie.value(), role, &state.config.keys)
        .ok_or_else(AppError::unauthorized)?;

    // Header presence is checked before any storage round trip.
    let presented = if require_feature_token {
        Some(bearer_token(headers).ok_or_else(|| {
            AppError::Unauthorized("Access token kosong".into())
        })?)
    } else {
        None
    };

    let user = queries::find_user_by_email(&state.pool, &claims.sub)
        .await?
        .ok_or_else(AppError::unauthorized)?;
    if user.role != role {
        // Structurally valid token referencing a demoted or deleted
        // account.
        return Err(AppError::unauthorized());
    }

    if let Some(token) = presented {
        let record = queries::access_token_record(&state.pool, user.id, role)
            .await?
            .ok_or_else(|| AppError::Unauthorized("Access token tidak ditemukan".into()))?;
        if record.expires_at <= Utc::now() {
            return Err(AppError::Unauthorized("Access token kadaluarsa".into()));
        }
        if !crypto::safe_eq_hex(&access_token::hash_token(&token), &record.token_hash) {
            return Err(AppError::Unauthorized("Access token salah".into()));
        }
    }

    Ok(Identity {
        user_id: user.id,
        email: user.email,
        role,
    })
}

/// Extract the bearer access token from `x-admin-access-token` or
/// `Authorization: Bearer`.
fn bearer_token(headers: &HeaderMap) -> Option<String> {
    if let Some(value) = headers
        .get("x-admin-access-token")
        .and_then(|v| v.to_str().ok())
    {
        let trimmed = value.trim();
        if !trimmed.is_empty() {
            return Some(trimmed.to_string());
        }
    }
    headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
}

async fn guard(
    state: AppState,
    mut request: Request,
    next: Next,
    role: Role,
    require_feature_token: bool,
) -> Result<Response, AppError> {
    let jar = CookieJar::from_headers(request.headers());
    let identity =
        authenticate(&state, &jar, request.headers(), role, require_feature_token).await?;
    request.extensions_mut().insert(identity);
    Ok(next.run(request).await)
}

/// Axum middleware: admin session required.
pub async fn require_admin(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    guard(state, request, next, Role::Admin, false).await
}

/// Axum middleware: user session required.
pub async fn require_user(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    guard(state, request, next, Role::User, false).await
}

/// Axum middleware: admin session plus a valid bearer access token.
pub async fn require_admin_feature(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    guard(state, request, next, Role::Admin, true).await
}
