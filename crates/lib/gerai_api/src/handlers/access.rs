//! Public access-code redemption and guest grant status.
//!
//! A consumed code lands in exactly one store: the account grant table
//! when a user session authenticates, the signed guest cookie
//! otherwise — never both. Account redemption clears any guest cookie
//! so scopes cannot leak across accounts on a shared browser.

use axum::extract::State;
use axum::http::HeaderMap;
use axum::{Json, response::IntoResponse};
use axum_extra::extract::CookieJar;
use chrono::Utc;
use tracing::info;

use gerai_core::access::{codes, queries};
use gerai_core::models::Role;

use crate::AppState;
use crate::error::{AppError, AppResult};
use crate::middleware::auth::authenticate;
use crate::models::{AccessStatusResponse, NoteResponse, RedeemData, RedeemRequest, RedeemResponse};
use crate::services::access_cookie;

/// Minimum plausible code length; anything shorter is rejected before
/// touching storage.
const MIN_CODE_CHARS: usize = 16;

const NOTE_STORED_ACCOUNT: &str = "Kode valid & disimpan ke akun (cookie dibersihkan).";
const NOTE_STORED_COOKIE: &str = "Kode valid & disimpan di cookie (guest).";
const NOTE_CLAIMED: &str = "Akses diberikan. Silakan reload halaman produk.";

/// Cookie for a freshly redeemed code. The new grant REPLACES any
/// earlier guest cookie: carrying old scopes forward would re-sign them
/// with this code's expiry, letting a grant outlive its own code.
fn grant_cookie(
    scope: &str,
    hard_expiry: Option<chrono::DateTime<Utc>>,
    options: &access_cookie::WriteOptions,
    sign_key: &[u8],
    secure: bool,
) -> (
    axum_extra::extract::cookie::Cookie<'static>,
    chrono::DateTime<Utc>,
) {
    access_cookie::write(
        &[scope.to_string()],
        None,
        hard_expiry,
        options,
        sign_key,
        secure,
    )
}

fn required_code(body: &RedeemRequest) -> AppResult<String> {
    let code = body.code.as_deref().map(str::trim).unwrap_or_default();
    if code.len() < MIN_CODE_CHARS {
        return Err(AppError::Validation("Body invalid".into()));
    }
    Ok(code.to_string())
}

/// `POST /api/access-codes/verify` — consume a code for whoever is
/// asking: account grant for a logged-in user, guest cookie otherwise.
pub async fn verify(
    State(state): State<AppState>,
    headers: HeaderMap,
    jar: CookieJar,
    Json(body): Json<RedeemRequest>,
) -> AppResult<impl IntoResponse> {
    let plaintext = required_code(&body)?;
    let consumed =
        queries::verify_and_consume(&state.pool, &codes::hash_token(&plaintext), Utc::now())
            .await?
            .ok_or_else(|| AppError::Validation("Kode akses salah atau kadaluarsa".into()))?;

    let secure = state.config.environment.is_production();
    match authenticate(&state, &jar, &headers, Role::User, false).await {
        Ok(identity) => {
            queries::grant_scope(&state.pool, identity.user_id, &consumed.scope, consumed.expires_at)
                .await?;
            info!(
                email = %identity.email,
                scope = %consumed.scope,
                "access code redeemed into account grant"
            );
            // Drop any guest cookie: the grant now lives on the account.
            let mut jar = jar;
            for cookie in access_cookie::clear_cookies(secure) {
                jar = jar.add(cookie);
            }
            Ok((
                jar,
                Json(RedeemResponse {
                    ok: true,
                    data: RedeemData {
                        scope: consumed.scope,
                        stored_as: "account",
                        expires_at: consumed.expires_at,
                    },
                    note: NOTE_STORED_ACCOUNT,
                }),
            ))
        }
        Err(_) => {
            let (cookie, expires_at) = grant_cookie(
                &consumed.scope,
                consumed.expires_at,
                &access_cookie::WriteOptions::default(),
                &state.config.keys.access_sign_key,
                secure,
            );
            info!(scope = %consumed.scope, "access code redeemed into guest cookie");
            Ok((
                jar.add(cookie),
                Json(RedeemResponse {
                    ok: true,
                    data: RedeemData {
                        scope: consumed.scope,
                        stored_as: "cookie",
                        expires_at: Some(expires_at),
                    },
                    note: NOTE_STORED_COOKIE,
                }),
            ))
        }
    }
}

/// `POST /api/access/claim` — guest-only redemption with specific
/// pre-check messages, cookie scoped to `/api/user`.
pub async fn claim(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(body): Json<RedeemRequest>,
) -> AppResult<impl IntoResponse> {
    let plaintext = required_code(&body)?;
    let hash = codes::hash_token(&plaintext);
    let now = Utc::now();

    // Non-locking pre-lookup so the caller gets a usable reason; the
    // consume below remains the atomic authority.
    let existing = queries::find_access_code_by_hash(&state.pool, &hash).await?;
    let existing = match existing {
        Some(code) if code.enabled => code,
        _ => {
            return Err(AppError::NotFound(
                "Kode tidak ditemukan / dinonaktifkan".into(),
            ));
        }
    };
    if let Some(expires_at) = existing.expires_at
        && expires_at <= now
    {
        return Err(AppError::Validation("Kode sudah kedaluwarsa".into()));
    }
    let quota_error = || AppError::Validation("Kode sudah mencapai batas pemakaian".into());
    if let Some(max) = existing.max_uses
        && existing.used_count >= max
    {
        return Err(quota_error());
    }

    // A concurrent redeem may still win between the pre-check and here.
    let consumed = queries::verify_and_consume(&state.pool, &hash, now)
        .await?
        .ok_or_else(quota_error)?;

    let secure = state.config.environment.is_production();
    let options = access_cookie::WriteOptions {
        path: "/api/user",
        session_only: false,
    };
    let (cookie, expires_at) = grant_cookie(
        &consumed.scope,
        consumed.expires_at,
        &options,
        &state.config.keys.access_sign_key,
        secure,
    );
    info!(scope = %consumed.scope, "access code claimed by guest");

    Ok((
        jar.add(cookie),
        Json(RedeemResponse {
            ok: true,
            data: RedeemData {
                scope: consumed.scope,
                stored_as: "cookie",
                expires_at: Some(expires_at),
            },
            note: NOTE_CLAIMED,
        }),
    ))
}

/// `GET /api/access/status` — current scope entitlements: account
/// grants for a user session, cookie scopes for guests.
pub async fn status(
    State(state): State<AppState>,
    headers: HeaderMap,
    jar: CookieJar,
) -> AppResult<Json<AccessStatusResponse>> {
    let (source, scopes) = match authenticate(&state, &jar, &headers, Role::User, false).await {
        Ok(identity) => {
            let grants = queries::user_grants(&state.pool, identity.user_id, Utc::now()).await?;
            (
                "account",
                grants.into_iter().map(|g| g.scope).collect::<Vec<_>>(),
            )
        }
        Err(_) => (
            "cookie",
            access_cookie::read_scopes(&jar, &state.config.keys.access_sign_key),
        ),
    };

    Ok(Json(AccessStatusResponse {
        ok: true,
        source,
        has_access: !scopes.is_empty(),
        scopes,
    }))
}

/// `POST /api/access/clear` — drop the guest access cookie.
pub async fn clear(State(state): State<AppState>, jar: CookieJar) -> AppResult<impl IntoResponse> {
    let secure = state.config.environment.is_production();
    let mut jar = jar;
    for cookie in access_cookie::clear_cookies(secure) {
        jar = jar.add(cookie);
    }
    Ok((
        jar,
        Json(NoteResponse {
            ok: true,
            note: "Akses tamu dihapus",
        }),
    ))
}
