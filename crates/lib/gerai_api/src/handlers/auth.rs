//! Authentication request handlers.
//!
//! Login and refresh set the session and refresh cookies and return the
//! plaintext bearer token in the body (shown once). The refresh token
//! itself only ever travels as an httpOnly cookie.

use axum::extract::{Extension, State};
use axum::http::{HeaderMap, StatusCode};
use axum::{Json, response::IntoResponse};
use axum_extra::extract::CookieJar;
use tracing::info;

use gerai_core::auth::queries::{self, normalize_email};
use gerai_core::auth::{password, session};
use gerai_core::models::Role;

use crate::AppState;
use crate::error::{AppError, AppResult};
use crate::middleware::auth::{Identity, authenticate};
use crate::models::{
    CredentialsRequest, LogoutResponse, MeResponse, RegisterResponse, SetupResponse,
    TokenIssueResponse,
};
use crate::services::{auth as auth_service, cookies, setup};

/// Pull (email, password) out of a credentials body or answer 400.
fn required_credentials(body: &CredentialsRequest) -> AppResult<(String, String)> {
    match (&body.email, &body.password) {
        (Some(email), Some(pw)) if !email.trim().is_empty() && !pw.is_empty() => {
            Ok((email.trim().to_string(), pw.clone()))
        }
        _ => Err(AppError::Validation("Email & password wajib".into())),
    }
}

fn token_response(
    role: Role,
    email: Option<String>,
    tokens: &auth_service::IssuedTokens,
) -> TokenIssueResponse {
    let (admin_access_token, user_access_token) = match role {
        Role::Admin => (Some(tokens.access_token.clone()), None),
        Role::User => (None, Some(tokens.access_token.clone())),
    };
    TokenIssueResponse {
        ok: true,
        role: role.as_str(),
        email,
        admin_access_token,
        user_access_token,
        access_expires_at: tokens.access_expires_at,
        refresh_expires_at: tokens.refresh_expires_at,
    }
}

async fn login(
    state: AppState,
    jar: CookieJar,
    role: Role,
    body: CredentialsRequest,
) -> AppResult<impl IntoResponse> {
    let (email, password_plain) = required_credentials(&body)?;
    let (user, tokens) =
        auth_service::login(&state.pool, &state.config.keys, role, &email, &password_plain).await?;

    let secure = state.config.environment.is_production();
    let session_token = session::issue(role, &user.email, &state.config.keys)?;
    let refresh_max_age = (tokens.refresh_expires_at - chrono::Utc::now()).num_seconds();
    let jar = jar
        .add(cookies::session_cookie(role, &session_token, secure))
        .add(cookies::refresh_cookie(
            role,
            &tokens.refresh_token,
            refresh_max_age,
            secure,
        ));

    let response = token_response(role, Some(user.email), &tokens);
    Ok((jar, Json(response)))
}

/// `POST /api/auth/admin/login`
pub async fn admin_login(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(body): Json<CredentialsRequest>,
) -> AppResult<impl IntoResponse> {
    login(state, jar, Role::Admin, body).await
}

/// `POST /api/auth/user/login`
pub async fn user_login(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(body): Json<CredentialsRequest>,
) -> AppResult<impl IntoResponse> {
    login(state, jar, Role::User, body).await
}

/// `POST /api/auth/user/register` — create a user account. No cookies,
/// no tokens: the new account logs in afterwards.
pub async fn user_register(
    State(state): State<AppState>,
    Json(body): Json<CredentialsRequest>,
) -> AppResult<impl IntoResponse> {
    let (email, password_plain) = required_credentials(&body)?;
    if queries::find_user_by_email(&state.pool, &email).await?.is_some() {
        return Err(AppError::Conflict("Email sudah terdaftar".into()));
    }

    let hash = password::hash_password(&password_plain)?;
    let id = queries::create_user(&state.pool, &email, &hash).await?;
    info!(email = %normalize_email(&email), "user registered");

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            ok: true,
            role: Role::User.as_str(),
            email: normalize_email(&email),
            id,
        }),
    ))
}

/// `POST /api/auth/admin/register` — one-time bootstrap of the sole
/// admin account, behind the setup gate.
pub async fn admin_register(
    State(state): State<AppState>,
    headers: HeaderMap,
    jar: CookieJar,
    Json(body): Json<CredentialsRequest>,
) -> AppResult<impl IntoResponse> {
    setup::guard(&state, &headers).await?;

    let (email, password_plain) = required_credentials(&body)?;
    // The gate verified all three secrets exist.
    let allowed_email = state
        .config
        .setup
        .admin_email
        .clone()
        .ok_or_else(|| AppError::ServerConfig("Server env setup belum lengkap".into()))?;

    if queries::count_admins(&state.pool).await? > 0 {
        return Err(AppError::Forbidden(
            "Admin sudah ada. Nggak bisa nambah lagi.".into(),
        ));
    }
    if normalize_email(&email) != normalize_email(&allowed_email) {
        return Err(AppError::Forbidden("Email tidak diizinkan jadi admin".into()));
    }
    if queries::find_user_by_email(&state.pool, &email).await?.is_some() {
        return Err(AppError::Conflict("Email sudah terdaftar".into()));
    }

    let hash = password::hash_password(&password_plain)?;
    // The one_admin_only index settles concurrent bootstrap races; the
    // loser surfaces as AdminExists (403).
    let id = queries::create_admin(&state.pool, &email, &hash).await?;

    let (access_token, expires_at) = auth_service::issue_access_token(
        &state.pool,
        &state.config.keys,
        id,
        &normalize_email(&email),
        Role::Admin,
    )
    .await?;
    queries::set_setting(&state.pool, setup::SETUP_DONE_KEY, "1").await?;
    info!(email = %normalize_email(&email), "admin account created, setup closed");

    let secure = state.config.environment.is_production();
    let session_token = session::issue(Role::Admin, &normalize_email(&email), &state.config.keys)?;
    let jar = jar.add(cookies::session_cookie(Role::Admin, &session_token, secure));

    Ok((
        StatusCode::CREATED,
        jar,
        Json(SetupResponse {
            ok: true,
            role: Role::Admin.as_str(),
            email: normalize_email(&email),
            admin_access_token: access_token,
            expires_at,
        }),
    ))
}

async fn refresh(
    state: AppState,
    jar: CookieJar,
    identity: Identity,
) -> AppResult<impl IntoResponse> {
    let presented = jar
        .get(cookies::refresh_cookie_name(identity.role))
        .map(|c| c.value().to_string())
        .ok_or_else(|| AppError::Unauthorized("No refresh token".into()))?;

    let tokens =
        auth_service::refresh(&state.pool, &state.config.keys, &identity, &presented).await?;

    let secure = state.config.environment.is_production();
    let refresh_max_age = (tokens.refresh_expires_at - chrono::Utc::now()).num_seconds();
    let jar = jar.add(cookies::refresh_cookie(
        identity.role,
        &tokens.refresh_token,
        refresh_max_age,
        secure,
    ));

    let response = token_response(identity.role, None, &tokens);
    Ok((jar, Json(response)))
}

/// `POST /api/auth/admin/token/refresh` — admin session required.
pub async fn admin_refresh(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    jar: CookieJar,
) -> AppResult<impl IntoResponse> {
    refresh(state, jar, identity).await
}

/// `POST /api/auth/user/token/refresh` — user session required.
pub async fn user_refresh(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    jar: CookieJar,
) -> AppResult<impl IntoResponse> {
    refresh(state, jar, identity).await
}

async fn logout(
    state: AppState,
    jar: CookieJar,
    role: Role,
    message: Option<&'static str>,
) -> AppResult<impl IntoResponse> {
    let presented = jar
        .get(cookies::refresh_cookie_name(role))
        .map(|c| c.value().to_string());
    auth_service::logout(&state.pool, role, presented.as_deref()).await?;

    let secure = state.config.environment.is_production();
    let jar = jar
        .add(cookies::clear_session_cookie(role, secure))
        .add(cookies::clear_refresh_cookie(role, secure));

    Ok((jar, Json(LogoutResponse { ok: true, message })))
}

/// `POST /api/auth/admin/logout` — revokes the refresh cookie's token
/// and clears both cookies. Works without a live session.
pub async fn admin_logout(
    State(state): State<AppState>,
    jar: CookieJar,
) -> AppResult<impl IntoResponse> {
    logout(state, jar, Role::Admin, Some("Admin logged out")).await
}

/// `POST /api/auth/user/logout`
pub async fn user_logout(
    State(state): State<AppState>,
    jar: CookieJar,
) -> AppResult<impl IntoResponse> {
    logout(state, jar, Role::User, None).await
}

async fn me_response(state: &AppState, identity: Identity) -> AppResult<Json<MeResponse>> {
    let access = queries::access_token_record(&state.pool, identity.user_id, identity.role).await?;
    let refresh = queries::refresh_token_record(&state.pool, identity.user_id, identity.role).await?;

    Ok(Json(MeResponse {
        ok: true,
        role: identity.role.as_str(),
        id: identity.user_id,
        email: identity.email,
        access_expires_at: access.map(|r| r.expires_at),
        refresh_expires_at: refresh
            .filter(|r| r.revoked_at.is_none())
            .map(|r| r.expires_at),
    }))
}

/// `GET /api/auth/me` and `GET /api/auth/admin/me` — whoever the
/// cookies authenticate, user first.
pub async fn me(
    State(state): State<AppState>,
    headers: HeaderMap,
    jar: CookieJar,
) -> AppResult<Json<MeResponse>> {
    let identity = match authenticate(&state, &jar, &headers, Role::User, false).await {
        Ok(identity) => identity,
        Err(_) => authenticate(&state, &jar, &headers, Role::Admin, false)
            .await
            .map_err(|_| AppError::unauthorized())?,
    };
    me_response(&state, identity).await
}

/// `GET /api/auth/user/me` — user session only.
pub async fn user_me(
    State(state): State<AppState>,
    headers: HeaderMap,
    jar: CookieJar,
) -> AppResult<Json<MeResponse>> {
    let identity = authenticate(&state, &jar, &headers, Role::User, false)
        .await
        .map_err(|_| AppError::unauthorized())?;
    me_response(&state, identity).await
}
