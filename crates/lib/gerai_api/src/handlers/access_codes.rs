//! Admin management of prepaid access codes.
//!
//! Create and rotate mint plaintext secrets and therefore sit behind
//! the feature-token guard; the rest need only the admin session.

use axum::extract::{Extension, Path, Query, State};
use axum::http::StatusCode;
use axum::{Json, response::IntoResponse};
use chrono::{DateTime, Utc};
use tracing::info;

use gerai_core::access::{codes, queries};
use gerai_core::models::AccessCode;

use crate::AppState;
use crate::error::{AppError, AppResult};
use crate::middleware::auth::Identity;
use crate::models::{
    AccessCodeResponse, AccessCodeSecretResponse, CreateAccessCodeRequest, ListAccessCodesQuery,
    ListAccessCodesResponse, UpdateAccessCodeRequest,
};

/// Minimum length of a caller-chosen plaintext.
const MIN_TOKEN_CHARS: usize = 16;
const DEFAULT_PAGE_SIZE: i64 = 20;
const MAX_PAGE_SIZE: i64 = 100;

const SHOWN_ONCE_NOTE: &str = "Simpan token ini. Token tidak akan ditampilkan lagi.";

fn scope_error() -> AppError {
    AppError::Validation(
        "Scope tidak valid. Gunakan product:*, product:<id>, atau drop:<slug>".into(),
    )
}

fn not_found() -> AppError {
    AppError::NotFound("Kode akses tidak ditemukan".into())
}

fn validated_scope(scope: &str) -> AppResult<String> {
    let scope = scope.trim().to_ascii_lowercase();
    if !codes::is_valid_scope(&scope) {
        return Err(scope_error());
    }
    Ok(scope)
}

/// Sanity bound on admin-provided expiries: reject the past.
fn validated_expiry(expires_at: Option<DateTime<Utc>>) -> AppResult<Option<DateTime<Utc>>> {
    if let Some(at) = expires_at
        && at <= Utc::now()
    {
        return Err(AppError::Validation("expiresAt sudah lewat".into()));
    }
    Ok(expires_at)
}

/// `POST /api/admin/access-codes` — feature-guarded. Returns the
/// plaintext exactly once.
pub async fn create(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Json(body): Json<CreateAccessCodeRequest>,
) -> AppResult<impl IntoResponse> {
    let scope = validated_scope(body.scope.as_deref().ok_or_else(scope_error)?)?;
    let expires_at = validated_expiry(body.expires_at)?;
    if let Some(max) = body.max_uses
        && max <= 0
    {
        return Err(AppError::Validation("maxUses harus lebih dari 0".into()));
    }

    let plaintext = match body.token {
        Some(token) => {
            let token = token.trim().to_string();
            if token.len() < MIN_TOKEN_CHARS {
                return Err(AppError::Validation(format!(
                    "Token minimal {MIN_TOKEN_CHARS} karakter"
                )));
            }
            token
        }
        None => codes::generate_token(),
    };

    let code = queries::create_access_code(
        &state.pool,
        body.label.as_deref().map(str::trim).filter(|l| !l.is_empty()),
        &scope,
        &codes::hash_token(&plaintext),
        body.max_uses,
        expires_at,
    )
    .await?;
    info!(admin = %identity.email, code_id = code.id, scope = %code.scope, "access code created");

    Ok((
        StatusCode::CREATED,
        Json(AccessCodeSecretResponse {
            ok: true,
            data: code.into(),
            access_token_plaintext: plaintext,
            note: SHOWN_ONCE_NOTE,
        }),
    ))
}

/// `GET /api/admin/access-codes?q&page&pageSize`
pub async fn list(
    State(state): State<AppState>,
    Query(query): Query<ListAccessCodesQuery>,
) -> AppResult<Json<ListAccessCodesResponse>> {
    let page = query.page.unwrap_or(1).max(1);
    let page_size = query
        .page_size
        .unwrap_or(DEFAULT_PAGE_SIZE)
        .clamp(1, MAX_PAGE_SIZE);
    let q = query.q.as_deref().map(str::trim).filter(|q| !q.is_empty());

    let (items, total) = queries::list_access_codes(&state.pool, q, page, page_size).await?;
    Ok(Json(ListAccessCodesResponse {
        ok: true,
        data: items.into_iter().map(AccessCode::into).collect(),
        page,
        page_size,
        total,
    }))
}

/// `GET /api/admin/access-codes/{id}`
pub async fn get_one(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> AppResult<Json<AccessCodeResponse>> {
    let code = queries::get_access_code(&state.pool, id)
        .await?
        .ok_or_else(not_found)?;
    Ok(Json(AccessCodeResponse {
        ok: true,
        data: code.into(),
    }))
}

/// `PATCH /api/admin/access-codes/{id}` — partial update.
pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(body): Json<UpdateAccessCodeRequest>,
) -> AppResult<Json<AccessCodeResponse>> {
    let scope = match body.scope.as_deref() {
        Some(scope) => Some(validated_scope(scope)?),
        None => None,
    };
    if let Some(Some(max)) = body.max_uses
        && max <= 0
    {
        return Err(AppError::Validation("maxUses harus lebih dari 0".into()));
    }
    // Same expiry bound as create; null still clears the field.
    let expires_at = match body.expires_at {
        Some(inner) => Some(validated_expiry(inner)?),
        None => None,
    };

    let update = queries::AccessCodeUpdate {
        label: body
            .label
            .map(|l| l.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())),
        scope,
        max_uses: body.max_uses,
        expires_at,
        enabled: body.enabled,
    };
    let code = queries::update_access_code(&state.pool, id, update)
        .await?
        .ok_or_else(not_found)?;
    Ok(Json(AccessCodeResponse {
        ok: true,
        data: code.into(),
    }))
}

/// `DELETE /api/admin/access-codes/{id}` — soft delete.
pub async fn remove(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<i64>,
) -> AppResult<Json<serde_json::Value>> {
    if !queries::soft_delete_access_code(&state.pool, id).await? {
        return Err(not_found());
    }
    info!(admin = %identity.email, code_id = id, "access code deleted");
    Ok(Json(serde_json::json!({ "ok": true })))
}

/// `POST /api/admin/access-codes/{id}/rotate` — feature-guarded. New
/// plaintext, usage counting restarts.
pub async fn rotate(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<i64>,
) -> AppResult<Json<AccessCodeSecretResponse>> {
    let plaintext = codes::generate_token();
    let code = queries::rotate_access_code_token(&state.pool, id, &codes::hash_token(&plaintext))
        .await?
        .ok_or_else(not_found)?;
    info!(admin = %identity.email, code_id = id, "access code rotated");

    Ok(Json(AccessCodeSecretResponse {
        ok: true,
        data: code.into(),
        access_token_plaintext: plaintext,
        note: SHOWN_ONCE_NOTE,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn past_expiry_rejected_on_create_and_update() {
        let past = Some(Utc::now() - Duration::minutes(1));
        assert!(validated_expiry(past).is_err());

        let future = Some(Utc::now() + Duration::days(1));
        assert_eq!(validated_expiry(future).unwrap(), future);
        assert_eq!(validated_expiry(None).unwrap(), None);
    }
}
