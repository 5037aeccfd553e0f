//! Health probe.

use axum::Json;
use axum::extract::State;

use crate::AppState;
use crate::error::AppResult;
use crate::models::HealthResponse;

/// `GET /api/health` — liveness plus database reachability.
pub async fn health(State(state): State<AppState>) -> AppResult<Json<HealthResponse>> {
    let db_connected = sqlx::query("SELECT 1").execute(&state.pool).await.is_ok();
    Ok(Json(HealthResponse {
        ok: true,
        version: gerai_core::version(),
        db_connected,
    }))
}
