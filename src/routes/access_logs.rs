//! `GET /api/access-logs`: the newest door access events.

use axum::{extract::State, routing::get, Json, Router};

use super::AppState;
use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::models::AccessLogEntry;
use crate::store::ACCESS_LOG_LIMIT;

// ---

pub fn router() -> Router<AppState> {
    Router::new().route("/api/access-logs", get(handler))
}

async fn handler(
    _user: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<AccessLogEntry>>, ApiError> {
    // ---
    let rows = state
        .store
        .recent_access_logs(ACCESS_LOG_LIMIT)
        .await
        .map_err(ApiError::AccessLogs)?;
    tracing::debug!("GET /api/access-logs returning {} rows", rows.len());
    Ok(Json(rows))
}
