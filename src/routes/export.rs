//! `GET /api/export/{type}?timeRange=`: CSV download of a historical window.

use axum::{
    extract::{Path, Query, State},
    http::header,
    response::IntoResponse,
    routing::get,
    Router,
};
use serde::Deserialize;

use super::AppState;
use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::export::ExportKind;
use crate::history::TimeRange;

// ---

#[derive(Debug, Deserialize)]
pub struct ExportQuery {
    #[serde(rename = "timeRange")]
    time_range: Option<String>,
}

pub fn router() -> Router<AppState> {
    Router::new().route("/api/export/{kind}", get(handler))
}

async fn handler(
    AuthUser(claims): AuthUser,
    State(state): State<AppState>,
    Path(kind): Path<String>,
    Query(query): Query<ExportQuery>,
) -> Result<impl IntoResponse, ApiError> {
    // ---
    let kind: ExportKind = kind.parse().map_err(ApiError::UnsupportedExport)?;
    let range = TimeRange::from_token(query.time_range.as_deref());
    tracing::info!(
        "GET /api/export/{} ({}) requested by {}",
        kind.name(),
        range.token(),
        claims.username
    );

    let file = state
        .history
        .export(kind, range)
        .await
        .map_err(ApiError::Export)?;

    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename={}", file.filename),
            ),
        ],
        file.body,
    ))
}
