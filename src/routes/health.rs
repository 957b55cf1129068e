// src/routes/health.rs
//! Liveness endpoints for the monitor backend.
//!
//! This module defines `GET /` (a plain-text banner) and `GET /api/health`,
//! used by load balancers and the dashboard to check that the service is up
//! and can reach the telemetry store. It follows the Explicit Module Boundary
//! Pattern (EMBP):
//! - Internal to this file: endpoint handlers and the response type
//! - Exports to the gateway (`mod.rs`): a subrouter containing both routes

use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;

use super::AppState;

/// JSON response body for `/api/health`.
#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    database: &'static str,
    ssl: bool,
}

async fn banner() -> &'static str {
    "NOC Monitoring Backend is running"
}

/// Handle `GET /api/health`.
///
/// Always answers `200`; the `database` field reflects whether one connection
/// of the telemetry pool could be acquired.
async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    // ---
    let database = match state.store.ping().await {
        Ok(()) => "connected",
        Err(e) => {
            tracing::error!("Database connection error: {}", e);
            "disconnected"
        }
    };

    Json(HealthResponse {
        status: "ok",
        database,
        ssl: state.config.ssl_enabled,
    })
}

/// Create a subrouter containing `/` and `/api/health`.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(banner))
        .route("/api/health", get(health))
}

#[cfg(test)]
mod tests {
    // ---
    use std::sync::Arc;

    use axum::{body::Body, http::Request, http::StatusCode};
    use serde_json::json;

    use crate::routes::test_support::*;
    use crate::store::memory::MemoryStore;

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn test_health_reports_connected_store() {
        // ---
        let response = send(state(Arc::new(MemoryStore::new())), get("/api/health")).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            body_json(response).await,
            json!({ "status": "ok", "database": "connected", "ssl": false })
        );
    }

    #[tokio::test]
    async fn test_health_reports_disconnected_store() {
        // ---
        let store = Arc::new(MemoryStore::new());
        store.fail("ping");

        let response = send(state(store), get("/api/health")).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["database"], "disconnected");
    }

    #[tokio::test]
    async fn test_banner() {
        // ---
        let response = send(state(Arc::new(MemoryStore::new())), get("/")).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            body_bytes(response).await,
            b"NOC Monitoring Backend is running".to_vec()
        );
    }
}
