//! HTTP and WebSocket gateway.
//!
//! Each sibling module exports a subrouter; this gateway merges them, adds the
//! CORS and request tracing layers, and binds the shared [`AppState`].

use std::sync::Arc;

use axum::{
    extract::FromRef,
    http::{header, HeaderValue, Method},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::auth::JwtKeys;
use crate::broadcast::SessionRegistry;
use crate::history::{HistoryService, LocalClock};
use crate::store::TelemetryStore;
use crate::Config;

mod access_logs;
mod export;
mod health;
mod login;
mod socket;

// ---

/// State shared by every handler.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn TelemetryStore>,
    pub history: HistoryService,
    pub sessions: SessionRegistry,
    pub keys: JwtKeys,
    pub config: Config,
}

impl AppState {
    // ---
    pub fn new(store: Arc<dyn TelemetryStore>, sessions: SessionRegistry, config: Config) -> Self {
        let history = HistoryService::new(store.clone(), LocalClock::new(config.tz_offset));
        let keys = JwtKeys::new(&config.jwt_secret);
        Self {
            store,
            history,
            sessions,
            keys,
            config,
        }
    }

    /// Replace the clock historical queries resolve ranges against.
    pub fn with_clock(mut self, clock: LocalClock) -> Self {
        self.history = HistoryService::new(self.store.clone(), clock);
        self
    }
}

impl FromRef<AppState> for JwtKeys {
    fn from_ref(state: &AppState) -> Self {
        state.keys.clone()
    }
}

pub fn router(state: AppState) -> Router {
    // ---
    let cors = cors_layer(&state.config.cors_origin);

    Router::new()
        .merge(health::router())
        .merge(login::router())
        .merge(export::router())
        .merge(access_logs::router())
        .merge(socket::router())
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn cors_layer(origin: &str) -> CorsLayer {
    // ---
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            header::CACHE_CONTROL,
            header::ACCEPT,
        ])
        .allow_credentials(true);

    match HeaderValue::from_str(origin) {
        Ok(origin) => layer.allow_origin(origin),
        Err(e) => {
            tracing::warn!("Ignoring invalid CORS_ORIGIN {:?}: {}", origin, e);
            layer
        }
    }
}


#[cfg(test)]
mod tests {
    // ---
    use super::test_support::*;
    use super::*;
    use axum::{body::Body, http::Request, http::StatusCode};

    use crate::store::memory::MemoryStore;

    #[tokio::test]
    async fn test_cors_preflight_allows_configured_origin() {
        // ---
        let state = state(Arc::new(MemoryStore::new()));
        let request = Request::builder()
            .method(Method::OPTIONS)
            .uri("/api/access-logs")
            .header(header::ORIGIN, "http://localhost:5173")
            .header(header::ACCESS_CONTROL_REQUEST_METHOD, "GET")
            .header(header::ACCESS_CONTROL_REQUEST_HEADERS, "authorization")
            .body(Body::empty())
            .unwrap();

        let response = send(state, request).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
            "http://localhost:5173"
        );
        assert_eq!(
            response.headers()[header::ACCESS_CONTROL_ALLOW_CREDENTIALS],
            "true"
        );
    }

    #[tokio::test]
    async fn test_unknown_path_is_404() {
        // ---
        let state = state(Arc::new(MemoryStore::new()));
        let request = Request::builder()
            .uri("/sql/readings")
            .body(Body::empty())
            .unwrap();
        assert_eq!(send(state, request).await.status(), StatusCode::NOT_FOUND);
    }
}
