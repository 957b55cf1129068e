//! `POST /api/login`: exchange credentials for a bearer token.

use axum::{extract::State, routing::post, Json, Router};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::AppState;
use crate::auth::verify_password;
use crate::error::ApiError;

// ---

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
}

pub fn router() -> Router<AppState> {
    Router::new().route("/api/login", post(handler))
}

async fn handler(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    // ---
    let user = state
        .store
        .find_user(&request.username)
        .await
        .map_err(|e| ApiError::Internal(format!("login lookup failed: {}", e)))?;

    let Some(user) = user else {
        warn!("Login rejected for unknown user {:?}", request.username);
        return Err(ApiError::InvalidCredentials);
    };

    // Hash verification is CPU-bound.
    let stored_hash = user.password_hash.clone();
    let password = request.password;
    let valid = tokio::task::spawn_blocking(move || verify_password(&stored_hash, &password))
        .await
        .map_err(|e| ApiError::Internal(format!("password check panicked: {}", e)))?;

    if !valid {
        warn!("Login rejected for {:?}: wrong password", user.username);
        return Err(ApiError::InvalidCredentials);
    }

    let token = state.keys.issue(user.id, &user.username)?;
    info!("User {} logged in", user.username);
    Ok(Json(LoginResponse { token }))
}
