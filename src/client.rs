//! Typed HTTP client for the monitor's REST surface.
//!
//! The bearer token lives in an explicit [`AuthSession`] owned by the client.
//! A `401` from a protected endpoint clears it, and the caller sees
//! [`ClientError::SessionExpired`] and must log in again.

use std::time::Duration;

use reqwest::{header::CONTENT_DISPOSITION, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;

use crate::export::{ExportFile, ExportKind};
use crate::history::TimeRange;
use crate::models::AccessLogEntry;

// ---

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("not logged in")]
    NotAuthenticated,

    #[error("invalid username or password")]
    InvalidCredentials,

    #[error("session expired, log in again")]
    SessionExpired,

    #[error("request rejected ({status}): {body}")]
    Rejected { status: StatusCode, body: String },

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Holder of the current bearer token.
#[derive(Debug, Clone, Default)]
pub struct AuthSession {
    token: Option<String>,
}

impl AuthSession {
    // ---
    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    pub fn is_authenticated(&self) -> bool {
        self.token.is_some()
    }

    pub fn set(&mut self, token: impl Into<String>) {
        self.token = Some(token.into());
    }

    pub fn clear(&mut self) {
        self.token = None;
    }
}

/// Body of `GET /api/health`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    pub database: String,
    pub ssl: bool,
}

#[derive(Deserialize)]
struct TokenResponse {
    token: String,
}

pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    session: AuthSession,
}

impl ApiClient {
    // ---
    pub fn new(base_url: impl Into<String>) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            session: AuthSession::default(),
        })
    }

    pub fn session(&self) -> &AuthSession {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut AuthSession {
        &mut self.session
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Exchange credentials for a token and keep it in the session.
    pub async fn login(&mut self, username: &str, password: &str) -> Result<(), ClientError> {
        // ---
        let response = self
            .http
            .post(self.url("/api/login"))
            .json(&json!({ "username": username, "password": password }))
            .send()
            .await?;

        if response.status() == StatusCode::UNAUTHORIZED {
            self.session.clear();
            return Err(ClientError::InvalidCredentials);
        }
        let body: TokenResponse = check(response).await?.json().await?;
        self.session.set(body.token);
        tracing::debug!("Logged in as {}", username);
        Ok(())
    }

    pub fn logout(&mut self) {
        self.session.clear();
    }

    pub async fn health(&self) -> Result<HealthStatus, ClientError> {
        let response = self.http.get(self.url("/api/health")).send().await?;
        Ok(check(response).await?.json().await?)
    }

    pub async fn access_logs(&mut self) -> Result<Vec<AccessLogEntry>, ClientError> {
        let request = self.http.get(self.url("/api/access-logs"));
        let response = self.authorized(request).await?;
        Ok(response.json().await?)
    }

    /// Download a CSV export. The file name comes from `Content-Disposition`.
    pub async fn export_csv(
        &mut self,
        kind: ExportKind,
        range: TimeRange,
    ) -> Result<ExportFile, ClientError> {
        // ---
        let request = self
            .http
            .get(self.url(&format!("/api/export/{}", kind.name())))
            .query(&[("timeRange", range.token())]);
        let response = self.authorized(request).await?;

        let filename = response
            .headers()
            .get(CONTENT_DISPOSITION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.split("filename=").nth(1))
            .map(|name| name.trim_matches('"').to_string())
            .unwrap_or_else(|| format!("{}_data_{}.csv", kind.name(), range.token()));
        let body = response.text().await?;

        Ok(ExportFile { filename, body })
    }

    /// Send a request with the session's token. A 401 ends the session.
    async fn authorized(&mut self, request: RequestBuilder) -> Result<Response, ClientError> {
        // ---
        let token = self.session.token().ok_or(ClientError::NotAuthenticated)?;
        let response = request.bearer_auth(token).send().await?;

        if response.status() == StatusCode::UNAUTHORIZED {
            tracing::warn!("Session rejected by server, clearing token");
            self.session.clear();
            return Err(ClientError::SessionExpired);
        }
        check(response).await
    }
}

/// Turn a non-success response into [`ClientError::Rejected`].
async fn check(response: Response) -> Result<Response, ClientError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(ClientError::Rejected { status, body })
}
