//! Smoke tests against a running server.
//!
//! Start the backend, then run with `cargo test -- --ignored`. `BASE_URL`
//! defaults to `http://localhost:3000`; `NOC_USERNAME` and `NOC_PASSWORD`
//! must name a user in the telemetry store's `users` table.

use anyhow::Result;
use reqwest::{Client, StatusCode};
use serde_json::Value;

use noc_monitor::client::ApiClient;
use noc_monitor::export::ExportKind;
use noc_monitor::history::TimeRange;

fn base_url() -> String {
    std::env::var("BASE_URL").unwrap_or_else(|_| "http://localhost:3000".into())
}

async fn logged_in() -> Result<ApiClient> {
    // ---
    let username = std::env::var("NOC_USERNAME")?;
    let password = std::env::var("NOC_PASSWORD")?;

    let mut client = ApiClient::new(base_url())?;
    client.login(&username, &password).await?;
    Ok(client)
}

#[tokio::test]
#[ignore = "needs a running server"]
async fn health_reports_database() -> Result<()> {
    // ---
    let client = ApiClient::new(base_url())?;
    let health = client.health().await?;

    assert_eq!(health.status, "ok");
    assert!(
        health.database == "connected" || health.database == "disconnected",
        "unexpected database state: {}",
        health.database
    );
    Ok(())
}

#[tokio::test]
#[ignore = "needs a running server"]
async fn protected_routes_reject_anonymous() -> Result<()> {
    // ---
    let http = Client::new();
    let url = format!("{}/api/access-logs", base_url());

    let response = http.get(&url).send().await?;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body: Value = response.json().await?;
    assert_eq!(body["message"], "No token provided");

    let response = http.get(&url).bearer_auth("not-a-token").send().await?;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    Ok(())
}

#[tokio::test]
#[ignore = "needs a running server and NOC_USERNAME/NOC_PASSWORD"]
async fn access_logs_are_newest_first() -> Result<()> {
    // ---
    let mut client = logged_in().await?;
    let logs = client.access_logs().await?;

    assert!(logs.len() <= 5, "got {} rows", logs.len());
    for pair in logs.windows(2) {
        assert!(pair[0].access_time >= pair[1].access_time, "rows out of order");
    }
    Ok(())
}

#[tokio::test]
#[ignore = "needs a running server and NOC_USERNAME/NOC_PASSWORD"]
async fn exports_have_expected_headers() -> Result<()> {
    // ---
    let mut client = logged_in().await?;

    let temperature = client
        .export_csv(ExportKind::Temperature, TimeRange::Day)
        .await?;
    assert!(temperature.filename.starts_with("temperature_data_24h_"));
    assert!(temperature
        .body
        .starts_with("Timestamp,NOC Temperature (°C),UPS Temperature (°C)"));

    let electrical = client
        .export_csv(ExportKind::Electrical, TimeRange::Week)
        .await?;
    assert!(electrical.filename.starts_with("electrical_data_7d_"));
    assert!(electrical.body.starts_with("Timestamp,Phase R (V)"));
    Ok(())
}
