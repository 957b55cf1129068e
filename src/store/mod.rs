//! Data source adapter.
//!
//! Everything that reads the relational stores goes through
//! [`TelemetryStore`]. The production implementation is [`MySqlStore`]; tests
//! use an in-memory store with failure injection.

use std::{fmt::Display, future::Future, time::Duration};

use async_trait::async_trait;
use chrono::NaiveDateTime;
use tracing::{error, warn};

use crate::error::StoreError;
use crate::models::{
    AccessLogEntry, ClimateReading, ElectricalReading, FireSmokeReading, Metric, SeriesPoint,
    UserRecord, Zone,
};

mod mysql;

#[cfg(test)]
pub(crate) mod memory;

pub use mysql::{connect_pool, MySqlStore};

// ---

/// Number of access log rows pushed and served.
pub const ACCESS_LOG_LIMIT: u32 = 5;

/// Read side of the telemetry and access-control stores.
///
/// All series are returned in ascending timestamp order. No method caches:
/// every call re-reads the store.
#[async_trait]
pub trait TelemetryStore: Send + Sync {
    /// Acquire and release one connection of the telemetry pool.
    async fn ping(&self) -> Result<(), StoreError>;

    /// Most recent climate row of a zone.
    async fn latest_climate(&self, zone: Zone) -> Result<Option<ClimateReading>, StoreError>;

    async fn latest_electrical(&self) -> Result<Option<ElectricalReading>, StoreError>;

    async fn latest_fire_smoke(&self) -> Result<Option<FireSmokeReading>, StoreError>;

    /// Samples of one metric with `timestamp >= since`.
    async fn climate_series(
        &self,
        zone: Zone,
        metric: Metric,
        since: NaiveDateTime,
    ) -> Result<Vec<SeriesPoint>, StoreError>;

    /// Latest sample of one metric with `timestamp <= at`.
    async fn climate_at_or_before(
        &self,
        zone: Zone,
        metric: Metric,
        at: NaiveDateTime,
    ) -> Result<Option<SeriesPoint>, StoreError>;

    /// Electrical rows with `timestamp >= since`.
    async fn electrical_series(
        &self,
        since: NaiveDateTime,
    ) -> Result<Vec<ElectricalReading>, StoreError>;

    /// Newest access events first.
    async fn recent_access_logs(&self, limit: u32) -> Result<Vec<AccessLogEntry>, StoreError>;

    async fn find_user(&self, username: &str) -> Result<Option<UserRecord>, StoreError>;
}

/// Bounded retry with a fixed backoff between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub backoff: Duration,
}

impl RetryPolicy {
    /// Per-query policy.
    pub const QUERY: RetryPolicy = RetryPolicy {
        attempts: 3,
        backoff: Duration::from_secs(1),
    };

    /// Pool establishment at startup.
    pub const CONNECT: RetryPolicy = RetryPolicy {
        attempts: 5,
        backoff: Duration::from_secs(5),
    };
}

/// Run `op` until it succeeds or `policy.attempts` is exhausted, sleeping
/// `policy.backoff` between attempts. Returns the last error.
pub async fn with_retry<T, E, F, Fut>(policy: RetryPolicy, what: &str, mut op: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    // ---
    let mut attempt = 1;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if attempt < policy.attempts => {
                warn!(
                    "{} failed (attempt {}/{}): {}; retrying in {:?}",
                    what, attempt, policy.attempts, e, policy.backoff
                );
                tokio::time::sleep(policy.backoff).await;
                attempt += 1;
            }
            Err(e) => {
                error!("{} failed after {} attempts: {}", what, attempt, e);
                return Err(e);
            }
        }
    }
}
