//! MySQL implementation of the data source adapter.
//!
//! Two explicit pool handles are built once at startup and injected here: the
//! telemetry store and the access-control store. Each query borrows a
//! connection from its pool for the duration of the call only.

use async_trait::async_trait;
use chrono::NaiveDateTime;
use sqlx::{mysql::MySqlPoolOptions, Connection, MySqlPool};

use super::{with_retry, RetryPolicy, TelemetryStore};
use crate::config::mask_db_url;
use crate::error::StoreError;
use crate::models::{
    AccessLogEntry, ClimateReading, ElectricalReading, FireSmokeReading, Metric, SeriesPoint,
    UserRecord, Zone,
};

const ELECTRICAL_TABLE: &str = "listrik_noc";
const FIRE_SMOKE_TABLE: &str = "api_asap_data";

/// Reading columns of `listrik_noc`, decoded as `f64`.
const ELECTRICAL_READINGS: [&str; 7] = [
    "phase_r",
    "phase_s",
    "phase_t",
    "power_3ph",
    "frequency_3ph",
    "pf_3ph",
    "energy_3ph",
];

const ACCESS_LOGS_SQL: &str = r#"
    SELECT
        al.access_time,
        al.access_granted,
        u.username,
        d.door_name
    FROM access_logs al
    LEFT JOIN users u ON al.user_id = u.user_id
    LEFT JOIN doors d ON al.door_id = d.door_id
    ORDER BY al.access_time DESC
    LIMIT ?
"#;

// ---

/// Select `column` as DOUBLE under its own name. Reading columns may be
/// DECIMAL in deployed stores, which `f64` does not decode.
fn as_double(column: &str) -> String {
    format!("CAST({0} AS DOUBLE) AS {0}", column)
}

fn latest_climate_sql(zone: Zone) -> String {
    format!(
        "SELECT {}, {}, waktu FROM {} ORDER BY id DESC LIMIT 1",
        as_double("suhu"),
        as_double("kelembapan"),
        zone.table()
    )
}

fn electrical_columns() -> String {
    let readings: Vec<String> = ELECTRICAL_READINGS.iter().map(|c| as_double(c)).collect();
    format!("id, {}, waktu", readings.join(", "))
}

fn climate_series_sql(zone: Zone, metric: Metric) -> String {
    format!(
        "SELECT waktu AS timestamp, CAST({} AS DOUBLE) AS value FROM {} \
         WHERE waktu >= ? ORDER BY waktu ASC",
        metric.column(),
        zone.table()
    )
}

fn climate_seed_sql(zone: Zone, metric: Metric) -> String {
    format!(
        "SELECT waktu AS timestamp, CAST({} AS DOUBLE) AS value FROM {} \
         WHERE waktu <= ? ORDER BY waktu DESC LIMIT 1",
        metric.column(),
        zone.table()
    )
}

/// Establish a pool, retrying per `policy`.
///
/// `connect` opens one connection eagerly, so a returned pool has been proven
/// reachable at least once.
pub async fn connect_pool(
    url: &str,
    max_connections: u32,
    policy: RetryPolicy,
) -> Result<MySqlPool, StoreError> {
    // ---
    let target = mask_db_url(url);
    tracing::info!("Attempting to connect to database: {}", target);

    let pool = with_retry(policy, "database connection", move || {
        MySqlPoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
    })
    .await
    .map_err(|source| StoreError::Connect {
        target: target.clone(),
        attempts: policy.attempts,
        source,
    })?;

    tracing::info!("Successfully connected to database: {}", target);
    Ok(pool)
}

/// Telemetry and access-control stores backed by MySQL pools.
#[derive(Debug, Clone)]
pub struct MySqlStore {
    main: MySqlPool,
    access: MySqlPool,
    retry: RetryPolicy,
}

impl MySqlStore {
    // ---
    pub fn new(main: MySqlPool, access: MySqlPool) -> Self {
        Self {
            main,
            access,
            retry: RetryPolicy::QUERY,
        }
    }

    /// Build both pools from configuration. Fails only after every
    /// connection attempt is exhausted.
    pub async fn connect(cfg: &crate::Config) -> Result<Self, StoreError> {
        // ---
        let main = connect_pool(&cfg.db_url, cfg.db_pool_max, RetryPolicy::CONNECT).await?;
        let access =
            connect_pool(&cfg.access_db_url, cfg.access_db_pool_max, RetryPolicy::CONNECT).await?;
        Ok(Self::new(main, access))
    }

    pub fn main_pool(&self) -> &MySqlPool {
        &self.main
    }

    pub fn access_pool(&self) -> &MySqlPool {
        &self.access
    }
}

#[async_trait]
impl TelemetryStore for MySqlStore {
    // ---
    async fn ping(&self) -> Result<(), StoreError> {
        // Health checks answer fast, so no retry here.
        let mut conn = self.main.acquire().await?;
        conn.ping().await?;
        Ok(())
    }

    async fn latest_climate(&self, zone: Zone) -> Result<Option<ClimateReading>, StoreError> {
        // ---
        let sql = latest_climate_sql(zone);
        let sql = sql.as_str();
        let pool = &self.main;

        let row = with_retry(self.retry, zone.table(), move || {
            sqlx::query_as::<_, ClimateReading>(sql).fetch_optional(pool)
        })
        .await?;
        Ok(row)
    }

    async fn latest_electrical(&self) -> Result<Option<ElectricalReading>, StoreError> {
        // ---
        let sql = format!(
            "SELECT {} FROM {} ORDER BY id DESC LIMIT 1",
            electrical_columns(),
            ELECTRICAL_TABLE
        );
        let sql = sql.as_str();
        let pool = &self.main;

        let row = with_retry(self.retry, ELECTRICAL_TABLE, move || {
            sqlx::query_as::<_, ElectricalReading>(sql).fetch_optional(pool)
        })
        .await?;
        Ok(row)
    }

    async fn latest_fire_smoke(&self) -> Result<Option<FireSmokeReading>, StoreError> {
        // ---
        let sql = format!(
            "SELECT id, api_value, asap_value, waktu FROM {} ORDER BY id DESC LIMIT 1",
            FIRE_SMOKE_TABLE
        );
        let sql = sql.as_str();
        let pool = &self.main;

        let row = with_retry(self.retry, FIRE_SMOKE_TABLE, move || {
            sqlx::query_as::<_, FireSmokeReading>(sql).fetch_optional(pool)
        })
        .await?;
        Ok(row)
    }

    async fn climate_series(
        &self,
        zone: Zone,
        metric: Metric,
        since: NaiveDateTime,
    ) -> Result<Vec<SeriesPoint>, StoreError> {
        // ---
        let sql = climate_series_sql(zone, metric);
        let sql = sql.as_str();
        let pool = &self.main;
        let what = format!("{} {} series", zone.table(), metric.name());

        let rows = with_retry(self.retry, &what, move || {
            sqlx::query_as::<_, SeriesPoint>(sql)
                .bind(since)
                .fetch_all(pool)
        })
        .await?;
        Ok(rows)
    }

    async fn climate_at_or_before(
        &self,
        zone: Zone,
        metric: Metric,
        at: NaiveDateTime,
    ) -> Result<Option<SeriesPoint>, StoreError> {
        // ---
        let sql = climate_seed_sql(zone, metric);
        let sql = sql.as_str();
        let pool = &self.main;
        let what = format!("{} {} seed", zone.table(), metric.name());

        let row = with_retry(self.retry, &what, move || {
            sqlx::query_as::<_, SeriesPoint>(sql)
                .bind(at)
                .fetch_optional(pool)
        })
        .await?;
        Ok(row)
    }

    async fn electrical_series(
        &self,
        since: NaiveDateTime,
    ) -> Result<Vec<ElectricalReading>, StoreError> {
        // ---
        let sql = format!(
            "SELECT {} FROM {} WHERE waktu >= ? ORDER BY waktu ASC",
            electrical_columns(),
            ELECTRICAL_TABLE
        );
        let sql = sql.as_str();
        let pool = &self.main;

        let rows = with_retry(self.retry, "listrik_noc series", move || {
            sqlx::query_as::<_, ElectricalReading>(sql)
                .bind(since)
                .fetch_all(pool)
        })
        .await?;
        Ok(rows)
    }

    async fn recent_access_logs(&self, limit: u32) -> Result<Vec<AccessLogEntry>, StoreError> {
        // ---
        let pool = &self.access;

        let rows = with_retry(self.retry, "access logs", move || {
            sqlx::query_as::<_, AccessLogEntry>(ACCESS_LOGS_SQL)
                .bind(limit)
                .fetch_all(pool)
        })
        .await?;
        Ok(rows)
    }

    async fn find_user(&self, username: &str) -> Result<Option<UserRecord>, StoreError> {
        // ---
        let pool = &self.main;

        let row = with_retry(self.retry, "user lookup", move || {
            sqlx::query_as::<_, UserRecord>(
                "SELECT id, username, password FROM users WHERE username = ?",
            )
            .bind(username)
            .fetch_optional(pool)
        })
        .await?;
        Ok(row)
    }
}
