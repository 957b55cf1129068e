//! In-memory store for tests, with per-source failure injection.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::NaiveDateTime;

use super::TelemetryStore;
use crate::error::StoreError;
use crate::models::{
    AccessLogEntry, ClimateReading, ElectricalReading, FireSmokeReading, Metric, SeriesPoint,
    UserRecord, Zone,
};

#[derive(Default)]
struct Data {
    climate: HashMap<Zone, Vec<ClimateReading>>,
    electrical: Vec<ElectricalReading>,
    fire_smoke: Vec<FireSmokeReading>,
    access_logs: Vec<AccessLogEntry>,
    users: Vec<UserRecord>,
    failing: HashSet<&'static str>,
}

/// Rows are kept in insertion order, which tests keep chronological.
#[derive(Default)]
pub(crate) struct MemoryStore {
    data: Mutex<Data>,
}

fn zone_source(zone: Zone) -> &'static str {
    match zone {
        Zone::Noc => "noc",
        Zone::Ups => "ups",
        Zone::Datacenter => "datacenter",
    }
}

impl MemoryStore {
    // ---
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push_climate(&self, zone: Zone, reading: ClimateReading) {
        let mut data = self.data.lock().unwrap();
        data.climate.entry(zone).or_default().push(reading);
    }

    pub(crate) fn push_electrical(&self, reading: ElectricalReading) {
        self.data.lock().unwrap().electrical.push(reading);
    }

    pub(crate) fn push_fire_smoke(&self, reading: FireSmokeReading) {
        self.data.lock().unwrap().fire_smoke.push(reading);
    }

    pub(crate) fn push_access_log(&self, entry: AccessLogEntry) {
        self.data.lock().unwrap().access_logs.push(entry);
    }

    pub(crate) fn push_user(&self, user: UserRecord) {
        self.data.lock().unwrap().users.push(user);
    }

    /// Make every call touching `source` fail. Sources: `noc`, `ups`,
    /// `datacenter`, `electrical`, `fire_smoke`, `access_logs`, `users`,
    /// `ping`.
    pub(crate) fn fail(&self, source: &'static str) {
        self.data.lock().unwrap().failing.insert(source);
    }

    pub(crate) fn heal(&self, source: &'static str) {
        self.data.lock().unwrap().failing.remove(source);
    }

    fn check(&self, source: &'static str) -> Result<(), StoreError> {
        if self.data.lock().unwrap().failing.contains(source) {
            Err(StoreError::Query(sqlx::Error::PoolTimedOut))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl TelemetryStore for MemoryStore {
    // ---
    async fn ping(&self) -> Result<(), StoreError> {
        self.check("ping")
    }

    async fn latest_climate(&self, zone: Zone) -> Result<Option<ClimateReading>, StoreError> {
        self.check(zone_source(zone))?;
        let data = self.data.lock().unwrap();
        Ok(data.climate.get(&zone).and_then(|rows| rows.last().cloned()))
    }

    async fn latest_electrical(&self) -> Result<Option<ElectricalReading>, StoreError> {
        self.check("electrical")?;
        Ok(self.data.lock().unwrap().electrical.last().cloned())
    }

    async fn latest_fire_smoke(&self) -> Result<Option<FireSmokeReading>, StoreError> {
        self.check("fire_smoke")?;
        Ok(self.data.lock().unwrap().fire_smoke.last().cloned())
    }

    async fn climate_series(
        &self,
        zone: Zone,
        metric: Metric,
        since: NaiveDateTime,
    ) -> Result<Vec<SeriesPoint>, StoreError> {
        // ---
        self.check(zone_source(zone))?;
        let data = self.data.lock().unwrap();
        let mut points: Vec<SeriesPoint> = data
            .climate
            .get(&zone)
            .into_iter()
            .flatten()
            .filter(|r| r.recorded_at >= since)
            .map(|r| SeriesPoint {
                timestamp: r.recorded_at,
                value: r.value(metric),
            })
            .collect();
        points.sort_by_key(|p| p.timestamp);
        Ok(points)
    }

    async fn climate_at_or_before(
        &self,
        zone: Zone,
        metric: Metric,
        at: NaiveDateTime,
    ) -> Result<Option<SeriesPoint>, StoreError> {
        // ---
        self.check(zone_source(zone))?;
        let data = self.data.lock().unwrap();
        Ok(data
            .climate
            .get(&zone)
            .into_iter()
            .flatten()
            .filter(|r| r.recorded_at <= at)
            .max_by_key(|r| r.recorded_at)
            .map(|r| SeriesPoint {
                timestamp: r.recorded_at,
                value: r.value(metric),
            }))
    }

    async fn electrical_series(
        &self,
        since: NaiveDateTime,
    ) -> Result<Vec<ElectricalReading>, StoreError> {
        // ---
        self.check("electrical")?;
        let data = self.data.lock().unwrap();
        let mut rows: Vec<ElectricalReading> = data
            .electrical
            .iter()
            .filter(|r| r.recorded_at >= since)
            .cloned()
            .collect();
        rows.sort_by_key(|r| r.recorded_at);
        Ok(rows)
    }

    async fn recent_access_logs(&self, limit: u32) -> Result<Vec<AccessLogEntry>, StoreError> {
        // ---
        self.check("access_logs")?;
        let data = self.data.lock().unwrap();
        let mut rows = data.access_logs.clone();
        rows.sort_by(|a, b| b.access_time.cmp(&a.access_time));
        rows.truncate(limit as usize);
        Ok(rows)
    }

    async fn find_user(&self, username: &str) -> Result<Option<UserRecord>, StoreError> {
        self.check("users")?;
        let data = self.data.lock().unwrap();
        Ok(data.users.iter().find(|u| u.username == username).cloned())
    }
}
