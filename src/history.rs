//! Historical query service.
//!
//! Resolves a relative range token to an absolute start timestamp in the
//! store's local time and gathers ordered series per zone and metric. Nothing
//! here is cached; every request re-reads the store.

use std::sync::Arc;

use chrono::{Duration, FixedOffset, NaiveDateTime, Offset, Utc};
use futures::future::try_join_all;
use serde::{Deserialize, Serialize};

use crate::error::StoreError;
use crate::export::{self, ExportFile, ExportKind};
use crate::models::{HistoricalBundle, Metric, PhasePoint, Zone};
use crate::store::TelemetryStore;

// ---

/// Client-selected relative window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TimeRange {
    #[default]
    #[serde(rename = "24h")]
    Day,
    #[serde(rename = "7d")]
    Week,
    #[serde(rename = "30d")]
    Month,
}

impl TimeRange {
    // ---
    /// Resolve a token. Unknown or missing tokens (the dashboard also sends
    /// `realtime`) fall back to the last 24 hours.
    pub fn from_token(token: Option<&str>) -> Self {
        match token {
            Some("7d") => TimeRange::Week,
            Some("30d") => TimeRange::Month,
            Some("24h") | None => TimeRange::Day,
            Some(other) => {
                tracing::debug!("Unknown time range {:?}, using 24h", other);
                TimeRange::Day
            }
        }
    }

    pub fn token(self) -> &'static str {
        match self {
            TimeRange::Day => "24h",
            TimeRange::Week => "7d",
            TimeRange::Month => "30d",
        }
    }

    pub fn days(self) -> i64 {
        match self {
            TimeRange::Day => 1,
            TimeRange::Week => 7,
            TimeRange::Month => 30,
        }
    }

    /// Absolute start of the window ending at `now`.
    pub fn start_from(self, now: NaiveDateTime) -> NaiveDateTime {
        now - Duration::days(self.days())
    }
}

/// Wall clock in the store's fixed offset. Stored timestamps are naive local
/// times, so comparisons must use the same offset.
#[derive(Debug, Clone, Copy)]
pub struct LocalClock {
    offset: FixedOffset,
    frozen: Option<NaiveDateTime>,
}

impl LocalClock {
    // ---
    pub fn new(offset: FixedOffset) -> Self {
        Self {
            offset,
            frozen: None,
        }
    }

    /// A clock that always reads `now`.
    pub fn fixed(now: NaiveDateTime) -> Self {
        Self {
            offset: Utc.fix(),
            frozen: Some(now),
        }
    }

    pub fn now(&self) -> NaiveDateTime {
        match self.frozen {
            Some(now) => now,
            None => Utc::now().with_timezone(&self.offset).naive_local(),
        }
    }
}

/// Serves `historical_data_update` bundles and CSV exports.
#[derive(Clone)]
pub struct HistoryService {
    store: Arc<dyn TelemetryStore>,
    clock: LocalClock,
}

impl HistoryService {
    // ---
    pub fn new(store: Arc<dyn TelemetryStore>, clock: LocalClock) -> Self {
        Self { store, clock }
    }

    /// Six climate series (zones × metrics) plus phase voltages, all since
    /// the start of `range`, ascending.
    pub async fn bundle(&self, range: TimeRange) -> Result<HistoricalBundle, StoreError> {
        // ---
        let start = range.start_from(self.clock.now());
        tracing::debug!("Historical bundle for {} since {}", range.token(), start);

        let store = &self.store;
        let slots: Vec<(Metric, Zone)> = Metric::ALL
            .into_iter()
            .flat_map(|metric| Zone::ALL.into_iter().map(move |zone| (metric, zone)))
            .collect();
        let series = try_join_all(
            slots
                .iter()
                .map(move |&(metric, zone)| store.climate_series(zone, metric, start)),
        );
        let (series, electrical) = tokio::try_join!(series, store.electrical_series(start))?;

        let mut bundle = HistoricalBundle::default();
        for ((metric, zone), points) in slots.into_iter().zip(series) {
            bundle.metric_mut(metric).set(zone, points);
        }
        bundle.electrical = electrical.iter().map(PhasePoint::from).collect();

        Ok(bundle)
    }

    /// Build the CSV export of `kind` over `range`.
    pub async fn export(&self, kind: ExportKind, range: TimeRange) -> Result<ExportFile, StoreError> {
        // ---
        let now = self.clock.now();
        let start = range.start_from(now);
        tracing::info!("Exporting {} data for {} since {}", kind.name(), range.token(), start);

        let rows = match kind.metric() {
            Some(metric) => self.climate_rows(metric, start).await?,
            None => {
                let readings = self.store.electrical_series(start).await?;
                export::electrical_rows(&readings)
            }
        };

        Ok(ExportFile {
            filename: export::filename(kind, range, now.date()),
            body: export::render_csv(kind.header(), &rows),
        })
    }

    /// NOC is the primary series; UPS and Data Center are attached as of each
    /// NOC timestamp.
    async fn climate_rows(
        &self,
        metric: Metric,
        start: NaiveDateTime,
    ) -> Result<Vec<Vec<export::Cell>>, StoreError> {
        // ---
        let store = &self.store;
        let (primary, ups, ups_seed, datacenter, datacenter_seed) = tokio::try_join!(
            store.climate_series(Zone::Noc, metric, start),
            store.climate_series(Zone::Ups, metric, start),
            store.climate_at_or_before(Zone::Ups, metric, start),
            store.climate_series(Zone::Datacenter, metric, start),
            store.climate_at_or_before(Zone::Datacenter, metric, start),
        )?;

        let ups: Vec<_> = ups_seed.into_iter().chain(ups).collect();
        let datacenter: Vec<_> = datacenter_seed.into_iter().chain(datacenter).collect();

        Ok(export::climate_rows(&primary, &[ups.as_slice(), datacenter.as_slice()]))
    }
}
