//! Broadcast loop and the session registry it publishes to.
//!
//! Every tick reads the latest row of each telemetry source plus the newest
//! access events and pushes one event per category to every registered
//! session. Sources are fetched concurrently and fail independently.

use std::{collections::HashMap, sync::Arc, time::Duration};

use axum::extract::ws::Utf8Bytes;
use serde::{Deserialize, Deserializer, Serialize};
use tokio::{
    sync::{mpsc, Mutex},
    time::MissedTickBehavior,
};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::alerts::alerts_for;
use crate::models::{
    AccessLogEntry, ClimateReading, ElectricalReading, FireSmokeReading, HistoricalBundle, Metric,
    Zone,
};
use crate::store::{TelemetryStore, ACCESS_LOG_LIMIT};
use crate::thresholds::Thresholds;

// ---

/// Server → client frame, serialized as `{"event": <name>, "data": <payload>}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ServerEvent {
    NocTemperature(ClimateReading),
    UpsTemperature(ClimateReading),
    DatacenterTemperature(ClimateReading),
    NocHumidity(ClimateReading),
    UpsHumidity(ClimateReading),
    DatacenterHumidity(ClimateReading),
    ElectricalData(ElectricalReading),
    FireSmokeData(FireSmokeReading),
    AccessLogs(Vec<AccessLogEntry>),
    HistoricalDataUpdate(HistoricalBundle),
}

impl ServerEvent {
    // ---
    /// The `{zone}_{metric}` event carrying a zone's latest climate row.
    pub fn climate(zone: Zone, metric: Metric, reading: ClimateReading) -> Self {
        match (zone, metric) {
            (Zone::Noc, Metric::Temperature) => ServerEvent::NocTemperature(reading),
            (Zone::Ups, Metric::Temperature) => ServerEvent::UpsTemperature(reading),
            (Zone::Datacenter, Metric::Temperature) => ServerEvent::DatacenterTemperature(reading),
            (Zone::Noc, Metric::Humidity) => ServerEvent::NocHumidity(reading),
            (Zone::Ups, Metric::Humidity) => ServerEvent::UpsHumidity(reading),
            (Zone::Datacenter, Metric::Humidity) => ServerEvent::DatacenterHumidity(reading),
        }
    }

    /// Wire name of the event.
    pub fn name(&self) -> &'static str {
        match self {
            ServerEvent::NocTemperature(_) => "noc_temperature",
            ServerEvent::UpsTemperature(_) => "ups_temperature",
            ServerEvent::DatacenterTemperature(_) => "datacenter_temperature",
            ServerEvent::NocHumidity(_) => "noc_humidity",
            ServerEvent::UpsHumidity(_) => "ups_humidity",
            ServerEvent::DatacenterHumidity(_) => "datacenter_humidity",
            ServerEvent::ElectricalData(_) => "electrical_data",
            ServerEvent::FireSmokeData(_) => "fire_smoke_data",
            ServerEvent::AccessLogs(_) => "access_logs",
            ServerEvent::HistoricalDataUpdate(_) => "historical_data_update",
        }
    }

    pub fn to_frame(&self) -> Result<Utf8Bytes, serde_json::Error> {
        serde_json::to_string(self).map(Utf8Bytes::from)
    }
}

/// Client → server frame. `data` may be omitted or `null`, which reads as
/// an empty request.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ClientEvent {
    RequestHistoricalData(HistoricalRequest),
}

#[derive(Deserialize)]
#[serde(rename_all = "snake_case")]
enum ClientEventName {
    RequestHistoricalData,
}

#[derive(Deserialize)]
struct ClientFrame {
    event: ClientEventName,
    #[serde(default)]
    data: Option<HistoricalRequest>,
}

impl<'de> Deserialize<'de> for ClientEvent {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let frame = ClientFrame::deserialize(deserializer)?;
        match frame.event {
            ClientEventName::RequestHistoricalData => Ok(ClientEvent::RequestHistoricalData(
                frame.data.unwrap_or_default(),
            )),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HistoricalRequest {
    #[serde(rename = "timeRange", default)]
    pub time_range: Option<String>,
}

/// Connected sessions keyed by id, each with a bounded outbound queue.
///
/// Publishing takes a snapshot of the senders under the lock and sends
/// outside it, so a slow session never holds up registration or removal.
#[derive(Debug, Clone)]
pub struct SessionRegistry {
    sessions: Arc<Mutex<HashMap<Uuid, mpsc::Sender<Utf8Bytes>>>>,
    buffer: usize,
}

impl SessionRegistry {
    // ---
    pub fn new(buffer: usize) -> Self {
        Self {
            sessions: Arc::new(Mutex::new(HashMap::new())),
            buffer: buffer.max(1),
        }
    }

    /// Add a session. The caller owns the receiving end of its queue and
    /// may clone the sender to reply to that session alone.
    pub async fn register(&self) -> (Uuid, mpsc::Sender<Utf8Bytes>, mpsc::Receiver<Utf8Bytes>) {
        // ---
        let id = Uuid::new_v4();
        let (tx, rx) = mpsc::channel(self.buffer);
        let mut sessions = self.sessions.lock().await;
        sessions.insert(id, tx.clone());
        info!("Session {} connected ({} active)", id, sessions.len());
        (id, tx, rx)
    }

    pub async fn remove(&self, id: Uuid) {
        let mut sessions = self.sessions.lock().await;
        if sessions.remove(&id).is_some() {
            info!("Session {} disconnected ({} active)", id, sessions.len());
        }
    }

    pub async fn len(&self) -> usize {
        self.sessions.lock().await.len()
    }

    /// Send one event to every session without waiting on any of them.
    ///
    /// A full queue drops the frame for that session only. A closed queue
    /// removes the session. Returns the number of sessions that accepted the
    /// frame.
    pub async fn publish(&self, event: &ServerEvent) -> usize {
        // ---
        let frame = match event.to_frame() {
            Ok(frame) => frame,
            Err(e) => {
                error!("Failed to serialize {} event: {}", event.name(), e);
                return 0;
            }
        };

        let targets: Vec<(Uuid, mpsc::Sender<Utf8Bytes>)> = self
            .sessions
            .lock()
            .await
            .iter()
            .map(|(id, tx)| (*id, tx.clone()))
            .collect();

        let mut delivered = 0;
        let mut closed = Vec::new();
        for (id, tx) in targets {
            match tx.try_send(frame.clone()) {
                Ok(()) => delivered += 1,
                Err(mpsc::error::TrySendError::Full(_)) => {
                    warn!("Session {} is lagging, dropped {} frame", id, event.name());
                }
                Err(mpsc::error::TrySendError::Closed(_)) => closed.push(id),
            }
        }

        if !closed.is_empty() {
            let mut sessions = self.sessions.lock().await;
            for id in closed {
                sessions.remove(&id);
                debug!("Session {} queue closed, removed", id);
            }
        }
        delivered
    }
}

/// Outcome of one broadcast tick.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickReport {
    /// Events published, in publish order.
    pub events: Vec<&'static str>,
    /// Sources whose query failed this tick.
    pub failed: Vec<&'static str>,
}

/// Periodic publisher of the latest readings.
pub struct Broadcaster {
    store: Arc<dyn TelemetryStore>,
    sessions: SessionRegistry,
    thresholds: Thresholds,
}

impl Broadcaster {
    // ---
    pub fn new(store: Arc<dyn TelemetryStore>, sessions: SessionRegistry) -> Self {
        Self {
            store,
            sessions,
            thresholds: Thresholds::default(),
        }
    }

    /// Fetch every source once and publish what came back.
    pub async fn tick(&self) -> TickReport {
        // ---
        let store = &self.store;
        let (noc, ups, datacenter, electrical, fire_smoke, access_logs) = tokio::join!(
            store.latest_climate(Zone::Noc),
            store.latest_climate(Zone::Ups),
            store.latest_climate(Zone::Datacenter),
            store.latest_electrical(),
            store.latest_fire_smoke(),
            store.recent_access_logs(ACCESS_LOG_LIMIT),
        );

        let mut report = TickReport::default();
        let mut events = Vec::new();

        for (zone, result) in [
            (Zone::Noc, noc),
            (Zone::Ups, ups),
            (Zone::Datacenter, datacenter),
        ] {
            match result {
                Ok(Some(reading)) => {
                    events.push(ServerEvent::climate(zone, Metric::Temperature, reading.clone()));
                    events.push(ServerEvent::climate(zone, Metric::Humidity, reading));
                }
                Ok(None) => debug!("No rows in {}", zone.table()),
                Err(e) => {
                    error!("Error fetching {} data: {}", zone.table(), e);
                    report.failed.push(zone.table());
                }
            }
        }

        match electrical {
            Ok(Some(reading)) => events.push(ServerEvent::ElectricalData(reading)),
            Ok(None) => debug!("No electrical rows"),
            Err(e) => {
                error!("Error fetching electrical data: {}", e);
                report.failed.push("electrical");
            }
        }

        match fire_smoke {
            Ok(Some(reading)) => events.push(ServerEvent::FireSmokeData(reading)),
            Ok(None) => debug!("No fire/smoke rows"),
            Err(e) => {
                error!("Error fetching fire/smoke data: {}", e);
                report.failed.push("fire_smoke");
            }
        }

        match access_logs {
            Ok(rows) if !rows.is_empty() => events.push(ServerEvent::AccessLogs(rows)),
            Ok(_) => debug!("No access log rows"),
            Err(e) => {
                error!("Error fetching access logs: {}", e);
                report.failed.push("access_logs");
            }
        }

        for event in &events {
            for alert in alerts_for(event, &self.thresholds) {
                warn!("{}", alert.text);
            }
            self.sessions.publish(event).await;
            report.events.push(event.name());
        }

        report
    }

    /// Tick every `period` forever. Ticks never overlap; a tick that overruns
    /// causes the missed ones to be skipped.
    pub async fn run(self, period: Duration) {
        // ---
        info!("Broadcast loop started, period {:?}", period);
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            interval.tick().await;
            let report = self.tick().await;
            debug!(
                "Tick published {} events to {} sessions ({} sources failed)",
                report.events.len(),
                self.sessions.len().await,
                report.failed.len()
            );
        }
    }
}
