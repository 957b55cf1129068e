//! Consumer-side alert aggregation.
//!
//! A dashboard re-applies the threshold policy to every pushed event and
//! keeps the resulting alerts in a short-lived list. Alerts are unique by
//! text, expire on their own, and each new one sounds a brief alarm.
//! Time is passed in explicitly so callers (and tests) own the clock.

use std::time::{Duration, Instant};

use crate::broadcast::ServerEvent;
use crate::models::{ClimateReading, Metric, Zone};
use crate::thresholds::{AlertMessage, Severity, Thresholds};

// ---

/// How long an alert stays on the board unless dismissed.
pub const ALERT_TTL: Duration = Duration::from_secs(10);

/// How long the alarm sounds after a new alert.
pub const ALARM_DURATION: Duration = Duration::from_secs(3);

/// Alerts raised by one pushed event under `thresholds`.
pub fn alerts_for(event: &ServerEvent, thresholds: &Thresholds) -> Vec<AlertMessage> {
    // ---
    let climate = |zone: Zone, metric: Metric, reading: &ClimateReading| -> Vec<AlertMessage> {
        let label = format!("{} {}", zone.label(), metric.name());
        let evaluation = match metric {
            Metric::Temperature => thresholds.temperature(&label, reading.temperature),
            Metric::Humidity => thresholds.humidity(&label, reading.humidity),
        };
        evaluation.alert.into_iter().collect()
    };

    match event {
        ServerEvent::NocTemperature(r) => climate(Zone::Noc, Metric::Temperature, r),
        ServerEvent::UpsTemperature(r) => climate(Zone::Ups, Metric::Temperature, r),
        ServerEvent::DatacenterTemperature(r) => climate(Zone::Datacenter, Metric::Temperature, r),
        ServerEvent::NocHumidity(r) => climate(Zone::Noc, Metric::Humidity, r),
        ServerEvent::UpsHumidity(r) => climate(Zone::Ups, Metric::Humidity, r),
        ServerEvent::DatacenterHumidity(r) => climate(Zone::Datacenter, Metric::Humidity, r),
        ServerEvent::ElectricalData(r) => [
            ("Phase R", r.phase_r),
            ("Phase S", r.phase_s),
            ("Phase T", r.phase_t),
        ]
        .into_iter()
        .filter_map(|(label, volts)| thresholds.voltage(label, volts).alert)
        .collect(),
        ServerEvent::FireSmokeData(r) => [thresholds.fire(r.api_value), thresholds.smoke(r.asap_value)]
            .into_iter()
            .filter_map(|evaluation| evaluation.alert)
            .collect(),
        ServerEvent::AccessLogs(_) | ServerEvent::HistoricalDataUpdate(_) => Vec::new(),
    }
}

/// An alert currently shown on the board.
#[derive(Debug, Clone, PartialEq)]
pub struct ActiveAlert {
    pub message: AlertMessage,
    pub raised_at: Instant,
}

impl ActiveAlert {
    pub fn title(&self) -> &'static str {
        self.message.severity.title()
    }
}

/// Audible cue: one play per new alert, silenced after [`ALARM_DURATION`].
#[derive(Debug, Clone, Default)]
pub struct AlarmCue {
    started: Option<Instant>,
    plays: u32,
}

impl AlarmCue {
    // ---
    pub fn trigger(&mut self, now: Instant) {
        self.started = Some(now);
        self.plays += 1;
    }

    pub fn is_sounding(&self, now: Instant) -> bool {
        self.started
            .is_some_and(|started| now.saturating_duration_since(started) < ALARM_DURATION)
    }

    pub fn silence(&mut self) {
        self.started = None;
    }

    /// Number of times the cue has been triggered.
    pub fn plays(&self) -> u32 {
        self.plays
    }
}

/// Ordered list of active alerts, unique by text.
#[derive(Debug, Clone, Default)]
pub struct AlertBoard {
    thresholds: Thresholds,
    alerts: Vec<ActiveAlert>,
    alarm: AlarmCue,
}

impl AlertBoard {
    // ---
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `message` unless an alert with the same text is active.
    /// Returns whether it was appended.
    pub fn push(&mut self, message: AlertMessage, now: Instant) -> bool {
        // ---
        if self.alerts.iter().any(|a| a.message.text == message.text) {
            return false;
        }
        self.alarm.trigger(now);
        self.alerts.push(ActiveAlert {
            message,
            raised_at: now,
        });
        true
    }

    /// Append a free-text alert, classified by keyword.
    pub fn push_text(&mut self, text: impl Into<String>, now: Instant) -> bool {
        let text = text.into();
        let severity = Severity::classify(&text);
        self.push(AlertMessage { severity, text }, now)
    }

    /// Evaluate a pushed event and append its new alerts. Returns how many
    /// were appended.
    pub fn ingest(&mut self, event: &ServerEvent, now: Instant) -> usize {
        let mut appended = 0;
        for alert in alerts_for(event, &self.thresholds) {
            if self.push(alert, now) {
                appended += 1;
            }
        }
        appended
    }

    /// Like [`ingest`](Self::ingest) for a raw `{"event", "data"}` frame.
    pub fn ingest_frame(&mut self, frame: &str, now: Instant) -> Result<usize, serde_json::Error> {
        let event: ServerEvent = serde_json::from_str(frame)?;
        Ok(self.ingest(&event, now))
    }

    /// Drop alerts older than [`ALERT_TTL`]. Returns how many were removed.
    pub fn expire(&mut self, now: Instant) -> usize {
        let before = self.alerts.len();
        self.alerts
            .retain(|a| now.saturating_duration_since(a.raised_at) < ALERT_TTL);
        before - self.alerts.len()
    }

    pub fn dismiss(&mut self, index: usize) -> Option<AlertMessage> {
        (index < self.alerts.len()).then(|| self.alerts.remove(index).message)
    }

    pub fn clear(&mut self) {
        self.alerts.clear();
    }

    pub fn active(&self) -> &[ActiveAlert] {
        &self.alerts
    }

    pub fn alarm(&self) -> &AlarmCue {
        &self.alarm
    }

    pub fn alarm_mut(&mut self) -> &mut AlarmCue {
        &mut self.alarm
    }
}
