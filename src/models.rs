//! Data models for the monitor: store rows, wire payloads and the
//! historical bundle.
//!
//! Field names on the wire follow the store columns (`suhu`, `kelembapan`,
//! `waktu`) because the dashboard consumes them verbatim.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

// ---

/// Serde adapter for the store's naive local-time strings
/// (`YYYY-MM-DD HH:MM:SS`).
pub mod local_time {
    use chrono::NaiveDateTime;
    use serde::{Deserialize, Deserializer, Serializer};

    pub const FORMAT: &str = "%Y-%m-%d %H:%M:%S";

    pub fn serialize<S>(value: &NaiveDateTime, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(&value.format(FORMAT))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<NaiveDateTime, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        NaiveDateTime::parse_from_str(&raw, FORMAT).map_err(serde::de::Error::custom)
    }
}

/// Physical zone monitored for temperature and humidity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Zone {
    Noc,
    Ups,
    Datacenter,
}

impl Zone {
    // ---
    pub const ALL: [Zone; 3] = [Zone::Noc, Zone::Ups, Zone::Datacenter];

    /// Store table holding this zone's climate readings.
    pub fn table(self) -> &'static str {
        match self {
            Zone::Noc => "sensor_data",
            Zone::Ups => "sensor_data1",
            Zone::Datacenter => "sensor_data2",
        }
    }

    /// Human label used in alert texts.
    pub fn label(self) -> &'static str {
        match self {
            Zone::Noc => "NOC",
            Zone::Ups => "UPS",
            Zone::Datacenter => "Data Center",
        }
    }
}

/// Climate metric kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Metric {
    Temperature,
    Humidity,
}

impl Metric {
    // ---
    pub const ALL: [Metric; 2] = [Metric::Temperature, Metric::Humidity];

    /// Store column holding this metric.
    pub fn column(self) -> &'static str {
        match self {
            Metric::Temperature => "suhu",
            Metric::Humidity => "kelembapan",
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Metric::Temperature => "temperature",
            Metric::Humidity => "humidity",
        }
    }
}

/// Latest temperature/humidity row of one zone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct ClimateReading {
    // ---
    #[serde(rename = "suhu")]
    #[sqlx(rename = "suhu")]
    pub temperature: f64,

    #[serde(rename = "kelembapan")]
    #[sqlx(rename = "kelembapan")]
    pub humidity: f64,

    #[serde(rename = "waktu", with = "local_time")]
    #[sqlx(rename = "waktu")]
    pub recorded_at: NaiveDateTime,
}

impl ClimateReading {
    // ---
    pub fn value(&self, metric: Metric) -> f64 {
        match metric {
            Metric::Temperature => self.temperature,
            Metric::Humidity => self.humidity,
        }
    }
}

/// Three-phase electrical row (`listrik_noc`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct ElectricalReading {
    // ---
    pub id: i64,
    pub phase_r: f64,
    pub phase_s: f64,
    pub phase_t: f64,
    pub power_3ph: f64,
    pub frequency_3ph: f64,
    pub pf_3ph: f64,
    pub energy_3ph: f64,

    #[serde(rename = "waktu", with = "local_time")]
    #[sqlx(rename = "waktu")]
    pub recorded_at: NaiveDateTime,
}

/// Fire and smoke detector row (`api_asap_data`).
///
/// `api_value` below 50 means fire; `asap_value` is 0 when smoke is
/// detected and 1 otherwise.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct FireSmokeReading {
    // ---
    pub id: i64,
    pub api_value: i32,
    pub asap_value: i32,

    #[serde(rename = "waktu", with = "local_time")]
    #[sqlx(rename = "waktu")]
    pub recorded_at: NaiveDateTime,
}

/// One door access event joined with its user and door names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct AccessLogEntry {
    // ---
    #[serde(with = "local_time")]
    pub access_time: NaiveDateTime,
    pub access_granted: bool,
    pub username: Option<String>,
    pub door_name: Option<String>,
}

/// Credentials row used by the login endpoint. Never serialized.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct UserRecord {
    // ---
    pub id: i64,
    pub username: String,

    #[sqlx(rename = "password")]
    pub password_hash: String,
}

/// A single `(timestamp, value)` sample of a climate series.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct SeriesPoint {
    // ---
    #[serde(with = "local_time")]
    pub timestamp: NaiveDateTime,
    pub value: f64,
}

/// Phase voltages of one electrical sample, as charted historically.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PhasePoint {
    // ---
    #[serde(with = "local_time")]
    pub timestamp: NaiveDateTime,
    pub phase_r: f64,
    pub phase_s: f64,
    pub phase_t: f64,
}

impl From<&ElectricalReading> for PhasePoint {
    fn from(reading: &ElectricalReading) -> Self {
        PhasePoint {
            timestamp: reading.recorded_at,
            phase_r: reading.phase_r,
            phase_s: reading.phase_s,
            phase_t: reading.phase_t,
        }
    }
}

/// Per-zone series of one metric.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ZoneSeries {
    // ---
    pub noc: Vec<SeriesPoint>,
    pub ups: Vec<SeriesPoint>,
    pub datacenter: Vec<SeriesPoint>,
}

impl ZoneSeries {
    // ---
    pub fn set(&mut self, zone: Zone, points: Vec<SeriesPoint>) {
        match zone {
            Zone::Noc => self.noc = points,
            Zone::Ups => self.ups = points,
            Zone::Datacenter => self.datacenter = points,
        }
    }
}

/// Payload of `historical_data_update`: grouped by metric, then zone.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HistoricalBundle {
    // ---
    pub temperature: ZoneSeries,
    pub humidity: ZoneSeries,
    pub electrical: Vec<PhasePoint>,
}

impl HistoricalBundle {
    // ---
    pub fn metric_mut(&mut self, metric: Metric) -> &mut ZoneSeries {
        match metric {
            Metric::Temperature => &mut self.temperature,
            Metric::Humidity => &mut self.humidity,
        }
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use chrono::NaiveDate;
    use serde_json::json;

    fn at(h: u32, m: u32, s: u32) -> NaiveDateTime {
        // ---
        NaiveDate::from_ymd_opt(2025, 3, 26)
            .unwrap()
            .and_hms_opt(h, m, s)
            .unwrap()
    }

    #[test]
    fn test_climate_payload_uses_store_field_names() {
        // ---
        let reading = ClimateReading {
            temperature: 26.0,
            humidity: 45.5,
            recorded_at: at(18, 45, 0),
        };

        let value = serde_json::to_value(&reading).unwrap();
        assert_eq!(
            value,
            json!({"suhu": 26.0, "kelembapan": 45.5, "waktu": "2025-03-26 18:45:00"})
        );
    }

    #[test]
    fn test_local_time_parses_store_strings() {
        // ---
        let raw = json!({"timestamp": "2025-03-26 07:05:09", "value": 21.5});
        let point: SeriesPoint = serde_json::from_value(raw).unwrap();

        assert_eq!(point.timestamp, at(7, 5, 9));
        assert_eq!(point.value, 21.5);

        let bad = json!({"timestamp": "2025-03-26T07:05:09Z", "value": 1.0});
        assert!(serde_json::from_value::<SeriesPoint>(bad).is_err());
    }

    #[test]
    fn test_zone_tables_are_distinct() {
        // ---
        assert_eq!(Zone::Noc.table(), "sensor_data");
        assert_eq!(Zone::Ups.table(), "sensor_data1");
        assert_eq!(Zone::Datacenter.table(), "sensor_data2");
        assert_eq!(Zone::Datacenter.label(), "Data Center");
        assert_eq!(Metric::Humidity.column(), "kelembapan");
    }

    #[test]
    fn test_access_log_allows_unknown_user_and_door() {
        // ---
        let entry = AccessLogEntry {
            access_time: at(9, 0, 0),
            access_granted: false,
            username: None,
            door_name: Some("Server Room".to_string()),
        };

        let value = serde_json::to_value(&entry).unwrap();
        assert_eq!(value["username"], serde_json::Value::Null);
        assert_eq!(value["door_name"], "Server Room");
        assert_eq!(value["access_granted"], false);
    }

    #[test]
    fn test_zone_series_routes_by_zone() {
        // ---
        let mut series = ZoneSeries::default();
        let point = SeriesPoint {
            timestamp: at(1, 0, 0),
            value: 3.0,
        };
        series.set(Zone::Ups, vec![point]);

        assert!(series.noc.is_empty());
        assert_eq!(series.ups, vec![point]);
        assert!(series.datacenter.is_empty());
    }
}
