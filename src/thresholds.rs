//! Threshold policy for live readings.
//!
//! Every check is level-triggered: an out-of-band value produces an alert on
//! every evaluation, not only when it first crosses the band. Callers that
//! want fewer notifications de-duplicate on the alert text (see `alerts`).
//!
//! The temperature policy has no distinct low-side warning tier: anything
//! under `warning_low` is critical. This mirrors the dashboard's product
//! thresholds and is kept as is.

use serde::{Deserialize, Serialize};

// ---

/// Outcome class of one evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Normal,
    Warning,
    Critical,
}

/// Severity carried by an alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Critical,
}

impl Severity {
    // ---
    /// Banner title shown above the alert text.
    pub fn title(self) -> &'static str {
        match self {
            Severity::Critical => "CRITICAL ALERT",
            Severity::Warning => "WARNING",
            Severity::Info => "Information",
        }
    }

    /// Classify free text the way the dashboard banner does: by keyword,
    /// critical first.
    pub fn classify(text: &str) -> Self {
        let lower = text.to_lowercase();
        if lower.contains("critical") {
            Severity::Critical
        } else if lower.contains("warning") {
            Severity::Warning
        } else {
            Severity::Info
        }
    }
}

/// A human-readable alert. Equality of alerts is equality of `text`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertMessage {
    pub severity: Severity,
    pub text: String,
}

impl AlertMessage {
    fn critical(text: String) -> Self {
        AlertMessage {
            severity: Severity::Critical,
            text,
        }
    }

    fn warning(text: String) -> Self {
        AlertMessage {
            severity: Severity::Warning,
            text,
        }
    }
}

/// Status plus the alert to raise, if any.
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    pub status: Status,
    pub alert: Option<AlertMessage>,
}

impl Evaluation {
    fn normal() -> Self {
        Evaluation {
            status: Status::Normal,
            alert: None,
        }
    }

    fn raise(status: Status, alert: AlertMessage) -> Self {
        Evaluation {
            status,
            alert: Some(alert),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TemperatureBands {
    pub warning_low: f64,
    pub warning_high: f64,
    pub critical_high: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HumidityBands {
    pub low: f64,
    pub high: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VoltageBands {
    pub warning_low: f64,
    pub warning_high: f64,
    pub critical_low: f64,
    pub critical_high: f64,
}

/// The fixed alerting policy.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Thresholds {
    pub temperature: TemperatureBands,
    pub humidity: HumidityBands,
    pub voltage: VoltageBands,
    /// Fire sensor readings strictly below this raise a fire alert.
    pub fire_below: i32,
}

impl Default for Thresholds {
    fn default() -> Self {
        Thresholds {
            temperature: TemperatureBands {
                warning_low: 18.0,
                warning_high: 23.0,
                critical_high: 25.0,
            },
            humidity: HumidityBands {
                low: 30.0,
                high: 60.0,
            },
            voltage: VoltageBands {
                warning_low: 210.0,
                warning_high: 240.0,
                critical_low: 200.0,
                critical_high: 250.0,
            },
            fire_below: 50,
        }
    }
}

impl Thresholds {
    // ---
    pub fn temperature(&self, label: &str, value: f64) -> Evaluation {
        // ---
        let t = &self.temperature;
        if value < t.warning_low || value > t.critical_high {
            Evaluation::raise(
                Status::Critical,
                AlertMessage::critical(format!(
                    "CRITICAL ALERT: {label} is at {value}°C (outside safe range: {}°C - {}°C)!",
                    t.warning_low, t.critical_high
                )),
            )
        } else if value >= t.warning_high && value <= t.critical_high {
            Evaluation::raise(
                Status::Warning,
                AlertMessage::warning(format!(
                    "WARNING: {label} is at {value}°C (warning range: {}°C - {}°C)!",
                    t.warning_high, t.critical_high
                )),
            )
        } else {
            Evaluation::normal()
        }
    }

    pub fn humidity(&self, label: &str, value: f64) -> Evaluation {
        // ---
        let h = &self.humidity;
        if value < h.low {
            Evaluation::raise(
                Status::Warning,
                AlertMessage::warning(format!(
                    "WARNING: {label} is too low at {value}% (minimum: {}%)!",
                    h.low
                )),
            )
        } else if value > h.high {
            Evaluation::raise(
                Status::Warning,
                AlertMessage::warning(format!(
                    "WARNING: {label} is too high at {value}% (maximum: {}%)!",
                    h.high
                )),
            )
        } else {
            Evaluation::normal()
        }
    }

    pub fn voltage(&self, label: &str, value: f64) -> Evaluation {
        // ---
        let v = &self.voltage;
        if value <= v.critical_low {
            Evaluation::raise(
                Status::Critical,
                AlertMessage::critical(format!(
                    "CRITICAL ALERT: {label} voltage is too low at {value}V (threshold: {}V)!",
                    v.critical_low
                )),
            )
        } else if value >= v.critical_high {
            Evaluation::raise(
                Status::Critical,
                AlertMessage::critical(format!(
                    "CRITICAL ALERT: {label} voltage is too high at {value}V (threshold: {}V)!",
                    v.critical_high
                )),
            )
        } else if value <= v.warning_low {
            Evaluation::raise(
                Status::Warning,
                AlertMessage::warning(format!(
                    "WARNING: {label} voltage is low at {value}V (threshold: {}V)!",
                    v.warning_low
                )),
            )
        } else if value >= v.warning_high {
            Evaluation::raise(
                Status::Warning,
                AlertMessage::warning(format!(
                    "WARNING: {label} voltage is high at {value}V (threshold: {}V)!",
                    v.warning_high
                )),
            )
        } else {
            Evaluation::normal()
        }
    }

    pub fn fire(&self, api_value: i32) -> Evaluation {
        if api_value < self.fire_below {
            Evaluation::raise(
                Status::Critical,
                AlertMessage::critical(
                    "CRITICAL ALERT: Fire detected! Take immediate action.".to_string(),
                ),
            )
        } else {
            Evaluation::normal()
        }
    }

    /// `asap_value` is 0 when the detector sees smoke.
    pub fn smoke(&self, asap_value: i32) -> Evaluation {
        if asap_value == 0 {
            Evaluation::raise(
                Status::Warning,
                AlertMessage::warning("WARNING: Smoke detected! Investigate immediately.".to_string()),
            )
        } else {
            Evaluation::normal()
        }
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;

    fn sweep(from: f64, to: f64, step: f64) -> impl Iterator<Item = f64> {
        let n = ((to - from) / step).round() as usize;
        (0..=n).map(move |i| from + step * i as f64)
    }

    #[test]
    fn test_temperature_classes_hold_across_range() {
        // ---
        let policy = Thresholds::default();
        for v in sweep(0.0, 40.0, 0.25) {
            let status = policy.temperature("NOC temperature", v).status;
            let expected = if v < 18.0 || v > 25.0 {
                Status::Critical
            } else if (23.0..=25.0).contains(&v) {
                Status::Warning
            } else {
                Status::Normal
            };
            assert_eq!(status, expected, "temperature {v}");
        }
    }

    #[test]
    fn test_temperature_edges() {
        // ---
        let policy = Thresholds::default();
        assert_eq!(policy.temperature("t", 17.99).status, Status::Critical);
        assert_eq!(policy.temperature("t", 18.0).status, Status::Normal);
        assert_eq!(policy.temperature("t", 22.99).status, Status::Normal);
        assert_eq!(policy.temperature("t", 23.0).status, Status::Warning);
        assert_eq!(policy.temperature("t", 25.0).status, Status::Warning);
        assert_eq!(policy.temperature("t", 25.01).status, Status::Critical);
        assert!(policy.temperature("t", 20.0).alert.is_none());
    }

    #[test]
    fn test_temperature_alert_texts() {
        // ---
        let policy = Thresholds::default();

        let warning = policy.temperature("NOC temperature", 24.0).alert.unwrap();
        assert_eq!(warning.severity, Severity::Warning);
        assert_eq!(
            warning.text,
            "WARNING: NOC temperature is at 24°C (warning range: 23°C - 25°C)!"
        );

        // 26 is above the critical ceiling, so it is not a warning
        let critical = policy.temperature("NOC temperature", 26.0).alert.unwrap();
        assert_eq!(critical.severity, Severity::Critical);
        assert_eq!(
            critical.text,
            "CRITICAL ALERT: NOC temperature is at 26°C (outside safe range: 18°C - 25°C)!"
        );

        let fractional = policy.temperature("UPS temperature", 23.5).alert.unwrap();
        assert_eq!(
            fractional.text,
            "WARNING: UPS temperature is at 23.5°C (warning range: 23°C - 25°C)!"
        );
    }

    #[test]
    fn test_humidity_classes_hold_across_range() {
        // ---
        let policy = Thresholds::default();
        for v in sweep(0.0, 100.0, 0.5) {
            let status = policy.humidity("NOC humidity", v).status;
            let expected = if v < 30.0 || v > 60.0 {
                Status::Warning
            } else {
                Status::Normal
            };
            assert_eq!(status, expected, "humidity {v}");
        }

        let low = policy.humidity("UPS humidity", 25.0).alert.unwrap();
        assert_eq!(low.text, "WARNING: UPS humidity is too low at 25% (minimum: 30%)!");
        let high = policy.humidity("UPS humidity", 61.5).alert.unwrap();
        assert_eq!(high.text, "WARNING: UPS humidity is too high at 61.5% (maximum: 60%)!");
    }

    #[test]
    fn test_voltage_classes_hold_across_range() {
        // ---
        let policy = Thresholds::default();
        for v in sweep(180.0, 270.0, 0.5) {
            let status = policy.voltage("Phase R", v).status;
            let expected = if v <= 200.0 || v >= 250.0 {
                Status::Critical
            } else if v <= 210.0 || v >= 240.0 {
                Status::Warning
            } else {
                Status::Normal
            };
            assert_eq!(status, expected, "voltage {v}");
        }
    }

    #[test]
    fn test_voltage_alert_texts() {
        // ---
        let policy = Thresholds::default();
        let cases = [
            (200.0, "CRITICAL ALERT: Phase S voltage is too low at 200V (threshold: 200V)!"),
            (251.0, "CRITICAL ALERT: Phase S voltage is too high at 251V (threshold: 250V)!"),
            (205.5, "WARNING: Phase S voltage is low at 205.5V (threshold: 210V)!"),
            (240.0, "WARNING: Phase S voltage is high at 240V (threshold: 240V)!"),
        ];
        for (value, text) in cases {
            assert_eq!(policy.voltage("Phase S", value).alert.unwrap().text, text);
        }
        assert!(policy.voltage("Phase S", 220.0).alert.is_none());
    }

    #[test]
    fn test_fire_and_smoke() {
        // ---
        let policy = Thresholds::default();

        let fire = policy.fire(10);
        assert_eq!(fire.status, Status::Critical);
        assert_eq!(
            fire.alert.unwrap().text,
            "CRITICAL ALERT: Fire detected! Take immediate action."
        );
        assert_eq!(policy.fire(49).status, Status::Critical);
        assert_eq!(policy.fire(50), Evaluation::normal());
        assert!(policy.fire(80).alert.is_none());

        let smoke = policy.smoke(0);
        assert_eq!(smoke.status, Status::Warning);
        assert_eq!(smoke.alert.unwrap().severity, Severity::Warning);
        assert!(policy.smoke(1).alert.is_none());
    }

    #[test]
    fn test_severity_classification_prefers_critical() {
        // ---
        assert_eq!(Severity::classify("CRITICAL ALERT: x"), Severity::Critical);
        assert_eq!(Severity::classify("critical warning"), Severity::Critical);
        assert_eq!(Severity::classify("WARNING: y"), Severity::Warning);
        assert_eq!(Severity::classify("door opened"), Severity::Info);
        assert_eq!(Severity::Info.title(), "Information");
    }
}
