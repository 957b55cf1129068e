//! CSV export: as-of join of the zone series and delimited text rendering.
//!
//! Rendering rules: a descriptive header line, then one line per row joined
//! by `\n` without a trailing newline. Text cells are double-quoted, numbers
//! are written bare, and missing values leave the cell empty.

use std::{fmt, str::FromStr};

use chrono::{NaiveDate, NaiveDateTime};

use crate::history::TimeRange;
use crate::models::{local_time, ElectricalReading, Metric, SeriesPoint};

// ---

/// Exportable dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportKind {
    Temperature,
    Humidity,
    Electrical,
}

impl ExportKind {
    // ---
    pub fn name(self) -> &'static str {
        match self {
            ExportKind::Temperature => "temperature",
            ExportKind::Humidity => "humidity",
            ExportKind::Electrical => "electrical",
        }
    }

    /// Climate metric behind this export, `None` for the electrical feed.
    pub fn metric(self) -> Option<Metric> {
        match self {
            ExportKind::Temperature => Some(Metric::Temperature),
            ExportKind::Humidity => Some(Metric::Humidity),
            ExportKind::Electrical => None,
        }
    }

    pub fn header(self) -> &'static str {
        match self {
            ExportKind::Temperature => {
                "Timestamp,NOC Temperature (°C),UPS Temperature (°C),Data Center Temperature (°C)"
            }
            ExportKind::Humidity => {
                "Timestamp,NOC Humidity (%),UPS Humidity (%),Data Center Humidity (%)"
            }
            ExportKind::Electrical => {
                "Timestamp,Phase R (V),Phase S (V),Phase T (V),Power (kW),Frequency (Hz),Power Factor"
            }
        }
    }
}

impl FromStr for ExportKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "temperature" => Ok(ExportKind::Temperature),
            "humidity" => Ok(ExportKind::Humidity),
            "electrical" => Ok(ExportKind::Electrical),
            other => Err(other.to_string()),
        }
    }
}

/// A rendered export ready to be served as an attachment.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportFile {
    pub filename: String,
    pub body: String,
}

/// One CSV cell.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Text(String),
    Number(f64),
    Empty,
}

impl From<NaiveDateTime> for Cell {
    fn from(ts: NaiveDateTime) -> Self {
        Cell::Text(ts.format(local_time::FORMAT).to_string())
    }
}

impl From<Option<f64>> for Cell {
    fn from(value: Option<f64>) -> Self {
        value.map_or(Cell::Empty, Cell::Number)
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Text(text) => write!(f, "\"{}\"", text),
            Cell::Number(n) => write!(f, "{}", n),
            Cell::Empty => Ok(()),
        }
    }
}

/// For each primary timestamp `T`, the value of the secondary sample with the
/// greatest timestamp `<= T`, or `None` if the secondary has nothing that
/// early.
///
/// Both inputs must be in ascending timestamp order. Among samples sharing a
/// timestamp the last one wins.
pub fn as_of_join(primary: &[SeriesPoint], secondary: &[SeriesPoint]) -> Vec<Option<f64>> {
    // ---
    let mut out = Vec::with_capacity(primary.len());
    let mut next = 0;
    let mut current: Option<f64> = None;

    for point in primary {
        while next < secondary.len() && secondary[next].timestamp <= point.timestamp {
            current = Some(secondary[next].value);
            next += 1;
        }
        out.push(current);
    }
    out
}

/// Rows of a climate export: primary timestamp, primary value, then one
/// as-of value per secondary series.
pub fn climate_rows(primary: &[SeriesPoint], secondaries: &[&[SeriesPoint]]) -> Vec<Vec<Cell>> {
    // ---
    let joined: Vec<Vec<Option<f64>>> = secondaries
        .iter()
        .map(|secondary| as_of_join(primary, secondary))
        .collect();

    primary
        .iter()
        .enumerate()
        .map(|(i, point)| {
            let mut row = vec![Cell::from(point.timestamp), Cell::Number(point.value)];
            row.extend(joined.iter().map(|column| Cell::from(column[i])));
            row
        })
        .collect()
}

pub fn electrical_rows(readings: &[ElectricalReading]) -> Vec<Vec<Cell>> {
    readings
        .iter()
        .map(|r| {
            vec![
                Cell::from(r.recorded_at),
                Cell::Number(r.phase_r),
                Cell::Number(r.phase_s),
                Cell::Number(r.phase_t),
                Cell::Number(r.power_3ph),
                Cell::Number(r.frequency_3ph),
                Cell::Number(r.pf_3ph),
            ]
        })
        .collect()
}

pub fn render_csv(header: &str, rows: &[Vec<Cell>]) -> String {
    // ---
    let lines: Vec<String> = rows
        .iter()
        .map(|row| {
            row.iter()
                .map(Cell::to_string)
                .collect::<Vec<_>>()
                .join(",")
        })
        .collect();

    format!("{}\n{}", header, lines.join("\n"))
}

/// `{kind}_data_{range}_{YYYY-MM-DD}.csv`
pub fn filename(kind: ExportKind, range: TimeRange, date: NaiveDate) -> String {
    format!("{}_data_{}_{}.csv", kind.name(), range.token(), date.format("%Y-%m-%d"))
}
