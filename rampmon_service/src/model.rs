/// Core data types for the ramp depth monitoring service.
///
/// This module defines the shared domain model imported by all other modules:
/// observations as delivered by the Hydromet daily feed, the dataset they
/// form, the derived depth-at-ramp column, the request date window, and the
/// error types for the fetch/parse pipeline.

use chrono::{Duration, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use thiserror::Error;

// ---------------------------------------------------------------------------
// Parameter codes
// ---------------------------------------------------------------------------

/// Hydromet parameter code for forebay (reservoir surface) elevation, in feet.
pub const PCODE_FOREBAY: &str = "fb";

/// Hydromet parameter code for mean daily discharge, in cubic feet per second.
pub const PCODE_DISCHARGE: &str = "qj";

/// Name of the timestamp column in every Hydromet CSV response.
pub const COLUMN_DATETIME: &str = "DateTime";

/// Reference elevation used when the user has not chosen one, in feet.
pub const DEFAULT_REFERENCE_ELEVATION_FT: f64 = 4501.0;

/// Number of days requested before the window's end date.
pub const DEFAULT_WINDOW_DAYS: i64 = 30;

/// Longest window accepted, roughly a century of daily rows.
pub const MAX_WINDOW_DAYS: i64 = 36_600;

/// Hydromet column name for a station/parameter pair, e.g. `hpd_fb`.
pub fn column_name(station: &str, pcode: &str) -> String {
    format!("{}_{}", station, pcode)
}

// ---------------------------------------------------------------------------
// Reading types
// ---------------------------------------------------------------------------

/// A single daily row from the Hydromet feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub timestamp: NaiveDateTime,
    /// Forebay elevation (`{station}_fb`), feet above datum.
    pub gauge_reading_ft: f64,
    /// Discharge (`{station}_qj`). Carried through but not used downstream.
    pub discharge_cfs: Option<f64>,
}

/// Water depth relative to a reference elevation, one value per observation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DepthColumn {
    pub reference_elevation_ft: f64,
    pub values: Vec<f64>,
}

/// Ordered observations for one station, plus the derived depth column once
/// a reference elevation has been applied.
///
/// Observations keep the order the provider delivered them in (ascending
/// timestamp); nothing in the crate re-sorts them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    pub station: String,
    pub observations: Vec<Observation>,
    pub depth_at_ramp: Option<DepthColumn>,
}

/// One row as handed to a renderer: when, and how deep at the ramp.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DepthRow {
    pub timestamp: NaiveDateTime,
    pub gauge_reading_ft: f64,
    pub depth_at_ramp_ft: f64,
}

impl Dataset {
    pub fn new(station: impl Into<String>, observations: Vec<Observation>) -> Self {
        Self {
            station: station.into(),
            observations,
            depth_at_ramp: None,
        }
    }

    pub fn len(&self) -> usize {
        self.observations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }

    /// Gauge readings in row order.
    pub fn readings(&self) -> impl Iterator<Item = f64> + '_ {
        self.observations.iter().map(|o| o.gauge_reading_ft)
    }

    /// Rows joined with the depth column. Empty if no reference has been applied.
    pub fn depth_rows(&self) -> Vec<DepthRow> {
        match &self.depth_at_ramp {
            Some(depth) => self
                .observations
                .iter()
                .zip(depth.values.iter())
                .map(|(obs, &depth_ft)| DepthRow {
                    timestamp: obs.timestamp,
                    gauge_reading_ft: obs.gauge_reading_ft,
                    depth_at_ramp_ft: depth_ft,
                })
                .collect(),
            None => Vec::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// Request window
// ---------------------------------------------------------------------------

/// Which calendar day closes the request window when none is given.
///
/// Blank forebay values are rejected by the parser, so the default stops at
/// yesterday: today's row can arrive with an empty `fb` until the provider's
/// daily run completes, which would fail the whole pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EndDatePolicy {
    /// The window ends today. May fail with `InvalidReading` early in the day.
    Today,
    /// The window ends yesterday, the last fully reported day.
    #[default]
    Yesterday,
}

impl EndDatePolicy {
    pub fn resolve(self, today: NaiveDate) -> NaiveDate {
        match self {
            EndDatePolicy::Today => today,
            EndDatePolicy::Yesterday => today.pred_opt().unwrap_or(today),
        }
    }
}

impl std::str::FromStr for EndDatePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "today" => Ok(EndDatePolicy::Today),
            "yesterday" => Ok(EndDatePolicy::Yesterday),
            other => Err(format!("unknown end date policy '{}'", other)),
        }
    }
}

/// Inclusive date range sent to the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DateWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateWindow {
    /// Window of `window_days` days ending at `end` (start = end - window_days).
    ///
    /// `None` when the start would fall outside the representable date range.
    pub fn ending_at(end: NaiveDate, window_days: i64) -> Option<Self> {
        let start = end.checked_sub_signed(Duration::try_days(window_days)?)?;
        Some(Self { start, end })
    }
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// The request never produced a usable response body.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FetchError {
    /// Non-2xx HTTP response from the provider.
    #[error("HTTP error: {0}")]
    HttpStatus(u16),
    /// The request did not complete within the client timeout.
    #[error("request timed out: {0}")]
    Timeout(String),
    /// Connection, TLS or body read failure.
    #[error("request failed: {0}")]
    Transport(String),
}

/// The response body was not the CSV we expect.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParseError {
    #[error("Parse error: missing column '{0}'")]
    MissingColumn(String),
    #[error("Parse error: row {row}: '{value}' is not a valid timestamp")]
    InvalidTimestamp { row: usize, value: String },
    #[error("Parse error: row {row}: '{value}' in column '{column}' is not numeric")]
    InvalidReading {
        row: usize,
        column: String,
        value: String,
    },
    #[error("Parse error: {0}")]
    Csv(String),
}

/// Anything that can abort a fetch-and-normalize pass.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LevelsError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error("reference elevation must be finite, got {0}")]
    InvalidReference(f64),
    #[error("window must cover at least one day, got {0}")]
    InvalidWindow(i64),
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
