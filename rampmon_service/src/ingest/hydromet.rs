/// Reclamation Hydromet daily data client
///
/// Retrieves daily values for Pacific Northwest Region stations from the
/// Bureau of Reclamation Hydromet CGI endpoint as CSV text, and parses them
/// into `Observation`s.
///
/// Endpoint: https://www.usbr.gov/pn-bin/daily.pl
/// Query contract: `station`, `format=csv`, start `year/month/day`, end
/// `year/month/day` (the date keys repeat, start first), then one `pcode`
/// per requested parameter.

use crate::model::{
    COLUMN_DATETIME, Dataset, DateWindow, FetchError, Observation, PCODE_DISCHARGE,
    PCODE_FOREBAY, ParseError, column_name,
};
use chrono::{Datelike, NaiveDate, NaiveDateTime};
use std::io::Write;
use std::time::Duration;

/// Timestamp layouts seen in Hydromet CSV output, tried in order.
const DATETIME_FORMATS: &[&str] = &["%Y-%m-%d %H:%M", "%Y-%m-%d %H:%M:%S", "%m/%d/%Y %H:%M"];
const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%m/%d/%Y"];

/// Timestamp layout used when writing CSV. Lossless for whole seconds.
const WRITE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

// ============================================================================
// URL Construction
// ============================================================================

/// Builds the daily-values query URL for a station and date window.
pub fn build_daily_url(base_url: &str, station: &str, window: &DateWindow, pcodes: &[&str]) -> String {
    let mut url = format!(
        "{}?station={}&format=csv&year={}&month={}&day={}&year={}&month={}&day={}",
        base_url,
        station,
        window.start.year(),
        window.start.month(),
        window.start.day(),
        window.end.year(),
        window.end.month(),
        window.end.day()
    );
    for pcode in pcodes {
        url.push_str("&pcode=");
        url.push_str(pcode);
    }
    url
}

// ============================================================================
// HTTP Source
// ============================================================================

/// Anything that can turn a URL into a response body.
///
/// The fetch pipeline only talks to this trait, so tests can substitute a
/// canned or counting source for the real endpoint.
pub trait HydrometSource {
    fn get_text(&self, url: &str) -> Result<String, FetchError>;
}

/// Blocking HTTP source backed by reqwest.
pub struct HttpSource {
    client: reqwest::blocking::Client,
}

impl HttpSource {
    pub fn new(timeout: Duration) -> Result<Self, FetchError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("rampmon_service/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| FetchError::Transport(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self { client })
    }
}

fn classify_reqwest_error(e: reqwest::Error) -> FetchError {
    if e.is_timeout() {
        FetchError::Timeout(e.to_string())
    } else {
        FetchError::Transport(e.to_string())
    }
}

impl HydrometSource for HttpSource {
    fn get_text(&self, url: &str) -> Result<String, FetchError> {
        let response = self
            .client
            .get(url)
            .header("Accept", "text/csv, text/plain")
            .send()
            .map_err(classify_reqwest_error)?;

        if !response.status().is_success() {
            return Err(FetchError::HttpStatus(response.status().as_u16()));
        }

        response.text().map_err(classify_reqwest_error)
    }
}

// ============================================================================
// CSV Parsing
// ============================================================================

fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .or_else(|| {
            DATE_FORMATS
                .iter()
                .find_map(|fmt| NaiveDate::parse_from_str(raw, fmt).ok())
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

fn parse_reading(raw: &str) -> Option<f64> {
    raw.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Parses a Hydromet daily CSV body for `station`.
///
/// Requires a header row with `DateTime` and `{station}_fb`; `{station}_qj`
/// is read when present. Rows come back in the order they appear.
pub fn parse_daily_csv(body: &str, station: &str) -> Result<Vec<Observation>, ParseError> {
    let forebay_col = column_name(station, PCODE_FOREBAY);
    let discharge_col = column_name(station, PCODE_DISCHARGE);

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(body.as_bytes());

    let headers = reader
        .headers()
        .map_err(|e| ParseError::Csv(e.to_string()))?
        .clone();
    let index_of = |name: &str| headers.iter().position(|h| h == name);

    let datetime_idx =
        index_of(COLUMN_DATETIME).ok_or_else(|| ParseError::MissingColumn(COLUMN_DATETIME.to_string()))?;
    let forebay_idx = index_of(forebay_col.as_str()).ok_or_else(|| ParseError::MissingColumn(forebay_col.clone()))?;
    let discharge_idx = index_of(discharge_col.as_str());

    let mut observations = Vec::new();

    for (i, record) in reader.records().enumerate() {
        let record = record.map_err(|e| ParseError::Csv(e.to_string()))?;
        let row = i + 1;

        if record.iter().all(str::is_empty) {
            continue;
        }

        let raw_time = record.get(datetime_idx).unwrap_or("");
        let timestamp = parse_timestamp(raw_time).ok_or_else(|| ParseError::InvalidTimestamp {
            row,
            value: raw_time.to_string(),
        })?;

        let raw_reading = record.get(forebay_idx).unwrap_or("");
        let gauge_reading_ft = parse_reading(raw_reading).ok_or_else(|| ParseError::InvalidReading {
            row,
            column: forebay_col.clone(),
            value: raw_reading.to_string(),
        })?;

        // Discharge is informational only; gaps and junk become None.
        let discharge_cfs = discharge_idx
            .and_then(|idx| record.get(idx))
            .and_then(parse_reading);

        observations.push(Observation {
            timestamp,
            gauge_reading_ft,
            discharge_cfs,
        });
    }

    Ok(observations)
}

// ============================================================================
// CSV Writing
// ============================================================================

/// Writes a dataset back out in Hydromet column layout.
///
/// Adds a trailing `depth_at_ramp` column when a reference has been applied;
/// `parse_daily_csv` ignores it, so output stays re-readable.
pub fn write_csv<W: Write>(dataset: &Dataset, writer: W) -> csv::Result<()> {
    let mut out = csv::Writer::from_writer(writer);

    let mut header = vec![
        COLUMN_DATETIME.to_string(),
        column_name(&dataset.station, PCODE_FOREBAY),
        column_name(&dataset.station, PCODE_DISCHARGE),
    ];
    if dataset.depth_at_ramp.is_some() {
        header.push("depth_at_ramp".to_string());
    }
    out.write_record(&header)?;

    let depths = dataset.depth_at_ramp.as_ref().map(|d| &d.values);
    for (i, obs) in dataset.observations.iter().enumerate() {
        let mut record = vec![
            obs.timestamp.format(WRITE_FORMAT).to_string(),
            obs.gauge_reading_ft.to_string(),
            obs.discharge_cfs.map(|q| q.to_string()).unwrap_or_default(),
        ];
        if let Some(values) = depths {
            record.push(values.get(i).map(|d| d.to_string()).unwrap_or_default());
        }
        out.write_record(&record)?;
    }

    out.flush()?;
    Ok(())
}

/// Encodes a dataset as CSV text.
pub fn encode_csv(dataset: &Dataset) -> Result<String, ParseError> {
    let mut buf = Vec::new();
    write_csv(dataset, &mut buf).map_err(|e| ParseError::Csv(e.to_string()))?;
    String::from_utf8(buf).map_err(|e| ParseError::Csv(e.to_string()))
}

// ============================================================================
// Tests
// ============================================================================
