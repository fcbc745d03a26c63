//! Data Source Verification Module
//!
//! Checks configured stations against the live Hydromet endpoint to see
//! which ones answer, which expected columns come back, and whether the
//! rows parse. Run it before adding a station to the registry.

use crate::config::AppConfig;
use crate::ingest::hydromet::{build_daily_url, parse_daily_csv};
use crate::model::{COLUMN_DATETIME, DateWindow, FetchError, column_name};
use crate::stations::Station;
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Days requested for a verification probe.
const PROBE_WINDOW_DAYS: i64 = 2;

// ============================================================================
// Verification Results
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationReport {
    pub timestamp: String,
    pub results: Vec<StationVerification>,
    pub summary: VerificationSummary,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationSummary {
    pub total: usize,
    pub working: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StationVerification {
    pub station: String,
    pub name: String,
    pub url: String,
    pub status: VerificationStatus,
    pub endpoint_reachable: bool,
    pub http_status: Option<u16>,
    pub columns_expected: Vec<String>,
    pub columns_missing: Vec<String>,
    pub sample_row_count: usize,
    pub error_message: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum VerificationStatus {
    Success,
    PartialSuccess,
    Failed,
}

// ============================================================================
// Station Verification
// ============================================================================

/// Columns a response for `station` should carry.
pub fn expected_columns(station: &Station) -> Vec<String> {
    std::iter::once(COLUMN_DATETIME.to_string())
        .chain(station.pcodes.iter().map(|p| column_name(&station.code, p)))
        .collect()
}

/// Header names of a CSV body, read the way `parse_daily_csv` reads them.
/// Empty if there is no header line.
fn header_columns(body: &str) -> Vec<String> {
    csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(body.as_bytes())
        .headers()
        .map(|headers| headers.iter().map(str::to_string).collect())
        .unwrap_or_default()
}

/// Grades an already-fetched body. Split out from the HTTP call so the
/// grading rules are testable offline.
pub fn assess_body(result: &mut StationVerification, station: &Station, body: &str) {
    let present = header_columns(body);
    result.columns_missing = result
        .columns_expected
        .iter()
        .filter(|c| !present.contains(*c))
        .cloned()
        .collect();

    match parse_daily_csv(body, &station.code) {
        Ok(observations) => result.sample_row_count = observations.len(),
        Err(e) => result.error_message = Some(e.to_string()),
    }

    result.status = if result.error_message.is_some() {
        VerificationStatus::Failed
    } else if result.columns_missing.is_empty() && result.sample_row_count > 0 {
        VerificationStatus::Success
    } else {
        // Parsed, but a secondary column is absent or the window was empty.
        VerificationStatus::PartialSuccess
    };
}

pub fn verify_station(
    client: &reqwest::blocking::Client,
    base_url: &str,
    station: &Station,
    today: NaiveDate,
) -> StationVerification {
    let window = DateWindow::ending_at(today, PROBE_WINDOW_DAYS).unwrap_or(DateWindow {
        start: today,
        end: today,
    });
    let pcodes: Vec<&str> = station.pcodes.iter().map(String::as_str).collect();
    let url = build_daily_url(base_url, &station.code, &window, &pcodes);

    let mut result = StationVerification {
        station: station.code.clone(),
        name: station.name.clone(),
        url: url.clone(),
        status: VerificationStatus::Failed,
        endpoint_reachable: false,
        http_status: None,
        columns_expected: expected_columns(station),
        columns_missing: Vec::new(),
        sample_row_count: 0,
        error_message: None,
    };

    match client.get(&url).timeout(Duration::from_secs(10)).send() {
        Ok(response) => {
            result.endpoint_reachable = true;
            result.http_status = Some(response.status().as_u16());

            if response.status().is_success() {
                match response.text() {
                    Ok(body) => assess_body(&mut result, station, &body),
                    Err(e) => result.error_message = Some(format!("Failed to read response: {}", e)),
                }
            } else {
                result.error_message = Some(FetchError::HttpStatus(response.status().as_u16()).to_string());
            }
        }
        Err(e) => {
            result.error_message = Some(format!("Request failed: {}", e));
        }
    }

    result
}

// ============================================================================
// Full Verification Runner
// ============================================================================

pub fn summarize(results: &[StationVerification]) -> VerificationSummary {
    let working = results
        .iter()
        .filter(|r| r.status != VerificationStatus::Failed)
        .count();
    VerificationSummary {
        total: results.len(),
        working,
        failed: results.len() - working,
    }
}

pub fn run_verification(config: &AppConfig, stations: &[Station]) -> Result<VerificationReport, FetchError> {
    let client = reqwest::blocking::Client::builder()
        .timeout(config.http_timeout())
        .build()
        .map_err(|e| FetchError::Transport(e.to_string()))?;

    let today = chrono::Local::now().date_naive();
    let results: Vec<_> = stations
        .iter()
        .map(|s| verify_station(&client, &config.base_url, s, today))
        .collect();

    Ok(VerificationReport {
        timestamp: Utc::now().to_rfc3339(),
        summary: summarize(&results),
        results,
    })
}
