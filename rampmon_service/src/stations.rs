/// Station registry for the ramp depth monitoring service.
///
/// Defines the Hydromet stations this service knows how to query, along with
/// the reference elevation each one defaults to. Howard Prairie Dam (`hpd`)
/// is built in; further stations can be supplied from a TOML file with a
/// `[[station]]` table per entry.

use crate::config::ConfigError;
use crate::model::{DEFAULT_REFERENCE_ELEVATION_FT, PCODE_DISCHARGE, PCODE_FOREBAY};
use serde::Deserialize;
use std::path::Path;

// ---------------------------------------------------------------------------
// Station metadata
// ---------------------------------------------------------------------------

/// Metadata for a single Hydromet station.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Station {
    /// Lowercase Hydromet station code, e.g. `hpd`.
    pub code: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Reference elevation offered to the user before they pick one.
    #[serde(default = "default_reference_ft")]
    pub default_reference_ft: f64,
    /// Parameter codes requested for this station. `fb` must be first.
    #[serde(default = "default_pcodes")]
    pub pcodes: Vec<String>,
}

fn default_reference_ft() -> f64 {
    DEFAULT_REFERENCE_ELEVATION_FT
}

fn default_pcodes() -> Vec<String> {
    vec![PCODE_FOREBAY.to_string(), PCODE_DISCHARGE.to_string()]
}

#[derive(Debug, Deserialize)]
struct StationFile {
    #[serde(default)]
    station: Vec<Station>,
}

/// Stations compiled into the binary.
pub fn builtin_stations() -> Vec<Station> {
    vec![Station {
        code: "hpd".to_string(),
        name: "Howard Prairie Lake".to_string(),
        description: "Howard Prairie Dam forebay on Beaver Creek, Rogue River basin, OR. \
                      Reference elevation is the bottom of the public boat ramp."
            .to_string(),
        default_reference_ft: DEFAULT_REFERENCE_ELEVATION_FT,
        pcodes: default_pcodes(),
    }]
}

/// Hydromet station codes are short lowercase ASCII alphanumerics.
pub fn is_valid_station_code(code: &str) -> bool {
    !code.is_empty()
        && code.len() <= 8
        && code
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
}

/// Hydromet parameter codes are short lowercase ASCII alphanumerics.
pub fn is_valid_pcode(pcode: &str) -> bool {
    !pcode.is_empty()
        && pcode.len() <= 8
        && pcode
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
}

/// Looks up a station by code. Returns `None` if not found.
pub fn find_station<'a>(stations: &'a [Station], code: &str) -> Option<&'a Station> {
    stations.iter().find(|s| s.code == code)
}

/// Parses a station list from TOML text and merges it over the built-ins.
///
/// A file entry with the same code as a built-in replaces it.
pub fn parse_stations(text: &str) -> Result<Vec<Station>, ConfigError> {
    let file: StationFile =
        toml::from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))?;

    let mut stations = builtin_stations();
    for station in file.station {
        if !is_valid_station_code(&station.code) {
            return Err(ConfigError::Invalid(format!(
                "station code '{}' must be lowercase alphanumeric",
                station.code
            )));
        }
        if let Some(bad) = station.pcodes.iter().find(|p| !is_valid_pcode(p)) {
            return Err(ConfigError::Invalid(format!(
                "station '{}' has invalid pcode '{}'",
                station.code, bad
            )));
        }
        if station.pcodes.first().map(String::as_str) != Some(PCODE_FOREBAY) {
            return Err(ConfigError::Invalid(format!(
                "station '{}' must request '{}' first",
                station.code, PCODE_FOREBAY
            )));
        }
        match stations.iter_mut().find(|s| s.code == station.code) {
            Some(existing) => *existing = station,
            None => stations.push(station),
        }
    }
    Ok(stations)
}

/// Loads stations from a TOML file, merged over the built-ins.
pub fn load_stations(path: &Path) -> Result<Vec<Station>, ConfigError> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| ConfigError::Io(format!("{}: {}", path.display(), e)))?;
    parse_stations(&text)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
