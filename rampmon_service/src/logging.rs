/// Structured logging for the ramp depth service
///
/// Provides leveled logging tagged with the component and station that
/// produced the message. Console output goes to stderr so rendered data on
/// stdout stays clean; an optional log file receives timestamped entries.

use crate::model::{FetchError, LevelsError};
use crate::render::RenderError;
use chrono::Utc;
use serde::Deserialize;
use std::fmt;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

// ---------------------------------------------------------------------------
// Log Levels
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    #[serde(alias = "warn")]
    Warning,
    Error,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogLevel::Debug => write!(f, "DEBUG"),
            LogLevel::Info => write!(f, "INFO"),
            LogLevel::Warning => write!(f, "WARN"),
            LogLevel::Error => write!(f, "ERROR"),
        }
    }
}

impl std::str::FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" | "warning" => Ok(LogLevel::Warning),
            "error" => Ok(LogLevel::Error),
            other => Err(format!("unknown log level '{}'", other)),
        }
    }
}

// ---------------------------------------------------------------------------
// Components
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Component {
    Hydromet,
    Cache,
    Render,
    System,
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Component::Hydromet => write!(f, "HYDROMET"),
            Component::Cache => write!(f, "CACHE"),
            Component::Render => write!(f, "RENDER"),
            Component::System => write!(f, "SYS"),
        }
    }
}

// ---------------------------------------------------------------------------
// Failure Classification
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureType {
    /// Expected failure - bad user input, nothing wrong with the service
    Expected,
    /// Unexpected failure - provider rejected the request or changed its format
    Unexpected,
    /// Unknown - network trouble that may or may not clear on its own
    Unknown,
}

impl fmt::Display for FailureType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureType::Expected => write!(f, "EXPECTED"),
            FailureType::Unexpected => write!(f, "UNEXPECTED"),
            FailureType::Unknown => write!(f, "UNKNOWN"),
        }
    }
}

// ---------------------------------------------------------------------------
// Logger Configuration
// ---------------------------------------------------------------------------

/// Global logger instance
static LOGGER: Mutex<Option<Logger>> = Mutex::new(None);

pub struct Logger {
    /// Minimum log level to display
    min_level: LogLevel,
    /// Optional file path for logging
    log_file: Option<PathBuf>,
    /// Whether to include timestamps in console output
    console_timestamps: bool,
}

impl Logger {
    fn format_entry(level: LogLevel, component: Component, station: Option<&str>, message: &str) -> String {
        let timestamp = Utc::now().format("%Y-%m-%d %H:%M:%S UTC");
        let station_part = station.map(|s| format!(" [{}]", s)).unwrap_or_default();
        format!("{} {} {}{}: {}", timestamp, level, component, station_part, message)
    }

    fn log(&self, level: LogLevel, component: Component, station: Option<&str>, message: &str) {
        if level < self.min_level {
            return;
        }

        let log_entry = Self::format_entry(level, component, station, message);
        let station_part = station.map(|s| format!(" [{}]", s)).unwrap_or_default();

        if self.console_timestamps {
            eprintln!("{}", log_entry);
        } else {
            match level {
                LogLevel::Error => eprintln!("   ✗ {}{}: {}", component, station_part, message),
                LogLevel::Warning => eprintln!("   ⚠ {}{}: {}", component, station_part, message),
                LogLevel::Info => eprintln!("   {}", message),
                LogLevel::Debug => eprintln!("   [DEBUG] {}{}: {}", component, station_part, message),
            }
        }

        if let Some(ref path) = self.log_file {
            if let Err(e) = Self::append_to_file(path, &log_entry) {
                eprintln!("Failed to write to log file {}: {}", path.display(), e);
            }
        }
    }

    fn append_to_file(path: &Path, entry: &str) -> std::io::Result<()> {
        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        writeln!(file, "{}", entry)?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Public Logging Functions
// ---------------------------------------------------------------------------

/// Initialize the global logger. Calling it again replaces the settings.
pub fn init_logger(min_level: LogLevel, log_file: Option<&Path>, console_timestamps: bool) {
    let logger = Logger {
        min_level,
        log_file: log_file.map(Path::to_path_buf),
        console_timestamps,
    };
    if let Ok(mut guard) = LOGGER.lock() {
        *guard = Some(logger);
    }
}

fn log(level: LogLevel, component: Component, station: Option<&str>, message: &str) {
    if let Ok(guard) = LOGGER.lock() {
        if let Some(logger) = guard.as_ref() {
            logger.log(level, component, station, message);
        }
    }
}

/// Log a general informational message
pub fn info(component: Component, station: Option<&str>, message: &str) {
    log(LogLevel::Info, component, station, message);
}

/// Log a warning message
pub fn warn(component: Component, station: Option<&str>, message: &str) {
    log(LogLevel::Warning, component, station, message);
}

/// Log an error message
pub fn error(component: Component, station: Option<&str>, message: &str) {
    log(LogLevel::Error, component, station, message);
}

/// Log a debug message
pub fn debug(component: Component, station: Option<&str>, message: &str) {
    log(LogLevel::Debug, component, station, message);
}

// ---------------------------------------------------------------------------
// Failure Classification Helpers
// ---------------------------------------------------------------------------

/// Classify a failed pass by what went wrong.
pub fn classify_failure(err: &LevelsError) -> FailureType {
    match err {
        LevelsError::InvalidReference(_) | LevelsError::InvalidWindow(_) => FailureType::Expected,
        LevelsError::Fetch(FetchError::HttpStatus(_)) => FailureType::Unexpected,
        LevelsError::Fetch(FetchError::Timeout(_) | FetchError::Transport(_)) => FailureType::Unknown,
        // The provider changed its CSV layout or sent an error page.
        LevelsError::Parse(_) => FailureType::Unexpected,
    }
}

/// Log a failed fetch/normalize pass with automatic classification
pub fn log_fetch_failure(station: &str, operation: &str, err: &LevelsError) {
    let failure_type = classify_failure(err);
    let message = format!("{} failed [{}]: {}", operation, failure_type, err);

    match failure_type {
        FailureType::Expected => debug(Component::Hydromet, Some(station), &message),
        FailureType::Unexpected => error(Component::Hydromet, Some(station), &message),
        FailureType::Unknown => warn(Component::Hydromet, Some(station), &message),
    }
}

fn render_failure_message(format: &str, err: &RenderError) -> String {
    let failure_type = match err {
        // Caller handed over a dataset without a depth column.
        RenderError::MissingDepth => FailureType::Unexpected,
        // Closed pipe or full disk on the output side.
        RenderError::Io(_) => FailureType::Unknown,
        RenderError::Serialize(_) => FailureType::Unexpected,
    };
    format!("{} output failed [{}]: {}", format, failure_type, err)
}

/// Log a renderer that could not write its output
pub fn log_render_failure(station: &str, format: &str, err: &RenderError) {
    error(Component::Render, Some(station), &render_failure_message(format, err));
}

// ---------------------------------------------------------------------------
// Session Summary Logging
// ---------------------------------------------------------------------------

/// Log a summary of an interactive session
pub fn log_session_summary(total: usize, failed: usize, network_fetches: usize) {
    let message = format!(
        "Session complete: {}/{} passes rendered, {} failed, {} network fetches",
        total - failed,
        total,
        failed,
        network_fetches
    );

    if failed == 0 {
        info(Component::System, None, &message);
    } else if failed == total {
        error(Component::System, None, &message);
    } else {
        warn(Component::System, None, &message);
    }
}
