//! Logging setup
//!
//! Installs a global `tracing` subscriber. `RUST_LOG` directives are honoured
//! on top of the configured level.

use std::str::FromStr;

use tracing::Level;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::LogSettings;
use crate::errors::{Result, SessionError};

/// Configuration for the logging system
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub level: Level,
    /// Emit JSON lines instead of human readable output
    pub json: bool,
    /// Include file and line of the log statement
    pub file_info: bool,
    /// Log span enter/exit events
    pub log_spans: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            json: false,
            file_info: false,
            log_spans: false,
        }
    }
}

impl LoggingConfig {
    pub fn new(level: Level) -> Self {
        Self {
            level,
            ..Default::default()
        }
    }

    /// Build from the `[logging]` section of a configuration file
    pub fn from_settings(settings: &LogSettings) -> Result<Self> {
        Ok(Self {
            level: parse_log_level(&settings.level)?,
            json: settings.json,
            file_info: settings.file_info,
            log_spans: false,
        })
    }

    pub fn with_json(mut self) -> Self {
        self.json = true;
        self
    }

    pub fn with_file_info(mut self) -> Self {
        self.file_info = true;
        self
    }

    pub fn with_spans(mut self) -> Self {
        self.log_spans = true;
        self
    }
}

/// Install the global subscriber
///
/// Fails if a global subscriber is already set.
///
/// # Examples
///
/// ```
/// use cleanlink_session_core::{setup_logging, GuardConfig, LoggingConfig};
///
/// let config = GuardConfig::from_toml_str("[logging]\nlevel = \"debug\"\nfile_info = true").unwrap();
/// setup_logging(LoggingConfig::from_settings(&config.logging).unwrap()).unwrap();
///
/// // Only one global subscriber per process
/// assert!(setup_logging(LoggingConfig::default()).is_err());
/// ```
pub fn setup_logging(config: LoggingConfig) -> Result<()> {
    let filter = EnvFilter::from_default_env().add_directive(config.level.into());

    let span_events = if config.log_spans {
        FmtSpan::ACTIVE
    } else {
        FmtSpan::NONE
    };

    let builder = fmt::Subscriber::builder()
        .with_env_filter(filter)
        .with_span_events(span_events)
        .with_file(config.file_info)
        .with_line_number(config.file_info);

    let installed = if config.json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };

    installed.map_err(|e| SessionError::config(format!("Failed to install logging subscriber: {}", e)))
}

/// Parse a log level name such as `debug` or `WARN`
pub fn parse_log_level(level: &str) -> Result<Level> {
    Level::from_str(level).map_err(|_| SessionError::config(format!("Invalid log level: {}", level)))
}
