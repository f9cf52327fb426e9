//! Structured logging initialization.
//!
//! Uses `tracing` and `tracing-subscriber` to provide structured, filterable
//! diagnostics for the telemetry pipeline: frame drops and metadata
//! mismatches at `warn`, cache rebuilds at `info`, per-read cache hit/miss
//! details at `debug`. The `RUST_LOG` environment variable overrides the
//! configured level via `EnvFilter`.

use crate::config::Settings;
use crate::error::{TelemetryError, TelemetryResult};
use tracing::Level;
use tracing_subscriber::{fmt, EnvFilter};

/// Output format for log records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Pretty-printed with colors, for development.
    Pretty,
    /// Compact single-line records, for production.
    Compact,
    /// JSON records, for log aggregation.
    Json,
}

/// Initialize the global subscriber from the application settings.
///
/// Fails if the configured level or format string is not recognized, or if a
/// global subscriber is already installed.
pub fn init_from_settings(settings: &Settings) -> TelemetryResult<()> {
    let level = parse_level(&settings.application.log_level)?;
    let format = parse_format(&settings.application.log_format)?;
    init(level, format)
}

/// Initialize the global subscriber with explicit options.
pub fn init(level: Level, format: OutputFormat) -> TelemetryResult<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.to_string().to_lowercase()));

    let result = match format {
        OutputFormat::Pretty => fmt().with_env_filter(filter).pretty().try_init(),
        OutputFormat::Compact => fmt()
            .with_env_filter(filter)
            .compact()
            .with_ansi(false)
            .try_init(),
        OutputFormat::Json => fmt().with_env_filter(filter).json().try_init(),
    };

    result.map_err(|err| {
        TelemetryError::Configuration(format!("failed to install subscriber: {err}"))
    })
}

fn parse_level(value: &str) -> TelemetryResult<Level> {
    match value.to_lowercase().as_str() {
        "trace" => Ok(Level::TRACE),
        "debug" => Ok(Level::DEBUG),
        "info" => Ok(Level::INFO),
        "warn" | "warning" => Ok(Level::WARN),
        "error" => Ok(Level::ERROR),
        other => Err(TelemetryError::Configuration(format!(
            "invalid log level '{other}', expected trace/debug/info/warn/error"
        ))),
    }
}

fn parse_format(value: &str) -> TelemetryResult<OutputFormat> {
    match value.to_lowercase().as_str() {
        "pretty" => Ok(OutputFormat::Pretty),
        "compact" => Ok(OutputFormat::Compact),
        "json" => Ok(OutputFormat::Json),
        other => Err(TelemetryError::Configuration(format!(
            "invalid log format '{other}', expected pretty/compact/json"
        ))),
    }
}
