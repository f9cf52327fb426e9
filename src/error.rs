//! Custom error types for the telemetry tier.
//!
//! This module defines the primary error type, `TelemetryError`, for the whole
//! crate. Using the `thiserror` crate, it provides a centralized and consistent
//! way to classify the conditions the streaming pipeline can run into:
//!
//! - **`MalformedFrame`** / **`HeaderParse`**: an inbound measurement frame
//!   could not be decoded (bad header JSON, wrong part count, short binary
//!   block). Recoverable; the offending frame is dropped and decoding resumes
//!   with the next frame.
//! - **`BinaryChannelDecode`**: a digital channel was routed through the analog
//!   decode path. This indicates inconsistent channel metadata in the frame.
//! - **`MergeInconsistency`**: a low-range channel arrived without its validity
//!   channel, so dual-range merging cannot be performed. Recoverable, frame is
//!   dropped.
//! - **`Config`** / **`Configuration`**: configuration file parse failures and
//!   semantic validation failures, respectively.
//! - **`ServiceUnavailable`**: the telemetry service command channel is closed.
//!
//! Contract violations (adding more samples to a ring buffer than one level
//! holds, constructing a buffer with zero levels) are not represented here:
//! those fail fast with a panic at the call site, since they indicate a bug
//! rather than a runtime data condition.

use thiserror::Error;

/// Convenience alias for results using the crate error type.
pub type TelemetryResult<T> = std::result::Result<T, TelemetryError>;

/// Errors raised by the telemetry decode, merge, cache, and service layers.
#[derive(Error, Debug)]
pub enum TelemetryError {
    /// A frame violated the multipart layout (part count, block alignment).
    #[error("Malformed frame: {0}")]
    MalformedFrame(String),

    /// The JSON frame header could not be parsed.
    #[error("Frame header parse error: {0}")]
    HeaderParse(#[from] serde_json::Error),

    /// A digital channel was routed through the analog decode path.
    #[error("Cannot decode digital channel '{0}' through the analog path")]
    BinaryChannelDecode(String),

    /// A dual-range channel group cannot be merged as declared.
    #[error("Channel merge inconsistency: {0}")]
    MergeInconsistency(String),

    /// Configuration sources could not be read or parsed.
    #[error("Configuration error: {0}")]
    Config(#[from] figment::Error),

    /// Configuration parsed but failed semantic validation.
    #[error("Configuration validation error: {0}")]
    Configuration(String),

    /// The service command channel is closed.
    #[error("Telemetry service is not running")]
    ServiceUnavailable,
}

impl TelemetryError {
    /// Whether the condition is recoverable by dropping the offending frame
    /// and continuing with the next one.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            TelemetryError::MalformedFrame(_)
                | TelemetryError::HeaderParse(_)
                | TelemetryError::BinaryChannelDecode(_)
                | TelemetryError::MergeInconsistency(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_errors_are_recoverable() {
        assert!(TelemetryError::MalformedFrame("3 parts".into()).is_recoverable());
        assert!(TelemetryError::MergeInconsistency("no validity".into()).is_recoverable());
    }

    #[test]
    fn configuration_errors_are_not_recoverable() {
        assert!(!TelemetryError::Configuration("levels = 0".into()).is_recoverable());
        assert!(!TelemetryError::ServiceUnavailable.is_recoverable());
    }
}
