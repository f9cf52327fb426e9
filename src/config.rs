//! Configuration loading for the telemetry tier.
//!
//! Strongly-typed settings are loaded with `figment` from:
//! 1. a TOML file (`telemetry.toml` by default),
//! 2. environment variables prefixed with `TELEMETRY_`.
//!
//! Both sources are optional; every field carries a sensible default, so an
//! absent file yields a working configuration. After extraction the settings
//! go through [`Settings::validate`] for semantic checks that parsing cannot
//! express.
//!
//! # Example
//! ```no_run
//! use daq_telemetry::config::Settings;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let settings = Settings::load()?;
//! println!("history per level: {} samples", settings.cache.size);
//! # Ok(())
//! # }
//! ```

use crate::data::cache::CacheConfig;
use crate::decoder::DecoderConfig;
use crate::error::{TelemetryError, TelemetryResult};
use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default configuration file next to the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "telemetry.toml";

/// Environment variable prefix for overrides.
pub const ENV_PREFIX: &str = "TELEMETRY_";

/// Top-level telemetry configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    /// Application-level settings.
    #[serde(default)]
    pub application: ApplicationSettings,
    /// Ring buffer geometry for the data cache.
    #[serde(default)]
    pub cache: CacheSettings,
    /// Frame decoder settings.
    #[serde(default)]
    pub decoder: DecoderSettings,
}

/// Application-level settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplicationSettings {
    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Logging output format (pretty, compact, json).
    #[serde(default = "default_log_format")]
    pub log_format: String,
}

impl Default for ApplicationSettings {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: default_log_format(),
        }
    }
}

/// Ring buffer geometry, fixed for the process lifetime.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheSettings {
    /// Samples of history per resolution level.
    #[serde(default = "default_size")]
    pub size: usize,
    /// Number of resolution levels.
    #[serde(default = "default_levels")]
    pub levels: usize,
    /// Ratio between adjacent resolution levels.
    #[serde(default = "default_aggregation_factor")]
    pub aggregation_factor: usize,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            size: default_size(),
            levels: default_levels(),
            aggregation_factor: default_aggregation_factor(),
        }
    }
}

/// Frame decoder settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecoderSettings {
    /// Maximum downstream data rate towards web clients, samples per second.
    #[serde(default = "default_web_data_rate")]
    pub web_data_rate: u32,
    /// Logical names of the dual-range channel groups to merge.
    #[serde(default = "default_merge_groups")]
    pub merge_groups: Vec<String>,
}

impl Default for DecoderSettings {
    fn default() -> Self {
        Self {
            web_data_rate: default_web_data_rate(),
            merge_groups: default_merge_groups(),
        }
    }
}

// Default value functions
fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

fn default_size() -> usize {
    10_000
}

fn default_levels() -> usize {
    3
}

fn default_aggregation_factor() -> usize {
    10
}

fn default_web_data_rate() -> u32 {
    1000
}

fn default_merge_groups() -> Vec<String> {
    vec!["I1".to_string(), "I2".to_string()]
}

impl Settings {
    /// Load from the default file location plus environment overrides.
    pub fn load() -> TelemetryResult<Self> {
        Self::load_from(DEFAULT_CONFIG_FILE)
    }

    /// Load from an explicit file path plus environment overrides.
    pub fn load_from<P: AsRef<Path>>(path: P) -> TelemetryResult<Self> {
        let settings: Settings = Figment::new()
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()?;
        settings.validate()?;
        Ok(settings)
    }

    /// Semantic validation beyond what parsing enforces.
    pub fn validate(&self) -> TelemetryResult<()> {
        if self.cache.size == 0 {
            return Err(TelemetryError::Configuration(
                "cache.size must be at least 1".to_string(),
            ));
        }
        if self.cache.levels == 0 {
            return Err(TelemetryError::Configuration(
                "cache.levels must be at least 1".to_string(),
            ));
        }
        if self.cache.levels > 1 && self.cache.aggregation_factor < 2 {
            return Err(TelemetryError::Configuration(
                "cache.aggregation_factor must be at least 2 for multi-level buffers".to_string(),
            ));
        }
        if self.decoder.web_data_rate == 0 {
            return Err(TelemetryError::Configuration(
                "decoder.web_data_rate must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Cache geometry in the form the data tier consumes.
    pub fn cache_config(&self) -> CacheConfig {
        CacheConfig {
            size: self.cache.size,
            levels: self.cache.levels,
            aggregation_factor: self.cache.aggregation_factor,
        }
    }

    /// Decoder settings in the form the decode pipeline consumes.
    pub fn decoder_config(&self) -> DecoderConfig {
        DecoderConfig {
            web_data_rate: self.decoder.web_data_rate,
            merge_groups: self.decoder.merge_groups.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let settings = Settings::default();
        settings.validate().unwrap();
        assert_eq!(settings.cache.size, 10_000);
        assert_eq!(settings.cache.levels, 3);
        assert_eq!(settings.decoder.web_data_rate, 1000);
        assert_eq!(settings.decoder.merge_groups, vec!["I1", "I2"]);
    }

    #[test]
    fn toml_overrides_defaults() {
        let settings: Settings = Figment::new()
            .merge(figment::providers::Toml::string(
                r#"
                [cache]
                size = 5000
                levels = 2

                [decoder]
                web_data_rate = 500
                merge_groups = ["I1"]
                "#,
            ))
            .extract()
            .unwrap();

        assert_eq!(settings.cache.size, 5000);
        assert_eq!(settings.cache.levels, 2);
        // untouched fields keep their defaults
        assert_eq!(settings.cache.aggregation_factor, 10);
        assert_eq!(settings.decoder.web_data_rate, 500);
        assert_eq!(settings.decoder.merge_groups, vec!["I1"]);
    }

    #[test]
    fn invalid_geometry_is_rejected() {
        let mut settings = Settings::default();
        settings.cache.levels = 0;
        assert!(settings.validate().is_err());

        let mut settings = Settings::default();
        settings.cache.levels = 3;
        settings.cache.aggregation_factor = 1;
        assert!(settings.validate().is_err());

        // a single level never aggregates, any factor is acceptable
        let mut settings = Settings::default();
        settings.cache.levels = 1;
        settings.cache.aggregation_factor = 1;
        settings.validate().unwrap();
    }
}
