// src/config/mod.rs
//! Configuration management for the capture pipeline

pub mod constants;
pub mod loader;

pub use constants::*;
pub use loader::{ConfigError, ConfigLoader};

use crate::link::simulator::SimulatorConfig;
use crate::link::ShortUuid;
use crate::processing::Classifier;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Complete system configuration
#[derive(Debug, Deserialize, Serialize, Clone, Default, PartialEq)]
pub struct SystemConfig {
    #[serde(default)]
    pub link: LinkConfig,
    #[serde(default)]
    pub capture: CaptureConfig,
    #[serde(default)]
    pub classifier: ClassifierConfig,
    #[serde(default)]
    pub records: RecordsConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub simulation: SimulatorConfig,
}

/// Radio link identifiers and fan-out sizing
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct LinkConfig {
    #[serde(default = "defaults::service_uuid")]
    pub service_uuid: ShortUuid,

    #[serde(default = "defaults::characteristic_uuid")]
    pub characteristic_uuid: ShortUuid,

    /// Capacity of the link event broadcast channel
    #[serde(default = "defaults::event_buffer")]
    pub event_buffer: usize,
}

/// Capture window timing
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct CaptureConfig {
    #[serde(default = "defaults::duration_secs")]
    pub duration_secs: u32,

    #[serde(default = "defaults::tick_interval_ms")]
    pub tick_interval_ms: u64,
}

/// Calibration bands for muscle-tension classification
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct ClassifierConfig {
    #[serde(default = "defaults::contracted_below")]
    pub contracted_below: u64,

    #[serde(default = "defaults::tense_above")]
    pub tense_above: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct RecordsConfig {
    #[serde(default = "defaults::collection")]
    pub collection: String,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct LoggingConfig {
    #[serde(default = "defaults::log_level")]
    pub level: String,
}

/// Default value providers using constants
mod defaults {
    use crate::config::constants::*;
    use crate::link::ShortUuid;

    pub fn service_uuid() -> ShortUuid { ShortUuid(link::EMG_SERVICE_UUID) }
    pub fn characteristic_uuid() -> ShortUuid { ShortUuid(link::EMG_CHARACTERISTIC_UUID) }
    pub fn event_buffer() -> usize { link::DEFAULT_EVENT_BUFFER }

    pub fn duration_secs() -> u32 { capture::DEFAULT_DURATION_SECS }
    pub fn tick_interval_ms() -> u64 { capture::DEFAULT_TICK_INTERVAL_MS }

    pub fn contracted_below() -> u64 { classifier::CONTRACTED_BELOW }
    pub fn tense_above() -> u64 { classifier::TENSE_ABOVE }

    pub fn collection() -> String { records::DEFAULT_COLLECTION.to_string() }
    pub fn log_level() -> String { logging::DEFAULT_LEVEL.to_string() }
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            service_uuid: defaults::service_uuid(),
            characteristic_uuid: defaults::characteristic_uuid(),
            event_buffer: defaults::event_buffer(),
        }
    }
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            duration_secs: defaults::duration_secs(),
            tick_interval_ms: defaults::tick_interval_ms(),
        }
    }
}

impl CaptureConfig {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            contracted_below: defaults::contracted_below(),
            tense_above: defaults::tense_above(),
        }
    }
}

impl ClassifierConfig {
    /// Build the classifier; `None` when the bands overlap.
    pub fn build(&self) -> Option<Classifier> {
        Classifier::new(self.contracted_below, self.tense_above)
    }
}

impl Default for RecordsConfig {
    fn default() -> Self {
        Self {
            collection: defaults::collection(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: defaults::log_level(),
        }
    }
}

impl SystemConfig {
    /// Check every range and cross-field rule, reporting all violations at once.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors = Vec::new();

        if !(link::MIN_EVENT_BUFFER..=link::MAX_EVENT_BUFFER).contains(&self.link.event_buffer) {
            errors.push(format!(
                "link.event_buffer must be between {} and {}, got {}",
                link::MIN_EVENT_BUFFER,
                link::MAX_EVENT_BUFFER,
                self.link.event_buffer
            ));
        }

        if self.link.service_uuid == self.link.characteristic_uuid {
            errors.push(format!(
                "link.characteristic_uuid must differ from link.service_uuid ({})",
                self.link.service_uuid
            ));
        }

        if !(capture::MIN_DURATION_SECS..=capture::MAX_DURATION_SECS)
            .contains(&self.capture.duration_secs)
        {
            errors.push(format!(
                "capture.duration_secs must be between {} and {}, got {}",
                capture::MIN_DURATION_SECS,
                capture::MAX_DURATION_SECS,
                self.capture.duration_secs
            ));
        }

        if !(capture::MIN_TICK_INTERVAL_MS..=capture::MAX_TICK_INTERVAL_MS)
            .contains(&self.capture.tick_interval_ms)
        {
            errors.push(format!(
                "capture.tick_interval_ms must be between {} and {}, got {}",
                capture::MIN_TICK_INTERVAL_MS,
                capture::MAX_TICK_INTERVAL_MS,
                self.capture.tick_interval_ms
            ));
        }

        if self.classifier.build().is_none() {
            errors.push(format!(
                "classifier.contracted_below ({}) must not exceed classifier.tense_above + 1 ({})",
                self.classifier.contracted_below,
                self.classifier.tense_above.saturating_add(1)
            ));
        }

        if self.records.collection.trim().is_empty() {
            errors.push("records.collection must not be empty".to_string());
        }

        if !logging::VALID_LEVELS.contains(&self.logging.level.to_ascii_lowercase().as_str()) {
            errors.push(format!(
                "logging.level must be one of {:?}, got '{}'",
                logging::VALID_LEVELS,
                self.logging.level
            ));
        }

        if let Err(e) = self.simulation.validate() {
            errors.push(format!("simulation: {}", e));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation(errors))
        }
    }

    /// Get configuration summary
    pub fn get_summary(&self) -> ConfigSummary {
        ConfigSummary {
            service_uuid: self.link.service_uuid,
            characteristic_uuid: self.link.characteristic_uuid,
            duration_secs: self.capture.duration_secs,
            tick_interval_ms: self.capture.tick_interval_ms,
            contracted_below: self.classifier.contracted_below,
            tense_above: self.classifier.tense_above,
            collection: self.records.collection.clone(),
        }
    }
}

/// Configuration summary for display/logging
#[derive(Debug, Clone, Serialize)]
pub struct ConfigSummary {
    pub service_uuid: ShortUuid,
    pub characteristic_uuid: ShortUuid,
    pub duration_secs: u32,
    pub tick_interval_ms: u64,
    pub contracted_below: u64,
    pub tense_above: u64,
    pub collection: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_creation() {
        let config = SystemConfig::default();
        assert_eq!(config.link.service_uuid, ShortUuid::EMG_SERVICE);
        assert_eq!(config.link.characteristic_uuid, ShortUuid::EMG_CHARACTERISTIC);
        assert_eq!(config.capture.duration_secs, 10);
        assert_eq!(config.capture.tick_interval(), Duration::from_secs(1));
        assert_eq!(config.records.collection, "UserInfo");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_serialization() {
        let config = SystemConfig::default();
        let toml_str = toml::to_string(&config).unwrap();
        assert!(toml_str.contains("service_uuid = \"FFE0\""));

        let deserialized: SystemConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(config, deserialized);
    }

    #[test]
    fn test_partial_sections_use_defaults() {
        let config: SystemConfig = toml::from_str(
            r#"
[capture]
duration_secs = 5
"#,
        )
        .unwrap();

        assert_eq!(config.capture.duration_secs, 5);
        assert_eq!(config.capture.tick_interval_ms, 1000);
        assert_eq!(config.classifier.contracted_below, 340);
        assert_eq!(config.link.event_buffer, link::DEFAULT_EVENT_BUFFER);
    }

    #[test]
    fn test_validation_reports_every_violation() {
        let mut config = SystemConfig::default();
        config.capture.duration_secs = 0;
        config.classifier.contracted_below = 400;
        config.classifier.tense_above = 300;
        config.logging.level = "loud".to_string();

        match config.validate() {
            Err(ConfigError::Validation(errors)) => {
                assert_eq!(errors.len(), 3);
                assert!(errors.iter().any(|e| e.contains("capture.duration_secs")));
                assert!(errors.iter().any(|e| e.contains("classifier")));
                assert!(errors.iter().any(|e| e.contains("logging.level")));
            }
            other => panic!("Expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_adjacent_bands_are_valid() {
        let mut config = SystemConfig::default();
        config.classifier.contracted_below = 363;
        config.classifier.tense_above = 362;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_summary() {
        let summary = SystemConfig::default().get_summary();
        assert_eq!(summary.duration_secs, 10);
        assert_eq!(summary.contracted_below, 340);
        assert_eq!(summary.tense_above, 362);
    }
}
