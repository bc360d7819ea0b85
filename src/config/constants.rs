// src/config/constants.rs
//! System-wide configuration constants

/// Radio link identifiers and channel sizing
pub mod link {
    /// EMG service identifier advertised by the sensor (16-bit, vendor range)
    pub const EMG_SERVICE_UUID: u16 = 0xFFE0;
    /// Notifying characteristic carrying text frames
    pub const EMG_CHARACTERISTIC_UUID: u16 = 0xFFE1;

    pub const DEFAULT_EVENT_BUFFER: usize = 256;
    pub const MIN_EVENT_BUFFER: usize = 1;
    pub const MAX_EVENT_BUFFER: usize = 65_536;
}

/// Capture window timing
pub mod capture {
    pub const DEFAULT_DURATION_SECS: u32 = 10;
    pub const MIN_DURATION_SECS: u32 = 1;
    pub const MAX_DURATION_SECS: u32 = 3600;

    pub const DEFAULT_TICK_INTERVAL_MS: u64 = 1000;
    pub const MIN_TICK_INTERVAL_MS: u64 = 1;
    pub const MAX_TICK_INTERVAL_MS: u64 = 60_000;

    /// Command queue depth for the capture controller
    pub const COMMAND_QUEUE_SIZE: usize = 32;
}

/// Muscle-tension calibration bands
pub mod classifier {
    /// Readings strictly below this value are `Contracted`
    pub const CONTRACTED_BELOW: u64 = 340;
    /// Readings strictly above this value are `Tense`
    pub const TENSE_ABOVE: u64 = 362;
}

/// Anthropometric record store
pub mod records {
    pub const DEFAULT_COLLECTION: &str = "UserInfo";
    /// `yyyy-MM-dd HH:mm` in local time
    pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M";
}

/// Simulated sensor defaults
pub mod simulation {
    pub const DEFAULT_FRAME_INTERVAL_MS: u64 = 250;
    pub const MIN_FRAME_INTERVAL_MS: u64 = 1;
    pub const MAX_FRAME_INTERVAL_MS: u64 = 60_000;
    pub const DEFAULT_BASELINE: f32 = 350.0;
    pub const DEFAULT_AMPLITUDE: f32 = 30.0;
    pub const DEFAULT_NOISE: f32 = 0.1;
    pub const DEFAULT_FRAME_PREFIX: &str = "EMG:";
    pub const DEFAULT_SEED: u64 = 0x5EED_E3C0;
    pub const DEFAULT_PERIPHERAL_ID: &str = "EMG-SENSOR-01";
}

/// Logging defaults
pub mod logging {
    pub const DEFAULT_LEVEL: &str = "info";
    pub const VALID_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];
}

/// File system paths
pub mod paths {
    pub const SYSTEM_CONFIG_PATH: &str = "/etc/emg-capture/config.toml";
    pub const USER_CONFIG_DIR: &str = ".config/emg-capture";
    pub const DEFAULT_CONFIG_FILE: &str = "config/default.toml";
    pub const LOCAL_CONFIG_FILE: &str = "config/local.toml";

    /// Prefix for environment variable overrides
    pub const ENV_PREFIX: &str = "EMG_";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_link_identifiers() {
        assert_eq!(link::EMG_SERVICE_UUID, 0xFFE0);
        assert_eq!(link::EMG_CHARACTERISTIC_UUID, 0xFFE1);
    }

    #[test]
    fn test_capture_ranges() {
        assert!(capture::MIN_DURATION_SECS <= capture::DEFAULT_DURATION_SECS);
        assert!(capture::DEFAULT_DURATION_SECS <= capture::MAX_DURATION_SECS);
        assert!(capture::MIN_TICK_INTERVAL_MS <= capture::DEFAULT_TICK_INTERVAL_MS);
    }

    #[test]
    fn test_classifier_bands_ordered() {
        assert!(classifier::CONTRACTED_BELOW <= classifier::TENSE_ABOVE);
    }

    #[test]
    fn test_default_log_level_is_valid() {
        assert!(logging::VALID_LEVELS.contains(&logging::DEFAULT_LEVEL));
    }
}
