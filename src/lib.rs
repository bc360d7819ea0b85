//! EMG-Capture: wireless EMG sensor acquisition and muscle-tension classification
//!
//! The pipeline pairs with a sensor peripheral over a central-role radio,
//! subscribes to its notifying characteristic and turns each text frame into a
//! muscle-tension status during fixed-length capture windows:
//!
//! - Transport connector: scan, connect, resolve service `FFE0` and
//!   characteristic `FFE1`, subscribe, fan frames out to subscribers
//! - Frame decoder: first ASCII digit run of each frame
//! - Capture session: 10 second countdown, history and current status
//! - Classifier: threshold bands around the calibrated average range
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use emg_capture::acquisition::CaptureController;
//! use emg_capture::config::SystemConfig;
//! use emg_capture::link::simulator::SimulatedCentral;
//! use emg_capture::link::TransportConnector;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = SystemConfig::default();
//!     let (central, events) = SimulatedCentral::new(config.simulation.clone())?;
//!     let connector = TransportConnector::new(Arc::new(central), events, &config.link);
//!
//!     let classifier = config.classifier.build().unwrap_or_default();
//!     let controller = CaptureController::spawn(&config.capture, classifier, connector.subscribe());
//!
//!     connector.start_discovery().await?;
//!     controller.start().await?;
//!
//!     let mut updates = controller.subscribe();
//!     let done = updates.wait_for(|s| !s.session.is_capturing).await?.clone();
//!     println!("{} readings, final status {}", done.session.history.len(), done.session.current_status);
//!     Ok(())
//! }
//! ```

#![warn(clippy::all)]
#![allow(clippy::module_inception)]

pub mod acquisition;
pub mod config;
pub mod error;
pub mod link;
pub mod processing;
pub mod records;
pub mod utils;

// Re-export commonly used types for convenience
pub use acquisition::{CaptureController, CaptureSession, CaptureSnapshot};
pub use config::{ConfigLoader, SystemConfig};
pub use error::{CaptureError, CaptureResult};
pub use link::{LinkError, LinkEvent, TransportConnector};
pub use processing::{classify, decode, Classifier, DecodeError, MuscleStatus, Reading};
pub use records::{InMemoryRecordStore, RecordStore, UserRecord};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");

/// Get library information
pub fn version_info() -> VersionInfo {
    VersionInfo {
        name: NAME.to_string(),
        version: VERSION.to_string(),
        description: "Wireless EMG sensor acquisition and classification pipeline".to_string(),
        features: vec![
            "Central-role transport connector".to_string(),
            "Text frame decoding".to_string(),
            "Timed capture windows".to_string(),
            "Muscle-tension classification".to_string(),
            "Simulated EMG sensor".to_string(),
        ],
    }
}

/// Library version information
#[derive(Debug, Clone)]
pub struct VersionInfo {
    /// Library name
    pub name: String,
    /// Version string
    pub version: String,
    /// Description
    pub description: String,
    /// List of features
    pub features: Vec<String>,
}
