// src/error.rs
//! Unified error handling for the capture pipeline
//!
//! Component errors (`LinkError`, `ConfigError`, `RecordError`, ...) stay
//! small and typed. At API boundaries they are lifted into [`CaptureError`],
//! which carries an [`ErrorContext`] recording where and during what
//! operation the failure was observed.

use crate::config::ConfigError;
use crate::link::simulator::SimulatorError;
use crate::link::LinkError;
use crate::processing::DecodeError;
use crate::records::RecordError;
use serde::Serialize;
use std::collections::HashMap;
use std::error::Error;
use std::fmt;
use std::sync::Arc;
use std::time::SystemTime;

/// Unified error type for the capture system
#[derive(Debug, Clone)]
pub enum CaptureError {
    /// Discovery, connection or subscription failure
    Link {
        error: LinkError,
        context: ErrorContext,
    },

    /// Radio backend errors
    Device {
        device_type: DeviceType,
        error: Arc<dyn Error + Send + Sync>,
        context: ErrorContext,
    },

    /// Configuration loading and validation errors
    Configuration {
        error: ConfigError,
        context: ErrorContext,
    },

    /// Record store errors
    Record {
        error: RecordError,
        context: ErrorContext,
    },

    /// A single frame could not be decoded
    Decode {
        error: DecodeError,
        context: ErrorContext,
    },

    /// Capture actor unreachable
    Controller {
        operation: String,
        reason: String,
        context: ErrorContext,
    },
}

/// Radio backends for error categorization
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum DeviceType {
    Simulator,
}

/// Error severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum Severity {
    Low,      // Single frame or record affected
    Medium,   // Capture degraded, process healthy
    High,     // Component unusable until reconfigured
    Critical, // Not produced by the core; reserved for embedders
}

/// Error context for debugging and analysis
#[derive(Debug, Clone, Serialize)]
pub struct ErrorContext {
    pub timestamp: SystemTime,
    pub thread_id: Option<String>,
    pub component: String,
    pub operation: String,
    pub file: Option<&'static str>,
    pub line: Option<u32>,
    pub additional_info: HashMap<String, String>,
}

impl ErrorContext {
    pub fn new(component: &str, operation: &str) -> Self {
        Self {
            timestamp: SystemTime::now(),
            thread_id: std::thread::current().name().map(|s| s.to_string()),
            component: component.to_string(),
            operation: operation.to_string(),
            file: None,
            line: None,
            additional_info: HashMap::new(),
        }
    }

    /// Create error context with file and line information
    pub fn with_location(component: &str, operation: &str, file: &'static str, line: u32) -> Self {
        let mut context = Self::new(component, operation);
        context.file = Some(file);
        context.line = Some(line);
        context
    }

    pub fn add_info<K: Into<String>, V: Into<String>>(mut self, key: K, value: V) -> Self {
        self.additional_info.insert(key.into(), value.into());
        self
    }
}

/// Macro for creating error context with file and line info
#[macro_export]
macro_rules! error_context {
    ($component:expr, $operation:expr) => {
        $crate::error::ErrorContext::with_location($component, $operation, file!(), line!())
    };
}

impl CaptureError {
    pub fn context(&self) -> &ErrorContext {
        match self {
            CaptureError::Link { context, .. }
            | CaptureError::Device { context, .. }
            | CaptureError::Configuration { context, .. }
            | CaptureError::Record { context, .. }
            | CaptureError::Decode { context, .. }
            | CaptureError::Controller { context, .. } => context,
        }
    }

    /// Whether the pipeline keeps running after this error.
    ///
    /// Link and decode failures never take the process down; a bad
    /// configuration or a dead controller does.
    pub fn is_recoverable(&self) -> bool {
        match self {
            CaptureError::Link { .. } | CaptureError::Decode { .. } | CaptureError::Record { .. } => true,
            CaptureError::Device { .. }
            | CaptureError::Configuration { .. }
            | CaptureError::Controller { .. } => false,
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            CaptureError::Decode { .. } | CaptureError::Record { .. } => Severity::Low,
            CaptureError::Link { .. } => Severity::Medium,
            CaptureError::Device { .. }
            | CaptureError::Configuration { .. }
            | CaptureError::Controller { .. } => Severity::High,
        }
    }
}

impl fmt::Display for CaptureError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CaptureError::Link { error, context } => {
                write!(f, "[LINK] {} during {}", error, context.operation)
            }
            CaptureError::Device { device_type, error, context } => {
                write!(f, "[{}] Device error in {}: {} (at {}:{})",
                       device_type, context.component, error,
                       context.file.unwrap_or("unknown"), context.line.unwrap_or(0))
            }
            CaptureError::Configuration { error, context } => {
                write!(f, "[CONFIG] {} ({})", error, context.operation)
            }
            CaptureError::Record { error, context } => {
                write!(f, "[RECORD] {} ({})", error, context.operation)
            }
            CaptureError::Decode { error, context } => {
                write!(f, "[DECODE] {} ({})", error, context.operation)
            }
            CaptureError::Controller { operation, reason, .. } => {
                write!(f, "[CONTROLLER] {} failed: {}", operation, reason)
            }
        }
    }
}

impl fmt::Display for DeviceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceType::Simulator => write!(f, "SIMULATOR"),
        }
    }
}

impl Error for CaptureError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            CaptureError::Link { error, .. } => Some(error),
            CaptureError::Device { error, .. } => Some(error.as_ref()),
            CaptureError::Configuration { error, .. } => Some(error),
            CaptureError::Record { error, .. } => Some(error),
            CaptureError::Decode { error, .. } => Some(error),
            CaptureError::Controller { .. } => None,
        }
    }
}

impl From<LinkError> for CaptureError {
    fn from(error: LinkError) -> Self {
        let context = error_context!("transport_connector", error.kind());
        CaptureError::Link { error, context }
    }
}

impl From<SimulatorError> for CaptureError {
    fn from(err: SimulatorError) -> Self {
        CaptureError::Device {
            device_type: DeviceType::Simulator,
            error: Arc::new(err),
            context: error_context!("simulator", "configure"),
        }
    }
}

impl From<ConfigError> for CaptureError {
    fn from(error: ConfigError) -> Self {
        CaptureError::Configuration {
            error,
            context: error_context!("config_loader", "load"),
        }
    }
}

impl From<RecordError> for CaptureError {
    fn from(error: RecordError) -> Self {
        CaptureError::Record {
            error,
            context: error_context!("record_store", "record_operation"),
        }
    }
}

impl From<DecodeError> for CaptureError {
    fn from(error: DecodeError) -> Self {
        CaptureError::Decode {
            error,
            context: error_context!("frame_decoder", "decode"),
        }
    }
}

/// Result type alias for capture operations
pub type CaptureResult<T> = Result<T, CaptureError>;
