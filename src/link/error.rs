// src/link/error.rs
//! Radio link error taxonomy

use crate::link::types::{PeripheralId, RadioState, ShortUuid};
use thiserror::Error;

/// Errors raised while discovering, connecting and subscribing.
///
/// All of them are recoverable at the session boundary; none of them tear the
/// process down.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LinkError {
    /// Radio stack is not powered on; no retry is scheduled
    #[error("radio unavailable (state: {state:?})")]
    RadioUnavailable { state: RadioState },

    /// Connected peripheral does not expose the EMG service
    #[error("service {service} not found on {peripheral}")]
    ServiceNotFound {
        peripheral: PeripheralId,
        service: ShortUuid,
    },

    /// EMG service does not expose the notifying characteristic
    #[error("characteristic {characteristic} not found in service {service} on {peripheral}")]
    CharacteristicNotFound {
        peripheral: PeripheralId,
        service: ShortUuid,
        characteristic: ShortUuid,
    },

    #[error("connection to {peripheral} failed: {reason}")]
    ConnectFailed {
        peripheral: PeripheralId,
        reason: String,
    },

    #[error("unknown peripheral {0}")]
    UnknownPeripheral(PeripheralId),

    #[error("peripheral {0} is not connected")]
    NotConnected(PeripheralId),
}

impl LinkError {
    /// Short machine-readable name used in logs and snapshots
    pub fn kind(&self) -> &'static str {
        match self {
            LinkError::RadioUnavailable { .. } => "radio_unavailable",
            LinkError::ServiceNotFound { .. } => "service_not_found",
            LinkError::CharacteristicNotFound { .. } => "characteristic_not_found",
            LinkError::ConnectFailed { .. } => "connect_failed",
            LinkError::UnknownPeripheral(_) => "unknown_peripheral",
            LinkError::NotConnected(_) => "not_connected",
        }
    }
}
