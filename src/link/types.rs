// src/link/types.rs
//! Core types for the sensor radio link

use crate::config::constants::link::{EMG_CHARACTERISTIC_UUID, EMG_SERVICE_UUID};
use crate::link::LinkError;
use crate::utils::time::current_timestamp_nanos;
use serde::{Deserialize, Serialize};
use std::fmt;

/// 16-bit attribute identifier, printed as four upper-case hex digits (`FFE0`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ShortUuid(pub u16);

impl ShortUuid {
    pub const EMG_SERVICE: ShortUuid = ShortUuid(EMG_SERVICE_UUID);
    pub const EMG_CHARACTERISTIC: ShortUuid = ShortUuid(EMG_CHARACTERISTIC_UUID);
}

impl fmt::Display for ShortUuid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04X}", self.0)
    }
}

impl std::str::FromStr for ShortUuid {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let hex = s.trim_start_matches("0x").trim_start_matches("0X");
        u16::from_str_radix(hex, 16).map(ShortUuid)
    }
}

impl TryFrom<String> for ShortUuid {
    type Error = std::num::ParseIntError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ShortUuid> for String {
    fn from(uuid: ShortUuid) -> Self {
        uuid.to_string()
    }
}

/// Service grouping exposed by a peripheral
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ServiceDescriptor {
    pub uuid: ShortUuid,
}

/// Notifying data point inside a service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CharacteristicDescriptor {
    pub service: ShortUuid,
    pub uuid: ShortUuid,
}

impl ServiceDescriptor {
    pub const EMG: ServiceDescriptor = ServiceDescriptor {
        uuid: ShortUuid::EMG_SERVICE,
    };
}

impl CharacteristicDescriptor {
    pub const EMG: CharacteristicDescriptor = CharacteristicDescriptor {
        service: ShortUuid::EMG_SERVICE,
        uuid: ShortUuid::EMG_CHARACTERISTIC,
    };
}

/// Platform identifier of a discovered peripheral
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PeripheralId(pub String);

impl PeripheralId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PeripheralId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Connection state of the held peripheral
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    Discovered,
    Connecting,
    Connected,
    Disconnected,
}

/// The single peripheral the connector works with
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeripheralHandle {
    pub id: PeripheralId,
    pub name: Option<String>,
    pub state: ConnectionState,
}

impl PeripheralHandle {
    pub fn discovered(id: PeripheralId, name: Option<String>) -> Self {
        Self {
            id,
            name,
            state: ConnectionState::Discovered,
        }
    }
}

/// Coarse link progress as seen by consumers of the connector
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkStatus {
    #[default]
    Idle,
    Scanning,
    Connecting,
    /// Connected but not (yet) subscribed
    Connected,
    Subscribed,
    Lost,
}

impl LinkStatus {
    pub fn is_streaming(&self) -> bool {
        matches!(self, LinkStatus::Subscribed)
    }
}

/// Power/authorization state of the local radio
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RadioState {
    Unknown,
    Resetting,
    Unsupported,
    Unauthorized,
    PoweredOff,
    PoweredOn,
}

impl RadioState {
    pub fn is_ready(&self) -> bool {
        matches!(self, RadioState::PoweredOn)
    }
}

/// One notification payload from the subscribed characteristic
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawFrame {
    payload: Vec<u8>,
    received_at_nanos: u64,
}

impl RawFrame {
    pub fn new(payload: Vec<u8>) -> Self {
        Self {
            payload,
            received_at_nanos: current_timestamp_nanos(),
        }
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    pub fn received_at_nanos(&self) -> u64 {
        self.received_at_nanos
    }
}

impl From<&str> for RawFrame {
    fn from(text: &str) -> Self {
        RawFrame::new(text.as_bytes().to_vec())
    }
}

/// Callbacks from the radio stack, delivered as messages.
#[derive(Debug, Clone, PartialEq)]
pub enum CentralEvent {
    RadioStateChanged(RadioState),
    Discovered {
        peripheral: PeripheralId,
        name: Option<String>,
        rssi: Option<i16>,
    },
    Connected(PeripheralId),
    ConnectFailed {
        peripheral: PeripheralId,
        reason: String,
    },
    ServicesDiscovered {
        peripheral: PeripheralId,
        services: Vec<ShortUuid>,
    },
    CharacteristicsDiscovered {
        peripheral: PeripheralId,
        service: ShortUuid,
        characteristics: Vec<ShortUuid>,
    },
    NotificationStateChanged {
        peripheral: PeripheralId,
        characteristic: CharacteristicDescriptor,
        enabled: bool,
    },
    ValueUpdated {
        peripheral: PeripheralId,
        characteristic: CharacteristicDescriptor,
        value: Vec<u8>,
    },
    Disconnected {
        peripheral: PeripheralId,
        reason: Option<String>,
    },
}

/// Events published by the transport connector to its subscribers
#[derive(Debug, Clone, PartialEq)]
pub enum LinkEvent {
    Discovered(PeripheralHandle),
    Connected(PeripheralId),
    ServiceResolved(ServiceDescriptor),
    Subscribed(CharacteristicDescriptor),
    FrameReceived(RawFrame),
    /// A step of the link sequence failed; the connection (if any) stays open
    Failed(LinkError),
    /// Terminal: discovery must be started again
    LinkLost {
        peripheral: PeripheralId,
        reason: Option<String>,
    },
}
