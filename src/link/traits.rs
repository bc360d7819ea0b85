// src/link/traits.rs
//! Radio stack abstraction
//!
//! Every request returns as soon as it has been issued. Outcomes arrive later
//! as [`CentralEvent`](crate::link::CentralEvent)s on the channel handed out
//! when the central was created.

use crate::link::types::{CharacteristicDescriptor, PeripheralId, RadioState, ShortUuid};
use crate::link::LinkError;
use async_trait::async_trait;

/// Central-role radio: scans, connects and subscribes on behalf of the connector
#[async_trait]
pub trait Central: Send + Sync {
    /// Current power state of the radio
    fn radio_state(&self) -> RadioState;

    /// Scan for peripherals advertising `service`
    async fn start_scan(&self, service: ShortUuid) -> Result<(), LinkError>;

    async fn stop_scan(&self) -> Result<(), LinkError>;

    async fn connect(&self, peripheral: &PeripheralId) -> Result<(), LinkError>;

    async fn disconnect(&self, peripheral: &PeripheralId) -> Result<(), LinkError>;

    /// Resolve the listed services on a connected peripheral
    async fn discover_services(
        &self,
        peripheral: &PeripheralId,
        services: &[ShortUuid],
    ) -> Result<(), LinkError>;

    /// Resolve the listed characteristics inside `service`
    async fn discover_characteristics(
        &self,
        peripheral: &PeripheralId,
        service: ShortUuid,
        characteristics: &[ShortUuid],
    ) -> Result<(), LinkError>;

    /// Enable or disable value-change notifications
    async fn set_notify(
        &self,
        peripheral: &PeripheralId,
        characteristic: CharacteristicDescriptor,
        enabled: bool,
    ) -> Result<(), LinkError>;
}
