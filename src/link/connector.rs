// src/link/connector.rs
//! Transport connector: discovery, connection and subscription sequencing
//!
//! A driver task consumes [`CentralEvent`]s from the radio and walks the fixed
//! sequence scan → connect → resolve service → resolve characteristic →
//! subscribe. Progress and frames are fanned out to every subscriber as
//! [`LinkEvent`]s. Nothing here blocks the caller.

use crate::config::LinkConfig;
use crate::link::types::{
    CentralEvent, CharacteristicDescriptor, ConnectionState, LinkEvent, LinkStatus,
    PeripheralHandle, PeripheralId, RawFrame, ServiceDescriptor, ShortUuid,
};
use crate::link::{Central, LinkError};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

#[derive(Debug, Default)]
struct LinkState {
    scanning: bool,
    peripheral: Option<PeripheralHandle>,
    subscribed: bool,
    status: LinkStatus,
}

impl LinkState {
    fn holds(&self, id: &PeripheralId) -> bool {
        self.peripheral.as_ref().map(|p| &p.id == id).unwrap_or(false)
    }

    fn holds_connected(&self, id: &PeripheralId) -> bool {
        self.peripheral
            .as_ref()
            .map(|p| &p.id == id && p.state == ConnectionState::Connected)
            .unwrap_or(false)
    }

    fn release(&mut self) -> Option<PeripheralHandle> {
        self.subscribed = false;
        self.peripheral.take()
    }
}

/// Single-peripheral connector for the EMG sensor
pub struct TransportConnector {
    central: Arc<dyn Central>,
    state: Arc<Mutex<LinkState>>,
    events: broadcast::Sender<LinkEvent>,
    service: ShortUuid,
    driver: JoinHandle<()>,
}

impl TransportConnector {
    /// Spawn the driver task. Must be called inside a tokio runtime.
    pub fn new(
        central: Arc<dyn Central>,
        central_events: mpsc::UnboundedReceiver<CentralEvent>,
        config: &LinkConfig,
    ) -> Self {
        let (events, _) = broadcast::channel(config.event_buffer.max(1));
        let state = Arc::new(Mutex::new(LinkState::default()));
        let characteristic = CharacteristicDescriptor {
            service: config.service_uuid,
            uuid: config.characteristic_uuid,
        };

        let driver = Driver {
            central: central.clone(),
            state: state.clone(),
            events: events.clone(),
            characteristic,
        };
        let driver = tokio::spawn(driver.run(central_events));

        Self {
            central,
            state,
            events,
            service: config.service_uuid,
            driver,
        }
    }

    /// Scan for the sensor service. Fails with `RadioUnavailable` when the
    /// radio is not powered on; a peripheral already held makes this a no-op.
    pub async fn start_discovery(&self) -> Result<(), LinkError> {
        let radio = self.central.radio_state();
        if !radio.is_ready() {
            warn!(?radio, "discovery requested while radio unavailable");
            return Err(LinkError::RadioUnavailable { state: radio });
        }

        {
            let mut state = self.state.lock();
            if let Some(held) = &state.peripheral {
                debug!(peripheral = %held.id, state = ?held.state, "discovery skipped, peripheral held");
                return Ok(());
            }
            state.scanning = true;
            state.status = LinkStatus::Scanning;
        }

        info!(service = %self.service, "starting discovery");
        if let Err(e) = self.central.start_scan(self.service).await {
            let mut state = self.state.lock();
            state.scanning = false;
            state.status = LinkStatus::Idle;
            return Err(e);
        }
        Ok(())
    }

    pub async fn stop_discovery(&self) -> Result<(), LinkError> {
        let was_scanning = {
            let mut state = self.state.lock();
            let was_scanning = std::mem::replace(&mut state.scanning, false);
            if was_scanning && state.peripheral.is_none() {
                state.status = LinkStatus::Idle;
            }
            was_scanning
        };
        if was_scanning {
            self.central.stop_scan().await?;
        }
        Ok(())
    }

    /// Disconnect the held peripheral; `LinkLost` follows once the radio confirms.
    pub async fn disconnect(&self) -> Result<(), LinkError> {
        let held = self.state.lock().peripheral.as_ref().map(|p| p.id.clone());
        match held {
            Some(id) => self.central.disconnect(&id).await,
            None => Ok(()),
        }
    }

    /// New receiver of link events; frames published before this call are not replayed.
    pub fn subscribe(&self) -> broadcast::Receiver<LinkEvent> {
        self.events.subscribe()
    }

    pub fn peripheral(&self) -> Option<PeripheralHandle> {
        self.state.lock().peripheral.clone()
    }

    pub fn is_subscribed(&self) -> bool {
        self.state.lock().subscribed
    }

    pub fn status(&self) -> LinkStatus {
        self.state.lock().status
    }

    pub fn subscriber_count(&self) -> usize {
        self.events.receiver_count()
    }
}

impl Drop for TransportConnector {
    fn drop(&mut self) {
        self.driver.abort();
    }
}

struct Driver {
    central: Arc<dyn Central>,
    state: Arc<Mutex<LinkState>>,
    events: broadcast::Sender<LinkEvent>,
    characteristic: CharacteristicDescriptor,
}

impl Driver {
    async fn run(self, mut central_events: mpsc::UnboundedReceiver<CentralEvent>) {
        while let Some(event) = central_events.recv().await {
            self.handle(event).await;
        }
        debug!("radio event stream closed, connector driver exiting");
    }

    fn publish(&self, event: LinkEvent) {
        // No subscribers is a valid configuration
        let _ = self.events.send(event);
    }

    fn fail(&self, error: LinkError) {
        warn!(kind = error.kind(), %error, "link step failed");
        self.publish(LinkEvent::Failed(error));
    }

    async fn handle(&self, event: CentralEvent) {
        match event {
            CentralEvent::RadioStateChanged(radio) => {
                if radio.is_ready() {
                    debug!(?radio, "radio ready");
                    return;
                }
                let released = {
                    let mut state = self.state.lock();
                    state.scanning = false;
                    let released = state.release();
                    state.status = if released.is_some() {
                        LinkStatus::Lost
                    } else {
                        LinkStatus::Idle
                    };
                    released
                };
                if let Some(handle) = released {
                    warn!(peripheral = %handle.id, ?radio, "radio went down, link lost");
                    self.publish(LinkEvent::LinkLost {
                        peripheral: handle.id,
                        reason: Some(format!("radio {:?}", radio)),
                    });
                }
            }

            CentralEvent::Discovered { peripheral, name, rssi } => {
                let handle = {
                    let mut state = self.state.lock();
                    if !state.scanning || state.peripheral.is_some() {
                        debug!(%peripheral, ?rssi, "ignoring additional advertiser");
                        return;
                    }
                    state.scanning = false;
                    let mut handle = PeripheralHandle::discovered(peripheral.clone(), name);
                    self.publish(LinkEvent::Discovered(handle.clone()));
                    handle.state = ConnectionState::Connecting;
                    state.peripheral = Some(handle.clone());
                    state.status = LinkStatus::Connecting;
                    handle
                };

                info!(peripheral = %handle.id, ?rssi, "sensor discovered, connecting");
                if let Err(e) = self.central.stop_scan().await {
                    debug!(error = %e, "stop scan failed");
                }
                if let Err(e) = self.central.connect(&handle.id).await {
                    self.connect_failed(&handle.id, e.to_string());
                }
            }

            CentralEvent::Connected(peripheral) => {
                {
                    let mut state = self.state.lock();
                    if !state.holds(&peripheral) {
                        debug!(%peripheral, "connect from unexpected peripheral");
                        return;
                    }
                    if let Some(handle) = state.peripheral.as_mut() {
                        handle.state = ConnectionState::Connected;
                    }
                    state.status = LinkStatus::Connected;
                }

                info!(%peripheral, "connected");
                self.publish(LinkEvent::Connected(peripheral.clone()));
                if let Err(e) = self
                    .central
                    .discover_services(&peripheral, &[self.characteristic.service])
                    .await
                {
                    self.fail(e);
                }
            }

            CentralEvent::ConnectFailed { peripheral, reason } => {
                let held = self.state.lock().holds(&peripheral);
                if held {
                    self.connect_failed(&peripheral, reason);
                }
            }

            CentralEvent::ServicesDiscovered { peripheral, services } => {
                let held = self.state.lock().holds_connected(&peripheral);
                if !held {
                    return;
                }
                let service = self.characteristic.service;
                if !services.contains(&service) {
                    self.fail(LinkError::ServiceNotFound { peripheral, service });
                    return;
                }

                debug!(%peripheral, %service, "service resolved");
                self.publish(LinkEvent::ServiceResolved(ServiceDescriptor { uuid: service }));
                if let Err(e) = self
                    .central
                    .discover_characteristics(&peripheral, service, &[self.characteristic.uuid])
                    .await
                {
                    self.fail(e);
                }
            }

            CentralEvent::CharacteristicsDiscovered {
                peripheral,
                service,
                characteristics,
            } => {
                let held = self.state.lock().holds_connected(&peripheral);
                if !held || service != self.characteristic.service {
                    return;
                }
                if !characteristics.contains(&self.characteristic.uuid) {
                    self.fail(LinkError::CharacteristicNotFound {
                        peripheral,
                        service,
                        characteristic: self.characteristic.uuid,
                    });
                    return;
                }

                if let Err(e) = self
                    .central
                    .set_notify(&peripheral, self.characteristic, true)
                    .await
                {
                    self.fail(e);
                }
            }

            CentralEvent::NotificationStateChanged {
                peripheral,
                characteristic,
                enabled,
            } => {
                if characteristic != self.characteristic {
                    return;
                }
                {
                    let mut state = self.state.lock();
                    if !state.holds_connected(&peripheral) {
                        return;
                    }
                    state.subscribed = enabled;
                    state.status = if enabled {
                        LinkStatus::Subscribed
                    } else {
                        LinkStatus::Connected
                    };
                }
                if enabled {
                    info!(%peripheral, characteristic = %characteristic.uuid, "subscribed to notifications");
                    self.publish(LinkEvent::Subscribed(characteristic));
                }
            }

            CentralEvent::ValueUpdated {
                peripheral,
                characteristic,
                value,
            } => {
                let accept = {
                    let state = self.state.lock();
                    state.subscribed && state.holds(&peripheral)
                };
                if !accept || characteristic != self.characteristic {
                    trace!(%peripheral, "dropping notification outside subscription");
                    return;
                }
                trace!(%peripheral, bytes = value.len(), "frame received");
                self.publish(LinkEvent::FrameReceived(RawFrame::new(value)));
            }

            CentralEvent::Disconnected { peripheral, reason } => {
                let released = {
                    let mut state = self.state.lock();
                    if !state.holds(&peripheral) {
                        return;
                    }
                    state.status = LinkStatus::Lost;
                    state.release()
                };
                if released.is_some() {
                    warn!(%peripheral, ?reason, "link lost");
                    self.publish(LinkEvent::LinkLost { peripheral, reason });
                }
            }
        }
    }

    fn connect_failed(&self, peripheral: &PeripheralId, reason: String) {
        {
            let mut state = self.state.lock();
            state.release();
            state.status = LinkStatus::Idle;
        }
        self.fail(LinkError::ConnectFailed {
            peripheral: peripheral.clone(),
            reason,
        });
    }
}
