// src/link/simulator.rs
//! In-process simulated radio with an EMG sensor peripheral
//!
//! The simulator behaves like a central-role radio stack: requests return
//! immediately and outcomes are delivered on the event channel. Once the EMG
//! characteristic is subscribed it can stream generated text frames
//! (`"EMG:351"`) at a fixed interval, and tests can inject arbitrary frames or
//! drop the link at any moment.

use crate::config::constants::simulation;
use crate::link::types::{
    CentralEvent, CharacteristicDescriptor, PeripheralId, RadioState, ShortUuid,
};
use crate::link::{Central, LinkError};
use async_trait::async_trait;
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant};
use tracing::{debug, info};

/// Simulator configuration
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct SimulatorConfig {
    pub peripheral_id: String,
    pub peripheral_name: String,
    /// Radio powered on at creation
    pub radio_ready: bool,
    /// Sensor advertises the EMG service
    pub advertise: bool,
    /// EMG service present once connected
    pub expose_service: bool,
    /// Notifying characteristic present inside the service
    pub expose_characteristic: bool,
    /// Generate frames once subscribed
    pub auto_stream: bool,
    pub frame_interval_ms: u64,
    pub baseline: f32,
    pub amplitude: f32,
    /// Noise level relative to `amplitude`, 0.0..=1.0
    pub noise: f32,
    pub pattern: ActivationPattern,
    pub frame_prefix: String,
    pub seed: u64,
}

/// Muscle activation shape of the generated magnitude
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ActivationPattern {
    Constant,
    Sinusoidal { frequency_hz: f32 },
    Burst { burst_duration_ms: u32, rest_duration_ms: u32 },
    Ramp { ramp_duration_ms: u32 },
    Random,
}

impl FromStr for ActivationPattern {
    type Err = SimulatorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "constant" => Ok(ActivationPattern::Constant),
            "sine" | "sinusoidal" => Ok(ActivationPattern::Sinusoidal { frequency_hz: 0.5 }),
            "burst" => Ok(ActivationPattern::Burst {
                burst_duration_ms: 1500,
                rest_duration_ms: 1500,
            }),
            "ramp" => Ok(ActivationPattern::Ramp { ramp_duration_ms: 5000 }),
            "random" => Ok(ActivationPattern::Random),
            other => Err(SimulatorError::InvalidConfig {
                field: "pattern",
                reason: format!("unknown activation pattern '{}'", other),
            }),
        }
    }
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            peripheral_id: simulation::DEFAULT_PERIPHERAL_ID.to_string(),
            peripheral_name: "EMG Sensor".to_string(),
            radio_ready: true,
            advertise: true,
            expose_service: true,
            expose_characteristic: true,
            auto_stream: true,
            frame_interval_ms: simulation::DEFAULT_FRAME_INTERVAL_MS,
            baseline: simulation::DEFAULT_BASELINE,
            amplitude: simulation::DEFAULT_AMPLITUDE,
            noise: simulation::DEFAULT_NOISE,
            pattern: ActivationPattern::Sinusoidal { frequency_hz: 0.5 },
            frame_prefix: simulation::DEFAULT_FRAME_PREFIX.to_string(),
            seed: simulation::DEFAULT_SEED,
        }
    }
}

/// Simulator configuration errors
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SimulatorError {
    #[error("invalid simulator setting '{field}': {reason}")]
    InvalidConfig { field: &'static str, reason: String },
}

impl SimulatorConfig {
    /// Scripted peripheral that never streams on its own
    pub fn scripted() -> Self {
        Self {
            auto_stream: false,
            ..Default::default()
        }
    }

    pub fn validate(&self) -> Result<(), SimulatorError> {
        if self.peripheral_id.trim().is_empty() {
            return Err(SimulatorError::InvalidConfig {
                field: "peripheral_id",
                reason: "must not be empty".to_string(),
            });
        }

        if !(simulation::MIN_FRAME_INTERVAL_MS..=simulation::MAX_FRAME_INTERVAL_MS)
            .contains(&self.frame_interval_ms)
        {
            return Err(SimulatorError::InvalidConfig {
                field: "frame_interval_ms",
                reason: format!(
                    "must be between {} and {}",
                    simulation::MIN_FRAME_INTERVAL_MS,
                    simulation::MAX_FRAME_INTERVAL_MS
                ),
            });
        }

        if !self.baseline.is_finite() || self.baseline < 0.0 {
            return Err(SimulatorError::InvalidConfig {
                field: "baseline",
                reason: format!("{} is not a non-negative magnitude", self.baseline),
            });
        }

        if !self.amplitude.is_finite() || self.amplitude < 0.0 {
            return Err(SimulatorError::InvalidConfig {
                field: "amplitude",
                reason: format!("{} is not a non-negative amplitude", self.amplitude),
            });
        }

        if !(0.0..=1.0).contains(&self.noise) {
            return Err(SimulatorError::InvalidConfig {
                field: "noise",
                reason: format!("{} is outside 0.0..=1.0", self.noise),
            });
        }

        match self.pattern {
            ActivationPattern::Sinusoidal { frequency_hz } if !(frequency_hz > 0.0) => {
                Err(SimulatorError::InvalidConfig {
                    field: "pattern",
                    reason: "sinusoidal frequency must be positive".to_string(),
                })
            }
            ActivationPattern::Burst { burst_duration_ms, rest_duration_ms } => {
                match burst_duration_ms.checked_add(rest_duration_ms) {
                    Some(0) => Err(SimulatorError::InvalidConfig {
                        field: "pattern",
                        reason: "burst period must be non-zero".to_string(),
                    }),
                    None => Err(SimulatorError::InvalidConfig {
                        field: "pattern",
                        reason: format!(
                            "burst period {} + {} ms overflows",
                            burst_duration_ms, rest_duration_ms
                        ),
                    }),
                    Some(_) => Ok(()),
                }
            }
            ActivationPattern::Ramp { ramp_duration_ms: 0 } => Err(SimulatorError::InvalidConfig {
                field: "pattern",
                reason: "ramp duration must be non-zero".to_string(),
            }),
            _ => Ok(()),
        }
    }

    /// Magnitude of frame number `sequence`; `noise_sample` is uniform in -1.0..=1.0
    pub fn magnitude(&self, sequence: u64, noise_sample: f32) -> u64 {
        let t = sequence.saturating_mul(self.frame_interval_ms) as f32 / 1000.0;

        let shape = match &self.pattern {
            ActivationPattern::Constant => 1.0,
            ActivationPattern::Sinusoidal { frequency_hz } => {
                (2.0 * std::f32::consts::PI * frequency_hz * t).sin()
            }
            ActivationPattern::Burst { burst_duration_ms, rest_duration_ms } => {
                let period_ms = u64::from(*burst_duration_ms) + u64::from(*rest_duration_ms);
                let in_period_ms = (t * 1000.0) % period_ms.max(1) as f32;
                if in_period_ms < *burst_duration_ms as f32 {
                    1.0
                } else {
                    -1.0
                }
            }
            ActivationPattern::Ramp { ramp_duration_ms } => {
                let ramp_secs = *ramp_duration_ms as f32 / 1000.0;
                2.0 * ((t % ramp_secs) / ramp_secs) - 1.0
            }
            ActivationPattern::Random => {
                // Deterministic per sequence so runs are reproducible
                let seed = (sequence as u32).wrapping_mul(2654435761);
                (seed as f32 / u32::MAX as f32 - 0.5) * 2.0
            }
        };

        let value = self.baseline
            + self.amplitude * shape
            + self.amplitude * self.noise * noise_sample.clamp(-1.0, 1.0);

        value.max(0.0).round() as u64
    }
}

/// A service and the characteristics it exposes
#[derive(Debug, Clone, PartialEq)]
pub struct SimService {
    pub uuid: ShortUuid,
    pub characteristics: Vec<ShortUuid>,
}

/// A peripheral known to the simulated radio
#[derive(Debug, Clone, PartialEq)]
pub struct SimPeripheral {
    pub id: PeripheralId,
    pub name: Option<String>,
    pub rssi: Option<i16>,
    /// Services listed in advertisement data
    pub advertised: Vec<ShortUuid>,
    /// Services resolvable after connecting
    pub services: Vec<SimService>,
}

impl SimPeripheral {
    /// Fully featured EMG sensor
    pub fn emg_sensor(id: impl Into<String>) -> Self {
        Self {
            id: PeripheralId::new(id),
            name: Some("EMG Sensor".to_string()),
            rssi: Some(-60),
            advertised: vec![ShortUuid::EMG_SERVICE],
            services: vec![SimService {
                uuid: ShortUuid::EMG_SERVICE,
                characteristics: vec![ShortUuid::EMG_CHARACTERISTIC],
            }],
        }
    }

    fn from_config(config: &SimulatorConfig) -> Self {
        let mut peripheral = Self::emg_sensor(config.peripheral_id.clone());
        peripheral.name = Some(config.peripheral_name.clone());

        if !config.advertise {
            peripheral.advertised.clear();
        }
        if !config.expose_service {
            peripheral.services.clear();
        } else if !config.expose_characteristic {
            peripheral.services[0].characteristics.clear();
        }
        peripheral
    }

    fn service(&self, uuid: ShortUuid) -> Option<&SimService> {
        self.services.iter().find(|s| s.uuid == uuid)
    }
}

#[derive(Debug)]
struct SimState {
    radio: RadioState,
    scanning: Option<ShortUuid>,
    peripherals: Vec<SimPeripheral>,
    connected: Option<PeripheralId>,
    notifying: bool,
}

impl SimState {
    fn is_connected(&self, peripheral: &PeripheralId) -> bool {
        self.connected.as_ref() == Some(peripheral)
    }

    fn peripheral(&self, id: &PeripheralId) -> Option<&SimPeripheral> {
        self.peripherals.iter().find(|p| &p.id == id)
    }
}

/// Simulated central-role radio
pub struct SimulatedCentral {
    config: SimulatorConfig,
    state: Arc<Mutex<SimState>>,
    events: mpsc::UnboundedSender<CentralEvent>,
    generator: Mutex<Option<JoinHandle<()>>>,
    frames_sent: Arc<AtomicU64>,
}

impl SimulatedCentral {
    /// Create the simulator and the event stream the connector consumes.
    pub fn new(
        config: SimulatorConfig,
    ) -> Result<(Self, mpsc::UnboundedReceiver<CentralEvent>), SimulatorError> {
        config.validate()?;

        let (tx, rx) = mpsc::unbounded_channel();
        let radio = if config.radio_ready {
            RadioState::PoweredOn
        } else {
            RadioState::PoweredOff
        };

        let state = SimState {
            radio,
            scanning: None,
            peripherals: vec![SimPeripheral::from_config(&config)],
            connected: None,
            notifying: false,
        };

        Ok((
            Self {
                config,
                state: Arc::new(Mutex::new(state)),
                events: tx,
                generator: Mutex::new(None),
                frames_sent: Arc::new(AtomicU64::new(0)),
            },
            rx,
        ))
    }

    pub fn config(&self) -> &SimulatorConfig {
        &self.config
    }

    /// Make another peripheral visible; announced at once when a matching scan is running.
    pub fn add_peripheral(&self, peripheral: SimPeripheral) {
        let mut state = self.state.lock();
        if let Some(filter) = state.scanning {
            if peripheral.advertised.contains(&filter) {
                self.emit(CentralEvent::Discovered {
                    peripheral: peripheral.id.clone(),
                    name: peripheral.name.clone(),
                    rssi: peripheral.rssi,
                });
            }
        }
        state.peripherals.push(peripheral);
    }

    /// Push one notification payload. Returns `false` when nothing is subscribed.
    pub fn inject_frame(&self, payload: impl Into<Vec<u8>>) -> bool {
        let state = self.state.lock();
        let Some(peripheral) = state.connected.clone() else {
            return false;
        };
        if !state.notifying {
            return false;
        }
        drop(state);

        self.frames_sent.fetch_add(1, Ordering::Relaxed);
        self.emit(CentralEvent::ValueUpdated {
            peripheral,
            characteristic: CharacteristicDescriptor::EMG,
            value: payload.into(),
        })
    }

    /// Simulate a radio-level disconnect of the connected peripheral.
    pub fn drop_link(&self, reason: &str) -> bool {
        let peripheral = {
            let mut state = self.state.lock();
            state.notifying = false;
            state.connected.take()
        };
        self.stop_generator();

        match peripheral {
            Some(peripheral) => {
                info!(%peripheral, reason, "simulated link drop");
                self.emit(CentralEvent::Disconnected {
                    peripheral,
                    reason: Some(reason.to_string()),
                })
            }
            None => false,
        }
    }

    /// Power the radio on or off.
    pub fn set_radio_ready(&self, ready: bool) {
        self.set_radio_state(if ready {
            RadioState::PoweredOn
        } else {
            RadioState::PoweredOff
        });
    }

    /// Change radio power state; powering off drops any connection.
    pub fn set_radio_state(&self, radio: RadioState) {
        let dropped = {
            let mut state = self.state.lock();
            state.radio = radio;
            if radio.is_ready() {
                None
            } else {
                state.scanning = None;
                state.notifying = false;
                state.connected.take()
            }
        };

        self.emit(CentralEvent::RadioStateChanged(radio));
        if let Some(peripheral) = dropped {
            self.stop_generator();
            self.emit(CentralEvent::Disconnected {
                peripheral,
                reason: Some("radio powered off".to_string()),
            });
        }
    }

    pub fn is_scanning(&self) -> bool {
        self.state.lock().scanning.is_some()
    }

    pub fn connected_peripheral(&self) -> Option<PeripheralId> {
        self.state.lock().connected.clone()
    }

    pub fn is_notifying(&self) -> bool {
        self.state.lock().notifying
    }

    /// Frames delivered so far, injected or generated
    pub fn frames_sent(&self) -> u64 {
        self.frames_sent.load(Ordering::Relaxed)
    }

    fn emit(&self, event: CentralEvent) -> bool {
        self.events.send(event).is_ok()
    }

    fn ensure_ready(&self) -> Result<(), LinkError> {
        let radio = self.state.lock().radio;
        if radio.is_ready() {
            Ok(())
        } else {
            Err(LinkError::RadioUnavailable { state: radio })
        }
    }

    fn ensure_connected(&self, peripheral: &PeripheralId) -> Result<(), LinkError> {
        if self.state.lock().is_connected(peripheral) {
            Ok(())
        } else {
            Err(LinkError::NotConnected(peripheral.clone()))
        }
    }

    fn start_generator(&self, peripheral: PeripheralId) {
        self.stop_generator();

        let config = self.config.clone();
        let state = self.state.clone();
        let events = self.events.clone();
        let frames_sent = self.frames_sent.clone();
        let period = Duration::from_millis(config.frame_interval_ms);

        let handle = tokio::spawn(async move {
            let mut rng = StdRng::seed_from_u64(config.seed);
            let mut interval = time::interval_at(Instant::now() + period, period);
            let mut sequence = 0u64;

            loop {
                interval.tick().await;

                let streaming = {
                    let state = state.lock();
                    state.notifying && state.is_connected(&peripheral)
                };
                if !streaming {
                    break;
                }

                let noise_sample: f32 = rng.gen_range(-1.0..=1.0);
                let value = config.magnitude(sequence, noise_sample);
                let frame = format!("{}{}", config.frame_prefix, value);

                let sent = events.send(CentralEvent::ValueUpdated {
                    peripheral: peripheral.clone(),
                    characteristic: CharacteristicDescriptor::EMG,
                    value: frame.into_bytes(),
                });
                if sent.is_err() {
                    break;
                }

                frames_sent.fetch_add(1, Ordering::Relaxed);
                sequence += 1;
            }

            debug!(frames = sequence, "frame generator stopped");
        });

        *self.generator.lock() = Some(handle);
    }

    fn stop_generator(&self) {
        if let Some(handle) = self.generator.lock().take() {
            handle.abort();
        }
    }
}

impl Drop for SimulatedCentral {
    fn drop(&mut self) {
        self.stop_generator();
    }
}

#[async_trait]
impl Central for SimulatedCentral {
    fn radio_state(&self) -> RadioState {
        self.state.lock().radio
    }

    async fn start_scan(&self, service: ShortUuid) -> Result<(), LinkError> {
        self.ensure_ready()?;

        let found: Vec<_> = {
            let mut state = self.state.lock();
            state.scanning = Some(service);
            state
                .peripherals
                .iter()
                .filter(|p| p.advertised.contains(&service))
                .map(|p| (p.id.clone(), p.name.clone(), p.rssi))
                .collect()
        };

        debug!(%service, advertisers = found.len(), "simulated scan started");
        for (peripheral, name, rssi) in found {
            self.emit(CentralEvent::Discovered { peripheral, name, rssi });
        }
        Ok(())
    }

    async fn stop_scan(&self) -> Result<(), LinkError> {
        self.state.lock().scanning = None;
        Ok(())
    }

    async fn connect(&self, peripheral: &PeripheralId) -> Result<(), LinkError> {
        self.ensure_ready()?;

        {
            let mut state = self.state.lock();
            if state.peripheral(peripheral).is_none() {
                return Err(LinkError::UnknownPeripheral(peripheral.clone()));
            }
            state.connected = Some(peripheral.clone());
            state.notifying = false;
        }

        self.emit(CentralEvent::Connected(peripheral.clone()));
        Ok(())
    }

    async fn disconnect(&self, peripheral: &PeripheralId) -> Result<(), LinkError> {
        {
            let mut state = self.state.lock();
            if !state.is_connected(peripheral) {
                return Err(LinkError::NotConnected(peripheral.clone()));
            }
            state.connected = None;
            state.notifying = false;
        }
        self.stop_generator();

        self.emit(CentralEvent::Disconnected {
            peripheral: peripheral.clone(),
            reason: None,
        });
        Ok(())
    }

    async fn discover_services(
        &self,
        peripheral: &PeripheralId,
        services: &[ShortUuid],
    ) -> Result<(), LinkError> {
        self.ensure_connected(peripheral)?;

        let resolved: Vec<ShortUuid> = {
            let state = self.state.lock();
            state
                .peripheral(peripheral)
                .map(|p| {
                    p.services
                        .iter()
                        .map(|s| s.uuid)
                        .filter(|uuid| services.is_empty() || services.contains(uuid))
                        .collect()
                })
                .unwrap_or_default()
        };

        self.emit(CentralEvent::ServicesDiscovered {
            peripheral: peripheral.clone(),
            services: resolved,
        });
        Ok(())
    }

    async fn discover_characteristics(
        &self,
        peripheral: &PeripheralId,
        service: ShortUuid,
        characteristics: &[ShortUuid],
    ) -> Result<(), LinkError> {
        self.ensure_connected(peripheral)?;

        let resolved: Vec<ShortUuid> = {
            let state = self.state.lock();
            state
                .peripheral(peripheral)
                .and_then(|p| p.service(service))
                .map(|s| {
                    s.characteristics
                        .iter()
                        .copied()
                        .filter(|uuid| characteristics.is_empty() || characteristics.contains(uuid))
                        .collect()
                })
                .unwrap_or_default()
        };

        self.emit(CentralEvent::CharacteristicsDiscovered {
            peripheral: peripheral.clone(),
            service,
            characteristics: resolved,
        });
        Ok(())
    }

    async fn set_notify(
        &self,
        peripheral: &PeripheralId,
        characteristic: CharacteristicDescriptor,
        enabled: bool,
    ) -> Result<(), LinkError> {
        self.ensure_connected(peripheral)?;

        {
            let mut state = self.state.lock();
            let exists = state
                .peripheral(peripheral)
                .and_then(|p| p.service(characteristic.service))
                .map(|s| s.characteristics.contains(&characteristic.uuid))
                .unwrap_or(false);
            if !exists {
                return Err(LinkError::CharacteristicNotFound {
                    peripheral: peripheral.clone(),
                    service: characteristic.service,
                    characteristic: characteristic.uuid,
                });
            }
            state.notifying = enabled;
        }

        self.emit(CentralEvent::NotificationStateChanged {
            peripheral: peripheral.clone(),
            characteristic,
            enabled,
        });

        if enabled && self.config.auto_stream {
            self.start_generator(peripheral.clone());
        } else if !enabled {
            self.stop_generator();
        }
        Ok(())
    }
}
