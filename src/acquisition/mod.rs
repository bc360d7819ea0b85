// src/acquisition/mod.rs
//! Timed capture windows over the sensor frame stream

pub mod controller;
pub mod session;
pub mod ticker;

pub use controller::{CaptureController, CaptureSnapshot};
pub use session::{CapturePhase, CaptureSession, SessionSnapshot, TickOutcome};
pub use ticker::{IntervalTicker, ManualTickHandle, ManualTicker, TickSource};
