// src/link/mod.rs
//! Radio link to the EMG sensor peripheral

pub mod connector;
pub mod error;
pub mod simulator;
pub mod traits;
pub mod types;

pub use connector::TransportConnector;
pub use error::LinkError;
pub use traits::*;
pub use types::*;
