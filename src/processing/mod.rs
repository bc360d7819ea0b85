// src/processing/mod.rs
//! Frame decoding and muscle-tension classification

pub mod classifier;
pub mod decoder;

pub use classifier::*;
pub use decoder::*;
