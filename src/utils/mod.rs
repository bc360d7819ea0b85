// src/utils/mod.rs
//! Common utilities

pub mod time;

pub use time::{
    current_timestamp_nanos, format_record_timestamp, MockTimeProvider, SystemTimeProvider,
    TimeProvider,
};
