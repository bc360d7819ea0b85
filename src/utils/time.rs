// src/utils/time.rs
//! Time sources for frame stamping and record timestamps

use crate::config::constants::records::TIMESTAMP_FORMAT;
use chrono::{DateTime, Local, TimeZone};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// Time provider trait for dependency injection and testing
pub trait TimeProvider: Send + Sync {
    fn now_nanos(&self) -> u64;

    fn now_local(&self) -> DateTime<Local> {
        Local.timestamp_nanos(self.now_nanos() as i64)
    }
}

/// System time provider using actual system clock
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemTimeProvider;

impl TimeProvider for SystemTimeProvider {
    fn now_nanos(&self) -> u64 {
        current_timestamp_nanos()
    }
}

/// Mock time provider for deterministic testing
#[derive(Debug)]
pub struct MockTimeProvider {
    current_time: AtomicU64,
}

impl MockTimeProvider {
    pub fn new(initial_time_nanos: u64) -> Self {
        Self {
            current_time: AtomicU64::new(initial_time_nanos),
        }
    }

    /// Start at a local wall-clock time
    pub fn at_local(time: DateTime<Local>) -> Self {
        Self::new(time.timestamp_nanos_opt().unwrap_or_default().max(0) as u64)
    }

    pub fn advance_by(&self, nanos: u64) {
        self.current_time.fetch_add(nanos, Ordering::Relaxed);
    }

    pub fn set_time(&self, nanos: u64) {
        self.current_time.store(nanos, Ordering::Relaxed);
    }
}

impl TimeProvider for MockTimeProvider {
    fn now_nanos(&self) -> u64 {
        self.current_time.load(Ordering::Relaxed)
    }
}

/// Nanoseconds since the Unix epoch
pub fn current_timestamp_nanos() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos() as u64
}

/// Record timestamp, `yyyy-MM-dd HH:mm`
pub fn format_record_timestamp(time: &DateTime<Local>) -> String {
    time.format(TIMESTAMP_FORMAT).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_time_is_monotonic_enough() {
        let provider = SystemTimeProvider;
        let a = provider.now_nanos();
        let b = provider.now_nanos();
        assert!(a > 0);
        assert!(b >= a);
    }

    #[test]
    fn test_mock_time_provider() {
        let provider = MockTimeProvider::new(1_000);
        assert_eq!(provider.now_nanos(), 1_000);

        provider.advance_by(500);
        assert_eq!(provider.now_nanos(), 1_500);

        provider.set_time(42);
        assert_eq!(provider.now_nanos(), 42);
    }

    #[test]
    fn test_record_timestamp_format() {
        let time = Local.with_ymd_and_hms(2024, 3, 9, 7, 5, 59).unwrap();
        assert_eq!(format_record_timestamp(&time), "2024-03-09 07:05");

        let provider = MockTimeProvider::at_local(time);
        assert_eq!(format_record_timestamp(&provider.now_local()), "2024-03-09 07:05");
    }
}
