// src/acquisition/ticker.rs
//! Countdown tick sources
//!
//! A tick source, once armed, yields at most `max_ticks` ticks and then
//! disarms itself. While disarmed `next_tick` never resolves, so it can sit
//! in a `select!` guarded by `is_armed`.

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{self, Instant, Interval, MissedTickBehavior};

#[async_trait]
pub trait TickSource: Send {
    /// Arm for up to `max_ticks` ticks, replacing any previous arming
    fn arm(&mut self, max_ticks: u32);

    /// Disarm; no tick is delivered afterwards until re-armed
    fn cancel(&mut self);

    fn is_armed(&self) -> bool;

    /// Wait for the next tick and return its 1-based number since arming.
    /// Must be cancel safe.
    async fn next_tick(&mut self) -> u32;
}

/// Wall-clock ticks at a fixed period; the first tick comes one period after arming
pub struct IntervalTicker {
    period: Duration,
    interval: Option<Interval>,
    remaining: u32,
    fired: u32,
}

impl IntervalTicker {
    pub fn new(period: Duration) -> Self {
        Self {
            period,
            interval: None,
            remaining: 0,
            fired: 0,
        }
    }

    pub fn period(&self) -> Duration {
        self.period
    }
}

#[async_trait]
impl TickSource for IntervalTicker {
    fn arm(&mut self, max_ticks: u32) {
        if max_ticks == 0 {
            self.cancel();
            return;
        }
        let mut interval = time::interval_at(Instant::now() + self.period, self.period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        self.interval = Some(interval);
        self.remaining = max_ticks;
        self.fired = 0;
    }

    fn cancel(&mut self) {
        self.interval = None;
        self.remaining = 0;
    }

    fn is_armed(&self) -> bool {
        self.interval.is_some()
    }

    async fn next_tick(&mut self) -> u32 {
        let Some(interval) = self.interval.as_mut() else {
            return std::future::pending().await;
        };
        interval.tick().await;

        self.fired += 1;
        self.remaining -= 1;
        if self.remaining == 0 {
            self.interval = None;
        }
        self.fired
    }
}

/// Ticks delivered by hand through a [`ManualTickHandle`]
pub struct ManualTicker {
    ticks: mpsc::UnboundedReceiver<()>,
    armed: Arc<AtomicBool>,
    remaining: u32,
    fired: u32,
}

/// Test-side control of a [`ManualTicker`]
#[derive(Clone)]
pub struct ManualTickHandle {
    ticks: mpsc::UnboundedSender<()>,
    armed: Arc<AtomicBool>,
}

impl ManualTicker {
    pub fn new() -> (Self, ManualTickHandle) {
        let (tx, rx) = mpsc::unbounded_channel();
        let armed = Arc::new(AtomicBool::new(false));
        (
            Self {
                ticks: rx,
                armed: armed.clone(),
                remaining: 0,
                fired: 0,
            },
            ManualTickHandle { ticks: tx, armed },
        )
    }
}

impl ManualTickHandle {
    /// Queue one tick; returns `false` if the ticker is gone
    pub fn tick(&self) -> bool {
        self.ticks.send(()).is_ok()
    }

    pub fn is_armed(&self) -> bool {
        self.armed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TickSource for ManualTicker {
    fn arm(&mut self, max_ticks: u32) {
        // Ticks queued before arming belong to no window
        while self.ticks.try_recv().is_ok() {}
        self.remaining = max_ticks;
        self.fired = 0;
        self.armed.store(max_ticks > 0, Ordering::SeqCst);
    }

    fn cancel(&mut self) {
        self.remaining = 0;
        self.armed.store(false, Ordering::SeqCst);
    }

    fn is_armed(&self) -> bool {
        self.armed.load(Ordering::SeqCst)
    }

    async fn next_tick(&mut self) -> u32 {
        if !self.is_armed() || self.ticks.recv().await.is_none() {
            return std::future::pending().await;
        }

        self.fired += 1;
        self.remaining -= 1;
        if self.remaining == 0 {
            self.armed.store(false, Ordering::SeqCst);
        }
        self.fired
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::timeout;

    #[tokio::test(start_paused = true)]
    async fn test_interval_ticker_first_tick_after_one_period() {
        let mut ticker = IntervalTicker::new(Duration::from_secs(1));
        let started = Instant::now();
        ticker.arm(3);

        assert_eq!(ticker.next_tick().await, 1);
        assert_eq!(started.elapsed(), Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_interval_ticker_stops_after_max_ticks() {
        let mut ticker = IntervalTicker::new(Duration::from_secs(1));
        ticker.arm(3);

        for expected in 1..=3 {
            assert_eq!(ticker.next_tick().await, expected);
        }
        assert!(!ticker.is_armed());
        assert!(timeout(Duration::from_secs(5), ticker.next_tick()).await.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_interval_ticker_cancel() {
        let mut ticker = IntervalTicker::new(Duration::from_millis(100));
        ticker.arm(10);
        ticker.next_tick().await;

        ticker.cancel();
        assert!(!ticker.is_armed());
        assert!(timeout(Duration::from_secs(1), ticker.next_tick()).await.is_err());

        // Re-arming restarts the count
        ticker.arm(2);
        assert_eq!(ticker.next_tick().await, 1);
    }

    #[tokio::test]
    async fn test_manual_ticker() {
        let (mut ticker, handle) = ManualTicker::new();
        handle.tick();
        ticker.arm(2);
        assert!(handle.is_armed());

        // The tick sent before arming was dropped
        assert!(timeout(Duration::from_millis(20), ticker.next_tick()).await.is_err());

        handle.tick();
        handle.tick();
        assert_eq!(ticker.next_tick().await, 1);
        assert_eq!(ticker.next_tick().await, 2);
        assert!(!handle.is_armed());
    }
}
