// src/acquisition/session.rs
//! Capture session state machine
//!
//! Pure state: no timers, no channels. The controller owns one session and
//! feeds it commands, ticks and decoded frames one at a time.

use crate::processing::{Classifier, DecodedFrame, MuscleStatus};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CapturePhase {
    #[default]
    Idle,
    Capturing,
    /// Countdown expired; behaves like `Idle` for the next command
    Finished,
}

/// What a tick did to the session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Not capturing; tick dropped
    Ignored,
    Counting { remaining: u32 },
    /// Countdown reached zero on this tick
    Finished,
}

/// Observable session state
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub phase: CapturePhase,
    pub is_capturing: bool,
    pub remaining_seconds: u32,
    pub duration_secs: u32,
    /// Display text of every reading accepted in this session
    pub history: Vec<String>,
    pub current_status: MuscleStatus,
    /// Status produced by each accepted reading, parallel to `history`
    pub status_history: Vec<MuscleStatus>,
    /// Incremented on every `start`
    pub generation: u64,
    pub discarded_frames: u64,
    pub decode_failures: u64,
}

#[derive(Debug, Clone)]
pub struct CaptureSession {
    phase: CapturePhase,
    duration_secs: u32,
    remaining_seconds: u32,
    history: Vec<String>,
    current_status: MuscleStatus,
    status_history: Vec<MuscleStatus>,
    classifier: Classifier,
    generation: u64,
    discarded_frames: u64,
    decode_failures: u64,
}

impl CaptureSession {
    /// A zero duration is raised to one tick so every window can close.
    pub fn new(duration_secs: u32, classifier: Classifier) -> Self {
        Self {
            phase: CapturePhase::Idle,
            duration_secs: duration_secs.max(1),
            remaining_seconds: 0,
            history: Vec::new(),
            current_status: MuscleStatus::Idle,
            status_history: Vec::new(),
            classifier,
            generation: 0,
            discarded_frames: 0,
            decode_failures: 0,
        }
    }

    /// Begin a fresh window from any phase, discarding the previous one.
    pub fn start(&mut self) -> u64 {
        if self.is_capturing() {
            info!(
                generation = self.generation,
                readings = self.history.len(),
                "restarting capture, discarding in-progress session"
            );
        }

        self.generation += 1;
        self.phase = CapturePhase::Capturing;
        self.remaining_seconds = self.duration_secs;
        self.history.clear();
        self.status_history.clear();
        self.current_status = MuscleStatus::Idle;
        self.discarded_frames = 0;
        self.decode_failures = 0;

        info!(generation = self.generation, duration_secs = self.duration_secs, "capture started");
        self.generation
    }

    pub fn on_tick(&mut self) -> TickOutcome {
        if !self.is_capturing() {
            debug!(phase = ?self.phase, "tick outside capture ignored");
            return TickOutcome::Ignored;
        }

        self.remaining_seconds = self.remaining_seconds.saturating_sub(1);
        if self.remaining_seconds == 0 {
            self.phase = CapturePhase::Finished;
            info!(
                generation = self.generation,
                readings = self.history.len(),
                status = %self.current_status,
                "capture finished"
            );
            TickOutcome::Finished
        } else {
            debug!(remaining = self.remaining_seconds, "countdown tick");
            TickOutcome::Counting {
                remaining: self.remaining_seconds,
            }
        }
    }

    /// Record and classify a frame. Returns the new status, or `None` when
    /// the frame was discarded because no window is open.
    pub fn on_reading(&mut self, frame: DecodedFrame) -> Option<MuscleStatus> {
        if !self.is_capturing() {
            self.discarded_frames += 1;
            return None;
        }

        let status = self.classifier.classify_reading(&frame.reading);
        if frame.reading.is_failure() {
            self.decode_failures += 1;
        }

        debug!(frame = %frame.display, %status, "reading recorded");
        self.history.push(frame.display);
        self.status_history.push(status);
        self.current_status = status;
        Some(status)
    }

    /// End the window early. Returns `false` when nothing was capturing.
    pub fn stop(&mut self) -> bool {
        if !self.is_capturing() {
            return false;
        }

        self.phase = CapturePhase::Idle;
        info!(
            generation = self.generation,
            readings = self.history.len(),
            remaining = self.remaining_seconds,
            "capture stopped"
        );
        true
    }

    pub fn is_capturing(&self) -> bool {
        self.phase == CapturePhase::Capturing
    }

    pub fn phase(&self) -> CapturePhase {
        self.phase
    }

    pub fn remaining_seconds(&self) -> u32 {
        self.remaining_seconds
    }

    pub fn duration_secs(&self) -> u32 {
        self.duration_secs
    }

    pub fn history(&self) -> &[String] {
        &self.history
    }

    pub fn current_status(&self) -> MuscleStatus {
        self.current_status
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            phase: self.phase,
            is_capturing: self.is_capturing(),
            remaining_seconds: self.remaining_seconds,
            duration_secs: self.duration_secs,
            history: self.history.clone(),
            current_status: self.current_status,
            status_history: self.status_history.clone(),
            generation: self.generation,
            discarded_frames: self.discarded_frames,
            decode_failures: self.decode_failures,
        }
    }
}
