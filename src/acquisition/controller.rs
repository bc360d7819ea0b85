// src/acquisition/controller.rs
//! Capture controller actor
//!
//! One task owns the [`CaptureSession`] and serializes the three event
//! sources onto it: user commands, countdown ticks and link events. Every
//! processed event publishes a fresh [`CaptureSnapshot`] on a watch channel.
//! The controller only borrows the connector's event stream; dropping it never
//! touches the radio link.

use crate::acquisition::session::{CaptureSession, SessionSnapshot, TickOutcome};
use crate::acquisition::ticker::{IntervalTicker, TickSource};
use crate::config::constants::capture::COMMAND_QUEUE_SIZE;
use crate::config::CaptureConfig;
use crate::error::{CaptureError, CaptureResult};
use crate::error_context;
use crate::link::{LinkEvent, LinkStatus};
use crate::processing::{decode_frame, Classifier};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast::error::{RecvError, TryRecvError};
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Session state plus the link progress seen by the controller
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureSnapshot {
    #[serde(flatten)]
    pub session: SessionSnapshot,
    pub link: LinkStatus,
    pub last_link_error: Option<String>,
}

enum Command {
    Start(oneshot::Sender<CaptureSnapshot>),
    Stop(oneshot::Sender<CaptureSnapshot>),
    Shutdown,
}

/// Handle to the capture actor
pub struct CaptureController {
    commands: mpsc::Sender<Command>,
    snapshots: watch::Receiver<CaptureSnapshot>,
    task: JoinHandle<()>,
}

impl CaptureController {
    /// Spawn with a wall-clock ticker at `config.tick_interval_ms`.
    pub fn spawn(
        config: &CaptureConfig,
        classifier: Classifier,
        link_events: broadcast::Receiver<LinkEvent>,
    ) -> Self {
        Self::spawn_with_ticker(
            config.duration_secs,
            classifier,
            IntervalTicker::new(config.tick_interval()),
            link_events,
        )
    }

    pub fn spawn_with_ticker<T>(
        duration_secs: u32,
        classifier: Classifier,
        ticker: T,
        link_events: broadcast::Receiver<LinkEvent>,
    ) -> Self
    where
        T: TickSource + 'static,
    {
        let session = CaptureSession::new(duration_secs, classifier);
        let initial = CaptureSnapshot {
            session: session.snapshot(),
            ..Default::default()
        };

        let (command_tx, command_rx) = mpsc::channel(COMMAND_QUEUE_SIZE);
        let (snapshot_tx, snapshot_rx) = watch::channel(initial.clone());

        let actor = Actor {
            session,
            ticker,
            link_events,
            link_open: true,
            link: initial.link,
            last_link_error: None,
            snapshots: snapshot_tx,
        };
        let task = tokio::spawn(actor.run(command_rx));

        Self {
            commands: command_tx,
            snapshots: snapshot_rx,
            task,
        }
    }

    /// Open a new capture window, discarding any window in progress.
    pub async fn start(&self) -> CaptureResult<CaptureSnapshot> {
        self.request("start", Command::Start).await
    }

    /// Close the current window early; a no-op when not capturing.
    pub async fn stop(&self) -> CaptureResult<CaptureSnapshot> {
        self.request("stop", Command::Stop).await
    }

    /// Latest published state
    pub fn snapshot(&self) -> CaptureSnapshot {
        self.snapshots.borrow().clone()
    }

    /// Observe every published state change
    pub fn subscribe(&self) -> watch::Receiver<CaptureSnapshot> {
        self.snapshots.clone()
    }

    /// Stop the actor and wait for it to exit.
    pub async fn shutdown(self) -> CaptureResult<()> {
        // Actor may already be gone; joining below reports that
        let _ = self.commands.send(Command::Shutdown).await;
        self.task.await.map_err(|e| CaptureError::Controller {
            operation: "shutdown".to_string(),
            reason: e.to_string(),
            context: error_context!("capture_controller", "shutdown"),
        })
    }

    async fn request(
        &self,
        operation: &str,
        command: impl FnOnce(oneshot::Sender<CaptureSnapshot>) -> Command,
    ) -> CaptureResult<CaptureSnapshot> {
        let (reply_tx, reply_rx) = oneshot::channel();
        let gone = || CaptureError::Controller {
            operation: operation.to_string(),
            reason: "capture controller is not running".to_string(),
            context: error_context!("capture_controller", operation),
        };

        self.commands
            .send(command(reply_tx))
            .await
            .map_err(|_| gone())?;
        reply_rx.await.map_err(|_| gone())
    }
}

struct Actor<T> {
    session: CaptureSession,
    ticker: T,
    link_events: broadcast::Receiver<LinkEvent>,
    link_open: bool,
    link: LinkStatus,
    last_link_error: Option<String>,
    snapshots: watch::Sender<CaptureSnapshot>,
}

impl<T: TickSource> Actor<T> {
    async fn run(mut self, mut commands: mpsc::Receiver<Command>) {
        loop {
            tokio::select! {
                biased;

                command = commands.recv() => match command {
                    Some(Command::Start(reply)) => {
                        self.session.start();
                        self.ticker.arm(self.session.duration_secs());
                        let _ = reply.send(self.publish());
                    }
                    Some(Command::Stop(reply)) => {
                        self.session.stop();
                        self.ticker.cancel();
                        let _ = reply.send(self.publish());
                    }
                    Some(Command::Shutdown) | None => break,
                },

                tick = self.ticker.next_tick(), if self.ticker.is_armed() => {
                    // Frames already queued arrived before this tick
                    self.drain_link_events();
                    self.on_tick(tick);
                }

                event = self.link_events.recv(), if self.link_open => match event {
                    Ok(event) => self.on_link_event(event),
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "capture controller lagged behind link events");
                    }
                    Err(RecvError::Closed) => {
                        debug!("link event stream closed");
                        self.link_open = false;
                    }
                },
            }
        }

        self.ticker.cancel();
        info!("capture controller stopped");
    }

    fn on_tick(&mut self, tick: u32) {
        match self.session.on_tick() {
            TickOutcome::Finished => {
                self.ticker.cancel();
                self.publish();
            }
            TickOutcome::Counting { remaining } => {
                debug!(tick, remaining, "countdown");
                self.publish();
            }
            TickOutcome::Ignored => self.ticker.cancel(),
        }
    }

    fn drain_link_events(&mut self) {
        if !self.link_open {
            return;
        }
        loop {
            match self.link_events.try_recv() {
                Ok(event) => self.on_link_event(event),
                Err(TryRecvError::Lagged(skipped)) => {
                    warn!(skipped, "capture controller lagged behind link events");
                }
                Err(TryRecvError::Closed) => {
                    self.link_open = false;
                    break;
                }
                Err(TryRecvError::Empty) => break,
            }
        }
    }

    fn on_link_event(&mut self, event: LinkEvent) {
        match event {
            LinkEvent::FrameReceived(frame) => {
                let decoded = decode_frame(&frame);
                if self.session.on_reading(decoded).is_none() {
                    debug!("frame outside capture window discarded");
                }
            }
            LinkEvent::Discovered(handle) => {
                debug!(peripheral = %handle.id, "sensor discovered");
                self.link = LinkStatus::Connecting;
            }
            LinkEvent::Connected(_) | LinkEvent::ServiceResolved(_) => {
                self.link = LinkStatus::Connected;
            }
            LinkEvent::Subscribed(_) => {
                self.link = LinkStatus::Subscribed;
                self.last_link_error = None;
            }
            LinkEvent::Failed(error) => {
                self.last_link_error = Some(error.to_string());
            }
            LinkEvent::LinkLost { peripheral, reason } => {
                warn!(%peripheral, ?reason, capturing = self.session.is_capturing(), "sensor link lost");
                self.link = LinkStatus::Lost;
                self.last_link_error = Some(match reason {
                    Some(reason) => format!("link to {} lost: {}", peripheral, reason),
                    None => format!("link to {} lost", peripheral),
                });
            }
        }
        self.publish();
    }

    fn publish(&self) -> CaptureSnapshot {
        let snapshot = CaptureSnapshot {
            session: self.session.snapshot(),
            link: self.link,
            last_link_error: self.last_link_error.clone(),
        };
        self.snapshots.send_replace(snapshot.clone());
        snapshot
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::acquisition::ticker::ManualTicker;
    use crate::acquisition::CapturePhase;
    use crate::link::{PeripheralId, RawFrame};
    use crate::processing::MuscleStatus;
    use std::time::Duration;
    use tokio::time::timeout;

    struct Harness {
        controller: CaptureController,
        ticks: crate::acquisition::ManualTickHandle,
        link: broadcast::Sender<LinkEvent>,
        snapshots: watch::Receiver<CaptureSnapshot>,
    }

    fn harness(duration_secs: u32) -> Harness {
        let (link, link_rx) = broadcast::channel(64);
        let (ticker, ticks) = ManualTicker::new();
        let controller =
            CaptureController::spawn_with_ticker(duration_secs, Classifier::default(), ticker, link_rx);
        let snapshots = controller.subscribe();
        Harness {
            controller,
            ticks,
            link,
            snapshots,
        }
    }

    impl Harness {
        fn frame(&self, text: &str) {
            self.link
                .send(LinkEvent::FrameReceived(RawFrame::from(text)))
                .expect("controller subscribed");
        }

        async fn wait_for(&mut self, f: impl FnMut(&CaptureSnapshot) -> bool) -> CaptureSnapshot {
            timeout(Duration::from_secs(1), self.snapshots.wait_for(f))
                .await
                .expect("timed out waiting for snapshot")
                .expect("controller gone")
                .clone()
        }
    }

    #[tokio::test]
    async fn test_start_arms_countdown() {
        let h = harness(10);
        let snapshot = h.controller.start().await.unwrap();

        assert!(snapshot.session.is_capturing);
        assert_eq!(snapshot.session.remaining_seconds, 10);
        assert_eq!(snapshot.session.phase, CapturePhase::Capturing);
        assert!(h.ticks.is_armed());
    }

    #[tokio::test]
    async fn test_readings_and_expiry() {
        let mut h = harness(10);
        h.controller.start().await.unwrap();

        for text in ["300", "350", "400"] {
            h.frame(text);
        }
        let snapshot = h.wait_for(|s| s.session.history.len() == 3).await;
        assert_eq!(
            snapshot.session.status_history,
            vec![MuscleStatus::Contracted, MuscleStatus::Average, MuscleStatus::Tense]
        );

        for _ in 0..10 {
            h.ticks.tick();
        }
        let snapshot = h.wait_for(|s| !s.session.is_capturing).await;
        assert_eq!(snapshot.session.phase, CapturePhase::Finished);
        assert_eq!(snapshot.session.remaining_seconds, 0);
        assert_eq!(snapshot.session.current_status, MuscleStatus::Tense);
        assert!(!h.ticks.is_armed());

        h.frame("500");
        let snapshot = h.wait_for(|s| s.session.discarded_frames == 1).await;
        assert_eq!(snapshot.session.history.len(), 3);
    }

    #[tokio::test]
    async fn test_stop_releases_ticker() {
        let mut h = harness(10);
        h.controller.start().await.unwrap();
        h.frame("345");
        h.wait_for(|s| s.session.history.len() == 1).await;

        let snapshot = h.controller.stop().await.unwrap();
        assert!(!snapshot.session.is_capturing);
        assert_eq!(snapshot.session.history, vec!["345"]);
        assert!(!h.ticks.is_armed());

        let again = h.controller.stop().await.unwrap();
        assert_eq!(again, snapshot);
    }

    #[tokio::test]
    async fn test_link_status_tracking() {
        let mut h = harness(10);
        let peripheral = PeripheralId::new("dev-1");

        h.link
            .send(LinkEvent::Subscribed(crate::link::CharacteristicDescriptor::EMG))
            .unwrap();
        h.wait_for(|s| s.link == LinkStatus::Subscribed).await;

        h.link
            .send(LinkEvent::LinkLost {
                peripheral,
                reason: None,
            })
            .unwrap();
        let snapshot = h.wait_for(|s| s.link == LinkStatus::Lost).await;
        assert_eq!(snapshot.last_link_error.as_deref(), Some("link to dev-1 lost"));
    }

    #[tokio::test]
    async fn test_frames_before_start_are_discarded() {
        let mut h = harness(10);
        h.frame("350");
        h.wait_for(|s| s.session.discarded_frames == 1).await;

        let snapshot = h.controller.start().await.unwrap();
        assert!(snapshot.session.history.is_empty());
        assert_eq!(snapshot.session.discarded_frames, 0);
    }

    #[tokio::test]
    async fn test_frame_queued_before_final_tick_is_recorded() {
        let mut h = harness(1);
        h.controller.start().await.unwrap();

        // Frame and tick are both pending when the actor wakes
        h.frame("350");
        h.ticks.tick();

        let snapshot = h.wait_for(|s| s.session.phase == CapturePhase::Finished).await;
        assert!(!snapshot.session.is_capturing);
        assert_eq!(snapshot.session.history, vec!["350"]);
        assert_eq!(snapshot.session.current_status, MuscleStatus::Average);
    }

    #[tokio::test]
    async fn test_zero_length_window_still_closes() {
        let mut h = harness(0);
        let started = h.controller.start().await.unwrap();
        assert_eq!(started.session.remaining_seconds, 1);
        assert!(h.ticks.is_armed());

        h.ticks.tick();
        let snapshot = h.wait_for(|s| s.session.phase == CapturePhase::Finished).await;
        assert!(!snapshot.session.is_capturing);
        assert_eq!(snapshot.session.remaining_seconds, 0);
        assert!(!h.ticks.is_armed());
    }

    #[tokio::test]
    async fn test_shutdown() {
        let h = harness(10);
        let controller = h.controller;
        controller.shutdown().await.unwrap();
    }
}
