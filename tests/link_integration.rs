// tests/link_integration.rs
//! Transport connector against the simulated central

use emg_capture::config::LinkConfig;
use emg_capture::link::simulator::{ActivationPattern, SimulatedCentral, SimulatorConfig};
use emg_capture::link::{LinkEvent, LinkStatus, RawFrame, TransportConnector};
use emg_capture::processing::decode_frame;
use emg_capture::{Classifier, MuscleStatus, Reading};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::timeout;

fn connector_with(config: SimulatorConfig) -> (Arc<SimulatedCentral>, TransportConnector) {
    let (central, events) = SimulatedCentral::new(config).expect("Failed to create simulator");
    let central = Arc::new(central);
    let connector = TransportConnector::new(central.clone(), events, &LinkConfig::default());
    (central, connector)
}

async fn next_event(rx: &mut broadcast::Receiver<LinkEvent>) -> LinkEvent {
    timeout(Duration::from_secs(1), rx.recv())
        .await
        .expect("timed out waiting for link event")
        .expect("link event channel closed")
}

async fn next_frame(rx: &mut broadcast::Receiver<LinkEvent>) -> RawFrame {
    loop {
        if let LinkEvent::FrameReceived(frame) = next_event(rx).await {
            return frame;
        }
    }
}

async fn wait_until_subscribed(rx: &mut broadcast::Receiver<LinkEvent>) {
    loop {
        if let LinkEvent::Subscribed(characteristic) = next_event(rx).await {
            assert_eq!(characteristic.uuid.to_string(), "FFE1");
            assert_eq!(characteristic.service.to_string(), "FFE0");
            return;
        }
    }
}

#[tokio::test(start_paused = true)]
async fn test_subscribers_see_identical_frame_order() {
    let config = SimulatorConfig {
        pattern: ActivationPattern::Ramp { ramp_duration_ms: 2000 },
        noise: 0.0,
        ..Default::default()
    };
    let (_central, connector) = connector_with(config);
    let mut first = connector.subscribe();
    let mut second = connector.subscribe();
    assert_eq!(connector.subscriber_count(), 2);

    connector.start_discovery().await.expect("Failed to start discovery");
    wait_until_subscribed(&mut first).await;
    wait_until_subscribed(&mut second).await;

    for _ in 0..8 {
        let a = next_frame(&mut first).await;
        let b = next_frame(&mut second).await;
        assert_eq!(a.payload(), b.payload());
        assert!(a.payload().starts_with(b"EMG:"));
    }
}

#[tokio::test(start_paused = true)]
async fn test_generated_frames_decode_and_classify() {
    let config = SimulatorConfig {
        pattern: ActivationPattern::Constant,
        baseline: 360.0,
        amplitude: 20.0,
        noise: 0.0,
        ..Default::default()
    };
    let (central, connector) = connector_with(config);
    let mut events = connector.subscribe();
    connector.start_discovery().await.expect("Failed to start discovery");
    wait_until_subscribed(&mut events).await;

    let classifier = Classifier::default();
    for _ in 0..4 {
        let decoded = decode_frame(&next_frame(&mut events).await);
        assert_eq!(decoded.display, "EMG:380");
        assert_eq!(decoded.reading, Reading::Value(380));
        assert_eq!(classifier.classify_reading(&decoded.reading), MuscleStatus::Tense);
    }
    assert!(central.frames_sent() >= 4);
}

#[tokio::test]
async fn test_disconnect_then_rediscover() {
    let (central, connector) = connector_with(SimulatorConfig::scripted());
    let mut events = connector.subscribe();

    connector.start_discovery().await.expect("Failed to start discovery");
    wait_until_subscribed(&mut events).await;
    assert_eq!(connector.status(), LinkStatus::Subscribed);

    connector.disconnect().await.expect("Failed to disconnect");
    loop {
        if let LinkEvent::LinkLost { peripheral, .. } = next_event(&mut events).await {
            assert_eq!(peripheral.as_str(), "EMG-SENSOR-01");
            break;
        }
    }
    assert_eq!(connector.status(), LinkStatus::Lost);
    assert!(connector.peripheral().is_none());
    assert!(!central.inject_frame("350"));

    // No automatic reconnect; a new discovery brings the stream back
    connector.start_discovery().await.expect("Failed to restart discovery");
    wait_until_subscribed(&mut events).await;
    assert!(central.inject_frame("350"));
    assert_eq!(next_frame(&mut events).await.payload(), b"350");
}

#[tokio::test]
async fn test_stop_discovery_without_advertiser() {
    let config = SimulatorConfig {
        advertise: false,
        ..SimulatorConfig::scripted()
    };
    let (central, connector) = connector_with(config);

    connector.start_discovery().await.expect("Failed to start discovery");
    assert_eq!(connector.status(), LinkStatus::Scanning);
    assert!(central.is_scanning());

    connector.stop_discovery().await.expect("Failed to stop discovery");
    assert_eq!(connector.status(), LinkStatus::Idle);
    assert!(!central.is_scanning());
    assert!(connector.peripheral().is_none());
}

#[tokio::test]
async fn test_frames_before_subscription_are_not_replayed() {
    let (central, connector) = connector_with(SimulatorConfig::scripted());
    let mut early = connector.subscribe();

    connector.start_discovery().await.expect("Failed to start discovery");
    wait_until_subscribed(&mut early).await;
    assert!(central.inject_frame("341"));
    assert_eq!(next_frame(&mut early).await.payload(), b"341");

    let mut late = connector.subscribe();
    assert!(central.inject_frame("362"));
    assert_eq!(next_frame(&mut late).await.payload(), b"362");
    assert_eq!(next_frame(&mut early).await.payload(), b"362");
}
