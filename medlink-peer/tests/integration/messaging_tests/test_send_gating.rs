use std::time::Duration;

use medlink_core::PeerId;
use medlink_peer::{ChannelState, Role, SessionError};
use serde_json::json;

use crate::integration::init_tracing;
use crate::utils::{MemoryRelay, RECV_TIMEOUT, TestPeer, connect_pair};

#[tokio::test]
async fn test_send_before_initialize_is_rejected() {
    init_tracing();
    let relay = MemoryRelay::new();
    let rider = TestPeer::new("rider-7", relay);

    assert_eq!(rider.state(), ChannelState::Closed);
    assert!(!rider.is_ready());
    assert_eq!(
        rider.send(&json!({ "type": "location" })).await,
        Err(SessionError::ChannelNotReady)
    );
}

#[tokio::test]
async fn test_send_while_negotiating_is_rejected() {
    init_tracing();
    let relay = MemoryRelay::new();
    let driver = TestPeer::new("driver-1", relay);

    driver
        .initialize(PeerId::from("rider-7"), Role::Responder)
        .await
        .unwrap();
    assert_eq!(driver.state(), ChannelState::AwaitingOffer);
    assert_eq!(
        driver.send(&json!({ "type": "location" })).await,
        Err(SessionError::ChannelNotReady)
    );

    driver.disconnect().await;
}

#[tokio::test]
async fn test_open_channel_delivers_each_send_exactly_once() {
    init_tracing();
    let relay = MemoryRelay::new();
    let (mut rider, mut driver) = connect_pair(relay).await.unwrap();

    let location = json!({ "type": "location", "lat": 22.5, "lng": 88.4 });
    rider.send(&location).await.unwrap();

    let received = driver.drain_payloads(Duration::from_millis(500)).await;
    assert_eq!(received, vec![location]);

    // The channel is bidirectional.
    driver.send(&json!({ "ack": true })).await.unwrap();
    assert_eq!(
        rider.next_payload(RECV_TIMEOUT).await,
        Some(json!({ "ack": true }))
    );

    rider.disconnect().await;
    driver.disconnect().await;
}
