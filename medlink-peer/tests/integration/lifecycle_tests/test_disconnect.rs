use std::time::Duration;

use medlink_core::PeerId;
use medlink_peer::{ChannelState, EndReason, Role, SessionError};
use serde_json::json;
use tokio::time::Instant;

use crate::integration::init_tracing;
use crate::utils::{MemoryRelay, TestPeer, connect_pair, wait_both_open};

#[tokio::test]
async fn test_disconnect_is_idempotent_and_final() {
    init_tracing();
    let relay = MemoryRelay::new();
    let (rider, driver) = connect_pair(relay.clone()).await.unwrap();

    rider.disconnect().await;
    rider.disconnect().await;

    let status = rider.status();
    assert_eq!(status.state, ChannelState::Closed);
    assert_eq!(status.end_reason, Some(EndReason::Disconnected));
    assert!(!rider.is_ready());
    assert_eq!(
        rider.send(&json!({ "late": true })).await,
        Err(SessionError::SessionClosed)
    );
    assert_eq!(
        rider.handle_signal(relay.delivered_to("rider-7")[0].clone()).await,
        Err(SessionError::SessionClosed)
    );

    // The remote side sees the channel go away; it does not reconnect.
    let mut driver_status = driver.subscribe();
    let closed = tokio::time::timeout(
        Duration::from_secs(30),
        driver_status.wait_for(|status| status.state == ChannelState::Closed),
    )
    .await;
    assert!(closed.is_ok(), "driver never observed the closed channel");
    assert!(matches!(
        driver.status().end_reason,
        Some(EndReason::ChannelClosed | EndReason::ConnectionFailed | EndReason::ChannelError(_))
    ));

    driver.disconnect().await;
    assert_eq!(driver.state(), ChannelState::Closed);
}

#[tokio::test]
async fn test_disconnect_removes_the_peer_from_the_relay() {
    init_tracing();
    let relay = MemoryRelay::new();
    let driver = TestPeer::new("driver-1", relay.clone());

    driver
        .initialize(PeerId::from("rider-7"), Role::Responder)
        .await
        .unwrap();
    assert!(relay.store().is_registered(&PeerId::from("driver-1")));

    driver.disconnect().await;

    let mut left = false;
    for _ in 0..50 {
        if !relay.store().is_registered(&PeerId::from("driver-1")) {
            left = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert!(left, "leave never reached the relay");
}

#[tokio::test]
async fn test_disconnect_before_initialize_is_harmless() {
    init_tracing();
    let relay = MemoryRelay::new();
    let rider = TestPeer::new("rider-7", relay);

    rider.disconnect().await;

    assert_eq!(rider.state(), ChannelState::Closed);
    assert_eq!(
        rider.send(&json!({})).await,
        Err(SessionError::SessionClosed)
    );
}

#[tokio::test]
async fn test_disconnect_cancels_an_initialize_in_flight() {
    init_tracing();
    let relay = MemoryRelay::new();
    relay.set_latency(Duration::from_millis(500));
    let rider = TestPeer::new("rider-7", relay.clone());

    let (init, _) = tokio::join!(
        rider.initialize(PeerId::from("driver-1"), Role::Initiator),
        async {
            tokio::time::sleep(Duration::from_millis(100)).await;
            rider.disconnect().await;
        }
    );

    assert_eq!(init, Err(SessionError::SessionClosed));
    assert_eq!(rider.state(), ChannelState::Closed);
    assert_eq!(rider.status().end_reason, Some(EndReason::Disconnected));
}

#[tokio::test]
async fn test_closed_session_can_be_initialized_again() {
    init_tracing();
    let relay = MemoryRelay::new();
    let (rider, driver) = connect_pair(relay.clone()).await.unwrap();

    assert_eq!(
        rider
            .initialize(PeerId::from("driver-1"), Role::Initiator)
            .await,
        Err(SessionError::AlreadyActive)
    );

    rider.disconnect().await;
    driver.disconnect().await;

    let (driver_init, rider_init) = tokio::join!(
        driver.initialize(PeerId::from("rider-7"), Role::Responder),
        rider.initialize(PeerId::from("driver-1"), Role::Initiator),
    );
    driver_init.unwrap();
    rider_init.unwrap();
    assert_eq!(rider.status().end_reason, None);

    wait_both_open(&rider, &driver).await.unwrap();

    rider.disconnect().await;
    driver.disconnect().await;
}

#[tokio::test]
async fn test_slow_leave_cannot_unregister_the_next_session() {
    init_tracing();
    let relay = MemoryRelay::new();
    let (rider, driver) = connect_pair(relay.clone()).await.unwrap();

    relay.set_leave_latency(Duration::from_millis(300));
    rider.disconnect().await;
    driver.disconnect().await;

    driver
        .initialize(PeerId::from("rider-7"), Role::Responder)
        .await
        .unwrap();
    assert!(relay.store().is_registered(&PeerId::from("driver-1")));

    rider
        .initialize(PeerId::from("driver-1"), Role::Initiator)
        .await
        .unwrap();
    assert!(relay.store().is_registered(&PeerId::from("rider-7")));

    wait_both_open(&rider, &driver).await.unwrap();
    assert!(relay.store().is_registered(&PeerId::from("driver-1")));

    rider.disconnect().await;
    driver.disconnect().await;
}

#[tokio::test]
async fn test_disconnect_does_not_wait_for_a_slow_relay() {
    init_tracing();
    let relay = MemoryRelay::new();
    let driver = TestPeer::new("driver-1", relay.clone());

    driver
        .initialize(PeerId::from("rider-7"), Role::Responder)
        .await
        .unwrap();

    // Every relay call, the leave included, now takes 3s.
    relay.set_latency(Duration::from_secs(3));
    tokio::time::sleep(Duration::from_millis(100)).await;

    let started = Instant::now();
    driver.disconnect().await;
    let elapsed = started.elapsed();

    assert!(elapsed < Duration::from_secs(1), "disconnect took {elapsed:?}");
    assert_eq!(driver.state(), ChannelState::Closed);
    assert_eq!(driver.status().end_reason, Some(EndReason::Disconnected));
}
