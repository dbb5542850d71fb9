use std::time::Duration;

use medlink_core::PeerId;
use medlink_peer::{ChannelState, Role, SessionError};

use crate::integration::init_tracing;
use crate::utils::{MemoryRelay, TestPeer, wait_both_open};

#[tokio::test]
async fn test_registration_failure_is_reported_once_and_retried() {
    init_tracing();
    let relay = MemoryRelay::new();
    relay.set_offline(true);

    let rider = TestPeer::new("rider-7", relay.clone());
    let init = rider
        .initialize(PeerId::from("driver-1"), Role::Initiator)
        .await;
    assert!(matches!(init, Err(SessionError::RelayUnreachable(_))));
    assert_eq!(rider.state(), ChannelState::Registering);

    // Still alive and polling through the outage.
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(relay.poll_count("rider-7") > 0);
    assert_eq!(
        rider
            .initialize(PeerId::from("driver-1"), Role::Initiator)
            .await,
        Err(SessionError::AlreadyActive)
    );

    relay.set_offline(false);
    let driver = TestPeer::new("driver-1", relay.clone());
    driver
        .initialize(PeerId::from("rider-7"), Role::Responder)
        .await
        .unwrap();

    wait_both_open(&rider, &driver).await.unwrap();

    rider.disconnect().await;
    driver.disconnect().await;
}

#[tokio::test]
async fn test_heartbeat_for_a_forgotten_peer_registers_again() {
    init_tracing();
    let relay = MemoryRelay::new();
    let driver = TestPeer::new("driver-1", relay.clone());

    driver
        .initialize(PeerId::from("rider-7"), Role::Responder)
        .await
        .unwrap();

    // Simulates a relay restart or TTL sweep.
    relay.store().leave(&PeerId::from("driver-1"));

    let mut registered = false;
    for _ in 0..50 {
        tokio::time::sleep(Duration::from_millis(20)).await;
        if relay.store().is_registered(&PeerId::from("driver-1")) {
            registered = true;
            break;
        }
    }
    assert!(registered, "driver never re-registered");
    assert_eq!(driver.state(), ChannelState::AwaitingOffer);

    driver.disconnect().await;
}
