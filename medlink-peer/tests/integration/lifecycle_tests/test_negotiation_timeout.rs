use std::time::Duration;

use medlink_core::PeerId;
use medlink_peer::{ChannelState, EndReason, Role, SessionError};

use crate::integration::init_tracing;
use crate::utils::{MemoryRelay, TestPeer, test_config};

#[tokio::test]
async fn test_unanswered_session_closes_at_the_deadline() {
    init_tracing();
    let relay = MemoryRelay::new();
    let config = test_config().with_negotiation_timeout(Some(Duration::from_millis(400)));
    let rider = TestPeer::with_config("rider-7", config, relay.clone());

    rider
        .initialize(PeerId::from("driver-1"), Role::Initiator)
        .await
        .unwrap();

    assert_eq!(
        rider.wait_until_open(Duration::from_secs(5)).await,
        Err(SessionError::SessionClosed)
    );
    let status = rider.status();
    assert_eq!(status.state, ChannelState::Closed);
    assert_eq!(status.end_reason, Some(EndReason::NegotiationTimeout));

    // Polling stopped with the session.
    let polls = relay.poll_count("rider-7");
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(relay.poll_count("rider-7"), polls);
}

#[tokio::test]
async fn test_without_deadline_waiting_only_times_out_the_caller() {
    init_tracing();
    let relay = MemoryRelay::new();
    let config = test_config().with_negotiation_timeout(None);
    let driver = TestPeer::with_config("driver-1", config, relay);

    driver
        .initialize(PeerId::from("rider-7"), Role::Responder)
        .await
        .unwrap();

    assert_eq!(
        driver.wait_until_open(Duration::from_millis(400)).await,
        Err(SessionError::Timeout)
    );
    assert_eq!(driver.state(), ChannelState::AwaitingOffer);

    driver.disconnect().await;
}
