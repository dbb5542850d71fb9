use std::time::Duration;

use medlink_core::{PeerId, SignalKind};
use medlink_peer::{ChannelState, Role};
use serde_json::json;

use crate::integration::init_tracing;
use crate::utils::{MemoryRelay, RECV_TIMEOUT, TestPeer, wait_both_open};

#[tokio::test]
async fn test_candidates_before_the_offer_are_applied_after_it() {
    init_tracing();
    let relay = MemoryRelay::new();
    relay.set_hold_offers(true);

    let rider = TestPeer::new("rider-7", relay.clone());
    let mut driver = TestPeer::new("driver-1", relay.clone());

    driver
        .initialize(PeerId::from("rider-7"), Role::Responder)
        .await
        .unwrap();
    rider
        .initialize(PeerId::from("driver-1"), Role::Initiator)
        .await
        .unwrap();

    // The rider's trickled candidates reach the driver while its offer is held.
    let mut early = false;
    for _ in 0..100 {
        if relay
            .delivered_to("driver-1")
            .iter()
            .any(|msg| msg.kind() == SignalKind::IceCandidate)
        {
            early = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    assert!(early, "no ICE candidate reached the driver");
    assert_eq!(driver.state(), ChannelState::AwaitingOffer);

    assert_eq!(relay.release_offers().unwrap(), 1);
    wait_both_open(&rider, &driver).await.unwrap();

    let kinds: Vec<SignalKind> = relay
        .delivered_to("driver-1")
        .iter()
        .map(|msg| msg.kind())
        .collect();
    let first_candidate = kinds.iter().position(|kind| *kind == SignalKind::IceCandidate);
    let offer = kinds.iter().position(|kind| *kind == SignalKind::Offer);
    assert!(first_candidate < offer, "delivery order was {kinds:?}");

    rider.send(&json!({ "eta_minutes": 4 })).await.unwrap();
    assert_eq!(
        driver.next_payload(RECV_TIMEOUT).await,
        Some(json!({ "eta_minutes": 4 }))
    );

    rider.disconnect().await;
    driver.disconnect().await;
}
