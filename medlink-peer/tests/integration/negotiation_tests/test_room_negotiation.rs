use medlink_core::{PeerId, RoomId};
use medlink_peer::Role;
use serde_json::json;

use crate::integration::init_tracing;
use crate::utils::{MemoryRelay, RECV_TIMEOUT, TestPeer, wait_both_open};

#[tokio::test]
async fn test_room_members_resolve_each_other_from_the_first_exchange() {
    init_tracing();
    let relay = MemoryRelay::new();
    let room = RoomId::from("booking-42");

    let mut driver = TestPeer::new("driver-1", relay.clone());
    driver.join_room(room.clone(), Role::Responder).await.unwrap();

    let rider = TestPeer::new("rider-7", relay.clone());
    rider.join_room(room.clone(), Role::Initiator).await.unwrap();

    wait_both_open(&rider, &driver).await.unwrap();

    assert_eq!(rider.status().target, Some(PeerId::from("driver-1")));
    assert_eq!(driver.status().target, Some(PeerId::from("rider-7")));
    assert_eq!(driver.status().room, Some(room));

    rider.send(&json!({ "eta_minutes": 4 })).await.unwrap();
    assert_eq!(
        driver.next_payload(RECV_TIMEOUT).await,
        Some(json!({ "eta_minutes": 4 }))
    );

    rider.disconnect().await;
    driver.disconnect().await;
}

#[tokio::test]
async fn test_room_offer_is_rebroadcast_to_late_joiners() {
    init_tracing();
    let relay = MemoryRelay::new();
    let room = RoomId::from("booking-43");

    // The initiator's first broadcast reaches nobody.
    let rider = TestPeer::new("rider-8", relay.clone());
    rider.join_room(room.clone(), Role::Initiator).await.unwrap();

    let driver = TestPeer::new("driver-2", relay.clone());
    driver.join_room(room, Role::Responder).await.unwrap();

    wait_both_open(&rider, &driver).await.unwrap();
    assert_eq!(rider.status().target, Some(PeerId::from("driver-2")));

    rider.disconnect().await;
    driver.disconnect().await;
}
