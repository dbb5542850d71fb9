use std::time::Duration;

use medlink_peer::ChannelState;
use serde_json::json;

use crate::integration::init_tracing;
use crate::utils::{MemoryRelay, RECV_TIMEOUT, connect_pair};

#[tokio::test]
async fn test_duplicated_relay_deliveries_still_negotiate_once() {
    init_tracing();
    let relay = MemoryRelay::new();
    relay.set_duplicate_deliveries(true);

    let (rider, mut driver) = connect_pair(relay.clone()).await.unwrap();

    rider.send(&json!({ "seq": 1 })).await.unwrap();
    assert_eq!(
        driver.next_payload(RECV_TIMEOUT).await,
        Some(json!({ "seq": 1 }))
    );

    rider.disconnect().await;
    driver.disconnect().await;
}

#[tokio::test]
async fn test_replayed_signals_after_open_are_ignored() {
    init_tracing();
    let relay = MemoryRelay::new();

    let (rider, mut driver) = connect_pair(relay.clone()).await.unwrap();

    // Replay the whole negotiation into both sides.
    for msg in relay.delivered_to("driver-1") {
        driver.handle_signal(msg).await.unwrap();
    }
    for msg in relay.delivered_to("rider-7") {
        rider.handle_signal(msg).await.unwrap();
    }
    tokio::time::sleep(Duration::from_millis(200)).await;

    assert_eq!(rider.state(), ChannelState::Open);
    assert_eq!(driver.state(), ChannelState::Open);

    rider.send(&json!({ "after": "replay" })).await.unwrap();
    assert_eq!(
        driver.next_payload(RECV_TIMEOUT).await,
        Some(json!({ "after": "replay" }))
    );

    rider.disconnect().await;
    driver.disconnect().await;
}
