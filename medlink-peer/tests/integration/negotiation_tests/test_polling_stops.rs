use std::time::Duration;

use crate::integration::init_tracing;
use crate::utils::{MemoryRelay, connect_pair};

#[tokio::test]
async fn test_relay_is_not_polled_once_the_channel_is_open() {
    init_tracing();
    let relay = MemoryRelay::new();

    let (rider, driver) = connect_pair(relay.clone()).await.unwrap();

    let rider_polls = relay.poll_count("rider-7");
    let driver_polls = relay.poll_count("driver-1");
    assert!(rider_polls > 0 && driver_polls > 0);

    // Ten poll intervals of the test config.
    tokio::time::sleep(Duration::from_millis(500)).await;

    assert_eq!(relay.poll_count("rider-7"), rider_polls);
    assert_eq!(relay.poll_count("driver-1"), driver_polls);

    rider.disconnect().await;
    driver.disconnect().await;
}
