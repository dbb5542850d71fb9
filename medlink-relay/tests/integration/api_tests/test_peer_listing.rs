use crate::integration::init_tracing;
use crate::utils::TestRelay;

#[tokio::test]
async fn test_registered_peers_are_listed() {
    init_tracing();
    let relay = TestRelay::start().await.unwrap();

    relay.register("driver-1", "driver", Some("booking-42")).await.unwrap();
    relay.register("hospital-3", "hospital", None).await.unwrap();

    let (status, body) = relay.get("/webrtc/peers").await.unwrap();
    assert!(status.is_success());

    let peers = body["peers"].as_object().unwrap();
    assert_eq!(peers.len(), 2);
    assert_eq!(peers["driver-1"]["type"], "driver");
    assert_eq!(peers["driver-1"]["room"], "booking-42");
    assert_eq!(peers["hospital-3"]["type"], "hospital");
    assert!(peers["hospital-3"].get("room").is_none());
}
