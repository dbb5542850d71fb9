use serde_json::json;

use crate::integration::init_tracing;
use crate::utils::TestRelay;

#[tokio::test]
async fn test_offer_answer_and_candidate_round_trip() {
    init_tracing();
    let relay = TestRelay::start().await.expect("Failed to start relay");

    relay.register("driver-1", "driver", None).await.unwrap();
    relay.register("rider-7", "rider", None).await.unwrap();

    let (status, body) = relay
        .post(
            "/webrtc/offer",
            json!({
                "peer_id": "rider-7",
                "target_id": "driver-1",
                "offer": { "type": "offer", "sdp": "v=0 offer" }
            }),
        )
        .await
        .unwrap();
    assert!(status.is_success());
    assert_eq!(body["status"], "offer_sent");

    relay
        .post(
            "/webrtc/ice-candidate",
            json!({
                "peer_id": "rider-7",
                "target_id": "driver-1",
                "candidate": { "candidate": "candidate:1 1 udp 1 127.0.0.1 5000 typ host", "sdpMid": "0" }
            }),
        )
        .await
        .unwrap();

    let messages = relay.messages("driver-1").await.unwrap();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0]["kind"], "offer");
    assert_eq!(messages[0]["from"], "rider-7");
    assert_eq!(messages[0]["payload"]["sdp"], "v=0 offer");
    assert_eq!(messages[1]["kind"], "ice-candidate");
    assert_eq!(messages[1]["payload"]["sdpMid"], "0");

    // Drained on delivery.
    assert!(relay.messages("driver-1").await.unwrap().is_empty());

    relay
        .post(
            "/webrtc/answer",
            json!({
                "peer_id": "driver-1",
                "target_id": "rider-7",
                "answer": { "type": "answer", "sdp": "v=0 answer" }
            }),
        )
        .await
        .unwrap();

    let answers = relay.messages("rider-7").await.unwrap();
    assert_eq!(answers.len(), 1);
    assert_eq!(answers[0]["kind"], "answer");
    assert!(answers[0]["timestamp"].as_i64().unwrap() > 0);
}

#[tokio::test]
async fn test_heartbeat_and_leave() {
    init_tracing();
    let relay = TestRelay::start().await.unwrap();
    relay.register("driver-1", "driver", None).await.unwrap();

    let (status, body) = relay
        .post("/webrtc/heartbeat", json!({ "peer_id": "driver-1" }))
        .await
        .unwrap();
    assert!(status.is_success());
    assert_eq!(body["status"], "heartbeat_received");

    let (status, _) = relay
        .post("/webrtc/leave", json!({ "peer_id": "driver-1" }))
        .await
        .unwrap();
    assert!(status.is_success());
    assert!(
        !relay
            .service
            .store()
            .is_registered(&medlink_core::PeerId::new("driver-1"))
    );
}
