use std::time::Duration;

use async_trait::async_trait;
use medlink_core::{
    AnswerRequest, ErrorResponse, HeartbeatRequest, IceCandidate, IceCandidateRequest,
    LeaveRequest, MessagesResponse, OfferRequest, PeerId, Recipient, RegisterRequest, RoomId,
    SessionDescription, SignalMessage, unix_millis,
};
use reqwest::{Client, Response};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;
use url::Url;

use crate::relay::{RelayError, Registration, SignalingRelay};

/// [`SignalingRelay`] over the relay's JSON HTTP API.
#[derive(Debug, Clone)]
pub struct HttpRelay {
    client: Client,
    base: Url,
}

impl HttpRelay {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, RelayError> {
        let base = Url::parse(base_url)
            .map_err(|err| RelayError::InvalidUrl(format!("{base_url}: {err}")))?;
        if base.cannot_be_a_base() {
            return Err(RelayError::InvalidUrl(format!(
                "{base_url}: not a hierarchical url"
            )));
        }
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| RelayError::InvalidUrl(err.to_string()))?;

        Ok(Self { client, base })
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, RelayError> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| RelayError::InvalidUrl(self.base.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn post_json<B: Serialize + ?Sized>(
        &self,
        segments: &[&str],
        body: &B,
    ) -> Result<(), RelayError> {
        let url = self.endpoint(segments)?;
        debug!("POST {}", url);
        let response = self.client.post(url).json(body).send().await?;
        check_status(response).await?;
        Ok(())
    }

    async fn get_json<T: DeserializeOwned>(&self, segments: &[&str]) -> Result<T, RelayError> {
        let url = self.endpoint(segments)?;
        let response = check_status(self.client.get(url).send().await?).await?;
        response
            .json::<T>()
            .await
            .map_err(|err| RelayError::Unreachable(format!("undecodable relay response: {err}")))
    }
}

/// Turns a non-2xx response into [`RelayError::Rejected`], preferring the relay's `{error}` body.
async fn check_status(response: Response) -> Result<Response, RelayError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let text = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorResponse>(&text)
        .map(|body| body.error)
        .unwrap_or_else(|_| {
            if text.trim().is_empty() {
                status.to_string()
            } else {
                text
            }
        });

    Err(RelayError::Rejected {
        status: status.as_u16(),
        message,
    })
}

#[async_trait]
impl SignalingRelay for HttpRelay {
    async fn register(&self, registration: &Registration) -> Result<(), RelayError> {
        let body = RegisterRequest {
            peer_id: registration.peer_id.clone(),
            peer_type: registration.peer_type,
            room: registration.room.clone(),
            timestamp: Some(unix_millis()),
        };
        self.post_json(&["webrtc", "register"], &body).await
    }

    async fn send_offer(
        &self,
        from: &PeerId,
        to: &Recipient,
        offer: &SessionDescription,
    ) -> Result<(), RelayError> {
        let body = OfferRequest {
            peer_id: from.clone(),
            target_id: to.clone(),
            offer: offer.clone(),
        };
        self.post_json(&["webrtc", "offer"], &body).await
    }

    async fn send_answer(
        &self,
        from: &PeerId,
        to: &Recipient,
        answer: &SessionDescription,
    ) -> Result<(), RelayError> {
        let body = AnswerRequest {
            peer_id: from.clone(),
            target_id: to.clone(),
            answer: answer.clone(),
        };
        self.post_json(&["webrtc", "answer"], &body).await
    }

    async fn send_ice_candidate(
        &self,
        from: &PeerId,
        to: &Recipient,
        candidate: &IceCandidate,
    ) -> Result<(), RelayError> {
        let body = IceCandidateRequest {
            peer_id: from.clone(),
            target_id: to.clone(),
            candidate: candidate.clone(),
        };
        self.post_json(&["webrtc", "ice-candidate"], &body).await
    }

    async fn poll(&self, peer_id: &PeerId) -> Result<Vec<SignalMessage>, RelayError> {
        let response: MessagesResponse = self
            .get_json(&["webrtc", "messages", peer_id.as_str()])
            .await?;
        Ok(response.messages)
    }

    async fn heartbeat(&self, peer_id: &PeerId) -> Result<(), RelayError> {
        let body = HeartbeatRequest {
            peer_id: peer_id.clone(),
        };
        self.post_json(&["webrtc", "heartbeat"], &body).await
    }

    async fn leave(&self, peer_id: &PeerId, room: Option<&RoomId>) -> Result<(), RelayError> {
        let body = LeaveRequest {
            peer_id: peer_id.clone(),
            room: room.cloned(),
        };
        self.post_json(&["webrtc", "leave"], &body).await
    }
}
