//! JSON bodies of the relay HTTP API.

use crate::model::peer::{PeerId, PeerType};
use crate::model::room::RoomId;
use crate::model::signaling::{IceCandidate, Recipient, SessionDescription, SignalMessage};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterRequest {
    pub peer_id: PeerId,
    #[serde(default)]
    pub peer_type: PeerType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub room: Option<RoomId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OfferRequest {
    pub peer_id: PeerId,
    pub target_id: Recipient,
    pub offer: SessionDescription,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnswerRequest {
    pub peer_id: PeerId,
    pub target_id: Recipient,
    pub answer: SessionDescription,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IceCandidateRequest {
    pub peer_id: PeerId,
    pub target_id: Recipient,
    pub candidate: IceCandidate,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeartbeatRequest {
    pub peer_id: PeerId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeaveRequest {
    pub peer_id: PeerId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub room: Option<RoomId>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MessagesResponse {
    #[serde(default)]
    pub messages: Vec<SignalMessage>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub peer_id: Option<PeerId>,
}

impl StatusResponse {
    pub fn new(status: impl Into<String>) -> Self {
        Self {
            status: status.into(),
            peer_id: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PeerInfo {
    #[serde(rename = "type")]
    pub peer_type: PeerType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub room: Option<RoomId>,
    pub registered_at: i64,
    pub last_seen: i64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PeersResponse {
    pub peers: BTreeMap<PeerId, PeerInfo>,
}
