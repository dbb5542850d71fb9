use async_trait::async_trait;
use medlink_core::{
    IceCandidate, PeerId, PeerType, Recipient, RoomId, SessionDescription, SignalMessage,
};

use crate::relay::RelayError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registration {
    pub peer_id: PeerId,
    pub peer_type: PeerType,
    pub room: Option<RoomId>,
}

impl Registration {
    pub fn new(peer_id: PeerId, peer_type: PeerType) -> Self {
        Self {
            peer_id,
            peer_type,
            room: None,
        }
    }

    pub fn in_room(mut self, room: RoomId) -> Self {
        self.room = Some(room);
        self
    }
}

/// Store-and-forward mailbox used to exchange negotiation messages before a
/// direct channel exists.
///
/// Implementations keep no session state of their own; every call maps to one
/// request against the relay.
#[async_trait]
pub trait SignalingRelay: Send + Sync {
    /// Announces presence. Re-registering refreshes liveness.
    async fn register(&self, registration: &Registration) -> Result<(), RelayError>;

    async fn send_offer(
        &self,
        from: &PeerId,
        to: &Recipient,
        offer: &SessionDescription,
    ) -> Result<(), RelayError>;

    async fn send_answer(
        &self,
        from: &PeerId,
        to: &Recipient,
        answer: &SessionDescription,
    ) -> Result<(), RelayError>;

    async fn send_ice_candidate(
        &self,
        from: &PeerId,
        to: &Recipient,
        candidate: &IceCandidate,
    ) -> Result<(), RelayError>;

    /// Dequeues everything addressed to `peer_id`. An empty mailbox is not an error.
    async fn poll(&self, peer_id: &PeerId) -> Result<Vec<SignalMessage>, RelayError>;

    async fn heartbeat(&self, peer_id: &PeerId) -> Result<(), RelayError>;

    async fn leave(&self, peer_id: &PeerId, room: Option<&RoomId>) -> Result<(), RelayError>;
}
