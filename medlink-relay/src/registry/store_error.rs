use medlink_core::PeerId;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("Missing required fields")]
    MissingField,

    #[error("Peer not registered: {0}")]
    UnknownPeer(PeerId),

    #[error("Peer {0} is not in a room, cannot broadcast")]
    NoRoom(PeerId),
}
