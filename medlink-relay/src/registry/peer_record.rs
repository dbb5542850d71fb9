use medlink_core::{PeerInfo, PeerType, RoomId};

/// Registration entry kept for each live peer.
#[derive(Debug, Clone)]
pub struct PeerRecord {
    pub peer_type: PeerType,
    pub room: Option<RoomId>,
    pub registered_at: i64,
    pub last_seen: i64,
}

impl PeerRecord {
    pub(crate) fn new(peer_type: PeerType, room: Option<RoomId>, now: i64) -> Self {
        Self {
            peer_type,
            room,
            registered_at: now,
            last_seen: now,
        }
    }

    pub fn in_room(&self, room: &RoomId) -> bool {
        self.room.as_ref() == Some(room)
    }

    pub fn info(&self) -> PeerInfo {
        PeerInfo {
            peer_type: self.peer_type,
            room: self.room.clone(),
            registered_at: self.registered_at,
            last_seen: self.last_seen,
        }
    }
}
