pub use medlink_core::{PeerId, RoomId};

pub mod model {
    pub use medlink_core::*;
}

#[cfg(feature = "relay")]
pub mod relay {
    pub use medlink_relay::*;
}

#[cfg(feature = "peer")]
pub mod peer {
    pub use medlink_peer::*;
}
