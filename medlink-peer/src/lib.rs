//! Client side of the driver/rider data link.
//!
//! A [`Session`] registers with the signaling relay, negotiates a WebRTC data
//! channel with one remote peer by polling the relay for offers, answers and
//! ICE candidates, and stops polling as soon as the direct channel opens.

mod config;
mod error;
pub mod relay;
pub mod session;
pub mod transport;

pub use config::SessionConfig;
pub use error::SessionError;
pub use relay::{HttpRelay, RelayError, Registration, SignalingRelay};
pub use session::{ChannelState, EndReason, Role, Session, SessionStatus, SessionTarget};
pub use transport::{PeerLink, TransportConfig, TransportEvent};
