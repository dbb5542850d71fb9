use bytes::Bytes;
use medlink_core::IceCandidate;
use std::sync::Arc;
use webrtc::data_channel::RTCDataChannel;

/// Events a [`crate::PeerLink`] reports to the session driver.
pub enum TransportEvent {
    /// A local ICE candidate that has to reach the remote peer through the relay.
    CandidateGenerated(IceCandidate),

    /// The data channel is open and writable.
    ChannelOpen(Arc<RTCDataChannel>),

    Message(Bytes),

    ChannelClosed,

    ChannelError(String),

    /// ICE or DTLS gave up on the peer connection.
    ConnectionFailed,
}
