mod packet;
mod peer;
mod request;
mod room;
mod signaling;

pub use packet::{Location, Packet};
pub use peer::{PeerId, PeerType};
pub use request::{
    AnswerRequest, ErrorResponse, HeartbeatRequest, IceCandidateRequest, LeaveRequest,
    MessagesResponse, OfferRequest, PeerInfo, PeersResponse, RegisterRequest, StatusResponse,
};
pub use room::RoomId;
pub use signaling::{
    IceCandidate, IceServerConfig, Recipient, SdpType, SessionDescription, Signal, SignalKind,
    SignalMessage,
};
