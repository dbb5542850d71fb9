use std::fmt;

use medlink_core::{PeerId, Recipient, RoomId};

/// Negotiation phase of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelState {
    Registering,
    AwaitingAnswer,
    AwaitingOffer,
    Connecting,
    Open,
    Closed,
}

impl fmt::Display for ChannelState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ChannelState::Registering => "registering",
            ChannelState::AwaitingAnswer => "awaiting-answer",
            ChannelState::AwaitingOffer => "awaiting-offer",
            ChannelState::Connecting => "connecting",
            ChannelState::Open => "open",
            ChannelState::Closed => "closed",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    /// Creates the data channel and sends the offer.
    Initiator,
    /// Waits for an offer and answers it.
    Responder,
}

impl Role {
    pub fn is_initiator(self) -> bool {
        matches!(self, Role::Initiator)
    }

    fn awaiting(self) -> ChannelState {
        match self {
            Role::Initiator => ChannelState::AwaitingAnswer,
            Role::Responder => ChannelState::AwaitingOffer,
        }
    }
}

/// Who a session negotiates with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionTarget {
    /// A known peer.
    Peer(PeerId),
    /// Whoever in the room answers first (initiator) or offers first (responder).
    Room(RoomId),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EndReason {
    Disconnected,
    ChannelClosed,
    ChannelError(String),
    ConnectionFailed,
    NegotiationTimeout,
    SetupFailed(String),
}

/// Snapshot of a session, published to observers on every transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionStatus {
    pub state: ChannelState,
    pub role: Option<Role>,
    pub target: Option<PeerId>,
    pub room: Option<RoomId>,
    pub end_reason: Option<EndReason>,
}

impl SessionStatus {
    /// A session that was never started.
    pub fn idle() -> Self {
        Self {
            state: ChannelState::Closed,
            role: None,
            target: None,
            room: None,
            end_reason: None,
        }
    }

    pub fn is_ready(&self) -> bool {
        self.state == ChannelState::Open
    }

    /// Closed after having run, as opposed to never started.
    pub fn has_ended(&self) -> bool {
        self.state == ChannelState::Closed && self.end_reason.is_some()
    }
}

/// Negotiation bookkeeping. Owned and mutated by the session driver only.
#[derive(Debug, Clone)]
pub(crate) struct SessionState {
    pub peer_id: PeerId,
    pub role: Role,
    pub target: Option<PeerId>,
    pub room: Option<RoomId>,
    pub channel_state: ChannelState,
    pub polling: bool,
    pub data_channel_ready: bool,
    pub remote_description_set: bool,
    pub registered: bool,
    pub offer_created: bool,
}

impl SessionState {
    pub fn new(peer_id: PeerId, role: Role, target: SessionTarget) -> Self {
        let (target, room) = match target {
            SessionTarget::Peer(peer) => (Some(peer), None),
            SessionTarget::Room(room) => (None, Some(room)),
        };
        Self {
            peer_id,
            role,
            target,
            room,
            channel_state: ChannelState::Registering,
            polling: true,
            data_channel_ready: false,
            remote_description_set: false,
            registered: false,
            offer_created: false,
        }
    }

    /// First successful registration moves the session to its waiting state.
    pub fn on_registered(&mut self) {
        self.registered = true;
        if self.channel_state == ChannelState::Registering {
            self.channel_state = self.role.awaiting();
        }
    }

    /// Where outbound signals go: the resolved peer, or the whole room before that.
    pub fn recipient(&self) -> Option<Recipient> {
        match (&self.target, &self.room) {
            (Some(peer), _) => Some(Recipient::Peer(peer.clone())),
            (None, Some(_)) => Some(Recipient::All),
            (None, None) => None,
        }
    }

    fn is_target(&self, from: &PeerId) -> bool {
        self.target.as_ref().is_none_or(|target| target == from)
    }

    pub fn accepts_offer(&self, from: &PeerId) -> bool {
        // A queued offer can be polled on the same tick that registration is retried.
        self.role == Role::Responder
            && matches!(
                self.channel_state,
                ChannelState::Registering | ChannelState::AwaitingOffer
            )
            && self.is_target(from)
    }

    pub fn accepts_answer(&self, from: &PeerId) -> bool {
        self.role == Role::Initiator
            && self.channel_state == ChannelState::AwaitingAnswer
            && self.is_target(from)
    }

    pub fn accepts_candidate(&self, from: &PeerId) -> bool {
        self.channel_state != ChannelState::Closed && self.is_target(from)
    }

    /// Remote description installed: the peer that sent it becomes the target.
    pub fn begin_connecting(&mut self, from: &PeerId) {
        self.target = Some(from.clone());
        self.remote_description_set = true;
        self.channel_state = ChannelState::Connecting;
    }

    pub fn open(&mut self) {
        self.channel_state = ChannelState::Open;
        self.data_channel_ready = true;
        self.polling = false;
    }

    pub fn close(&mut self) {
        self.channel_state = ChannelState::Closed;
        self.data_channel_ready = false;
        self.polling = false;
    }

    pub fn is_closed(&self) -> bool {
        self.channel_state == ChannelState::Closed
    }

    pub fn status(&self, end_reason: Option<EndReason>) -> SessionStatus {
        SessionStatus {
            state: self.channel_state,
            role: Some(self.role),
            target: self.target.clone(),
            room: self.room.clone(),
            end_reason,
        }
    }
}
