use crate::model::peer::PeerId;
use serde::{Deserialize, Serialize};
use std::fmt;

const BROADCAST: &str = "all";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IceServerConfig {
    pub urls: Vec<String>,
    pub username: Option<String>,
    pub credential: Option<String>,
}

impl IceServerConfig {
    pub fn stun(url: impl Into<String>) -> Self {
        Self {
            urls: vec![url.into()],
            username: None,
            credential: None,
        }
    }
}

/// Addressee of a signal: one peer, or every other peer in the sender's room.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Recipient {
    Peer(PeerId),
    All,
}

impl Recipient {
    pub fn peer(&self) -> Option<&PeerId> {
        match self {
            Recipient::Peer(id) => Some(id),
            Recipient::All => None,
        }
    }
}

impl From<String> for Recipient {
    fn from(s: String) -> Self {
        if s == BROADCAST {
            Recipient::All
        } else {
            Recipient::Peer(PeerId::from(s))
        }
    }
}

impl From<Recipient> for String {
    fn from(r: Recipient) -> Self {
        match r {
            Recipient::Peer(id) => id.as_str().to_owned(),
            Recipient::All => BROADCAST.to_owned(),
        }
    }
}

impl From<PeerId> for Recipient {
    fn from(id: PeerId) -> Self {
        Recipient::Peer(id)
    }
}

impl fmt::Display for Recipient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Recipient::Peer(id) => write!(f, "{id}"),
            Recipient::All => f.write_str(BROADCAST),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SdpType {
    Offer,
    Answer,
}

/// SDP payload as the browser serializes `RTCSessionDescriptionInit`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionDescription {
    #[serde(rename = "type")]
    pub sdp_type: SdpType,
    pub sdp: String,
}

impl SessionDescription {
    pub fn offer(sdp: impl Into<String>) -> Self {
        Self {
            sdp_type: SdpType::Offer,
            sdp: sdp.into(),
        }
    }

    pub fn answer(sdp: impl Into<String>) -> Self {
        Self {
            sdp_type: SdpType::Answer,
            sdp: sdp.into(),
        }
    }
}

/// Trickle ICE candidate, field names follow `RTCIceCandidateInit`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct IceCandidate {
    pub candidate: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sdp_mid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sdp_m_line_index: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username_fragment: Option<String>,
}

impl IceCandidate {
    pub fn new(candidate: impl Into<String>) -> Self {
        Self {
            candidate: candidate.into(),
            sdp_mid: None,
            sdp_m_line_index: None,
            username_fragment: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalKind {
    Offer,
    Answer,
    IceCandidate,
}

impl fmt::Display for SignalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SignalKind::Offer => "offer",
            SignalKind::Answer => "answer",
            SignalKind::IceCandidate => "ice-candidate",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", content = "payload", rename_all = "kebab-case")]
pub enum Signal {
    Offer(SessionDescription),
    Answer(SessionDescription),
    IceCandidate(IceCandidate),
}

impl Signal {
    pub fn kind(&self) -> SignalKind {
        match self {
            Signal::Offer(_) => SignalKind::Offer,
            Signal::Answer(_) => SignalKind::Answer,
            Signal::IceCandidate(_) => SignalKind::IceCandidate,
        }
    }
}

/// One relayed signal as returned by the poll endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SignalMessage {
    pub from: PeerId,
    pub to: Recipient,
    #[serde(flatten)]
    pub signal: Signal,
    pub timestamp: i64,
}

impl SignalMessage {
    pub fn new(from: PeerId, to: impl Into<Recipient>, signal: Signal) -> Self {
        Self {
            from,
            to: to.into(),
            signal,
            timestamp: crate::unix_millis(),
        }
    }

    pub fn kind(&self) -> SignalKind {
        self.signal.kind()
    }
}
