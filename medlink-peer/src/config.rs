use std::env;
use std::time::Duration;

use medlink_core::{IceServerConfig, PeerType};

use crate::transport::TransportConfig;

const DEFAULT_RELAY_URL: &str = "http://127.0.0.1:8080";
const DEFAULT_STUN_SERVERS: [&str; 2] = [
    "stun:stun.l.google.com:19302",
    "stun:stun1.l.google.com:19302",
];

/// Tunables for one [`crate::Session`].
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Base URL of the signaling relay, e.g. `https://dispatch.example.org/api`.
    pub relay_base_url: String,
    /// STUN/TURN URIs handed to the peer connection. Empty means host candidates only.
    pub stun_servers: Vec<String>,
    pub peer_type: PeerType,
    pub poll_interval: Duration,
    /// Poll cadence used in room mode until the remote peer is known.
    pub room_poll_interval: Duration,
    pub heartbeat_interval: Duration,
    pub request_timeout: Duration,
    /// `None` lets a session wait for its peer indefinitely.
    pub negotiation_timeout: Option<Duration>,
    pub data_channel_label: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            relay_base_url: DEFAULT_RELAY_URL.to_owned(),
            stun_servers: DEFAULT_STUN_SERVERS.iter().map(|s| s.to_string()).collect(),
            peer_type: PeerType::default(),
            poll_interval: Duration::from_millis(200),
            room_poll_interval: Duration::from_millis(1000),
            heartbeat_interval: Duration::from_millis(200),
            request_timeout: Duration::from_secs(10),
            negotiation_timeout: Some(Duration::from_secs(30)),
            data_channel_label: "location".to_owned(),
        }
    }
}

impl SessionConfig {
    pub fn new(relay_base_url: impl Into<String>) -> Self {
        Self {
            relay_base_url: relay_base_url.into(),
            ..Default::default()
        }
    }

    /// Defaults overridden by `MEDLINK_RELAY_URL`, `MEDLINK_STUN_SERVERS` (comma separated),
    /// `MEDLINK_POLL_INTERVAL_MS` and `MEDLINK_NEGOTIATION_TIMEOUT_MS` (`0` disables it).
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(url) = env_value("MEDLINK_RELAY_URL") {
            config.relay_base_url = url;
        }
        if let Some(servers) = env_value("MEDLINK_STUN_SERVERS") {
            config.stun_servers = parse_server_list(&servers);
        }
        if let Some(ms) = env_value("MEDLINK_POLL_INTERVAL_MS").and_then(|v| v.parse().ok()) {
            config.poll_interval = Duration::from_millis(ms);
            config.heartbeat_interval = Duration::from_millis(ms);
        }
        if let Some(ms) =
            env_value("MEDLINK_NEGOTIATION_TIMEOUT_MS").and_then(|v| v.parse::<u64>().ok())
        {
            config.negotiation_timeout = (ms > 0).then(|| Duration::from_millis(ms));
        }

        config
    }

    pub fn with_relay_url(mut self, url: impl Into<String>) -> Self {
        self.relay_base_url = url.into();
        self
    }

    pub fn with_stun_servers<I, S>(mut self, servers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.stun_servers = servers.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_peer_type(mut self, peer_type: PeerType) -> Self {
        self.peer_type = peer_type;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_room_poll_interval(mut self, interval: Duration) -> Self {
        self.room_poll_interval = interval;
        self
    }

    pub fn with_heartbeat_interval(mut self, interval: Duration) -> Self {
        self.heartbeat_interval = interval;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_negotiation_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.negotiation_timeout = timeout;
        self
    }

    pub fn with_data_channel_label(mut self, label: impl Into<String>) -> Self {
        self.data_channel_label = label.into();
        self
    }

    pub fn transport(&self) -> TransportConfig {
        TransportConfig {
            ice_servers: self
                .stun_servers
                .iter()
                .map(|url| IceServerConfig::stun(url.clone()))
                .collect(),
            data_channel_label: self.data_channel_label.clone(),
        }
    }
}

fn env_value(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|v| v.trim().to_owned())
        .filter(|v| !v.is_empty())
}

pub(crate) fn parse_server_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_owned)
        .collect()
}
