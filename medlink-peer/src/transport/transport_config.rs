use medlink_core::IceServerConfig;

/// WebRTC settings for one [`crate::PeerLink`].
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Empty means the link gathers host candidates only.
    pub ice_servers: Vec<IceServerConfig>,
    pub data_channel_label: String,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            ice_servers: vec![IceServerConfig::stun("stun:stun.l.google.com:19302")],
            data_channel_label: "location".to_owned(),
        }
    }
}

impl TransportConfig {
    /// No STUN/TURN servers, for links on the same host or network.
    pub fn local() -> Self {
        Self {
            ice_servers: Vec::new(),
            ..Default::default()
        }
    }
}
