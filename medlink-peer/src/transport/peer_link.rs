use std::sync::Arc;

use medlink_core::{IceCandidate, PeerId, SdpType, SessionDescription};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use webrtc::api::APIBuilder;
use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::MediaEngine;
use webrtc::data_channel::RTCDataChannel;
use webrtc::data_channel::data_channel_init::RTCDataChannelInit;
use webrtc::data_channel::data_channel_message::DataChannelMessage;
use webrtc::ice_transport::ice_candidate::{RTCIceCandidate, RTCIceCandidateInit};
use webrtc::ice_transport::ice_server::RTCIceServer;
use webrtc::interceptor::registry::Registry;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::peer_connection_state::RTCPeerConnectionState;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;

use crate::error::SessionError;
use crate::transport::{TransportConfig, TransportEvent};

/// One WebRTC peer connection carrying a single ordered data channel.
///
/// All asynchronous notifications (local candidates, channel lifecycle, inbound
/// frames) are pushed into the `event_tx` given at construction.
pub struct PeerLink {
    peer_id: PeerId,
    data_channel_label: String,
    peer_connection: Arc<RTCPeerConnection>,
    event_tx: mpsc::Sender<TransportEvent>,
}

impl PeerLink {
    pub async fn new(
        peer_id: PeerId,
        config: &TransportConfig,
        event_tx: mpsc::Sender<TransportEvent>,
    ) -> Result<Self, SessionError> {
        let mut media = MediaEngine::default();
        media
            .register_default_codecs()
            .map_err(SessionError::transport)?;
        let registry = register_default_interceptors(Registry::new(), &mut media)
            .map_err(SessionError::transport)?;

        let api = APIBuilder::new()
            .with_media_engine(media)
            .with_interceptor_registry(registry)
            .build();

        let rtc_config = RTCConfiguration {
            ice_servers: config
                .ice_servers
                .iter()
                .map(|server| RTCIceServer {
                    urls: server.urls.clone(),
                    username: server.username.clone().unwrap_or_default(),
                    credential: server.credential.clone().unwrap_or_default(),
                    ..Default::default()
                })
                .collect(),
            ..Default::default()
        };

        let peer_connection = Arc::new(
            api.new_peer_connection(rtc_config)
                .await
                .map_err(SessionError::transport)?,
        );

        let state_tx = event_tx.clone();
        let state_peer = peer_id.clone();
        peer_connection.on_peer_connection_state_change(Box::new(
            move |state: RTCPeerConnectionState| {
                let tx = state_tx.clone();
                let peer = state_peer.clone();
                Box::pin(async move {
                    debug!("Peer connection state for {}: {}", peer, state);
                    if state == RTCPeerConnectionState::Failed {
                        let _ = tx.send(TransportEvent::ConnectionFailed).await;
                    }
                })
            },
        ));

        let ice_tx = event_tx.clone();
        peer_connection.on_ice_candidate(Box::new(move |candidate: Option<RTCIceCandidate>| {
            let tx = ice_tx.clone();
            Box::pin(async move {
                // `None` marks the end of gathering.
                let Some(candidate) = candidate else { return };
                match candidate.to_json() {
                    Ok(init) => {
                        let candidate = IceCandidate {
                            candidate: init.candidate,
                            sdp_mid: init.sdp_mid,
                            sdp_m_line_index: init.sdp_mline_index,
                            username_fragment: init.username_fragment,
                        };
                        let _ = tx.send(TransportEvent::CandidateGenerated(candidate)).await;
                    }
                    Err(err) => warn!("Failed to serialize local ICE candidate: {}", err),
                }
            })
        }));

        // The responder never creates a channel; it receives the initiator's here.
        let dc_tx = event_tx.clone();
        let dc_peer = peer_id.clone();
        peer_connection.on_data_channel(Box::new(move |channel: Arc<RTCDataChannel>| {
            let tx = dc_tx.clone();
            let peer = dc_peer.clone();
            Box::pin(async move {
                debug!("Remote data channel '{}' announced to {}", channel.label(), peer);
                wire_data_channel(peer, &channel, tx);
            })
        }));

        Ok(Self {
            peer_id,
            data_channel_label: config.data_channel_label.clone(),
            peer_connection,
            event_tx,
        })
    }

    pub fn peer_id(&self) -> &PeerId {
        &self.peer_id
    }

    pub fn data_channel_label(&self) -> &str {
        &self.data_channel_label
    }

    /// Creates the ordered data channel under the configured label. Only the
    /// initiating side calls this.
    pub async fn create_data_channel(&self) -> Result<Arc<RTCDataChannel>, SessionError> {
        let init = RTCDataChannelInit {
            ordered: Some(true),
            ..Default::default()
        };
        let channel = self
            .peer_connection
            .create_data_channel(&self.data_channel_label, Some(init))
            .await
            .map_err(SessionError::transport)?;

        wire_data_channel(self.peer_id.clone(), &channel, self.event_tx.clone());
        Ok(channel)
    }

    /// Creates an offer and installs it as the local description.
    pub async fn create_offer(&self) -> Result<SessionDescription, SessionError> {
        let offer = self
            .peer_connection
            .create_offer(None)
            .await
            .map_err(SessionError::negotiation)?;
        self.peer_connection
            .set_local_description(offer.clone())
            .await
            .map_err(SessionError::negotiation)?;
        Ok(SessionDescription::offer(offer.sdp))
    }

    /// Creates an answer to the installed remote offer and sets it locally.
    pub async fn create_answer(&self) -> Result<SessionDescription, SessionError> {
        let answer = self
            .peer_connection
            .create_answer(None)
            .await
            .map_err(SessionError::negotiation)?;
        self.peer_connection
            .set_local_description(answer.clone())
            .await
            .map_err(SessionError::negotiation)?;
        Ok(SessionDescription::answer(answer.sdp))
    }

    pub async fn set_remote_description(
        &self,
        description: SessionDescription,
    ) -> Result<(), SessionError> {
        let remote = match description.sdp_type {
            SdpType::Offer => RTCSessionDescription::offer(description.sdp),
            SdpType::Answer => RTCSessionDescription::answer(description.sdp),
        }
        .map_err(SessionError::negotiation)?;

        self.peer_connection
            .set_remote_description(remote)
            .await
            .map_err(SessionError::negotiation)
    }

    pub async fn add_ice_candidate(&self, candidate: IceCandidate) -> Result<(), SessionError> {
        let init = RTCIceCandidateInit {
            candidate: candidate.candidate,
            sdp_mid: candidate.sdp_mid,
            sdp_mline_index: candidate.sdp_m_line_index,
            username_fragment: candidate.username_fragment,
        };
        self.peer_connection
            .add_ice_candidate(init)
            .await
            .map_err(SessionError::negotiation)
    }

    pub async fn close(&self) -> Result<(), SessionError> {
        info!("Closing peer connection for {}", self.peer_id);
        self.peer_connection
            .close()
            .await
            .map_err(SessionError::transport)
    }
}

fn wire_data_channel(
    peer_id: PeerId,
    channel: &Arc<RTCDataChannel>,
    event_tx: mpsc::Sender<TransportEvent>,
) {
    let open_channel = Arc::clone(channel);
    let open_tx = event_tx.clone();
    let open_peer = peer_id.clone();
    channel.on_open(Box::new(move || {
        let tx = open_tx.clone();
        let channel = Arc::clone(&open_channel);
        let peer = open_peer.clone();
        Box::pin(async move {
            info!("Data channel '{}' open for {}", channel.label(), peer);
            let _ = tx.send(TransportEvent::ChannelOpen(channel)).await;
        })
    }));

    let message_tx = event_tx.clone();
    channel.on_message(Box::new(move |msg: DataChannelMessage| {
        let tx = message_tx.clone();
        Box::pin(async move {
            let _ = tx.send(TransportEvent::Message(msg.data)).await;
        })
    }));

    let close_tx = event_tx.clone();
    let close_peer = peer_id.clone();
    channel.on_close(Box::new(move || {
        let tx = close_tx.clone();
        let peer = close_peer.clone();
        Box::pin(async move {
            info!("Data channel closed for {}", peer);
            let _ = tx.send(TransportEvent::ChannelClosed).await;
        })
    }));

    channel.on_error(Box::new(move |err| {
        let tx = event_tx.clone();
        let peer = peer_id.clone();
        Box::pin(async move {
            warn!("Data channel error for {}: {}", peer, err);
            let _ = tx.send(TransportEvent::ChannelError(err.to_string())).await;
        })
    }));
}
