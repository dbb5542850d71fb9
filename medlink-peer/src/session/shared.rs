use std::sync::Arc;

use parking_lot::RwLock;
use serde_json::Value;
use tokio::sync::watch;
use tracing::debug;
use webrtc::data_channel::RTCDataChannel;

use crate::session::{ChannelState, EndReason, SessionStatus};

pub(crate) type DataHandler = Arc<dyn Fn(Value) + Send + Sync>;

/// State the driver publishes and the [`crate::Session`] handle reads.
pub(crate) struct SessionShared {
    status: watch::Sender<SessionStatus>,
    channel: RwLock<Option<Arc<RTCDataChannel>>>,
    data_handler: RwLock<Option<DataHandler>>,
}

impl SessionShared {
    pub fn new() -> Self {
        let (status, _) = watch::channel(SessionStatus::idle());
        Self {
            status,
            channel: RwLock::new(None),
            data_handler: RwLock::new(None),
        }
    }

    pub fn status(&self) -> SessionStatus {
        self.status.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionStatus> {
        self.status.subscribe()
    }

    pub fn publish(&self, status: SessionStatus) {
        self.status.send_if_modified(|current| {
            if *current == status {
                return false;
            }
            *current = status;
            true
        });
    }

    /// Records `reason` unless the session already ended for another one.
    pub fn mark_closed(&self, reason: EndReason) {
        self.channel.write().take();
        self.status.send_if_modified(|current| {
            if current.has_ended() {
                return false;
            }
            current.state = ChannelState::Closed;
            current.end_reason = Some(reason);
            true
        });
    }

    pub fn channel(&self) -> Option<Arc<RTCDataChannel>> {
        self.channel.read().clone()
    }

    pub fn set_channel(&self, channel: Option<Arc<RTCDataChannel>>) {
        *self.channel.write() = channel;
    }

    pub fn set_data_handler(&self, handler: DataHandler) {
        *self.data_handler.write() = Some(handler);
    }

    /// Hands an inbound payload to the registered consumer, if any.
    pub fn deliver(&self, payload: Value) {
        let handler = self.data_handler.read().clone();
        match handler {
            Some(handler) => handler(payload),
            None => debug!("Dropping inbound payload, no data handler registered"),
        }
    }
}
