use std::sync::Arc;
use std::time::Duration;

use medlink_core::{Location, Packet, PeerId, RoomId, SignalMessage};
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time;
use tracing::{debug, info};

use crate::config::SessionConfig;
use crate::error::SessionError;
use crate::relay::{HttpRelay, SignalingRelay};
use crate::session::driver::{SessionCommand, SessionDriver};
use crate::session::shared::SessionShared;
use crate::session::{ChannelState, EndReason, Role, SessionStatus, SessionTarget};

const COMMAND_BUFFER: usize = 64;

struct DriverHandle {
    command_tx: mpsc::Sender<SessionCommand>,
    /// Finishes once the driver has closed and its leave request has settled.
    task: JoinHandle<()>,
}

/// One peer's end of a direct data channel, negotiated through a signaling relay.
///
/// `Session` is a cheap handle: negotiation runs on a spawned driver task and
/// the handle talks to it over channels. A closed session can be started again
/// with [`Session::initialize`] or [`Session::join_room`].
pub struct Session {
    peer_id: PeerId,
    config: SessionConfig,
    relay: Arc<dyn SignalingRelay>,
    shared: Arc<SessionShared>,
    driver: Mutex<Option<DriverHandle>>,
}

impl Session {
    pub fn new(peer_id: PeerId, config: SessionConfig, relay: Arc<dyn SignalingRelay>) -> Self {
        Self {
            peer_id,
            config,
            relay,
            shared: Arc::new(SessionShared::new()),
            driver: Mutex::new(None),
        }
    }

    /// Session backed by an [`HttpRelay`] at `config.relay_base_url`.
    pub fn over_http(peer_id: PeerId, config: SessionConfig) -> Result<Self, SessionError> {
        let relay = HttpRelay::new(&config.relay_base_url, config.request_timeout)?;
        Ok(Self::new(peer_id, config, Arc::new(relay)))
    }

    pub fn peer_id(&self) -> &PeerId {
        &self.peer_id
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Starts negotiating with `target`.
    ///
    /// Resolves once the peer link exists, registration went through and, for
    /// an initiator, the offer reached the relay. A relay failure is returned
    /// here once; the session keeps running and retries on its poll loop.
    pub async fn initialize(&self, target: PeerId, role: Role) -> Result<(), SessionError> {
        self.start(SessionTarget::Peer(target), role).await
    }

    /// Starts negotiating with whichever member of `room` responds first.
    pub async fn join_room(&self, room: RoomId, role: Role) -> Result<(), SessionError> {
        self.start(SessionTarget::Room(room), role).await
    }

    async fn start(&self, target: SessionTarget, role: Role) -> Result<(), SessionError> {
        let previous = {
            let mut driver = self.driver.lock();
            if driver.as_ref().is_some_and(|handle| self.is_active(handle)) {
                return Err(SessionError::AlreadyActive);
            }
            driver.take()
        };
        if let Some(previous) = previous {
            match time::timeout(self.config.request_timeout, previous.task).await {
                Ok(Ok(())) => {}
                Ok(Err(err)) => {
                    debug!("Previous driver for {} ended abnormally: {}", self.peer_id, err)
                }
                Err(_) => debug!("Previous driver for {} still closing", self.peer_id),
            }
        }

        let ready_rx = {
            let mut driver = self.driver.lock();
            if driver.as_ref().is_some_and(|handle| self.is_active(handle)) {
                return Err(SessionError::AlreadyActive);
            }

            info!("Starting session for {} towards {:?}", self.peer_id, target);
            self.shared.set_channel(None);

            let (command_tx, command_rx) = mpsc::channel(COMMAND_BUFFER);
            let (ready_tx, ready_rx) = oneshot::channel();
            let session_driver = SessionDriver::new(
                self.peer_id.clone(),
                role,
                target,
                self.config.clone(),
                Arc::clone(&self.relay),
                Arc::clone(&self.shared),
            );
            let task = tokio::spawn(session_driver.run(command_rx, ready_tx));
            *driver = Some(DriverHandle { command_tx, task });
            ready_rx
        };

        ready_rx.await.unwrap_or(Err(SessionError::SessionClosed))
    }

    /// Feeds a signaling message received outside the relay poll loop.
    pub async fn handle_signal(&self, message: SignalMessage) -> Result<(), SessionError> {
        let command_tx = self
            .active_command_tx()
            .ok_or(SessionError::SessionClosed)?;

        command_tx
            .send(SessionCommand::Signal(message))
            .await
            .map_err(|_| SessionError::SessionClosed)
    }

    /// Writes `payload` as one JSON text frame. Fails without writing unless the channel is open.
    pub async fn send<T: Serialize + ?Sized>(&self, payload: &T) -> Result<(), SessionError> {
        let status = self.shared.status();
        if status.has_ended() {
            return Err(SessionError::SessionClosed);
        }
        if !status.is_ready() {
            return Err(SessionError::ChannelNotReady);
        }
        let channel = self.shared.channel().ok_or(SessionError::ChannelNotReady)?;

        let text = serde_json::to_string(payload)?;
        channel
            .send_text(text)
            .await
            .map_err(SessionError::transport)?;
        Ok(())
    }

    pub async fn send_location_update(&self, location: Location) -> Result<(), SessionError> {
        self.send(&Packet::location(location)).await
    }

    pub async fn send_booking_update(&self, booking: Value) -> Result<(), SessionError> {
        self.send(&Packet::booking(booking)).await
    }

    /// Registers the consumer of inbound JSON payloads. A later call replaces it.
    pub fn on_data<F>(&self, handler: F)
    where
        F: Fn(Value) + Send + Sync + 'static,
    {
        self.shared.set_data_handler(Arc::new(handler));
    }

    /// Tears the session down and tells the relay this peer is gone. Safe to
    /// call repeatedly and from any state.
    ///
    /// Returns once local resources are closed; the leave request completes
    /// in the background, and a later [`Session::initialize`] waits for it.
    pub async fn disconnect(&self) {
        if let Some(command_tx) = self.active_command_tx() {
            let (done_tx, done_rx) = oneshot::channel();
            let command = SessionCommand::Disconnect { done: done_tx };
            if command_tx.send(command).await.is_ok() {
                let _ = done_rx.await;
            }
        }

        self.shared.mark_closed(EndReason::Disconnected);
    }

    /// A driver that is still negotiating or holding an open channel.
    fn is_active(&self, handle: &DriverHandle) -> bool {
        !handle.task.is_finished() && !self.shared.status().has_ended()
    }

    fn active_command_tx(&self) -> Option<mpsc::Sender<SessionCommand>> {
        self.driver
            .lock()
            .as_ref()
            .filter(|handle| self.is_active(handle))
            .map(|handle| handle.command_tx.clone())
    }

    pub fn state(&self) -> ChannelState {
        self.shared.status().state
    }

    pub fn is_ready(&self) -> bool {
        self.shared.status().is_ready()
    }

    pub fn status(&self) -> SessionStatus {
        self.shared.status()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionStatus> {
        self.shared.subscribe()
    }

    /// Waits until the channel opens, or fails if the session ends first.
    pub async fn wait_until_open(&self, timeout: Duration) -> Result<(), SessionError> {
        let mut status_rx = self.shared.subscribe();
        let wait = status_rx.wait_for(|status| status.is_ready() || status.has_ended());

        let status = time::timeout(timeout, wait)
            .await
            .map_err(|_| SessionError::Timeout)?
            .map_err(|_| SessionError::SessionClosed)?;

        if status.is_ready() {
            Ok(())
        } else {
            Err(SessionError::SessionClosed)
        }
    }
}
