use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use medlink_core::{
    IceCandidate, PeerId, Recipient, SdpType, SessionDescription, Signal, SignalMessage,
};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, Interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};
use webrtc::data_channel::RTCDataChannel;

use crate::config::SessionConfig;
use crate::error::SessionError;
use crate::relay::{RelayError, Registration, SignalingRelay};
use crate::session::candidate_queue::CandidateQueue;
use crate::session::shared::SessionShared;
use crate::session::state::{ChannelState, EndReason, Role, SessionState, SessionTarget};
use crate::transport::{PeerLink, TransportEvent};

const TRANSPORT_EVENT_BUFFER: usize = 256;
const NEVER: Duration = Duration::from_secs(60 * 60 * 24 * 365);

/// Requests from the [`crate::Session`] handle to its driver.
pub(crate) enum SessionCommand {
    /// A signaling message pushed in from outside the polling loop.
    Signal(SignalMessage),
    Disconnect { done: oneshot::Sender<()> },
}

enum Startup {
    Ready,
    /// Registration or the offer could not reach the relay; retried by the poll loop.
    Degraded(SessionError),
    Failed(SessionError),
    Interrupted(Option<oneshot::Sender<()>>),
}

/// What the driver loop handles next.
enum Step {
    Signal(SignalMessage),
    Transport(TransportEvent),
    Poll,
    Deadline,
    Disconnect(Option<oneshot::Sender<()>>),
}

/// Owns one negotiation from registration to teardown.
///
/// Every input (relay messages, pushed signals, transport callbacks, timers)
/// is handled on this task, one at a time.
pub(crate) struct SessionDriver {
    state: SessionState,
    config: SessionConfig,
    relay: Arc<dyn SignalingRelay>,
    shared: Arc<SessionShared>,
    link: Option<PeerLink>,
    local_channel: Option<Arc<RTCDataChannel>>,
    local_offer: Option<SessionDescription>,
    candidates: CandidateQueue,
    outbound_candidates: Vec<IceCandidate>,
    outbox: VecDeque<(Recipient, Signal)>,
    transport_tx: mpsc::Sender<TransportEvent>,
    transport_rx: mpsc::Receiver<TransportEvent>,
    poll_timer: Interval,
    last_heartbeat: Option<Instant>,
    deadline: Option<Instant>,
    end_reason: Option<EndReason>,
    leave: Option<JoinHandle<()>>,
}

impl SessionDriver {
    pub fn new(
        peer_id: PeerId,
        role: Role,
        target: SessionTarget,
        config: SessionConfig,
        relay: Arc<dyn SignalingRelay>,
        shared: Arc<SessionShared>,
    ) -> Self {
        let (transport_tx, transport_rx) = mpsc::channel(TRANSPORT_EVENT_BUFFER);
        let state = SessionState::new(peer_id, role, target);
        let period = if state.target.is_none() {
            config.room_poll_interval
        } else {
            config.poll_interval
        };
        let deadline = config.negotiation_timeout.map(|t| Instant::now() + t);

        let driver = Self {
            state,
            poll_timer: poll_timer(period, Instant::now()),
            config,
            relay,
            shared,
            link: None,
            local_channel: None,
            local_offer: None,
            candidates: CandidateQueue::default(),
            outbound_candidates: Vec::new(),
            outbox: VecDeque::new(),
            transport_tx,
            transport_rx,
            last_heartbeat: None,
            deadline,
            end_reason: None,
            leave: None,
        };
        driver.publish();
        driver
    }

    pub async fn run(
        mut self,
        mut command_rx: mpsc::Receiver<SessionCommand>,
        ready_tx: oneshot::Sender<Result<(), SessionError>>,
    ) {
        info!(
            "Session driver started for {} as {:?}",
            self.state.peer_id, self.state.role
        );

        let mut deferred = VecDeque::new();
        let startup = match interruptible(self.bootstrap(), &mut command_rx, &mut deferred).await
        {
            Ok(startup) => startup,
            Err(done) => Startup::Interrupted(done),
        };

        match startup {
            Startup::Ready => {
                let _ = ready_tx.send(Ok(()));
            }
            Startup::Degraded(err) => {
                warn!("Session setup incomplete, retrying from the poll loop: {}", err);
                let _ = ready_tx.send(Err(err));
            }
            Startup::Failed(err) => {
                error!("Session setup failed for {}: {}", self.state.peer_id, err);
                self.shutdown(EndReason::SetupFailed(err.to_string())).await;
                let _ = ready_tx.send(Err(err));
            }
            Startup::Interrupted(done) => {
                info!("Session for {} disconnected during setup", self.state.peer_id);
                self.shutdown(EndReason::Disconnected).await;
                let _ = ready_tx.send(Err(SessionError::SessionClosed));
                if let Some(done) = done {
                    let _ = done.send(());
                }
            }
        }

        while !self.state.is_closed() {
            let step = match deferred.pop_front() {
                Some(msg) => Step::Signal(msg),
                None => self.next_step(&mut command_rx).await,
            };

            let outcome = match step {
                Step::Signal(msg) => {
                    interruptible(self.dispatch(msg), &mut command_rx, &mut deferred).await
                }
                Step::Transport(event) => {
                    let work = self.handle_transport_event(event);
                    interruptible(work, &mut command_rx, &mut deferred).await
                }
                Step::Poll => {
                    interruptible(self.poll_tick(), &mut command_rx, &mut deferred).await
                }
                Step::Deadline => {
                    warn!(
                        "No data channel for {} within {:?}, giving up",
                        self.state.peer_id, self.config.negotiation_timeout
                    );
                    self.shutdown(EndReason::NegotiationTimeout).await;
                    Ok(())
                }
                Step::Disconnect(done) => Err(done),
            };

            if let Err(done) = outcome {
                self.shutdown(EndReason::Disconnected).await;
                if let Some(done) = done {
                    let _ = done.send(());
                }
            }
        }

        // A later session for the same peer must not register before this leave lands.
        if let Some(leave) = self.leave.take() {
            let _ = leave.await;
        }
        info!("Session driver finished for {}", self.state.peer_id);
    }

    async fn next_step(&mut self, command_rx: &mut mpsc::Receiver<SessionCommand>) -> Step {
        let deadline_armed = self.deadline.is_some() && !self.state.data_channel_ready;
        let deadline = self.deadline.unwrap_or_else(|| Instant::now() + NEVER);

        tokio::select! {
            cmd = command_rx.recv() => match cmd {
                Some(SessionCommand::Signal(msg)) => Step::Signal(msg),
                Some(SessionCommand::Disconnect { done }) => Step::Disconnect(Some(done)),
                None => {
                    debug!("Session handle dropped");
                    Step::Disconnect(None)
                }
            },

            Some(event) = self.transport_rx.recv() => Step::Transport(event),

            _ = self.poll_timer.tick(), if self.state.polling => Step::Poll,

            _ = time::sleep_until(deadline), if deadline_armed => Step::Deadline,
        }
    }

    async fn bootstrap(&mut self) -> Startup {
        let link = match PeerLink::new(
            self.state.peer_id.clone(),
            &self.config.transport(),
            self.transport_tx.clone(),
        )
        .await
        {
            Ok(link) => link,
            Err(err) => return Startup::Failed(err),
        };

        if self.state.role.is_initiator() {
            match link.create_data_channel().await {
                Ok(channel) => self.local_channel = Some(channel),
                Err(err) => return Startup::Failed(err),
            }
        }
        self.link = Some(link);

        if let Err(err) = self.register().await {
            return Startup::Degraded(err);
        }

        if self.state.role.is_initiator() {
            match self.send_offer().await {
                Ok(()) => {}
                Err(err) if err.is_relay_failure() => return Startup::Degraded(err),
                Err(err) => return Startup::Failed(err),
            }
        }

        Startup::Ready
    }

    async fn register(&mut self) -> Result<(), SessionError> {
        let mut registration = Registration::new(self.state.peer_id.clone(), self.config.peer_type);
        registration.room = self.state.room.clone();

        self.relay.register(&registration).await?;
        if !self.state.registered {
            info!(
                "Registered {} with the relay (room: {:?})",
                self.state.peer_id, self.state.room
            );
        }
        self.state.on_registered();
        self.publish();
        Ok(())
    }

    /// Creates the local offer once, then hands it to the relay.
    async fn send_offer(&mut self) -> Result<(), SessionError> {
        let Some(link) = self.link.as_ref() else {
            return Err(SessionError::SessionClosed);
        };
        let offer = match self.local_offer.clone() {
            Some(offer) => offer,
            None => {
                let offer = link.create_offer().await?;
                self.state.offer_created = true;
                self.local_offer = Some(offer.clone());
                offer
            }
        };
        let Some(to) = self.state.recipient() else {
            return Err(SessionError::Negotiation("offer has no recipient".into()));
        };

        info!("Sending offer from {} to {}", self.state.peer_id, to);
        self.send_signal(to, Signal::Offer(offer)).await
    }

    async fn poll_tick(&mut self) {
        if !self.state.registered {
            match self.register().await {
                Ok(()) if self.state.role.is_initiator() && !self.state.offer_created => {
                    if let Err(err) = self.send_offer().await {
                        warn!("Offer from {} not sent yet: {}", self.state.peer_id, err);
                    }
                }
                Ok(()) => {}
                Err(err) => warn!("Registration of {} failed: {}", self.state.peer_id, err),
            }
        } else if self.awaiting_room_answer() {
            // Members may join the room after the first broadcast.
            if let Err(err) = self.send_offer().await {
                debug!("Offer rebroadcast failed: {}", err);
            }
        }

        self.flush_outbox().await;

        match self.relay.poll(&self.state.peer_id).await {
            Ok(messages) => {
                for msg in messages {
                    self.dispatch(msg).await;
                    if self.state.is_closed() {
                        return;
                    }
                }
            }
            Err(err) => warn!("Relay poll failed for {}: {}", self.state.peer_id, err),
        }

        if self.state.polling && self.heartbeat_due() {
            self.last_heartbeat = Some(Instant::now());
            match self.relay.heartbeat(&self.state.peer_id).await {
                Ok(()) => {}
                Err(RelayError::Rejected { status: 404, .. }) => {
                    warn!("Relay forgot {}, registering again", self.state.peer_id);
                    self.state.registered = false;
                }
                Err(err) => warn!("Heartbeat failed for {}: {}", self.state.peer_id, err),
            }
        }
    }

    fn awaiting_room_answer(&self) -> bool {
        self.state.role.is_initiator()
            && self.state.target.is_none()
            && self.state.offer_created
            && self.outbox.is_empty()
            && self.state.channel_state == ChannelState::AwaitingAnswer
    }

    fn heartbeat_due(&self) -> bool {
        self.last_heartbeat
            .is_none_or(|at| at.elapsed() >= self.config.heartbeat_interval)
    }

    async fn dispatch(&mut self, msg: SignalMessage) {
        if self.state.is_closed() {
            return;
        }
        if msg.from == self.state.peer_id {
            debug!("Ignoring own {} echoed by the relay", msg.kind());
            return;
        }

        match msg.signal {
            Signal::Offer(offer) => self.handle_offer(offer, msg.from).await,
            Signal::Answer(answer) => self.handle_answer(answer, msg.from).await,
            Signal::IceCandidate(candidate) => {
                self.handle_ice_candidate(candidate, msg.from).await
            }
        }
    }

    async fn handle_offer(&mut self, offer: SessionDescription, from: PeerId) {
        if offer.sdp_type != SdpType::Offer || !self.state.accepts_offer(&from) {
            debug!(
                "Ignoring offer from {} in state {}",
                from, self.state.channel_state
            );
            return;
        }
        let Some(link) = self.link.as_ref() else {
            return;
        };

        info!("Received offer from {}", from);
        if let Err(err) = link.set_remote_description(offer).await {
            warn!("Rejected offer from {}: {}", from, err);
            return;
        }
        let answer = link.create_answer().await;

        self.state.begin_connecting(&from);
        self.on_target_resolved().await;
        self.publish();

        match answer {
            Ok(answer) => {
                info!("Sending answer from {} to {}", self.state.peer_id, from);
                let _ = self
                    .send_signal(Recipient::Peer(from.clone()), Signal::Answer(answer))
                    .await;
            }
            Err(err) => warn!("Could not answer offer from {}: {}", from, err),
        }

        self.flush_candidates(&from).await;
    }

    async fn handle_answer(&mut self, answer: SessionDescription, from: PeerId) {
        if answer.sdp_type != SdpType::Answer || !self.state.accepts_answer(&from) {
            debug!(
                "Ignoring answer from {} in state {}",
                from, self.state.channel_state
            );
            return;
        }
        let Some(link) = self.link.as_ref() else {
            return;
        };

        info!("Received answer from {}", from);
        if let Err(err) = link.set_remote_description(answer).await {
            warn!("Rejected answer from {}: {}", from, err);
            return;
        }

        self.state.begin_connecting(&from);
        self.on_target_resolved().await;
        self.publish();
        self.flush_candidates(&from).await;
    }

    async fn handle_ice_candidate(&mut self, candidate: IceCandidate, from: PeerId) {
        if !self.state.accepts_candidate(&from) {
            debug!("Ignoring ICE candidate from {}", from);
            return;
        }
        if !self.candidates.admit(&candidate) {
            debug!("Skipping duplicate ICE candidate from {}", from);
            return;
        }
        if !self.state.remote_description_set {
            self.candidates.defer(from, candidate);
            return;
        }
        self.apply_candidate(candidate, &from).await;
    }

    async fn apply_candidate(&mut self, candidate: IceCandidate, from: &PeerId) {
        let Some(link) = self.link.as_ref() else {
            return;
        };
        if let Err(err) = link.add_ice_candidate(candidate).await {
            warn!("Failed to add ICE candidate from {}: {}", from, err);
        }
    }

    async fn flush_candidates(&mut self, from: &PeerId) {
        let pending = self.candidates.take_from(from);
        if !pending.is_empty() {
            debug!("Applying {} queued ICE candidate(s) from {}", pending.len(), from);
        }
        for candidate in pending {
            self.apply_candidate(candidate, from).await;
        }
    }

    /// Room sessions learn their peer from the first remote description; from
    /// then on they poll at the normal cadence and release held candidates.
    async fn on_target_resolved(&mut self) {
        if self.state.room.is_none() {
            return;
        }
        if self.poll_timer.period() != self.config.poll_interval {
            let period = self.config.poll_interval;
            self.poll_timer = poll_timer(period, Instant::now() + period);
        }

        let Some(target) = self.state.target.clone() else {
            return;
        };
        for candidate in std::mem::take(&mut self.outbound_candidates) {
            let to = Recipient::Peer(target.clone());
            let _ = self.send_signal(to, Signal::IceCandidate(candidate)).await;
        }
    }

    async fn handle_transport_event(&mut self, event: TransportEvent) {
        if self.state.is_closed() {
            return;
        }

        match event {
            TransportEvent::CandidateGenerated(candidate) => {
                // Room initiators hold candidates until an answer names the peer.
                let Some(target) = self.state.target.clone() else {
                    self.outbound_candidates.push(candidate);
                    return;
                };
                let _ = self
                    .send_signal(Recipient::Peer(target), Signal::IceCandidate(candidate))
                    .await;
            }

            TransportEvent::ChannelOpen(channel) => {
                info!(
                    "Data channel open between {} and {:?}, relay polling stopped",
                    self.state.peer_id, self.state.target
                );
                self.state.open();
                self.deadline = None;
                self.shared.set_channel(Some(channel));
                self.publish();
            }

            TransportEvent::Message(data) => match serde_json::from_slice(&data) {
                Ok(payload) => self.shared.deliver(payload),
                Err(err) => warn!("Discarding non-JSON data channel frame: {}", err),
            },

            TransportEvent::ChannelClosed => self.shutdown(EndReason::ChannelClosed).await,

            TransportEvent::ChannelError(err) => {
                self.shutdown(EndReason::ChannelError(err)).await
            }

            TransportEvent::ConnectionFailed => {
                self.shutdown(EndReason::ConnectionFailed).await
            }
        }
    }

    /// Hands a signal to the relay, keeping it for the next tick if that fails.
    async fn send_signal(&mut self, to: Recipient, signal: Signal) -> Result<(), SessionError> {
        match relay_signal(self.relay.as_ref(), &self.state.peer_id, &to, &signal).await {
            Ok(()) => Ok(()),
            Err(err) => {
                warn!("Failed to relay {} to {}: {}", signal.kind(), to, err);
                self.outbox.push_back((to, signal));
                Err(err.into())
            }
        }
    }

    async fn flush_outbox(&mut self) {
        while let Some((to, signal)) = self.outbox.front() {
            let sent = relay_signal(self.relay.as_ref(), &self.state.peer_id, to, signal).await;
            if let Err(err) = sent {
                debug!("Relay still unavailable, {} signal(s) held: {}", self.outbox.len(), err);
                return;
            }
            self.outbox.pop_front();
        }
    }

    async fn shutdown(&mut self, reason: EndReason) {
        if self.end_reason.is_some() {
            return;
        }
        info!("Closing session for {}: {:?}", self.state.peer_id, reason);

        self.state.close();
        self.end_reason = Some(reason);
        self.shared.set_channel(None);
        self.publish();

        if let Some(channel) = self.local_channel.take() {
            if let Err(err) = channel.close().await {
                debug!("Data channel close failed: {}", err);
            }
        }
        if let Some(link) = self.link.take() {
            if let Err(err) = link.close().await {
                debug!("Peer connection close failed: {}", err);
            }
        }
        self.candidates.clear();
        self.outbound_candidates.clear();
        self.outbox.clear();

        let relay = Arc::clone(&self.relay);
        let peer_id = self.state.peer_id.clone();
        let room = self.state.room.clone();
        let timeout = self.config.request_timeout;
        self.leave = Some(tokio::spawn(async move {
            match time::timeout(timeout, relay.leave(&peer_id, room.as_ref())).await {
                Ok(Ok(())) => debug!("{} left the relay", peer_id),
                Ok(Err(err)) => debug!("Leave for {} failed: {}", peer_id, err),
                Err(_) => debug!("Leave for {} timed out", peer_id),
            }
        }));
    }

    fn publish(&self) {
        self.shared
            .publish(self.state.status(self.end_reason.clone()));
    }
}

/// Runs `work` while still reading commands. Signals are queued for later; a
/// disconnect, or the handle going away, abandons `work`.
async fn interruptible<T>(
    work: impl Future<Output = T>,
    command_rx: &mut mpsc::Receiver<SessionCommand>,
    deferred: &mut VecDeque<SignalMessage>,
) -> Result<T, Option<oneshot::Sender<()>>> {
    tokio::pin!(work);
    loop {
        tokio::select! {
            output = &mut work => return Ok(output),
            cmd = command_rx.recv() => match cmd {
                Some(SessionCommand::Signal(msg)) => deferred.push_back(msg),
                Some(SessionCommand::Disconnect { done }) => return Err(Some(done)),
                None => return Err(None),
            },
        }
    }
}

async fn relay_signal(
    relay: &dyn SignalingRelay,
    from: &PeerId,
    to: &Recipient,
    signal: &Signal,
) -> Result<(), RelayError> {
    match signal {
        Signal::Offer(offer) => relay.send_offer(from, to, offer).await,
        Signal::Answer(answer) => relay.send_answer(from, to, answer).await,
        Signal::IceCandidate(candidate) => relay.send_ice_candidate(from, to, candidate).await,
    }
}

fn poll_timer(period: Duration, start: Instant) -> Interval {
    let mut timer = time::interval_at(start, period.max(Duration::from_millis(1)));
    timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
    timer
}
