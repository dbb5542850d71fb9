use crate::registry::{PeerRecord, StoreError};
use dashmap::DashMap;
use medlink_core::{PeerId, PeerInfo, PeerType, Recipient, RoomId, Signal, SignalMessage};
use std::collections::{BTreeMap, VecDeque};
use std::time::Duration;
use tracing::{debug, info};

/// In-memory peer registry plus one mailbox per addressee.
///
/// Mailboxes are keyed by the target peer and exist independently of its
/// registration, so a signal sent just before the target registers is still
/// delivered on its first poll. Polling drains the mailbox, which gives
/// at-most-once delivery per message. A mailbox nobody registered for is
/// swept once its newest message is older than the peer TTL.
#[derive(Default)]
pub struct SignalStore {
    peers: DashMap<PeerId, PeerRecord>,
    mailboxes: DashMap<PeerId, VecDeque<SignalMessage>>,
}

impl SignalStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or refreshes a registration. Re-registering keeps the original
    /// `registered_at` and bumps `last_seen`.
    pub fn register(
        &self,
        peer_id: PeerId,
        peer_type: PeerType,
        room: Option<RoomId>,
    ) -> Result<(), StoreError> {
        if peer_id.is_empty() {
            return Err(StoreError::MissingField);
        }

        let now = medlink_core::unix_millis();
        self.peers
            .entry(peer_id.clone())
            .and_modify(|record| {
                record.peer_type = peer_type;
                record.room = room.clone();
                record.last_seen = now;
            })
            .or_insert_with(|| PeerRecord::new(peer_type, room.clone(), now));

        info!("Peer {} registered as {} (room: {:?})", peer_id, peer_type, room);
        Ok(())
    }

    /// Queues `signal` for the recipient(s). Returns how many mailboxes received it.
    pub fn deliver(
        &self,
        from: &PeerId,
        to: &Recipient,
        signal: Signal,
    ) -> Result<usize, StoreError> {
        if from.is_empty() {
            return Err(StoreError::MissingField);
        }

        let targets = match to {
            Recipient::Peer(target) if target.is_empty() => return Err(StoreError::MissingField),
            Recipient::Peer(target) => vec![target.clone()],
            Recipient::All => self.room_members_except(from)?,
        };

        let message = SignalMessage::new(from.clone(), to.clone(), signal);
        for target in &targets {
            self.mailboxes
                .entry(target.clone())
                .or_default()
                .push_back(message.clone());
        }

        debug!(
            "Queued {} from {} for {} mailbox(es)",
            message.kind(),
            from,
            targets.len()
        );
        Ok(targets.len())
    }

    /// Removes and returns everything queued for `peer_id`, oldest first.
    pub fn drain(&self, peer_id: &PeerId) -> Vec<SignalMessage> {
        self.mailboxes
            .remove(peer_id)
            .map(|(_, queue)| queue.into())
            .unwrap_or_default()
    }

    pub fn heartbeat(&self, peer_id: &PeerId) -> Result<(), StoreError> {
        let Some(mut record) = self.peers.get_mut(peer_id) else {
            return Err(StoreError::UnknownPeer(peer_id.clone()));
        };
        record.last_seen = medlink_core::unix_millis();
        Ok(())
    }

    /// Drops the registration and any undelivered messages. Returns whether
    /// the peer was registered.
    pub fn leave(&self, peer_id: &PeerId) -> bool {
        self.mailboxes.remove(peer_id);
        let removed = self.peers.remove(peer_id).is_some();
        if removed {
            info!("Peer {} left", peer_id);
        }
        removed
    }

    /// Expires peers not seen within `ttl`, along with mailboxes addressed to
    /// unregistered ids that received nothing within `ttl`. Returns the
    /// expired peer ids.
    pub fn sweep(&self, ttl: Duration) -> Vec<PeerId> {
        self.sweep_at(medlink_core::unix_millis(), ttl)
    }

    pub(crate) fn sweep_at(&self, now: i64, ttl: Duration) -> Vec<PeerId> {
        let cutoff = now.saturating_sub(ttl.as_millis() as i64);

        let stale: Vec<PeerId> = self
            .peers
            .iter()
            .filter(|entry| entry.value().last_seen < cutoff)
            .map(|entry| entry.key().clone())
            .collect();

        for peer_id in &stale {
            self.peers.remove(peer_id);
            self.mailboxes.remove(peer_id);
        }

        let orphaned: Vec<PeerId> = self
            .mailboxes
            .iter()
            .filter(|entry| !self.peers.contains_key(entry.key()))
            .map(|entry| entry.key().clone())
            .collect();
        let mut dropped = 0;
        for peer_id in &orphaned {
            let removed = self.mailboxes.remove_if(peer_id, |peer_id, queue| {
                !self.peers.contains_key(peer_id)
                    && queue.back().is_none_or(|msg| msg.timestamp < cutoff)
            });
            if removed.is_some() {
                dropped += 1;
            }
        }

        if !stale.is_empty() {
            info!("Expired {} stale peer(s)", stale.len());
        }
        if dropped > 0 {
            debug!("Dropped {} mailbox(es) with no registered owner", dropped);
        }
        stale
    }

    pub fn peers(&self) -> BTreeMap<PeerId, PeerInfo> {
        self.peers
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().info()))
            .collect()
    }

    pub fn is_registered(&self, peer_id: &PeerId) -> bool {
        self.peers.contains_key(peer_id)
    }

    pub fn pending(&self, peer_id: &PeerId) -> usize {
        self.mailboxes.get(peer_id).map(|q| q.len()).unwrap_or(0)
    }

    fn room_members_except(&self, from: &PeerId) -> Result<Vec<PeerId>, StoreError> {
        let room = self
            .peers
            .get(from)
            .and_then(|record| record.room.clone())
            .ok_or_else(|| StoreError::NoRoom(from.clone()))?;

        Ok(self
            .peers
            .iter()
            .filter(|entry| entry.key() != from && entry.value().in_room(&room))
            .map(|entry| entry.key().clone())
            .collect())
    }
}
