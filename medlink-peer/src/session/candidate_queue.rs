use std::collections::{HashSet, VecDeque};

use medlink_core::{IceCandidate, PeerId};

/// Remote ICE candidates that arrived before the remote description.
#[derive(Debug, Default)]
pub(crate) struct CandidateQueue {
    pending: VecDeque<(PeerId, IceCandidate)>,
    seen: HashSet<String>,
}

impl CandidateQueue {
    /// Records the candidate as seen. Returns `false` for duplicates and
    /// end-of-candidates markers, which are dropped.
    pub fn admit(&mut self, candidate: &IceCandidate) -> bool {
        let key = candidate.candidate.trim();
        if key.is_empty() {
            return false;
        }
        self.seen.insert(key.to_owned())
    }

    pub fn defer(&mut self, from: PeerId, candidate: IceCandidate) {
        self.pending.push_back((from, candidate));
    }

    /// Empties the queue, keeping arrival order for candidates sent by `peer`.
    pub fn take_from(&mut self, peer: &PeerId) -> Vec<IceCandidate> {
        self.pending
            .drain(..)
            .filter(|(from, _)| from == peer)
            .map(|(_, candidate)| candidate)
            .collect()
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn clear(&mut self) {
        self.pending.clear();
        self.seen.clear();
    }
}
