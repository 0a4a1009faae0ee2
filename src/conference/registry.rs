//! Participant and moderation sets.
//!
//! Four thread-safe sets back the conference: the participant call ids and
//! the peer-keyed moderator, muted and hand-raised sets. Peer keys are URIs
//! with the `@device` suffix stripped; the local host uses the reserved key
//! `"host"`. Each set has its own lock, taken only to mutate or snapshot.

use std::collections::HashSet;
use std::sync::Mutex;

use crate::types::CallId;

/// The authoritative participant set plus moderation state.
#[derive(Debug, Default)]
pub struct ParticipantRegistry {
    participants: Mutex<HashSet<CallId>>,
    moderators: Mutex<HashSet<String>>,
    muted: Mutex<HashSet<String>>,
    hands_raised: Mutex<HashSet<String>>,
}

impl ParticipantRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a participant; `false` if already present.
    pub fn add_participant(&self, call_id: CallId) -> bool {
        self.participants.lock().unwrap().insert(call_id)
    }

    /// Remove a participant; `false` if absent.
    pub fn remove_participant(&self, call_id: &CallId) -> bool {
        self.participants.lock().unwrap().remove(call_id)
    }

    /// Snapshot of the participant call ids.
    pub fn participants(&self) -> Vec<CallId> {
        self.participants.lock().unwrap().iter().cloned().collect()
    }

    pub fn contains(&self, call_id: &CallId) -> bool {
        self.participants.lock().unwrap().contains(call_id)
    }

    pub fn participant_count(&self) -> usize {
        self.participants.lock().unwrap().len()
    }

    pub fn add_moderator(&self, peer_id: impl Into<String>) {
        self.moderators.lock().unwrap().insert(peer_id.into());
    }

    pub fn remove_moderator(&self, peer_id: &str) {
        self.moderators.lock().unwrap().remove(peer_id);
    }

    /// Whether `peer_id` is in the moderator set. Host privileges are
    /// resolved by the conference on top of this.
    pub fn has_moderator(&self, peer_id: &str) -> bool {
        self.moderators.lock().unwrap().contains(peer_id)
    }

    /// Flip the moderator-muted flag of a peer. Returns `true` when the set
    /// actually changed.
    pub fn set_muted(&self, peer_id: &str, muted: bool) -> bool {
        let mut set = self.muted.lock().unwrap();
        if muted {
            set.insert(peer_id.to_string())
        } else {
            set.remove(peer_id)
        }
    }

    pub fn is_muted(&self, peer_id: &str) -> bool {
        self.muted.lock().unwrap().contains(peer_id)
    }

    /// Flip the hand-raised flag of a peer. Returns `true` when the set
    /// actually changed.
    pub fn set_hand_raised(&self, peer_id: &str, raised: bool) -> bool {
        let mut set = self.hands_raised.lock().unwrap();
        if raised {
            set.insert(peer_id.to_string())
        } else {
            set.remove(peer_id)
        }
    }

    pub fn is_hand_raised(&self, peer_id: &str) -> bool {
        self.hands_raised.lock().unwrap().contains(peer_id)
    }

    /// Snapshot of the hand-raised peer ids.
    pub fn hands_raised(&self) -> Vec<String> {
        self.hands_raised.lock().unwrap().iter().cloned().collect()
    }

    /// Snapshot of the moderator-muted peer ids.
    pub fn muted_peers(&self) -> Vec<String> {
        self.muted.lock().unwrap().iter().cloned().collect()
    }
}
