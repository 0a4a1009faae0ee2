//! Conference-aware ring-buffer binding policies.
//!
//! Muting is a topology change: a muted source keeps all its read edges but
//! loses every edge through which others read it. The mixer then does no
//! work for the muted source and a fast unmute cannot replay stale audio.

use std::sync::Arc;

use tracing::info;

use crate::audio::ringbuffer::{RingBufferPool, DEFAULT_ID};
use crate::call::CallRegistry;
use crate::conference::registry::ParticipantRegistry;
use crate::types::{strip_device_suffix, CallId, ConfId};

/// Audio state of the local host as seen by the binder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostAudioState {
    /// The host is not attached; no host edges are created.
    Detached,
    /// The host is attached; `muted` is the host source mute flag.
    Attached { muted: bool },
}

/// Applies conference binding policies onto the shared ring-buffer pool.
pub struct AudioBinder {
    conf_id: ConfId,
    pool: Arc<dyn RingBufferPool>,
    registry: Arc<ParticipantRegistry>,
    calls: Arc<dyn CallRegistry>,
}

impl AudioBinder {
    pub fn new(
        conf_id: ConfId,
        pool: Arc<dyn RingBufferPool>,
        registry: Arc<ParticipantRegistry>,
        calls: Arc<dyn CallRegistry>,
    ) -> Self {
        Self {
            conf_id,
            pool,
            registry,
            calls,
        }
    }

    /// Shared pool handle.
    pub fn pool(&self) -> &Arc<dyn RingBufferPool> {
        &self.pool
    }

    /// Wire `id` into the conference graph.
    ///
    /// Every already-present participant is connected full-duplex unless it
    /// is moderator-muted, in which case it only reads `id`. The host edge
    /// is added when attached, half-duplex while the host source is muted.
    ///
    /// `id` is normally a call id, but the recorder's ghost buffer uses the
    /// conference id here to receive the full mix.
    pub fn bind_participant(&self, id: &str, host: HostAudioState) {
        info!("Bind participant {id} to conference {}", self.conf_id);

        for other in self.registry.participants() {
            if other.as_str() != id {
                if let Some(call) = self.calls.get_call(&other) {
                    let peer = call.peer_uri();
                    if self.registry.is_muted(strip_device_suffix(&peer)) {
                        self.pool.bind_half_duplex(other.as_str(), id);
                    } else {
                        self.pool.bind(id, other.as_str());
                    }
                }
            }
            self.pool.flush(other.as_str());
        }

        if let HostAudioState::Attached { muted } = host {
            if muted {
                self.pool.bind_half_duplex(DEFAULT_ID, id);
            } else {
                self.pool.bind(id, DEFAULT_ID);
            }
            self.pool.flush(DEFAULT_ID);
        }
    }

    /// Rebind every participant to the freshly attached host: half-duplex
    /// for moderator-muted peers, full-duplex otherwise. Read pointers are
    /// reset so the host does not replay buffered audio.
    pub fn attach_host(&self) {
        for participant in self.registry.participants() {
            if let Some(call) = self.calls.get_call(&participant) {
                let peer = call.peer_uri();
                if self.registry.is_muted(strip_device_suffix(&peer)) {
                    self.pool.bind_half_duplex(participant.as_str(), DEFAULT_ID);
                } else {
                    self.pool.bind(participant.as_str(), DEFAULT_ID);
                }
            }
            self.pool.flush(participant.as_str());
        }
        self.pool.flush(DEFAULT_ID);
    }

    /// Remove the host edge of every participant.
    pub fn detach_host(&self) {
        for participant in self.registry.participants() {
            if self.calls.get_call(&participant).is_some() {
                self.pool.unbind(participant.as_str(), DEFAULT_ID);
            }
        }
    }

    /// Silence a participant without touching what it hears.
    pub fn unbind_participant(&self, call_id: &CallId) {
        info!("Unbind participant {call_id} from conference {}", self.conf_id);
        self.pool.unbind_all_half_duplex(call_id.as_str());
    }

    /// Reconnect the host to every participant that is not moderator-muted.
    pub fn bind_host(&self) {
        info!("Bind host to conference {}", self.conf_id);

        for participant in self.registry.participants() {
            if let Some(call) = self.calls.get_call(&participant) {
                let peer = call.peer_uri();
                if self.registry.is_muted(strip_device_suffix(&peer)) {
                    continue;
                }
                self.pool.bind(participant.as_str(), DEFAULT_ID);
                self.pool.flush(DEFAULT_ID);
            }
        }
    }

    /// Silence the host without touching what it hears.
    pub fn unbind_host(&self) {
        info!("Unbind host from conference {}", self.conf_id);
        self.pool.unbind_all_half_duplex(DEFAULT_ID);
    }
}
