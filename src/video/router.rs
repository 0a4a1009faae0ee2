//! Routing between video sources and participant calls.
//!
//! The router owns the conference's mixer handle and the mapping from
//! mixer source keys to call ids. It turns every mixer recomposition into
//! layout rows and carries the layout / active-participant controls.

use std::sync::Arc;

use dashmap::DashMap;
use tracing::debug;

use super::mixer::{SourceInfo, VideoLayout, VideoMixer, VideoSourceKey};
use crate::call::CallRegistry;
use crate::layout::{ConfInfo, ParticipantInfo};
use crate::types::{strip_device_suffix, CallId, ConfId, HOST_PEER_ID};

/// Host-side inputs to row derivation.
#[derive(Debug, Clone)]
pub struct HostRowContext {
    /// Device id of the local account.
    pub device_id: String,
    /// Host audio source mute state.
    pub audio_muted: bool,
}

/// Moderation flags of one row, resolved by the conference.
#[derive(Debug, Clone, Copy, Default)]
pub struct RowStatus {
    pub is_moderator: bool,
    pub is_hand_raised: bool,
    pub is_moderator_muted: bool,
}

/// Maps video sources to calls and derives layout rows from mixer updates.
pub struct VideoRouter {
    conf_id: ConfId,
    mixer: Arc<dyn VideoMixer>,
    calls: Arc<dyn CallRegistry>,
    /// Video source key to owning call id; absence denotes the host's own
    /// video.
    video_to_call: DashMap<VideoSourceKey, CallId>,
}

impl VideoRouter {
    pub fn new(conf_id: ConfId, mixer: Arc<dyn VideoMixer>, calls: Arc<dyn CallRegistry>) -> Self {
        Self {
            conf_id,
            mixer,
            calls,
            video_to_call: DashMap::new(),
        }
    }

    /// The owned mixer handle.
    pub fn mixer(&self) -> &Arc<dyn VideoMixer> {
        &self.mixer
    }

    /// Register a call's video source and attach it to the mixer.
    pub fn attach_video(&self, key: VideoSourceKey, call_id: CallId) {
        debug!("[conf {}] attaching video of call {call_id}", self.conf_id);
        self.video_to_call.insert(key, call_id);
        self.mixer.attach_source(key);
    }

    /// Detach a source from the mixer and forget its mapping.
    pub fn detach_video(&self, key: VideoSourceKey) {
        if let Some((_, call_id)) = self.video_to_call.remove(&key) {
            debug!("[conf {}] detaching video of call {call_id}", self.conf_id);
            self.mixer.detach_source(key);
        }
    }

    /// Call owning `key`, `None` for the host's own video.
    pub fn resolve(&self, key: VideoSourceKey) -> Option<CallId> {
        self.video_to_call.get(&key).map(|entry| entry.value().clone())
    }

    /// Turn a mixer cell list into layout rows.
    ///
    /// Rows are ordered by mixer assignment. A synthetic host row with
    /// `video_muted` set is appended when no source resolved to the host.
    /// `status_of` supplies the moderation flags for a normalised peer id.
    pub fn derive_layout<F>(&self, infos: &[SourceInfo], host: &HostRowContext, mut status_of: F) -> ConfInfo
    where
        F: FnMut(&str) -> RowStatus,
    {
        let mut rows = Vec::with_capacity(infos.len() + 1);
        let mut host_added = false;
        let active_key = self.mixer.active_source();

        for info in infos {
            let mut uri = String::new();
            let mut device = String::new();
            let mut audio_local_muted = false;

            if let Some(call_id) = self.resolve(info.key) {
                if let Some(call) = self.calls.get_call(&call_id) {
                    uri = call.peer_uri();
                    audio_local_muted = call.is_peer_muted();
                    if let Some(peer_device) = call.peer_device_id() {
                        device = peer_device;
                    }
                }
            }

            let active = active_key == Some(info.key);
            let peer_id = if uri.is_empty() {
                host_added = true;
                device = host.device_id.clone();
                audio_local_muted = host.audio_muted;
                HOST_PEER_ID.to_string()
            } else {
                strip_device_suffix(&uri).to_string()
            };

            let mut status = status_of(&peer_id);
            if uri.is_empty() {
                // The host has moderator rights by definition.
                status.is_moderator = true;
            }

            rows.push(ParticipantInfo {
                sink_id: format!("{}{}", self.conf_id, peer_id),
                uri,
                device,
                active,
                x: info.x,
                y: info.y,
                w: info.w,
                h: info.h,
                video_muted: !info.has_video,
                audio_local_muted,
                audio_moderator_muted: status.is_moderator_muted,
                is_moderator: status.is_moderator,
                hand_raised: status.is_hand_raised,
            });
        }

        if !host_added {
            let status = status_of(HOST_PEER_ID);
            rows.push(ParticipantInfo {
                video_muted: true,
                audio_local_muted: host.audio_muted,
                audio_moderator_muted: status.is_moderator_muted,
                is_moderator: true,
                hand_raised: status.is_hand_raised,
                ..Default::default()
            });
        }

        ConfInfo::new(rows, self.mixer.width(), self.mixer.height())
    }

    /// Emphasise the host input.
    pub fn set_active_host(&self) {
        self.mixer.set_active_host();
    }

    /// Emphasise one call's receive source, or clear with `None`.
    pub fn set_active_source(&self, key: Option<VideoSourceKey>) {
        self.mixer.set_active_source(key);
    }

    /// Apply a numeric layout order: `0` grid (clearing any emphasis),
    /// `1` one-big-with-small, `2` one-big. Other values are ignored.
    pub fn set_layout(&self, layout: u32) {
        match layout {
            0 => {
                self.mixer.set_layout(VideoLayout::Grid);
                // Grid has no emphasised participant.
                if self.mixer.active_source().is_some() {
                    self.mixer.set_active_source(None);
                }
            }
            1 => self.mixer.set_layout(VideoLayout::OneBigWithSmall),
            2 => self.mixer.set_layout(VideoLayout::OneBig),
            _ => {}
        }
    }
}
