//! Call collaborator interfaces.
//!
//! The engine never owns a call; it looks calls up through a
//! [`CallRegistry`] handle injected at construction and drives them through
//! the [`Call`] interface. Cheap state queries are synchronous; anything
//! that reaches the signalling or media layers is async.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::account::Account;
use crate::media::{MediaAttribute, MediaMap};
use crate::types::{CallId, ConfId};
use crate::video::mixer::VideoSourceKey;

/// One point-to-point call, as seen by the conferencing engine.
#[async_trait]
pub trait Call: Send + Sync {
    /// Identifier of this call.
    fn id(&self) -> CallId;

    /// Peer URI, including any `@device` suffix.
    fn peer_uri(&self) -> String;

    /// Whether the remote peer muted itself.
    fn is_peer_muted(&self) -> bool;

    /// Whether the remote peer is recording.
    fn is_peer_recording(&self) -> bool;

    /// Account this call belongs to, if still alive.
    fn account(&self) -> Option<Arc<dyn Account>>;

    /// Current media attribute list of the call.
    fn media_attributes(&self) -> Vec<MediaAttribute>;

    /// Device id of the peer transport, if known.
    fn peer_device_id(&self) -> Option<String>;

    /// Dimensions of the last decoded video frame, `(0, 0)` when unknown.
    fn decoded_frame_size(&self) -> (i32, i32);

    /// Handle of the call's receive-video source in the mixer graph.
    fn receive_video_source(&self) -> Option<VideoSourceKey>;

    /// Whether this call is recording locally.
    fn is_recording(&self) -> bool;

    /// Put the call into the given conference.
    async fn enter_conference(&self, conf_id: &ConfId);

    /// Take the call out of its conference.
    async fn exit_conference(&self);

    /// Drop the remote layout the call last received.
    async fn reset_conf_info(&self);

    /// Switch the call's video input source.
    async fn switch_input(&self, uri: &str);

    /// Send a conference-info JSON blob to the peer.
    async fn send_conf_info(&self, payload: String);

    /// Send a conf-order JSON document to the peer.
    async fn send_conf_order(&self, order: serde_json::Value);

    /// Re-apply the given media list on the call.
    async fn request_media_change(&self, media: Vec<MediaMap>);

    /// Whether answering `remote` requires reconfiguring the mixer input.
    fn check_media_change_request(&self, remote: &[MediaMap]) -> bool;

    /// Answer a pending media-change request with `media`.
    async fn answer_media_change_request(&self, media: Vec<MediaMap>);

    /// Add a placeholder video session so the call produces a layout sink.
    async fn add_dummy_video_session(&self);

    /// Remove any placeholder video sessions.
    async fn remove_dummy_video_sessions(&self);

    /// Flip local recording; returns the new state.
    async fn toggle_recording(&self) -> bool;

    /// Re-signal the peer-recording state to the remote side.
    async fn peer_recording(&self, state: bool);

    /// Notify the call of the conference recording state.
    async fn update_record_state(&self, state: bool);
}

/// Handle onto the call manager: lookup, hangup and local-identity queries.
#[async_trait]
pub trait CallRegistry: Send + Sync {
    /// Resolve a call id to a live call.
    fn get_call(&self, call_id: &CallId) -> Option<Arc<dyn Call>>;

    /// Usernames of every account on this device.
    fn local_usernames(&self) -> Vec<String>;

    /// Hang up a call on behalf of a moderator.
    async fn hangup_call(&self, account_id: &str, call_id: &CallId);
}

/// Wire form of a conference-info row list as sent in client signals.
pub type InfoMaps = Vec<HashMap<String, String>>;
