//! The conference layout document.
//!
//! A [`ConfInfo`] is the authoritative description of the rendered layout:
//! one [`ParticipantInfo`] row per mixer cell plus the canvas dimensions.
//! Row order follows mixer assignment and is observable to clients. Two
//! emit paths exist: the per-call JSON blob and the vector-of-string-maps
//! form used by client signals.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::errors::{ConferenceError, Result};
use crate::types::{FALSE_STR, TRUE_STR};

/// One row of the conference layout.
///
/// Equality is field-wise and is what decides whether a layout change gets
/// broadcast.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ParticipantInfo {
    /// Peer URI; empty for the local host until filled at emit time.
    #[serde(default)]
    pub uri: String,
    /// Device identifier of the participant.
    #[serde(rename = "device", default)]
    pub device: String,
    /// Sink id of the participant's layout cell (`conf_id + peer_id`).
    #[serde(rename = "sinkId", default)]
    pub sink_id: String,
    /// Whether this cell is the mixer's active participant.
    #[serde(default)]
    pub active: bool,
    pub x: i32,
    pub y: i32,
    pub w: i32,
    pub h: i32,
    /// Whether the cell renders without live video.
    #[serde(rename = "videoMuted", default)]
    pub video_muted: bool,
    /// Whether the participant muted itself.
    #[serde(rename = "audioLocalMuted", default)]
    pub audio_local_muted: bool,
    /// Whether a moderator muted the participant.
    #[serde(rename = "audioModeratorMuted", default)]
    pub audio_moderator_muted: bool,
    #[serde(rename = "isModerator", default)]
    pub is_moderator: bool,
    #[serde(rename = "handRaised", default)]
    pub hand_raised: bool,
}

impl ParticipantInfo {
    /// String-map form used by the client signal.
    pub fn to_map(&self) -> HashMap<String, String> {
        let mut map = HashMap::new();
        map.insert("uri".to_string(), self.uri.clone());
        map.insert("device".to_string(), self.device.clone());
        map.insert("sinkId".to_string(), self.sink_id.clone());
        map.insert("active".to_string(), bool_str(self.active));
        map.insert("x".to_string(), self.x.to_string());
        map.insert("y".to_string(), self.y.to_string());
        map.insert("w".to_string(), self.w.to_string());
        map.insert("h".to_string(), self.h.to_string());
        map.insert("videoMuted".to_string(), bool_str(self.video_muted));
        map.insert("audioLocalMuted".to_string(), bool_str(self.audio_local_muted));
        map.insert(
            "audioModeratorMuted".to_string(),
            bool_str(self.audio_moderator_muted),
        );
        map.insert("isModerator".to_string(), bool_str(self.is_moderator));
        map.insert("handRaised".to_string(), bool_str(self.hand_raised));
        map
    }
}

fn bool_str(value: bool) -> String {
    if value { TRUE_STR } else { FALSE_STR }.to_string()
}

/// Ordered layout rows plus canvas dimensions.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ConfInfo {
    pub participants: Vec<ParticipantInfo>,
    pub w: i32,
    pub h: i32,
}

/// Serde mirror of the wire document `{ "p": [...], "w": W, "h": H }`.
#[derive(Serialize, Deserialize)]
struct ConfInfoWire {
    p: Vec<ParticipantInfo>,
    w: i32,
    h: i32,
}

impl ConfInfo {
    pub fn new(participants: Vec<ParticipantInfo>, w: i32, h: i32) -> Self {
        Self { participants, w, h }
    }

    pub fn is_empty(&self) -> bool {
        self.participants.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ParticipantInfo> {
        self.participants.iter()
    }

    /// Per-call JSON blob.
    pub fn to_json(&self) -> String {
        let wire = ConfInfoWire {
            p: self.participants.clone(),
            w: self.w,
            h: self.h,
        };
        serde_json::to_string(&wire).unwrap_or_default()
    }

    /// Parse a layout received from a remote host.
    pub fn from_json(payload: &str) -> Result<Self> {
        let wire: ConfInfoWire = serde_json::from_str(payload)
            .map_err(|e| ConferenceError::malformed(e.to_string()))?;
        Ok(Self {
            participants: wire.p,
            w: wire.w,
            h: wire.h,
        })
    }

    /// Vector-of-maps form used by the client signal.
    pub fn to_maps(&self) -> Vec<HashMap<String, String>> {
        self.participants.iter().map(ParticipantInfo::to_map).collect()
    }
}
