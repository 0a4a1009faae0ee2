//! Client-facing conference signals.
//!
//! The engine reports state changes to the embedding client through an
//! unbounded channel; the receiver is handed out once via
//! [`crate::conference::Conference::take_signal_receiver`]. Signals are
//! emitted only for operations that succeed - a dropped or unauthorised
//! order produces no signal.

use std::collections::HashMap;

use crate::types::ConfId;

/// Signals emitted towards the client layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConferenceSignal {
    /// The local host audio source changed mute state.
    AudioMuted {
        conf_id: ConfId,
        muted: bool,
    },

    /// The local host video source changed mute state.
    VideoMuted {
        conf_id: ConfId,
        muted: bool,
    },

    /// The conference layout changed; one string map per participant row.
    InfosUpdated {
        conf_id: ConfId,
        infos: Vec<HashMap<String, String>>,
    },
}

impl ConferenceSignal {
    /// The conference this signal belongs to.
    pub fn conf_id(&self) -> &ConfId {
        match self {
            ConferenceSignal::AudioMuted { conf_id, .. } => conf_id,
            ConferenceSignal::VideoMuted { conf_id, .. } => conf_id,
            ConferenceSignal::InfosUpdated { conf_id, .. } => conf_id,
        }
    }
}
