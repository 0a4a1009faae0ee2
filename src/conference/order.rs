//! The peer conf-order control protocol.
//!
//! Conf-orders are one-shot JSON documents from a peer call. Several
//! members may coexist in one document; they are processed in a fixed
//! order. Decoding failures and unrecognised members are logged and
//! dropped, never answered.

use serde_json::{json, Value};

use crate::errors::{ConferenceError, Result};
use crate::types::{FALSE_STR, TRUE_STR};

/// A decoded conf-order document.
///
/// The hand-raise member is authorised per-peer, everything else requires
/// moderator rights; authorisation happens at dispatch, not here.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfOrder {
    /// `handRaised` + `handState`: peer URI and requested state.
    pub hand_raised: Option<(String, bool)>,
    /// `layout`: numeric layout selector.
    pub layout: Option<u32>,
    /// `activeParticipant`: peer URI to emphasise.
    pub active_participant: Option<String>,
    /// `muteParticipant` + `muteState`: peer URI and requested state.
    pub mute_participant: Option<(String, bool)>,
    /// `hangupParticipant`: peer URI to hang up.
    pub hangup_participant: Option<String>,
}

impl ConfOrder {
    /// Decode a conf-order JSON document.
    pub fn parse(payload: &str) -> Result<Self> {
        let root: Value = serde_json::from_str(payload)
            .map_err(|e| ConferenceError::malformed(e.to_string()))?;
        let mut order = ConfOrder::default();

        if let Some(uri) = root.get("handRaised").and_then(Value::as_str) {
            let state = root
                .get("handState")
                .and_then(Value::as_str)
                .map(|s| s == TRUE_STR)
                .unwrap_or(false);
            order.hand_raised = Some((uri.to_string(), state));
        }

        if let Some(layout) = root.get("layout").and_then(Value::as_u64) {
            order.layout = Some(layout as u32);
        }

        if let Some(uri) = root.get("activeParticipant").and_then(Value::as_str) {
            order.active_participant = Some(uri.to_string());
        }

        if let (Some(uri), Some(state)) = (
            root.get("muteParticipant").and_then(Value::as_str),
            root.get("muteState").and_then(Value::as_str),
        ) {
            order.mute_participant = Some((uri.to_string(), state == TRUE_STR));
        }

        if let Some(uri) = root.get("hangupParticipant").and_then(Value::as_str) {
            order.hangup_participant = Some(uri.to_string());
        }

        Ok(order)
    }

    /// Build an outbound mute order for a nested host.
    pub fn mute(peer_uri: &str, state: bool) -> Value {
        let mute_state = if state { TRUE_STR } else { FALSE_STR };
        json!({
            "muteParticipant": peer_uri,
            "muteState": mute_state,
        })
    }

    /// Build an outbound hangup order for a nested host.
    pub fn hangup(peer_uri: &str) -> Value {
        json!({ "hangupParticipant": peer_uri })
    }
}
