//! Core identifier types.
//!
//! Conferences and calls are addressed by opaque string ids. Peers are
//! addressed by URI; the part after `@` identifies the device and is
//! stripped before any set membership or comparison.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Reserved peer id for the local host in the muted / hand-raised sets
/// and in conf-order messages.
pub const HOST_PEER_ID: &str = "host";

/// Boolean wire token for `true`.
pub const TRUE_STR: &str = "true";
/// Boolean wire token for `false`.
pub const FALSE_STR: &str = "false";

/// Unique identifier for a conference.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConfId(pub String);

impl ConfId {
    /// Generate a fresh conference id.
    pub fn new() -> Self {
        Self(format!("conf_{}", Uuid::new_v4().simple()))
    }

    pub fn from_name(name: &str) -> Self {
        Self(name.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ConfId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConfId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a point-to-point call participating in a conference.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CallId(pub String);

impl CallId {
    /// Generate a fresh call id.
    pub fn new() -> Self {
        Self(format!("call_{}", Uuid::new_v4().simple()))
    }

    pub fn from_name(name: &str) -> Self {
        Self(name.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for CallId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for CallId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Strip the `@device` suffix from a peer URI.
///
/// Set membership (moderators, muted, hands raised) and all peer
/// comparisons operate on the stripped form.
pub fn strip_device_suffix(uri: &str) -> &str {
    match uri.find('@') {
        Some(pos) => &uri[..pos],
        None => uri,
    }
}
