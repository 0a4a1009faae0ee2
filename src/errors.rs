//! Error types for the conferencing engine.
//!
//! Errors are deliberately coarse: the engine never retries internally and
//! never surfaces an error signal to clients for a dropped order. Callers
//! get a `Result` where an operation can be rejected; everything else is
//! logged and absorbed (see the failure semantics on each operation).

use thiserror::Error;

/// Result type used throughout conference-core.
pub type Result<T> = std::result::Result<T, ConferenceError>;

/// Errors produced by conference operations.
#[derive(Debug, Error)]
pub enum ConferenceError {
    /// A call id did not resolve to a live call.
    #[error("Call not found: {call_id}")]
    CallNotFound {
        /// The call id that failed to resolve
        call_id: String,
    },

    /// The account backing a call or the conference is gone.
    #[error("Account not available: {reason}")]
    AccountGone {
        /// What was being attempted when the account vanished
        reason: String,
    },

    /// The operation is not legal in the conference's current state.
    #[error("Invalid conference state: {reason}")]
    InvalidState {
        /// Which state was required and which was found
        reason: String,
    },

    /// A media-change request carried an unsupported stream set.
    #[error("Invalid media request: {reason}")]
    InvalidMediaRequest {
        /// Why the request was rejected
        reason: String,
    },

    /// Inbound wire data (conf-order or conference-info) failed to parse.
    #[error("Malformed wire data: {reason}")]
    MalformedWireData {
        /// Parser diagnostic
        reason: String,
    },

    /// A peer requested an operation it is not authorised for.
    #[error("Unauthorized order from {peer}")]
    Unauthorized {
        /// Peer URI of the requester
        peer: String,
    },
}

impl ConferenceError {
    /// A call lookup miss.
    pub fn call_not_found(call_id: impl Into<String>) -> Self {
        Self::CallNotFound {
            call_id: call_id.into(),
        }
    }

    /// An account lookup miss.
    pub fn account_gone(reason: impl Into<String>) -> Self {
        Self::AccountGone {
            reason: reason.into(),
        }
    }

    /// An operation attempted in the wrong conference state.
    pub fn invalid_state(reason: impl Into<String>) -> Self {
        Self::InvalidState {
            reason: reason.into(),
        }
    }

    /// A rejected media-change request.
    pub fn invalid_media_request(reason: impl Into<String>) -> Self {
        Self::InvalidMediaRequest {
            reason: reason.into(),
        }
    }

    /// A wire parse failure.
    pub fn malformed(reason: impl Into<String>) -> Self {
        Self::MalformedWireData {
            reason: reason.into(),
        }
    }
}
