//! The authoritative layout document and remote sub-host merging.

pub mod info;
pub mod merger;

pub use info::{ConfInfo, ParticipantInfo};
pub use merger::{ConfLayout, MergeOutcome};
