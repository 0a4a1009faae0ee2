//! # Multi-party call conferencing engine
//!
//! `conference-core` joins several point-to-point calls into a single
//! conference: it wires their audio through a shared ring-buffer pool,
//! composites their video through a mixer, enforces moderation (mute,
//! hand-raise, hangup, layout) and keeps every participant - including
//! remote hosts of nested conferences - in sync with an authoritative
//! layout document.
//!
//! ## Core components
//!
//! - **[`Conference`]**: orchestrator and state machine
//! - **[`media::MediaAttribute`]**: typed media stream descriptions
//! - **[`audio::AudioBinder`]**: mute-as-topology ring-buffer policies
//! - **[`video::VideoRouter`]**: source-to-call mapping and layout control
//! - **[`layout::ConfInfo`]**: the layout document and remote-host merging
//! - **[`ConfOrder`]**: the peer moderation protocol
//!
//! ## Muting model
//!
//! Muting is a topology change on the audio graph, not a volume gate: a
//! muted source loses every edge through which others read it, so the
//! mixer does no work for it and a fast unmute cannot leak stale audio.
//!
//! The engine owns no call, account, mixer implementation or recorder;
//! those arrive as trait-object handles at construction and can be
//! substituted in tests.
//!
//! ```rust,ignore
//! use conference_core::prelude::*;
//!
//! let conference = ConferenceBuilder::new(account, calls, pool, recorder)
//!     .with_video(mixer_factory, sink_factory)
//!     .build();
//! conference.add_participant(&call_id).await;
//! ```

pub mod account;
pub mod audio;
pub mod call;
pub mod conference;
pub mod errors;
pub mod events;
pub mod layout;
pub mod media;
pub mod recorder;
pub mod types;
pub mod video;

// Re-export the primary surface
pub use conference::{ConfOrder, Conference, ConferenceBuilder, ConferenceState, ParticipantRegistry};
pub use errors::{ConferenceError, Result};
pub use events::ConferenceSignal;
pub use layout::{ConfInfo, ParticipantInfo};
pub use media::{MediaAttribute, MediaMap, MediaType};
pub use types::{CallId, ConfId};

/// Prelude module with commonly used types.
pub mod prelude {
    pub use crate::account::Account;
    pub use crate::audio::{AudioBinder, RingBufferPool, DEFAULT_ID};
    pub use crate::call::{Call, CallRegistry};
    pub use crate::conference::{ConfOrder, Conference, ConferenceBuilder, ConferenceState};
    pub use crate::errors::{ConferenceError, Result};
    pub use crate::events::ConferenceSignal;
    pub use crate::layout::{ConfInfo, ConfLayout, ParticipantInfo};
    pub use crate::media::{MediaAttribute, MediaMap, MediaType};
    pub use crate::recorder::Recorder;
    pub use crate::types::{CallId, ConfId, HOST_PEER_ID};
    pub use crate::video::{
        SinkClient, SinkFactory, SourceInfo, VideoLayout, VideoMixer, VideoMixerFactory,
        VideoRouter, VideoSourceKey,
    };
}
