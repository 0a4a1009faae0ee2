//! Video routing: the mixer seam and source-to-call mapping.

pub mod mixer;
pub mod router;

pub use mixer::{
    SinkClient, SinkFactory, SourceInfo, SourcesUpdatedCallback, VideoLayout, VideoMixer,
    VideoMixerFactory, VideoSourceKey,
};
pub use router::{HostRowContext, RowStatus, VideoRouter};
