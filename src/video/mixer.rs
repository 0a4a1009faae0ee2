//! Video mixer collaborator interfaces.
//!
//! The mixer composites one cell per attached source onto a canvas and
//! reports every recomposition through the sources-updated callback. The
//! engine never sees frames, only source handles and cell geometry.

use std::sync::Arc;

use crate::layout::ParticipantInfo;
use crate::types::ConfId;

/// Opaque handle onto one video source in the mixer graph.
///
/// Keys are lookup handles, not ownership; the producing call owns the
/// source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VideoSourceKey(pub u64);

/// Geometry and liveness of one mixer cell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceInfo {
    pub key: VideoSourceKey,
    pub x: i32,
    pub y: i32,
    pub w: i32,
    pub h: i32,
    /// Whether the source currently delivers frames.
    pub has_video: bool,
}

/// Composition layouts supported by the mixer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VideoLayout {
    Grid,
    OneBigWithSmall,
    OneBig,
}

/// Callback delivering the cell list after each recomposition.
pub type SourcesUpdatedCallback = Box<dyn Fn(Vec<SourceInfo>) + Send + Sync>;

/// Mixer operations consumed by the engine. Exclusively owned by one
/// conference.
pub trait VideoMixer: Send + Sync {
    /// Current canvas width.
    fn width(&self) -> i32;

    /// Current canvas height.
    fn height(&self) -> i32;

    /// Switch the host input to `uri`.
    fn switch_input(&self, uri: &str);

    /// Switch the secondary host input (screen share) to `uri`.
    fn switch_secondary_input(&self, uri: &str);

    /// Stop the host input.
    fn stop_input(&self);

    /// Attach a source to the composition.
    fn attach_source(&self, key: VideoSourceKey);

    /// Detach a source from the composition.
    fn detach_source(&self, key: VideoSourceKey);

    /// Emphasise one source, or clear the emphasis with `None`.
    fn set_active_source(&self, key: Option<VideoSourceKey>);

    /// Emphasise the host input.
    fn set_active_host(&self);

    /// Currently emphasised source, if any.
    fn active_source(&self) -> Option<VideoSourceKey>;

    /// Select the composition layout.
    fn set_layout(&self, layout: VideoLayout);

    /// Force a recomposition (and a sources-updated callback).
    fn update_layout(&self);

    /// Register the sources-updated callback. Called once at wiring time.
    fn set_on_sources_updated(&self, callback: SourcesUpdatedCallback);
}

/// Creates the mixer of a new conference.
pub trait VideoMixerFactory: Send + Sync {
    /// Create a mixer seeded with the host input.
    fn create_mixer(&self, conf_id: &ConfId, local_input: &str) -> Arc<dyn VideoMixer>;

    /// URI of the default video capture device.
    fn default_device_uri(&self) -> String;
}

/// One client-side rendering sink for a layout cell.
pub trait SinkClient: Send + Sync {
    fn id(&self) -> &str;

    /// Stop rendering; called when the cell disappears or on destruction.
    fn stop(&self);
}

/// Creates sink clients for layout cells.
pub trait SinkFactory: Send + Sync {
    /// Create and start a sink for the given cell.
    fn create_sink(&self, conf_id: &ConfId, cell: &ParticipantInfo) -> Arc<dyn SinkClient>;
}
