//! Media recorder collaborator interface.
//!
//! Recorder streams are borrowed: the conference attaches the mixer
//! outputs when recording starts and detaches them before the recorder is
//! released.

/// Stream label for the mixed video output.
pub const VIDEO_MIXER_STREAM: &str = "v:mixer";
/// Stream label for the mixed audio output.
pub const AUDIO_MIXER_STREAM: &str = "a:mixer";

/// Recording sink for the mixer outputs.
pub trait Recorder: Send + Sync {
    /// Attach a mixer output stream under `label`; `false` if refused.
    fn add_stream(&self, label: &str) -> bool;

    /// Detach the stream previously attached under `label`.
    fn detach_stream(&self, label: &str);
}
