//! Local host media sources.
//!
//! The host contributes at most one audio and one video stream to the
//! mixers. Both slots exist only while the host is attached; detaching
//! clears them, which is why a detached host always reads as muted.

use tracing::warn;

use super::attribute::{MediaAttribute, MediaType};

/// Label of the host audio slot.
pub const HOST_AUDIO_LABEL: &str = "audio_0";
/// Label of the host video slot.
pub const HOST_VIDEO_LABEL: &str = "video_0";

/// The two media slots the local host feeds into the mixers.
#[derive(Debug, Clone, Default)]
pub struct HostMediaSources {
    attached: bool,
    audio: MediaAttribute,
    video: MediaAttribute,
}

impl HostMediaSources {
    /// Initialise both slots for an attached host. Audio comes from the
    /// system capture device; video from `video_uri` when video is enabled.
    pub fn set_attached_defaults(&mut self, video_uri: Option<&str>) {
        self.attached = true;
        self.audio = MediaAttribute::capture(MediaType::Audio, "", HOST_AUDIO_LABEL);
        self.video = match video_uri {
            Some(uri) => MediaAttribute::capture(MediaType::Video, uri, HOST_VIDEO_LABEL),
            None => MediaAttribute::default(),
        };
    }

    /// Clear both slots for a detached host.
    pub fn clear(&mut self) {
        self.attached = false;
        self.audio = MediaAttribute::default();
        self.video = MediaAttribute::default();
    }

    /// Clear only the audio slot.
    pub fn clear_audio(&mut self) {
        self.audio = MediaAttribute::default();
    }

    /// Clear only the video slot.
    pub fn clear_video(&mut self) {
        self.video = MediaAttribute::default();
    }

    pub fn slot(&self, media_type: MediaType) -> Option<&MediaAttribute> {
        match media_type {
            MediaType::Audio => Some(&self.audio),
            MediaType::Video => Some(&self.video),
            MediaType::None => None,
        }
    }

    pub fn slot_mut(&mut self, media_type: MediaType) -> Option<&mut MediaAttribute> {
        match media_type {
            MediaType::Audio => Some(&mut self.audio),
            MediaType::Video => Some(&mut self.video),
            MediaType::None => None,
        }
    }

    /// Set the mute flag of one slot.
    pub fn set_muted(&mut self, media_type: MediaType, muted: bool) {
        match self.slot_mut(media_type) {
            Some(slot) => slot.muted = muted,
            None => warn!("Unsupported media type"),
        }
    }

    /// Whether the host source for `media_type` is muted.
    ///
    /// A detached host, an unset slot, and an explicitly muted slot all
    /// read as muted.
    pub fn is_muted(&self, media_type: MediaType) -> bool {
        if !self.attached {
            return true;
        }
        let slot = match self.slot(media_type) {
            Some(slot) => slot,
            None => {
                warn!("Unsupported media type, assuming muted");
                return true;
            }
        };
        if slot.media_type == MediaType::None {
            warn!("The host source for {media_type} is not set, mute state is meaningless");
            return true;
        }
        slot.muted
    }

    /// Video source URI of the attached host, empty when unset.
    pub fn video_uri(&self) -> &str {
        &self.video.source_uri
    }

    pub fn is_attached(&self) -> bool {
        self.attached
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detached_host_is_muted() {
        let mut sources = HostMediaSources::default();
        assert!(sources.is_muted(MediaType::Audio));

        sources.set_attached_defaults(Some("camera://default"));
        assert!(!sources.is_muted(MediaType::Audio));
        assert!(!sources.is_muted(MediaType::Video));

        sources.set_muted(MediaType::Audio, true);
        assert!(sources.is_muted(MediaType::Audio));

        sources.clear();
        // Prior mute flips are irrelevant once detached.
        assert!(sources.is_muted(MediaType::Audio));
        assert!(sources.is_muted(MediaType::Video));
    }

    #[test]
    fn video_slot_absent_without_uri() {
        let mut sources = HostMediaSources::default();
        sources.set_attached_defaults(None);
        assert!(!sources.is_muted(MediaType::Audio));
        assert!(sources.is_muted(MediaType::Video));
    }
}
