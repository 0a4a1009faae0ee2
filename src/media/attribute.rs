//! Typed description of one media stream.
//!
//! A [`MediaAttribute`] round-trips with a string-to-string wire map keyed
//! by `MEDIA_TYPE`, `MUTED`, `ENABLED`, `SOURCE` and `LABEL`. Parsing is
//! lenient: a missing key keeps the field default, and a malformed value is
//! logged without failing the whole attribute.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::{error, warn};

use crate::types::{FALSE_STR, TRUE_STR};

/// Wire form of a media attribute.
pub type MediaMap = HashMap<String, String>;

/// Wire map keys.
pub mod keys {
    pub const MEDIA_TYPE: &str = "MEDIA_TYPE";
    pub const MUTED: &str = "MUTED";
    pub const ENABLED: &str = "ENABLED";
    pub const SOURCE: &str = "SOURCE";
    pub const LABEL: &str = "LABEL";
}

/// Wire map values for `MEDIA_TYPE`.
pub mod values {
    pub const AUDIO: &str = "MEDIA_AUDIO";
    pub const VIDEO: &str = "MEDIA_VIDEO";
}

/// Kind of media carried by a stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum MediaType {
    #[default]
    None,
    Audio,
    Video,
}

impl MediaType {
    /// Wire token for this media type, if it has one.
    pub fn as_wire_str(&self) -> Option<&'static str> {
        match self {
            MediaType::Audio => Some(values::AUDIO),
            MediaType::Video => Some(values::VIDEO),
            MediaType::None => None,
        }
    }

    /// Parse a wire token; anything unrecognised is `None`.
    pub fn from_wire_str(s: &str) -> Self {
        match s {
            values::AUDIO => MediaType::Audio,
            values::VIDEO => MediaType::Video,
            _ => MediaType::None,
        }
    }
}

impl std::fmt::Display for MediaType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MediaType::Audio => write!(f, "AUDIO"),
            MediaType::Video => write!(f, "VIDEO"),
            MediaType::None => write!(f, "NONE"),
        }
    }
}

/// Where a media stream originates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum MediaSourceType {
    #[default]
    None,
    CaptureDevice,
    File,
    Screen,
}

/// Typed description of one media stream of a call or of the local host.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MediaAttribute {
    pub media_type: MediaType,
    pub muted: bool,
    pub enabled: bool,
    pub secure: bool,
    pub source_uri: String,
    pub label: String,
    pub source_type: MediaSourceType,
}

impl MediaAttribute {
    /// Build an attribute for a capture device source.
    pub fn capture(media_type: MediaType, source_uri: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            media_type,
            muted: false,
            enabled: true,
            secure: true,
            source_uri: source_uri.into(),
            label: label.into(),
            source_type: MediaSourceType::CaptureDevice,
        }
    }

    /// Parse one attribute from its wire map.
    ///
    /// Any missing key keeps the default; an unrecognised `MEDIA_TYPE` yields
    /// `None` and is logged; a boolean value other than the literal tokens
    /// keeps the default and is logged.
    pub fn from_media_map(map: &MediaMap) -> Self {
        let mut attr = MediaAttribute::default();

        match map.get(keys::MEDIA_TYPE) {
            Some(value) => {
                attr.media_type = MediaType::from_wire_str(value);
                if attr.media_type == MediaType::None {
                    error!("Invalid value [{value}] for a media type key in media map");
                }
            }
            None => warn!("[{}] key not found in media map", keys::MEDIA_TYPE),
        }

        if let Some(muted) = parse_bool(map, keys::MUTED) {
            attr.muted = muted;
        }
        if let Some(enabled) = parse_bool(map, keys::ENABLED) {
            attr.enabled = enabled;
        }
        if let Some(source) = map.get(keys::SOURCE) {
            attr.source_uri = source.clone();
        }
        if let Some(label) = map.get(keys::LABEL) {
            attr.label = label.clone();
        }

        attr
    }

    /// Emit the wire map. All five keys are always present.
    pub fn to_media_map(&self) -> MediaMap {
        let mut map = MediaMap::new();
        map.insert(
            keys::MEDIA_TYPE.to_string(),
            self.media_type.as_wire_str().unwrap_or_default().to_string(),
        );
        map.insert(keys::MUTED.to_string(), bool_to_str(self.muted).to_string());
        map.insert(keys::ENABLED.to_string(), bool_to_str(self.enabled).to_string());
        map.insert(keys::SOURCE.to_string(), self.source_uri.clone());
        map.insert(keys::LABEL.to_string(), self.label.clone());
        map
    }

    /// Parse a whole media list.
    pub fn from_media_maps(list: &[MediaMap]) -> Vec<MediaAttribute> {
        list.iter().map(Self::from_media_map).collect()
    }

    /// Emit a whole media list.
    pub fn to_media_maps(list: &[MediaAttribute]) -> Vec<MediaMap> {
        list.iter().map(Self::to_media_map).collect()
    }

    /// Whether `list` carries a stream of the given type.
    pub fn has_media_type(list: &[MediaAttribute], media_type: MediaType) -> bool {
        list.iter().any(|attr| attr.media_type == media_type)
    }

    /// Human-readable one-liner for logs.
    pub fn describe(&self, full: bool) -> String {
        let mut descr = format!(
            "type [{}] muted [{}] label [{}]",
            self.media_type,
            if self.muted { "YES" } else { "NO" },
            self.label
        );
        if full {
            descr.push_str(&format!(
                " source [{}] secure [{}]",
                self.source_uri,
                if self.secure { "YES" } else { "NO" }
            ));
        }
        descr
    }
}

fn bool_to_str(value: bool) -> &'static str {
    if value {
        TRUE_STR
    } else {
        FALSE_STR
    }
}

fn parse_bool(map: &MediaMap, key: &str) -> Option<bool> {
    let value = match map.get(key) {
        Some(value) => value,
        None => {
            warn!("[{key}] key not found for media");
            return None;
        }
    };
    match value.as_str() {
        TRUE_STR => Some(true),
        FALSE_STR => Some(false),
        other => {
            error!("Invalid value {other} for a boolean key");
            None
        }
    }
}
