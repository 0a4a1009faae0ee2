//! Media stream descriptions and the local host's media slots.

pub mod attribute;
pub mod host;

pub use attribute::{keys, values, MediaAttribute, MediaMap, MediaSourceType, MediaType};
pub use host::HostMediaSources;
