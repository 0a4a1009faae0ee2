//! Audio routing: the ring-buffer pool seam and conference binding policies.

pub mod binder;
pub mod ringbuffer;

pub use binder::{AudioBinder, HostAudioState};
pub use ringbuffer::{RingBufferGuard, RingBufferPool, DEFAULT_ID};
