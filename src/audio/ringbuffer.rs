//! Ring-buffer pool collaborator interface.
//!
//! The pool is the process-wide audio routing graph. A binding is a
//! directed edge between two buffer ids: full-duplex edges carry audio both
//! ways, half-duplex edges let `id` read from `source` without feeding
//! anything back. The engine owns its edges logically but the pool itself
//! is shared.

/// Reserved buffer id of the local audio layer (the host).
pub const DEFAULT_ID: &str = "audiolayer_id";

/// Keeps a ring buffer alive for as long as the guard is held.
pub trait RingBufferGuard: Send + Sync {}

/// Audio routing graph operations consumed by the engine.
pub trait RingBufferPool: Send + Sync {
    /// Bind `a` and `b` full-duplex: each reads the other.
    fn bind(&self, a: &str, b: &str);

    /// Let `id` read from `source`; `source` does not read `id` back.
    fn bind_half_duplex(&self, id: &str, source: &str);

    /// Remove the full-duplex edge between `a` and `b`.
    fn unbind(&self, a: &str, b: &str);

    /// Silence `source`: remove every edge through which another buffer
    /// reads it, including the outgoing half of full-duplex edges.
    /// Edges `source` reads from stay intact.
    fn unbind_all_half_duplex(&self, source: &str);

    /// Remove every edge touching `id`.
    fn unbind_all(&self, id: &str);

    /// Reset the read pointers of `id`'s buffer.
    fn flush(&self, id: &str);

    /// Reset the read pointers of every buffer in the pool.
    fn flush_all(&self);

    /// Create a standalone ring buffer; it lives while the guard does.
    fn create_ring_buffer(&self, id: &str) -> Box<dyn RingBufferGuard>;
}
