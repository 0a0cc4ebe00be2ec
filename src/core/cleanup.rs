//! Synchronous resource reclamation
//!
//! Components that own external resources (child processes, pending timers,
//! temporary files) implement [`Cleanup`] so callers can reclaim everything
//! without knowing what is held. Implementations must be idempotent and must
//! not block: long-running follow-up work belongs to the async caller.

/// Reclaim every resource held by this instance
pub trait Cleanup {
    fn cleanup(&self);
}

impl<T: Cleanup + ?Sized> Cleanup for std::sync::Arc<T> {
    fn cleanup(&self) {
        (**self).cleanup()
    }
}
