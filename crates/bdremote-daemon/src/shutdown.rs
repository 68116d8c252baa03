//! Cooperative shutdown token shared by all daemon threads.
//!
//! Every loop in the daemon polls [`ShutdownSignal::is_cancelled`] at its
//! head and exits promptly when it flips; nothing is preempted, so
//! termination latency is bounded by the largest sleep any loop takes.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

/// Cloneable cancellation token.
///
/// All clones observe the same flag; [`cancel`](ShutdownSignal::cancel) is
/// idempotent and never blocks.
#[derive(Debug, Clone, Default)]
pub struct ShutdownSignal {
    cancelled: Arc<AtomicBool>,
}

impl ShutdownSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests shutdown of every loop holding a clone of this token.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    /// Whether shutdown has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }
}
