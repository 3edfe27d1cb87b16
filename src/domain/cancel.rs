//! Cooperative cancellation
//!
//! Scans and recoveries check the token at each natural iteration
//! boundary (per record, per sector window, per file) and wind down
//! with a distinct "cancelled" status instead of aborting mid-write.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Shared cancellation flag, cloneable across worker threads
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    /// Creates a token in the not-cancelled state
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation; idempotent
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    /// Returns whether cancellation has been requested
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }
}
