//! Cooperative cancellation for long-running executions.
//!
//! A [`CancelToken`] is checked between elements: sequential pipelines check it
//! before pulling the next element (see
//! [`Pipeline::with_cancellation`](crate::Pipeline::with_cancellation)) and
//! parallel stages check it before scheduling each element. An element whose
//! callback is already running is never interrupted.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Shared cancellation flag. Clones observe the same state.
#[derive(Clone, Debug, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Idempotent.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}
