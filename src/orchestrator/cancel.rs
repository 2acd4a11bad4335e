//! Cooperative cancellation shared between a run's owner and its stage bodies.

use crate::error::{PodgenError, Result};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Notify;

/// Cloneable cancellation flag. Cancelling any clone cancels them all.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
    notify: Arc<Notify>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
        self.notify.notify_waiters();
    }

    /// Resolves once cancellation was requested.
    pub async fn cancelled(&self) {
        loop {
            // Registered before the flag is read, so a concurrent cancel is not missed.
            let notified = self.notify.notified();
            if self.is_cancelled() {
                return;
            }
            notified.await;
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// `Err(Cancelled)` once cancellation was requested, for use with `?` at safe points.
    pub fn checkpoint(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(PodgenError::Cancelled)
        } else {
            Ok(())
        }
    }
}
