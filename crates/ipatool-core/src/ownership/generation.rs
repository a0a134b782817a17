//! Result-set generations.
//!
//! Each search produces a new generation. Work scheduled for an older one
//! observes cancellation through its token and its completions are dropped.

use std::sync::Arc;
use tokio::sync::watch;

use crate::error::{IpatoolError, Result};

/// Tag for one result set plus its shared cancellation signal.
///
/// Clones share the signal; superseding any clone cancels all of them.
#[derive(Debug, Clone)]
pub struct Generation {
    id: u64,
    cancelled: Arc<watch::Sender<bool>>,
}

impl Default for Generation {
    fn default() -> Self {
        Self::first()
    }
}

impl Generation {
    pub fn first() -> Self {
        Self::with_id(0)
    }

    fn with_id(id: u64) -> Self {
        let (cancelled, _) = watch::channel(false);
        Self {
            id,
            cancelled: Arc::new(cancelled),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// Cancel this generation and return its successor.
    pub fn supersede(&self) -> Self {
        self.cancelled.send_replace(true);
        Self::with_id(self.id + 1)
    }

    pub fn is_cancelled(&self) -> bool {
        *self.cancelled.borrow()
    }

    /// Return early from a unit of work whose result set is gone.
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(IpatoolError::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Completes once this generation has been superseded.
    pub async fn cancelled(&self) {
        let mut receiver = self.cancelled.subscribe();
        // The sender lives in `self`, so the channel cannot close while we wait.
        let _ = receiver.wait_for(|cancelled| *cancelled).await;
    }
}
