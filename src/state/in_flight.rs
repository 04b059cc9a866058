//! Outstanding-work accounting for quiescence detection
//!
//! One unit of work is either the seed batch or an address pushed onto the
//! frontier. A unit is finished when its fetch fails, or when the visited
//! tracker has recorded the batch it produced. The tracker counts the pushes
//! of a batch before finishing the batch itself, so the count can only reach
//! zero when nothing is queued, fetched, parsed, or waiting to be recorded.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

/// Shared counter of work units that have entered the pipeline but not left it
#[derive(Debug, Clone, Default)]
pub struct InFlight {
    inner: Arc<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    outstanding: AtomicUsize,
    idle: Notify,
}

impl InFlight {
    pub fn new() -> Self {
        Self::default()
    }

    /// Counts a new unit of work
    pub fn begin(&self) {
        self.inner.outstanding.fetch_add(1, Ordering::SeqCst);
    }

    /// Finishes one unit of work and wakes idle waiters when none remain
    pub fn finish(&self) {
        let previous = self.inner.outstanding.fetch_sub(1, Ordering::SeqCst);
        debug_assert!(previous > 0, "finished more work than was started");
        if previous == 1 {
            self.inner.idle.notify_waiters();
        }
    }

    /// Number of units currently outstanding
    pub fn outstanding(&self) -> usize {
        self.inner.outstanding.load(Ordering::SeqCst)
    }

    /// Resolves once the outstanding count is zero
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.inner.idle.notified();
            tokio::pin!(notified);
            // Register before checking so a finish() in between is not missed
            notified.as_mut().enable();

            if self.outstanding() == 0 {
                return;
            }
            notified.await;
        }
    }
}
