//! Lifecycle phases of a crawl run
//!
//! A run starts `Running`, moves to `Draining` once no work is left in flight,
//! and ends `Terminated`. Cancellation skips straight to `Terminated`.

use std::fmt;
use tokio::sync::watch;

/// Represents where a crawl run is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CrawlPhase {
    /// Work is queued, being fetched, being parsed, or waiting to be recorded
    Running,

    /// Quiescence reached; stages are being told to stop
    Draining,

    /// Frontier closed, every stage exited, visited set final
    Terminated,
}

impl CrawlPhase {
    /// Returns true once the run can no longer change
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Terminated)
    }

    /// Returns true if moving from `self` to `next` is allowed
    pub fn can_transition_to(&self, next: CrawlPhase) -> bool {
        matches!(
            (self, next),
            (Self::Running, Self::Draining)
                | (Self::Running, Self::Terminated)
                | (Self::Draining, Self::Terminated)
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Draining => "draining",
            Self::Terminated => "terminated",
        }
    }
}

impl fmt::Display for CrawlPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Publishes phase changes to any number of watchers
#[derive(Debug)]
pub struct PhaseTracker {
    tx: watch::Sender<CrawlPhase>,
}

impl PhaseTracker {
    /// Creates a tracker in the `Running` phase
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(CrawlPhase::Running);
        Self { tx }
    }

    /// Current phase
    pub fn current(&self) -> CrawlPhase {
        *self.tx.borrow()
    }

    /// A receiver that observes every later transition
    pub fn subscribe(&self) -> watch::Receiver<CrawlPhase> {
        self.tx.subscribe()
    }

    /// Moves to `next` if the transition is legal
    ///
    /// Returns false and leaves the phase untouched otherwise.
    pub fn advance(&self, next: CrawlPhase) -> bool {
        self.tx.send_if_modified(|phase| {
            if phase.can_transition_to(next) {
                tracing::debug!("Crawl phase {} -> {}", phase, next);
                *phase = next;
                true
            } else {
                false
            }
        })
    }
}

impl Default for PhaseTracker {
    fn default() -> Self {
        Self::new()
    }
}
