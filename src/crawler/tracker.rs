//! Visited tracker: the only owner of the visited set
//!
//! Every discovery batch, including the seed list, arrives here over one
//! channel. The tracker is that channel's only consumer, so membership checks
//! and inserts happen one at a time without a lock, and only addresses it has
//! never seen before are pushed back onto the frontier.

use crate::crawler::frontier::{FrontierSender, PushOutcome};
use crate::crawler::DiscoveryBatch;
use crate::state::InFlight;
use crate::Address;
use std::collections::HashSet;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Log a progress line every this many recorded addresses
const PROGRESS_INTERVAL: usize = 100;

/// Set of recorded addresses that remembers insertion order
///
/// Only grows. Handed out by value once the tracker task has finished.
#[derive(Debug, Clone, Default)]
pub struct VisitedSet {
    seen: HashSet<Address>,
    order: Vec<Address>,
}

impl VisitedSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts `address`; returns false if it was already present
    pub fn insert(&mut self, address: &str) -> bool {
        if self.seen.contains(address) {
            return false;
        }
        self.seen.insert(address.to_string());
        self.order.push(address.to_string());
        true
    }

    pub fn contains(&self, address: &str) -> bool {
        self.seen.contains(address)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Addresses in the order they were first recorded
    pub fn iter(&self) -> impl Iterator<Item = &Address> {
        self.order.iter()
    }

    pub fn into_vec(self) -> Vec<Address> {
        self.order
    }
}

/// Counters kept by the tracker while it runs
#[derive(Debug, Clone, Default)]
pub struct TrackerStats {
    /// Batches fully processed (the seed batch included)
    pub batches: usize,
    /// Addresses accepted onto the frontier
    pub enqueued: usize,
    /// Addresses skipped because they were already recorded
    pub duplicates: usize,
    /// Recorded addresses the frontier had no room for
    pub overflowed: Vec<Address>,
}

/// What the tracker hands back when its task ends
#[derive(Debug, Clone)]
pub struct TrackerReport {
    pub visited: VisitedSet,
    pub stats: TrackerStats,
}

/// The tracker stopped because the frontier closed or the run was cancelled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stopped;

/// Dedup authority of the pipeline
pub struct VisitedTracker {
    visited: VisitedSet,
    frontier: FrontierSender,
    in_flight: InFlight,
    stats: TrackerStats,
}

impl VisitedTracker {
    /// Creates a tracker that feeds `frontier` and counts its pushes in `in_flight`
    pub fn new(frontier: FrontierSender, in_flight: InFlight) -> Self {
        Self {
            visited: VisitedSet::new(),
            frontier,
            in_flight,
            stats: TrackerStats::default(),
        }
    }

    /// Records one batch in order, pushing each first-seen address onto the frontier
    ///
    /// A new address is inserted into the visited set before it is pushed, so
    /// it is never pushed twice even if the push has to wait. Under the
    /// `Block` overflow policy the push waits for space, which stalls the
    /// whole pipeline behind this batch until the fetcher frees a slot or
    /// `cancel` fires.
    ///
    /// # Returns
    ///
    /// * `Ok(())` - every address in the batch was handled
    /// * `Err(Stopped)` - the frontier closed or the run was cancelled mid-batch
    pub async fn record(
        &mut self,
        batch: DiscoveryBatch,
        cancel: &CancellationToken,
    ) -> Result<(), Stopped> {
        for address in batch {
            if !self.visited.insert(&address) {
                self.stats.duplicates += 1;
                continue;
            }

            tracing::info!("Recording page {}", address);

            // Counted before the push so a fast fetch failure cannot take the total to zero early
            self.in_flight.begin();
            match self.frontier.push(address, cancel).await {
                PushOutcome::Enqueued => {
                    self.stats.enqueued += 1;
                }
                PushOutcome::Overflowed(address) => {
                    self.in_flight.finish();
                    tracing::warn!(
                        "Frontier full ({} queued), dropping {}",
                        self.frontier.capacity(),
                        address
                    );
                    self.stats.overflowed.push(address);
                }
                PushOutcome::Closed | PushOutcome::Cancelled => {
                    self.in_flight.finish();
                    return Err(Stopped);
                }
            }

            if self.visited.len() % PROGRESS_INTERVAL == 0 {
                tracing::info!(
                    "Progress: {} pages recorded, {} in frontier",
                    self.visited.len(),
                    self.frontier.len()
                );
            }
        }

        Ok(())
    }

    /// Consumes discovery batches until the channel closes or `cancel` fires
    ///
    /// Each batch finishes one unit of in-flight work after its own pushes
    /// have been counted. Dropping the tracker at the end closes the frontier.
    pub async fn run(
        mut self,
        mut discoveries: mpsc::Receiver<DiscoveryBatch>,
        cancel: CancellationToken,
    ) -> TrackerReport {
        let _guard = cancel.clone().drop_guard();

        loop {
            let batch = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                batch = discoveries.recv() => match batch {
                    Some(batch) => batch,
                    None => break,
                },
            };

            tracing::trace!("Tracker received a batch of {} addresses", batch.len());
            let stopped = self.record(batch, &cancel).await.is_err();
            self.stats.batches += 1;
            self.in_flight.finish();

            if stopped {
                break;
            }
        }

        tracing::debug!(
            "Tracker exiting with {} recorded addresses",
            self.visited.len()
        );

        TrackerReport {
            visited: self.visited,
            stats: self.stats,
        }
    }

    /// The visited set as it stands
    pub fn visited(&self) -> &VisitedSet {
        &self.visited
    }

    pub fn stats(&self) -> &TrackerStats {
        &self.stats
    }
}
