//! Crawl report assembled from what each stage hands back
//!
//! Stages keep their own counters and return them when they exit; nothing
//! here is shared while the run is in progress.

use crate::crawler::{ExtractStats, FetchFailure, FetchStats, SkippedLink, TrackerReport};
use crate::state::CrawlPhase;
use crate::Address;
use std::fmt;
use std::time::Duration;

/// Why a run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CrawlOutcome {
    /// Quiescence reached: nothing queued, fetched, parsed or waiting to be recorded
    Completed,
    /// The caller's cancellation token fired
    Cancelled,
    /// The configured maximum duration elapsed
    TimedOut,
    /// A fetch task panicked and the pipeline was shut down around it
    ///
    /// A panic in the tracker, extractor or fetch stage loop itself is not
    /// reported this way; `Pipeline::run` returns `CrawlError::Stage` instead.
    Aborted,
}

impl CrawlOutcome {
    /// Returns true if the run ran out of work rather than being stopped
    pub fn is_complete(&self) -> bool {
        matches!(self, Self::Completed)
    }
}

impl fmt::Display for CrawlOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
            Self::TimedOut => "timed out",
            Self::Aborted => "aborted",
        };
        f.write_str(s)
    }
}

/// Everything a finished run knows
#[derive(Debug, Clone)]
pub struct CrawlReport {
    /// Why the run ended
    pub outcome: CrawlOutcome,

    /// Phase the run ended in; always `Terminated` for a returned report
    pub phase: CrawlPhase,

    /// Final visited set, in the order addresses were first recorded
    pub visited: Vec<Address>,

    /// Addresses pushed onto the frontier
    pub enqueued: usize,

    /// Discoveries skipped because the address was already recorded
    pub duplicates: usize,

    /// Recorded addresses the frontier had no room for
    pub overflowed: Vec<Address>,

    /// Addresses taken off the frontier by the fetcher
    pub dequeued: usize,

    /// Addresses whose page was fetched and handed to the extractor
    ///
    /// Unlike `visited`, this never contains an address whose fetch failed.
    pub fetched: Vec<Address>,

    /// Fetches that failed, in completion order
    pub fetch_failures: Vec<FetchFailure>,

    /// Fetch tasks that panicked
    pub fetch_panics: usize,

    /// Pages the extractor turned into batches
    pub pages_parsed: usize,

    /// Addresses emitted by the extractor, duplicates included
    pub links_found: usize,

    /// References dropped because they did not resolve
    pub skipped_links: Vec<SkippedLink>,

    /// Wall-clock time of the run
    pub elapsed: Duration,
}

impl CrawlReport {
    pub(crate) fn assemble(
        outcome: CrawlOutcome,
        tracker: TrackerReport,
        fetch: FetchStats,
        extract: ExtractStats,
        elapsed: Duration,
    ) -> Self {
        Self {
            outcome,
            phase: CrawlPhase::Terminated,
            visited: tracker.visited.into_vec(),
            enqueued: tracker.stats.enqueued,
            duplicates: tracker.stats.duplicates,
            overflowed: tracker.stats.overflowed,
            dequeued: fetch.dequeued,
            fetched: fetch.fetched,
            fetch_failures: fetch.failures,
            fetch_panics: fetch.panicked,
            pages_parsed: extract.pages,
            links_found: extract.links,
            skipped_links: extract.skipped,
            elapsed,
        }
    }

    /// Returns true if `address` ended up in the visited set
    pub fn was_visited(&self, address: &str) -> bool {
        self.visited.iter().any(|a| a == address)
    }

    /// Failures that might succeed if attempted again
    pub fn retryable_failures(&self) -> usize {
        self.fetch_failures
            .iter()
            .filter(|f| f.error.is_retryable())
            .count()
    }

    /// Failures that would fail the same way again
    pub fn permanent_failures(&self) -> usize {
        self.fetch_failures.len() - self.retryable_failures()
    }
}

/// Prints a report to stdout in a formatted manner
pub fn print_report(report: &CrawlReport) {
    println!("=== Crawl Report ===\n");

    println!("Run:");
    println!("  Outcome: {}", report.outcome);
    println!("  Elapsed: {:.2?}", report.elapsed);
    println!();

    println!("Frontier:");
    println!("  Pages recorded: {}", report.visited.len());
    println!("  Enqueued: {}", report.enqueued);
    println!("  Duplicates skipped: {}", report.duplicates);
    println!("  Overflowed: {}", report.overflowed.len());
    println!();

    println!("Stages:");
    println!("  Dequeued: {}", report.dequeued);
    println!("  Fetched: {}", report.fetched.len());
    println!("  Parsed: {}", report.pages_parsed);
    println!("  Links found: {}", report.links_found);
    println!("  Links skipped: {}", report.skipped_links.len());
    if report.fetch_panics > 0 {
        println!("  Fetch panics: {}", report.fetch_panics);
    }
    println!();

    if !report.fetch_failures.is_empty() {
        println!(
            "Fetch Failures ({} retryable, {} permanent):",
            report.retryable_failures(),
            report.permanent_failures()
        );
        for failure in &report.fetch_failures {
            println!("  - {}: {}", failure.address, failure.error);
        }
        println!();
    }

    if !report.overflowed.is_empty() {
        println!("Overflowed Addresses ({}):", report.overflowed.len());
        for address in &report.overflowed {
            println!("  - {}", address);
        }
        println!();
    }

    let rate = if report.elapsed.as_secs_f64() > 0.0 {
        report.fetched.len() as f64 / report.elapsed.as_secs_f64()
    } else {
        0.0
    };
    println!("Throughput: {:.2} pages/sec", rate);
}
