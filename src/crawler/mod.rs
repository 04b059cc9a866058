//! Crawler module: the cyclic fetch / extract / record pipeline
//!
//! This module contains the core crawling logic, including:
//! - The bounded frontier and its overflow policies
//! - The fetch stage and its HTTP page source
//! - The link extraction stage
//! - The visited tracker that deduplicates and re-feeds the frontier
//! - Overall run coordination

mod coordinator;
mod fetcher;
mod frontier;
mod parser;
mod tracker;

pub use coordinator::{run_crawl, Pipeline, PipelineSettings};
pub use fetcher::{
    build_http_client, fetch_url, FetchFailure, FetchStats, Fetcher, HttpSource, PageSource,
};
pub use frontier::{frontier, FrontierReceiver, FrontierSender, OverflowPolicy, PushOutcome};
pub use parser::{ExtractStats, HtmlLinkParser, LinkExtractor, LinkParser, SkippedLink};
pub use tracker::{Stopped, TrackerReport, TrackerStats, VisitedSet, VisitedTracker};

use crate::config::Config;
use crate::output::CrawlReport;
use crate::{Address, CrawlError};
use tokio_util::sync::CancellationToken;

/// A fetched page on its way to the link extractor
///
/// Owned by whichever stage holds it; the extractor consumes it and drops the
/// content right after reading the links out.
#[derive(Debug)]
pub struct Page {
    pub address: Address,
    pub content: String,
}

/// Addresses found on one page, in document order
pub type DiscoveryBatch = Vec<Address>;

/// Runs a complete crawl operation
///
/// This is the main entry point for starting a crawl. It will:
/// 1. Build the HTTP client from the user agent settings
/// 2. Record the configured seeds
/// 3. Fetch pages and follow every newly discovered link
/// 4. Stop once nothing is left in flight, or when `cancel` fires
pub async fn crawl(config: Config, cancel: CancellationToken) -> Result<CrawlReport, CrawlError> {
    run_crawl(config, cancel).await
}
