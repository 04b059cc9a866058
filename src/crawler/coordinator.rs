//! Crawler coordinator - wires the stages into a cycle and runs it
//!
//! This module contains the orchestration logic, including:
//! - Building the frontier and the two inter-stage channels
//! - Spawning the fetcher, extractor and visited tracker
//! - Seeding the tracker
//! - Detecting quiescence and handling cancellation
//! - Collecting the final report

use crate::config::{Config, CrawlerConfig, DEFAULT_FRONTIER_CAPACITY};
use crate::crawler::fetcher::{Fetcher, HttpSource, PageSource};
use crate::crawler::frontier::{frontier, OverflowPolicy};
use crate::crawler::parser::{HtmlLinkParser, LinkExtractor, LinkParser};
use crate::crawler::tracker::VisitedTracker;
use crate::output::{CrawlOutcome, CrawlReport};
use crate::state::{CrawlPhase, InFlight, PhaseTracker};
use crate::url::{resolver_for, AddressResolver, PrefixResolver};
use crate::{Address, ConfigError, CrawlError};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, watch, Semaphore};
use tokio_util::sync::CancellationToken;

/// Sizes and policies of the pipeline
///
/// Fields are public so tests and embedders can build settings directly.
/// [`Pipeline::run`] checks them with [`PipelineSettings::validate`] before
/// anything is spawned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineSettings {
    /// Addresses the frontier holds at once
    pub frontier_capacity: usize,
    /// What the tracker does when the frontier is full
    pub overflow: OverflowPolicy,
    /// Buffer between fetcher and extractor
    pub page_channel_capacity: usize,
    /// Buffer between extractor and tracker
    pub discovery_channel_capacity: usize,
    /// Fetches allowed in progress at once
    pub max_concurrent_fetches: usize,
    /// Stop the run after this long, if set
    pub max_duration: Option<Duration>,
}

impl PipelineSettings {
    /// Builds settings from the `[crawler]` section of a configuration
    ///
    /// # Arguments
    ///
    /// * `config` - A crawler configuration, normally already validated
    pub fn from_config(config: &CrawlerConfig) -> Self {
        Self {
            frontier_capacity: config.frontier_capacity,
            overflow: OverflowPolicy::from_config(config),
            page_channel_capacity: config.page_channel_capacity,
            discovery_channel_capacity: config.discovery_channel_capacity,
            max_concurrent_fetches: config.max_concurrent_fetches,
            max_duration: config.max_duration(),
        }
    }

    /// Checks that every channel can actually be built
    ///
    /// # Returns
    ///
    /// * `Ok(())` - All capacities are usable
    /// * `Err(ConfigError::Validation)` - A capacity is zero or too large for a tokio channel
    pub fn validate(&self) -> Result<(), ConfigError> {
        let capacities = [
            ("frontier_capacity", self.frontier_capacity),
            ("page_channel_capacity", self.page_channel_capacity),
            ("discovery_channel_capacity", self.discovery_channel_capacity),
            ("max_concurrent_fetches", self.max_concurrent_fetches),
        ];

        for (name, value) in capacities {
            if value < 1 || value > Semaphore::MAX_PERMITS {
                return Err(ConfigError::Validation(format!(
                    "{} must be between 1 and {}, got {}",
                    name,
                    Semaphore::MAX_PERMITS,
                    value
                )));
            }
        }

        Ok(())
    }
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            frontier_capacity: DEFAULT_FRONTIER_CAPACITY,
            overflow: OverflowPolicy::Block,
            page_channel_capacity: 1,
            discovery_channel_capacity: 1,
            max_concurrent_fetches: 1,
            max_duration: None,
        }
    }
}

/// One crawl run: frontier -> fetcher -> extractor -> tracker -> frontier
pub struct Pipeline {
    settings: PipelineSettings,
    source: Arc<dyn PageSource>,
    parser: Arc<dyn LinkParser>,
    resolver: Arc<dyn AddressResolver>,
    phase: PhaseTracker,
}

impl Pipeline {
    /// Creates a pipeline that fetches through `source`
    ///
    /// Links are read with [`HtmlLinkParser`] and resolved with
    /// [`PrefixResolver`] unless replaced. Settings are not checked until
    /// [`Pipeline::run`].
    ///
    /// # Arguments
    ///
    /// * `settings` - Capacities, overflow policy, concurrency and time limit
    /// * `source` - Where page content comes from
    pub fn new(settings: PipelineSettings, source: Arc<dyn PageSource>) -> Self {
        Self {
            settings,
            source,
            parser: Arc::new(HtmlLinkParser),
            resolver: Arc::new(PrefixResolver),
            phase: PhaseTracker::new(),
        }
    }

    /// Creates an HTTP pipeline from a loaded configuration
    ///
    /// # Arguments
    ///
    /// * `config` - A validated configuration
    ///
    /// # Returns
    ///
    /// * `Ok(Pipeline)` - Pipeline using [`HttpSource`] and the configured resolver
    /// * `Err(CrawlError::Reqwest)` - The HTTP client could not be built
    pub fn from_config(config: &Config) -> Result<Self, CrawlError> {
        let source = HttpSource::new(&config.user_agent)?;
        Ok(
            Self::new(PipelineSettings::from_config(&config.crawler), Arc::new(source))
                .with_resolver(resolver_for(config.crawler.resolver)),
        )
    }

    /// Replaces the link parser used by the extractor
    pub fn with_parser(mut self, parser: Arc<dyn LinkParser>) -> Self {
        self.parser = parser;
        self
    }

    /// Replaces how references are turned into addresses
    pub fn with_resolver(mut self, resolver: Arc<dyn AddressResolver>) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    /// Observes the run's phase changes
    ///
    /// The receiver starts at `Running`. The sender is dropped when `run`
    /// returns, so `changed()` errors after the final `Terminated`.
    pub fn subscribe(&self) -> watch::Receiver<CrawlPhase> {
        self.phase.subscribe()
    }

    /// Runs the crawl until it goes quiet, times out, or `cancel` fires
    ///
    /// # Lifecycle
    ///
    /// 1. Spawn tracker, fetcher and extractor on a shared shutdown token
    /// 2. Send `seeds` to the tracker as the first discovery batch
    /// 3. Wait for the first of: no work in flight, `cancel`, the maximum
    ///    duration, or a stage dying
    /// 4. Fire the shutdown token so every parked stage returns
    /// 5. Join the stages and assemble the report
    ///
    /// # Arguments
    ///
    /// * `seeds` - Addresses recorded before anything else, in order
    /// * `cancel` - Caller's token; cancelling it ends the run as `Cancelled`
    ///
    /// # Returns
    ///
    /// * `Ok(CrawlReport)` - the run terminated, for whatever reason
    /// * `Err(CrawlError::Config)` - the settings cannot build the pipeline
    /// * `Err(CrawlError::Stage)` - a stage task panicked
    pub async fn run(
        self,
        seeds: Vec<Address>,
        cancel: CancellationToken,
    ) -> Result<CrawlReport, CrawlError> {
        self.settings.validate()?;

        let started = Instant::now();
        let settings = &self.settings;
        let shutdown = cancel.child_token();
        let in_flight = InFlight::new();

        let (frontier_tx, frontier_rx) = frontier(settings.frontier_capacity, settings.overflow);
        let (pages_tx, pages_rx) = mpsc::channel(settings.page_channel_capacity);
        let (discovery_tx, discovery_rx) = mpsc::channel(settings.discovery_channel_capacity);

        tracing::info!(
            "Starting crawl: {} seeds, frontier capacity {}, {} concurrent fetches",
            seeds.len(),
            settings.frontier_capacity,
            settings.max_concurrent_fetches
        );

        let tracker = VisitedTracker::new(frontier_tx, in_flight.clone());
        let tracker_handle = tokio::spawn(tracker.run(discovery_rx, shutdown.clone()));

        let fetcher = Fetcher::new(
            Arc::clone(&self.source),
            settings.max_concurrent_fetches,
            in_flight.clone(),
        );
        let fetcher_handle = tokio::spawn(fetcher.run(frontier_rx, pages_tx, shutdown.clone()));

        let extractor = LinkExtractor::new(Arc::clone(&self.parser), Arc::clone(&self.resolver));
        let extractor_handle =
            tokio::spawn(extractor.run(pages_rx, discovery_tx.clone(), shutdown.clone()));

        // Seed the tracker; the list is recorded exactly like any other batch
        in_flight.begin();
        let seeded = tokio::select! {
            biased;
            _ = shutdown.cancelled() => false,
            sent = discovery_tx.send(seeds) => sent.is_ok(),
        };
        drop(discovery_tx);
        if !seeded {
            in_flight.finish();
        }

        let deadline = async {
            match settings.max_duration {
                Some(limit) => tokio::time::sleep(limit).await,
                None => std::future::pending::<()>().await,
            }
        };

        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                tracing::info!("Crawl cancelled");
                CrawlOutcome::Cancelled
            }
            _ = in_flight.wait_idle() => {
                self.phase.advance(CrawlPhase::Draining);
                tracing::info!("No work in flight, draining pipeline");
                CrawlOutcome::Completed
            }
            _ = deadline => {
                tracing::warn!("Maximum crawl duration reached, stopping");
                CrawlOutcome::TimedOut
            }
            _ = shutdown.cancelled() => {
                tracing::error!("A pipeline stage failed, stopping");
                CrawlOutcome::Aborted
            }
        };

        // Unpark every stage, then collect what each one counted
        shutdown.cancel();

        let tracker_report = tracker_handle.await.map_err(|source| CrawlError::Stage {
            stage: "tracker",
            source,
        })?;
        let fetch_stats = fetcher_handle.await.map_err(|source| CrawlError::Stage {
            stage: "fetcher",
            source,
        })?;
        let extract_stats = extractor_handle.await.map_err(|source| CrawlError::Stage {
            stage: "extractor",
            source,
        })?;

        self.phase.advance(CrawlPhase::Terminated);

        let report = CrawlReport::assemble(
            outcome,
            tracker_report,
            fetch_stats,
            extract_stats,
            started.elapsed(),
        );

        tracing::info!(
            "Crawl {}: {} pages recorded, {} fetched, {} fetch failures in {:?}",
            report.outcome,
            report.visited.len(),
            report.fetched.len(),
            report.fetch_failures.len(),
            report.elapsed
        );

        Ok(report)
    }
}

/// Runs a crawl over HTTP using the configured seeds
///
/// # Arguments
///
/// * `config` - A validated configuration; its seeds start the crawl
/// * `cancel` - Token that stops the run early when cancelled
///
/// # Example
///
/// ```no_run
/// use ripple_loop::config::load_config;
/// use ripple_loop::crawler::run_crawl;
/// use std::path::Path;
/// use tokio_util::sync::CancellationToken;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = load_config(Path::new("config.toml"))?;
/// let report = run_crawl(config, CancellationToken::new()).await?;
/// println!("Visited {} pages", report.visited.len());
/// # Ok(())
/// # }
/// ```
pub async fn run_crawl(
    config: Config,
    cancel: CancellationToken,
) -> Result<CrawlReport, CrawlError> {
    let pipeline = Pipeline::from_config(&config)?;
    pipeline.run(config.crawler.seeds, cancel).await
}
