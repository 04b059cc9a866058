//! Page fetcher stage
//!
//! This module handles retrieval for the crawler, including:
//! - The `PageSource` seam the fetch stage calls for each address
//! - An HTTP implementation built on reqwest
//! - Failure classification (timeouts, connection errors, HTTP status)
//! - The stage loop that drains the frontier and hands pages to the extractor

use crate::config::UserAgentConfig;
use crate::crawler::frontier::FrontierReceiver;
use crate::crawler::Page;
use crate::state::InFlight;
use crate::{Address, FetchError};
use async_trait::async_trait;
use reqwest::{header::CONTENT_TYPE, redirect::Policy, Client};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Semaphore};
use tokio::task::{JoinError, JoinSet};
use tokio_util::sync::CancellationToken;

/// Maximum redirect hops followed before giving up
const MAX_REDIRECTS: usize = 10;

/// Retrieves the content of one address
///
/// Implementations must tolerate concurrent calls when the fetch stage runs
/// more than one fetch at a time.
#[async_trait]
pub trait PageSource: Send + Sync {
    async fn fetch(&self, address: &str) -> Result<String, FetchError>;
}

/// Builds an HTTP client with proper configuration
///
/// # Arguments
///
/// * `config` - The user agent configuration
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client
///
/// # Example
///
/// ```no_run
/// use ripple_loop::config::UserAgentConfig;
/// use ripple_loop::crawler::build_http_client;
///
/// let config = UserAgentConfig {
///     crawler_name: "RippleLoop".to_string(),
///     crawler_version: "0.1".to_string(),
///     contact_url: "https://example.com/about".to_string(),
///     contact_email: "admin@example.com".to_string(),
///     request_timeout_secs: 30,
/// };
///
/// let client = build_http_client(&config).unwrap();
/// ```
pub fn build_http_client(config: &UserAgentConfig) -> Result<Client, reqwest::Error> {
    // Format: CrawlerName/Version (+ContactURL; ContactEmail)
    let user_agent = format!(
        "{}/{} (+{}; {})",
        config.crawler_name, config.crawler_version, config.contact_url, config.contact_email
    );

    Client::builder()
        .user_agent(user_agent)
        .timeout(Duration::from_secs(config.request_timeout_secs))
        .connect_timeout(Duration::from_secs(10))
        .redirect(Policy::limited(MAX_REDIRECTS))
        .gzip(true)
        .brotli(true)
        .build()
}

/// `PageSource` backed by a reqwest client
#[derive(Debug, Clone)]
pub struct HttpSource {
    client: Client,
}

impl HttpSource {
    /// Builds a source with its own client, see [`build_http_client`]
    pub fn new(config: &UserAgentConfig) -> Result<Self, reqwest::Error> {
        Ok(Self::with_client(build_http_client(config)?))
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl PageSource for HttpSource {
    async fn fetch(&self, address: &str) -> Result<String, FetchError> {
        fetch_url(&self.client, address).await
    }
}

/// Fetches a URL and classifies any failure
///
/// | Condition | Result |
/// |-----------|--------|
/// | 2xx with HTML or no Content-Type | `Ok(body)` |
/// | 2xx with another Content-Type | `ContentMismatch` |
/// | Any other status | `Status(code)` |
/// | Timeout | `Timeout` |
/// | Connection refused / DNS / TLS | `Connect` |
/// | Body read failure | `Body` |
///
/// No retries happen here; `FetchError::is_retryable` tells the caller which
/// failures might succeed on a later attempt.
///
/// # Arguments
///
/// * `client` - The HTTP client to use
/// * `url` - The URL to fetch
///
/// # Returns
///
/// The page body, or the classified reason it could not be retrieved
pub async fn fetch_url(client: &Client, url: &str) -> Result<String, FetchError> {
    let response = client.get(url).send().await.map_err(classify_error)?;

    let status = response.status();
    if !status.is_success() {
        return Err(FetchError::Status(status.as_u16()));
    }

    if let Some(content_type) = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
    {
        if !content_type.contains("html") {
            return Err(FetchError::ContentMismatch(content_type.to_string()));
        }
    }

    response
        .text()
        .await
        .map_err(|e| FetchError::Body(e.to_string()))
}

/// Maps a reqwest transport error onto the fetch failure taxonomy
fn classify_error(e: reqwest::Error) -> FetchError {
    if e.is_timeout() {
        FetchError::Timeout
    } else if e.is_connect() {
        FetchError::Connect(e.to_string())
    } else if e.is_builder() {
        FetchError::InvalidAddress(e.to_string())
    } else {
        FetchError::Transport(e.to_string())
    }
}

/// An address whose fetch failed, with the reason
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchFailure {
    pub address: Address,
    pub error: FetchError,
}

/// Counters kept by the fetch stage while it runs
#[derive(Debug, Clone, Default)]
pub struct FetchStats {
    /// Addresses taken off the frontier
    pub dequeued: usize,
    /// Addresses whose page was handed to the extractor, in completion order
    pub fetched: Vec<Address>,
    /// Fetches that failed; none of these produced a page
    pub failures: Vec<FetchFailure>,
    /// Fetch tasks that panicked; the first one shuts the run down
    pub panicked: usize,
}

impl FetchStats {
    fn absorb(&mut self, joined: Result<FetchOutcome, JoinError>) {
        match joined {
            Ok(FetchOutcome::Fetched(address)) => self.fetched.push(address),
            Ok(FetchOutcome::Failed(failure)) => self.failures.push(failure),
            Ok(FetchOutcome::Abandoned) => {}
            Err(e) => {
                tracing::error!("Fetch task panicked: {}", e);
                self.panicked += 1;
            }
        }
    }
}

/// How one spawned fetch ended
#[derive(Debug)]
enum FetchOutcome {
    Fetched(Address),
    Failed(FetchFailure),
    /// Cancelled, or the extractor was gone before the page could be handed over
    Abandoned,
}

/// The fetch stage
pub struct Fetcher {
    source: Arc<dyn PageSource>,
    concurrency: usize,
    in_flight: InFlight,
}

impl Fetcher {
    /// Creates a fetch stage running at most `concurrency` fetches at once
    ///
    /// # Arguments
    ///
    /// * `source` - Where page content comes from
    /// * `concurrency` - Maximum fetches in progress; zero is treated as one
    /// * `in_flight` - Work counter shared with the tracker, finished on each failed fetch
    pub fn new(source: Arc<dyn PageSource>, concurrency: usize, in_flight: InFlight) -> Self {
        Self {
            source,
            concurrency: concurrency.max(1),
            in_flight,
        }
    }

    /// Drains the frontier until it closes or `cancel` fires
    ///
    /// A permit is taken before each dequeue, so at most `concurrency`
    /// addresses are off the frontier at once. The permit is held until the
    /// page has been handed to the extractor, which is what carries the
    /// extractor's backpressure back to the frontier.
    ///
    /// A fetch task that panics cancels `cancel`, which stops every stage
    /// sharing the token.
    ///
    /// # Arguments
    ///
    /// * `frontier` - Consumer half of the frontier
    /// * `pages` - Channel to the link extractor
    /// * `cancel` - Shutdown token shared by the pipeline stages
    ///
    /// # Returns
    ///
    /// The stage's counters, once every spawned fetch has been joined
    pub async fn run(
        self,
        mut frontier: FrontierReceiver,
        pages: mpsc::Sender<Page>,
        cancel: CancellationToken,
    ) -> FetchStats {
        let _guard = cancel.clone().drop_guard();
        let permits = Arc::new(Semaphore::new(self.concurrency));
        let mut tasks = JoinSet::new();
        let mut stats = FetchStats::default();

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                Some(joined) = tasks.join_next(), if !tasks.is_empty() => {
                    stats.absorb(joined);
                    if stats.panicked > 0 {
                        // The panicked fetch never finishes its unit of work, so the run cannot go idle
                        cancel.cancel();
                    }
                }
                permit = permits.clone().acquire_owned() => {
                    let Ok(permit) = permit else { break };
                    let address = tokio::select! {
                        biased;
                        _ = cancel.cancelled() => break,
                        next = frontier.pop() => match next {
                            Some(address) => address,
                            None => break,
                        },
                    };

                    stats.dequeued += 1;
                    tracing::debug!("Fetching {}", address);

                    let source = Arc::clone(&self.source);
                    let pages = pages.clone();
                    let cancel = cancel.clone();
                    let in_flight = self.in_flight.clone();
                    tasks.spawn(async move {
                        let _permit = permit;
                        fetch_one(source.as_ref(), address, &pages, &cancel, &in_flight).await
                    });
                }
            }
        }

        drop(pages);
        while let Some(joined) = tasks.join_next().await {
            stats.absorb(joined);
        }

        tracing::debug!(
            "Fetcher exiting: {} fetched, {} failed",
            stats.fetched.len(),
            stats.failures.len()
        );
        stats
    }
}

/// Fetches one address and forwards the page, or records why it could not
async fn fetch_one(
    source: &dyn PageSource,
    address: Address,
    pages: &mpsc::Sender<Page>,
    cancel: &CancellationToken,
    in_flight: &InFlight,
) -> FetchOutcome {
    let result = tokio::select! {
        biased;
        _ = cancel.cancelled() => return FetchOutcome::Abandoned,
        result = source.fetch(&address) => result,
    };

    match result {
        Ok(content) => {
            let page = Page {
                address: address.clone(),
                content,
            };
            tokio::select! {
                biased;
                _ = cancel.cancelled() => FetchOutcome::Abandoned,
                sent = pages.send(page) => match sent {
                    Ok(()) => FetchOutcome::Fetched(address),
                    Err(_) => FetchOutcome::Abandoned,
                },
            }
        }
        Err(error) => {
            tracing::warn!("Failed to fetch {}: {}", address, error);
            // A failed fetch produces no batch, so its unit of work ends here
            in_flight.finish();
            FetchOutcome::Failed(FetchFailure { address, error })
        }
    }
}
