use serde::Deserialize;
use std::time::Duration;

/// Default number of addresses the frontier can hold
pub const DEFAULT_FRONTIER_CAPACITY: usize = 10_000;

/// Main configuration structure for Ripple-Loop
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub crawler: CrawlerConfig,
    #[serde(rename = "user-agent")]
    pub user_agent: UserAgentConfig,
}

/// Pipeline shape and crawl behavior
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct CrawlerConfig {
    /// Addresses recorded before anything else, in order
    #[serde(default)]
    pub seeds: Vec<String>,

    /// Maximum number of addresses waiting in the frontier
    #[serde(default = "default_frontier_capacity")]
    pub frontier_capacity: usize,

    /// What the visited tracker does when the frontier is full
    #[serde(default)]
    pub overflow_policy: OverflowKind,

    /// How long `block-for` waits for frontier space (milliseconds)
    #[serde(default = "default_overflow_wait_ms")]
    pub overflow_wait_ms: u64,

    /// Buffer between the fetcher and the link extractor
    #[serde(default = "default_channel_capacity")]
    pub page_channel_capacity: usize,

    /// Buffer between the link extractor and the visited tracker
    #[serde(default = "default_channel_capacity")]
    pub discovery_channel_capacity: usize,

    /// Maximum number of fetches in progress at once
    #[serde(default = "default_concurrent_fetches")]
    pub max_concurrent_fetches: usize,

    /// Hard stop for the whole run, in seconds
    #[serde(default)]
    pub max_duration_secs: Option<u64>,

    /// How relative links are turned into addresses
    #[serde(default)]
    pub resolver: ResolverKind,
}

impl CrawlerConfig {
    /// The configured hard stop, if any
    pub fn max_duration(&self) -> Option<Duration> {
        self.max_duration_secs.map(Duration::from_secs)
    }
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            seeds: Vec::new(),
            frontier_capacity: default_frontier_capacity(),
            overflow_policy: OverflowKind::default(),
            overflow_wait_ms: default_overflow_wait_ms(),
            page_channel_capacity: default_channel_capacity(),
            discovery_channel_capacity: default_channel_capacity(),
            max_concurrent_fetches: default_concurrent_fetches(),
            max_duration_secs: None,
            resolver: ResolverKind::default(),
        }
    }
}

/// Overflow policy as written in the config file
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OverflowKind {
    /// Wait until the fetcher frees a slot
    #[default]
    Block,
    /// Wait up to `overflow-wait-ms`, then give up on the address
    BlockFor,
    /// Give up on the address as soon as the frontier is full
    Reject,
}

/// Link resolution strategy as written in the config file
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResolverKind {
    /// Concatenate the page address and the reference
    #[default]
    Prefix,
    /// RFC 3986 reference resolution
    Standard,
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
pub struct UserAgentConfig {
    /// Name of the crawler
    #[serde(rename = "crawler-name")]
    pub crawler_name: String,

    /// Version of the crawler
    #[serde(rename = "crawler-version")]
    pub crawler_version: String,

    /// URL with information about the crawler
    #[serde(rename = "contact-url")]
    pub contact_url: String,

    /// Email address for crawler-related contact
    #[serde(rename = "contact-email")]
    pub contact_email: String,

    /// Whole-request timeout in seconds
    #[serde(rename = "request-timeout-secs", default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_frontier_capacity() -> usize {
    DEFAULT_FRONTIER_CAPACITY
}

fn default_overflow_wait_ms() -> u64 {
    1000
}

fn default_channel_capacity() -> usize {
    1
}

fn default_concurrent_fetches() -> usize {
    1
}

fn default_request_timeout() -> u64 {
    30
}
