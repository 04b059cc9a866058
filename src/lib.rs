//! Ripple-Loop: a cyclic crawl pipeline
//!
//! Seeds flow through a bounded frontier into a fetch stage, fetched pages are
//! scanned for links, and a single visited tracker decides which of the
//! discovered addresses re-enter the frontier.

pub mod config;
pub mod crawler;
pub mod output;
pub mod state;
pub mod url;

use thiserror::Error;

/// Identity of a page. Two addresses are the same page only if the strings are equal.
pub type Address = String;

/// Main error type for Ripple-Loop operations
#[derive(Debug, Error)]
pub enum CrawlError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("URL error: {0}")]
    UrlError(#[from] UrlError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("Pipeline stage '{stage}' failed: {source}")]
    Stage {
        stage: &'static str,
        source: tokio::task::JoinError,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// Errors produced while turning a raw reference into an address
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Cannot resolve '{reference}' against '{base}'")]
    Unresolvable { base: String, reference: String },
}

/// Why a page could not be retrieved
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("Request timeout")]
    Timeout,

    #[error("Connection failed: {0}")]
    Connect(String),

    #[error("HTTP {0}")]
    Status(u16),

    #[error("Expected HTML, got {0}")]
    ContentMismatch(String),

    #[error("Failed to read body: {0}")]
    Body(String),

    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("Transport error: {0}")]
    Transport(String),
}

impl FetchError {
    /// Returns true if the same request could plausibly succeed later
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Timeout | Self::Connect(_) | Self::Body(_) | Self::Transport(_) => true,
            Self::Status(code) => *code == 429 || *code >= 500,
            Self::ContentMismatch(_) | Self::InvalidAddress(_) => false,
        }
    }
}

/// Result type alias for Ripple-Loop operations
pub type Result<T> = std::result::Result<T, CrawlError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for URL operations
pub type UrlResult<T> = std::result::Result<T, UrlError>;

// Re-export commonly used types
pub use config::Config;
pub use crawler::{run_crawl, Pipeline};
pub use output::CrawlReport;
pub use state::CrawlPhase;
