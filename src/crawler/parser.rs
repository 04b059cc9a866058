//! Link extractor stage
//!
//! This module handles turning fetched pages into discovery batches:
//! - Pulling raw `href` references out of HTML, in document order
//! - Resolving each reference against the page it came from
//! - Skipping references that do not resolve without losing the rest

use crate::crawler::{DiscoveryBatch, Page};
use crate::url::AddressResolver;
use crate::{Address, UrlError};
use scraper::{Html, Selector};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Pulls raw link references out of a document
pub trait LinkParser: Send + Sync {
    /// Returns every link reference in document order, unresolved
    fn extract_hrefs(&self, content: &str) -> Vec<String>;
}

/// `LinkParser` that reads the `href` of every `<a>` element
///
/// Every anchor counts, `download` links and special schemes included;
/// filtering is left to whoever consumes the addresses.
///
/// # Example
///
/// ```
/// use ripple_loop::crawler::{HtmlLinkParser, LinkParser};
///
/// let html = r#"<html><body><a href="/one">1</a><a href="two">2</a></body></html>"#;
/// assert_eq!(HtmlLinkParser.extract_hrefs(html), vec!["/one", "two"]);
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct HtmlLinkParser;

impl LinkParser for HtmlLinkParser {
    fn extract_hrefs(&self, content: &str) -> Vec<String> {
        let document = Html::parse_document(content);
        let Ok(selector) = Selector::parse("a[href]") else {
            return Vec::new();
        };

        document
            .select(&selector)
            .filter_map(|element| element.value().attr("href"))
            .map(str::to_string)
            .collect()
    }
}

/// A reference that was dropped from its page's batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedLink {
    pub page: Address,
    pub reference: String,
    pub error: UrlError,
}

/// Counters kept by the extractor while it runs
#[derive(Debug, Clone, Default)]
pub struct ExtractStats {
    /// Pages parsed
    pub pages: usize,
    /// Addresses emitted across all batches
    pub links: usize,
    /// References that failed to resolve
    pub skipped: Vec<SkippedLink>,
}

/// The link extraction stage
pub struct LinkExtractor {
    parser: Arc<dyn LinkParser>,
    resolver: Arc<dyn AddressResolver>,
}

impl LinkExtractor {
    pub fn new(parser: Arc<dyn LinkParser>, resolver: Arc<dyn AddressResolver>) -> Self {
        Self { parser, resolver }
    }

    /// Turns one page into its discovery batch
    ///
    /// Takes the page by value: its content is dropped as soon as the raw
    /// references are out, before any resolution happens.
    pub fn extract(&self, page: Page) -> (DiscoveryBatch, Vec<SkippedLink>) {
        let Page { address, content } = page;
        let references = self.parser.extract_hrefs(&content);
        drop(content);

        let mut batch = Vec::with_capacity(references.len());
        let mut skipped = Vec::new();

        for reference in references {
            match self.resolver.resolve(&address, &reference) {
                Ok(resolved) => batch.push(resolved),
                Err(error) => {
                    tracing::debug!("Skipping link {} on {}: {}", reference, address, error);
                    skipped.push(SkippedLink {
                        page: address.clone(),
                        reference,
                        error,
                    });
                }
            }
        }

        (batch, skipped)
    }

    /// Turns pages into batches until the page channel closes or `cancel` fires
    ///
    /// # Arguments
    ///
    /// * `pages` - Pages from the fetcher
    /// * `discoveries` - Channel to the visited tracker
    /// * `cancel` - Shutdown token shared by the pipeline stages
    ///
    /// # Returns
    ///
    /// Pages parsed, links emitted and references skipped over the stage's lifetime
    pub async fn run(
        self,
        mut pages: mpsc::Receiver<Page>,
        discoveries: mpsc::Sender<DiscoveryBatch>,
        cancel: CancellationToken,
    ) -> ExtractStats {
        let _guard = cancel.clone().drop_guard();
        let mut stats = ExtractStats::default();

        loop {
            let page = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                page = pages.recv() => match page {
                    Some(page) => page,
                    None => break,
                },
            };

            let address = page.address.clone();
            let (batch, skipped) = self.extract(page);
            tracing::debug!("Found {} links on {}", batch.len(), address);

            stats.pages += 1;
            stats.links += batch.len();
            stats.skipped.extend(skipped);

            // Always sent, even when empty: the tracker finishes the page's unit of work
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                sent = discoveries.send(batch) => {
                    if sent.is_err() {
                        break;
                    }
                }
            }
        }

        tracing::debug!("Extractor exiting after {} pages", stats.pages);
        stats
    }
}
