//! Output module for reporting crawl results
//!
//! Nothing is persisted; a finished run is summarized as a [`CrawlReport`]
//! that callers can inspect or print.

mod stats;

pub use stats::{print_report, CrawlOutcome, CrawlReport};
