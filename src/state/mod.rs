//! State module for tracking crawl progress
//!
//! # Components
//!
//! - `CrawlPhase`: lifecycle of one run (running, draining, terminated)
//! - `PhaseTracker`: publishes phase changes over a watch channel
//! - `InFlight`: counts outstanding work so the run can tell when it is done

mod in_flight;
mod phase;

// Re-export main types
pub use in_flight::InFlight;
pub use phase::{CrawlPhase, PhaseTracker};
