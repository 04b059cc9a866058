//! Address resolution for Ripple-Loop
//!
//! Links found on a page are raw references; this module turns them into
//! addresses the visited tracker can compare.

mod resolve;

use crate::config::ResolverKind;
use crate::{Address, UrlError};
use std::sync::Arc;

pub use resolve::{PrefixResolver, StandardResolver};

/// Turns a raw link reference into an address, relative to the page it was found on
pub trait AddressResolver: Send + Sync {
    /// Resolves `reference` against `page`
    ///
    /// An error means this one reference is skipped; the rest of the page is kept.
    fn resolve(&self, page: &str, reference: &str) -> Result<Address, UrlError>;
}

/// Builds the resolver selected in the configuration
pub fn resolver_for(kind: ResolverKind) -> Arc<dyn AddressResolver> {
    match kind {
        ResolverKind::Prefix => Arc::new(PrefixResolver),
        ResolverKind::Standard => Arc::new(StandardResolver),
    }
}
