use crate::url::AddressResolver;
use crate::{Address, UrlError};
use url::{ParseError, Url};

/// Resolves references by gluing them onto the page address
///
/// # Resolution Rules
///
/// 1. A reference that parses as an absolute URI is returned unchanged,
///    apart from leading and trailing spaces and control characters
/// 2. Anything relative is appended to the page address, minus one leading `/`
/// 3. A reference that is malformed for any other reason is an error
///
/// This does not follow RFC 3986: `../`, scheme-relative references and
/// query-only references all come out wrong. Use [`StandardResolver`] when
/// correct resolution matters more than matching the historical behavior.
///
/// # Examples
///
/// ```
/// use ripple_loop::url::{AddressResolver, PrefixResolver};
///
/// let resolver = PrefixResolver;
/// assert_eq!(resolver.resolve("http://a/", "b").unwrap(), "http://a/b");
/// assert_eq!(resolver.resolve("http://a/", "/b").unwrap(), "http://a/b");
/// assert_eq!(resolver.resolve("http://a/", "http://c/").unwrap(), "http://c/");
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct PrefixResolver;

impl AddressResolver for PrefixResolver {
    fn resolve(&self, page: &str, reference: &str) -> Result<Address, UrlError> {
        // Same trimming `Url::parse` applies, so " http://a/ " and "http://a/" are one address
        let reference = reference.trim_matches(|c: char| c <= ' ');

        match Url::parse(reference) {
            Ok(_) => Ok(reference.to_string()),
            Err(ParseError::RelativeUrlWithoutBase) => {
                let relative = reference.strip_prefix('/').unwrap_or(reference);
                Ok(format!("{}{}", page, relative))
            }
            Err(e) => Err(UrlError::Parse(format!("'{}': {}", reference, e))),
        }
    }
}

/// Resolves references with `Url::join`, as a browser would
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardResolver;

impl AddressResolver for StandardResolver {
    fn resolve(&self, page: &str, reference: &str) -> Result<Address, UrlError> {
        let base = Url::parse(page).map_err(|_| UrlError::Unresolvable {
            base: page.to_string(),
            reference: reference.to_string(),
        })?;

        base.join(reference)
            .map(String::from)
            .map_err(|e| UrlError::Parse(format!("'{}': {}", reference, e)))
    }
}
