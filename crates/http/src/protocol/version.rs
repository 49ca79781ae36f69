//! Protocol version resolution.
//!
//! The request line carries the protocol as a raw token such as `HTTP/1.1`.
//! [`HttpVersionParser`] turns a token into a [`ProtocolVersion`], and
//! [`VersionCache`] memoizes any [`VersionProvider`] so that each distinct
//! token is parsed at most once for the lifetime of the cache, no matter how
//! many connections ask for it concurrently.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};

use once_cell::sync::OnceCell;
use thiserror::Error;

const PREFIX: &str = "HTTP/";

/// A structured `major.minor` protocol version.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProtocolVersion {
    major: u16,
    minor: u16,
}

impl ProtocolVersion {
    pub const HTTP_09: ProtocolVersion = ProtocolVersion::new(0, 9);
    pub const HTTP_10: ProtocolVersion = ProtocolVersion::new(1, 0);
    pub const HTTP_11: ProtocolVersion = ProtocolVersion::new(1, 1);
    pub const HTTP_2: ProtocolVersion = ProtocolVersion::new(2, 0);

    pub const fn new(major: u16, minor: u16) -> Self {
        Self { major, minor }
    }

    pub fn major(&self) -> u16 {
        self.major
    }

    pub fn minor(&self) -> u16 {
        self.minor
    }

    /// Maps onto the `http` crate's version type when there is a matching constant.
    pub fn to_http(&self) -> Option<http::Version> {
        match (self.major, self.minor) {
            (0, 9) => Some(http::Version::HTTP_09),
            (1, 0) => Some(http::Version::HTTP_10),
            (1, 1) => Some(http::Version::HTTP_11),
            (2, 0) => Some(http::Version::HTTP_2),
            (3, 0) => Some(http::Version::HTTP_3),
            _ => None,
        }
    }
}

impl fmt::Display for ProtocolVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("the protocol token has a wrong format: {token:?}")]
pub struct VersionError {
    token: String,
}

impl VersionError {
    pub fn new<S: Into<String>>(token: S) -> Self {
        Self { token: token.into() }
    }

    pub fn token(&self) -> &str {
        &self.token
    }
}

/// Resolves a raw protocol token into a [`ProtocolVersion`].
#[cfg_attr(test, mockall::automock)]
pub trait VersionProvider: Send + Sync {
    fn provide(&self, token: &str) -> Result<ProtocolVersion, VersionError>;
}

/// The plain, uncached token parser.
///
/// - an empty token is HTTP/0.9, the one-line protocol without a version
/// - `HTTP/x.y` is `x.y`, `HTTP/n` is `n.0`; the prefix is case-insensitive
/// - everything else is a [`VersionError`]
#[derive(Debug, Default, Clone, Copy)]
pub struct HttpVersionParser;

impl VersionProvider for HttpVersionParser {
    fn provide(&self, token: &str) -> Result<ProtocolVersion, VersionError> {
        if token.is_empty() {
            return Ok(ProtocolVersion::HTTP_09);
        }

        let rest = match token.get(..PREFIX.len()) {
            Some(prefix) if prefix.eq_ignore_ascii_case(PREFIX) => &token[PREFIX.len()..],
            _ => return Err(VersionError::new(token)),
        };

        let parsed = match rest.split_once('.') {
            Some((major, minor)) => parse_number(major).zip(parse_number(minor)),
            None => parse_number(rest).map(|major| (major, 0)),
        };

        parsed.map(|(major, minor)| ProtocolVersion::new(major, minor)).ok_or_else(|| VersionError::new(token))
    }
}

fn parse_number(digits: &str) -> Option<u16> {
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

type Slot = Arc<OnceCell<Result<ProtocolVersion, VersionError>>>;

/// A memoizing [`VersionProvider`] keyed by the case-folded token.
///
/// Failures are cached as well, so a broken token sent on every request does
/// not cost a parse each time. The map lock is only held long enough to find
/// or create the slot; the slot itself guarantees that the inner provider runs
/// once per key while concurrent callers for the same key wait for that result.
pub struct VersionCache<P = HttpVersionParser> {
    provider: P,
    slots: Mutex<HashMap<String, Slot>>,
}

impl<P> fmt::Debug for VersionCache<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let len = self.slots.lock().map(|slots| slots.len()).unwrap_or_default();
        f.debug_struct("VersionCache").field("cached", &len).finish()
    }
}

impl VersionCache<HttpVersionParser> {
    pub fn new() -> Self {
        Self::with_provider(HttpVersionParser)
    }
}

impl Default for VersionCache<HttpVersionParser> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P: VersionProvider> VersionCache<P> {
    pub fn with_provider(provider: P) -> Self {
        Self { provider, slots: Mutex::new(HashMap::new()) }
    }

    fn slot(&self, token: &str) -> Slot {
        let key = token.to_ascii_lowercase();
        // a poisoned map only means another caller panicked while inserting, the map itself is intact
        let mut slots = self.slots.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        Arc::clone(slots.entry(key).or_default())
    }
}

impl<P: VersionProvider> VersionProvider for VersionCache<P> {
    fn provide(&self, token: &str) -> Result<ProtocolVersion, VersionError> {
        let slot = self.slot(token);
        slot.get_or_init(|| self.provider.provide(token)).clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_known_tokens() {
        let parser = HttpVersionParser;
        assert_eq!(parser.provide("").unwrap(), ProtocolVersion::HTTP_09);
        assert_eq!(parser.provide("HTTP/1.0").unwrap(), ProtocolVersion::HTTP_10);
        assert_eq!(parser.provide("HTTP/1.1").unwrap(), ProtocolVersion::HTTP_11);
        assert_eq!(parser.provide("HTTP/2").unwrap(), ProtocolVersion::HTTP_2);
    }

    #[test]
    fn test_prefix_is_case_insensitive() {
        assert_eq!(HttpVersionParser.provide("http/1.1").unwrap(), ProtocolVersion::HTTP_11);
    }

    #[test]
    fn test_invalid_tokens() {
        for token in ["HTTP1.1", "Hello World", "HTTP/", "HTTP/x.1", "HTTP/1.", "HTTP/1.1.1", "FTP/1.1", "HTTP/ 1.1"] {
            let result = HttpVersionParser.provide(token);
            assert_eq!(result, Err(VersionError::new(token)), "token {token:?}");
        }
    }

    #[test]
    fn test_to_http() {
        assert_eq!(ProtocolVersion::HTTP_11.to_http(), Some(http::Version::HTTP_11));
        assert_eq!(ProtocolVersion::new(4, 2).to_http(), None);
    }

    #[test]
    fn test_cache_calls_provider_with_token() {
        let mut mock = MockVersionProvider::new();
        mock.expect_provide()
            .withf(|token| token == "Hello World")
            .times(1)
            .returning(|_| Ok(ProtocolVersion::HTTP_11));

        let cache = VersionCache::with_provider(mock);
        assert_eq!(cache.provide("Hello World").unwrap(), ProtocolVersion::HTTP_11);
    }

    #[test]
    fn test_cache_calls_provider_once() {
        let mut mock = MockVersionProvider::new();
        mock.expect_provide().times(1).returning(|_| Ok(ProtocolVersion::HTTP_10));

        let cache = VersionCache::with_provider(mock);
        for _ in 0..3 {
            assert_eq!(cache.provide("HTTP/1.0").unwrap(), ProtocolVersion::HTTP_10);
        }
        // same token with a different case shares the slot
        assert_eq!(cache.provide("http/1.0").unwrap(), ProtocolVersion::HTTP_10);
    }

    #[test]
    fn test_cache_keeps_errors() {
        let mut mock = MockVersionProvider::new();
        mock.expect_provide().times(1).returning(|token| Err(VersionError::new(token)));

        let cache = VersionCache::with_provider(mock);
        assert!(cache.provide("nope").is_err());
        assert!(cache.provide("nope").is_err());
    }

    struct SlowCounting {
        calls: AtomicUsize,
    }

    impl VersionProvider for SlowCounting {
        fn provide(&self, token: &str) -> Result<ProtocolVersion, VersionError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            thread::sleep(Duration::from_millis(20));
            HttpVersionParser.provide(token)
        }
    }

    #[test]
    fn test_cache_single_computation_under_concurrency() {
        let cache = Arc::new(VersionCache::with_provider(SlowCounting { calls: AtomicUsize::new(0) }));

        let handles = (0..16)
            .map(|i| {
                let cache = Arc::clone(&cache);
                let token = if i % 2 == 0 { "HTTP/1.1" } else { "HTTP/2" };
                thread::spawn(move || cache.provide(token).unwrap())
            })
            .collect::<Vec<_>>();

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(cache.provider.calls.load(Ordering::SeqCst), 2);
    }
}
