//! Configuration for the fetch client.

use crate::error::{FetchError, FetchResult};
use crate::lock::SingletonLock;
use std::time::Duration;

/// User agent sent on every request; the legacy archive blocks browser agents.
pub const LEGACY_USER_AGENT: &str = "Wget/1.21.1 (linux-gnu)";

/// Origins the mirror is allowed to contact.
const DEFAULT_ORIGINS: [&str; 5] = [
    "https://www.trle.net/",
    "https://trle.net/",
    "https://trcustoms.org/",
    "https://data.trcustoms.org/",
    "https://www.trlevel.de/",
];

/// Hosts known to omit their certificate chain.
const DEFAULT_CHAIN_OMITTING: [&str; 1] = ["www.trle.net"];

/// Configuration for fetch operations.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// Allowed origins and hosts needing trust bootstrap.
    pub origins: OriginPolicy,
    /// Retry configuration.
    pub retry: RetryPolicy,
    /// User agent header value.
    pub user_agent: String,
    /// Per-request timeout.
    pub timeout: Duration,
    /// Loopback port used as the singleton lock.
    pub lock_port: u16,
}

impl FetchConfig {
    /// Creates the default configuration.
    pub fn new() -> Self {
        Self {
            origins: OriginPolicy::default(),
            retry: RetryPolicy::default(),
            user_agent: LEGACY_USER_AGENT.to_string(),
            timeout: Duration::from_secs(30),
            lock_port: SingletonLock::DEFAULT_PORT,
        }
    }

    /// Sets the origin policy.
    pub fn with_origins(mut self, origins: OriginPolicy) -> Self {
        self.origins = origins;
        self
    }

    /// Sets the retry configuration.
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Sets the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the lock port.
    pub fn with_lock_port(mut self, port: u16) -> Self {
        self.lock_port = port;
        self
    }
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Configuration for retry behavior.
///
/// Attempts are spaced by a fixed delay; there is no backoff.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum number of attempts, including the first.
    pub max_attempts: u32,
    /// Delay before every attempt after the first.
    pub delay: Duration,
}

impl RetryPolicy {
    /// Creates a policy with the default 3 second delay.
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay: Duration::from_secs(3),
        }
    }

    /// Creates a policy with a single attempt.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            delay: Duration::ZERO,
        }
    }

    /// Sets the delay between attempts.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Calculates the delay before a given attempt (0-indexed).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            Duration::ZERO
        } else {
            self.delay
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3)
    }
}

/// Host and port of an allowed URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Origin {
    /// Host name, lowercase.
    pub host: String,
    /// TCP port.
    pub port: u16,
}

/// Origin allow-list plus the hosts that need a leaf-certificate bootstrap.
#[derive(Debug, Clone)]
pub struct OriginPolicy {
    allowed: Vec<String>,
    chain_omitting: Vec<String>,
}

impl OriginPolicy {
    /// Creates a policy allowing exactly the given origin prefixes.
    ///
    /// Prefixes are matched literally against the full URL, so they should end
    /// with `/`.
    pub fn new<I, S>(allowed: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            allowed: allowed.into_iter().map(Into::into).collect(),
            chain_omitting: Vec::new(),
        }
    }

    /// Flags a host as omitting its certificate chain.
    pub fn with_chain_omitting_host(mut self, host: impl Into<String>) -> Self {
        self.chain_omitting.push(host.into().to_ascii_lowercase());
        self
    }

    /// Returns the allowed origin prefixes.
    pub fn allowed(&self) -> &[String] {
        &self.allowed
    }

    /// Returns true if requests to `host` need a pinned leaf certificate.
    pub fn requires_bootstrap(&self, host: &str) -> bool {
        self.chain_omitting.iter().any(|h| h == host)
    }

    /// Checks `url` against the allow-list and returns its origin.
    pub fn check(&self, url: &str) -> FetchResult<Origin> {
        if !self.allowed.iter().any(|prefix| url.starts_with(prefix.as_str())) {
            return Err(FetchError::DisallowedOrigin {
                url: url.to_string(),
            });
        }
        parse_origin(url).ok_or_else(|| FetchError::DisallowedOrigin {
            url: url.to_string(),
        })
    }
}

impl Default for OriginPolicy {
    fn default() -> Self {
        DEFAULT_CHAIN_OMITTING.iter().fold(
            OriginPolicy::new(DEFAULT_ORIGINS),
            |policy, host| policy.with_chain_omitting_host(*host),
        )
    }
}

/// Splits an `https://` URL into host and port.
fn parse_origin(url: &str) -> Option<Origin> {
    let rest = url.strip_prefix("https://")?;
    let authority = rest.split(['/', '?', '#']).next()?;
    if authority.is_empty() || authority.contains('@') {
        return None;
    }
    let (host, port) = match authority.rsplit_once(':') {
        Some((host, port)) => (host, port.parse().ok()?),
        None => (authority, 443),
    };
    if host.is_empty() {
        return None;
    }
    Some(Origin {
        host: host.to_ascii_lowercase(),
        port,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fetch_config_builder() {
        let config = FetchConfig::new()
            .with_retry(RetryPolicy::no_retry())
            .with_timeout(Duration::from_secs(5))
            .with_lock_port(40000);

        assert_eq!(config.retry.max_attempts, 1);
        assert_eq!(config.timeout, Duration::from_secs(5));
        assert_eq!(config.lock_port, 40000);
        assert_eq!(config.user_agent, LEGACY_USER_AGENT);
    }

    #[test]
    fn retry_delay_is_fixed() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.delay_for_attempt(0), Duration::ZERO);
        assert_eq!(policy.delay_for_attempt(1), Duration::from_secs(3));
        assert_eq!(policy.delay_for_attempt(2), Duration::from_secs(3));
    }

    #[test]
    fn retry_never_below_one_attempt() {
        assert_eq!(RetryPolicy::new(0).max_attempts, 1);
    }

    #[test]
    fn default_policy_allows_known_origins() {
        let policy = OriginPolicy::default();
        let origin = policy
            .check("https://www.trle.net/pFind.php?idx=20")
            .unwrap();
        assert_eq!(origin.host, "www.trle.net");
        assert_eq!(origin.port, 443);
        assert!(policy.requires_bootstrap("www.trle.net"));
        assert!(!policy.requires_bootstrap("trcustoms.org"));
    }

    #[test]
    fn lookalike_origins_rejected() {
        let policy = OriginPolicy::default();
        for url in [
            "https://trcustoms.org.evil.example/",
            "http://www.trle.net/",
            "https://example.com/?https://trle.net/",
        ] {
            assert!(matches!(
                policy.check(url),
                Err(FetchError::DisallowedOrigin { .. })
            ));
        }
    }

    #[test]
    fn explicit_port_parsed() {
        let policy = OriginPolicy::new(["https://localhost:8443/"]);
        let origin = policy.check("https://localhost:8443/levels").unwrap();
        assert_eq!(origin.host, "localhost");
        assert_eq!(origin.port, 8443);
    }
}
