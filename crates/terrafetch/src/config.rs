//! Fetcher configuration.

use std::{ffi::OsString, time::Duration};

use serde::{Deserialize, Serialize};

/// Environment variable that turns on verbose transport logging.
pub const HTTP_DEBUG_ENV: &str = "TERRAFETCH_HTTP_DEBUG";

/// `User-Agent` sent when the caller does not supply one.
pub const DEFAULT_USER_AGENT: &str = concat!("terrafetch/", env!("CARGO_PKG_VERSION"));

/// Delays applied between network attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Base of the exponential delay after a `429 Too Many Requests`.
    pub rate_limit_base_delay: Duration,
    /// Fixed delay after a connection failure.
    pub connect_retry_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            rate_limit_base_delay: Duration::from_secs(1),
            connect_retry_delay: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    /// Delay before the retry following the `retry_index`-th rate-limited
    /// response (counting from 0).
    ///
    /// `jitter` is expected in `[0, 1)`; the delay lies in
    /// `[base * 2^n, base * 2^(n+1))`, so successive delays strictly increase
    /// whatever the jitter.
    #[must_use]
    pub fn rate_limit_delay(&self, retry_index: u32, jitter: f64) -> Duration {
        let exponent = f64::from(retry_index) + jitter.clamp(0.0, 1.0);
        let secs = self.rate_limit_base_delay.as_secs_f64() * exponent.exp2();
        Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX)
    }
}

/// Proxy server used for remote reads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProxySettings {
    /// Proxy host name.
    pub host: String,
    /// Proxy port.
    pub port: u16,
    /// Optional user name for basic authentication.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    /// Optional password for basic authentication.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

impl ProxySettings {
    /// The proxy URL, `http://host:port`.
    #[must_use]
    pub fn url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }
}

/// Settings for a [`Fetcher`](crate::Fetcher).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetcherConfig {
    /// `User-Agent` header used when a request does not carry one.
    pub user_agent: String,
    /// Delays between attempts.
    pub retry: RetryPolicy,
    /// Log timing, status and size of every request at `info` level.
    pub http_debug: bool,
    /// Skip TLS certificate verification.
    pub accept_invalid_certs: bool,
    /// Route remote reads through a proxy.
    pub proxy: Option<ProxySettings>,
    /// Per-request timeout.
    pub timeout: Option<Duration>,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_string(),
            retry: RetryPolicy::default(),
            http_debug: false,
            accept_invalid_certs: false,
            proxy: None,
            timeout: None,
        }
    }
}

impl FetcherConfig {
    /// Defaults, with `http_debug` taken from [`HTTP_DEBUG_ENV`].
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            http_debug: flag_enabled(std::env::var_os(HTTP_DEBUG_ENV)),
            ..Self::default()
        }
    }
}

/// A flag variable is on when present and non-empty.
fn flag_enabled(value: Option<OsString>) -> bool {
    value.is_some_and(|v| !v.is_empty())
}
