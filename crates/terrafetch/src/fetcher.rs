//! The fetch orchestrator.
//!
//! A [`Fetcher`] composes the gate, the content cache and the transports:
//! one read of a key at a time, served from the cache when possible, fetched
//! and stored otherwise.

use std::sync::atomic::{AtomicUsize, Ordering};

use crate::{
    cache::CacheStats,
    config::FetcherConfig,
    content::Content,
    error::{Error, Result},
    gate::Gate,
    io::{Image, IoOptions},
    transport::{Fetched, HttpTransport, read_local},
    uri::{Uri, UriContext, UriKind},
};

/// Reads resources from local files and HTTP servers.
///
/// The fetcher is cheap to share behind an `Arc`; every method takes `&self`
/// and may be called from many tasks at once. Concurrent reads of the same
/// resolved reference are serialized, so with a cache configured only the
/// first performs a transport call.
///
/// # Example
///
/// ```ignore
/// let fetcher = Fetcher::new();
/// let io = IoOptions::new().with_cache(Arc::new(MemoryContentCache::new()));
/// let content = fetcher.read(&Uri::new("https://tiles.example.com/0/0/0.png"), &io).await?;
/// ```
#[derive(Debug)]
pub struct Fetcher {
    http: HttpTransport,
    config: FetcherConfig,
    gate: Gate,
    rotation: AtomicUsize,
    stats: CacheStats,
}

impl Fetcher {
    /// Create a fetcher configured from the environment, with a default HTTP
    /// client.
    #[must_use]
    pub fn new() -> Self {
        let config = FetcherConfig::from_env();
        Self::from_parts(HttpTransport::plain(&config), config)
    }

    /// Create a fetcher whose HTTP client honors the proxy, TLS and timeout
    /// settings of `config`.
    pub fn with_config(config: FetcherConfig) -> Result<Self> {
        Ok(Self::from_parts(HttpTransport::new(&config)?, config))
    }

    /// Create a fetcher around an existing HTTP client.
    #[cfg(feature = "http")]
    #[must_use]
    pub fn with_http_and_config(http: reqwest::Client, config: FetcherConfig) -> Self {
        Self::from_parts(HttpTransport::with_client(http, &config), config)
    }

    fn from_parts(http: HttpTransport, config: FetcherConfig) -> Self {
        Self {
            http,
            config,
            gate: Gate::new(),
            rotation: AtomicUsize::new(0),
            stats: CacheStats::default(),
        }
    }

    /// The configuration in use.
    #[must_use]
    pub fn config(&self) -> &FetcherConfig {
        &self.config
    }

    /// Cache lookup counters accumulated across all reads.
    #[must_use]
    pub fn stats(&self) -> &CacheStats {
        &self.stats
    }

    /// The gate serializing reads by key.
    #[must_use]
    pub fn gate(&self) -> &Gate {
        &self.gate
    }

    /// Read the content behind `uri`.
    ///
    /// A read that observes cancellation before its first network attempt
    /// returns empty content rather than an error.
    pub async fn read(&self, uri: &Uri, io: &IoOptions) -> Result<Content> {
        match self.fetch(uri, io).await? {
            Fetched::Content(content) => Ok(content),
            Fetched::Canceled => Ok(Content::empty()),
        }
    }

    /// Resolve `location` against `io.referrer`, then read it.
    pub async fn read_location(&self, location: &str, io: &IoOptions) -> Result<Content> {
        let uri = Uri::with_context(location, UriContext::with_referrer(io.referrer.clone()));
        self.read(&uri, io).await
    }

    /// Read `uri` and decode it with the configured image reader.
    ///
    /// Returns `Ok(None)` when the read was canceled.
    pub async fn read_image(&self, uri: &Uri, io: &IoOptions) -> Result<Option<Image>> {
        match self.fetch(uri, io).await? {
            Fetched::Content(content) => io
                .services
                .image_reader
                .read_image_from_stream(content.data(), content.content_type(), io)
                .map(Some),
            Fetched::Canceled => Ok(None),
        }
    }

    async fn fetch(&self, uri: &Uri, io: &IoOptions) -> Result<Fetched> {
        let key = uri.full();
        let _token = self.gate.acquire(key).await;

        let policy = io.cache_policy;
        let cache = io.services.content_cache.as_ref();

        if let Some(cache) = cache.filter(|_| policy.is_cache_readable()) {
            let entry = match cache.get(key).await {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::warn!(key, error = %e, "cache lookup failed");
                    None
                }
            };
            self.stats.record(entry.is_some());

            if let Some(entry) = entry {
                if self.config.http_debug {
                    tracing::info!(
                        key,
                        hit_ratio = self.stats.hit_ratio(),
                        "cache hit"
                    );
                } else {
                    tracing::debug!(key, "cache hit");
                }
                return Ok(Fetched::Content(entry.content));
            }
        }

        if policy.is_cache_only() {
            return Err(Error::resource_unavailable(
                key,
                "not in cache and cache-only policy is set",
            ));
        }

        let fetched = match uri.kind() {
            UriKind::Local => Fetched::Content(read_local(key).await?),
            UriKind::Remote => {
                let url = match uri.rotation() {
                    Some(_) => uri.rotated(self.rotation.fetch_add(1, Ordering::Relaxed)),
                    None => key.to_string(),
                };
                self.http.get(&url, &uri.context().headers, io).await?
            }
            UriKind::Unrecognized => {
                return Err(Error::resource_unavailable(
                    key,
                    format!("cannot open \"{key}\""),
                ));
            }
        };

        if policy.is_cache_writeable()
            && let (Some(cache), Fetched::Content(content)) = (cache, &fetched)
        {
            if let Err(e) = cache.put(key, content.clone()).await {
                tracing::warn!(key, error = %e, "failed to cache content");
            }
        }

        Ok(fetched)
    }
}

impl Default for Fetcher {
    fn default() -> Self {
        Self::new()
    }
}
