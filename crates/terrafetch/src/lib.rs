//! Resolution, de-duplicated fetching and caching of map and imagery
//! resources.
//!
//! This crate turns logical resource references (local paths, relative
//! references, or HTTP URLs with optional mirror-rotation syntax) into bytes.
//! Remote reads retry rate-limited and failed requests with backoff, concurrent
//! reads of the same resource are collapsed into one transport call, and
//! results are kept in a pluggable content cache governed by a freshness
//! policy.
//!
//! # Design principles
//!
//! - **Async**: Reads return futures and suspend rather than block
//! - **One fetch per key**: A per-key gate serializes reads of a resource
//! - **Typed failures**: Every failure is an [`Error`] with an [`ErrorKind`];
//!   cancellation is an empty success
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use terrafetch::{Fetcher, IoOptions, MemoryContentCache, Uri, UriContext};
//!
//! let fetcher = Fetcher::new();
//! let io = IoOptions::new().with_cache(Arc::new(MemoryContentCache::new()));
//!
//! let uri = Uri::with_context(
//!     "3/2/1.png",
//!     UriContext::with_referrer("https://[abc].tiles.example.com/layer.json"),
//! );
//! let content = fetcher.read(&uri, &io).await?;
//! ```

pub mod cache;
pub mod config;
mod content;
mod error;
mod fetcher;
pub mod gate;
mod io;
pub mod policy;
mod transport;
pub mod uri;

pub use cache::{CacheEntry, CacheStats, ContentCache, MemoryContentCache};
pub use config::{FetcherConfig, ProxySettings, RetryPolicy};
pub use content::Content;
pub use error::{Error, ErrorKind, Result};
pub use fetcher::Fetcher;
pub use gate::{Gate, GateToken};
pub use io::{
    CancelToken, Cancelable, DEFAULT_MAX_NETWORK_ATTEMPTS, Image, ImageReader, IoOptions,
    Services, UnavailableImageReader,
};
pub use policy::{CachePolicy, CacheUsage};
pub use uri::{Uri, UriContext, UriKind};

/// Whether remote reads over HTTPS are compiled in.
#[must_use]
pub const fn supports_https() -> bool {
    cfg!(feature = "rustls-tls")
}
