//! Per-request I/O context and collaborating services.

use std::{
    collections::HashMap,
    fmt,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};

use crate::{
    cache::ContentCache,
    error::{Error, Result},
    policy::CachePolicy,
};

/// Default number of network attempts per read.
pub const DEFAULT_MAX_NETWORK_ATTEMPTS: u32 = 4;

/// Something that can report that its work was abandoned.
///
/// Cancellation is advisory: fetches poll it between attempts and never
/// interrupt a request in flight.
pub trait Cancelable: Send + Sync {
    /// Whether the operation was canceled.
    fn canceled(&self) -> bool;
}

/// A shareable cancellation flag.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    /// Create a token that is not canceled.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Signal cancellation to every clone of this token.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Release);
    }
}

impl Cancelable for CancelToken {
    fn canceled(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }
}

/// A decoded raster image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Image {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Pixel data, layout defined by the reader.
    pub data: Vec<u8>,
}

/// Image decoding capability supplied by the host application.
pub trait ImageReader: Send + Sync {
    /// Open and decode an image directly from a location.
    fn read_image_from_uri(&self, location: &str, io: &IoOptions) -> Result<Image>;

    /// Decode an image from fetched bytes.
    fn read_image_from_stream(
        &self,
        data: &[u8],
        content_type: &str,
        io: &IoOptions,
    ) -> Result<Image>;
}

/// Image reader used when none is configured; every call fails with
/// `ServiceUnavailable`.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnavailableImageReader;

impl ImageReader for UnavailableImageReader {
    fn read_image_from_uri(&self, _location: &str, _io: &IoOptions) -> Result<Image> {
        Err(Error::service_unavailable("no image reader configured"))
    }

    fn read_image_from_stream(
        &self,
        _data: &[u8],
        _content_type: &str,
        _io: &IoOptions,
    ) -> Result<Image> {
        Err(Error::service_unavailable("no image reader configured"))
    }
}

/// Services available to a read.
#[derive(Clone)]
pub struct Services {
    /// Cache consulted before and populated after each fetch.
    pub content_cache: Option<Arc<dyn ContentCache>>,
    /// Image decoding.
    pub image_reader: Arc<dyn ImageReader>,
}

impl Default for Services {
    fn default() -> Self {
        Self {
            content_cache: None,
            image_reader: Arc::new(UnavailableImageReader),
        }
    }
}

impl fmt::Debug for Services {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Services")
            .field("content_cache", &self.content_cache.is_some())
            .finish_non_exhaustive()
    }
}

/// Options carried through a read.
#[derive(Clone)]
pub struct IoOptions {
    /// Collaborating services.
    pub services: Services,
    /// Referrer used to resolve relative locations passed as plain strings.
    pub referrer: String,
    /// Maximum network attempts per read; values below 1 behave as 1.
    pub max_network_attempts: u32,
    /// How the content cache may be used.
    pub cache_policy: CachePolicy,
    properties: HashMap<String, String>,
    cancel: Option<Arc<dyn Cancelable>>,
}

impl Default for IoOptions {
    fn default() -> Self {
        Self {
            services: Services::default(),
            referrer: String::new(),
            max_network_attempts: DEFAULT_MAX_NETWORK_ATTEMPTS,
            cache_policy: CachePolicy::DEFAULT,
            properties: HashMap::new(),
            cancel: None,
        }
    }
}

impl fmt::Debug for IoOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IoOptions")
            .field("services", &self.services)
            .field("referrer", &self.referrer)
            .field("max_network_attempts", &self.max_network_attempts)
            .field("cache_policy", &self.cache_policy)
            .field("properties", &self.properties)
            .field("cancelable", &self.cancel.is_some())
            .finish()
    }
}

impl IoOptions {
    /// Create options with default services and limits.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Use `cache` as the content cache.
    #[must_use]
    pub fn with_cache(mut self, cache: Arc<dyn ContentCache>) -> Self {
        self.services.content_cache = Some(cache);
        self
    }

    /// Use `reader` for image decoding.
    #[must_use]
    pub fn with_image_reader(mut self, reader: Arc<dyn ImageReader>) -> Self {
        self.services.image_reader = reader;
        self
    }

    /// Poll `cancel` for cancellation.
    #[must_use]
    pub fn with_cancel(mut self, cancel: Arc<dyn Cancelable>) -> Self {
        self.cancel = Some(cancel);
        self
    }

    /// Set the referrer.
    #[must_use]
    pub fn with_referrer(mut self, referrer: impl Into<String>) -> Self {
        self.referrer = referrer.into();
        self
    }

    /// Set the maximum number of network attempts.
    #[must_use]
    pub fn with_max_network_attempts(mut self, attempts: u32) -> Self {
        self.max_network_attempts = attempts;
        self
    }

    /// Set the cache policy.
    #[must_use]
    pub fn with_cache_policy(mut self, policy: CachePolicy) -> Self {
        self.cache_policy = policy;
        self
    }

    /// Whether the current operation was canceled.
    #[must_use]
    pub fn canceled(&self) -> bool {
        self.cancel.as_ref().is_some_and(|c| c.canceled())
    }

    /// A request-scoped property, or an empty string when unset.
    #[must_use]
    pub fn property(&self, name: &str) -> &str {
        self.properties.get(name).map_or("", String::as_str)
    }

    /// Set a request-scoped property.
    pub fn set_property(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.properties.insert(name.into(), value.into());
    }

    pub(crate) fn effective_attempts(&self) -> u32 {
        self.max_network_attempts.max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancel_token_shared() {
        let token = CancelToken::new();
        let io = IoOptions::new().with_cancel(Arc::new(token.clone()));
        assert!(!io.canceled());

        token.cancel();
        assert!(io.canceled());
        assert!(io.clone().canceled());
    }

    #[test]
    fn test_properties() {
        let mut io = IoOptions::new();
        assert_eq!(io.property("layer"), "");
        io.set_property("layer", "imagery");
        assert_eq!(io.property("layer"), "imagery");
    }

    #[test]
    fn test_attempts_floor() {
        let io = IoOptions::new().with_max_network_attempts(0);
        assert_eq!(io.effective_attempts(), 1);
        assert_eq!(IoOptions::new().effective_attempts(), 4);
    }

    #[test]
    fn test_default_services_unavailable() {
        let io = IoOptions::new();
        assert!(io.services.content_cache.is_none());

        let err = io
            .services
            .image_reader
            .read_image_from_uri("/tiles/a.png", &io)
            .unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::ServiceUnavailable);

        let err = io
            .services
            .image_reader
            .read_image_from_stream(&[0], "png", &io)
            .unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::ServiceUnavailable);
    }
}
