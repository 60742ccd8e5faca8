//! Fetch strategies: local files and HTTP servers.

#[cfg(feature = "http")]
mod http;
mod local;
#[cfg(not(feature = "http"))]
mod unavailable;

#[cfg(feature = "http")]
pub(crate) use http::HttpTransport;
pub(crate) use local::read_local;
#[cfg(not(feature = "http"))]
pub(crate) use unavailable::HttpTransport;

use crate::content::Content;

/// A transport call that did not fail.
#[derive(Debug)]
pub(crate) enum Fetched {
    /// The payload was retrieved.
    Content(Content),
    /// Cancellation was observed before an attempt was made.
    Canceled,
}
