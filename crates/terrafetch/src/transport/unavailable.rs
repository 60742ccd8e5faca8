//! Stand-in used when the crate is built without the `http` feature.

use crate::{
    config::FetcherConfig,
    error::{Error, Result},
    io::IoOptions,
    transport::Fetched,
};

/// HTTP transport that is not compiled in.
#[derive(Debug, Clone, Default)]
pub(crate) struct HttpTransport;

impl HttpTransport {
    #[allow(clippy::unnecessary_wraps)]
    pub(crate) fn new(_config: &FetcherConfig) -> Result<Self> {
        Ok(Self)
    }

    pub(crate) fn plain(_config: &FetcherConfig) -> Self {
        Self
    }

    #[allow(clippy::unused_async)]
    pub(crate) async fn get(
        &self,
        url: &str,
        _headers: &[(String, String)],
        _io: &IoOptions,
    ) -> Result<Fetched> {
        Err(Error::service_unavailable(format!(
            "cannot fetch {url}: built without HTTP support"
        )))
    }
}
