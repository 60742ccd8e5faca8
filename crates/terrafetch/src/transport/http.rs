//! HTTP GET with retry, backoff and cancellation.

use std::time::{Duration, Instant};

use reqwest::{
    StatusCode,
    header::{CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue, USER_AGENT},
};

use crate::{
    config::{FetcherConfig, RetryPolicy},
    content::{Content, infer_from_data, infer_from_extension},
    error::{Error, Result},
    io::IoOptions,
    transport::Fetched,
};

/// A URL split into the parts a request is built from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct HttpTarget<'a> {
    /// `scheme://host[:port]`.
    pub authority: &'a str,
    /// Path, empty when the URL has none.
    pub path: &'a str,
    /// Raw query text after `?`.
    pub query: Option<&'a str>,
}

impl HttpTarget<'_> {
    /// The URL actually requested; fragments are never sent and query
    /// parameters are re-encoded.
    pub(crate) fn request_url(&self) -> String {
        let path = if self.path.is_empty() { "/" } else { self.path };
        match self.query.map(encode_query) {
            Some(query) if !query.is_empty() => format!("{}{path}?{query}", self.authority),
            _ => format!("{}{path}", self.authority),
        }
    }
}

/// Split a query into `name=value` parameters and percent-encode each part,
/// decoding it first so already-encoded text is not encoded twice.
pub(crate) fn encode_query(query: &str) -> String {
    let encode = |part: &str| match urlencoding::decode(part) {
        Ok(decoded) => urlencoding::encode(&decoded).into_owned(),
        Err(_) => part.to_string(),
    };

    query
        .split('&')
        .filter(|param| !param.is_empty())
        .map(|param| match param.split_once('=') {
            Some((name, value)) => format!("{}={}", encode(name), encode(value)),
            None => encode(param),
        })
        .collect::<Vec<_>>()
        .join("&")
}

pub(crate) fn split_url(url: &str) -> Result<HttpTarget<'_>> {
    let invalid = |detail: &str| Error::Configuration {
        context: "url",
        detail: format!("{detail} in '{url}'"),
    };

    let host_start = url.find("://").ok_or_else(|| invalid("missing scheme separator"))? + 3;
    let url = url.split('#').next().unwrap_or(url);
    let host_end = url[host_start..]
        .find(['/', '?'])
        .map_or(url.len(), |i| host_start + i);
    if host_end == host_start {
        return Err(invalid("missing host"));
    }

    let (authority, rest) = url.split_at(host_end);
    let (path, query) = match rest.split_once('?') {
        Some((path, query)) => (path, Some(query)),
        None => (rest, None),
    };
    Ok(HttpTarget {
        authority,
        path,
        query,
    })
}

/// Content type from the response header, else the URL path's extension,
/// else the payload's magic bytes.
pub(crate) fn resolve_content_type(headers: &HeaderMap, path: &str, data: &[u8]) -> String {
    let from_header = headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    if !from_header.is_empty() {
        return from_header.to_string();
    }

    let from_extension = infer_from_extension(path);
    if !from_extension.is_empty() {
        return from_extension;
    }

    infer_from_data(data)
}

/// Failures of the connection itself: refused, reset, closed before a
/// response, or timed out. Builder and redirect errors are not included.
fn is_connection_failure(e: &reqwest::Error) -> bool {
    e.is_connect() || e.is_timeout() || e.is_request()
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// The network half of the transport layer.
#[derive(Debug, Clone)]
pub(crate) struct HttpTransport {
    client: reqwest::Client,
    user_agent: String,
    retry: RetryPolicy,
    http_debug: bool,
}

impl HttpTransport {
    /// Build a client honoring the proxy, TLS and timeout settings.
    pub(crate) fn new(config: &FetcherConfig) -> Result<Self> {
        let client_error = |e: reqwest::Error| Error::Configuration {
            context: "http client",
            detail: e.to_string(),
        };

        let mut builder = reqwest::Client::builder();

        #[cfg(feature = "rustls-tls")]
        if config.accept_invalid_certs {
            builder = builder.danger_accept_invalid_certs(true);
        }

        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }

        if let Some(settings) = &config.proxy {
            let mut proxy = reqwest::Proxy::all(settings.url()).map_err(client_error)?;
            if let Some(username) = &settings.username {
                proxy = proxy.basic_auth(username, settings.password.as_deref().unwrap_or(""));
            }
            builder = builder.proxy(proxy);
        }

        Ok(Self::with_client(builder.build().map_err(client_error)?, config))
    }

    /// A default `reqwest` client; proxy, TLS and timeout settings are ignored.
    pub(crate) fn plain(config: &FetcherConfig) -> Self {
        Self::with_client(reqwest::Client::new(), config)
    }

    /// Use an existing client; only the non-client settings of `config` apply.
    pub(crate) fn with_client(client: reqwest::Client, config: &FetcherConfig) -> Self {
        Self {
            client,
            user_agent: config.user_agent.clone(),
            retry: config.retry,
            http_debug: config.http_debug,
        }
    }

    fn build_headers(&self, headers: &[(String, String)]) -> Result<HeaderMap> {
        let invalid = |detail: String| Error::Configuration {
            context: "header",
            detail,
        };

        let mut map = HeaderMap::new();
        for (name, value) in headers {
            let header_name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| invalid(format!("{name}: {e}")))?;
            let header_value =
                HeaderValue::from_str(value).map_err(|e| invalid(format!("{name}: {e}")))?;
            map.append(header_name, header_value);
        }

        if !map.contains_key(USER_AGENT) {
            let agent = HeaderValue::from_str(&self.user_agent)
                .map_err(|e| invalid(format!("user agent: {e}")))?;
            map.insert(USER_AGENT, agent);
        }
        Ok(map)
    }

    /// Fetch `url`, retrying rate-limited responses and failed connections.
    pub(crate) async fn get(
        &self,
        url: &str,
        headers: &[(String, String)],
        io: &IoOptions,
    ) -> Result<Fetched> {
        let target = split_url(url)?;
        let request_url = target.request_url();
        let headers = self.build_headers(headers)?;

        let mut attempts_left = io.effective_attempts();
        let mut rate_limited: u32 = 0;

        loop {
            if io.canceled() {
                tracing::debug!(url, "canceled before request");
                return Ok(Fetched::Canceled);
            }

            tracing::debug!(url, "fetching");
            let started = Instant::now();
            let result = self
                .client
                .get(&request_url)
                .headers(headers.clone())
                .send()
                .await;
            let elapsed_ms = millis(started.elapsed());

            let response = match result {
                Ok(response) => response,
                Err(e) if is_connection_failure(&e) => {
                    if self.http_debug {
                        tracing::info!(url, elapsed_ms, error = %e, "(---) HTTP GET");
                    }
                    attempts_left -= 1;
                    if attempts_left > 0 {
                        tracing::info!(url, error = %e, "connection failed; retrying");
                        tokio::time::sleep(self.retry.connect_retry_delay).await;
                        continue;
                    }
                    return Err(Error::service_unavailable(format!("{url}: {e}")));
                }
                Err(e) => return Err(Error::general(url, e.to_string())),
            };

            let status = response.status();
            if self.http_debug {
                let content_type = response
                    .headers()
                    .get(CONTENT_TYPE)
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or("unknown");
                tracing::info!(
                    status = status.as_u16(),
                    url,
                    elapsed_ms,
                    bytes = response.content_length(),
                    content_type,
                    "HTTP GET"
                );
            }

            match status {
                StatusCode::OK => {}
                StatusCode::NOT_FOUND => {
                    return Err(Error::resource_unavailable(url, status.to_string()));
                }
                StatusCode::TOO_MANY_REQUESTS => {
                    attempts_left -= 1;
                    if attempts_left > 0 {
                        let delay = self
                            .retry
                            .rate_limit_delay(rate_limited, rand::random::<f64>());
                        rate_limited += 1;
                        tracing::debug!(
                            authority = target.authority,
                            delay_ms = millis(delay),
                            "rate limited; retrying"
                        );
                        if !io.canceled() {
                            tokio::time::sleep(delay).await;
                        }
                        continue;
                    }
                    tracing::info!(url, "retries exhausted");
                    return Err(Error::resource_unavailable(url, status.to_string()));
                }
                other => return Err(Error::general(url, other.to_string())),
            }

            let response_headers = response.headers().clone();
            let data = response
                .bytes()
                .await
                .map_err(|e| Error::general(url, e.to_string()))?;

            let content_type = resolve_content_type(&response_headers, target.path, &data);
            return Ok(Fetched::Content(Content::new(content_type, data.to_vec())));
        }
    }
}
