//! The HTTP transport used by the request executor.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};

use crate::context::Timeout;
use crate::error::{Error, Result};

/// Identifies this client to the remote API.
pub const USER_AGENT: &str = concat!("GeoApiClientRust/", env!("GEOAPI_VERSION"));

/// Query parameters whose values never reach the logs.
const REDACTED_PARAMS: [&str; 2] = ["key", "signature"];

/// Returns `url` with the values of credential-bearing query params masked.
fn redact_url(url: &str) -> String {
    let Some((base, query)) = url.split_once('?') else {
        return url.to_string();
    };

    let query = query
        .split('&')
        .map(|pair| match pair.split_once('=') {
            Some((name, _)) if REDACTED_PARAMS.contains(&name) => format!("{}=*********", name),
            _ => pair.to_string(),
        })
        .collect::<Vec<_>>()
        .join("&");

    format!("{}?{}", base, query)
}

/// A client that cannot be built is a setup problem, not a network failure.
fn build_error(e: reqwest::Error) -> Error {
    Error::Configuration(format!("failed to build HTTP client: {}", e))
}

/// Status and raw body of a completed HTTP exchange.
#[derive(Debug, Clone)]
pub struct TransportResponse {
    pub status: StatusCode,
    pub body: Vec<u8>,
}

impl TransportResponse {
    pub fn new(status: StatusCode, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Transport: Send + Sync {
    /// Performs a single GET. Any status is a successful exchange; only
    /// connection level failures are errors.
    async fn get(&self, url: &str) -> Result<TransportResponse>;
}

/// reqwest-backed transport. TLS certificates are always verified.
#[derive(Clone)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    /// Builds a client applying `timeout` to every request.
    pub fn new(timeout: Timeout) -> Result<Self> {
        let builder = Client::builder().user_agent(USER_AGENT);
        let builder = match timeout {
            Timeout::Unbounded => builder,
            Timeout::Total(total) => builder.timeout(total),
            Timeout::Split { connect, read } => builder.connect_timeout(connect).read_timeout(read),
        };

        Ok(Self {
            client: builder.build().map_err(build_error)?,
        })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    #[tracing::instrument(skip(self, url))]
    async fn get(&self, url: &str) -> Result<TransportResponse> {
        // reqwest errors embed the request URL, credentials included
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| Error::Network(e.without_url()))?;
        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|e| Error::Network(e.without_url()))?;

        tracing::debug!("GET {} -> {} ({} bytes)", redact_url(url), status, body.len());

        Ok(TransportResponse::new(status, body.to_vec()))
    }
}
