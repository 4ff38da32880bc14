//! Authenticated request execution with a time-bounded retry loop.

use log::{debug, warn};
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use super::retry::{Classification, RetryState, classify_response};
use super::transport::{HttpTransport, Transport};
use crate::auth::sign;
use crate::context::Context;
use crate::error::{Error, Result};

/// Host every request path is appended to.
pub const DEFAULT_BASE_URL: &str = "https://maps.googleapis.com";

/// Signs requests, sends them and retries transient failures.
///
/// Retries cover HTTP 500/503/504 and the `OVER_QUERY_LIMIT` body status.
/// They are bounded by the context's retry timeout, measured from the first
/// attempt of the call, not by a fixed attempt count.
#[derive(Clone)]
pub struct RequestExecutor<T: Transport> {
    transport: T,
    base_url: String,
}

impl<T: Transport> RequestExecutor<T> {
    /// Sends requests through `transport`, against [`DEFAULT_BASE_URL`]
    /// unless `base_url` overrides it.
    pub fn new(transport: T, base_url: Option<String>) -> Self {
        let base_url = base_url
            .map(|url| url.trim_end_matches('/').to_string())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        Self {
            transport,
            base_url,
        }
    }

    /// Host prefix, without a trailing slash.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Full request URL for `path` and `params`, signed for `ctx`.
    pub fn signed_url(&self, ctx: &Context, path: &str, params: &[(&str, &str)]) -> Result<String> {
        Ok(format!("{}{}", self.base_url, sign(ctx, path, params)?))
    }

    /// Performs a signed GET and returns the JSON body once its status is
    /// `OK` or `ZERO_RESULTS`.
    #[tracing::instrument(skip(self, ctx, params))]
    pub async fn execute(&self, ctx: &Context, path: &str, params: &[(&str, &str)]) -> Result<Value> {
        self.execute_with_cancel(ctx, path, params, &CancellationToken::new())
            .await
    }

    /// Like [`execute`](Self::execute), but gives up with [`Error::Cancelled`]
    /// as soon as `cancel` fires, during an attempt or a backoff sleep.
    #[tracing::instrument(skip(self, ctx, params, cancel))]
    pub async fn execute_with_cancel(
        &self,
        ctx: &Context,
        path: &str,
        params: &[(&str, &str)],
        cancel: &CancellationToken,
    ) -> Result<Value> {
        let url = self.signed_url(ctx, path, params)?;
        let mut state = RetryState::start();

        loop {
            let delay = state.delay(&mut rand::rng());
            if !delay.is_zero() {
                debug!(
                    "{}: retry {} in {}ms...",
                    path,
                    state.retry_count,
                    delay.as_millis()
                );
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return Err(Error::Cancelled),
                    _ = tokio::time::sleep(delay) => {}
                }
            }

            let response = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(Error::Cancelled),
                response = self.transport.get(&url) => response?,
            };

            let exceeded_budget = state.budget_exceeded(ctx.retry_timeout());

            match classify_response(response) {
                Classification::Success(body) => return Ok(body),
                Classification::Retryable(e) if !exceeded_budget => {
                    warn!(
                        "{}: attempt {} failed ({}), retrying...",
                        path,
                        state.retry_count + 1,
                        e
                    );
                    state = state.next();
                }
                Classification::Retryable(e) => {
                    debug!("{}: retry budget of {:?} spent", path, ctx.retry_timeout());
                    return Err(e);
                }
                Classification::Fatal(e) => {
                    debug!("{}: non-retryable error: {}", path, e);
                    return Err(e);
                }
            }
        }
    }
}

/// A [`Context`] paired with a reqwest-backed executor built from its timeouts.
#[derive(Clone)]
pub struct GeoClient {
    ctx: Context,
    executor: RequestExecutor<HttpTransport>,
}

impl GeoClient {
    /// Builds a client for the production API host.
    pub fn new(ctx: Context) -> Result<Self> {
        Self::with_base_url(ctx, None)
    }

    /// Targets `base_url` instead of [`DEFAULT_BASE_URL`].
    pub fn with_base_url(ctx: Context, base_url: Option<String>) -> Result<Self> {
        let transport = HttpTransport::new(ctx.timeout())?;
        Ok(Self {
            executor: RequestExecutor::new(transport, base_url),
            ctx,
        })
    }

    /// The credentials and timeouts every request is made with.
    pub fn context(&self) -> &Context {
        &self.ctx
    }

    pub fn signed_url(&self, path: &str, params: &[(&str, &str)]) -> Result<String> {
        self.executor.signed_url(&self.ctx, path, params)
    }

    /// See [`RequestExecutor::execute`].
    pub async fn get(&self, path: &str, params: &[(&str, &str)]) -> Result<Value> {
        self.executor.execute(&self.ctx, path, params).await
    }

    /// See [`RequestExecutor::execute_with_cancel`].
    pub async fn get_with_cancel(
        &self,
        path: &str,
        params: &[(&str, &str)],
        cancel: &CancellationToken,
    ) -> Result<Value> {
        self.executor
            .execute_with_cancel(&self.ctx, path, params, cancel)
            .await
    }
}
