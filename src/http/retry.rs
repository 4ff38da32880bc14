//! Backoff schedule and outcome classification for API requests.

use rand::Rng;
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use tokio::time::Instant;

use super::transport::TransportResponse;
use crate::error::{ApiError, Error};

/// HTTP statuses retried while the retry budget lasts.
pub const RETRYABLE_STATUSES: [StatusCode; 3] = [
    StatusCode::INTERNAL_SERVER_ERROR,
    StatusCode::SERVICE_UNAVAILABLE,
    StatusCode::GATEWAY_TIMEOUT,
];

/// Body status signalling quota exhaustion; retried like a 503.
pub const OVER_QUERY_LIMIT: &str = "OVER_QUERY_LIMIT";

/// Body statuses that denote a successful call.
pub const SUCCESS_STATUSES: [&str; 2] = ["OK", "ZERO_RESULTS"];

/// Nominal delay before the first retry, in seconds.
const BASE_DELAY_SECS: f64 = 0.5;

/// Growth factor of the nominal delay per retry.
const BACKOFF_FACTOR: f64 = 1.5;

/// Outcome of a single attempt.
#[derive(Debug)]
pub enum Classification {
    Success(Value),
    Retryable(Error),
    Fatal(Error),
}

/// Fields of the response envelope the classifier looks at.
#[derive(Debug, Deserialize)]
struct Envelope {
    status: String,
    error_message: Option<String>,
}

/// Nominal (pre-jitter) delay before attempt `retry_count`.
///
/// Zero for the first attempt, then 0.5s growing by 1.5x per retry.
pub fn backoff_delay(retry_count: u32) -> Duration {
    if retry_count == 0 {
        return Duration::ZERO;
    }
    let exponent = i32::try_from(retry_count - 1).unwrap_or(i32::MAX);
    Duration::try_from_secs_f64(BASE_DELAY_SECS * BACKOFF_FACTOR.powi(exponent))
        .unwrap_or(Duration::MAX)
}

/// Draws a delay uniformly from `[0.5 * delay, 1.5 * delay]`.
pub fn jittered<R: Rng + ?Sized>(delay: Duration, rng: &mut R) -> Duration {
    let factor: f64 = rng.random_range(0.5..=1.5);
    Duration::try_from_secs_f64(delay.as_secs_f64() * factor).unwrap_or(Duration::MAX)
}

/// Classifies a transport status. `None` means the body must be inspected.
pub fn classify_status(status: StatusCode) -> Option<Classification> {
    if status == StatusCode::OK {
        return None;
    }

    let error = Error::Transport { status };
    if RETRYABLE_STATUSES.contains(&status) {
        Some(Classification::Retryable(error))
    } else {
        Some(Classification::Fatal(error))
    }
}

/// Classifies the JSON body of a 200 response by its `status` field.
pub fn classify_body(body: Value) -> Classification {
    let envelope = match Envelope::deserialize(&body) {
        Ok(envelope) => envelope,
        Err(e) => {
            return Classification::Fatal(Error::MalformedResponse(format!(
                "missing or invalid status field: {}",
                e
            )));
        }
    };

    if SUCCESS_STATUSES.contains(&envelope.status.as_str()) {
        return Classification::Success(body);
    }

    let error = Error::Api(ApiError::new(envelope.status, envelope.error_message));
    if error.is_retryable() {
        Classification::Retryable(error)
    } else {
        Classification::Fatal(error)
    }
}

/// Classifies a complete transport exchange: status first, then the JSON body.
pub fn classify_response(response: TransportResponse) -> Classification {
    if let Some(classification) = classify_status(response.status) {
        return classification;
    }

    match serde_json::from_slice::<Value>(&response.body) {
        Ok(body) => classify_body(body),
        Err(e) => Classification::Fatal(Error::MalformedResponse(format!(
            "invalid JSON body: {}",
            e
        ))),
    }
}

/// Loop state of one logical call.
#[derive(Debug, Clone, Copy)]
pub struct RetryState {
    pub first_request_time: Instant,
    /// Zero for the first attempt.
    pub retry_count: u32,
}

impl RetryState {
    /// State of the first attempt; the retry budget starts counting now.
    pub fn start() -> Self {
        Self {
            first_request_time: Instant::now(),
            retry_count: 0,
        }
    }

    /// Whether more than `retry_timeout` has passed since the first attempt.
    pub fn budget_exceeded(&self, retry_timeout: Duration) -> bool {
        self.first_request_time.elapsed() > retry_timeout
    }

    /// State of the following attempt, keeping the original start time.
    pub fn next(self) -> Self {
        Self {
            retry_count: self.retry_count.saturating_add(1),
            ..self
        }
    }

    /// Jittered delay to wait before this attempt.
    pub fn delay<R: Rng + ?Sized>(&self, rng: &mut R) -> Duration {
        jittered(backoff_delay(self.retry_count), rng)
    }
}
