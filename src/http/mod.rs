//! Request execution: transport, retry policy and outcome classification.

mod client;
mod retry;
mod transport;

pub use client::{DEFAULT_BASE_URL, GeoClient, RequestExecutor};
pub use retry::{
    Classification, OVER_QUERY_LIMIT, RETRYABLE_STATUSES, RetryState, SUCCESS_STATUSES,
    backoff_delay, classify_body, classify_response, classify_status, jittered,
};
pub use transport::{HttpTransport, Transport, TransportResponse, USER_AGENT};
