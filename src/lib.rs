//! Authenticated request core for the geospatial web service APIs.
//!
//! A [`Context`] holds credentials and timeout policy, [`auth::sign`] turns a
//! path and its params into a signed URL, and [`RequestExecutor`] sends it,
//! retrying transient failures within the context's retry timeout.

pub mod auth;
pub mod context;
pub mod error;
pub mod http;

pub use context::{Context, ContextOptions, Credentials, Timeout};
pub use error::{ApiError, Error, Result};
pub use http::{GeoClient, RequestExecutor};
