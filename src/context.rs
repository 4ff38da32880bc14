//! Per-session credentials and timeout policy.
//!
//! A [`Context`] is validated once at construction and is read-only
//! afterwards, so it can be shared across concurrent requests without locking.

use log::debug;
use std::fmt;
use std::time::Duration;

use crate::auth::decode_secret;
use crate::error::{Error, Result};

/// Every valid API key starts with this prefix.
pub const API_KEY_PREFIX: &str = "AIza";

/// Default wall-clock budget across all retries of one logical call.
pub const DEFAULT_RETRY_TIMEOUT: Duration = Duration::from_secs(60);

/// Raw construction inputs, typically gathered from flags or the environment.
#[derive(Clone, Default)]
pub struct ContextOptions {
    pub key: Option<String>,
    pub client_id: Option<String>,
    /// Base64url-encoded client secret.
    pub client_secret: Option<String>,
    /// Combined connect and read timeout. Excludes `connect_timeout`/`read_timeout`.
    pub timeout: Option<Duration>,
    pub connect_timeout: Option<Duration>,
    pub read_timeout: Option<Duration>,
    /// Defaults to [`DEFAULT_RETRY_TIMEOUT`].
    pub retry_timeout: Option<Duration>,
}

impl fmt::Debug for ContextOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContextOptions")
            .field("key", &self.key.as_deref().map(mask))
            .field("client_id", &self.client_id)
            .field("client_secret", &self.client_secret.as_deref().map(mask))
            .field("timeout", &self.timeout)
            .field("connect_timeout", &self.connect_timeout)
            .field("read_timeout", &self.read_timeout)
            .field("retry_timeout", &self.retry_timeout)
            .finish()
    }
}

/// The credential mode chosen at construction.
#[derive(Clone, PartialEq, Eq)]
pub enum Credentials {
    ApiKey(String),
    Enterprise {
        client_id: String,
        /// Decoded HMAC key bytes.
        secret: Vec<u8>,
    },
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credentials::ApiKey(key) => f.debug_tuple("ApiKey").field(&mask(key)).finish(),
            Credentials::Enterprise { client_id, .. } => f
                .debug_struct("Enterprise")
                .field("client_id", client_id)
                .field("secret", &"*********")
                .finish(),
        }
    }
}

/// Shows the first and last few characters of a credential.
fn mask(value: &str) -> String {
    let chars: Vec<char> = value.chars().collect();
    if chars.len() <= 8 {
        return "*********".to_string();
    }
    let head: String = chars[..4].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{}*********{}", head, tail)
}

/// HTTP timeout policy applied to every attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Timeout {
    #[default]
    Unbounded,
    Total(Duration),
    Split { connect: Duration, read: Duration },
}

#[derive(Debug, Clone)]
pub struct Context {
    credentials: Credentials,
    timeout: Timeout,
    retry_timeout: Duration,
}

impl Context {
    /// Validates `options` and resolves the credential mode and timeout policy.
    ///
    /// Fails with [`Error::Configuration`] when no credential mode is
    /// supplied, the API key has the wrong prefix, an enterprise pair or
    /// connect/read pair is incomplete, a combined timeout is mixed with the
    /// connect/read pair, a timeout is zero, or the client secret is not
    /// base64url.
    pub fn new(options: ContextOptions) -> Result<Self> {
        let ContextOptions {
            key,
            client_id,
            client_secret,
            timeout,
            connect_timeout,
            read_timeout,
            retry_timeout,
        } = options;

        if key.is_none() && (client_id.is_none() || client_secret.is_none()) {
            return Err(Error::Configuration(
                "Must provide API key or enterprise credentials with context object".to_string(),
            ));
        }

        if let Some(key) = &key {
            if !key.starts_with(API_KEY_PREFIX) {
                return Err(Error::Configuration("Invalid API key provided".to_string()));
            }
        }

        if [timeout, connect_timeout, read_timeout]
            .iter()
            .any(|t| t.is_some_and(|t| t.is_zero()))
        {
            return Err(Error::Configuration(
                "timeout, connect_timeout and read_timeout must be greater than zero".to_string(),
            ));
        }

        if timeout.is_some() && (connect_timeout.is_some() || read_timeout.is_some()) {
            return Err(Error::Configuration(
                "Specify either timeout, or connect_timeout and read_timeout".to_string(),
            ));
        }

        let timeout = match (timeout, connect_timeout, read_timeout) {
            (Some(total), None, None) => Timeout::Total(total),
            (None, Some(connect), Some(read)) => Timeout::Split { connect, read },
            (None, None, None) => Timeout::Unbounded,
            _ => {
                return Err(Error::Configuration(
                    "connect_timeout and read_timeout must be specified together".to_string(),
                ));
            }
        };

        let credentials = match (key, client_id, client_secret) {
            (_, Some(_), None) | (_, None, Some(_)) => {
                return Err(Error::Configuration(
                    "client_id and client_secret must be specified together".to_string(),
                ));
            }
            (Some(key), client_id, _) => {
                if client_id.is_some() {
                    debug!("Both API key and enterprise credentials given, using API key");
                }
                Credentials::ApiKey(key)
            }
            (None, Some(client_id), Some(client_secret)) => Credentials::Enterprise {
                secret: decode_secret(&client_secret)?,
                client_id,
            },
            // Rejected by the presence check above
            (None, None, None) => {
                return Err(Error::Configuration(
                    "Must provide API key or enterprise credentials with context object"
                        .to_string(),
                ));
            }
        };

        let ctx = Self {
            credentials,
            timeout,
            retry_timeout: retry_timeout.unwrap_or(DEFAULT_RETRY_TIMEOUT),
        };
        debug!("Created context: {:?}", ctx);

        Ok(ctx)
    }

    /// Context in API key mode with default timeouts.
    pub fn with_key(key: impl Into<String>) -> Result<Self> {
        Self::new(ContextOptions {
            key: Some(key.into()),
            ..Default::default()
        })
    }

    /// Context in enterprise mode with default timeouts.
    pub fn with_enterprise(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Result<Self> {
        Self::new(ContextOptions {
            client_id: Some(client_id.into()),
            client_secret: Some(client_secret.into()),
            ..Default::default()
        })
    }

    /// The credential mode requests are signed with.
    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    /// Per-attempt HTTP timeout policy.
    pub fn timeout(&self) -> Timeout {
        self.timeout
    }

    /// Budget for all retries of one call, measured from its first attempt.
    pub fn retry_timeout(&self) -> Duration {
        self.retry_timeout
    }
}
