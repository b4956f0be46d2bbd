//! Client configuration.

use crate::error::{ClientError, Result};
use std::time::Duration;
use url::Url;

/// Endpoint used when none is configured, the service's standard
/// loopback deployment.
pub const DEFAULT_ENDPOINT: &str = "tcp://127.0.0.1:5555";

/// Port assumed when the endpoint URL carries none.
pub const DEFAULT_PORT: u16 = 5555;

/// Configuration for a tipjar client.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Server endpoint as a `tcp://host:port` URL.
    pub endpoint: String,
    /// Window for establishing the TCP session.
    pub connect_timeout: Duration,
    /// Window for one request/response exchange.
    pub call_timeout: Duration,
    /// Consecutive call timeouts tolerated before the session is torn
    /// down.
    pub max_consecutive_timeouts: u32,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            connect_timeout: Duration::from_secs(10),
            call_timeout: Duration::from_secs(30),
            max_consecutive_timeouts: 3,
        }
    }
}

impl ClientConfig {
    /// Configuration for the given endpoint with default timeouts.
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            ..Self::default()
        }
    }

    /// Same configuration with a different per-call window.
    #[must_use]
    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }

    /// Same configuration with a different connect window.
    #[must_use]
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Host and port from the endpoint URL.
    ///
    /// The scheme must be `tcp` and a host is required; the port falls
    /// back to [`DEFAULT_PORT`] when absent.
    pub fn endpoint_parts(&self) -> Result<(String, u16)> {
        if self.endpoint.is_empty() {
            return Err(ClientError::InvalidEndpoint(
                "endpoint cannot be empty".to_string(),
            ));
        }

        let url = Url::parse(&self.endpoint)
            .map_err(|e| ClientError::InvalidEndpoint(format!("{}: {e}", self.endpoint)))?;

        if url.scheme() != "tcp" {
            return Err(ClientError::InvalidEndpoint(format!(
                "endpoint must use the tcp scheme: {}",
                self.endpoint
            )));
        }

        let host = url.host_str().ok_or_else(|| {
            ClientError::InvalidEndpoint(format!("endpoint has no host: {}", self.endpoint))
        })?;

        Ok((host.to_string(), url.port().unwrap_or(DEFAULT_PORT)))
    }
}

// ============================================================================
// Tests
// ============================================================================
