//! Shared HTTP client construction policy for detectors.
//!
//! Centralizes networking defaults so every adapter is consistent on
//! timeouts, user-agent and compression.

use std::time::Duration;

use reqwest::Client;
use tracing::debug;

use crate::user_agent;

use super::DetectError;

/// Default connect timeout for detector clients.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default overall per-request deadline for detector clients.
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(30);

/// Connect and read deadlines applied to every outbound detector call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HttpTimeouts {
    pub connect: Duration,
    pub read: Duration,
}

impl Default for HttpTimeouts {
    fn default() -> Self {
        Self {
            connect: DEFAULT_CONNECT_TIMEOUT,
            read: DEFAULT_READ_TIMEOUT,
        }
    }
}

/// Builds a detector HTTP client using shared project policy.
///
/// `service` is used only for error messages and logging, not in the
/// User-Agent header.
///
/// # Errors
///
/// Returns [`DetectError::ClientBuild`] when client construction fails.
pub fn build_detector_http_client(
    service: &str,
    timeouts: &HttpTimeouts,
) -> Result<Client, DetectError> {
    debug!(
        service,
        connect_timeout_ms = timeouts.connect.as_millis(),
        read_timeout_ms = timeouts.read.as_millis(),
        "Building detector HTTP client"
    );
    Client::builder()
        .connect_timeout(timeouts.connect)
        .timeout(timeouts.read)
        .user_agent(user_agent::default_detector_user_agent())
        .gzip(true)
        .build()
        .map_err(|error| DetectError::client_build(service, error))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_default_timeouts() {
        let timeouts = HttpTimeouts::default();
        assert_eq!(timeouts.connect, Duration::from_secs(10));
        assert_eq!(timeouts.read, Duration::from_secs(30));
    }

    #[test]
    fn test_build_client_with_custom_timeouts() {
        let timeouts = HttpTimeouts {
            connect: Duration::from_secs(1),
            read: Duration::from_secs(2),
        };
        assert!(build_detector_http_client("imgur", &timeouts).is_ok());
    }
}
