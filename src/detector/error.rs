//! Error types for detector operations.
//!
//! Messages follow the What/Why/Fix pattern used across the project.

use thiserror::Error;

use super::DetectorState;

/// Errors that can occur while detecting images.
#[derive(Debug, Clone, Error)]
pub enum DetectError {
    /// The detector does not support the URL's shape or host
    #[error("unsupported URL '{url}': {reason}\n  Suggestion: Check can_process() before detecting")]
    InvalidUrl {
        /// The rejected URL
        url: String,
        /// Why the URL was rejected
        reason: String,
    },

    /// The detector is not in a usable state
    #[error(
        "detector is in an invalid state ({state})\n  Suggestion: Run check_state() once the backoff window has passed"
    )]
    InvalidState {
        /// The state the detector was in
        state: DetectorState,
    },

    /// The detector degraded while detecting images
    #[error("detector in bad state ({state})\n  Suggestion: {suggestion}")]
    Detection {
        /// The state the detector went into
        state: DetectorState,
        /// How to recover
        suggestion: String,
    },

    /// A declared MIME type could not be classified
    #[error(
        "unknown MIME type \"{mime}\"\n  Suggestion: Only gif, jpeg and png images are supported"
    )]
    UnsupportedFormat {
        /// The declared MIME type
        mime: String,
    },

    /// A service response did not match the expected schema
    #[error("could not parse {context}: {reason}\n  Suggestion: The service API may have changed")]
    Parse {
        /// What was being parsed
        context: String,
        /// Why parsing failed
        reason: String,
    },

    /// HTTP client construction failed
    #[error("could not build HTTP client for {service}: {reason}")]
    ClientBuild {
        /// The service the client was for
        service: String,
        /// Why construction failed
        reason: String,
    },

    /// No registered detector accepts the URL
    #[error("no detector found for '{url}'\n  Suggestion: Register a detector for this host")]
    NoDetector {
        /// The URL nothing accepted
        url: String,
    },
}

impl DetectError {
    /// Creates an `InvalidUrl` error.
    #[must_use]
    pub fn invalid_url(url: &str, reason: &str) -> Self {
        Self::InvalidUrl {
            url: url.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Creates an `InvalidState` error.
    #[must_use]
    pub fn invalid_state(state: DetectorState) -> Self {
        Self::InvalidState { state }
    }

    /// Creates a `Detection` error carrying the degraded state.
    #[must_use]
    pub fn detection(state: DetectorState) -> Self {
        let suggestion = match state {
            DetectorState::BadNetwork => "Check network connectivity and retry after a health check",
            DetectorState::RateLimited => "Wait for the service quota to reset",
            DetectorState::Broken => "The service returned data that could not be interpreted",
            DetectorState::Good => "Retry the request",
        };
        Self::Detection {
            state,
            suggestion: suggestion.to_string(),
        }
    }

    /// Creates an `UnsupportedFormat` error.
    #[must_use]
    pub fn unsupported_format(mime: &str) -> Self {
        Self::UnsupportedFormat {
            mime: mime.to_string(),
        }
    }

    /// Creates a `Parse` error.
    #[must_use]
    pub fn parse(context: &str, reason: impl std::fmt::Display) -> Self {
        Self::Parse {
            context: context.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Creates a `ClientBuild` error.
    #[must_use]
    pub fn client_build(service: &str, reason: impl std::fmt::Display) -> Self {
        Self::ClientBuild {
            service: service.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Creates a `NoDetector` error.
    #[must_use]
    pub fn no_detector(url: &str) -> Self {
        Self::NoDetector {
            url: url.to_string(),
        }
    }

    /// The detector state carried by this error, if any.
    #[must_use]
    pub fn state(&self) -> Option<DetectorState> {
        match self {
            Self::InvalidState { state } | Self::Detection { state, .. } => Some(*state),
            _ => None,
        }
    }
}
