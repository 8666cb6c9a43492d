//! Image detection pipeline for turning page links into direct image URLs.
//!
//! This module provides a pluggable detector system: every image host gets a
//! protocol-specific [`DetectorBackend`], and a shared [`ResilientDetector`]
//! wraps it with health tracking, exponential-backoff health checks and
//! state-driven error surfacing.
//!
//! # Architecture
//!
//! - [`ImageDetector`] - Async trait every detector exposes to callers
//! - [`DetectorBackend`] - Protocol-specific strategy injected into the core
//! - [`ResilientDetector`] - Backoff-scheduled health checks and preconditions
//! - [`DetectorRegistry`] - Routes URLs to the first detector that accepts them
//! - [`ImgurBackend`] - Reference adapter for Imgur images and albums
//!
//! # Example
//!
//! ```no_run
//! use imgdetect_core::{DetectorConfig, ImageDetector, ImgurDetector};
//! use url::Url;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = DetectorConfig::with_client_id("my-client-id");
//! let detector = ImgurDetector::connect(&config).await?;
//!
//! let page = Url::parse("https://imgur.com/a/lDRB2")?;
//! if detector.can_process(&page) {
//!     for record in detector.detect_images(&page).await? {
//!         println!("{record}");
//!     }
//! }
//! # Ok(())
//! # }
//! ```

mod error;
pub mod http_client;
mod imgur;
mod registry;
mod resilient;

pub use error::DetectError;
pub use imgur::{
    DEFAULT_API_BASE_URL, DEFAULT_IMAGE_BASE_URL, ImgurBackend, ImgurDetector, RATE_LIMIT_HEADER,
};
pub use registry::DetectorRegistry;
pub use resilient::{BackoffPolicy, ResilientDetector};

use std::fmt;

use async_trait::async_trait;
use serde::Serialize;
use url::Url;

/// Operating health of a detector as of its last check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum DetectorState {
    /// The backing service is reachable and has quota left.
    Good,
    /// The backing service reported an exhausted request quota.
    RateLimited,
    /// The backing service answered with a failure status or was unreachable.
    BadNetwork,
    /// The detector could not interpret the service's answers.
    Broken,
}

impl DetectorState {
    /// Returns true for every state other than [`DetectorState::Good`].
    #[must_use]
    pub fn is_degraded(self) -> bool {
        self != Self::Good
    }

    /// Returns the stable string label for display output.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Good => "good",
            Self::RateLimited => "rate-limited",
            Self::BadNetwork => "bad-network",
            Self::Broken => "broken",
        }
    }

    pub(crate) fn to_u8(self) -> u8 {
        match self {
            Self::Good => 0,
            Self::RateLimited => 1,
            Self::BadNetwork => 2,
            Self::Broken => 3,
        }
    }

    pub(crate) fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Good,
            1 => Self::RateLimited,
            2 => Self::BadNetwork,
            _ => Self::Broken,
        }
    }
}

impl fmt::Display for DetectorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Pixel format of a detected image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    Jpg,
    Png,
    Gif,
}

impl ImageFormat {
    /// Maps a declared MIME type to a format.
    ///
    /// # Errors
    ///
    /// Returns [`DetectError::UnsupportedFormat`] for any type outside the
    /// gif/jpeg/png family.
    pub fn from_mime(mime: &str) -> Result<Self, DetectError> {
        match mime.trim().to_ascii_lowercase().as_str() {
            "image/gif" => Ok(Self::Gif),
            "image/jpeg" | "image/jpg" => Ok(Self::Jpg),
            "image/png" => Ok(Self::Png),
            _ => Err(DetectError::unsupported_format(mime)),
        }
    }

    /// File extension conventionally used for this format, without the dot.
    #[must_use]
    pub fn extension(self) -> &'static str {
        match self {
            Self::Jpg => "jpg",
            Self::Png => "png",
            Self::Gif => "gif",
        }
    }
}

impl fmt::Display for ImageFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Jpg => "Jpg",
            Self::Png => "Png",
            Self::Gif => "Gif",
        })
    }
}

/// A direct image URL and its format. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImageRecord {
    url: Url,
    format: ImageFormat,
}

impl ImageRecord {
    #[must_use]
    pub fn new(url: Url, format: ImageFormat) -> Self {
        Self { url, format }
    }

    /// Creates a record by classifying a declared MIME type.
    ///
    /// # Errors
    ///
    /// Returns [`DetectError::UnsupportedFormat`] when the MIME type has no
    /// matching [`ImageFormat`].
    pub fn from_mime(url: Url, mime: &str) -> Result<Self, DetectError> {
        Ok(Self::new(url, ImageFormat::from_mime(mime)?))
    }

    #[must_use]
    pub fn url(&self) -> &Url {
        &self.url
    }

    #[must_use]
    pub fn format(&self) -> ImageFormat {
        self.format
    }
}

impl fmt::Display for ImageRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.url, self.format)
    }
}

/// Capability set every detector exposes to callers.
///
/// Callers are expected to check [`ImageDetector::can_process`] before
/// calling [`ImageDetector::detect_images`]; the latter re-checks it and
/// fails locally when the URL is not supported.
///
/// # Object Safety
///
/// This trait uses `async_trait` to support dynamic dispatch via
/// `Box<dyn ImageDetector>` in the [`DetectorRegistry`].
#[async_trait]
pub trait ImageDetector: Send + Sync {
    /// The current state of the detector as of the last check.
    fn state(&self) -> DetectorState;

    /// A friendly name for the service the detector talks to.
    fn service_name(&self) -> &str;

    /// Checks the health of the backing service, respecting the backoff
    /// window. Never fails; faults are reflected in the returned state.
    async fn check_state(&self) -> DetectorState;

    /// Whether the detector is able to try detecting images for `url`.
    /// Performs no I/O.
    fn can_process(&self, url: &Url) -> bool;

    /// Detects the images behind a page URL.
    ///
    /// # Errors
    ///
    /// - [`DetectError::InvalidUrl`] if `can_process(url)` is false
    /// - [`DetectError::InvalidState`] if the detector is not `Good`
    /// - [`DetectError::Detection`] if the detector degraded during the call
    /// - adapter errors such as [`DetectError::UnsupportedFormat`]
    async fn detect_images(&self, url: &Url) -> Result<Vec<ImageRecord>, DetectError>;
}

/// Protocol-specific operations composed into a [`ResilientDetector`].
///
/// Implementations report state changes through the `state` argument; the
/// resilience core owns the stored state and reconciles it after each call.
#[async_trait]
pub trait DetectorBackend: Send + Sync {
    /// A friendly name for the service (e.g., "Imgur").
    fn service_name(&self) -> &str;

    /// Stateless URL acceptance predicate.
    fn can_process(&self, url: &Url) -> bool;

    /// Probes the service health without any backoff.
    ///
    /// # Errors
    ///
    /// Any error is treated as a fault and degrades the detector to `Broken`.
    async fn probe_state(&self) -> Result<DetectorState, DetectError>;

    /// Detects images for a URL already accepted by `can_process`, without
    /// checking state beforehand.
    ///
    /// # Errors
    ///
    /// Errors propagate to the caller unchanged; implementations set `state`
    /// before returning one when the fault should block further calls.
    async fn detect(
        &self,
        url: &Url,
        state: &mut DetectorState,
    ) -> Result<Vec<ImageRecord>, DetectError>;
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_format_table_maps_known_mime_types() {
        assert_eq!(ImageFormat::from_mime("image/gif").unwrap(), ImageFormat::Gif);
        assert_eq!(ImageFormat::from_mime("image/jpeg").unwrap(), ImageFormat::Jpg);
        assert_eq!(ImageFormat::from_mime("image/jpg").unwrap(), ImageFormat::Jpg);
        assert_eq!(ImageFormat::from_mime("image/png").unwrap(), ImageFormat::Png);
    }

    #[test]
    fn test_format_table_rejects_unknown_mime_type() {
        let err = ImageFormat::from_mime("video/mp4").unwrap_err();
        assert!(matches!(err, DetectError::UnsupportedFormat { .. }));
        assert!(err.to_string().contains("video/mp4"));
    }

    #[test]
    fn test_state_round_trips_through_atomic_encoding() {
        for state in [
            DetectorState::Good,
            DetectorState::RateLimited,
            DetectorState::BadNetwork,
            DetectorState::Broken,
        ] {
            assert_eq!(DetectorState::from_u8(state.to_u8()), state);
        }
    }

    #[test]
    fn test_state_degraded_and_labels() {
        assert!(!DetectorState::Good.is_degraded());
        assert!(DetectorState::RateLimited.is_degraded());
        assert_eq!(DetectorState::BadNetwork.to_string(), "bad-network");
    }

    #[test]
    fn test_image_record_display_and_json() {
        let record = ImageRecord::new(
            Url::parse("http://i.imgur.com/abc.png").unwrap(),
            ImageFormat::Png,
        );
        assert_eq!(record.to_string(), "http://i.imgur.com/abc.png (Png)");
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["url"], "http://i.imgur.com/abc.png");
        assert_eq!(json["format"], "png");
    }
}
