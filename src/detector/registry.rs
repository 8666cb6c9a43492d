//! Detector registry routing page URLs to the detector that accepts them.
//!
//! The [`DetectorRegistry`] holds detectors in registration order and
//! dispatches each URL to the first one whose acceptance predicate matches.

use tracing::{debug, info};
use url::Url;

use super::{DetectError, DetectorState, ImageDetector, ImageRecord};

/// An ordered collection of detectors.
pub struct DetectorRegistry {
    detectors: Vec<Box<dyn ImageDetector>>,
}

impl DetectorRegistry {
    /// Creates an empty detector registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            detectors: Vec::new(),
        }
    }

    /// Registers a detector with the registry.
    #[tracing::instrument(skip(self, detector), fields(service))]
    pub fn register(&mut self, detector: Box<dyn ImageDetector>) {
        tracing::Span::current().record("service", detector.service_name());
        debug!(
            service = detector.service_name(),
            state = %detector.state(),
            "Registering detector"
        );
        self.detectors.push(detector);
    }

    /// Returns the number of registered detectors.
    #[must_use]
    pub fn len(&self) -> usize {
        self.detectors.len()
    }

    /// Returns true if no detectors are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.detectors.is_empty()
    }

    /// Service names in registration order.
    #[must_use]
    pub fn service_names(&self) -> Vec<&str> {
        self.detectors.iter().map(|d| d.service_name()).collect()
    }

    /// Returns the first detector that can process `url`.
    #[must_use]
    pub fn find_detector(&self, url: &Url) -> Option<&dyn ImageDetector> {
        self.detectors
            .iter()
            .find(|d| d.can_process(url))
            .map(AsRef::as_ref)
    }

    /// Detects images with the first detector that accepts `url`.
    ///
    /// # Errors
    ///
    /// Returns [`DetectError::NoDetector`] when no detector accepts the URL,
    /// otherwise whatever the chosen detector returns.
    #[tracing::instrument(skip(self, url), fields(url = %url))]
    pub async fn detect_images(&self, url: &Url) -> Result<Vec<ImageRecord>, DetectError> {
        let Some(detector) = self.find_detector(url) else {
            return Err(DetectError::no_detector(url.as_str()));
        };

        debug!(service = detector.service_name(), "Dispatching to detector");
        let images = detector.detect_images(url).await?;
        info!(
            service = detector.service_name(),
            count = images.len(),
            "Images detected"
        );
        Ok(images)
    }

    /// Runs a health check on every detector.
    ///
    /// Checks respect each detector's backoff window.
    pub async fn refresh_states(&self) -> Vec<(String, DetectorState)> {
        let mut states = Vec::with_capacity(self.detectors.len());
        for detector in &self.detectors {
            let state = detector.check_state().await;
            states.push((detector.service_name().to_string(), state));
        }
        states
    }
}

impl std::fmt::Debug for DetectorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DetectorRegistry")
            .field("detector_count", &self.detectors.len())
            .field("detectors", &self.service_names())
            .finish()
    }
}

impl Default for DetectorRegistry {
    fn default() -> Self {
        Self::new()
    }
}
