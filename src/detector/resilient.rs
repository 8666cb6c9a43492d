//! Resilience core shared by all detectors.
//!
//! [`ResilientDetector`] composes a protocol-specific [`DetectorBackend`] and
//! adds what every detector needs regardless of the service behind it:
//!
//! - health checks throttled by exponential backoff while the service is
//!   degraded, reset to immediate probing once it recovers
//! - precondition enforcement (URL acceptance, `Good` state) before any I/O
//! - post-call reconciliation that turns a degraded state into a
//!   [`DetectError::Detection`]
//!
//! # Backoff
//!
//! ```text
//! delay = 0                                          if state == Good
//! delay = min(max(delay, initial_delay) * 2, max_delay)  otherwise
//! ```
//!
//! A health check issued before `last_checked + delay` returns the cached
//! state without touching the network.
//!
//! # Concurrency
//!
//! Health checks and detection calls on one instance are serialized by an
//! internal async mutex, so they never interleave. The published state is
//! mirrored in an atomic so [`ImageDetector::state`] stays synchronous.

use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU8, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use futures_util::FutureExt;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, error, warn};
use url::Url;

use super::{DetectError, DetectorBackend, DetectorState, ImageDetector, ImageRecord};

/// Default first backoff step (doubled on the first failure).
const DEFAULT_INITIAL_DELAY: Duration = Duration::from_millis(2);

/// Default ceiling for the health-check delay (10 minutes).
const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(600);

/// Backoff settings for health checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    initial_delay: Duration,
    max_delay: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            initial_delay: DEFAULT_INITIAL_DELAY,
            max_delay: DEFAULT_MAX_DELAY,
        }
    }
}

impl BackoffPolicy {
    /// Creates a policy; `max_delay` is raised to `initial_delay` if lower.
    #[must_use]
    pub fn new(initial_delay: Duration, max_delay: Duration) -> Self {
        Self {
            initial_delay,
            max_delay: max_delay.max(initial_delay),
        }
    }

    #[must_use]
    pub fn initial_delay(&self) -> Duration {
        self.initial_delay
    }

    #[must_use]
    pub fn max_delay(&self) -> Duration {
        self.max_delay
    }

    /// Delay to apply after a health check resolved to `state`.
    #[must_use]
    pub fn next_delay(&self, previous: Duration, state: DetectorState) -> Duration {
        if state == DetectorState::Good {
            return Duration::ZERO;
        }
        previous
            .max(self.initial_delay)
            .saturating_mul(2)
            .min(self.max_delay)
    }
}

#[derive(Debug)]
struct BackoffSchedule {
    /// `None` until the first health check performs I/O.
    last_checked: Option<Instant>,
    delay: Duration,
}

/// Wraps a [`DetectorBackend`] with state tracking and backoff-scheduled
/// health checks.
pub struct ResilientDetector<B> {
    backend: B,
    policy: BackoffPolicy,
    state: AtomicU8,
    schedule: Mutex<BackoffSchedule>,
}

impl<B: DetectorBackend> ResilientDetector<B> {
    /// Wraps `backend` without checking state.
    ///
    /// The detector starts `Broken` and is unusable until a health check
    /// succeeds; prefer [`ResilientDetector::build`].
    #[must_use]
    pub fn new(backend: B, policy: BackoffPolicy) -> Self {
        Self {
            backend,
            policy,
            state: AtomicU8::new(DetectorState::Broken.to_u8()),
            schedule: Mutex::new(BackoffSchedule {
                last_checked: None,
                delay: policy.initial_delay(),
            }),
        }
    }

    /// Wraps `backend` and runs the initial health check.
    pub async fn build(backend: B, policy: BackoffPolicy) -> Self {
        let detector = Self::new(backend, policy);
        detector.check_state().await;
        detector
    }

    /// The wrapped protocol adapter.
    #[must_use]
    pub fn backend(&self) -> &B {
        &self.backend
    }

    #[must_use]
    pub fn policy(&self) -> BackoffPolicy {
        self.policy
    }

    /// The delay currently separating health checks.
    pub async fn current_delay(&self) -> Duration {
        self.schedule.lock().await.delay
    }

    fn store_state(&self, state: DetectorState) {
        self.state.store(state.to_u8(), Ordering::SeqCst);
    }

    async fn probe(&self) -> DetectorState {
        match AssertUnwindSafe(self.backend.probe_state())
            .catch_unwind()
            .await
        {
            Ok(Ok(state)) => state,
            Ok(Err(err)) => {
                error!(
                    service = self.backend.service_name(),
                    error = %err,
                    "Health probe failed"
                );
                DetectorState::Broken
            }
            Err(_) => {
                error!(
                    service = self.backend.service_name(),
                    "Health probe panicked"
                );
                DetectorState::Broken
            }
        }
    }
}

impl<B> std::fmt::Debug for ResilientDetector<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResilientDetector")
            .field(
                "state",
                &DetectorState::from_u8(self.state.load(Ordering::SeqCst)),
            )
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl<B: DetectorBackend> ImageDetector for ResilientDetector<B> {
    fn state(&self) -> DetectorState {
        DetectorState::from_u8(self.state.load(Ordering::SeqCst))
    }

    fn service_name(&self) -> &str {
        self.backend.service_name()
    }

    #[tracing::instrument(skip(self), fields(service = self.backend.service_name()))]
    async fn check_state(&self) -> DetectorState {
        let mut schedule = self.schedule.lock().await;

        let now = Instant::now();
        if let Some(last_checked) = schedule.last_checked
            && now < last_checked + schedule.delay
        {
            debug!(
                delay_ms = schedule.delay.as_millis(),
                "Within backoff window; returning cached state"
            );
            return self.state();
        }

        debug!("Checking detector state");
        schedule.last_checked = Some(now);
        let state = self.probe().await;
        self.store_state(state);
        schedule.delay = self.policy.next_delay(schedule.delay, state);

        if state == DetectorState::Good {
            debug!("Detector state is good");
        } else {
            warn!(
                state = %state,
                next_check_in_ms = schedule.delay.as_millis(),
                "Detector is degraded"
            );
        }
        state
    }

    fn can_process(&self, url: &Url) -> bool {
        self.backend.can_process(url)
    }

    #[tracing::instrument(skip(self, url), fields(service = self.backend.service_name(), url = %url))]
    async fn detect_images(&self, url: &Url) -> Result<Vec<ImageRecord>, DetectError> {
        if !self.backend.can_process(url) {
            return Err(DetectError::invalid_url(
                url.as_str(),
                &format!("{} cannot process this URL", self.backend.service_name()),
            ));
        }

        let _schedule = self.schedule.lock().await;
        let mut state = self.state();
        if state != DetectorState::Good {
            return Err(DetectError::invalid_state(state));
        }

        let result = self.backend.detect(url, &mut state).await;
        self.store_state(state);
        let images = result?;

        if matches!(state, DetectorState::BadNetwork | DetectorState::Broken) {
            warn!(state = %state, "Detector degraded during detection");
            return Err(DetectError::detection(state));
        }

        debug!(count = images.len(), state = %state, "Detection complete");
        Ok(images)
    }
}
