//! Shared User-Agent string for detector HTTP clients.
//!
//! Single source for project URL and UA format so API and image-host traffic
//! stay consistent and easy to update (good citizenship; RFC 9308).

/// Project URL for User-Agent identification.
const PROJECT_UA_URL: &str = "https://github.com/fierce/imgdetect";

/// Default User-Agent for detector requests (single shared format; no per-service name in header).
#[must_use]
pub(crate) fn default_detector_user_agent() -> String {
    let version = env!("CARGO_PKG_VERSION");
    format!("imgdetect/{version} (image-link-resolver; +{PROJECT_UA_URL})")
}
