//! Imgur adapter for resolving image and album pages into direct image URLs.
//!
//! Gallery and meme pages are not supported; only `/{id}` and `/a/{id}`
//! shapes are accepted.
//!
//! Albums go through the authenticated API. Single images skip the API
//! entirely: the direct-image host answers a `.jpg` guess with the real
//! content type, so only response headers are read and the transfer is
//! dropped before any image bytes arrive.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use tracing::{debug, warn};
use url::Url;

use crate::config::DetectorConfig;

use super::http_client::{HttpTimeouts, build_detector_http_client};
use super::{
    DetectError, DetectorBackend, DetectorState, ImageFormat, ImageRecord, ResilientDetector,
};

/// Response header carrying the remaining client request quota.
pub const RATE_LIMIT_HEADER: &str = "X-RateLimit-ClientRemaining";

/// Default base URL of the Imgur v3 API.
pub const DEFAULT_API_BASE_URL: &str = "https://api.imgur.com/3";

/// Default base URL of the direct-image host.
pub const DEFAULT_IMAGE_BASE_URL: &str = "http://i.imgur.com";

const SERVICE_NAME: &str = "Imgur";

const RECOGNIZED_HOSTS: [&str; 4] = ["imgur.com", "www.imgur.com", "i.imgur.com", "m.imgur.com"];

/// An Imgur detector: the Imgur adapter wrapped in the resilience core.
pub type ImgurDetector = ResilientDetector<ImgurBackend>;

impl ResilientDetector<ImgurBackend> {
    /// Builds the Imgur detector from configuration and runs the initial
    /// health check.
    ///
    /// # Errors
    ///
    /// Returns [`DetectError::ClientBuild`] when the HTTP client cannot be
    /// constructed. Service failures only show up in the resulting state.
    pub async fn connect(config: &DetectorConfig) -> Result<Self, DetectError> {
        let backend = ImgurBackend::from_config(config)?;
        Ok(Self::build(backend, config.backoff_policy()).await)
    }
}

#[derive(Debug, Deserialize)]
struct CreditsResponse {
    data: CreditsData,
    success: bool,
    status: u16,
}

#[derive(Debug, Deserialize)]
struct CreditsData {
    #[serde(rename = "ClientRemaining")]
    client_remaining: i64,
}

#[derive(Debug, Deserialize)]
struct AlbumResponse {
    data: AlbumData,
}

#[derive(Debug, Deserialize)]
struct AlbumData {
    images: Vec<AlbumImage>,
}

#[derive(Debug, Deserialize)]
struct AlbumImage {
    link: String,
    #[serde(rename = "type")]
    mime: String,
}

/// Protocol adapter for Imgur pages.
pub struct ImgurBackend {
    client: Client,
    client_id: String,
    api_base_url: String,
    image_base_url: String,
    request_timeout: Duration,
}

impl ImgurBackend {
    /// Creates an adapter against the public Imgur endpoints.
    ///
    /// # Errors
    ///
    /// Returns [`DetectError`] when HTTP client construction fails.
    pub fn new(client_id: impl Into<String>) -> Result<Self, DetectError> {
        Self::with_base_urls(
            client_id,
            DEFAULT_API_BASE_URL,
            DEFAULT_IMAGE_BASE_URL,
            &HttpTimeouts::default(),
        )
    }

    /// Creates an adapter with custom endpoints (used by tests and proxies).
    ///
    /// # Errors
    ///
    /// Returns [`DetectError`] when HTTP client construction fails.
    pub fn with_base_urls(
        client_id: impl Into<String>,
        api_base_url: impl Into<String>,
        image_base_url: impl Into<String>,
        timeouts: &HttpTimeouts,
    ) -> Result<Self, DetectError> {
        Ok(Self {
            client: build_detector_http_client("imgur", timeouts)?,
            client_id: client_id.into(),
            api_base_url: api_base_url.into().trim_end_matches('/').to_string(),
            image_base_url: image_base_url.into().trim_end_matches('/').to_string(),
            request_timeout: timeouts.read,
        })
    }

    /// Creates an adapter from detector configuration.
    ///
    /// # Errors
    ///
    /// Returns [`DetectError`] when HTTP client construction fails.
    pub fn from_config(config: &DetectorConfig) -> Result<Self, DetectError> {
        Self::with_base_urls(
            config.client_id.clone(),
            config.api_base_url.clone(),
            config.image_base_url.clone(),
            &config.http_timeouts(),
        )
    }

    fn api_get(&self, endpoint: &str) -> RequestBuilder {
        self.client
            .get(format!("{}/{endpoint}", self.api_base_url))
            .timeout(self.request_timeout)
            .header(AUTHORIZATION, format!("Client-ID {}", self.client_id))
    }

    async fn detect_album(
        &self,
        album_id: &str,
        state: &mut DetectorState,
    ) -> Result<Vec<ImageRecord>, DetectError> {
        let response = match self.api_get(&format!("album/{album_id}")).send().await {
            Ok(response) => response,
            Err(error) => {
                warn!(album_id, error = %error, "Album request failed");
                *state = DetectorState::BadNetwork;
                return Ok(Vec::new());
            }
        };

        if !classify_response(&response, state) {
            return Ok(Vec::new());
        }

        let body = match response.bytes().await {
            Ok(body) => body,
            Err(error) => {
                warn!(album_id, error = %error, "Album response body could not be read");
                *state = DetectorState::BadNetwork;
                return Ok(Vec::new());
            }
        };

        let album: AlbumResponse = serde_json::from_slice(&body)
            .map_err(|error| degrade(state, DetectError::parse("album response", error)))?;

        let mut records = Vec::with_capacity(album.data.images.len());
        for image in album.data.images {
            let link = Url::parse(&image.link).map_err(|error| {
                degrade(
                    state,
                    DetectError::parse(&format!("album image link '{}'", image.link), error),
                )
            })?;
            let record =
                ImageRecord::from_mime(link, &image.mime).map_err(|error| degrade(state, error))?;
            records.push(record);
        }

        debug!(album_id, count = records.len(), "Album images detected");
        Ok(records)
    }

    async fn detect_single_image(
        &self,
        image_id: &str,
        state: &mut DetectorState,
    ) -> Result<Vec<ImageRecord>, DetectError> {
        let guessed = format!("{}/{image_id}.jpg", self.image_base_url);

        // send() resolves once headers arrive; dropping the response aborts the body.
        let response = match self
            .client
            .get(&guessed)
            .timeout(self.request_timeout)
            .send()
            .await
        {
            Ok(response) => response,
            Err(error) => {
                warn!(url = %guessed, error = %error, "Image request failed");
                *state = DetectorState::BadNetwork;
                return Ok(Vec::new());
            }
        };

        if !classify_response(&response, state) {
            return Ok(Vec::new());
        }

        let mime = media_type(&response);
        drop(response);

        let format = ImageFormat::from_mime(&mime).map_err(|error| degrade(state, error))?;
        let actual = rewrite_extension(&guessed, format);
        let url = Url::parse(&actual).map_err(|error| {
            degrade(state, DetectError::parse(&format!("image URL '{actual}'"), error))
        })?;

        debug!(url = %url, format = %format, "Single image detected");
        Ok(vec![ImageRecord::new(url, format)])
    }
}

impl std::fmt::Debug for ImgurBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImgurBackend")
            .field("api_base_url", &self.api_base_url)
            .field("image_base_url", &self.image_base_url)
            .field("request_timeout", &self.request_timeout)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl DetectorBackend for ImgurBackend {
    fn service_name(&self) -> &'static str {
        SERVICE_NAME
    }

    fn can_process(&self, url: &Url) -> bool {
        is_supported_page(url)
    }

    async fn probe_state(&self) -> Result<DetectorState, DetectError> {
        let response = match self.api_get("credits").send().await {
            Ok(response) => response,
            Err(error) => {
                warn!(error = %error, "Credits request failed");
                return Ok(DetectorState::BadNetwork);
            }
        };

        if !response.status().is_success() {
            debug!(status = response.status().as_u16(), "Credits request rejected");
            return Ok(DetectorState::BadNetwork);
        }

        let Ok(body) = response.bytes().await else {
            return Ok(DetectorState::BadNetwork);
        };
        let credits: CreditsResponse = serde_json::from_slice(&body)
            .map_err(|error| DetectError::parse("credits response", error))?;

        debug!(
            remaining = credits.data.client_remaining,
            success = credits.success,
            status = credits.status,
            "Credits retrieved"
        );

        if credits.data.client_remaining > 0 {
            Ok(DetectorState::Good)
        } else {
            Ok(DetectorState::RateLimited)
        }
    }

    async fn detect(
        &self,
        url: &Url,
        state: &mut DetectorState,
    ) -> Result<Vec<ImageRecord>, DetectError> {
        let segments: Vec<&str> = url.path().split('/').collect();
        let last = segments.last().copied().unwrap_or_default();
        let id = last.split('.').next().unwrap_or_default();

        if segments.len() == 3 && segments[1] == "a" {
            self.detect_album(id, state).await
        } else {
            self.detect_single_image(id, state).await
        }
    }
}

/// Whether `url` is an Imgur image (`/{id}`) or album (`/a/{id}`) page.
fn is_supported_page(url: &Url) -> bool {
    let Some(host) = url.host_str() else {
        return false;
    };
    if !RECOGNIZED_HOSTS.contains(&host) {
        return false;
    }

    let segments: Vec<&str> = url.path().split('/').collect();
    if segments.last().is_none_or(|segment| segment.is_empty()) {
        return false;
    }

    segments.len() == 2 || (segments.len() == 3 && segments[1] == "a")
}

/// Sets `state` from an Imgur response and returns whether its body is
/// actionable.
fn classify_response(response: &Response, state: &mut DetectorState) -> bool {
    let status = response.status();
    if status == StatusCode::NOT_FOUND {
        *state = DetectorState::Good;
        return false;
    }
    if !status.is_success() {
        warn!(status = status.as_u16(), url = %response.url(), "Imgur request failed");
        *state = DetectorState::BadNetwork;
        return false;
    }

    let remaining = response
        .headers()
        .get(RATE_LIMIT_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim);

    *state = match remaining {
        Some("0") => {
            warn!("Imgur client quota exhausted");
            DetectorState::RateLimited
        }
        _ => DetectorState::Good,
    };
    true
}

/// The response's media type without parameters, or an empty string.
fn media_type(response: &Response) -> String {
    response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(';').next())
        .map(|value| value.trim().to_ascii_lowercase())
        .unwrap_or_default()
}

/// Replaces the guessed `.jpg` extension with the one matching `format`.
fn rewrite_extension(guessed: &str, format: ImageFormat) -> String {
    match guessed.strip_suffix(".jpg") {
        Some(stem) => format!("{stem}.{}", format.extension()),
        None => guessed.to_string(),
    }
}

fn degrade(state: &mut DetectorState, error: DetectError) -> DetectError {
    *state = DetectorState::Broken;
    error
}
