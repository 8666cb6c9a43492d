//! imgdetect Core Library
//!
//! This library resolves links to pages on image-sharing services into
//! concrete, directly embeddable image URLs.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//! - [`detector`] - Detector contract, resilience core, registry and the
//!   Imgur protocol adapter
//! - [`config`] - Detector configuration with file and environment loading

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod detector;
mod user_agent;

// Re-export commonly used types
pub use config::{ConfigError, DetectorConfig};
pub use detector::{
    BackoffPolicy, DetectError, DetectorBackend, DetectorRegistry, DetectorState, ImageDetector,
    ImageFormat, ImageRecord, ImgurBackend, ImgurDetector, ResilientDetector,
};
