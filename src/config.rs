//! Detector configuration: defaults, config file, and environment overrides.
//!
//! Precedence (lowest to highest): built-in defaults, config file,
//! `IMGUR_CLIENT_ID` environment variable, command-line flags.
//!
//! The config file is a flat `key = value` subset of TOML:
//!
//! ```text
//! client_id = "abcdef123"      # required unless set via env or flag
//! read_timeout_secs = 20
//! backoff_max_secs = 300
//! ```

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;
use url::Url;

use crate::detector::http_client::{DEFAULT_CONNECT_TIMEOUT, DEFAULT_READ_TIMEOUT, HttpTimeouts};
use crate::detector::{BackoffPolicy, DEFAULT_API_BASE_URL, DEFAULT_IMAGE_BASE_URL};

/// Environment variable holding the Imgur client credential.
pub const CLIENT_ID_ENV: &str = "IMGUR_CLIENT_ID";

const DEFAULT_BACKOFF_INITIAL_MS: u64 = 2;
const DEFAULT_BACKOFF_MAX_SECS: u64 = 600;

/// Errors raised while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The config file could not be read
    #[error("failed to read config file '{path}': {reason}")]
    Read {
        /// The file that failed
        path: PathBuf,
        /// Why reading failed
        reason: String,
    },

    /// A line is not `key = value`
    #[error("invalid config syntax on line {line}: expected key = value")]
    Syntax {
        /// 1-indexed line number
        line: usize,
    },

    /// A key is not recognized
    #[error("unknown configuration key '{key}' on line {line}")]
    UnknownKey {
        /// The unrecognized key
        key: String,
        /// 1-indexed line number
        line: usize,
    },

    /// A value is malformed or out of range
    #[error("invalid config value for `{key}`: {reason}")]
    InvalidValue {
        /// The key whose value is invalid
        key: String,
        /// Why it is invalid
        reason: String,
    },

    /// No client credential was provided
    #[error(
        "no Imgur client id configured\n  Suggestion: Set IMGUR_CLIENT_ID, pass --client-id, or add client_id to the config file"
    )]
    MissingClientId,
}

impl ConfigError {
    fn invalid(key: &str, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            key: key.to_string(),
            reason: reason.into(),
        }
    }
}

/// Values read from a config file; unset keys stay `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileConfig {
    pub client_id: Option<String>,
    pub api_base_url: Option<String>,
    pub image_base_url: Option<String>,
    pub connect_timeout_secs: Option<u64>,
    pub read_timeout_secs: Option<u64>,
    pub backoff_initial_ms: Option<u64>,
    pub backoff_max_secs: Option<u64>,
}

/// Fully resolved detector configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetectorConfig {
    /// Static API client credential sent as `Authorization: Client-ID`.
    pub client_id: String,
    /// Base URL of the authenticated API.
    pub api_base_url: String,
    /// Base URL of the direct-image host.
    pub image_base_url: String,
    pub connect_timeout_secs: u64,
    /// Overall deadline for each outbound request.
    pub read_timeout_secs: u64,
    pub backoff_initial_ms: u64,
    pub backoff_max_secs: u64,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            image_base_url: DEFAULT_IMAGE_BASE_URL.to_string(),
            connect_timeout_secs: DEFAULT_CONNECT_TIMEOUT.as_secs(),
            read_timeout_secs: DEFAULT_READ_TIMEOUT.as_secs(),
            backoff_initial_ms: DEFAULT_BACKOFF_INITIAL_MS,
            backoff_max_secs: DEFAULT_BACKOFF_MAX_SECS,
        }
    }
}

impl DetectorConfig {
    /// Default configuration with the given client credential.
    #[must_use]
    pub fn with_client_id(client_id: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            ..Self::default()
        }
    }

    /// Overlays every value set in `file`.
    pub fn merge_file(&mut self, file: &FileConfig) {
        if let Some(client_id) = &file.client_id {
            self.client_id.clone_from(client_id);
        }
        if let Some(url) = &file.api_base_url {
            self.api_base_url.clone_from(url);
        }
        if let Some(url) = &file.image_base_url {
            self.image_base_url.clone_from(url);
        }
        if let Some(secs) = file.connect_timeout_secs {
            self.connect_timeout_secs = secs;
        }
        if let Some(secs) = file.read_timeout_secs {
            self.read_timeout_secs = secs;
        }
        if let Some(ms) = file.backoff_initial_ms {
            self.backoff_initial_ms = ms;
        }
        if let Some(secs) = file.backoff_max_secs {
            self.backoff_max_secs = secs;
        }
    }

    /// Applies `IMGUR_CLIENT_ID` when it is set and non-empty.
    pub fn apply_env(&mut self) {
        if let Some(client_id) = env_var_non_empty(CLIENT_ID_ENV) {
            self.client_id = client_id;
        }
    }

    /// Validates values against runtime constraints.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] describing the first invalid value.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.client_id.trim().is_empty() {
            return Err(ConfigError::MissingClientId);
        }
        validate_base_url("api_base_url", &self.api_base_url)?;
        validate_base_url("image_base_url", &self.image_base_url)?;
        validate_range("connect_timeout_secs", self.connect_timeout_secs, 1, 3600)?;
        validate_range("read_timeout_secs", self.read_timeout_secs, 1, 3600)?;
        validate_range("backoff_initial_ms", self.backoff_initial_ms, 1, 60_000)?;
        validate_range("backoff_max_secs", self.backoff_max_secs, 1, 86_400)?;
        Ok(())
    }

    #[must_use]
    pub fn http_timeouts(&self) -> HttpTimeouts {
        HttpTimeouts {
            connect: Duration::from_secs(self.connect_timeout_secs),
            read: Duration::from_secs(self.read_timeout_secs),
        }
    }

    #[must_use]
    pub fn backoff_policy(&self) -> BackoffPolicy {
        BackoffPolicy::new(
            Duration::from_millis(self.backoff_initial_ms),
            Duration::from_secs(self.backoff_max_secs),
        )
    }
}

fn validate_base_url(key: &str, value: &str) -> Result<(), ConfigError> {
    let url = Url::parse(value).map_err(|error| ConfigError::invalid(key, error.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::invalid(key, "expected an http or https URL"));
    }
    Ok(())
}

fn validate_range(key: &str, value: u64, min: u64, max: u64) -> Result<(), ConfigError> {
    if (min..=max).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::invalid(
            key,
            format!("{value}. Expected range: {min}..={max}"),
        ))
    }
}

/// Resolves the default config path.
///
/// Priority:
/// 1. `$XDG_CONFIG_HOME/imgdetect/config.toml`
/// 2. `$HOME/.config/imgdetect/config.toml`
#[must_use]
pub fn resolve_default_config_path() -> Option<PathBuf> {
    if let Some(xdg_config_home) = env_var_non_empty_os("XDG_CONFIG_HOME") {
        return Some(
            PathBuf::from(xdg_config_home)
                .join("imgdetect")
                .join("config.toml"),
        );
    }

    let home = env_var_non_empty_os("HOME")?;
    Some(
        PathBuf::from(home)
            .join(".config")
            .join("imgdetect")
            .join("config.toml"),
    )
}

fn env_var_non_empty_os(name: &str) -> Option<std::ffi::OsString> {
    let value = env::var_os(name)?;
    if value.is_empty() { None } else { Some(value) }
}

fn env_var_non_empty(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// Reads and parses a config file.
///
/// # Errors
///
/// Returns [`ConfigError`] when the file cannot be read or parsed.
pub fn load_file_config(path: &Path) -> Result<FileConfig, ConfigError> {
    let raw = fs::read_to_string(path).map_err(|error| ConfigError::Read {
        path: path.to_path_buf(),
        reason: error.to_string(),
    })?;
    parse_config_str(&raw)
}

/// Parses config file contents.
///
/// # Errors
///
/// Returns [`ConfigError`] on syntax errors, unknown keys or bad values.
pub fn parse_config_str(raw: &str) -> Result<FileConfig, ConfigError> {
    let mut cfg = FileConfig::default();
    for (line_index, raw_line) in raw.lines().enumerate() {
        let line = strip_inline_comment(raw_line).trim();
        if line.is_empty() {
            continue;
        }

        let Some((raw_key, raw_value)) = line.split_once('=') else {
            return Err(ConfigError::Syntax {
                line: line_index + 1,
            });
        };
        let key = raw_key.trim();
        let value = raw_value.trim();

        match key {
            "client_id" => cfg.client_id = Some(parse_string_literal(key, value)?),
            "api_base_url" => cfg.api_base_url = Some(parse_string_literal(key, value)?),
            "image_base_url" => cfg.image_base_url = Some(parse_string_literal(key, value)?),
            "connect_timeout_secs" => cfg.connect_timeout_secs = Some(parse_integer(key, value)?),
            "read_timeout_secs" => cfg.read_timeout_secs = Some(parse_integer(key, value)?),
            "backoff_initial_ms" => cfg.backoff_initial_ms = Some(parse_integer(key, value)?),
            "backoff_max_secs" => cfg.backoff_max_secs = Some(parse_integer(key, value)?),
            unknown => {
                return Err(ConfigError::UnknownKey {
                    key: unknown.to_string(),
                    line: line_index + 1,
                });
            }
        }
    }
    Ok(cfg)
}

fn strip_inline_comment(line: &str) -> &str {
    let mut in_string = false;
    for (index, ch) in line.char_indices() {
        match ch {
            '"' => in_string = !in_string,
            '#' if !in_string => return &line[..index],
            _ => {}
        }
    }
    line
}

fn parse_string_literal(key: &str, raw_value: &str) -> Result<String, ConfigError> {
    if raw_value.len() < 2 || !raw_value.starts_with('"') || !raw_value.ends_with('"') {
        return Err(ConfigError::invalid(key, "expected double-quoted string"));
    }
    Ok(raw_value[1..raw_value.len() - 1].to_string())
}

fn parse_integer(key: &str, raw_value: &str) -> Result<u64, ConfigError> {
    raw_value
        .parse::<u64>()
        .map_err(|error| ConfigError::invalid(key, format!("'{raw_value}': {error}")))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_config_partial_fields() {
        let cfg = parse_config_str(
            r#"
client_id = "abc123"
read_timeout_secs = 20
"#,
        )
        .unwrap();
        assert_eq!(cfg.client_id.as_deref(), Some("abc123"));
        assert_eq!(cfg.read_timeout_secs, Some(20));
        assert!(cfg.api_base_url.is_none());
    }

    #[test]
    fn test_parse_config_supports_inline_comments() {
        let cfg = parse_config_str(
            r#"
client_id = "a#b" # credential with a hash
backoff_max_secs = 30 # cap
"#,
        )
        .unwrap();
        assert_eq!(cfg.client_id.as_deref(), Some("a#b"));
        assert_eq!(cfg.backoff_max_secs, Some(30));
    }

    #[test]
    fn test_parse_config_rejects_unknown_keys() {
        let err = parse_config_str("gallery_mode = true").unwrap_err();
        assert!(matches!(err, ConfigError::UnknownKey { line: 1, .. }));
        assert!(err.to_string().contains("gallery_mode"));
    }

    #[test]
    fn test_parse_config_rejects_missing_equals() {
        let err = parse_config_str("\nclient_id").unwrap_err();
        assert!(matches!(err, ConfigError::Syntax { line: 2 }));
    }

    #[test]
    fn test_parse_config_rejects_unquoted_string() {
        let err = parse_config_str("client_id = abc").unwrap_err();
        assert!(err.to_string().contains("client_id"));
    }

    #[test]
    fn test_parse_config_rejects_trailing_tokens_in_integer() {
        let err = parse_config_str("read_timeout_secs = 4 trailing").unwrap_err();
        assert!(err.to_string().contains("read_timeout_secs"));
    }

    #[test]
    fn test_parse_config_rejects_negative_integer() {
        let err = parse_config_str("connect_timeout_secs = -1").unwrap_err();
        assert!(err.to_string().contains("connect_timeout_secs"));
    }

    #[test]
    fn test_merge_file_overrides_only_set_values() {
        let mut config = DetectorConfig::default();
        config.merge_file(&FileConfig {
            client_id: Some("from-file".to_string()),
            backoff_initial_ms: Some(50),
            ..FileConfig::default()
        });
        assert_eq!(config.client_id, "from-file");
        assert_eq!(config.backoff_initial_ms, 50);
        assert_eq!(config.read_timeout_secs, 30);
        assert_eq!(config.api_base_url, "https://api.imgur.com/3");
    }

    #[test]
    fn test_validate_requires_client_id() {
        let err = DetectorConfig::default().validate().unwrap_err();
        assert!(matches!(err, ConfigError::MissingClientId));
        assert!(DetectorConfig::with_client_id("abc").validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_out_of_range_timeout() {
        let config = DetectorConfig {
            read_timeout_secs: 0,
            ..DetectorConfig::with_client_id("abc")
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("read_timeout_secs"));
    }

    #[test]
    fn test_validate_rejects_non_http_base_url() {
        let config = DetectorConfig {
            api_base_url: "ftp://api.imgur.com/3".to_string(),
            ..DetectorConfig::with_client_id("abc")
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("api_base_url"));
    }

    #[test]
    fn test_policy_and_timeouts_from_config() {
        let config = DetectorConfig {
            backoff_initial_ms: 100,
            backoff_max_secs: 60,
            connect_timeout_secs: 3,
            ..DetectorConfig::with_client_id("abc")
        };
        let policy = config.backoff_policy();
        assert_eq!(policy.initial_delay(), Duration::from_millis(100));
        assert_eq!(policy.max_delay(), Duration::from_secs(60));
        assert_eq!(config.http_timeouts().connect, Duration::from_secs(3));
    }

    #[test]
    fn test_default_matches_backoff_policy_default() {
        assert_eq!(
            DetectorConfig::default().backoff_policy(),
            BackoffPolicy::default()
        );
    }

    #[test]
    fn test_load_file_config_reports_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_file_config(&dir.path().join("missing.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn test_load_file_config_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "client_id = \"file-id\"\n").unwrap();
        let cfg = load_file_config(&path).unwrap();
        assert_eq!(cfg.client_id.as_deref(), Some("file-id"));
    }
}
