//! Client configuration parsed from environment variables.
//!
//! DESIGN
//! ======
//! The API origin and every timeout are carried in an explicit
//! [`ClientConfig`] handed to the consultation client at construction.
//! Nothing reads the environment after startup.

use std::time::Duration;

use crate::consultation::ConsultationMode;
use crate::conversation::StaleReplyPolicy;
use crate::error::ErrorCode;

pub const DEFAULT_API_BASE_URL: &str = "https://cat-consultation-ai.fuzefen121.workers.dev";
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 60_000;
pub const DEFAULT_HEALTH_TIMEOUT_MS: u64 = 10_000;
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_IMAGE_MAX_DIM: u32 = 1024;
pub const DEFAULT_IMAGE_QUALITY: u8 = 80;
pub const DEFAULT_DISPLAY_UTC_OFFSET_HOURS: i8 = 8;

// =============================================================================
// ERROR
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("config parse failed: {key}={value}: {reason}")]
    Parse { key: String, value: String, reason: String },
}

impl ErrorCode for ConfigError {
    fn error_code(&self) -> &'static str {
        "E_CONFIG_PARSE"
    }
}

// =============================================================================
// TYPES
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    pub request: Duration,
    pub health: Duration,
    pub connect: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            request: Duration::from_millis(DEFAULT_REQUEST_TIMEOUT_MS),
            health: Duration::from_millis(DEFAULT_HEALTH_TIMEOUT_MS),
            connect: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
        }
    }
}

/// Optional client-side recompression applied before an image is encoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompressionSettings {
    pub max_width: u32,
    pub max_height: u32,
    pub quality: u8,
}

impl Default for CompressionSettings {
    fn default() -> Self {
        Self { max_width: DEFAULT_IMAGE_MAX_DIM, max_height: DEFAULT_IMAGE_MAX_DIM, quality: DEFAULT_IMAGE_QUALITY }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub base_url: String,
    pub timeouts: Timeouts,
    pub mode: ConsultationMode,
    /// `None` sends images as selected.
    pub compression: Option<CompressionSettings>,
    pub stale_replies: StaleReplyPolicy,
    pub display_utc_offset_hours: i8,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_API_BASE_URL.to_owned(),
            timeouts: Timeouts::default(),
            mode: ConsultationMode::Simple,
            compression: None,
            stale_replies: StaleReplyPolicy::Append,
            display_utc_offset_hours: DEFAULT_DISPLAY_UTC_OFFSET_HOURS,
        }
    }
}

impl ClientConfig {
    /// Config pointing at `base_url` with every other value defaulted.
    #[must_use]
    pub fn with_base_url(base_url: &str) -> Self {
        Self { base_url: normalize_base_url(base_url), ..Self::default() }
    }

    /// Replace the origin, e.g. from a command-line flag.
    pub fn set_base_url(&mut self, base_url: &str) {
        self.base_url = normalize_base_url(base_url);
    }

    /// Build typed client config from environment variables.
    ///
    /// All optional:
    /// - `CONSULT_API_BASE_URL`: remote origin (trailing `/` trimmed)
    /// - `CONSULT_REQUEST_TIMEOUT_MS`: default 60000
    /// - `CONSULT_HEALTH_TIMEOUT_MS`: default 10000
    /// - `CONSULT_CONNECT_TIMEOUT_SECS`: default 10
    /// - `CONSULT_MODE`: `simple` (default) or `workflow`
    /// - `CONSULT_COMPRESS_IMAGES`: `true`/`false` (default false)
    /// - `CONSULT_IMAGE_MAX_DIM`: default 1024
    /// - `CONSULT_IMAGE_QUALITY`: 1-100, default 80
    /// - `CONSULT_STALE_REPLIES`: `append` (default) or `discard`
    /// - `CONSULT_DISPLAY_UTC_OFFSET_HOURS`: default 8
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] when a present variable cannot be parsed.
    pub fn from_env() -> Result<Self, ConfigError> {
        let base_url = std::env::var("CONSULT_API_BASE_URL")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .map_or_else(|| DEFAULT_API_BASE_URL.to_owned(), |v| normalize_base_url(&v));

        let timeouts = Timeouts {
            request: Duration::from_millis(env_parse("CONSULT_REQUEST_TIMEOUT_MS", DEFAULT_REQUEST_TIMEOUT_MS)?),
            health: Duration::from_millis(env_parse("CONSULT_HEALTH_TIMEOUT_MS", DEFAULT_HEALTH_TIMEOUT_MS)?),
            connect: Duration::from_secs(env_parse("CONSULT_CONNECT_TIMEOUT_SECS", DEFAULT_CONNECT_TIMEOUT_SECS)?),
        };

        let mode = match std::env::var("CONSULT_MODE").ok() {
            Some(raw) => raw
                .parse::<ConsultationMode>()
                .map_err(|reason| parse_error("CONSULT_MODE", &raw, reason))?,
            None => ConsultationMode::Simple,
        };

        let compression = if env_parse("CONSULT_COMPRESS_IMAGES", false)? {
            let max_dim = env_parse("CONSULT_IMAGE_MAX_DIM", DEFAULT_IMAGE_MAX_DIM)?;
            let quality = env_parse("CONSULT_IMAGE_QUALITY", DEFAULT_IMAGE_QUALITY)?;
            if !(1..=100).contains(&quality) {
                return Err(parse_error("CONSULT_IMAGE_QUALITY", &quality.to_string(), "expected 1-100".into()));
            }
            Some(CompressionSettings { max_width: max_dim, max_height: max_dim, quality })
        } else {
            None
        };

        let stale_replies = match std::env::var("CONSULT_STALE_REPLIES").ok() {
            Some(raw) => raw
                .parse::<StaleReplyPolicy>()
                .map_err(|reason| parse_error("CONSULT_STALE_REPLIES", &raw, reason))?,
            None => StaleReplyPolicy::Append,
        };

        let display_utc_offset_hours =
            env_parse("CONSULT_DISPLAY_UTC_OFFSET_HOURS", DEFAULT_DISPLAY_UTC_OFFSET_HOURS)?;

        Ok(Self { base_url, timeouts, mode, compression, stale_replies, display_utc_offset_hours })
    }

    pub(crate) fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

fn normalize_base_url(raw: &str) -> String {
    raw.trim().trim_end_matches('/').to_owned()
}

fn env_parse<T>(key: &str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| parse_error(key, &raw, e.to_string())),
        Err(_) => Ok(default),
    }
}

fn parse_error(key: &str, value: &str, reason: String) -> ConfigError {
    ConfigError::Parse { key: key.to_owned(), value: value.to_owned(), reason }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
