use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

pub const API_VERSION_PREFIX: &str = "/v1";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid config file: {0}")]
    Parse(String),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Where the stream request carries the access token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenPlacement {
    /// `?token=...`, which is what the events endpoints expect.
    Query,
    /// `Authorization: Bearer ...`.
    Header,
}

impl Default for TokenPlacement {
    fn default() -> Self {
        Self::Query
    }
}

/// How overlapping bulk fetches are reconciled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FetchOrdering {
    /// Responses older than the newest applied one are dropped.
    LatestIssued,
    /// Whichever response resolves last wins.
    LatestResolved,
}

impl FetchOrdering {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::LatestIssued => "latest-issued",
            Self::LatestResolved => "latest-resolved",
        }
    }
}

impl Default for FetchOrdering {
    fn default() -> Self {
        Self::LatestIssued
    }
}

impl std::fmt::Display for FetchOrdering {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for FetchOrdering {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "latest-issued" | "latest_issued" | "issued" => Ok(Self::LatestIssued),
            "latest-resolved" | "latest_resolved" | "resolved" => Ok(Self::LatestResolved),
            _ => Err(format!("unsupported fetch ordering: {value}")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamSettings {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_reconnect_base_ms")]
    pub reconnect_base_ms: u64,
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
    #[serde(default)]
    pub token_placement: TokenPlacement,
}

impl StreamSettings {
    pub fn reconnect_base(&self) -> Duration {
        Duration::from_millis(self.reconnect_base_ms)
    }

    pub fn max_backoff(&self) -> Duration {
        Duration::from_millis(self.max_backoff_ms)
    }
}

impl Default for StreamSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            reconnect_base_ms: default_reconnect_base_ms(),
            max_backoff_ms: default_max_backoff_ms(),
            token_placement: TokenPlacement::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollSettings {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_poll_interval_ms")]
    pub interval_ms: u64,
}

impl PollSettings {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_ms: default_poll_interval_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub request_timeout_ms: Option<u64>,
    #[serde(default)]
    pub stream: StreamSettings,
    #[serde(default)]
    pub poll: PollSettings,
    #[serde(default)]
    pub fetch_ordering: FetchOrdering,
}

/// Loggable summary with the API key redacted.
#[derive(Debug, Clone, Serialize)]
pub struct ClientConfigView {
    pub base_url: String,
    pub api_key_configured: bool,
    pub request_timeout_ms: Option<u64>,
    pub stream: StreamSettings,
    pub poll: PollSettings,
    pub fetch_ordering: FetchOrdering,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_key: None,
            request_timeout_ms: None,
            stream: StreamSettings::default(),
            poll: PollSettings::default(),
            fetch_ordering: FetchOrdering::default(),
        }
    }
}

impl ClientConfig {
    /// Read a JSON config file, then layer environment overrides on top.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        let mut config = serde_json::from_str::<ClientConfig>(&raw).map_err(|error| {
            ConfigError::Parse(format!("{}: {error}", path.as_ref().display()))
        })?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    pub fn apply_env_overrides(&mut self) {
        if let Ok(value) = std::env::var("SCRIBELINE_API_BASE_URL") {
            if !value.trim().is_empty() {
                self.base_url = value.trim().to_string();
            }
        }

        if self.api_key.as_deref().unwrap_or("").trim().is_empty() {
            if let Ok(value) = std::env::var("SCRIBELINE_API_KEY") {
                if !value.trim().is_empty() {
                    self.api_key = Some(value.trim().to_string());
                }
            }
        }

        if let Ok(value) = std::env::var("SCRIBELINE_STREAM_ENABLED") {
            if let Some(enabled) = parse_flag(&value) {
                self.stream.enabled = enabled;
            }
        }

        if let Ok(value) = std::env::var("SCRIBELINE_POLL_INTERVAL_MS") {
            if let Ok(interval_ms) = value.trim().parse::<u64>() {
                self.poll.interval_ms = interval_ms;
            }
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.base_url.trim().is_empty() {
            return Err(ConfigError::Invalid("base_url cannot be empty".to_string()));
        }
        reqwest::Url::parse(self.base_url.trim()).map_err(|error| {
            ConfigError::Invalid(format!("invalid base_url '{}': {error}", self.base_url))
        })?;
        if self.request_timeout_ms == Some(0) {
            return Err(ConfigError::Invalid(
                "request timeout must be greater than 0".to_string(),
            ));
        }
        if self.stream.reconnect_base_ms == 0 {
            return Err(ConfigError::Invalid(
                "stream reconnect base must be greater than 0".to_string(),
            ));
        }
        if self.stream.reconnect_base_ms > self.stream.max_backoff_ms {
            return Err(ConfigError::Invalid(format!(
                "stream reconnect base ({} ms) exceeds max backoff ({} ms)",
                self.stream.reconnect_base_ms, self.stream.max_backoff_ms
            )));
        }
        if self.poll.interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "poll interval must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }

    /// Base URL plus the API version prefix, without a trailing slash.
    pub fn api_root(&self) -> String {
        format!(
            "{}{API_VERSION_PREFIX}",
            self.base_url.trim().trim_end_matches('/')
        )
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_ms.map(Duration::from_millis)
    }

    pub fn to_view(&self) -> ClientConfigView {
        ClientConfigView {
            base_url: self.base_url.clone(),
            api_key_configured: self
                .api_key
                .as_deref()
                .map(|key| !key.trim().is_empty())
                .unwrap_or(false),
            request_timeout_ms: self.request_timeout_ms,
            stream: self.stream.clone(),
            poll: self.poll.clone(),
            fetch_ordering: self.fetch_ordering,
        }
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn default_true() -> bool {
    true
}

fn default_base_url() -> String {
    "http://127.0.0.1:8080".to_string()
}

fn default_reconnect_base_ms() -> u64 {
    3_000
}

fn default_max_backoff_ms() -> u64 {
    30_000
}

fn default_poll_interval_ms() -> u64 {
    5_000
}
