//! Client configuration.

use std::{path::PathBuf, str::FromStr, time::Duration};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default backend endpoint.
pub const DEFAULT_URL: &str = "ws://127.0.0.1:8765";

/// Default delay between reconnection attempts.
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_millis(3000);

/// Configuration error.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: &'static str, value: String },
}

/// When to try the connection again after it closes.
///
/// Neither policy ever gives up; only the spacing between attempts differs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ReconnectPolicy {
    /// Constant interval between attempts.
    Fixed { delay_ms: u64 },
    /// Exponential growth from `base_ms`, capped at `max_ms`.
    Backoff { base_ms: u64, max_ms: u64 },
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self::fixed(DEFAULT_RECONNECT_DELAY)
    }
}

impl ReconnectPolicy {
    #[must_use]
    pub fn fixed(delay: Duration) -> Self {
        Self::Fixed {
            delay_ms: u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
        }
    }

    /// Delay before attempt number `attempt` (1-based) after a drop.
    #[must_use]
    pub fn delay(&self, attempt: u32) -> Duration {
        match *self {
            Self::Fixed { delay_ms } => Duration::from_millis(delay_ms),
            Self::Backoff { base_ms, max_ms } => {
                let shift = attempt.saturating_sub(1).min(63);
                let factor = 1_u64.checked_shl(shift).unwrap_or(u64::MAX);
                Duration::from_millis(base_ms.saturating_mul(factor).min(max_ms))
            }
        }
    }
}

/// How inbound frames are matched to pending requests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CorrelationStrategy {
    /// Match on `request_id`; replies without one go to the oldest request.
    #[default]
    ById,
    /// Resolve the oldest request with whatever frame arrives next.
    ///
    /// Concurrent requests can receive each other's replies in this mode.
    NextMessage,
}

impl FromStr for CorrelationStrategy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "by_id" => Ok(Self::ById),
            "next_message" => Ok(Self::NextMessage),
            other => Err(ConfigError::InvalidValue {
                key: "NOTES_CORRELATION",
                value: other.to_string(),
            }),
        }
    }
}

/// Client configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// WebSocket endpoint of the notes server.
    pub url: String,
    pub reconnect: ReconnectPolicy,
    pub correlation: CorrelationStrategy,
    /// File backing the persisted session.
    pub session_file: PathBuf,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_URL.to_string(),
            reconnect: ReconnectPolicy::default(),
            correlation: CorrelationStrategy::default(),
            session_file: default_session_file(),
        }
    }
}

fn default_session_file() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("notes-client")
        .join("session.json")
}

impl ClientConfig {
    /// Defaults overlaid with `NOTES_*` environment variables.
    ///
    /// # Errors
    /// Returns error if a variable holds an unparseable value.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults overlaid with values from `lookup`.
    ///
    /// # Errors
    /// Returns error if a value cannot be parsed.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(url) = lookup("NOTES_WS_URL") {
            config.url = url;
        }
        if let Some(ms) = lookup("NOTES_RECONNECT_MS") {
            let delay_ms = ms.parse().map_err(|_| ConfigError::InvalidValue {
                key: "NOTES_RECONNECT_MS",
                value: ms.clone(),
            })?;
            config.reconnect = ReconnectPolicy::Fixed { delay_ms };
        }
        if let Some(path) = lookup("NOTES_SESSION_FILE") {
            config.session_file = PathBuf::from(path);
        }
        if let Some(strategy) = lookup("NOTES_CORRELATION") {
            config.correlation = strategy.parse()?;
        }

        tracing::debug!(url = %config.url, "loaded client configuration");
        Ok(config)
    }
}
