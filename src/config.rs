//! Client configuration: defaults, TOML file loading, and a builder.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::dedup::DEFAULT_PREFIX_LEN;
use crate::error::SyncError;
use crate::protocol::Persona;

/// Configuration for the reconciliation client and the HTTP backend client.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the backend HTTP API (e.g. `http://localhost:5000`).
    pub base_url: String,
    /// Persona tasks are submitted under and results are filtered by.
    pub persona: Persona,
    /// How often to poll `/api/get_results/{client_id}`.
    pub result_poll_interval: Duration,
    /// How often to poll `/api/victim_history/{session_id}`.
    pub history_poll_interval: Duration,
    /// TCP connection timeout.
    pub connect_timeout: Duration,
    /// Per-request timeout.
    pub request_timeout: Duration,
    /// Characters of message text that participate in a dedup key.
    pub dedup_prefix_len: usize,
    /// Directory holding the persisted session id.
    pub state_dir: PathBuf,
}

impl ClientConfig {
    /// Create a config with defaults.
    ///
    /// - result_poll_interval: 1 s
    /// - history_poll_interval: 2 s
    /// - connect_timeout: 3 s
    /// - request_timeout: 10 s
    /// - dedup_prefix_len: 50
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            persona: Persona::Victim,
            result_poll_interval: Duration::from_secs(1),
            history_poll_interval: Duration::from_secs(2),
            connect_timeout: Duration::from_secs(3),
            request_timeout: Duration::from_secs(10),
            dedup_prefix_len: DEFAULT_PREFIX_LEN,
            state_dir: PathBuf::from(".relief-sync"),
        }
    }

    pub fn builder(base_url: impl Into<String>) -> ClientConfigBuilder {
        ClientConfigBuilder::new(base_url)
    }

    /// Load a config from a TOML file. Keys absent from the file keep their
    /// defaults; durations are given in milliseconds.
    ///
    /// ```toml
    /// base_url = "http://relief.local:5000"
    /// persona = "supervisor"
    /// result_poll_ms = 1000
    /// history_poll_ms = 2000
    /// ```
    pub fn from_toml_file(path: &Path) -> Result<Self, SyncError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_toml_str(&raw)
    }

    pub fn from_toml_str(raw: &str) -> Result<Self, SyncError> {
        let file: ConfigFile =
            toml::from_str(raw).map_err(|e| SyncError::Config(e.to_string()))?;
        let mut b = ClientConfigBuilder::new(
            file.base_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
        );
        if let Some(p) = file.persona {
            b = b.persona(p);
        }
        if let Some(ms) = file.result_poll_ms {
            b = b.result_poll_interval(Duration::from_millis(ms));
        }
        if let Some(ms) = file.history_poll_ms {
            b = b.history_poll_interval(Duration::from_millis(ms));
        }
        if let Some(ms) = file.connect_timeout_ms {
            b = b.connect_timeout(Duration::from_millis(ms));
        }
        if let Some(ms) = file.request_timeout_ms {
            b = b.request_timeout(Duration::from_millis(ms));
        }
        if let Some(n) = file.dedup_prefix_len {
            b = b.dedup_prefix_len(n);
        }
        if let Some(dir) = file.state_dir {
            b = b.state_dir(dir);
        }
        b.build()
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig::new(DEFAULT_BASE_URL)
    }
}

pub const DEFAULT_BASE_URL: &str = "http://localhost:5000";

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    base_url: Option<String>,
    persona: Option<Persona>,
    result_poll_ms: Option<u64>,
    history_poll_ms: Option<u64>,
    connect_timeout_ms: Option<u64>,
    request_timeout_ms: Option<u64>,
    dedup_prefix_len: Option<usize>,
    state_dir: Option<PathBuf>,
}

/// Builder for [`ClientConfig`].
///
/// # Example
/// ```rust,ignore
/// let config = ClientConfig::builder("http://127.0.0.1:5000")
///     .persona(Persona::Supervisor)
///     .result_poll_interval(Duration::from_millis(500))
///     .build()?;
/// ```
pub struct ClientConfigBuilder {
    config: ClientConfig,
}

impl ClientConfigBuilder {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self { config: ClientConfig::new(base_url) }
    }

    pub fn persona(mut self, persona: Persona) -> Self {
        self.config.persona = persona;
        self
    }

    /// Override the result polling interval (default 1 s).
    pub fn result_poll_interval(mut self, interval: Duration) -> Self {
        self.config.result_poll_interval = interval;
        self
    }

    /// Override the history polling interval (default 2 s).
    pub fn history_poll_interval(mut self, interval: Duration) -> Self {
        self.config.history_poll_interval = interval;
        self
    }

    /// Override the TCP connect timeout (default 3 s).
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.connect_timeout = timeout;
        self
    }

    /// Override the per-request timeout (default 10 s).
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.config.request_timeout = timeout;
        self
    }

    pub fn dedup_prefix_len(mut self, len: usize) -> Self {
        self.config.dedup_prefix_len = len;
        self
    }

    pub fn state_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.state_dir = dir.into();
        self
    }

    /// Consume the builder and validate the result.
    ///
    /// # Errors
    /// Returns [`SyncError::Config`] when an interval is zero, the prefix
    /// length is zero, or the base URL is not http(s).
    pub fn build(self) -> Result<ClientConfig, SyncError> {
        let c = self.config;
        if !(c.base_url.starts_with("http://") || c.base_url.starts_with("https://")) {
            return Err(SyncError::Config(format!(
                "base_url must start with http:// or https://, got '{}'",
                c.base_url
            )));
        }
        if c.result_poll_interval.is_zero() || c.history_poll_interval.is_zero() {
            return Err(SyncError::Config("poll intervals must be non-zero".into()));
        }
        if c.dedup_prefix_len == 0 {
            return Err(SyncError::Config("dedup_prefix_len must be at least 1".into()));
        }
        Ok(ClientConfig {
            base_url: c.base_url.trim_end_matches('/').to_string(),
            ..c
        })
    }
}
