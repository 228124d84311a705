// SPDX-License-Identifier: GPL-3.0-only
use anyhow::Context;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Remote cart service base URL; `/api/carts` is appended to it
    pub api_base_url: String,

    /// Optional token the daemon signs in with on startup
    pub api_token: Option<String>,

    /// User id paired with `api_token`
    pub api_user: String,

    /// Deadline for a single request attempt, in milliseconds
    pub request_timeout_ms: u64,

    /// Attempts per request before the remote is declared unreachable
    pub max_attempts: u32,

    /// First backoff delay, doubled after every failed attempt
    pub backoff_base_ms: u64,

    /// Upper bound for the backoff delay
    pub backoff_cap_ms: u64,

    /// Fixed poll interval while offline
    pub reconnect_interval_secs: u64,

    /// Quiet period before a triggered background resync runs
    pub resync_debounce_ms: u64,

    /// Logging level (trace, debug, info, warn, error)
    pub log_level: String,

    /// Emit JSON log lines instead of human-readable ones
    pub log_json: bool,
}

impl Config {
    /// Load configuration from TOML file with environment variable overrides
    pub fn load() -> anyhow::Result<Self> {
        let config_path = std::env::var("CARTSYNC_CONFIG").unwrap_or_else(|_| "cartsync.toml".to_string());

        let mut config: Config = if std::path::Path::new(&config_path).exists() {
            let contents = std::fs::read_to_string(&config_path)
                .with_context(|| format!("Failed to read config file {}", config_path))?;
            toml::from_str(&contents).with_context(|| format!("Failed to parse config file {}", config_path))?
        } else {
            Config::default()
        };

        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `CARTSYNC_*` overrides from `lookup`
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<()> {
        if let Some(val) = lookup("CARTSYNC_API_BASE_URL") {
            self.api_base_url = val;
        }
        if let Some(val) = lookup("CARTSYNC_API_TOKEN") {
            self.api_token = Some(val);
        }
        if let Some(val) = lookup("CARTSYNC_API_USER") {
            self.api_user = val;
        }
        if let Some(val) = lookup("CARTSYNC_REQUEST_TIMEOUT_MS") {
            self.request_timeout_ms = val.parse().context("CARTSYNC_REQUEST_TIMEOUT_MS")?;
        }
        if let Some(val) = lookup("CARTSYNC_MAX_ATTEMPTS") {
            self.max_attempts = val.parse().context("CARTSYNC_MAX_ATTEMPTS")?;
        }
        if let Some(val) = lookup("CARTSYNC_BACKOFF_BASE_MS") {
            self.backoff_base_ms = val.parse().context("CARTSYNC_BACKOFF_BASE_MS")?;
        }
        if let Some(val) = lookup("CARTSYNC_BACKOFF_CAP_MS") {
            self.backoff_cap_ms = val.parse().context("CARTSYNC_BACKOFF_CAP_MS")?;
        }
        if let Some(val) = lookup("CARTSYNC_RECONNECT_INTERVAL_SECS") {
            self.reconnect_interval_secs = val.parse().context("CARTSYNC_RECONNECT_INTERVAL_SECS")?;
        }
        if let Some(val) = lookup("CARTSYNC_RESYNC_DEBOUNCE_MS") {
            self.resync_debounce_ms = val.parse().context("CARTSYNC_RESYNC_DEBOUNCE_MS")?;
        }
        if let Some(val) = lookup("CARTSYNC_LOG_LEVEL") {
            self.log_level = val;
        }
        if let Some(val) = lookup("CARTSYNC_LOG_JSON") {
            self.log_json = val.parse().context("CARTSYNC_LOG_JSON")?;
        }
        Ok(())
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        crate::utils::validate_base_url(&self.api_base_url).context("Invalid api_base_url")?;

        if self.max_attempts == 0 {
            return Err(anyhow::anyhow!("max_attempts must be at least 1"));
        }
        if self.request_timeout_ms == 0 {
            return Err(anyhow::anyhow!("request_timeout_ms must be greater than 0"));
        }
        if self.backoff_cap_ms < self.backoff_base_ms {
            return Err(anyhow::anyhow!(
                "backoff_cap_ms ({}) must not be lower than backoff_base_ms ({})",
                self.backoff_cap_ms,
                self.backoff_base_ms
            ));
        }
        if self.reconnect_interval_secs == 0 {
            return Err(anyhow::anyhow!("reconnect_interval_secs must be greater than 0"));
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: String::from("http://localhost:3000"),
            api_token: None,
            api_user: String::from("cartsyncd"),
            request_timeout_ms: 5_000,
            max_attempts: 3,
            backoff_base_ms: 1_000,
            backoff_cap_ms: 5_000,
            reconnect_interval_secs: 30,
            resync_debounce_ms: 250,
            log_level: String::from("info"),
            log_json: false,
        }
    }
}
