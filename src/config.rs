use std::time::Duration;

use serde::Deserialize;

use crate::error::Result;

/// Grace period after closing a session so pooled connections can settle (250 ms).
pub const DEFAULT_CLOSE_DELAY_MS: u64 = 250;

/// Read size used by `download_file` when the caller does not pick one (4 KB).
pub const DEFAULT_CHUNK_SIZE: usize = 4 * 1024;

/// Idle connections kept per host in the session pool.
pub const DEFAULT_POOL_MAX_IDLE_PER_HOST: usize = 32;

/// Seconds an idle pooled connection is kept before being closed.
pub const DEFAULT_POOL_IDLE_TIMEOUT_SECS: u64 = 90;

/// Top-level configuration for a [`Session`](crate::Session).
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Delay awaited by `close()` after releasing the session.
    pub close_delay_ms: u64,
    /// Default read size for streaming downloads.
    pub chunk_size: usize,
    /// TCP + TLS connect timeout, unbounded when unset.
    pub connect_timeout_secs: Option<u64>,
    /// Whole-request timeout, unbounded when unset.
    pub timeout_secs: Option<u64>,
    pub pool_max_idle_per_host: usize,
    pub pool_idle_timeout_secs: u64,
    /// Proxy used when no connector is passed to `create()`.
    pub proxy: Option<String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            close_delay_ms: DEFAULT_CLOSE_DELAY_MS,
            chunk_size: DEFAULT_CHUNK_SIZE,
            connect_timeout_secs: None,
            timeout_secs: None,
            pool_max_idle_per_host: DEFAULT_POOL_MAX_IDLE_PER_HOST,
            pool_idle_timeout_secs: DEFAULT_POOL_IDLE_TIMEOUT_SECS,
            proxy: None,
        }
    }
}

impl ClientConfig {
    /// Parse a config from JSON; missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn close_delay(&self) -> Duration {
        Duration::from_millis(self.close_delay_ms)
    }

    pub fn connect_timeout(&self) -> Option<Duration> {
        self.connect_timeout_secs.map(Duration::from_secs)
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }

    pub fn pool_idle_timeout(&self) -> Duration {
        Duration::from_secs(self.pool_idle_timeout_secs)
    }
}
