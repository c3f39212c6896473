// Connection settings applied to every client session built by the manager.

use std::time::Duration;

use reqwest::{ClientBuilder, Proxy};

use crate::config::ClientConfig;
use crate::error::Result;

/// Governs how a session opens connections: optional proxy plus pool and timeout knobs.
#[derive(Debug, Clone)]
pub struct Connector {
    proxy_url: Option<String>,
    proxy: Option<Proxy>,
    connect_timeout: Option<Duration>,
    timeout: Option<Duration>,
    pool_max_idle_per_host: usize,
    pool_idle_timeout: Duration,
}

impl Connector {
    /// Direct connections with pool settings from `config`. `config.proxy` is ignored.
    pub fn direct(config: &ClientConfig) -> Self {
        Self {
            proxy_url: None,
            proxy: None,
            connect_timeout: config.connect_timeout(),
            timeout: config.timeout(),
            pool_max_idle_per_host: config.pool_max_idle_per_host,
            pool_idle_timeout: config.pool_idle_timeout(),
        }
    }

    /// Route all traffic through `proxy_url` (http, https or socks5).
    pub fn from_url(proxy_url: &str) -> Result<Self> {
        Self::with_config(proxy_url, &ClientConfig::default())
    }

    pub fn with_config(proxy_url: &str, config: &ClientConfig) -> Result<Self> {
        let proxy = Proxy::all(proxy_url)?;
        Ok(Self {
            proxy_url: Some(proxy_url.to_string()),
            proxy: Some(proxy),
            ..Self::direct(config)
        })
    }

    /// Build from `config`, using `config.proxy` when present.
    pub fn from_config(config: &ClientConfig) -> Result<Self> {
        match config.proxy.as_deref() {
            Some(url) => Self::with_config(url, config),
            None => Ok(Self::direct(config)),
        }
    }

    pub fn proxy_url(&self) -> Option<&str> {
        self.proxy_url.as_deref()
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    pub fn connect_timeout(&self) -> Option<Duration> {
        self.connect_timeout
    }

    /// Apply proxy, pool and timeout settings to a client builder.
    pub(crate) fn configure(&self, builder: ClientBuilder) -> ClientBuilder {
        let mut builder = builder
            .pool_max_idle_per_host(self.pool_max_idle_per_host)
            .pool_idle_timeout(self.pool_idle_timeout)
            .tcp_nodelay(true);
        if let Some(proxy) = &self.proxy {
            builder = builder.proxy(proxy.clone());
        }
        if let Some(timeout) = self.connect_timeout {
            builder = builder.connect_timeout(timeout);
        }
        if let Some(timeout) = self.timeout {
            builder = builder.timeout(timeout);
        }
        builder
    }
}

impl Default for Connector {
    fn default() -> Self {
        Self::direct(&ClientConfig::default())
    }
}
