//! Error types for the request helpers and session manager.

use std::io;
use std::time::Duration;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by requests, downloads and session setup.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// HTTP transport failure (connect refused, DNS, TLS, timeout, bad request).
    #[error("web error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Websocket handshake or transport failure.
    #[error("websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// Proxy refused or garbled the tunnel handshake.
    #[error("proxy error: {0}")]
    Proxy(String),

    /// Websocket connect did not finish within the per-call or connect timeout.
    #[error("Operation timed out after {0:?}")]
    Timeout(Duration),

    /// URL parsing error.
    #[error("URL parse error: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Header name or value rejected by the HTTP layer.
    #[error("Invalid header: {0}")]
    InvalidHeader(String),

    /// Method string is not a valid HTTP token.
    #[error("Invalid method: {0}")]
    InvalidMethod(String),

    /// Configuration could not be parsed.
    #[error("Config error: {0}")]
    Config(#[from] serde_json::Error),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl Error {
    /// Create an invalid header error.
    pub fn invalid_header(message: impl Into<String>) -> Self {
        Self::InvalidHeader(message.into())
    }

    /// True for failures raised by the network layer rather than caller input.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            Self::Transport(_) | Self::WebSocket(_) | Self::Proxy(_) | Self::Timeout(_)
        )
    }
}
