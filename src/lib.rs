//! Shared async HTTP session with request helpers, streaming downloads and
//! cookie-jar utilities, on top of `reqwest` and `tokio-tungstenite`.
//!
//! ```ignore
//! use web_session::{get, RequestOptions, Session};
//!
//! let response = get("https://httpbin.org/get", RequestOptions::new()).await?;
//! println!("{}", response.text().await?);
//! Session::global().close().await;
//! ```

pub mod agent;
pub mod config;
pub mod error;
pub mod http;
pub mod logging;
pub mod session;
pub mod utilities;

pub use agent::{random_agent, COMMON_AGENTS, DEFAULT_AGENT};
pub use config::ClientConfig;
pub use error::{Error, Result};
pub use http::{
    default_headers, delete, download_file, get, patch, post, put, request, websocket, Body,
    Download, Headers, Method, Reply, RequestOptions, WebSocket,
};
pub use session::{ClientSession, Connector, Cookie, CookieJar, SeedCookie, Session};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
