// Request method and per-call options.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use bytes::Bytes;

use super::headers::Headers;
use crate::error::Error;

/// What `request` dispatches on: an HTTP method or a websocket upgrade.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Method {
    Http(reqwest::Method),
    WebSocket,
}

impl Method {
    pub const GET: Method = Method::Http(reqwest::Method::GET);
    pub const POST: Method = Method::Http(reqwest::Method::POST);
    pub const PUT: Method = Method::Http(reqwest::Method::PUT);
    pub const PATCH: Method = Method::Http(reqwest::Method::PATCH);
    pub const DELETE: Method = Method::Http(reqwest::Method::DELETE);
}

impl From<reqwest::Method> for Method {
    fn from(method: reqwest::Method) -> Self {
        Method::Http(method)
    }
}

impl FromStr for Method {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("websocket") {
            return Ok(Method::WebSocket);
        }
        reqwest::Method::from_bytes(s.to_ascii_uppercase().as_bytes())
            .map(Method::Http)
            .map_err(|_| Error::InvalidMethod(s.to_string()))
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Method::Http(method) => write!(f, "{}", method),
            Method::WebSocket => f.write_str("WEBSOCKET"),
        }
    }
}

/// Request payload.
#[derive(Debug, Clone)]
pub enum Body {
    /// `application/x-www-form-urlencoded` pairs.
    Form(Vec<(String, String)>),
    Json(serde_json::Value),
    Text(String),
    Bytes(Bytes),
}

/// Per-call options for the request helpers.
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    /// Replaces the default header set wholesale when non-empty.
    pub headers: Option<Headers>,
    /// Substitute a random user agent.
    pub random_agent: bool,
    pub query: Vec<(String, String)>,
    pub body: Option<Body>,
    /// Overrides the connector's request timeout for this call.
    pub timeout: Option<Duration>,
}

impl RequestOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers
            .get_or_insert_with(Vec::new)
            .push((name.into(), value.into()));
        self
    }

    pub fn headers(mut self, headers: Headers) -> Self {
        self.headers = Some(headers);
        self
    }

    pub fn random_agent(mut self) -> Self {
        self.random_agent = true;
        self
    }

    pub fn query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((name.into(), value.into()));
        self
    }

    pub fn form<K, V>(mut self, pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        let pairs = pairs
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        self.body = Some(Body::Form(pairs));
        self
    }

    pub fn json(mut self, value: serde_json::Value) -> Self {
        self.body = Some(Body::Json(value));
        self
    }

    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.body = Some(Body::Text(text.into()));
        self
    }

    pub fn bytes(mut self, bytes: impl Into<Bytes>) -> Self {
        self.body = Some(Body::Bytes(bytes.into()));
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}
