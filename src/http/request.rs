// Request dispatch through the shared session: HTTP via reqwest, websocket via tungstenite.

use reqwest::{Client, RequestBuilder, Response};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::{HeaderName, HeaderValue};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, error};
use url::Url;

use super::headers::{default_headers, Headers};
use super::options::{Body, Method, RequestOptions};
use crate::error::{Error, Result};
use crate::session::{tunnel, ClientSession, Session};

/// Client side of an open websocket connection.
pub type WebSocket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Live result of [`Session::request`].
#[derive(Debug)]
pub enum Reply {
    Http(Response),
    WebSocket(Box<WebSocket>),
}

impl Reply {
    pub fn into_http(self) -> Option<Response> {
        match self {
            Reply::Http(response) => Some(response),
            Reply::WebSocket(_) => None,
        }
    }

    pub fn into_websocket(self) -> Option<WebSocket> {
        match self {
            Reply::WebSocket(ws) => Some(*ws),
            Reply::Http(_) => None,
        }
    }
}

impl Session {
    /// Issue `method` against `url` through the shared session.
    ///
    /// The session is created on first use. Transport failures are logged here
    /// and returned as [`Error::Transport`], [`Error::WebSocket`] or [`Error::Timeout`].
    pub async fn request(
        &self,
        method: Method,
        url: &str,
        options: RequestOptions,
    ) -> Result<Reply> {
        match method {
            Method::WebSocket => self
                .websocket(url, options)
                .await
                .map(|ws| Reply::WebSocket(Box::new(ws))),
            Method::Http(method) => self.send(method, url, options).await.map(Reply::Http),
        }
    }

    pub async fn get(&self, url: &str, options: RequestOptions) -> Result<Response> {
        self.send(reqwest::Method::GET, url, options).await
    }

    pub async fn post(&self, url: &str, options: RequestOptions) -> Result<Response> {
        self.send(reqwest::Method::POST, url, options).await
    }

    pub async fn put(&self, url: &str, options: RequestOptions) -> Result<Response> {
        self.send(reqwest::Method::PUT, url, options).await
    }

    pub async fn patch(&self, url: &str, options: RequestOptions) -> Result<Response> {
        self.send(reqwest::Method::PATCH, url, options).await
    }

    pub async fn delete(&self, url: &str, options: RequestOptions) -> Result<Response> {
        self.send(reqwest::Method::DELETE, url, options).await
    }

    /// Open a websocket through the shared session.
    ///
    /// The handshake goes through the session connector's proxy when one is
    /// set, and is bounded by the per-call timeout or else the connect timeout.
    pub async fn websocket(&self, url: &str, options: RequestOptions) -> Result<WebSocket> {
        let headers = default_headers(options.headers, options.random_agent);
        let session = self.ensure()?;

        debug!("{} {} {:?}", Method::WebSocket, url, options.query);

        let connect = connect_websocket(&session, url, &headers, &options.query);
        let limit = options.timeout.or_else(|| session.connector().connect_timeout());
        let result = match limit {
            Some(limit) => tokio::time::timeout(limit, connect)
                .await
                .unwrap_or_else(|_| Err(Error::Timeout(limit))),
            None => connect.await,
        };
        log_failure(result)
    }

    async fn send(
        &self,
        method: reqwest::Method,
        url: &str,
        options: RequestOptions,
    ) -> Result<Response> {
        self.send_with(ClientSession::client, method, url, options).await
    }

    /// Like `get`, but the response body is left encoded as sent.
    pub(crate) async fn get_raw(&self, url: &str, options: RequestOptions) -> Result<Response> {
        self.send_with(ClientSession::raw_client, reqwest::Method::GET, url, options).await
    }

    async fn send_with(
        &self,
        client: fn(&ClientSession) -> &Client,
        method: reqwest::Method,
        url: &str,
        options: RequestOptions,
    ) -> Result<Response> {
        let RequestOptions {
            headers,
            random_agent,
            query,
            body,
            timeout,
        } = options;
        let headers = default_headers(headers, random_agent);
        let session = self.ensure()?;

        debug!("{} {} {:?}", method, url, query);

        let mut builder = client(&session).request(method, url);
        for (name, value) in &headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if !query.is_empty() {
            builder = builder.query(&query);
        }
        if let Some(body) = body {
            builder = apply_body(builder, body);
        }
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        log_failure(builder.send().await.map_err(Error::from))
    }
}

fn log_failure<T>(result: Result<T>) -> Result<T> {
    if let Err(e) = &result {
        if e.is_transport() {
            error!("{}", e);
        }
    }
    result
}

fn apply_body(builder: RequestBuilder, body: Body) -> RequestBuilder {
    match body {
        Body::Form(pairs) => builder.form(&pairs),
        Body::Json(value) => builder.json(&value),
        Body::Text(text) => builder.body(text),
        Body::Bytes(bytes) => builder.body(bytes),
    }
}

/// Open a websocket, carrying the jar's cookies and storing any it sets.
/// Tunnels through the connector's proxy when it has one.
async fn connect_websocket(
    session: &ClientSession,
    url: &str,
    headers: &Headers,
    query: &[(String, String)],
) -> Result<WebSocket> {
    let mut target = Url::parse(url)?;
    if !query.is_empty() {
        target.query_pairs_mut().extend_pairs(query);
    }
    let cookie_url = cookie_url_for(&target);

    let mut request = target.as_str().into_client_request()?;
    for (name, value) in headers {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| Error::invalid_header(format!("{}: {}", name, e)))?;
        let value = HeaderValue::from_str(value)
            .map_err(|e| Error::invalid_header(format!("{}: {}", name, e)))?;
        request.headers_mut().append(name, value);
    }
    if let Some(cookies) = session.cookie_jar().request_header(&cookie_url) {
        let value = HeaderValue::from_str(&cookies)
            .map_err(|e| Error::invalid_header(format!("cookie: {}", e)))?;
        request.headers_mut().insert("cookie", value);
    }

    let (ws, response) = match session.connector().proxy_url() {
        Some(proxy_url) => {
            let host = target
                .host_str()
                .ok_or(Error::InvalidUrl(url::ParseError::EmptyHost))?;
            let port = target
                .port_or_known_default()
                .ok_or(Error::InvalidUrl(url::ParseError::InvalidPort))?;
            let stream = tunnel::open(proxy_url, host, port).await?;
            tokio_tungstenite::client_async_tls(request, stream).await?
        }
        None => tokio_tungstenite::connect_async(request).await?,
    };
    let set_cookies = response
        .headers()
        .get_all("set-cookie")
        .iter()
        .filter_map(|v| v.to_str().ok());
    session
        .cookie_jar()
        .store_set_cookie_headers(set_cookies, &cookie_url);

    debug!("websocket connected: {}", target);
    Ok(ws)
}

/// Cookies are scoped by HTTP origin, so look them up under the matching http(s) scheme.
fn cookie_url_for(target: &Url) -> Url {
    let scheme = match target.scheme() {
        "ws" => "http",
        "wss" => "https",
        _ => return target.clone(),
    };
    let mut url = target.clone();
    // ws/wss and http/https are all special schemes, so the swap cannot fail.
    let _ = url.set_scheme(scheme);
    url
}
