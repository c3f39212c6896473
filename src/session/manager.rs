// Session manager. Owns the shared client session, its cookie jar and the connector.

use std::collections::HashMap;
use std::sync::{Arc, LazyLock};
use std::time::Duration;

use parking_lot::Mutex;
use reqwest::Client;
use tracing::{debug, warn};
use url::Url;

use super::connector::Connector;
use super::jar::{Cookie, CookieJar, SeedCookie};
use crate::config::ClientConfig;
use crate::error::Result;

static GLOBAL: LazyLock<Session> = LazyLock::new(Session::default);

/// An open client session: pooled reqwest client plus the jar it writes cookies into.
///
/// Cloning is cheap and shares the pool and the jar.
#[derive(Debug, Clone)]
pub struct ClientSession {
    client: Client,
    // Same jar and connector, but leaves bodies encoded so downloads see the
    // announced Content-Length.
    raw_client: Client,
    jar: Arc<CookieJar>,
    connector: Connector,
}

impl ClientSession {
    fn build(connector: Connector, cookies: Option<&[SeedCookie]>) -> Result<Self> {
        let jar = Arc::new(CookieJar::new());
        if let Some(cookies) = cookies {
            jar.seed(cookies);
        }

        let client = connector
            .configure(Client::builder().cookie_provider(Arc::clone(&jar)))
            .build()?;
        let raw_client = connector
            .configure(Client::builder().cookie_provider(Arc::clone(&jar)))
            .no_gzip()
            .no_deflate()
            .build()?;

        Ok(Self {
            client,
            raw_client,
            jar,
            connector,
        })
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    /// Client that does not decompress response bodies.
    pub(crate) fn raw_client(&self) -> &Client {
        &self.raw_client
    }

    pub fn cookie_jar(&self) -> &Arc<CookieJar> {
        &self.jar
    }

    /// Connector the session was built with.
    pub fn connector(&self) -> &Connector {
        &self.connector
    }
}

#[derive(Default)]
struct State {
    session: Option<ClientSession>,
    connector: Option<Connector>,
}

struct Shared {
    config: ClientConfig,
    state: Mutex<State>,
}

/// Holds at most one client session and an optional connector.
///
/// `Session::global()` backs the free request helpers; tests and embedders
/// can build their own instance with [`Session::new`] and pass it around.
#[derive(Clone)]
pub struct Session {
    shared: Arc<Shared>,
}

impl Session {
    /// New manager with no session. `config.proxy`, when set, seeds the connector.
    pub fn new(config: ClientConfig) -> Self {
        let connector = Some(configured_connector(&config)).filter(|c| c.proxy_url().is_some());

        Self {
            shared: Arc::new(Shared {
                config,
                state: Mutex::new(State {
                    session: None,
                    connector,
                }),
            }),
        }
    }

    /// Process-wide manager used by `web_session::get` and friends.
    pub fn global() -> &'static Session {
        &GLOBAL
    }

    pub fn config(&self) -> &ClientConfig {
        &self.shared.config
    }

    /// Build a new client session and store it as the shared one.
    ///
    /// A supplied `connector` replaces the stored connector. Any previous
    /// session is released; in-flight requests keep their own client clone.
    pub fn create(
        &self,
        cookies: Option<&[SeedCookie]>,
        connector: Option<Connector>,
    ) -> Result<ClientSession> {
        let mut state = self.shared.state.lock();
        if let Some(connector) = connector {
            state.connector = Some(connector);
        }

        let connector = self.effective_connector(&state);
        let session = ClientSession::build(connector.clone(), cookies)?;
        if state.session.replace(session.clone()).is_some() {
            debug!("replaced existing session");
        }
        debug!(
            "creating session, proxy: {:?}, seed cookies: {}",
            connector.proxy_url(),
            cookies.map_or(0, <[SeedCookie]>::len)
        );

        Ok(session)
    }

    /// Current session, creating one with no seed cookies if absent.
    ///
    /// Creation happens under the state lock, so concurrent first callers share one session.
    pub fn ensure(&self) -> Result<ClientSession> {
        let mut state = self.shared.state.lock();
        if let Some(session) = &state.session {
            return Ok(session.clone());
        }

        let connector = self.effective_connector(&state);
        let session = ClientSession::build(connector.clone(), None)?;
        state.session = Some(session.clone());
        debug!("creating session, proxy: {:?}", connector.proxy_url());
        Ok(session)
    }

    fn effective_connector(&self, state: &State) -> Connector {
        state
            .connector
            .clone()
            .unwrap_or_else(|| configured_connector(&self.shared.config))
    }

    /// The active session, if any.
    pub fn current(&self) -> Option<ClientSession> {
        self.shared.state.lock().session.clone()
    }

    pub fn is_open(&self) -> bool {
        self.shared.state.lock().session.is_some()
    }

    /// The stored connector, if any.
    pub fn connector(&self) -> Option<Connector> {
        self.shared.state.lock().connector.clone()
    }

    /// Close the session using the configured grace delay.
    pub async fn close(&self) {
        self.close_with_delay(self.shared.config.close_delay()).await;
    }

    /// Release the session and wait `delay` for pooled connections to settle.
    /// No-op when there is no session.
    pub async fn close_with_delay(&self, delay: Duration) {
        let session = self.shared.state.lock().session.take();
        let Some(session) = session else {
            return;
        };

        drop(session);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        debug!("closing session");
    }

    /// Drop the stored connector. No-op when there is none.
    pub fn close_connector(&self) {
        if let Some(connector) = self.shared.state.lock().connector.take() {
            debug!("closing connector, proxy: {:?}", connector.proxy_url());
        }
    }

    /// Close the session, then the connector.
    pub async fn reset(&self) {
        self.close().await;
        self.close_connector();
    }

    /// Hand the session to the caller without closing it.
    pub fn detach(&self) -> Option<ClientSession> {
        let session = self.shared.state.lock().session.take();
        if session.is_some() {
            debug!("detached session");
        }
        session
    }

    /// The live cookie jar of the current session.
    pub fn cookie_jar(&self) -> Option<Arc<CookieJar>> {
        self.current().map(|s| Arc::clone(s.cookie_jar()))
    }

    /// Cookies whose domain equals `domain`; `None` when there are none.
    pub fn cookies(&self, domain: &str) -> Option<Vec<Cookie>> {
        let cookies = self.cookie_jar()?.for_domain(domain);
        if cookies.is_empty() {
            None
        } else {
            Some(cookies)
        }
    }

    /// The cookie named `name` among `cookies(domain)`.
    pub fn cookie(&self, domain: &str, name: &str) -> Option<Cookie> {
        self.cookies(domain)?.into_iter().find(|c| c.name == name)
    }

    /// Cookies the jar would send to `request_url`, keyed by name.
    pub fn filter_cookies(&self, request_url: &str) -> Option<HashMap<String, Cookie>> {
        let jar = self.cookie_jar()?;
        match Url::parse(request_url) {
            Ok(url) => Some(jar.filter(&url)),
            Err(e) => {
                warn!("cannot filter cookies for {}: {}", request_url, e);
                None
            }
        }
    }

    /// Remove every cookie; returns how many were removed.
    pub fn delete_all_cookies(&self) -> usize {
        self.cookie_jar().map_or(0, |jar| jar.clear())
    }

    /// Remove cookies for `domain` and its subdomains.
    pub fn delete_cookies_by_domain(&self, domain: &str) -> usize {
        self.cookie_jar()
            .map_or(0, |jar| jar.clear_domain(domain))
    }

    /// Remove the cookie `name` set for `domain`, if present.
    pub fn delete_cookie_by_name(&self, domain: &str, name: &str) -> usize {
        let (Some(jar), Some(cookie)) = (self.cookie_jar(), self.cookie(domain, name)) else {
            return 0;
        };
        jar.clear_where(|c| c.name == cookie.name && c.domain == cookie.domain)
    }
}

/// Connector described by `config`, falling back to direct connections when
/// `config.proxy` does not parse.
fn configured_connector(config: &ClientConfig) -> Connector {
    Connector::from_config(config).unwrap_or_else(|e| {
        warn!("ignoring configured proxy: {}", e);
        Connector::direct(config)
    })
}

impl Default for Session {
    fn default() -> Self {
        Self::new(ClientConfig::default())
    }
}
