// Cookie jar shared between the reqwest client and the session manager.

use std::collections::HashMap;
use std::convert::Infallible;
use std::fmt;

use bytes::Bytes;
use cookie_store::{CookieDomain, CookieStore, RawCookie};
use parking_lot::Mutex;
use reqwest::header::HeaderValue;
use tracing::{debug, warn};
use url::Url;

/// Snapshot of a cookie held in the jar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cookie {
    pub name: String,
    pub value: String,
    /// Host the cookie belongs to, without a leading dot. Empty if the jar has none.
    pub domain: String,
    pub path: String,
    pub secure: bool,
    pub http_only: bool,
}

impl Cookie {
    fn from_stored(stored: &cookie_store::Cookie<'static>) -> Self {
        Self {
            name: stored.name().to_string(),
            value: stored.value().to_string(),
            domain: stored_domain(stored).to_string(),
            path: String::from(&stored.path),
            secure: stored.secure().unwrap_or(false),
            http_only: stored.http_only().unwrap_or(false),
        }
    }
}

impl fmt::Display for Cookie {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.name, self.value)
    }
}

/// Seed cookie passed to `Session::create`, stored host-only for `domain`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeedCookie {
    pub domain: String,
    pub name: String,
    pub value: String,
}

impl SeedCookie {
    pub fn new(
        domain: impl Into<String>,
        name: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        Self {
            domain: domain.into(),
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Live cookie collection of a client session.
///
/// Storage and RFC 6265 matching are done by `cookie_store`; this type only
/// exposes read, filter and predicate-based delete over it.
#[derive(Default)]
pub struct CookieJar {
    store: Mutex<CookieStore>,
}

impl CookieJar {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert seed cookies as if they had been set by `http://{domain}/`.
    pub fn seed(&self, cookies: &[SeedCookie]) {
        let mut store = self.store.lock();
        for seed in cookies {
            let url = match Url::parse(&format!("http://{}/", seed.domain)) {
                Ok(url) => url,
                Err(e) => {
                    warn!("skipping seed cookie {} for {}: {}", seed.name, seed.domain, e);
                    continue;
                }
            };
            let mut raw = RawCookie::new(seed.name.clone(), seed.value.clone());
            raw.set_path("/");
            if let Err(e) = store.insert_raw(&raw, &url) {
                warn!("rejected seed cookie {} for {}: {}", seed.name, seed.domain, e);
            }
        }
    }

    /// Store `Set-Cookie` header values received from `url`.
    pub fn store_set_cookie_headers<'a, I>(&self, headers: I, url: &Url)
    where
        I: IntoIterator<Item = &'a str>,
    {
        let cookies = headers
            .into_iter()
            .filter_map(|value| RawCookie::parse(value.to_string()).ok())
            .collect::<Vec<_>>();
        if cookies.is_empty() {
            return;
        }
        self.store
            .lock()
            .store_response_cookies(cookies.into_iter(), url);
    }

    /// Value for a `Cookie` request header targeting `url`, if any cookie matches.
    pub fn request_header(&self, url: &Url) -> Option<String> {
        let store = self.store.lock();
        let header = store
            .get_request_values(url)
            .map(|(name, value)| format!("{}={}", name, value))
            .collect::<Vec<_>>()
            .join("; ");
        if header.is_empty() {
            None
        } else {
            Some(header)
        }
    }

    pub fn len(&self) -> usize {
        self.store.lock().iter_any().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Every cookie in the jar, expired ones included.
    pub fn all(&self) -> Vec<Cookie> {
        self.store.lock().iter_any().map(Cookie::from_stored).collect()
    }

    /// Cookies whose domain equals `domain` exactly.
    pub fn for_domain(&self, domain: &str) -> Vec<Cookie> {
        self.store
            .lock()
            .iter_any()
            .filter(|c| stored_domain(c) == domain)
            .map(Cookie::from_stored)
            .collect()
    }

    /// Cookies the jar would send to `url`, keyed by name.
    pub fn filter(&self, url: &Url) -> HashMap<String, Cookie> {
        self.store
            .lock()
            .matches(url)
            .into_iter()
            .map(|c| (c.name().to_string(), Cookie::from_stored(c)))
            .collect()
    }

    pub fn clear(&self) -> usize {
        let mut store = self.store.lock();
        let removed = store.iter_any().count();
        store.clear();
        removed
    }

    /// Remove cookies for `domain` and any of its subdomains.
    pub fn clear_domain(&self, domain: &str) -> usize {
        let suffix = format!(".{}", domain);
        self.clear_where(|c| c.domain == domain || c.domain.ends_with(&suffix))
    }

    /// Remove every cookie matching `predicate`, returning how many were dropped.
    pub fn clear_where<F>(&self, predicate: F) -> usize
    where
        F: Fn(&Cookie) -> bool,
    {
        let mut store = self.store.lock();
        let before = store.iter_any().count();
        let kept = store
            .iter_any()
            .filter(|c| !predicate(&Cookie::from_stored(c)))
            .cloned()
            .map(Ok::<_, Infallible>)
            .collect::<Vec<_>>();
        *store = match CookieStore::from_cookies(kept, true) {
            Ok(rebuilt) => rebuilt,
            Err(never) => match never {},
        };
        let removed = before - store.iter_any().count();
        debug!("cleared {} cookie(s)", removed);
        removed
    }
}

impl fmt::Debug for CookieJar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CookieJar").field("len", &self.len()).finish()
    }
}

impl reqwest::cookie::CookieStore for CookieJar {
    fn set_cookies(&self, cookie_headers: &mut dyn Iterator<Item = &HeaderValue>, url: &Url) {
        let values = cookie_headers
            .filter_map(|v| v.to_str().ok())
            .collect::<Vec<_>>();
        self.store_set_cookie_headers(values, url);
    }

    fn cookies(&self, url: &Url) -> Option<HeaderValue> {
        let header = self.request_header(url)?;
        HeaderValue::from_maybe_shared(Bytes::from(header)).ok()
    }
}

fn stored_domain<'a>(cookie: &'a cookie_store::Cookie<'static>) -> &'a str {
    match &cookie.domain {
        CookieDomain::HostOnly(host) => host.as_str(),
        CookieDomain::Suffix(suffix) => suffix.as_str(),
        CookieDomain::NotPresent | CookieDomain::Empty => "",
    }
}
