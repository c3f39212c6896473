// Session lifecycle: shared client session, connector and cookie jar.

pub mod connector;
pub mod jar;
pub mod manager;
pub(crate) mod tunnel;

pub use connector::Connector;
pub use jar::{Cookie, CookieJar, SeedCookie};
pub use manager::{ClientSession, Session};
