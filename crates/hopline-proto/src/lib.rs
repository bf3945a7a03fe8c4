//! Proxy wire primitives.
//!
//! Both ends of each protocol live here so that the chain connectors
//! (client side) and the listening handlers (server side) agree on the
//! bytes:
//!
//! - [`addr`]: `host:port` targets and node address normalization
//! - [`socks5`]: RFC 1928 CONNECT and RFC 1929 username/password auth
//! - [`http`]: HTTP/1.1 request/response heads for CONNECT proxies

pub mod addr;
pub mod error;
pub mod http;
pub mod socks5;

pub use addr::{TargetAddr, normalize_node_addr};
pub use error::{AddrError, HttpError, Socks5Error};

/// Username/password pair presented to an upstream proxy.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}
