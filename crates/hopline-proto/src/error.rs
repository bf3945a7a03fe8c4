//! Wire-level error types.

use std::fmt;

/// Target address parse errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AddrError {
    #[error("missing port in address {0:?}")]
    MissingPort(String),
    #[error("invalid port in address {0:?}")]
    InvalidPort(String),
    #[error("empty host in address {0:?}")]
    EmptyHost(String),
    #[error("domain name longer than 255 bytes")]
    DomainTooLong,
}

/// SOCKS5 protocol errors.
#[derive(Debug)]
pub enum Socks5Error {
    Io(std::io::Error),
    InvalidVersion(u8),
    NoAcceptableMethods,
    AuthFailed,
    UnsupportedCommand(u8),
    UnsupportedAddressType(u8),
    /// The upstream answered a CONNECT with a non-zero reply code.
    Rejected(u8),
    Addr(AddrError),
}

impl fmt::Display for Socks5Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "io: {e}"),
            Self::InvalidVersion(v) => write!(f, "invalid SOCKS version: 0x{v:02x}"),
            Self::NoAcceptableMethods => write!(f, "no acceptable authentication methods"),
            Self::AuthFailed => write!(f, "username/password authentication rejected"),
            Self::UnsupportedCommand(c) => write!(f, "unsupported command: 0x{c:02x}"),
            Self::UnsupportedAddressType(a) => write!(f, "unsupported address type: 0x{a:02x}"),
            Self::Rejected(code) => write!(f, "request rejected with reply 0x{code:02x}"),
            Self::Addr(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for Socks5Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::Addr(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Socks5Error {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<AddrError> for Socks5Error {
    fn from(e: AddrError) -> Self {
        Self::Addr(e)
    }
}

/// HTTP proxy protocol errors.
#[derive(Debug, thiserror::Error)]
pub enum HttpError {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("connection closed before the message head ended")]
    UnexpectedEof,
    #[error("message head exceeds {0} bytes")]
    HeadTooLarge(usize),
    #[error("malformed message head: {0}")]
    Malformed(&'static str),
    #[error("proxy answered CONNECT with {status} {reason}")]
    Rejected { status: u16, reason: String },
    #[error(transparent)]
    Addr(#[from] AddrError),
}
