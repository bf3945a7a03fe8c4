//! Error types for the chain crate.

use std::time::Duration;

use hopline_proto::{AddrError, HttpError, Socks5Error};
use hopline_transport::TransportError;
use thiserror::Error;

/// Errors raised while building a chain or connecting through one.
#[derive(Error, Debug)]
pub enum ChainError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("transport: {0}")]
    Transport(#[from] TransportError),

    #[error("socks5: {0}")]
    Socks5(#[from] Socks5Error),

    #[error("http: {0}")]
    Http(#[from] HttpError),

    #[error("address: {0}")]
    Addr(#[from] AddrError),

    #[error("node {node}: cannot construct dialer: {source}")]
    DialerConstruction {
        node: String,
        #[source]
        source: TransportError,
    },

    #[error("hop {0} has no nodes")]
    EmptyHop(String),

    #[error("chain {0} has no hops")]
    EmptyChain(String),

    #[error("{stage} {addr} timed out after {timeout:?}")]
    Timeout {
        stage: &'static str,
        addr: String,
        timeout: Duration,
    },
}

impl ChainError {
    /// The I/O error kind behind this failure, when there is one.
    pub fn io_kind(&self) -> Option<std::io::ErrorKind> {
        match self {
            Self::Io(e) => Some(e.kind()),
            Self::Transport(TransportError::Io(e)) => Some(e.kind()),
            Self::Socks5(Socks5Error::Io(e)) => Some(e.kind()),
            Self::Http(HttpError::Io(e)) => Some(e.kind()),
            Self::Timeout { .. } => Some(std::io::ErrorKind::TimedOut),
            _ => None,
        }
    }
}
