//! Transports for reaching nodes and accepting clients.
//!
//! A [`Dialer`] establishes the byte stream to a node: either a fresh
//! connection ([`Dialer::dial`]) or, deeper in a chain, an upgrade of a
//! tunnel that the previous hop already opened ([`Dialer::handshake`]).
//! A [`Listener`] accepts inbound streams for a service.
//!
//! # Transports
//!
//! - [`tcp`]: plain TCP dialer and listener.
//! - [`ws`]: WebSocket dialer, optionally over TLS (`ws`, `wss`, `mwss`).
//! - [`tls`]: rustls client configuration shared by the TLS dialers.

pub mod error;
pub mod listener;
pub mod tcp;
pub mod tls;
pub mod ws;

use std::fmt;
use std::net::SocketAddr;

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncWrite};

pub use error::TransportError;
pub use listener::TcpListener;
pub use tcp::TcpDialer;
pub use ws::{WsDialer, WsFlavor, WsSettings};

/// Marker trait for streams that can be relayed and boxed.
pub trait TransportStream: AsyncRead + AsyncWrite + Unpin + Send + 'static {}

impl<T: AsyncRead + AsyncWrite + Unpin + Send + 'static> TransportStream for T {}

/// Type-erased stream passed between dialers, connectors and handlers.
pub type BoxedStream = Box<dyn TransportStream>;

/// Establishes the transport to a node.
#[async_trait]
pub trait Dialer: fmt::Debug + Send + Sync {
    /// Transport name as written in configuration.
    fn kind(&self) -> &'static str;

    /// Open a new connection to `addr`.
    async fn dial(&self, addr: &str) -> Result<BoxedStream, TransportError>;

    /// Run this transport's handshake over `stream`, which already reaches `addr`.
    async fn handshake(
        &self,
        stream: BoxedStream,
        addr: &str,
    ) -> Result<BoxedStream, TransportError>;
}

/// Accepts inbound connections on a bound address.
#[async_trait]
pub trait Listener: Send + Sync {
    async fn accept(&self) -> Result<(BoxedStream, SocketAddr), TransportError>;

    fn local_addr(&self) -> Result<SocketAddr, TransportError>;
}
