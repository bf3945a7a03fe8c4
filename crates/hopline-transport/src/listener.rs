//! TCP listener.

use std::net::SocketAddr;

use async_trait::async_trait;
use tracing::debug;

use crate::error::TransportError;
use crate::tcp::apply_tcp_options;
use crate::{BoxedStream, Listener};

pub struct TcpListener {
    inner: tokio::net::TcpListener,
}

impl TcpListener {
    /// Bind `addr`. A bare `:port` binds every IPv4 interface.
    pub async fn bind(addr: &str) -> Result<Self, TransportError> {
        let addr = normalize_listen_addr(addr);
        let inner = tokio::net::TcpListener::bind(addr.as_str())
            .await
            .map_err(|source| TransportError::Bind {
                addr: addr.clone(),
                source,
            })?;
        Ok(Self { inner })
    }
}

#[async_trait]
impl Listener for TcpListener {
    async fn accept(&self) -> Result<(BoxedStream, SocketAddr), TransportError> {
        let (stream, peer) = self.inner.accept().await?;
        // Options are best effort; the peer may already be gone.
        if let Err(e) = apply_tcp_options(&stream, None) {
            debug!(peer = %peer, error = %e, "socket options not applied");
        }
        Ok((Box::new(stream), peer))
    }

    fn local_addr(&self) -> Result<SocketAddr, TransportError> {
        Ok(self.inner.local_addr()?)
    }
}

fn normalize_listen_addr(addr: &str) -> String {
    let addr = addr.trim();
    if addr.starts_with(':') {
        format!("0.0.0.0{addr}")
    } else {
        addr.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_port_binds_all_interfaces() {
        assert_eq!(normalize_listen_addr(":1080"), "0.0.0.0:1080");
        assert_eq!(normalize_listen_addr("127.0.0.1:1080"), "127.0.0.1:1080");
    }

    #[tokio::test]
    async fn accepts_connections() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let client = tokio::spawn(async move { tokio::net::TcpStream::connect(addr).await });
        let (_stream, peer) = listener.accept().await.unwrap();
        assert!(peer.ip().is_loopback());
        client.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn second_bind_on_same_address_fails() {
        let first = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = first.local_addr().unwrap().to_string();
        let err = TcpListener::bind(&addr).await.err().unwrap();
        assert!(matches!(err, TransportError::Bind { .. }), "{err}");
    }

    #[tokio::test]
    async fn invalid_address_is_bind_error() {
        let err = TcpListener::bind("not-an-address").await.err().unwrap();
        assert!(matches!(err, TransportError::Bind { .. }));
    }
}
