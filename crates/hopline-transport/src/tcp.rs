//! Plain TCP dialer.

use std::io;
use std::time::Duration;

use async_trait::async_trait;
use hopline_core::defaults::DEFAULT_CONNECT_TIMEOUT_SECS;
use tokio::net::TcpStream;

use crate::error::TransportError;
use crate::{BoxedStream, Dialer};

/// Connects with `TCP_NODELAY` and an optional keepalive, bounded by a timeout.
#[derive(Debug, Clone)]
pub struct TcpDialer {
    connect_timeout: Duration,
    keepalive: Option<Duration>,
}

impl TcpDialer {
    pub fn new(connect_timeout: Duration) -> Self {
        Self {
            connect_timeout,
            keepalive: None,
        }
    }

    pub fn with_keepalive(mut self, interval: Duration) -> Self {
        self.keepalive = Some(interval);
        self
    }

    pub async fn connect(&self, addr: &str) -> Result<TcpStream, TransportError> {
        let stream = tokio::time::timeout(self.connect_timeout, TcpStream::connect(addr))
            .await
            .map_err(|_| {
                io::Error::new(
                    io::ErrorKind::TimedOut,
                    format!("connect to {addr} timed out after {:?}", self.connect_timeout),
                )
            })??;
        apply_tcp_options(&stream, self.keepalive)?;
        Ok(stream)
    }
}

impl Default for TcpDialer {
    fn default() -> Self {
        Self::new(Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS))
    }
}

#[async_trait]
impl Dialer for TcpDialer {
    fn kind(&self) -> &'static str {
        "tcp"
    }

    async fn dial(&self, addr: &str) -> Result<BoxedStream, TransportError> {
        Ok(Box::new(self.connect(addr).await?))
    }

    async fn handshake(
        &self,
        stream: BoxedStream,
        _addr: &str,
    ) -> Result<BoxedStream, TransportError> {
        Ok(stream)
    }
}

pub(crate) fn apply_tcp_options(
    stream: &TcpStream,
    keepalive: Option<Duration>,
) -> Result<(), TransportError> {
    stream.set_nodelay(true)?;
    if let Some(interval) = keepalive {
        let sock = socket2::SockRef::from(stream);
        sock.set_tcp_keepalive(&socket2::TcpKeepalive::new().with_time(interval))?;
    }
    Ok(())
}
