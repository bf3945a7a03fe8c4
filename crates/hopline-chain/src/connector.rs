//! Connectors: the proxy protocol spoken to a node once its transport is up.

use std::fmt;

use async_trait::async_trait;
use hopline_core::io::PrefixedStream;
use hopline_proto::{Credentials, TargetAddr, http, socks5};
use hopline_transport::BoxedStream;

use crate::error::ChainError;

/// Asks the proxy at the far end of a stream to open a tunnel.
#[async_trait]
pub trait Connector: fmt::Debug + Send + Sync {
    /// Protocol name as written in configuration.
    fn kind(&self) -> &'static str;

    /// Request a tunnel to `target` over `stream` and return the tunnel.
    async fn connect(
        &self,
        stream: BoxedStream,
        target: &TargetAddr,
        credentials: Option<&Credentials>,
    ) -> Result<BoxedStream, ChainError>;
}

/// SOCKS5 CONNECT, with RFC 1929 authentication when credentials are set.
#[derive(Debug, Clone, Copy, Default)]
pub struct Socks5Connector;

#[async_trait]
impl Connector for Socks5Connector {
    fn kind(&self) -> &'static str {
        "socks5"
    }

    async fn connect(
        &self,
        mut stream: BoxedStream,
        target: &TargetAddr,
        credentials: Option<&Credentials>,
    ) -> Result<BoxedStream, ChainError> {
        socks5::connect(&mut stream, target, credentials).await?;
        Ok(stream)
    }
}

/// HTTP `CONNECT`, with Basic proxy authorization when credentials are set.
#[derive(Debug, Clone, Copy)]
pub struct HttpConnector {
    max_head_bytes: usize,
}

impl HttpConnector {
    pub fn new(max_head_bytes: usize) -> Self {
        Self { max_head_bytes }
    }
}

impl Default for HttpConnector {
    fn default() -> Self {
        Self::new(hopline_core::DEFAULT_MAX_HEADER_BYTES)
    }
}

#[async_trait]
impl Connector for HttpConnector {
    fn kind(&self) -> &'static str {
        "http"
    }

    async fn connect(
        &self,
        mut stream: BoxedStream,
        target: &TargetAddr,
        credentials: Option<&Credentials>,
    ) -> Result<BoxedStream, ChainError> {
        let rest = http::connect(&mut stream, target, credentials, self.max_head_bytes).await?;
        if rest.is_empty() {
            Ok(stream)
        } else {
            Ok(Box::new(PrefixedStream::new(rest, stream)))
        }
    }
}
