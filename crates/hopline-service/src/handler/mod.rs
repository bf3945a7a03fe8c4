//! Listening-side protocols.

mod http;
mod socks5;

pub use http::HttpHandler;
pub use socks5::Socks5Handler;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use hopline_chain::Router;
use hopline_config::{HandlerKind, TimeoutConfig};
use hopline_transport::BoxedStream;

use crate::error::HandlerError;

/// Speaks a proxy protocol to one inbound client.
#[async_trait]
pub trait Handler: Send + Sync {
    fn kind(&self) -> HandlerKind;

    /// Serve `stream` until the client or its upstream goes away.
    async fn handle(&self, stream: BoxedStream, peer: SocketAddr) -> Result<(), HandlerError>;
}

/// How established tunnels are relayed.
#[derive(Debug, Clone, Copy)]
pub struct RelayOptions {
    pub idle_timeout: Duration,
    pub buffer_size: usize,
    pub max_header_bytes: usize,
}

impl From<&TimeoutConfig> for RelayOptions {
    fn from(cfg: &TimeoutConfig) -> Self {
        Self {
            idle_timeout: Duration::from_secs(cfg.idle_timeout_secs),
            buffer_size: cfg.relay_buffer_size,
            max_header_bytes: cfg.max_header_bytes,
        }
    }
}

impl Default for RelayOptions {
    fn default() -> Self {
        Self::from(&TimeoutConfig::default())
    }
}

/// Handler for a resolved `kind`. Unrecognized kinds are served as `http`.
pub fn build_handler(kind: &HandlerKind, router: Router, relay: RelayOptions) -> Arc<dyn Handler> {
    match kind {
        HandlerKind::Socks5 => Arc::new(Socks5Handler::new(router, relay)),
        HandlerKind::Http | HandlerKind::Unrecognized(_) => Arc::new(HttpHandler::new(router, relay)),
    }
}
