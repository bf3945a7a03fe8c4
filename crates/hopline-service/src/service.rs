//! Starting a service: bind, wire the handler to its chain, spawn the
//! accept loop.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use hopline_chain::{ChainRegistry, Router};
use hopline_config::{HandlerKind, ServiceConfig, TimeoutConfig};
use hopline_transport::{Listener, TcpListener};
use tokio::task::JoinHandle;
use tracing::{Instrument, debug, error, info_span, warn};

use crate::error::ServiceError;
use crate::handler::{Handler, RelayOptions, build_handler};

/// Pause after a failed accept so a persistent error (fd exhaustion)
/// does not spin the loop.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(50);

/// A started service. Its accept loop keeps running when this is dropped.
#[derive(Debug)]
pub struct RunningService {
    name: String,
    local_addr: SocketAddr,
    handler: HandlerKind,
    task: JoinHandle<()>,
}

impl RunningService {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn handler(&self) -> &HandlerKind {
        &self.handler
    }

    /// True once the accept loop has exited.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

/// Bind `cfg.addr` and start serving it.
///
/// A chain reference that names no chain, or a chain without usable hops,
/// leaves the service connecting directly. Only the bind can fail.
pub async fn start_service(
    cfg: &ServiceConfig,
    registry: &ChainRegistry,
    timeouts: &TimeoutConfig,
) -> Result<RunningService, ServiceError> {
    // tcp is the only listener; resolving still reports unknown kinds.
    cfg.listener.kind.resolve("listener.type", &cfg.name);
    let listen_err = |source| ServiceError::Listen {
        addr: cfg.addr.clone(),
        source,
    };
    let listener = TcpListener::bind(&cfg.addr).await.map_err(listen_err)?;
    let local_addr = listener.local_addr().map_err(listen_err)?;

    let chain = cfg.handler.chain_name().and_then(|name| {
        let chain = registry.get(name);
        if chain.is_none() {
            if registry.contains(name) {
                debug!(service = %cfg.name, chain = name, "chain has no hops, connecting directly");
            } else {
                warn!(service = %cfg.name, chain = name, "unknown chain, connecting directly");
            }
        }
        chain
    });
    let router = Router::new(chain, Duration::from_secs(timeouts.connect_timeout_secs));

    let kind = cfg.handler.kind.resolve("handler.type", &cfg.name);
    let handler = build_handler(&kind, router, RelayOptions::from(timeouts));

    let span = info_span!("service", service = %cfg.name, addr = %local_addr);
    let task = tokio::spawn(accept_loop(listener, handler).instrument(span));

    Ok(RunningService {
        name: cfg.name.clone(),
        local_addr,
        handler: kind,
        task,
    })
}

async fn accept_loop<L: Listener>(listener: L, handler: Arc<dyn Handler>) {
    loop {
        let (stream, peer) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(e) => {
                error!(error = %e, "failed to accept connection");
                tokio::time::sleep(ACCEPT_BACKOFF).await;
                continue;
            }
        };
        let handler = handler.clone();
        tokio::spawn(
            async move {
                if let Err(e) = handler.handle(stream, peer).await {
                    debug!(error = %e, "connection ended with error");
                }
            }
            .instrument(info_span!("conn", peer = %peer)),
        );
    }
}
