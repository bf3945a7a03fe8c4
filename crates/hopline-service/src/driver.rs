//! Startup sequence: chains first, then services, in declaration order.

use std::net::SocketAddr;
use std::path::Path;

use hopline_chain::{BuildOptions, ChainRegistry, build_chain_with};
use hopline_config::{
    AuthConfig, ChainConfig, Config, ConnectorConfig, ConnectorKind, DialerConfig, HandlerConfig,
    HandlerKind, HopConfig, NodeConfig, ServiceConfig, TimeoutConfig, load_config,
};
use tokio::sync::mpsc;
use tracing::info;

use crate::error::SetupError;
use crate::service::{RunningService, start_service};

/// Progress reported while [`setup`] runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartupEvent {
    /// A service is bound and accepting.
    Listening {
        service: String,
        addr: SocketAddr,
        handler: HandlerKind,
    },
    /// Startup aborted; no further events follow.
    Failed { reason: String },
    /// Every service started.
    Completed,
}

pub type StartupEvents = mpsc::UnboundedSender<StartupEvent>;

/// Build every chain, then start every service.
///
/// Stops at the first failure. Chains and services set up before it are
/// left in place; the caller decides whether the process goes on.
pub async fn setup(
    config: &Config,
    events: Option<&StartupEvents>,
) -> Result<Vec<RunningService>, SetupError> {
    let result = start_all(config, events).await;
    match &result {
        Ok(_) => emit(events, StartupEvent::Completed),
        Err(e) => emit(
            events,
            StartupEvent::Failed {
                reason: e.to_string(),
            },
        ),
    }
    result
}

/// Load the document at `path`, then [`setup`].
pub async fn setup_from_config(
    path: impl AsRef<Path>,
    events: Option<&StartupEvents>,
) -> Result<Vec<RunningService>, SetupError> {
    let config = match load_config(path) {
        Ok(config) => config,
        Err(e) => {
            let err = SetupError::from(e);
            emit(
                events,
                StartupEvent::Failed {
                    reason: err.to_string(),
                },
            );
            return Err(err);
        }
    };
    setup(&config, events).await
}

/// Build `chains` in order into a registry. A repeated name keeps the last one.
pub fn build_registry(
    chains: &[ChainConfig],
    opts: &BuildOptions,
) -> Result<ChainRegistry, SetupError> {
    let mut registry = ChainRegistry::new();
    for cfg in chains {
        let chain = build_chain_with(cfg, opts).map_err(|source| SetupError::ChainBuild {
            chain: cfg.name.clone(),
            source,
        })?;
        match &chain {
            Some(c) => info!(chain = %cfg.name, hops = c.hops().len(), "chain built"),
            None => info!(chain = %cfg.name, "chain has no usable hops"),
        }
        registry.insert(cfg.name.clone(), chain);
    }
    Ok(registry)
}

/// Name of the chain built by [`start_single_upstream`].
const UPSTREAM_CHAIN: &str = "upstream";

/// Start one `kind` service on `listen` that reaches every target through
/// the SOCKS5 proxy at `remote`, over plain TCP.
///
/// An empty `remote` connects directly. `auth` is sent to the proxy when its
/// username is non-empty.
pub async fn start_single_upstream(
    kind: HandlerKind,
    listen: &str,
    remote: &str,
    auth: Option<AuthConfig>,
    timeouts: &TimeoutConfig,
) -> Result<RunningService, SetupError> {
    let remote = remote.trim();
    let chains = if remote.is_empty() {
        Vec::new()
    } else {
        vec![ChainConfig {
            name: UPSTREAM_CHAIN.to_string(),
            hops: vec![HopConfig {
                name: "hop-0".to_string(),
                nodes: vec![NodeConfig {
                    name: "proxy".to_string(),
                    addr: remote.to_string(),
                    connector: ConnectorConfig {
                        kind: ConnectorKind::Socks5,
                        auth: auth.filter(|a| !a.username.is_empty()),
                    },
                    dialer: DialerConfig::Tcp,
                }],
            }],
        }]
    };
    let registry = build_registry(&chains, &BuildOptions::from(timeouts))?;

    let cfg = ServiceConfig {
        name: kind.to_string(),
        addr: listen.to_string(),
        handler: HandlerConfig {
            kind,
            chain: (!chains.is_empty()).then(|| UPSTREAM_CHAIN.to_string()),
        },
        ..Default::default()
    };
    let service = start_service(&cfg, &registry, timeouts)
        .await
        .map_err(|source| SetupError::ServiceStart {
            service: cfg.name.clone(),
            source,
        })?;
    info!(
        service = %service.name(),
        addr = %service.local_addr(),
        upstream = if remote.is_empty() { "-" } else { remote },
        "service listening"
    );
    Ok(service)
}

async fn start_all(
    config: &Config,
    events: Option<&StartupEvents>,
) -> Result<Vec<RunningService>, SetupError> {
    let registry = build_registry(&config.chains, &BuildOptions::from(&config.timeouts))?;

    let mut running = Vec::with_capacity(config.services.len());
    for cfg in &config.services {
        let service = start_service(cfg, &registry, &config.timeouts)
            .await
            .map_err(|source| SetupError::ServiceStart {
                service: cfg.name.clone(),
                source,
            })?;
        info!(
            service = %service.name(),
            addr = %service.local_addr(),
            handler = %service.handler(),
            chain = cfg.handler.chain_name().unwrap_or("-"),
            "service listening"
        );
        emit(
            events,
            StartupEvent::Listening {
                service: service.name().to_string(),
                addr: service.local_addr(),
                handler: service.handler().clone(),
            },
        );
        running.push(service);
    }
    Ok(running)
}

fn emit(events: Option<&StartupEvents>, event: StartupEvent) {
    if let Some(tx) = events {
        // A dropped receiver means nobody is waiting any more.
        let _ = tx.send(event);
    }
}
