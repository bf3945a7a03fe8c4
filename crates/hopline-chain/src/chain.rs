//! Chain traversal.
//!
//! Connecting through a chain picks one node per hop, then:
//!
//! 1. dials the first node with its own dialer;
//! 2. for every later node, asks the previous node's connector for a
//!    tunnel to it and runs that node's dialer handshake over the tunnel;
//! 3. asks the last node's connector for a tunnel to the target.
//!
//! Every step is bounded: dialing by the connect timeout, the proxy and
//! transport handshakes by the handshake timeout.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use hopline_config::TimeoutConfig;
use hopline_proto::TargetAddr;
use hopline_transport::BoxedStream;
use tracing::debug;

use crate::error::ChainError;
use crate::hop::Hop;
use crate::node::Node;

/// Per-step bounds applied while connecting through a chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChainTimeouts {
    pub connect: Duration,
    pub handshake: Duration,
}

impl Default for ChainTimeouts {
    fn default() -> Self {
        Self::from(&TimeoutConfig::default())
    }
}

impl From<&TimeoutConfig> for ChainTimeouts {
    fn from(cfg: &TimeoutConfig) -> Self {
        Self {
            connect: Duration::from_secs(cfg.connect_timeout_secs),
            handshake: Duration::from_secs(cfg.handshake_timeout_secs),
        }
    }
}

/// An ordered, non-empty list of hops.
#[derive(Debug)]
pub struct Chain {
    name: String,
    hops: Vec<Hop>,
    timeouts: ChainTimeouts,
}

impl Chain {
    /// Fails when `hops` is empty: an absent chain is modelled as `None`.
    pub fn new(name: impl Into<String>, hops: Vec<Hop>) -> Result<Self, ChainError> {
        let name = name.into();
        if hops.is_empty() {
            return Err(ChainError::EmptyChain(name));
        }
        Ok(Self {
            name,
            hops,
            timeouts: ChainTimeouts::default(),
        })
    }

    pub fn with_timeouts(mut self, timeouts: ChainTimeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn hops(&self) -> &[Hop] {
        &self.hops
    }

    pub fn timeouts(&self) -> ChainTimeouts {
        self.timeouts
    }

    /// Open a stream to `target` through every hop.
    pub async fn connect(&self, target: &TargetAddr) -> Result<BoxedStream, ChainError> {
        let route: Vec<Arc<Node>> = self.hops.iter().map(Hop::select).collect();
        let limits = self.timeouts;

        let first = &route[0];
        let mut stream = self
            .guard(0, first, bounded(limits.connect, "dial", first.addr(), async {
                first.dialer().dial(first.addr()).await.map_err(ChainError::from)
            }))
            .await?;
        debug!(chain = %self.name, hop = 0, node = %first.name(), addr = %first.addr(), "dialed first node");

        for (idx, pair) in route.windows(2).enumerate() {
            let (prev, next) = (&pair[0], &pair[1]);
            let next_target = TargetAddr::parse(next.addr())?;

            stream = self
                .guard(idx, prev, bounded(limits.handshake, "tunnel to", next.addr(), {
                    prev.connector().connect(stream, &next_target, prev.credentials())
                }))
                .await?;

            stream = self
                .guard(idx + 1, next, bounded(limits.handshake, "handshake with", next.addr(), async {
                    next.dialer()
                        .handshake(stream, next.addr())
                        .await
                        .map_err(ChainError::from)
                }))
                .await?;
            debug!(chain = %self.name, hop = idx + 1, node = %next.name(), addr = %next.addr(), "reached node");
        }

        let last = &route[route.len() - 1];
        let target_str = target.to_string();
        let stream = bounded(limits.handshake, "tunnel to", &target_str, {
            last.connector().connect(stream, target, last.credentials())
        })
        .await?;

        for node in &route {
            node.mark_ok();
        }
        debug!(chain = %self.name, target = %target, hops = route.len(), "chain established");
        Ok(stream)
    }

    /// Marks `node` failed in hop `idx` when `fut` fails.
    async fn guard<T>(
        &self,
        idx: usize,
        node: &Node,
        fut: impl Future<Output = Result<T, ChainError>>,
    ) -> Result<T, ChainError> {
        let result = fut.await;
        if let Err(e) = &result {
            self.hops[idx].report_failure(node, e);
        }
        result
    }
}

async fn bounded<T>(
    limit: Duration,
    stage: &'static str,
    addr: &str,
    fut: impl Future<Output = Result<T, ChainError>>,
) -> Result<T, ChainError> {
    tokio::time::timeout(limit, fut)
        .await
        .map_err(|_| ChainError::Timeout {
            stage,
            addr: addr.to_string(),
            timeout: limit,
        })?
}
