//! Hops: interchangeable nodes for one stage of a chain.
//!
//! Selection is round-robin over nodes that are not cooling down after a
//! failure. When every node is cooling down the plain round-robin pick is
//! used, so a hop never refuses to produce a node.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use hopline_core::DEFAULT_NODE_FAILURE_COOLDOWN_SECS;
use tracing::warn;

use crate::error::ChainError;
use crate::node::Node;

#[derive(Debug)]
pub struct Hop {
    name: String,
    nodes: Vec<Arc<Node>>,
    cursor: AtomicUsize,
    cooldown: Duration,
}

impl Hop {
    /// Fails with [`ChainError::EmptyHop`] when `nodes` is empty.
    pub fn new(name: impl Into<String>, nodes: Vec<Node>) -> Result<Self, ChainError> {
        let name = name.into();
        if nodes.is_empty() {
            return Err(ChainError::EmptyHop(name));
        }
        Ok(Self {
            name,
            nodes: nodes.into_iter().map(Arc::new).collect(),
            cursor: AtomicUsize::new(0),
            cooldown: Duration::from_secs(DEFAULT_NODE_FAILURE_COOLDOWN_SECS),
        })
    }

    pub fn with_cooldown(mut self, cooldown: Duration) -> Self {
        self.cooldown = cooldown;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn nodes(&self) -> &[Arc<Node>] {
        &self.nodes
    }

    /// Pick the node for the next connection.
    pub fn select(&self) -> Arc<Node> {
        let len = self.nodes.len();
        let start = self.cursor.fetch_add(1, Ordering::Relaxed);
        (0..len)
            .map(|i| &self.nodes[(start + i) % len])
            .find(|node| node.is_available(self.cooldown))
            .unwrap_or(&self.nodes[start % len])
            .clone()
    }

    pub(crate) fn report_failure(&self, node: &Node, error: &ChainError) {
        warn!(hop = %self.name, node = %node.name(), addr = %node.addr(), error = %error, "node failed");
        node.mark_failed();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connector::Socks5Connector;
    use hopline_transport::TcpDialer;

    fn node(name: &str) -> Node {
        Node::new(
            name,
            format!("{name}.example:1080"),
            Arc::new(Socks5Connector),
            Arc::new(TcpDialer::default()),
        )
    }

    fn hop(names: &[&str]) -> Hop {
        Hop::new("h", names.iter().map(|n| node(n)).collect()).unwrap()
    }

    fn pick(h: &Hop) -> String {
        h.select().name().to_string()
    }

    #[test]
    fn empty_hop_is_rejected() {
        assert!(matches!(Hop::new("h", Vec::new()), Err(ChainError::EmptyHop(_))));
    }

    #[test]
    fn round_robin_cycles() {
        let h = hop(&["a", "b", "c"]);
        let picks: Vec<_> = (0..6).map(|_| pick(&h)).collect();
        assert_eq!(picks, ["a", "b", "c", "a", "b", "c"]);
    }

    #[test]
    fn failed_node_is_skipped_during_cooldown() {
        let h = hop(&["a", "b"]).with_cooldown(Duration::from_secs(60));
        let a = h.nodes()[0].clone();
        h.report_failure(&a, &ChainError::EmptyHop("x".into()));
        for _ in 0..4 {
            assert_eq!(pick(&h), "b");
        }
    }

    #[test]
    fn failed_node_recovers_after_cooldown() {
        let h = hop(&["a", "b"]).with_cooldown(Duration::ZERO);
        let a = h.nodes()[0].clone();
        h.report_failure(&a, &ChainError::EmptyHop("x".into()));
        assert_eq!(pick(&h), "a");
        assert!(a.is_healthy());
    }

    #[test]
    fn all_failed_falls_back_to_round_robin() {
        let h = hop(&["a", "b"]).with_cooldown(Duration::from_secs(60));
        for n in h.nodes().to_vec() {
            h.report_failure(&n, &ChainError::EmptyHop("x".into()));
        }
        assert_eq!(pick(&h), "a");
        assert_eq!(pick(&h), "b");
    }
}
