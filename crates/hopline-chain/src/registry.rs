//! Chain lookup by name.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::warn;

use crate::chain::Chain;

/// Built chains keyed by configured name.
///
/// A name maps to `None` when its chain was declared but had no usable
/// hops; services referring to it connect directly.
#[derive(Debug, Default, Clone)]
pub struct ChainRegistry {
    chains: HashMap<String, Option<Arc<Chain>>>,
}

impl ChainRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `chain` under `name`. A repeated name replaces the earlier entry.
    pub fn insert(&mut self, name: impl Into<String>, chain: Option<Chain>) {
        let name = name.into();
        if self.chains.contains_key(&name) {
            warn!(chain = %name, "chain declared more than once, later declaration wins");
        }
        self.chains.insert(name, chain.map(Arc::new));
    }

    /// Usable chain for `name`. Unknown names and empty chains both yield `None`.
    pub fn get(&self, name: &str) -> Option<Arc<Chain>> {
        self.chains.get(name).cloned().flatten()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.chains.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.chains.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chains.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connector::Socks5Connector;
    use crate::hop::Hop;
    use crate::node::Node;
    use hopline_transport::TcpDialer;

    fn chain(name: &str, addr: &str) -> Chain {
        let node = Node::new("n", addr, Arc::new(Socks5Connector), Arc::new(TcpDialer::default()));
        Chain::new(name, vec![Hop::new("h", vec![node]).unwrap()]).unwrap()
    }

    #[test]
    fn lookup_distinguishes_empty_and_unknown() {
        let mut reg = ChainRegistry::new();
        reg.insert("empty", None);
        reg.insert("real", Some(chain("real", "10.0.0.1:1080")));

        assert!(reg.get("real").is_some());
        assert!(reg.get("empty").is_none());
        assert!(reg.contains("empty"));
        assert!(reg.get("missing").is_none());
        assert!(!reg.contains("missing"));
        assert_eq!(reg.len(), 2);
    }

    #[test]
    fn later_declaration_wins() {
        let mut reg = ChainRegistry::new();
        reg.insert("dup", Some(chain("dup", "10.0.0.1:1080")));
        reg.insert("dup", Some(chain("dup", "10.0.0.2:1080")));
        let got = reg.get("dup").unwrap();
        assert_eq!(got.hops()[0].nodes()[0].addr(), "10.0.0.2:1080");
        assert_eq!(reg.len(), 1);
    }
}
