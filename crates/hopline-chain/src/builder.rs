//! Turns chain configuration into a runnable [`Chain`].
//!
//! Building is forgiving: unknown connector or dialer types fall back to
//! `socks5` and `tcp` with a warning, and hops without nodes are dropped.
//! The only hard failure is a dialer that cannot be constructed (a bad TLS
//! server name or header).

use std::sync::Arc;
use std::time::Duration;

use hopline_config::{ChainConfig, ConnectorKind, DialerConfig, NodeConfig, TimeoutConfig, WsOptions};
use hopline_proto::{Credentials, normalize_node_addr};
use hopline_transport::{Dialer, TcpDialer, WsDialer, WsFlavor, WsSettings};
use tracing::{debug, warn};

use crate::chain::{Chain, ChainTimeouts};
use crate::connector::{Connector, HttpConnector, Socks5Connector};
use crate::error::ChainError;
use crate::hop::Hop;
use crate::node::Node;

/// Knobs applied to every chain built from one document.
#[derive(Debug, Clone, Copy)]
pub struct BuildOptions {
    pub timeouts: ChainTimeouts,
    pub node_cooldown: Duration,
    /// Keepalive on TCP connections to nodes.
    pub keepalive: Option<Duration>,
    pub max_header_bytes: usize,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self::from(&TimeoutConfig::default())
    }
}

impl From<&TimeoutConfig> for BuildOptions {
    fn from(cfg: &TimeoutConfig) -> Self {
        Self {
            timeouts: ChainTimeouts::from(cfg),
            node_cooldown: Duration::from_secs(cfg.node_cooldown_secs),
            keepalive: (cfg.tcp_keepalive_secs > 0)
                .then(|| Duration::from_secs(cfg.tcp_keepalive_secs)),
            max_header_bytes: cfg.max_header_bytes,
        }
    }
}

/// Build a chain with default options.
///
/// Returns `Ok(None)` when no hop has any node.
pub fn build_chain(cfg: &ChainConfig) -> Result<Option<Chain>, ChainError> {
    build_chain_with(cfg, &BuildOptions::default())
}

pub fn build_chain_with(
    cfg: &ChainConfig,
    opts: &BuildOptions,
) -> Result<Option<Chain>, ChainError> {
    let mut hops = Vec::with_capacity(cfg.hops.len());
    for (h, hop_cfg) in cfg.hops.iter().enumerate() {
        let hop_name = if hop_cfg.name.is_empty() {
            format!("{}-{h}", cfg.name)
        } else {
            hop_cfg.name.clone()
        };
        if hop_cfg.nodes.is_empty() {
            debug!(chain = %cfg.name, hop = %hop_name, "hop has no nodes, skipped");
            continue;
        }

        let nodes = hop_cfg
            .nodes
            .iter()
            .enumerate()
            .map(|(n, node_cfg)| build_node(&hop_name, n, node_cfg, opts))
            .collect::<Result<Vec<_>, _>>()?;
        hops.push(Hop::new(hop_name, nodes)?.with_cooldown(opts.node_cooldown));
    }

    if hops.is_empty() {
        return Ok(None);
    }
    Chain::new(&cfg.name, hops).map(|c| Some(c.with_timeouts(opts.timeouts)))
}

fn build_node(
    hop_name: &str,
    index: usize,
    cfg: &NodeConfig,
    opts: &BuildOptions,
) -> Result<Node, ChainError> {
    let name = if cfg.name.is_empty() {
        format!("{hop_name}-{index}")
    } else {
        cfg.name.clone()
    };
    let addr = normalize_node_addr(&cfg.addr);

    let connector: Arc<dyn Connector> = match cfg.connector.kind.resolve("connector.type", &name) {
        ConnectorKind::Http => Arc::new(HttpConnector::new(opts.max_header_bytes)),
        ConnectorKind::Socks5 | ConnectorKind::Unrecognized(_) => Arc::new(Socks5Connector),
    };
    let dialer = build_dialer(&name, &addr, &cfg.dialer, opts)?;

    let mut node = Node::new(name, addr, connector, dialer);
    if let Some(auth) = &cfg.connector.auth
        && !auth.username.is_empty()
    {
        node = node.with_credentials(Credentials::new(&auth.username, &auth.password));
    }
    Ok(node)
}

fn build_dialer(
    node: &str,
    addr: &str,
    cfg: &DialerConfig,
    opts: &BuildOptions,
) -> Result<Arc<dyn Dialer>, ChainError> {
    let mut tcp = TcpDialer::new(opts.timeouts.connect);
    if let Some(interval) = opts.keepalive {
        tcp = tcp.with_keepalive(interval);
    }
    let Some((flavor, settings)) = ws_settings(cfg) else {
        if let DialerConfig::Unrecognized(raw) = cfg {
            warn!(
                event = "kind_fallback",
                field = "dialer.type",
                owner = node,
                value = %raw,
                fallback = "tcp",
                "unrecognized type, using default"
            );
        }
        return Ok(Arc::new(tcp));
    };

    let dialer = WsDialer::new(flavor, &settings, addr, tcp).map_err(|source| {
        ChainError::DialerConstruction {
            node: node.to_string(),
            source,
        }
    })?;
    Ok(Arc::new(dialer))
}

/// WebSocket flavor and options for a dialer config, `None` for TCP.
pub fn ws_settings(cfg: &DialerConfig) -> Option<(WsFlavor, WsSettings)> {
    let convert = |o: &WsOptions| WsSettings {
        host: o.host.clone().filter(|h| !h.is_empty()),
        path: o.path.clone().filter(|p| !p.is_empty()),
        headers: o.header.clone(),
        insecure: o.insecure,
    };
    match cfg {
        DialerConfig::Ws(o) => Some((WsFlavor::Ws, convert(o))),
        DialerConfig::Wss(o) => Some((WsFlavor::Wss, convert(o))),
        DialerConfig::Mwss(o) => Some((WsFlavor::Mwss, convert(o))),
        DialerConfig::Tcp | DialerConfig::Unrecognized(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chain_from_yaml(yaml: &str) -> ChainConfig {
        serde_yaml::from_str(yaml).unwrap()
    }

    #[test]
    fn empty_hops_yield_no_chain() {
        let cfg = chain_from_yaml("name: c\nhops: []\n");
        assert!(build_chain(&cfg).unwrap().is_none());

        let cfg = chain_from_yaml("name: c\nhops:\n  - name: h\n    nodes: []\n");
        assert!(build_chain(&cfg).unwrap().is_none());
    }

    #[test]
    fn nodeless_hops_are_dropped() {
        let cfg = chain_from_yaml(
            r#"
name: c
hops:
  - name: empty
    nodes: []
  - name: real
    nodes:
      - addr: 10.0.0.1:1080
"#,
        );
        let chain = build_chain(&cfg).unwrap().unwrap();
        assert_eq!(chain.hops().len(), 1);
        assert_eq!(chain.hops()[0].name(), "real");
    }

    #[test]
    fn unknown_types_fall_back() {
        let cfg = chain_from_yaml(
            r#"
name: c
hops:
  - name: h
    nodes:
      - name: n
        addr: 10.0.0.1:1080
        connector: { type: shadowsocks }
        dialer: { type: quic }
"#,
        );
        let chain = build_chain(&cfg).unwrap().unwrap();
        let node = &chain.hops()[0].nodes()[0];
        assert_eq!(node.connector().kind(), "socks5");
        assert_eq!(node.dialer().kind(), "tcp");
    }

    #[test]
    fn defaults_and_generated_names() {
        let cfg = chain_from_yaml(
            r#"
name: c
hops:
  - nodes:
      - addr: 10.0.0.1:1080
      - addr: socks5://proxy.example
"#,
        );
        let chain = build_chain(&cfg).unwrap().unwrap();
        let hop = &chain.hops()[0];
        assert_eq!(hop.name(), "c-0");
        assert_eq!(hop.nodes()[0].name(), "c-0-0");
        assert_eq!(hop.nodes()[1].name(), "c-0-1");
        assert_eq!(hop.nodes()[1].addr(), "proxy.example:1080");
        assert_eq!(hop.nodes()[0].connector().kind(), "socks5");
        assert_eq!(hop.nodes()[0].dialer().kind(), "tcp");
    }

    #[test]
    fn auth_attached_only_with_username() {
        let cfg = chain_from_yaml(
            r#"
name: c
hops:
  - name: h
    nodes:
      - name: with
        addr: 10.0.0.1:1080
        connector: { type: http, auth: { username: alice, password: pw } }
      - name: without
        addr: 10.0.0.2:1080
        connector: { type: socks5, auth: { username: "", password: pw } }
"#,
        );
        let chain = build_chain(&cfg).unwrap().unwrap();
        let nodes = chain.hops()[0].nodes();
        assert_eq!(nodes[0].connector().kind(), "http");
        assert_eq!(nodes[0].credentials().map(|c| c.username.as_str()), Some("alice"));
        assert!(nodes[1].credentials().is_none());
    }

    #[test]
    fn ws_options_are_carried() {
        let cfg = chain_from_yaml(
            r#"
name: c
hops:
  - name: h
    nodes:
      - name: edge
        addr: 10.0.0.1:443
        dialer:
          type: wss
          metadata: { host: cdn.example, path: /tunnel, insecure: true }
"#,
        );
        let dialer_cfg = &cfg.hops[0].nodes[0].dialer;
        let (flavor, settings) = ws_settings(dialer_cfg).unwrap();
        assert_eq!(flavor, WsFlavor::Wss);
        assert_eq!(settings.host.as_deref(), Some("cdn.example"));
        assert_eq!(settings.path.as_deref(), Some("/tunnel"));
        assert!(settings.insecure);

        let chain = build_chain(&cfg).unwrap().unwrap();
        assert_eq!(chain.hops()[0].nodes()[0].dialer().kind(), "wss");
        assert!(ws_settings(&DialerConfig::Tcp).is_none());
    }

    #[test]
    fn bad_mwss_header_fails_build() {
        let cfg = chain_from_yaml(
            r#"
name: c
hops:
  - name: h
    nodes:
      - name: edge
        addr: edge.example:443
        dialer:
          type: mwss
          metadata: { header: { "Bad Header": x } }
"#,
        );
        let err = build_chain(&cfg).unwrap_err();
        assert!(matches!(err, ChainError::DialerConstruction { ref node, .. } if node == "edge"));
    }

    #[test]
    fn timeouts_follow_config() {
        let timeouts = TimeoutConfig {
            connect_timeout_secs: 3,
            handshake_timeout_secs: 4,
            ..TimeoutConfig::default()
        };
        let cfg = chain_from_yaml("name: c\nhops:\n  - nodes:\n      - addr: 10.0.0.1:1080\n");
        let chain = build_chain_with(&cfg, &BuildOptions::from(&timeouts))
            .unwrap()
            .unwrap();
        assert_eq!(chain.timeouts().connect, Duration::from_secs(3));
        assert_eq!(chain.timeouts().handshake, Duration::from_secs(4));
    }

    #[test]
    fn keepalive_zero_disables_it() {
        let opts = BuildOptions::from(&TimeoutConfig::default());
        assert_eq!(opts.keepalive, Some(Duration::from_secs(300)));

        let off = TimeoutConfig {
            tcp_keepalive_secs: 0,
            ..TimeoutConfig::default()
        };
        assert_eq!(BuildOptions::from(&off).keepalive, None);
    }
}
