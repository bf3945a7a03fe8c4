//! Configuration type definitions for services, chains, logging and timeouts.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::defaults::*;
use crate::kinds::{ConnectorKind, HandlerKind, ListenerKind};

/// Top-level document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub services: Vec<ServiceConfig>,
    #[serde(default)]
    pub chains: Vec<ChainConfig>,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub timeouts: TimeoutConfig,
}

// ── Services ──

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServiceConfig {
    #[serde(default)]
    pub name: String,
    /// Listen address, e.g. `127.0.0.1:1080`.
    #[serde(default)]
    pub addr: String,
    #[serde(default)]
    pub handler: HandlerConfig,
    #[serde(default)]
    pub listener: ListenerConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HandlerConfig {
    #[serde(rename = "type", default)]
    pub kind: HandlerKind,
    /// Name of the chain outbound connections go through.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chain: Option<String>,
}

impl HandlerConfig {
    /// Chain reference, treating an empty name as none.
    pub fn chain_name(&self) -> Option<&str> {
        self.chain.as_deref().map(str::trim).filter(|s| !s.is_empty())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListenerConfig {
    #[serde(rename = "type", default)]
    pub kind: ListenerKind,
}

// ── Chains ──

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChainConfig {
    #[serde(default)]
    pub name: String,
    /// Hops in traversal order.
    #[serde(default)]
    pub hops: Vec<HopConfig>,
}

/// Alternative nodes for one stage of a chain.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HopConfig {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub nodes: Vec<NodeConfig>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NodeConfig {
    #[serde(default)]
    pub name: String,
    /// `host:port` or a URL.
    #[serde(default)]
    pub addr: String,
    #[serde(default)]
    pub connector: ConnectorConfig,
    #[serde(default)]
    pub dialer: DialerConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConnectorConfig {
    #[serde(rename = "type", default)]
    pub kind: ConnectorKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth: Option<AuthConfig>,
}

#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthConfig {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

// ── Dialers ──

/// Transport used to reach a node, with the options that kind accepts.
///
/// Written in documents as `{ type, metadata }`. Known metadata keys are
/// type-checked at load time; unknown keys are ignored. An unknown `type`
/// is kept as `Unrecognized` and dialed as plain TCP.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawDialerConfig", into = "RawDialerConfig")]
pub enum DialerConfig {
    #[default]
    Tcp,
    Ws(WsOptions),
    Wss(WsOptions),
    /// WebSocket over TLS with extra request headers.
    Mwss(WsOptions),
    Unrecognized(String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WsOptions {
    /// `Host` header and TLS server name override.
    pub host: Option<String>,
    /// Request path, `/` when unset.
    pub path: Option<String>,
    /// Extra handshake headers (`mwss` only).
    pub header: BTreeMap<String, String>,
    /// Skip certificate verification (`wss`/`mwss` only).
    pub insecure: bool,
}

impl DialerConfig {
    pub fn kind_name(&self) -> &str {
        match self {
            Self::Tcp => "tcp",
            Self::Ws(_) => "ws",
            Self::Wss(_) => "wss",
            Self::Mwss(_) => "mwss",
            Self::Unrecognized(raw) => raw,
        }
    }

    pub fn ws_options(&self) -> Option<&WsOptions> {
        match self {
            Self::Ws(opts) | Self::Wss(opts) | Self::Mwss(opts) => Some(opts),
            Self::Tcp | Self::Unrecognized(_) => None,
        }
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct RawDialerConfig {
    #[serde(rename = "type", default)]
    kind: String,
    #[serde(default)]
    metadata: RawDialerMetadata,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct RawDialerMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    host: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    header: Option<BTreeMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    insecure: Option<bool>,
}

impl TryFrom<RawDialerConfig> for DialerConfig {
    type Error = String;

    fn try_from(raw: RawDialerConfig) -> Result<Self, Self::Error> {
        let kind = raw.kind.trim().to_ascii_lowercase();
        let meta = raw.metadata;
        let tls = matches!(kind.as_str(), "wss" | "mwss");

        if matches!(kind.as_str(), "ws" | "wss" | "mwss") {
            if meta.header.is_some() && kind != "mwss" {
                return Err(format!(
                    "dialer metadata `header` is only supported by mwss, not {kind}"
                ));
            }
            if meta.insecure.is_some() && !tls {
                return Err(format!(
                    "dialer metadata `insecure` only applies to wss/mwss, not {kind}"
                ));
            }
        }

        let opts = WsOptions {
            host: meta.host,
            path: meta.path,
            header: meta.header.unwrap_or_default(),
            insecure: meta.insecure.unwrap_or(false),
        };
        Ok(match kind.as_str() {
            "" | "tcp" => Self::Tcp,
            "ws" => Self::Ws(opts),
            "wss" => Self::Wss(opts),
            "mwss" => Self::Mwss(opts),
            _ => Self::Unrecognized(raw.kind),
        })
    }
}

impl From<DialerConfig> for RawDialerConfig {
    fn from(cfg: DialerConfig) -> Self {
        let kind = cfg.kind_name().to_string();
        let metadata = match cfg {
            DialerConfig::Ws(opts) | DialerConfig::Wss(opts) | DialerConfig::Mwss(opts) => {
                RawDialerMetadata {
                    host: opts.host,
                    path: opts.path,
                    header: (!opts.header.is_empty()).then_some(opts.header),
                    insecure: opts.insecure.then_some(true),
                }
            }
            DialerConfig::Tcp | DialerConfig::Unrecognized(_) => RawDialerMetadata::default(),
        };
        Self { kind, metadata }
    }
}

// ── Logging ──

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    pub level: Option<String>,
    /// Log format: json, pretty, or compact. Default: pretty.
    pub format: Option<String>,
    /// Output target: stdout or stderr. Default: stderr.
    pub output: Option<String>,
    /// Per-module log level filters (e.g., {"hopline_chain": "debug"}).
    #[serde(default)]
    pub filters: HashMap<String, String>,
}

// ── Timeouts ──

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeoutConfig {
    /// Bound on establishing the transport to the first node.
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    /// Bound on each proxy or WebSocket handshake along a chain.
    #[serde(default = "default_handshake_timeout_secs")]
    pub handshake_timeout_secs: u64,
    /// Relayed connections with no traffic for this long are closed.
    #[serde(default = "default_idle_timeout_secs")]
    pub idle_timeout_secs: u64,
    /// How long a failed node is skipped by its hop.
    #[serde(default = "default_node_cooldown_secs")]
    pub node_cooldown_secs: u64,
    /// Keepalive idle time on connections to nodes; 0 disables it.
    #[serde(default = "default_tcp_keepalive_secs")]
    pub tcp_keepalive_secs: u64,
    #[serde(default = "default_relay_buffer_size")]
    pub relay_buffer_size: usize,
    #[serde(default = "default_max_header_bytes")]
    pub max_header_bytes: usize,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: default_connect_timeout_secs(),
            handshake_timeout_secs: default_handshake_timeout_secs(),
            idle_timeout_secs: default_idle_timeout_secs(),
            node_cooldown_secs: default_node_cooldown_secs(),
            tcp_keepalive_secs: default_tcp_keepalive_secs(),
            relay_buffer_size: default_relay_buffer_size(),
            max_header_bytes: default_max_header_bytes(),
        }
    }
}
