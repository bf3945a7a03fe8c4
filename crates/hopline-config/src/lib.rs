//! Configuration model for hopline.
//!
//! A document holds two ordered lists, `services` and `chains`, plus
//! optional `logging` and `timeouts` sections. YAML is the primary format;
//! JSON (with comments) and TOML are accepted by file extension.

mod defaults;
pub mod kinds;
pub mod loader;
pub mod types;
pub mod validate;

pub use kinds::{ConnectorKind, HandlerKind, ListenerKind};
pub use loader::{ConfigError, ConfigFormat, load_config, parse_config};
pub use types::*;
pub use validate::validate_config;

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
services:
  - name: local-socks
    addr: 127.0.0.1:1080
    handler:
      type: socks5
      chain: upstream
    listener:
      type: tcp
chains:
  - name: upstream
    hops:
      - name: hop-0
        nodes:
          - name: edge
            addr: edge.example.com:443
            connector:
              type: http
              auth:
                username: alice
                password: s3cret
            dialer:
              type: mwss
              metadata:
                host: cdn.example.com
                path: /tunnel
                header:
                  X-Token: abc
"#;

    #[test]
    fn parses_full_document() {
        let cfg = parse_config(SAMPLE, ConfigFormat::Yaml).unwrap();
        assert_eq!(cfg.services.len(), 1);
        let svc = &cfg.services[0];
        assert_eq!(svc.handler.kind, HandlerKind::Socks5);
        assert_eq!(svc.handler.chain_name(), Some("upstream"));
        assert_eq!(svc.listener.kind, ListenerKind::Tcp);

        let node = &cfg.chains[0].hops[0].nodes[0];
        assert_eq!(node.connector.kind, ConnectorKind::Http);
        assert_eq!(node.connector.auth.as_ref().unwrap().username, "alice");
        let DialerConfig::Mwss(opts) = &node.dialer else {
            panic!("expected mwss dialer, got {:?}", node.dialer);
        };
        assert_eq!(opts.host.as_deref(), Some("cdn.example.com"));
        assert_eq!(opts.path.as_deref(), Some("/tunnel"));
        assert_eq!(opts.header.get("X-Token").map(String::as_str), Some("abc"));
    }

    #[test]
    fn missing_sections_take_defaults() {
        let cfg = parse_config(
            "services:\n  - name: s\n    addr: 127.0.0.1:8080\n",
            ConfigFormat::Yaml,
        )
        .unwrap();
        assert!(cfg.chains.is_empty());
        assert_eq!(cfg.services[0].handler.kind, HandlerKind::Http);
        assert_eq!(cfg.services[0].handler.chain_name(), None);
        assert_eq!(cfg.timeouts.relay_buffer_size, 32768);

        let empty = parse_config("{}", ConfigFormat::Yaml).unwrap();
        assert!(empty.services.is_empty());
    }

    #[test]
    fn unknown_fields_and_kinds_are_tolerated() {
        let cfg = parse_config(
            r#"
version: 3
services:
  - name: s
    addr: ":8080"
    handler: { type: relay, chain: "", extra: 1 }
    listener: { type: quic }
chains:
  - name: c
    hops:
      - name: h
        nodes:
          - addr: 1.2.3.4:1080
            connector: { type: ss }
            dialer: { type: kcp, metadata: { mtu: 1350, host: h } }
"#,
            ConfigFormat::Yaml,
        )
        .unwrap();
        let svc = &cfg.services[0];
        assert_eq!(svc.handler.kind, HandlerKind::Unrecognized("relay".into()));
        assert_eq!(svc.handler.chain_name(), None);
        assert_eq!(svc.listener.kind, ListenerKind::Unrecognized("quic".into()));

        let node = &cfg.chains[0].hops[0].nodes[0];
        assert_eq!(node.connector.kind, ConnectorKind::Unrecognized("ss".into()));
        assert_eq!(node.dialer, DialerConfig::Unrecognized("kcp".into()));
    }

    #[test]
    fn ws_options_only_set_when_present() {
        let cfg = parse_config(
            r#"
chains:
  - name: c
    hops:
      - nodes:
          - addr: a:80
            dialer: { type: ws }
          - addr: b:80
            dialer: { type: wss, metadata: { path: /ws } }
          - addr: c:80
            dialer: { type: ws, metadata: { host: front.example, unrelated: x } }
"#,
            ConfigFormat::Yaml,
        )
        .unwrap();
        let nodes = &cfg.chains[0].hops[0].nodes;
        assert_eq!(nodes[0].dialer, DialerConfig::Ws(WsOptions::default()));
        assert_eq!(
            nodes[1].dialer,
            DialerConfig::Wss(WsOptions {
                path: Some("/ws".into()),
                ..WsOptions::default()
            })
        );
        assert_eq!(
            nodes[2].dialer,
            DialerConfig::Ws(WsOptions {
                host: Some("front.example".into()),
                ..WsOptions::default()
            })
        );
    }

    #[test]
    fn mistyped_dialer_metadata_fails_at_load() {
        let err = parse_config(
            r#"
chains:
  - name: c
    hops:
      - nodes:
          - addr: a:80
            dialer: { type: ws, metadata: { host: [not, a, string] } }
"#,
            ConfigFormat::Yaml,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Yaml(_)), "{err}");

        let err = parse_config(
            r#"
chains:
  - name: c
    hops:
      - nodes:
          - addr: a:80
            dialer: { type: wss, metadata: { header: { X-A: b } } }
"#,
            ConfigFormat::Yaml,
        )
        .unwrap_err();
        assert!(err.to_string().contains("only supported by mwss"), "{err}");
    }

    #[test]
    fn validation_rejects_structural_mistakes() {
        let cases = [
            "services:\n  - name: s\n",
            "chains:\n  - name: c\n    hops:\n      - nodes:\n          - addr: ''\n",
            "chains:\n  - name: c\n    hops:\n      - nodes:\n          - {addr: 'a:1', dialer: {type: ws, metadata: {path: ws}}}\n",
            "timeouts:\n  connect_timeout_secs: 0\n",
        ];
        for case in cases {
            let err = parse_config(case, ConfigFormat::Yaml).unwrap_err();
            assert!(matches!(err, ConfigError::Validation(_)), "{case}: {err}");
        }
    }

    #[test]
    fn duplicate_chain_names_are_not_a_validation_error() {
        let cfg = parse_config(
            "chains:\n  - name: dup\n  - name: dup\n",
            ConfigFormat::Yaml,
        )
        .unwrap();
        assert_eq!(cfg.chains.len(), 2);
    }

    #[test]
    fn missing_and_repeated_names_are_tolerated() {
        let cfg = parse_config(
            "services:\n  - addr: 127.0.0.1:1\n  - {name: s, addr: 'a:1'}\n  - {name: s, addr: 'a:2'}\nchains:\n  - hops: []\n",
            ConfigFormat::Yaml,
        )
        .unwrap();
        assert_eq!(cfg.services.len(), 3);
        assert!(cfg.services[0].name.is_empty());
        assert_eq!(cfg.chains.len(), 1);
        assert!(cfg.chains[0].name.is_empty());
    }

    #[test]
    fn dialer_round_trips_through_serde() {
        let dialer = DialerConfig::Mwss(WsOptions {
            host: Some("h".into()),
            path: Some("/p".into()),
            header: [("X-A".to_string(), "1".to_string())].into_iter().collect(),
            insecure: true,
        });
        let yaml = serde_yaml::to_string(&dialer).unwrap();
        let back: DialerConfig = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(back, dialer);
    }
}
