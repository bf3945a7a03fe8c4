//! Forgiving `type` fields.
//!
//! Operators hand-edit these documents, so an unknown `type` string is
//! kept as `Unrecognized` at load time instead of failing. The component
//! that consumes the value calls `resolve`, which swaps in the default and
//! emits a `warn!` event carrying the field, the raw value and the
//! fallback.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::warn;

macro_rules! lenient_kind {
    (
        $(#[$meta:meta])*
        $name:ident {
            default $default:ident => $default_str:literal
            $(, $variant:ident => $s:literal)* $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
        #[serde(from = "String", into = "String")]
        pub enum $name {
            #[default]
            $default,
            $($variant,)*
            /// Raw value that matched no known kind.
            Unrecognized(String),
        }

        impl $name {
            pub fn as_str(&self) -> &str {
                match self {
                    Self::$default => $default_str,
                    $(Self::$variant => $s,)*
                    Self::Unrecognized(raw) => raw,
                }
            }

            /// Known kind to use, falling back to the default with a warning.
            ///
            /// `field` names the config path (e.g. `connector.type`), `owner`
            /// the service or node it belongs to.
            pub fn resolve(&self, field: &'static str, owner: &str) -> Self {
                match self {
                    Self::Unrecognized(raw) => {
                        warn!(
                            event = "kind_fallback",
                            field,
                            owner,
                            value = %raw,
                            fallback = $default_str,
                            "unrecognized type, using default"
                        );
                        Self::$default
                    }
                    known => known.clone(),
                }
            }
        }

        impl From<String> for $name {
            fn from(raw: String) -> Self {
                match raw.trim().to_ascii_lowercase().as_str() {
                    "" | $default_str => Self::$default,
                    $($s => Self::$variant,)*
                    _ => Self::Unrecognized(raw),
                }
            }
        }

        impl From<&str> for $name {
            fn from(raw: &str) -> Self {
                Self::from(raw.to_string())
            }
        }

        impl From<$name> for String {
            fn from(kind: $name) -> Self {
                kind.as_str().to_string()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

lenient_kind! {
    /// Proxy protocol spoken to an upstream node.
    ConnectorKind {
        default Socks5 => "socks5",
        Http => "http",
    }
}

lenient_kind! {
    /// Protocol spoken to inbound clients. Defaults to `http`.
    HandlerKind {
        default Http => "http",
        Socks5 => "socks5",
    }
}

lenient_kind! {
    /// Listening transport.
    ListenerKind {
        default Tcp => "tcp",
    }
}
