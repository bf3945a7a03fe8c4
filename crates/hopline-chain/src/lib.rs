//! Proxy chains.
//!
//! A [`Chain`] is an ordered list of [`Hop`]s; each hop holds one or more
//! interchangeable [`Node`]s. A node pairs a [`Dialer`] (how the byte
//! stream to it is established) with a [`Connector`] (the proxy protocol
//! it speaks). [`build_chain`] turns configuration into chains,
//! [`ChainRegistry`] resolves them by name and [`Router`] sends a
//! service's outbound connections through one.
//!
//! [`Dialer`]: hopline_transport::Dialer

pub mod builder;
pub mod chain;
pub mod connector;
pub mod error;
pub mod hop;
pub mod node;
pub mod registry;
pub mod router;

pub use builder::{BuildOptions, build_chain, build_chain_with, ws_settings};
pub use chain::{Chain, ChainTimeouts};
pub use connector::{Connector, HttpConnector, Socks5Connector};
pub use error::ChainError;
pub use hop::Hop;
pub use node::Node;
pub use registry::ChainRegistry;
pub use router::Router;
