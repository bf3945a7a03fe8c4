//! I/O utilities for bidirectional relay and stream adapters.
//!
//! Shared by the listening handlers and the chain connectors.

mod prefixed;
mod relay;

pub use prefixed::PrefixedStream;
pub use relay::{RelayStats, relay_bidirectional};
