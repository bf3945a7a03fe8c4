//! # hopline
//!
//! Starts a configured set of proxy services and chains, waits until a
//! chosen address accepts connections, then runs a command with a proxy
//! variable pointing at it.
//!
//! ## Crates
//!
//! - [`hopline_core`] - Defaults and stream utilities
//! - [`hopline_config`] - Configuration loading and validation
//! - [`hopline_service`] - Services and the startup driver

pub mod cli;
pub mod error;
pub mod gate;
pub mod handoff;
pub mod logging;

pub use cli::{Args, run};
pub use error::{AppError, GateError, HandoffError};
pub use gate::{wait_ready, wait_ready_with_events};
pub use handoff::{handoff, proxy_env_value};

pub use hopline_config as config;
pub use hopline_core as core;
pub use hopline_service as service;
