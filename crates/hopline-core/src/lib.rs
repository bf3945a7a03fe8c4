//! Core types and constants shared across hopline crates.
//!
//! This crate provides:
//! - Default configuration values
//! - Byte relay and stream adapters used by handlers and dialers

pub mod defaults;
pub mod io;
pub mod transport;

pub use defaults::*;
