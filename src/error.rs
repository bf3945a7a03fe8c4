//! Top-level error type.

use std::time::Duration;

use hopline_config::ConfigError;

/// The readiness gate gave up.
#[derive(Debug, thiserror::Error)]
pub enum GateError {
    #[error("{addr} did not accept connections within {timeout:?}")]
    Timeout { addr: String, timeout: Duration },

    #[error("startup failed before {addr} became ready: {reason}")]
    StartupFailed { addr: String, reason: String },
}

/// The wrapped command could not be run.
#[derive(Debug, thiserror::Error)]
pub enum HandoffError {
    #[error("no command given")]
    EmptyCommand,

    #[error("failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed waiting for command: {0}")]
    Wait(#[source] std::io::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("configuration: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Gate(#[from] GateError),

    #[error(transparent)]
    Handoff(#[from] HandoffError),
}
