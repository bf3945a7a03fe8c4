//! Service and startup error types.

use hopline_chain::ChainError;
use hopline_config::ConfigError;
use hopline_proto::{AddrError, HttpError, Socks5Error};
use hopline_transport::TransportError;

/// Errors starting a single service.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("cannot listen on {addr}: {source}")]
    Listen {
        addr: String,
        #[source]
        source: TransportError,
    },
}

impl ServiceError {
    /// True when the listen address could not be bound (in use, denied, invalid).
    pub fn is_bind(&self) -> bool {
        matches!(
            self,
            Self::Listen {
                source: TransportError::Bind { .. },
                ..
            }
        )
    }
}

/// Errors while serving one accepted connection.
#[derive(Debug, thiserror::Error)]
pub enum HandlerError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SOCKS5 error: {0}")]
    Socks5(#[from] Socks5Error),

    #[error("HTTP error: {0}")]
    Http(#[from] HttpError),

    #[error("bad target: {0}")]
    Addr(#[from] AddrError),

    #[error("upstream: {0}")]
    Upstream(#[from] ChainError),
}

/// Errors aborting startup. Chains and services set up before the
/// failing step stay in place.
#[derive(Debug, thiserror::Error)]
pub enum SetupError {
    #[error("failed to load configuration: {0}")]
    ConfigLoad(#[from] ConfigError),

    #[error("failed to build chain {chain}: {source}")]
    ChainBuild {
        chain: String,
        #[source]
        source: ChainError,
    },

    #[error("failed to start service {service}: {source}")]
    ServiceStart {
        service: String,
        #[source]
        source: ServiceError,
    },
}
