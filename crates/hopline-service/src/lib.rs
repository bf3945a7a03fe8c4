//! Listening services and the startup driver.
//!
//! [`setup`] builds every configured chain into a [`ChainRegistry`], then
//! binds each service and spawns its accept loop. Progress is reported on
//! an optional [`StartupEvent`] channel so a caller waiting on a service
//! address learns about failures without waiting out its timeout.
//!
//! [`ChainRegistry`]: hopline_chain::ChainRegistry

pub mod driver;
pub mod error;
pub mod handler;
pub mod service;

pub use driver::{
    StartupEvent, StartupEvents, build_registry, setup, setup_from_config, start_single_upstream,
};
pub use error::{HandlerError, ServiceError, SetupError};
pub use handler::{Handler, RelayOptions, build_handler};
pub use service::{RunningService, start_service};
