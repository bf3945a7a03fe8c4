//! A single proxy node and its health state.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use hopline_proto::Credentials;
use hopline_transport::Dialer;
use parking_lot::Mutex;

use crate::connector::Connector;

/// One proxy server: where it is, how to reach it and what it speaks.
pub struct Node {
    name: String,
    addr: String,
    connector: Arc<dyn Connector>,
    dialer: Arc<dyn Dialer>,
    credentials: Option<Credentials>,
    healthy: AtomicBool,
    last_failure: Mutex<Option<Instant>>,
}

impl Node {
    pub fn new(
        name: impl Into<String>,
        addr: impl Into<String>,
        connector: Arc<dyn Connector>,
        dialer: Arc<dyn Dialer>,
    ) -> Self {
        Self {
            name: name.into(),
            addr: addr.into(),
            connector,
            dialer,
            credentials: None,
            healthy: AtomicBool::new(true),
            last_failure: Mutex::new(None),
        }
    }

    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }

    pub fn connector(&self) -> &dyn Connector {
        self.connector.as_ref()
    }

    pub fn dialer(&self) -> &dyn Dialer {
        self.dialer.as_ref()
    }

    pub fn credentials(&self) -> Option<&Credentials> {
        self.credentials.as_ref()
    }

    pub fn is_healthy(&self) -> bool {
        self.healthy.load(Ordering::Relaxed)
    }

    pub(crate) fn mark_failed(&self) {
        self.healthy.store(false, Ordering::Relaxed);
        *self.last_failure.lock() = Some(Instant::now());
    }

    pub(crate) fn mark_ok(&self) {
        self.healthy.store(true, Ordering::Relaxed);
    }

    /// Whether the node may be selected. A failed node recovers once
    /// `cooldown` has passed since its last failure.
    pub(crate) fn is_available(&self, cooldown: Duration) -> bool {
        if self.is_healthy() {
            return true;
        }
        let recovered = self
            .last_failure
            .lock()
            .is_none_or(|when| when.elapsed() >= cooldown);
        if recovered {
            self.mark_ok();
        }
        recovered
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("name", &self.name)
            .field("addr", &self.addr)
            .field("connector", &self.connector.kind())
            .field("dialer", &self.dialer.kind())
            .field("auth", &self.credentials.is_some())
            .field("healthy", &self.is_healthy())
            .finish()
    }
}
