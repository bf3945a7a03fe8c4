//! Outbound routing for a service: through its chain, or direct.

use std::sync::Arc;
use std::time::Duration;

use hopline_proto::TargetAddr;
use hopline_transport::{BoxedStream, TcpDialer};
use tracing::debug;

use crate::chain::Chain;
use crate::error::ChainError;

#[derive(Debug, Clone)]
pub struct Router {
    chain: Option<Arc<Chain>>,
    direct: TcpDialer,
}

impl Router {
    /// Route through `chain`, or dial targets directly when it is `None`.
    pub fn new(chain: Option<Arc<Chain>>, connect_timeout: Duration) -> Self {
        Self {
            chain,
            direct: TcpDialer::new(connect_timeout),
        }
    }

    pub fn direct(connect_timeout: Duration) -> Self {
        Self::new(None, connect_timeout)
    }

    /// Open a stream to `target`.
    pub async fn dial(&self, target: &TargetAddr) -> Result<BoxedStream, ChainError> {
        match &self.chain {
            Some(chain) => chain.connect(target).await,
            None => {
                debug!(target = %target, "dialing direct");
                let stream = self.direct.connect(&target.to_string()).await?;
                Ok(Box::new(stream))
            }
        }
    }
}
