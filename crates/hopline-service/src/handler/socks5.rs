use std::io::ErrorKind;
use std::net::SocketAddr;

use async_trait::async_trait;
use hopline_chain::{ChainError, Router};
use hopline_config::HandlerKind;
use hopline_core::io::relay_bidirectional;
use hopline_proto::Socks5Error;
use hopline_proto::socks5::{
    self, CMD_CONNECT, REPLY_ADDRESS_TYPE_NOT_SUPPORTED, REPLY_COMMAND_NOT_SUPPORTED,
    REPLY_CONNECTION_NOT_ALLOWED, REPLY_CONNECTION_REFUSED, REPLY_GENERAL_FAILURE,
    REPLY_HOST_UNREACHABLE, REPLY_NETWORK_UNREACHABLE, REPLY_SUCCEEDED, REPLY_TTL_EXPIRED,
};
use hopline_transport::BoxedStream;
use tracing::debug;

use super::{Handler, RelayOptions};
use crate::error::HandlerError;

/// SOCKS5 without authentication. Only CONNECT is served.
pub struct Socks5Handler {
    router: Router,
    relay: RelayOptions,
}

impl Socks5Handler {
    pub fn new(router: Router, relay: RelayOptions) -> Self {
        Self { router, relay }
    }
}

#[async_trait]
impl Handler for Socks5Handler {
    fn kind(&self) -> HandlerKind {
        HandlerKind::Socks5
    }

    async fn handle(&self, mut stream: BoxedStream, peer: SocketAddr) -> Result<(), HandlerError> {
        socks5::negotiate(&mut stream, None).await?;

        let request = match socks5::read_request(&mut stream).await {
            Ok(req) => req,
            Err(Socks5Error::UnsupportedAddressType(atyp)) => {
                let _ = socks5::send_reply(&mut stream, REPLY_ADDRESS_TYPE_NOT_SUPPORTED, None).await;
                return Err(Socks5Error::UnsupportedAddressType(atyp).into());
            }
            Err(e) => return Err(e.into()),
        };
        if request.command != CMD_CONNECT {
            let _ = socks5::send_reply(&mut stream, REPLY_COMMAND_NOT_SUPPORTED, None).await;
            return Err(Socks5Error::UnsupportedCommand(request.command).into());
        }

        debug!(peer = %peer, target = %request.target, "CONNECT");
        let upstream = match self.router.dial(&request.target).await {
            Ok(s) => s,
            Err(e) => {
                let _ = socks5::send_reply(&mut stream, reply_code_for(&e), None).await;
                return Err(e.into());
            }
        };
        socks5::send_reply(&mut stream, REPLY_SUCCEEDED, None).await?;

        let stats = relay_bidirectional(
            stream,
            upstream,
            self.relay.idle_timeout,
            self.relay.buffer_size,
        )
        .await?;
        debug!(peer = %peer, up = stats.uploaded, down = stats.downloaded, "tunnel closed");
        Ok(())
    }
}

fn reply_code_for(error: &ChainError) -> u8 {
    if let ChainError::Socks5(Socks5Error::Rejected(code)) = error {
        return *code;
    }
    match error.io_kind() {
        Some(ErrorKind::ConnectionRefused) => REPLY_CONNECTION_REFUSED,
        Some(ErrorKind::NetworkUnreachable) => REPLY_NETWORK_UNREACHABLE,
        Some(ErrorKind::HostUnreachable | ErrorKind::AddrNotAvailable) => REPLY_HOST_UNREACHABLE,
        Some(ErrorKind::PermissionDenied) => REPLY_CONNECTION_NOT_ALLOWED,
        Some(ErrorKind::TimedOut) => REPLY_TTL_EXPIRED,
        _ => REPLY_GENERAL_FAILURE,
    }
}
