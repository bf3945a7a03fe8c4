//! Readiness gate: poll an address until it accepts a connection.

use std::net::SocketAddr;
use std::time::Duration;

use hopline_config::HandlerKind;
use hopline_core::READY_POLL_INTERVAL_MS;
use hopline_service::StartupEvent;
use tokio::net::TcpStream;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::time::Instant;
use tracing::{debug, trace};

use crate::error::GateError;

const POLL_INTERVAL: Duration = Duration::from_millis(READY_POLL_INTERVAL_MS);

/// Wait until `addr` accepts a TCP connection, polling every 200 ms.
pub async fn wait_ready(addr: &str, timeout: Duration) -> Result<(), GateError> {
    poll(addr, timeout, None).await.map(|_| ())
}

/// Like [`wait_ready`], but also watches startup progress.
///
/// A `Failed` event ends the wait at once. Returns the handler kind of the
/// service listening on `addr` when an event named it.
pub async fn wait_ready_with_events(
    addr: &str,
    timeout: Duration,
    events: &mut UnboundedReceiver<StartupEvent>,
) -> Result<Option<HandlerKind>, GateError> {
    poll(addr, timeout, Some(events)).await
}

async fn poll(
    addr: &str,
    timeout: Duration,
    mut events: Option<&mut UnboundedReceiver<StartupEvent>>,
) -> Result<Option<HandlerKind>, GateError> {
    let deadline = Instant::now() + timeout;
    let mut handler = None;

    loop {
        drain(addr, &mut events, &mut handler)?;

        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return Err(GateError::Timeout {
                addr: addr.to_string(),
                timeout,
            });
        }
        match tokio::time::timeout(remaining, TcpStream::connect(addr)).await {
            Ok(Ok(_conn)) => {
                debug!(addr, "address is accepting connections");
                settle(addr, &mut events, &mut handler).await?;
                return Ok(handler);
            }
            Ok(Err(e)) => trace!(addr, error = %e, "not ready yet"),
            Err(_) => continue,
        }

        let wake = (Instant::now() + POLL_INTERVAL).min(deadline);
        loop {
            tokio::select! {
                _ = tokio::time::sleep_until(wake) => break,
                event = next_event(&mut events) => {
                    if observe(event, addr, &mut handler)? {
                        break;
                    }
                }
            }
        }
    }
}

/// Fold in every event posted so far.
fn drain(
    addr: &str,
    events: &mut Option<&mut UnboundedReceiver<StartupEvent>>,
    handler: &mut Option<HandlerKind>,
) -> Result<(), GateError> {
    while let Some(event) = events.as_deref_mut().and_then(|rx| rx.try_recv().ok()) {
        observe(event, addr, handler)?;
    }
    Ok(())
}

/// The address answered. A service announces itself just after binding,
/// so if no event named the address yet, give startup one poll interval
/// to do so before settling for an unknown handler.
async fn settle(
    addr: &str,
    events: &mut Option<&mut UnboundedReceiver<StartupEvent>>,
    handler: &mut Option<HandlerKind>,
) -> Result<(), GateError> {
    drain(addr, events, handler)?;
    if handler.is_some() || events.is_none() {
        return Ok(());
    }
    let grace = tokio::time::sleep(POLL_INTERVAL);
    tokio::pin!(grace);
    loop {
        tokio::select! {
            _ = &mut grace => return Ok(()),
            event = next_event(events) => {
                let completed = matches!(event, StartupEvent::Completed);
                if observe(event, addr, handler)? || completed {
                    return Ok(());
                }
            }
        }
    }
}

/// Fold one event into the wait. Returns true when it announced the
/// awaited address, so the caller can poll again right away.
fn observe(
    event: StartupEvent,
    addr: &str,
    handler: &mut Option<HandlerKind>,
) -> Result<bool, GateError> {
    match event {
        StartupEvent::Failed { reason } => Err(GateError::StartupFailed {
            addr: addr.to_string(),
            reason,
        }),
        StartupEvent::Listening {
            service,
            addr: bound,
            handler: kind,
        } if same_endpoint(addr, bound) => {
            debug!(service = %service, addr = %bound, "awaited service is listening");
            *handler = Some(kind);
            Ok(true)
        }
        StartupEvent::Listening { .. } | StartupEvent::Completed => Ok(false),
    }
}

/// Next startup event; pends forever once the channel is gone.
async fn next_event(events: &mut Option<&mut UnboundedReceiver<StartupEvent>>) -> StartupEvent {
    if let Some(rx) = events.as_deref_mut()
        && let Some(event) = rx.recv().await
    {
        return event;
    }
    *events = None;
    std::future::pending().await
}

/// Whether `wanted` (as given on the command line) is served by a
/// listener bound to `bound`. A wildcard bind serves every local address.
fn same_endpoint(wanted: &str, bound: SocketAddr) -> bool {
    let Ok(wanted) = wanted.parse::<SocketAddr>() else {
        return wanted
            .rsplit_once(':')
            .and_then(|(_, port)| port.parse::<u16>().ok())
            == Some(bound.port());
    };
    wanted.port() == bound.port() && (bound.ip().is_unspecified() || wanted.ip() == bound.ip())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sa(s: &str) -> SocketAddr {
        s.parse().unwrap()
    }

    #[test]
    fn endpoint_matching() {
        assert!(same_endpoint("127.0.0.1:1080", sa("127.0.0.1:1080")));
        assert!(same_endpoint("127.0.0.1:1080", sa("0.0.0.0:1080")));
        assert!(same_endpoint("localhost:1080", sa("127.0.0.1:1080")));
        assert!(!same_endpoint("127.0.0.1:1080", sa("127.0.0.1:1081")));
        assert!(!same_endpoint("127.0.0.2:1080", sa("127.0.0.1:1080")));
    }
}
