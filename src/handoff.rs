//! Running the wrapped command.

use std::net::SocketAddr;
use std::process::{ExitStatus, Stdio};

use hopline_config::HandlerKind;
use tokio::process::Command;
use tracing::{debug, info};

use crate::error::HandoffError;

/// Value for the proxy variable pointing at `addr`.
///
/// SOCKS5 services are advertised as `socks5h` so clients resolve names
/// through the proxy. Unknown services are assumed to be SOCKS5.
pub fn proxy_env_value(handler: Option<&HandlerKind>, addr: &str) -> String {
    let scheme = match handler {
        Some(HandlerKind::Http) => "http",
        _ => "socks5h",
    };
    let addr = match addr.parse::<SocketAddr>() {
        Ok(sa) => sa.to_string(),
        Err(_) => addr.to_string(),
    };
    format!("{scheme}://{addr}")
}

/// Run `argv` with stdio inherited and `extra_env` added to the environment.
///
/// Returns the command's exit code; a command killed by a signal reports
/// `128 + signal`. Interrupts reach the command through the terminal, so
/// this process keeps waiting for it instead of exiting first.
pub async fn handoff(argv: &[String], extra_env: &[(String, String)]) -> Result<i32, HandoffError> {
    let (program, args) = argv.split_first().ok_or(HandoffError::EmptyCommand)?;

    let mut child = Command::new(program)
        .args(args)
        .envs(extra_env.iter().map(|(k, v)| (k, v)))
        .stdin(Stdio::inherit())
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit())
        .spawn()
        .map_err(|source| HandoffError::Spawn {
            program: program.clone(),
            source,
        })?;
    info!(program = %program, pid = child.id(), "command started");

    let status = loop {
        tokio::select! {
            status = child.wait() => break status,
            signal = tokio::signal::ctrl_c() => match signal {
                Ok(()) => debug!("interrupt received, waiting for command"),
                Err(e) => {
                    debug!(error = %e, "cannot watch for interrupts");
                    break child.wait().await;
                }
            },
        }
    }
    .map_err(HandoffError::Wait)?;
    Ok(exit_code(status))
}

fn exit_code(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }
    1
}
