//! Command-line entry point.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use hopline_config::load_config;
use hopline_core::{DEFAULT_PROXY_ENV, DEFAULT_READY_TIMEOUT_SECS, DEFAULT_WAIT_ADDR};
use hopline_service::setup;
use tokio::sync::mpsc;
use tracing::info;

use crate::error::AppError;
use crate::gate::wait_ready_with_events;
use crate::handoff::{handoff, proxy_env_value};
use crate::logging::init_tracing;

/// Start the configured proxies, wait for one, then run a command through it.
#[derive(Parser, Debug, Clone)]
#[command(name = "hopline", version, about)]
pub struct Args {
    /// Config file path (yaml/json/toml)
    #[arg(short = 'C', long)]
    pub config: PathBuf,

    /// Address that must accept connections before the command starts
    #[arg(short, long, default_value = DEFAULT_WAIT_ADDR)]
    pub wait: String,

    /// Seconds to wait for the address
    #[arg(long, default_value_t = DEFAULT_READY_TIMEOUT_SECS)]
    pub timeout: u64,

    /// Environment variable that carries the proxy URL
    #[arg(long, default_value = DEFAULT_PROXY_ENV)]
    pub proxy_env: String,

    /// Log level, overriding the config file
    #[arg(long)]
    pub log_level: Option<String>,

    /// Command to run, with its arguments
    #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
    pub command: Vec<String>,
}

/// Run to completion and return the command's exit code.
///
/// Services are started on their own task. The command is only started
/// once the wait address accepts connections; a startup failure seen
/// before that aborts the run.
pub async fn run(args: Args) -> Result<i32, AppError> {
    let config = load_config(&args.config)?;
    init_tracing(&config.logging, args.log_level.as_deref());

    let (tx, mut rx) = mpsc::unbounded_channel();
    tokio::spawn(async move {
        // Services keep running after their handles are dropped.
        let _ = setup(&config, Some(&tx)).await;
    });

    let handler = wait_ready_with_events(
        &args.wait,
        Duration::from_secs(args.timeout),
        &mut rx,
    )
    .await?;

    let value = proxy_env_value(handler.as_ref(), &args.wait);
    info!(addr = %args.wait, var = %args.proxy_env, value = %value, "proxy ready");

    let code = handoff(&args.command, &[(args.proxy_env.clone(), value)]).await?;
    if let Some(notice) = exit_notice(&args.command, code) {
        eprintln!("{notice}");
    }
    Ok(code)
}

/// Line written to stderr when the command fails.
fn exit_notice(command: &[String], code: i32) -> Option<String> {
    let program = command.first().map_or("command", String::as_str);
    (code != 0).then(|| format!("hopline: {program} exited with status {code}"))
}
