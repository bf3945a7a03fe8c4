//! Tracing subscriber setup.

use std::io;

use hopline_config::LoggingConfig;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Filter directive from the config, the CLI level override and the
/// per-module filters.
pub fn filter_directive(config: &LoggingConfig, level_override: Option<&str>) -> String {
    let level = level_override
        .or(config.level.as_deref())
        .unwrap_or("info");
    let mut filters: Vec<_> = config.filters.iter().collect();
    filters.sort();

    let mut directive = level.to_string();
    for (module, level) in filters {
        directive.push(',');
        directive.push_str(module);
        directive.push('=');
        directive.push_str(level);
    }
    directive
}

/// Install the global subscriber. Output goes to stderr unless the config
/// asks for stdout, which would mix with the command's own output.
pub fn init_tracing(config: &LoggingConfig, level_override: Option<&str>) {
    let directive = filter_directive(config, level_override);
    let filter = EnvFilter::try_new(&directive).unwrap_or_else(|_| EnvFilter::new("info"));

    let format = config.format.as_deref().unwrap_or("pretty");
    let output = config.output.as_deref().unwrap_or("stderr");

    let registry = tracing_subscriber::registry().with(filter);
    let result = match (format, output) {
        ("json", "stdout") => registry.with(fmt::layer().json().with_writer(io::stdout)).try_init(),
        ("json", _) => registry.with(fmt::layer().json().with_writer(io::stderr)).try_init(),
        ("compact", "stdout") => registry
            .with(fmt::layer().compact().with_writer(io::stdout))
            .try_init(),
        ("compact", _) => registry
            .with(fmt::layer().compact().with_writer(io::stderr))
            .try_init(),
        (_, "stdout") => registry.with(fmt::layer().with_writer(io::stdout)).try_init(),
        _ => registry.with(fmt::layer().with_writer(io::stderr)).try_init(),
    };
    if let Err(e) = result {
        eprintln!("logging already initialized: {e}");
    }
}
