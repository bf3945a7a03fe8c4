//! Configuration validation logic.
//!
//! Only mistakes that leave nothing sensible to run are rejected here.
//! Missing names, duplicate names, unknown `type` strings and dangling
//! chain references are tolerated; the naming ones are warned about at
//! load time, the rest when the topology is built.

use std::collections::HashSet;

use tracing::warn;

use crate::loader::ConfigError;
use crate::{Config, DialerConfig};

pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    let mut service_names = HashSet::new();
    for (i, svc) in config.services.iter().enumerate() {
        if svc.addr.trim().is_empty() {
            return Err(ConfigError::Validation(format!(
                "services[{i}] ({:?}): addr is empty",
                svc.name
            )));
        }
        if svc.name.trim().is_empty() {
            warn!(index = i, addr = %svc.addr, "service has no name");
        } else if !service_names.insert(svc.name.as_str()) {
            warn!(service = %svc.name, "service name declared more than once");
        }
    }

    for (i, chain) in config.chains.iter().enumerate() {
        if chain.name.trim().is_empty() {
            warn!(index = i, "chain has no name and cannot be referenced");
        }
        for (h, hop) in chain.hops.iter().enumerate() {
            for (n, node) in hop.nodes.iter().enumerate() {
                let at = format!("chain {:?} hops[{h}].nodes[{n}]", chain.name);
                if node.addr.trim().is_empty() {
                    return Err(ConfigError::Validation(format!("{at}: addr is empty")));
                }
                validate_dialer(&at, &node.dialer)?;
            }
        }
    }

    let t = &config.timeouts;
    if t.connect_timeout_secs == 0 || t.handshake_timeout_secs == 0 || t.idle_timeout_secs == 0 {
        return Err(ConfigError::Validation(
            "timeouts: connect, handshake and idle timeouts must be > 0".into(),
        ));
    }
    if t.relay_buffer_size == 0 {
        return Err(ConfigError::Validation(
            "timeouts.relay_buffer_size must be > 0".into(),
        ));
    }
    if t.max_header_bytes < 256 {
        return Err(ConfigError::Validation(
            "timeouts.max_header_bytes too small (min 256)".into(),
        ));
    }

    Ok(())
}

fn validate_dialer(at: &str, dialer: &DialerConfig) -> Result<(), ConfigError> {
    let Some(opts) = dialer.ws_options() else {
        return Ok(());
    };
    if let Some(path) = &opts.path
        && !path.starts_with('/')
    {
        return Err(ConfigError::Validation(format!(
            "{at}: dialer path {path:?} must start with '/'"
        )));
    }
    if let Some(host) = &opts.host
        && host.trim().is_empty()
    {
        return Err(ConfigError::Validation(format!(
            "{at}: dialer host is empty"
        )));
    }
    Ok(())
}
