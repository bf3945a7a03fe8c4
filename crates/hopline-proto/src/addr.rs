//! `host:port` targets.

use std::fmt;
use std::net::{IpAddr, SocketAddr};

use crate::error::AddrError;

/// Maximum domain length encodable in a SOCKS5 request.
pub const MAX_DOMAIN_LEN: usize = 255;

/// Destination of a proxied connection.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TargetAddr {
    Ip(SocketAddr),
    Domain(String, u16),
}

impl TargetAddr {
    /// Parse `host:port`, `1.2.3.4:port` or `[v6]:port`.
    pub fn parse(s: &str) -> Result<Self, AddrError> {
        if let Ok(sa) = s.parse::<SocketAddr>() {
            return Ok(Self::Ip(sa));
        }
        let (host, port) = split_host_port(s)?;
        if let Ok(ip) = host.parse::<IpAddr>() {
            return Ok(Self::Ip(SocketAddr::new(ip, port)));
        }
        if host.len() > MAX_DOMAIN_LEN {
            return Err(AddrError::DomainTooLong);
        }
        Ok(Self::Domain(host.to_string(), port))
    }

    /// Host part without IPv6 brackets.
    pub fn host(&self) -> String {
        match self {
            Self::Ip(sa) => sa.ip().to_string(),
            Self::Domain(host, _) => host.clone(),
        }
    }

    pub fn port(&self) -> u16 {
        match self {
            Self::Ip(sa) => sa.port(),
            Self::Domain(_, port) => *port,
        }
    }
}

impl fmt::Display for TargetAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ip(sa) => write!(f, "{sa}"),
            Self::Domain(host, port) => write!(f, "{host}:{port}"),
        }
    }
}

/// Split `host:port`, accepting a bracketed IPv6 host.
pub fn split_host_port(s: &str) -> Result<(&str, u16), AddrError> {
    let (host, port) = if let Some(rest) = s.strip_prefix('[') {
        let (host, tail) = rest
            .split_once(']')
            .ok_or_else(|| AddrError::MissingPort(s.to_string()))?;
        let port = tail
            .strip_prefix(':')
            .ok_or_else(|| AddrError::MissingPort(s.to_string()))?;
        (host, port)
    } else {
        let (host, port) = s
            .rsplit_once(':')
            .ok_or_else(|| AddrError::MissingPort(s.to_string()))?;
        // A bare IPv6 literal has colons but no port.
        if host.contains(':') {
            return Err(AddrError::MissingPort(s.to_string()));
        }
        (host, port)
    };

    if host.is_empty() {
        return Err(AddrError::EmptyHost(s.to_string()));
    }
    let port = port
        .parse::<u16>()
        .map_err(|_| AddrError::InvalidPort(s.to_string()))?;
    Ok((host, port))
}

/// Reduce a node address to `host:port`.
///
/// Plain `host:port` passes through. URL forms
/// (`scheme://[user@]host[:port][/path]`) keep only the authority, with
/// the scheme's well-known port filled in when none is given.
pub fn normalize_node_addr(addr: &str) -> String {
    let addr = addr.trim();
    let Some((scheme, rest)) = addr.split_once("://") else {
        return addr.to_string();
    };

    let authority = rest.split(['/', '?', '#']).next().unwrap_or(rest);
    let authority = authority
        .rsplit_once('@')
        .map_or(authority, |(_, host)| host);

    if split_host_port(authority).is_ok() {
        return authority.to_string();
    }
    match default_port(scheme) {
        Some(port) if authority.contains(':') && !authority.starts_with('[') => {
            format!("[{authority}]:{port}")
        }
        Some(port) => format!("{authority}:{port}"),
        None => authority.to_string(),
    }
}

fn default_port(scheme: &str) -> Option<u16> {
    match scheme.to_ascii_lowercase().as_str() {
        "http" | "ws" => Some(80),
        "https" | "wss" | "mwss" => Some(443),
        "socks" | "socks5" | "socks5h" => Some(1080),
        _ => None,
    }
}
