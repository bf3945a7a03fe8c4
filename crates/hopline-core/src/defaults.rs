//! Default configuration values.
//!
//! Centralized default constants for use across all crates.

// ============================================================================
// Readiness / Handoff Defaults
// ============================================================================

/// Address polled before the wrapped command is started.
pub const DEFAULT_WAIT_ADDR: &str = "127.0.0.1:1080";
/// How long the readiness gate waits for the address to accept connections.
pub const DEFAULT_READY_TIMEOUT_SECS: u64 = 5;
/// Interval between readiness connection attempts.
pub const READY_POLL_INTERVAL_MS: u64 = 200;
/// Environment variable handed to the child process.
pub const DEFAULT_PROXY_ENV: &str = "ALL_PROXY";

// ============================================================================
// Timeout Defaults
// ============================================================================

/// Default TCP idle timeout in seconds.
pub const DEFAULT_TCP_TIMEOUT_SECS: u64 = 600;
/// Default timeout for establishing a transport connection to a node.
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;
/// Default timeout for a proxy or WebSocket handshake.
pub const DEFAULT_HANDSHAKE_TIMEOUT_SECS: u64 = 10;
/// Cooldown before a failed node is tried again.
pub const DEFAULT_NODE_FAILURE_COOLDOWN_SECS: u64 = 30;
/// TCP keepalive idle time on connections to nodes (0 = off).
pub const DEFAULT_TCP_KEEPALIVE_SECS: u64 = 300;

// ============================================================================
// Buffer/Size Defaults
// ============================================================================

/// Default relay buffer size (32 KiB).
pub const DEFAULT_RELAY_BUFFER_SIZE: usize = 32768;
/// Maximum size of an HTTP request or response head.
pub const DEFAULT_MAX_HEADER_BYTES: usize = 8192;

// ============================================================================
// Protocol Defaults
// ============================================================================

/// Default WebSocket request path.
pub const DEFAULT_WS_PATH: &str = "/";
