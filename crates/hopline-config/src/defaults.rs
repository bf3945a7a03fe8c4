//! Default value functions for serde deserialization.
//!
//! These forward to constants defined in `hopline_core::defaults`.

use hopline_core::defaults;

macro_rules! default_fns {
    ($($fn_name:ident => $const_name:ident : $ty:ty),* $(,)?) => {
        $(
            pub(crate) fn $fn_name() -> $ty {
                defaults::$const_name
            }
        )*
    };
}

default_fns! {
    default_connect_timeout_secs   => DEFAULT_CONNECT_TIMEOUT_SECS: u64,
    default_handshake_timeout_secs => DEFAULT_HANDSHAKE_TIMEOUT_SECS: u64,
    default_idle_timeout_secs      => DEFAULT_TCP_TIMEOUT_SECS: u64,
    default_node_cooldown_secs     => DEFAULT_NODE_FAILURE_COOLDOWN_SECS: u64,
    default_tcp_keepalive_secs     => DEFAULT_TCP_KEEPALIVE_SECS: u64,
    default_relay_buffer_size      => DEFAULT_RELAY_BUFFER_SIZE: usize,
    default_max_header_bytes       => DEFAULT_MAX_HEADER_BYTES: usize,
}
