//! Stream adapters for message-framed transports.

#[cfg(feature = "ws")]
mod ws;

#[cfg(feature = "ws")]
pub use ws::WsIo;
