//! Transport layer for the notes client.
//!
//! Provides:
//! - `Transport` - one persistent WebSocket with a fixed-interval reconnect loop
//! - `Correlator` - request/response matching over the shared connection
//!
//! Every inbound frame goes to the correlator (one-shot list) and then to all
//! broadcast subscribers, so direct replies and server pushes share a channel.

pub mod connection;
pub mod correlator;

pub use connection::{ConnectionState, Transport};
pub use correlator::{Correlator, Reply};

/// Transport error.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("No connection to server")]
    NotConnected,
    #[error("Connection to server lost")]
    ConnectionLost,
    #[error("Failed to encode message: {0}")]
    Encode(#[from] serde_json::Error),
}
