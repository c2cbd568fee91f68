//! Unified error type for the Noughts server.

use noughts_engine::GameError;
use noughts_protocol::ProtocolError;
use noughts_transport::TransportError;

use crate::config::ConfigError;

/// Top-level error that wraps all crate-specific errors.
///
/// `#[from]` on each variant lets `?` convert sub-crate errors directly.
#[derive(Debug, thiserror::Error)]
pub enum NoughtsError {
    /// A transport-level error (bind, accept, send, recv).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A protocol-level error (encode, decode, invalid message).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A rejected game command.
    #[error(transparent)]
    Game(#[from] GameError),

    /// Unusable configuration.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The HTTP listener couldn't bind.
    #[error("failed to bind HTTP listener to {addr}: {source}")]
    HttpBind {
        addr: String,
        #[source]
        source: std::io::Error,
    },
}
