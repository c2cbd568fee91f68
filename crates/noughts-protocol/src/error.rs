//! Error types for the protocol layer.

/// Errors that can occur while encoding, decoding, or parsing values at
/// the protocol boundary.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed (turning a Rust type into bytes).
    #[cfg(feature = "json")]
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    /// Deserialization failed (turning bytes into a Rust type).
    ///
    /// Common causes: malformed JSON, missing fields, an unknown
    /// `"type"` tag, or a mark other than `"X"`/`"O"`.
    #[cfg(feature = "json")]
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),

    /// A mark string was neither `X` nor `O`.
    #[error("invalid mark {0:?}: expected \"X\" or \"O\"")]
    InvalidMark(String),

    /// A session id string was not a valid UUID.
    #[error("invalid session id: {0}")]
    InvalidSessionId(#[source] uuid::Error),

    /// The message decoded but violates protocol rules.
    #[error("invalid message: {0}")]
    InvalidMessage(String),
}
