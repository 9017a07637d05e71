//! Error types for the protocol layer.
//!
//! Each Lexgrid crate defines its own error enum, so a `ProtocolError`
//! always means "the bytes or their contents were wrong", never a network
//! or room problem.

/// Errors that can occur in the protocol layer.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed (Rust value → bytes).
    #[cfg(feature = "json")]
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    /// Deserialization failed: malformed JSON, an unknown event name, a
    /// missing field, or a field of the wrong type.
    #[cfg(feature = "json")]
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),

    /// A room code with the wrong length or a character outside the
    /// room-code alphabet.
    #[error("invalid room code: {0:?}")]
    InvalidRoomCode(String),

    /// The message decoded but breaks a protocol rule.
    #[error("invalid message: {0}")]
    InvalidMessage(String),
}
