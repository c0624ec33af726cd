//! Error types for the protocol layer.
//!
//! Each crate in Confab defines its own error enum. When you see a
//! `ProtocolError`, the problem is in parsing or serialization — not in
//! networking, crypto, or storage.

/// Errors that can occur in the protocol layer.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed (turning a Rust type into bytes).
    #[cfg(feature = "json")]
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    /// Deserialization failed (turning bytes into a Rust type).
    ///
    /// Common causes: malformed JSON, missing fields, or a payload that
    /// was decrypted with the wrong key and is now garbage.
    #[cfg(feature = "json")]
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),

    /// A frame arrived with no kind byte at all.
    #[error("empty frame")]
    EmptyFrame,

    /// The frame's kind byte is not one we know.
    #[error("unknown frame kind {0:#04x}")]
    UnknownFrameKind(u8),

    /// A control frame's body is not valid UTF-8 or does not match the
    /// control grammar (login request, invite digest, status string).
    #[error("malformed control frame: {0}")]
    MalformedControl(String),

    /// The message is invalid at the protocol level — it parsed, but
    /// violates protocol rules (e.g. a frame kind that is not allowed in
    /// the current handshake state).
    #[error("invalid message: {0}")]
    InvalidMessage(String),
}
