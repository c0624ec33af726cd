//! Codec trait and implementations for application payloads.
//!
//! A codec converts between Rust types and raw bytes. The protocol layer
//! doesn't care how payloads are serialized — it just needs something that
//! implements [`Codec`]. [`JsonCodec`] is the default; the wire format for
//! chat messages is a small JSON object, so JSON is also the only codec
//! shipped today.

use serde::{Serialize, de::DeserializeOwned};

use crate::ProtocolError;

/// A codec that can encode values to bytes and decode bytes back.
///
/// `Send + Sync + 'static` because a codec is shared across connection
/// tasks for the life of the server. `DeserializeOwned` (rather than plain
/// `Deserialize`) means decoded values own their data, so the input buffer
/// can be dropped immediately — which it is, since the buffer is usually a
/// just-decrypted scratch allocation.
pub trait Codec: Send + Sync + 'static {
    /// Serializes a value into bytes.
    fn encode<T: Serialize>(
        &self,
        value: &T,
    ) -> Result<Vec<u8>, ProtocolError>;

    /// Deserializes bytes back into a value.
    fn decode<T: DeserializeOwned>(
        &self,
        data: &[u8],
    ) -> Result<T, ProtocolError>;
}

/// A [`Codec`] backed by `serde_json`.
///
/// ## Example
///
/// ```rust
/// use confab_protocol::{ChatMessage, Codec, JsonCodec};
///
/// let codec = JsonCodec;
/// let msg = ChatMessage {
///     nickname: "alice".into(),
///     msg: "hello".into(),
/// };
///
/// let bytes = codec.encode(&msg).unwrap();
/// let decoded: ChatMessage = codec.decode(&bytes).unwrap();
/// assert_eq!(msg, decoded);
/// ```
#[cfg(feature = "json")]
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

#[cfg(feature = "json")]
impl Codec for JsonCodec {
    fn encode<T: Serialize>(
        &self,
        value: &T,
    ) -> Result<Vec<u8>, ProtocolError> {
        serde_json::to_vec(value).map_err(ProtocolError::Encode)
    }

    fn decode<T: DeserializeOwned>(
        &self,
        data: &[u8],
    ) -> Result<T, ProtocolError> {
        serde_json::from_slice(data).map_err(ProtocolError::Decode)
    }
}
