//! Codec trait and implementations for packing/unpacking messages.
//!
//! A "codec" (coder/decoder) converts between Rust types and raw bytes.
//! The client doesn't care HOW messages are serialized; it only needs
//! something that implements [`Codec`]. On top of the generic
//! `encode`/`decode` pair the trait provides the two operations the
//! dispatch layer actually calls:
//!
//! - [`Codec::pack`]: `(type, data)` → bytes ready for the socket
//! - [`Codec::unpack`]: bytes from the socket → validated [`WireMessage`]

use serde::{de::DeserializeOwned, Serialize};

use crate::{OutboundIntent, ProtocolError, WireMessage};

/// A codec that can encode Rust types to bytes and decode bytes back.
///
/// `Send + Sync + 'static` because the client shares its codec with the
/// task that reads inbound frames.
pub trait Codec: Send + Sync + 'static {
    /// Serializes a value into bytes.
    ///
    /// # Errors
    /// Returns `ProtocolError::Encode` if serialization fails.
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError>;

    /// Deserializes bytes back into a value.
    ///
    /// # Errors
    /// Returns `ProtocolError::Decode` if the bytes are malformed,
    /// incomplete, or don't match the expected type.
    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError>;

    /// Wraps `data` (JSON text) in a [`WireMessage`] tagged `msg_type`
    /// and encodes it.
    ///
    /// # Errors
    /// Returns `ProtocolError::InvalidMessage` for an empty type tag, or
    /// whatever `encode` reports.
    fn pack(&self, msg_type: &str, data: &str) -> Result<Vec<u8>, ProtocolError> {
        let message = WireMessage::new(msg_type, data);
        message.validate()?;
        self.encode(&message)
    }

    /// Packs an [`OutboundIntent`].
    ///
    /// # Errors
    /// Same as [`pack`](Self::pack).
    fn pack_intent(&self, intent: &OutboundIntent) -> Result<Vec<u8>, ProtocolError> {
        self.pack(&intent.msg_type, &intent.data)
    }

    /// Decodes a raw frame into a [`WireMessage`] and checks that it has a
    /// type tag to route on.
    ///
    /// # Errors
    /// Returns `ProtocolError::Decode` for bytes that aren't an envelope and
    /// `ProtocolError::InvalidMessage` for an envelope without a type.
    fn unpack(&self, data: &[u8]) -> Result<WireMessage, ProtocolError> {
        let message: WireMessage = self.decode(data)?;
        message.validate()?;
        Ok(message)
    }
}

// ---------------------------------------------------------------------------
// JsonCodec
// ---------------------------------------------------------------------------

/// A [`Codec`] that uses JSON (via `serde_json`), the only format the
/// lobby server speaks.
///
/// ## Example
///
/// ```rust
/// use spyfall_protocol::{Codec, JsonCodec};
///
/// let codec = JsonCodec;
///
/// let bytes = codec.pack("CREATE_GAME", r#"{"username":"bob"}"#).unwrap();
/// let message = codec.unpack(&bytes).unwrap();
///
/// assert_eq!(message.msg_type, "CREATE_GAME");
/// assert_eq!(message.data, r#"{"username":"bob"}"#);
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl Codec for JsonCodec {
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError> {
        serde_json::to_vec(value).map_err(ProtocolError::Encode)
    }

    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError> {
        serde_json::from_slice(data).map_err(ProtocolError::Decode)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{CreateGame, GameJoined, JoinGame};

    #[test]
    fn test_pack_unpack_preserves_type_and_data() {
        let codec = JsonCodec;
        let intent = OutboundIntent::from_payload(&JoinGame {
            game_id: "abc123".into(),
            username: "alice".into(),
        })
        .unwrap();

        let bytes = codec.pack_intent(&intent).unwrap();
        let message = codec.unpack(&bytes).unwrap();

        assert_eq!(message.msg_type, intent.msg_type);
        assert_eq!(message.data, intent.data);
    }

    #[test]
    fn test_packed_bytes_are_utf8_json() {
        let bytes = JsonCodec
            .pack_intent(
                &OutboundIntent::from_payload(&CreateGame {
                    username: "bob".into(),
                })
                .unwrap(),
            )
            .unwrap();

        let text = std::str::from_utf8(&bytes).unwrap();
        assert_eq!(
            text,
            r#"{"type":"CREATE_GAME","data":"{\"username\":\"bob\"}"}"#
        );
    }

    #[test]
    fn test_pack_rejects_empty_type() {
        let result = JsonCodec.pack("", "{}");
        assert!(matches!(result, Err(ProtocolError::InvalidMessage(_))));
    }

    #[test]
    fn test_unpack_garbage_is_decode_error() {
        let result = JsonCodec.unpack(b"not json at all");
        assert!(matches!(result, Err(ProtocolError::Decode(_))));
    }

    #[test]
    fn test_unpack_without_type_is_invalid() {
        let result = JsonCodec.unpack(br#"{"data":"{}"}"#);
        assert!(matches!(result, Err(ProtocolError::InvalidMessage(_))));
    }

    #[test]
    fn test_unpack_inline_server_event() {
        let message = JsonCodec
            .unpack(br#"{"type":"JOIN_GAME","data":{"gameId":"abc123","username":"alice"}}"#)
            .unwrap();
        let joined: GameJoined = message.data_as().unwrap();
        assert_eq!(joined.username, "alice");
    }
}
