//! Codec trait and implementations for serializing/deserializing messages.
//!
//! The room layer encodes every event exactly once per broadcast and
//! hands the same bytes to each recipient, so the codec sits outside the
//! per-connection path.

use serde::{Serialize, de::DeserializeOwned};

use crate::ProtocolError;

/// A codec that can encode Rust types to bytes and decode bytes back.
///
/// `Send + Sync + 'static` because the codec is stored inside the
/// coordinator and used from every connection task.
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
}

// ---------------------------------------------------------------------------
// JsonCodec
// ---------------------------------------------------------------------------

/// A [`Codec`] that uses JSON (via `serde_json`).
///
/// Browser clients parse every frame with `JSON.parse`, so this is the
/// codec the server runs with.
///
/// ## Example
///
/// ```rust
/// use leaguehub_protocol::{Codec, DraftState, JsonCodec, ServerEvent};
///
/// let codec = JsonCodec;
/// let event = ServerEvent::DraftStateChange {
///     draft_state: DraftState::InProgress,
/// };
///
/// let bytes = codec.encode(&event).unwrap();
/// assert_eq!(
///     std::str::from_utf8(&bytes).unwrap(),
///     r#"{"type":"draft.stateChange","draftState":"IN_PROGRESS"}"#
/// );
///
/// let decoded: ServerEvent = codec.decode(&bytes).unwrap();
/// assert_eq!(decoded, event);
/// ```
#[cfg(feature = "json")]
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

#[cfg(feature = "json")]
impl Codec for JsonCodec {
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError> {
        serde_json::to_vec(value).map_err(ProtocolError::Encode)
    }

    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError> {
        serde_json::from_slice(data).map_err(ProtocolError::Decode)
    }
}

#[cfg(all(test, feature = "json"))]
mod tests {
    use super::*;
    use crate::{ClientMessage, UserId};

    #[test]
    fn test_decode_rejects_garbage() {
        let err = JsonCodec.decode::<ClientMessage>(b"not json").unwrap_err();
        assert!(matches!(err, ProtocolError::Decode(_)));
        assert!(err.to_string().starts_with("decode failed"));
    }

    #[test]
    fn test_encode_identifier_is_bare_string() {
        let bytes = JsonCodec.encode(&UserId::from("alice")).unwrap();
        assert_eq!(bytes, br#""alice""#);
    }
}
