//! Codec trait and implementations for serializing/deserializing signals.
//!
//! The protocol layer doesn't care how envelopes become bytes — it just
//! needs something that implements [`Codec`]. [`JsonCodec`] is the default
//! and is human-readable, which pays off every time a transition stalls
//! and someone has to read a packet capture. A compact binary codec can be
//! added later without touching any other layer.

use serde::{Serialize, de::DeserializeOwned};

use crate::ProtocolError;

/// Encodes Rust types to bytes and decodes bytes back.
///
/// `Send + Sync + 'static` because the codec is shared by every node task
/// and lives as long as the node itself.
pub trait Codec: Send + Sync + 'static {
    /// Serializes a value into bytes.
    ///
    /// # Errors
    /// Returns [`ProtocolError::Encode`] if serialization fails.
    fn encode<T: Serialize>(
        &self,
        value: &T,
    ) -> Result<Vec<u8>, ProtocolError>;

    /// Deserializes bytes back into a value.
    ///
    /// # Errors
    /// Returns [`ProtocolError::Decode`] if the bytes are malformed,
    /// truncated, or don't match the expected type.
    fn decode<T: DeserializeOwned>(
        &self,
        data: &[u8],
    ) -> Result<T, ProtocolError>;
}

/// A [`Codec`] backed by `serde_json`.
///
/// Behind the `json` feature flag (enabled by default).
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

#[cfg(all(test, feature = "json"))]
mod tests {
    use super::*;
    use crate::{Envelope, ResourceId, Signal};

    #[test]
    fn test_json_codec_round_trips_an_envelope() {
        let codec = JsonCodec;
        let envelope = Envelope {
            seq: 7,
            timestamp: 1234,
            signal: Signal::StartTransition {
                resource: ResourceId::new("Hub"),
            },
        };

        let bytes = codec.encode(&envelope).unwrap();
        let decoded: Envelope = codec.decode(&bytes).unwrap();
        assert_eq!(envelope, decoded);
    }

    #[test]
    fn test_json_codec_decode_rejects_garbage() {
        let codec = JsonCodec;
        let result: Result<Envelope, _> = codec.decode(b"\x00\x01\x02");
        assert!(result.is_err());
    }
}
