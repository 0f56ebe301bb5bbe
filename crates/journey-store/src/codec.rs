//! Pluggable state payload ⇄ byte encoding.

use serde::{Serialize, de::DeserializeOwned};
use serde_cbor::value::Value as CborValue;
use serde_json::Value as JsonValue;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("failed to encode state: {0}")]
    Encode(String),
    #[error("failed to decode state: {0}")]
    Decode(String),
}

/// Byte encoding for opaque state payloads.
///
/// Codecs are object-safe and trade in `serde_json::Value`; the typed
/// [`encode_state`]/[`decode_state`] helpers bridge concrete payload types at
/// the boundary. Implementations must round-trip: `decode(encode(v)) == v`.
pub trait StateCodec: Send + Sync {
    fn name(&self) -> &'static str;

    fn encode_value(&self, value: &JsonValue) -> Result<Vec<u8>, CodecError>;

    fn decode_value(&self, bytes: &[u8]) -> Result<JsonValue, CodecError>;
}

/// Encode a concrete payload through the given codec.
pub fn encode_state<T: Serialize>(codec: &dyn StateCodec, state: &T) -> Result<Vec<u8>, CodecError> {
    let value = serde_json::to_value(state).map_err(|err| CodecError::Encode(err.to_string()))?;
    codec.encode_value(&value)
}

/// Reconstitute a concrete payload from codec bytes.
pub fn decode_state<T: DeserializeOwned>(
    codec: &dyn StateCodec,
    bytes: &[u8],
) -> Result<T, CodecError> {
    let value = codec.decode_value(bytes)?;
    serde_json::from_value(value).map_err(|err| CodecError::Decode(err.to_string()))
}

/// Canonical CBOR codec (RFC 8949 deterministic encoding). The default:
/// byte-stable for identical payloads, so stored blobs are comparable.
#[derive(Debug, Clone, Copy, Default)]
pub struct CborCodec;

impl StateCodec for CborCodec {
    fn name(&self) -> &'static str {
        "cbor"
    }

    fn encode_value(&self, value: &JsonValue) -> Result<Vec<u8>, CodecError> {
        to_canonical_cbor(value).map_err(|err| CodecError::Encode(err.to_string()))
    }

    fn decode_value(&self, bytes: &[u8]) -> Result<JsonValue, CodecError> {
        serde_cbor::from_slice(bytes).map_err(|err| CodecError::Decode(err.to_string()))
    }
}

/// Compact JSON codec, mostly useful when the backing store should stay
/// human-readable.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl StateCodec for JsonCodec {
    fn name(&self) -> &'static str {
        "json"
    }

    fn encode_value(&self, value: &JsonValue) -> Result<Vec<u8>, CodecError> {
        serde_json::to_vec(value).map_err(|err| CodecError::Encode(err.to_string()))
    }

    fn decode_value(&self, bytes: &[u8]) -> Result<JsonValue, CodecError> {
        serde_json::from_slice(bytes).map_err(|err| CodecError::Decode(err.to_string()))
    }
}

/// Serialize a value into canonical CBOR bytes using RFC 8949 deterministic
/// rules (map keys sorted via the value round-trip).
pub(crate) fn to_canonical_cbor<T: Serialize>(value: &T) -> Result<Vec<u8>, serde_cbor::Error> {
    let canonical: CborValue = serde_cbor::value::to_value(value)?;
    let mut buf = Vec::with_capacity(256);
    let mut serializer = serde_cbor::ser::Serializer::new(&mut buf);
    serializer.self_describe()?;
    canonical.serialize(&mut serializer)?;
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Payload {
        name: String,
        step: u32,
    }

    #[test]
    fn cbor_round_trip() {
        let codec = CborCodec;
        let payload = Payload {
            name: "demo".into(),
            step: 3,
        };
        let bytes = encode_state(&codec, &payload).expect("encode");
        let back: Payload = decode_state(&codec, &bytes).expect("decode");
        assert_eq!(payload, back);
    }

    #[test]
    fn cbor_encoding_is_byte_stable() {
        let codec = CborCodec;
        let payload = Payload {
            name: "demo".into(),
            step: 3,
        };
        let a = encode_state(&codec, &payload).expect("encode");
        let b = encode_state(&codec, &payload).expect("encode");
        assert_eq!(a, b);
    }

    #[test]
    fn json_round_trip() {
        let codec = JsonCodec;
        let payload = Payload {
            name: "demo".into(),
            step: 9,
        };
        let bytes = encode_state(&codec, &payload).expect("encode");
        assert_eq!(bytes.first(), Some(&b'{'));
        let back: Payload = decode_state(&codec, &bytes).expect("decode");
        assert_eq!(payload, back);
    }

    #[test]
    fn decode_into_mismatched_type_fails() {
        let codec = JsonCodec;
        let bytes = encode_state(&codec, &Payload {
            name: "demo".into(),
            step: 1,
        })
        .expect("encode");
        let err = decode_state::<Vec<u8>>(&codec, &bytes).expect_err("decode");
        assert!(matches!(err, CodecError::Decode(_)));
    }
}
