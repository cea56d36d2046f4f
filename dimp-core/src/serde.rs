// SPDX-License-Identifier: MIT OR Apache-2.0

//! Helpers for `serde` to encode byte strings.
//!
//! The wire format is JSON and carries binary values (keys, signatures, ciphertexts) as standard
//! base64 strings. Binary encodings like CBOR keep the raw bytes.
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::{Deserialize, Serialize};
use serde_bytes::{ByteBuf as SerdeByteBuf, Bytes as SerdeBytes};

/// Encodes bytes as a base64 string.
pub fn encode_base64(bytes: &[u8]) -> String {
    BASE64.encode(bytes)
}

/// Decodes a base64 string into bytes.
pub fn decode_base64(value: &str) -> Result<Vec<u8>, base64::DecodeError> {
    BASE64.decode(value)
}

/// Serializes bytes into a base64 string when using a human readable encoding (JSON), otherwise
/// it serializes the bytes directly (CBOR).
pub fn serialize_base64<S>(value: &[u8], serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    if serializer.is_human_readable() {
        encode_base64(value).serialize(serializer)
    } else {
        SerdeBytes::new(value).serialize(serializer)
    }
}

/// Deserializes bytes from a base64 string when using a human readable encoding (JSON),
/// otherwise it deserializes the bytes directly (CBOR).
pub fn deserialize_base64<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    if deserializer.is_human_readable() {
        let value = String::deserialize(deserializer)?;
        decode_base64(&value).map_err(serde::de::Error::custom)
    } else {
        let bytes = <SerdeByteBuf>::deserialize(deserializer)?;
        Ok(bytes.into_vec())
    }
}

#[cfg(test)]
mod tests {
    use serde::{Deserialize, Serialize};

    use crate::cbor::{decode_cbor, encode_cbor};

    use super::{deserialize_base64, serialize_base64};

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Wrapped(
        #[serde(
            serialize_with = "serialize_base64",
            deserialize_with = "deserialize_base64"
        )]
        Vec<u8>,
    );

    #[test]
    fn base64_in_json() {
        let value = Wrapped(vec![104, 105]);
        let json = serde_json::to_string(&value).unwrap();
        assert_eq!(json, "\"aGk=\"");
        assert_eq!(serde_json::from_str::<Wrapped>(&json).unwrap(), value);
    }

    #[test]
    fn raw_bytes_in_cbor() {
        let value = Wrapped(vec![1, 2, 3, 4]);
        let bytes = encode_cbor(&value).unwrap();
        // Byte string header (major type 2, length 4) followed by the bytes themselves.
        assert_eq!(bytes, vec![0x44, 1, 2, 3, 4]);
        assert_eq!(decode_cbor::<Wrapped, _>(&bytes[..]).unwrap(), value);
    }

    #[test]
    fn reject_invalid_base64() {
        assert!(serde_json::from_str::<Wrapped>("\"***\"").is_err());
    }
}
