// SPDX-License-Identifier: MIT OR Apache-2.0

//! Encode and decode values in [CBOR] format.
//!
//! Binary records which never show up in the JSON wire format, like symmetric key records before
//! they get wrapped for a recipient, HPKE ciphertexts or persisted key tables, are encoded as
//! CBOR.
//!
//! [CBOR]: https://cbor.io/
use std::io::Read;

use ciborium::de::Error as DeserializeError;
use ciborium::ser::Error as SerializeError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Serializes a value into CBOR format.
pub fn encode_cbor<T: Serialize>(value: &T) -> Result<Vec<u8>, EncodeError> {
    let mut bytes = Vec::new();
    ciborium::ser::into_writer(value, &mut bytes).map_err(EncodeError::from)?;
    Ok(bytes)
}

/// Deserializes a value which was formatted in CBOR.
pub fn decode_cbor<T: for<'a> Deserialize<'a>, R: Read>(reader: R) -> Result<T, DecodeError> {
    ciborium::from_reader::<T, R>(reader).map_err(DecodeError::from)
}

/// An error occurred during CBOR serialization.
#[derive(Debug, Error)]
pub enum EncodeError {
    /// Writing bytes failed.
    #[error("an error occurred while writing bytes: {0}")]
    Io(std::io::Error),

    /// Value can not be serialized.
    #[error("an error occurred while serializing value: {0}")]
    Value(String),
}

impl From<SerializeError<std::io::Error>> for EncodeError {
    fn from(value: SerializeError<std::io::Error>) -> Self {
        match value {
            SerializeError::Io(err) => EncodeError::Io(err),
            SerializeError::Value(err) => EncodeError::Value(err),
        }
    }
}

/// An error occurred during CBOR deserialization.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// Reading bytes failed.
    #[error("an error occurred while reading bytes: {0}")]
    Io(std::io::Error),

    /// Bytes are not valid CBOR, contains the offset of the syntax error.
    #[error("an error occurred while parsing bytes at position {0}")]
    Syntax(usize),

    /// Bytes are valid CBOR but do not describe the expected value.
    #[error("an error occurred while processing a parsed value at position {0:?}: {1}")]
    Semantic(Option<usize>, String),

    /// Input is nested too deep.
    #[error("recursion limit exceeded while decoding")]
    RecursionLimitExceeded,
}

impl From<DeserializeError<std::io::Error>> for DecodeError {
    fn from(value: DeserializeError<std::io::Error>) -> Self {
        match value {
            DeserializeError::Io(err) => DecodeError::Io(err),
            DeserializeError::Syntax(offset) => DecodeError::Syntax(offset),
            DeserializeError::Semantic(offset, description) => {
                DecodeError::Semantic(offset, description)
            }
            DeserializeError::RecursionLimitExceeded => DecodeError::RecursionLimitExceeded,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::{DecodeError, decode_cbor, encode_cbor};

    #[test]
    fn nested_key_table() {
        let mut table: BTreeMap<String, BTreeMap<String, Vec<u8>>> = BTreeMap::new();
        table
            .entry("alice@abc".into())
            .or_default()
            .insert("bob@def".into(), vec![1, 2, 3]);

        let bytes = encode_cbor(&table).unwrap();
        let table_again: BTreeMap<String, BTreeMap<String, Vec<u8>>> =
            decode_cbor(&bytes[..]).unwrap();
        assert_eq!(table, table_again);
    }

    #[test]
    fn garbage_input() {
        let result: Result<BTreeMap<String, u64>, DecodeError> = decode_cbor(&[0xff, 0x00][..]);
        assert!(result.is_err());
    }
}
