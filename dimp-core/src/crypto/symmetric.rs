// SPDX-License-Identifier: MIT OR Apache-2.0

//! Algorithm-tagged symmetric keys used to encrypt message content.
//!
//! A key travels as a small CBOR record `{ "algorithm": "...", "data": bytes }`, this is the
//! plaintext which gets wrapped for every recipient of a message.
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::cbor::{DecodeError, EncodeError, decode_cbor, encode_cbor};
use crate::crypto::xchacha20::{NONCE_SIZE, XAeadError, XAeadNonce, x_aead_decrypt, x_aead_encrypt};
use crate::crypto::{Rng, RngError, Secret};

/// 256-bit symmetric key size.
pub const SYMMETRIC_KEY_SIZE: usize = 32;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SymmetricAlgorithm {
    /// Identity transform, only used for broadcast messages.
    Plain,
    XChaCha20Poly1305,
}

impl SymmetricAlgorithm {
    pub fn as_str(&self) -> &'static str {
        match self {
            SymmetricAlgorithm::Plain => "PLAIN",
            SymmetricAlgorithm::XChaCha20Poly1305 => "XCHACHA20POLY1305",
        }
    }
}

impl fmt::Display for SymmetricAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for SymmetricAlgorithm {
    type Err = SymmetricError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "PLAIN" => Ok(SymmetricAlgorithm::Plain),
            "XCHACHA20POLY1305" => Ok(SymmetricAlgorithm::XChaCha20Poly1305),
            other => Err(SymmetricError::UnknownAlgorithm(other.to_string())),
        }
    }
}

/// Symmetric key record.
///
/// `Plain` stands in for "no encryption" so broadcast messages can run through the same code path
/// as everything else. It is never cached or persisted.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SymmetricKey {
    Plain,
    XChaCha20Poly1305(Secret<SYMMETRIC_KEY_SIZE>),
}

impl SymmetricKey {
    /// Generates a fresh XChaCha20-Poly1305 key.
    pub fn generate(rng: &Rng) -> Result<Self, SymmetricError> {
        let bytes: [u8; SYMMETRIC_KEY_SIZE] = rng.random_array()?;
        Ok(SymmetricKey::XChaCha20Poly1305(Secret::from_bytes(bytes)))
    }

    pub fn from_bytes(bytes: [u8; SYMMETRIC_KEY_SIZE]) -> Self {
        SymmetricKey::XChaCha20Poly1305(Secret::from_bytes(bytes))
    }

    pub fn algorithm(&self) -> SymmetricAlgorithm {
        match self {
            SymmetricKey::Plain => SymmetricAlgorithm::Plain,
            SymmetricKey::XChaCha20Poly1305(_) => SymmetricAlgorithm::XChaCha20Poly1305,
        }
    }

    pub fn is_plain(&self) -> bool {
        matches!(self, SymmetricKey::Plain)
    }

    /// Encrypts the plaintext, the returned bytes are `nonce ‖ ciphertext`.
    ///
    /// The plain key returns the input unchanged.
    pub fn encrypt(&self, plaintext: &[u8], rng: &Rng) -> Result<Vec<u8>, SymmetricError> {
        match self {
            SymmetricKey::Plain => Ok(plaintext.to_vec()),
            SymmetricKey::XChaCha20Poly1305(secret) => {
                let nonce: XAeadNonce = rng.random_array()?;
                let ciphertext = x_aead_encrypt(secret.as_bytes(), plaintext, nonce, None)?;
                let mut out = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
                out.extend_from_slice(&nonce);
                out.extend_from_slice(&ciphertext);
                Ok(out)
            }
        }
    }

    pub fn decrypt(&self, ciphertext: &[u8]) -> Result<Vec<u8>, SymmetricError> {
        match self {
            SymmetricKey::Plain => Ok(ciphertext.to_vec()),
            SymmetricKey::XChaCha20Poly1305(secret) => {
                if ciphertext.len() < NONCE_SIZE {
                    return Err(SymmetricError::CiphertextTooShort(ciphertext.len()));
                }
                let (nonce, ciphertext) = ciphertext.split_at(NONCE_SIZE);
                let nonce: XAeadNonce = nonce
                    .try_into()
                    .map_err(|_| SymmetricError::CiphertextTooShort(nonce.len()))?;
                Ok(x_aead_decrypt(secret.as_bytes(), ciphertext, nonce, None)?)
            }
        }
    }

    /// Encodes the key record as CBOR.
    pub fn to_bytes(&self) -> Result<Vec<u8>, SymmetricError> {
        let record = KeyRecord::from(self);
        Ok(encode_cbor(&record)?)
    }

    /// Decodes a CBOR key record.
    pub fn try_from_bytes(bytes: &[u8]) -> Result<Self, SymmetricError> {
        let record: KeyRecord = decode_cbor(bytes)?;
        SymmetricKey::try_from(record)
    }
}

impl Serialize for SymmetricKey {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        KeyRecord::from(self).serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for SymmetricKey {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let record = KeyRecord::deserialize(deserializer)?;
        SymmetricKey::try_from(record).map_err(|err| serde::de::Error::custom(err.to_string()))
    }
}

#[derive(Serialize, Deserialize)]
struct KeyRecord {
    algorithm: String,
    #[serde(with = "serde_bytes")]
    data: Vec<u8>,
}

impl From<&SymmetricKey> for KeyRecord {
    fn from(key: &SymmetricKey) -> Self {
        let data = match key {
            SymmetricKey::Plain => Vec::new(),
            SymmetricKey::XChaCha20Poly1305(secret) => secret.as_bytes().to_vec(),
        };
        KeyRecord {
            algorithm: key.algorithm().to_string(),
            data,
        }
    }
}

impl TryFrom<KeyRecord> for SymmetricKey {
    type Error = SymmetricError;

    fn try_from(record: KeyRecord) -> Result<Self, Self::Error> {
        match record.algorithm.parse()? {
            SymmetricAlgorithm::Plain => Ok(SymmetricKey::Plain),
            SymmetricAlgorithm::XChaCha20Poly1305 => {
                let bytes: [u8; SYMMETRIC_KEY_SIZE] = record
                    .data
                    .as_slice()
                    .try_into()
                    .map_err(|_| SymmetricError::InvalidKeyLength(record.data.len()))?;
                Ok(SymmetricKey::from_bytes(bytes))
            }
        }
    }
}

#[derive(Debug, Error)]
pub enum SymmetricError {
    #[error("unknown symmetric algorithm '{0}'")]
    UnknownAlgorithm(String),

    #[error("invalid symmetric key length {0} bytes, expected 32 bytes")]
    InvalidKeyLength(usize),

    #[error("ciphertext of {0} bytes is too short to carry a nonce")]
    CiphertextTooShort(usize),

    #[error(transparent)]
    Aead(#[from] XAeadError),

    #[error(transparent)]
    Rng(#[from] RngError),

    #[error(transparent)]
    Encode(#[from] EncodeError),

    #[error(transparent)]
    Decode(#[from] DecodeError),
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use crate::crypto::Rng;

    use super::{SymmetricAlgorithm, SymmetricError, SymmetricKey};

    #[test]
    fn encrypt_decrypt() {
        let rng = Rng::from_seed([1; 32]);
        let key = SymmetricKey::generate(&rng).unwrap();
        assert_eq!(key.algorithm(), SymmetricAlgorithm::XChaCha20Poly1305);

        let ciphertext = key.encrypt(b"Hello, Panda!", &rng).unwrap();
        assert_ne!(&ciphertext[24..], b"Hello, Panda!");
        assert_eq!(key.decrypt(&ciphertext).unwrap(), b"Hello, Panda!");

        // Fresh nonce for every encryption.
        let ciphertext_again = key.encrypt(b"Hello, Panda!", &rng).unwrap();
        assert_ne!(ciphertext, ciphertext_again);
    }

    #[test]
    fn plain_key_is_identity() {
        let rng = Rng::from_seed([1; 32]);
        let key = SymmetricKey::Plain;
        assert!(key.is_plain());
        assert_eq!(key.encrypt(b"{\"sn\":1}", &rng).unwrap(), b"{\"sn\":1}");
        assert_eq!(key.decrypt(b"{\"sn\":1}").unwrap(), b"{\"sn\":1}");
    }

    #[test]
    fn key_record() {
        let rng = Rng::from_seed([1; 32]);
        let key = SymmetricKey::generate(&rng).unwrap();

        let bytes = key.to_bytes().unwrap();
        assert_eq!(SymmetricKey::try_from_bytes(&bytes).unwrap(), key);

        let bytes = SymmetricKey::Plain.to_bytes().unwrap();
        assert_eq!(
            SymmetricKey::try_from_bytes(&bytes).unwrap(),
            SymmetricKey::Plain
        );
    }

    #[test]
    fn invalid_ciphertext() {
        let rng = Rng::from_seed([1; 32]);
        let key = SymmetricKey::generate(&rng).unwrap();
        let other_key = SymmetricKey::generate(&rng).unwrap();

        assert_matches!(
            key.decrypt(&[1, 2, 3]),
            Err(SymmetricError::CiphertextTooShort(3))
        );

        let ciphertext = key.encrypt(b"secret", &rng).unwrap();
        assert_matches!(other_key.decrypt(&ciphertext), Err(SymmetricError::Aead(_)));
    }
}
