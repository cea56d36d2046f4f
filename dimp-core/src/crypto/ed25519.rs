// SPDX-License-Identifier: MIT OR Apache-2.0

//! Ed25519 signing keys and signatures.
//!
//! The key pair of an identity: its public half is published in the [`Meta`](crate::Meta), the
//! private half signs the seed fingerprint, documents and outgoing messages.
use std::fmt;
use std::hash::Hash as StdHash;

use ed25519_dalek::{
    PUBLIC_KEY_LENGTH, SECRET_KEY_LENGTH, SIGNATURE_LENGTH, Signer, SigningKey, Verifier,
    VerifyingKey,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::serde::{deserialize_base64, serialize_base64};

/// Size of Ed25519 private keys in bytes.
pub const PRIVATE_KEY_LEN: usize = SECRET_KEY_LENGTH;

/// Size of Ed25519 public keys in bytes.
pub const PUBLIC_KEY_LEN: usize = PUBLIC_KEY_LENGTH;

/// Size of Ed25519 signatures in bytes.
pub const SIGNATURE_LEN: usize = SIGNATURE_LENGTH;

/// Private Ed25519 key used for signing.
#[derive(Clone)]
pub struct PrivateKey(SigningKey);

impl PrivateKey {
    /// Generates a new private key from the thread-local CSPRNG, which is seeded by the operating
    /// system.
    pub fn new() -> Self {
        Self(SigningKey::from_bytes(&rand::random()))
    }

    /// Create a private key from its raw bytes representation.
    pub fn from_bytes(bytes: &[u8; PRIVATE_KEY_LEN]) -> Self {
        Self(SigningKey::from_bytes(bytes))
    }

    /// Bytes of the private key.
    pub fn as_bytes(&self) -> &[u8; PRIVATE_KEY_LEN] {
        self.0.as_bytes()
    }

    /// Returns the public half of this key.
    pub fn public_key(&self) -> PublicKey {
        PublicKey(self.0.verifying_key())
    }

    /// Sign any data using this private key.
    pub fn sign(&self, bytes: &[u8]) -> Signature {
        Signature(self.0.sign(bytes))
    }
}

impl Default for PrivateKey {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Do not reveal the private key when printing debug info.
        f.debug_tuple("PrivateKey").field(&"***").finish()
    }
}

impl TryFrom<&[u8]> for PrivateKey {
    type Error = Ed25519Error;

    fn try_from(value: &[u8]) -> Result<Self, Self::Error> {
        let bytes: [u8; PRIVATE_KEY_LEN] = value
            .try_into()
            .map_err(|_| Ed25519Error::InvalidLength(value.len(), PRIVATE_KEY_LEN))?;
        Ok(Self::from_bytes(&bytes))
    }
}

/// Public Ed25519 key used for identity verification.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct PublicKey(VerifyingKey);

impl PublicKey {
    /// Create a public key from its raw bytes representation.
    ///
    /// Fails when the bytes do not describe a valid curve point.
    pub fn from_bytes(bytes: &[u8; PUBLIC_KEY_LEN]) -> Result<Self, Ed25519Error> {
        let key = VerifyingKey::from_bytes(bytes).map_err(|_| Ed25519Error::InvalidPublicKey)?;
        Ok(Self(key))
    }

    /// Bytes of the public key.
    pub fn as_bytes(&self) -> &[u8; PUBLIC_KEY_LEN] {
        self.0.as_bytes()
    }

    /// Verify the signature of any data with this public key.
    pub fn verify(&self, bytes: &[u8], signature: &Signature) -> bool {
        self.0.verify(bytes, &signature.0).is_ok()
    }

    /// Convert the public key to a hex string.
    pub fn to_hex(&self) -> String {
        hex::encode(self.as_bytes())
    }
}

impl StdHash for PublicKey {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.as_bytes().hash(state)
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("PublicKey").field(&self.to_hex()).finish()
    }
}

impl TryFrom<&[u8]> for PublicKey {
    type Error = Ed25519Error;

    fn try_from(value: &[u8]) -> Result<Self, Self::Error> {
        let bytes: [u8; PUBLIC_KEY_LEN] = value
            .try_into()
            .map_err(|_| Ed25519Error::InvalidLength(value.len(), PUBLIC_KEY_LEN))?;
        Self::from_bytes(&bytes)
    }
}

impl Serialize for PublicKey {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serialize_base64(self.as_bytes(), serializer)
    }
}

impl<'de> Deserialize<'de> for PublicKey {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let bytes = deserialize_base64(deserializer)?;
        bytes
            .as_slice()
            .try_into()
            .map_err(|err: Ed25519Error| serde::de::Error::custom(err.to_string()))
    }
}

/// Ed25519 signature.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Signature(ed25519_dalek::Signature);

impl Signature {
    /// Create a signature from its raw bytes representation.
    pub fn from_bytes(bytes: &[u8; SIGNATURE_LEN]) -> Self {
        Self(ed25519_dalek::Signature::from_bytes(bytes))
    }

    /// Bytes of the signature.
    pub fn to_bytes(&self) -> [u8; SIGNATURE_LEN] {
        self.0.to_bytes()
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Signature")
            .field(&hex::encode(self.to_bytes()))
            .finish()
    }
}

impl TryFrom<&[u8]> for Signature {
    type Error = Ed25519Error;

    fn try_from(value: &[u8]) -> Result<Self, Self::Error> {
        let bytes: [u8; SIGNATURE_LEN] = value
            .try_into()
            .map_err(|_| Ed25519Error::InvalidLength(value.len(), SIGNATURE_LEN))?;
        Ok(Self::from_bytes(&bytes))
    }
}

impl Serialize for Signature {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serialize_base64(&self.to_bytes(), serializer)
    }
}

impl<'de> Deserialize<'de> for Signature {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let bytes = deserialize_base64(deserializer)?;
        bytes
            .as_slice()
            .try_into()
            .map_err(|err: Ed25519Error| serde::de::Error::custom(err.to_string()))
    }
}

#[derive(Debug, Error)]
pub enum Ed25519Error {
    #[error("invalid key or signature length {0} bytes, expected {1} bytes")]
    InvalidLength(usize, usize),

    #[error("bytes do not describe a valid ed25519 public key")]
    InvalidPublicKey,
}

#[cfg(test)]
mod tests {
    use super::{PrivateKey, PublicKey, Signature};

    #[test]
    fn sign_and_verify() {
        let private_key = PrivateKey::new();
        let public_key = private_key.public_key();

        let signature = private_key.sign(b"Hello, Panda!");
        assert!(public_key.verify(b"Hello, Panda!", &signature));

        // Invalid data.
        assert!(!public_key.verify(b"Hello, Moon!", &signature));

        // Invalid public key.
        let other_key = PrivateKey::new().public_key();
        assert!(!other_key.verify(b"Hello, Panda!", &signature));
    }

    #[test]
    fn from_bytes() {
        let private_key = PrivateKey::new();
        let private_key_again = PrivateKey::from_bytes(private_key.as_bytes());
        assert_eq!(private_key.public_key(), private_key_again.public_key());

        let public_key = private_key.public_key();
        let public_key_again = PublicKey::try_from(&public_key.as_bytes()[..]).unwrap();
        assert_eq!(public_key, public_key_again);

        assert!(PublicKey::try_from(&[1, 2, 3][..]).is_err());
        assert!(Signature::try_from(&[0; 12][..]).is_err());
    }

    #[test]
    fn serde_json() {
        let private_key = PrivateKey::new();
        let signature = private_key.sign(b"seed");

        let json = serde_json::to_string(&signature).unwrap();
        let signature_again: Signature = serde_json::from_str(&json).unwrap();
        assert_eq!(signature, signature_again);

        let json = serde_json::to_string(&private_key.public_key()).unwrap();
        let public_key: PublicKey = serde_json::from_str(&json).unwrap();
        assert_eq!(public_key, private_key.public_key());
    }
}
