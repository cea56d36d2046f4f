// SPDX-License-Identifier: MIT OR Apache-2.0

//! Cryptographic operations the packer relies on.
//!
//! The packer never touches key material directly, it goes through a [`CryptoDelegate`]. This
//! allows applications to keep signing keys in hardware or to swap algorithms.
use dimp_core::cbor::{DecodeError, EncodeError};
use dimp_core::crypto::hpke::{HpkeCiphertext, HpkeError, hpke_open, hpke_seal};
use dimp_core::crypto::x25519;
use dimp_core::crypto::{SymmetricError, SymmetricKey};
use dimp_core::{PrivateKey, PublicKey, Rng, Signature};
use thiserror::Error;

/// Context string binding wrapped keys to this protocol.
const KEY_WRAP_INFO: &[u8] = b"dimp-message-key";

pub trait CryptoDelegate {
    fn sign(&self, data: &[u8], signing_key: &PrivateKey) -> Signature;

    fn verify(&self, data: &[u8], signature: &Signature, public_key: &PublicKey) -> bool;

    /// Wraps a symmetric key for the holder of the X25519 secret key.
    fn encrypt_key(
        &self,
        key: &SymmetricKey,
        recipient: &x25519::PublicKey,
    ) -> Result<Vec<u8>, CryptoError>;

    fn decrypt_key(
        &self,
        wrapped: &[u8],
        secret_key: &x25519::SecretKey,
    ) -> Result<SymmetricKey, CryptoError>;

    /// Encrypts serialized content. [`SymmetricKey::Plain`] passes it through.
    fn encrypt_content(
        &self,
        key: &SymmetricKey,
        plaintext: &[u8],
    ) -> Result<Vec<u8>, CryptoError>;

    fn decrypt_content(
        &self,
        key: &SymmetricKey,
        ciphertext: &[u8],
    ) -> Result<Vec<u8>, CryptoError>;

    fn generate_key(&self) -> Result<SymmetricKey, CryptoError>;
}

/// Ed25519 signatures, HPKE key wrapping and XChaCha20-Poly1305 content encryption.
#[derive(Debug, Default)]
pub struct DefaultCrypto {
    rng: Rng,
}

impl DefaultCrypto {
    pub fn new(rng: Rng) -> Self {
        Self { rng }
    }
}

impl CryptoDelegate for DefaultCrypto {
    fn sign(&self, data: &[u8], signing_key: &PrivateKey) -> Signature {
        signing_key.sign(data)
    }

    fn verify(&self, data: &[u8], signature: &Signature, public_key: &PublicKey) -> bool {
        public_key.verify(data, signature)
    }

    fn encrypt_key(
        &self,
        key: &SymmetricKey,
        recipient: &x25519::PublicKey,
    ) -> Result<Vec<u8>, CryptoError> {
        let plaintext = key.to_bytes()?;
        let ciphertext = hpke_seal(recipient, Some(KEY_WRAP_INFO), None, &plaintext)?;
        Ok(ciphertext.to_bytes()?)
    }

    fn decrypt_key(
        &self,
        wrapped: &[u8],
        secret_key: &x25519::SecretKey,
    ) -> Result<SymmetricKey, CryptoError> {
        let ciphertext = HpkeCiphertext::try_from_bytes(wrapped)?;
        let plaintext = hpke_open(&ciphertext, secret_key, Some(KEY_WRAP_INFO), None)?;
        Ok(SymmetricKey::try_from_bytes(&plaintext)?)
    }

    fn encrypt_content(
        &self,
        key: &SymmetricKey,
        plaintext: &[u8],
    ) -> Result<Vec<u8>, CryptoError> {
        Ok(key.encrypt(plaintext, &self.rng)?)
    }

    fn decrypt_content(
        &self,
        key: &SymmetricKey,
        ciphertext: &[u8],
    ) -> Result<Vec<u8>, CryptoError> {
        Ok(key.decrypt(ciphertext)?)
    }

    fn generate_key(&self) -> Result<SymmetricKey, CryptoError> {
        Ok(SymmetricKey::generate(&self.rng)?)
    }
}

#[derive(Debug, Error)]
pub enum CryptoError {
    #[error(transparent)]
    Hpke(#[from] HpkeError),

    #[error(transparent)]
    Symmetric(#[from] SymmetricError),

    #[error(transparent)]
    Encode(#[from] EncodeError),

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error("none of the {0} decryption keys could unwrap the message key")]
    NoMatchingKey(usize),
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use dimp_core::crypto::x25519::SecretKey;
    use dimp_core::{PrivateKey, Rng};

    use super::{CryptoDelegate, CryptoError, DefaultCrypto};

    #[test]
    fn wrap_and_unwrap_key() {
        let rng = Rng::from_seed([1; 32]);
        let crypto = DefaultCrypto::new(Rng::from_seed([2; 32]));

        let bob = SecretKey::from_rng(&rng).unwrap();
        let mallory = SecretKey::from_rng(&rng).unwrap();

        let key = crypto.generate_key().unwrap();
        let wrapped = crypto.encrypt_key(&key, &bob.public_key()).unwrap();
        assert_eq!(crypto.decrypt_key(&wrapped, &bob).unwrap(), key);
        assert_matches!(
            crypto.decrypt_key(&wrapped, &mallory),
            Err(CryptoError::Hpke(_))
        );
        assert_matches!(
            crypto.decrypt_key(&[1, 2, 3], &bob),
            Err(CryptoError::Decode(_))
        );
    }

    #[test]
    fn content_encryption() {
        let crypto = DefaultCrypto::default();
        let key = crypto.generate_key().unwrap();
        let other_key = crypto.generate_key().unwrap();

        let ciphertext = crypto.encrypt_content(&key, b"Hello, Panda!").unwrap();
        assert_ne!(ciphertext, b"Hello, Panda!");
        assert_eq!(
            crypto.decrypt_content(&key, &ciphertext).unwrap(),
            b"Hello, Panda!"
        );
        assert_matches!(
            crypto.decrypt_content(&other_key, &ciphertext),
            Err(CryptoError::Symmetric(_))
        );
    }

    #[test]
    fn signatures() {
        let crypto = DefaultCrypto::default();
        let signing_key = PrivateKey::new();
        let signature = crypto.sign(b"data", &signing_key);
        assert!(crypto.verify(b"data", &signature, &signing_key.public_key()));
        assert!(!crypto.verify(b"other", &signature, &signing_key.public_key()));
        assert!(!crypto.verify(b"data", &signature, &PrivateKey::new().public_key()));
    }
}
