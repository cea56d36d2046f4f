// SPDX-License-Identifier: MIT OR Apache-2.0

//! Cryptographic primitives used by identities and the message pipeline.
//!
//! - [`ed25519`]: signing keys behind every [`Meta`](crate::Meta), used for fingerprints,
//!   documents and message signatures.
//! - [`x25519`]: encryption keys published in a [`Visa`](crate::Visa).
//! - [`hpke`]: wraps a symmetric key for the holder of an X25519 key.
//! - [`xchacha20`]: AEAD used for message content.
//! - [`symmetric`]: algorithm-tagged symmetric key records.
pub mod ed25519;
pub mod hpke;
mod rng;
mod secret;
pub mod symmetric;
pub mod x25519;
pub mod xchacha20;

pub use ed25519::{Ed25519Error, PrivateKey, PublicKey, Signature};
pub use rng::{Rng, RngError};
pub use secret::Secret;
pub use symmetric::{SymmetricAlgorithm, SymmetricError, SymmetricKey};
