// SPDX-License-Identifier: MIT OR Apache-2.0

//! `dimp-message` turns plaintext messages into encrypted, signed packets and back, for direct,
//! group and broadcast conversations between identities of [`dimp_core`].
//!
//! ## Pipeline
//!
//! A message goes through three forms. An [`InstantMessage`] carries [`Content`] in plain text.
//! [`Packer::encrypt`] turns it into a [`SecureMessage`] by encrypting the content with a
//! symmetric key and wrapping that key for the receiver, or for every member of a group.
//! [`Packer::sign`] adds the sender's signature over the encrypted data and produces the
//! [`ReliableMessage`] which goes over the wire. Receivers run [`Packer::verify`] and
//! [`Packer::decrypt`] to get back to the instant message.
//!
//! Group messages can be fanned out to the members with [`SecureMessage::split`], each part only
//! carries the key of its member. [`SecureMessage::trim`] does the same for a single member. The
//! signature covers the encrypted data only, all parts verify against it.
//!
//! ## Key reuse
//!
//! Symmetric keys are cached per direction (sender to receiver or group) in a [`KeyCache`] and
//! reused for following messages. A receiver who unwrapped a key once can read messages which do
//! not carry it anymore. This is not a ratchet: there is no forward secrecy between messages
//! sharing a key.
//!
//! ## Broadcasts
//!
//! Messages to `anyone@anywhere` or `everyone@everywhere` are not encrypted. Their data is the
//! serialized content as readable JSON and they carry no keys. They are still signed.
pub mod config;
pub mod content;
pub mod crypto;
mod envelope;
pub mod key_cache;
mod message;
mod packer;
#[cfg(any(test, feature = "test_utils"))]
pub mod test_utils;

pub use config::Config;
pub use content::{Content, ContentError, ContentRegistry};
pub use crypto::{CryptoDelegate, CryptoError, DefaultCrypto};
pub use envelope::Envelope;
pub use key_cache::{
    CipherKeyDelegate, CipherKeyTable, KeyCache, KeyCacheError, KeyLookup, KeyStore,
};
pub use message::{InstantMessage, MessageError, ReliableMessage, SecureMessage};
pub use packer::{Packer, PackerError};
