// SPDX-License-Identifier: MIT OR Apache-2.0

//! `dimp-core` provides the cryptographic identity model of a decentralized instant messaging
//! protocol: self-certifying identities, signed identity documents and the registry which turns
//! them into user and group views.
//!
//! Nobody is trusted to hand out identities. Every participant generates an Ed25519 key pair and
//! derives a [`Meta`] from it: the public key, optionally bound to a human-readable seed by a
//! fingerprint (the seed signed with the private key). An [`Address`] is a digest of that key
//! material and an [`ID`] (`name@address/terminal`) can therefore be checked against its Meta by
//! anyone, without asking a directory.
//!
//! ## Documents
//!
//! Profile information travels in signed [`Document`]s. A [`Visa`] is the document of a user and
//! carries the X25519 key others use to send them messages, distinct from the Meta's signing key.
//! A [`Bulletin`] is the document of a group and carries its display name and founder.
//!
//! ## Users and groups
//!
//! [`User`] and [`Group`] are thin views around an ID. They own no state: every query is answered
//! by a data source the application passes in (see [`entity`]). The [`Barrack`] caches these
//! views, creates them at most once per ID and only after their prerequisites (a Visa key for
//! users, Meta and members for groups) can be resolved.
//!
//! ## Crypto primitives
//!
//! The [`crypto`] module contains everything the message pipeline needs: Ed25519 signatures,
//! HPKE to wrap symmetric keys for a recipient's X25519 key, XChaCha20-Poly1305 for content and
//! algorithm-tagged [`SymmetricKey`] records.
pub mod cbor;
pub mod crypto;
pub mod document;
pub mod entity;
pub mod identity;
pub mod serde;
#[cfg(any(test, feature = "test_utils"))]
pub mod test_utils;
mod time;

pub use crypto::{PrivateKey, PublicKey, Rng, Signature, SymmetricKey};
pub use document::{AnyDocument, Bulletin, Document, DocumentStatus, DocumentType, Visa};
pub use entity::{
    Archivist, Barrack, EntityDataSource, EvictionPolicy, Group, GroupDataSource, User,
    UserDataSource,
};
pub use identity::{Address, EntityType, ID, IdFactory, Meta, MetaType};
pub use time::{Timestamp, now};
