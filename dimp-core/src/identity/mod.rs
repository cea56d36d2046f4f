// SPDX-License-Identifier: MIT OR Apache-2.0

//! Self-certifying identities.
//!
//! A [`Meta`] is generated from an Ed25519 key pair, an [`Address`] is derived from the Meta and
//! an [`ID`] names an address. Anyone holding the Meta can check that an ID belongs to it, see
//! [`Meta::matches_id`].
//!
//! ```
//! use dimp_core::{EntityType, Meta, MetaType, PrivateKey};
//!
//! let private_key = PrivateKey::new();
//! let meta = Meta::generate(MetaType::DEFAULT, &private_key, Some("alice")).unwrap();
//! let id = meta.generate_id(EntityType::USER, None);
//!
//! assert!(meta.is_valid());
//! assert!(meta.matches_id(&id));
//! assert_eq!(id.name(), Some("alice"));
//! ```
mod address;
mod id;
mod meta;

pub use address::{Address, AddressError, EntityType};
pub use id::{ID, IdError, IdFactory};
pub use meta::{Meta, MetaError, MetaType};
