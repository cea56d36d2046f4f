// SPDX-License-Identifier: MIT OR Apache-2.0

use std::sync::OnceLock;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::crypto::{PrivateKey, PublicKey, Signature};
use crate::identity::{Address, EntityType, ID};

/// Version of a [`Meta`], the lowest bit declares if the meta carries a seed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MetaType(u8);

impl MetaType {
    /// Public key bound to a seed (the ID name) through a fingerprint.
    pub const DEFAULT: MetaType = MetaType(0x01);

    /// Public key only, IDs derived from it carry no name.
    pub const KEY_ONLY: MetaType = MetaType(0x02);

    /// Same as the default kind, for identities with an additional non-seed meta version.
    pub const SEEDED_KEY: MetaType = MetaType(0x03);

    const SEED_BIT: u8 = 0x01;

    pub const fn from_u8(value: u8) -> Self {
        Self(value)
    }

    pub const fn as_u8(&self) -> u8 {
        self.0
    }

    pub fn has_seed(&self) -> bool {
        self.0 & Self::SEED_BIT == Self::SEED_BIT
    }
}

/// Self-certifying identity record.
///
/// A meta holds the public key of an identity and, for seeded meta types, a human-readable seed
/// together with its fingerprint: the seed signed by the matching private key. Addresses and IDs
/// are derived from it, which is why a meta received from the network is only trusted after
/// [`Meta::is_valid`] returned `true`.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(into = "MetaRecord", from = "MetaRecord")]
pub struct Meta {
    meta_type: MetaType,
    key: PublicKey,
    seed: Option<String>,
    fingerprint: Option<Signature>,

    /// Result of the first validity check.
    validity: OnceLock<bool>,
}

impl Meta {
    /// Creates a meta for a key pair we own.
    ///
    /// The fingerprint is computed once here, the resulting meta is known to be valid.
    pub fn generate(
        meta_type: MetaType,
        private_key: &PrivateKey,
        seed: Option<&str>,
    ) -> Result<Self, MetaError> {
        let (seed, fingerprint) = match (meta_type.has_seed(), seed) {
            (true, Some(seed)) if !seed.is_empty() => {
                let fingerprint = private_key.sign(seed.as_bytes());
                (Some(seed.to_string()), Some(fingerprint))
            }
            (true, _) => return Err(MetaError::MissingSeed(meta_type.as_u8())),
            (false, Some(_)) => return Err(MetaError::UnexpectedSeed(meta_type.as_u8())),
            (false, None) => (None, None),
        };

        Ok(Self {
            meta_type,
            key: private_key.public_key(),
            seed,
            fingerprint,
            validity: OnceLock::from(true),
        })
    }

    /// Assembles a meta from untrusted parts, for example received from the network.
    ///
    /// Nothing is checked here, validity is resolved on the first call to [`Meta::is_valid`].
    pub fn new(
        meta_type: MetaType,
        key: PublicKey,
        seed: Option<String>,
        fingerprint: Option<Signature>,
    ) -> Self {
        Self {
            meta_type,
            key,
            seed,
            fingerprint,
            validity: OnceLock::new(),
        }
    }

    pub fn meta_type(&self) -> MetaType {
        self.meta_type
    }

    pub fn public_key(&self) -> &PublicKey {
        &self.key
    }

    pub fn seed(&self) -> Option<&str> {
        self.seed.as_deref()
    }

    pub fn fingerprint(&self) -> Option<&Signature> {
        self.fingerprint.as_ref()
    }

    /// Returns `true` if seed and fingerprint are consistent with the meta type and the key.
    ///
    /// The result is computed once and memoized.
    pub fn is_valid(&self) -> bool {
        *self.validity.get_or_init(|| self.check())
    }

    fn check(&self) -> bool {
        match (self.meta_type.has_seed(), &self.seed, &self.fingerprint) {
            (true, Some(seed), Some(fingerprint)) => {
                !seed.is_empty() && self.key.verify(seed.as_bytes(), fingerprint)
            }
            (false, None, None) => true,
            _ => false,
        }
    }

    /// Returns `true` if the given key is this meta's key or was used to create its fingerprint.
    ///
    /// Group metas are generated with the founder's private key, this check is what ties a group
    /// to its founder.
    pub fn matches_key(&self, public_key: &PublicKey) -> bool {
        if !self.is_valid() {
            return false;
        }
        if &self.key == public_key {
            return true;
        }
        match (&self.seed, &self.fingerprint) {
            (Some(seed), Some(fingerprint)) => public_key.verify(seed.as_bytes(), fingerprint),
            _ => false,
        }
    }

    /// Returns `true` if the ID was derived from this meta.
    pub fn matches_id(&self, id: &ID) -> bool {
        if !self.is_valid() || id.is_broadcast() {
            return false;
        }
        if id.name() != self.seed() {
            return false;
        }
        &self.generate_address(id.entity_type()) == id.address()
    }

    pub fn generate_address(&self, entity_type: EntityType) -> Address {
        Address::generate(self, entity_type)
    }

    /// Derives the ID of this identity, named after the seed.
    pub fn generate_id(&self, entity_type: EntityType, terminal: Option<&str>) -> ID {
        ID::new(self.seed(), self.generate_address(entity_type), terminal)
    }
}

impl PartialEq for Meta {
    fn eq(&self, other: &Self) -> bool {
        self.meta_type == other.meta_type
            && self.key == other.key
            && self.seed == other.seed
            && self.fingerprint == other.fingerprint
    }
}

impl Eq for Meta {}

#[derive(Serialize, Deserialize)]
struct MetaRecord {
    #[serde(rename = "type")]
    meta_type: MetaType,
    key: PublicKey,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    seed: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    fingerprint: Option<Signature>,
}

impl From<Meta> for MetaRecord {
    fn from(meta: Meta) -> Self {
        Self {
            meta_type: meta.meta_type,
            key: meta.key,
            seed: meta.seed,
            fingerprint: meta.fingerprint,
        }
    }
}

impl From<MetaRecord> for Meta {
    fn from(record: MetaRecord) -> Self {
        Meta::new(record.meta_type, record.key, record.seed, record.fingerprint)
    }
}

#[derive(Debug, Error)]
pub enum MetaError {
    #[error("meta type {0} requires a non-empty seed")]
    MissingSeed(u8),

    #[error("meta type {0} does not take a seed")]
    UnexpectedSeed(u8),
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use crate::crypto::{PrivateKey, Signature};
    use crate::identity::{EntityType, ID};

    use super::{Meta, MetaError, MetaType};

    #[test]
    fn generated_meta_is_valid() {
        let private_key = PrivateKey::new();

        let meta = Meta::generate(MetaType::DEFAULT, &private_key, Some("alice")).unwrap();
        assert!(meta.is_valid());
        assert_eq!(meta.seed(), Some("alice"));

        let meta = Meta::generate(MetaType::KEY_ONLY, &private_key, None).unwrap();
        assert!(meta.is_valid());
        assert!(meta.fingerprint().is_none());

        assert_matches!(
            Meta::generate(MetaType::DEFAULT, &private_key, None),
            Err(MetaError::MissingSeed(1))
        );
        assert_matches!(
            Meta::generate(MetaType::KEY_ONLY, &private_key, Some("bob")),
            Err(MetaError::UnexpectedSeed(2))
        );
    }

    #[test]
    fn fingerprint_invariant() {
        let private_key = PrivateKey::new();
        let meta = Meta::generate(MetaType::DEFAULT, &private_key, Some("alice")).unwrap();
        let fingerprint = meta.fingerprint().unwrap().to_bytes();

        // Unmodified parts received from the network are valid.
        let received = Meta::new(
            MetaType::DEFAULT,
            private_key.public_key(),
            Some("alice".into()),
            Some(Signature::from_bytes(&fingerprint)),
        );
        assert!(received.is_valid());

        // Seed and fingerprint do not belong together.
        let wrong_seed = Meta::new(
            MetaType::DEFAULT,
            private_key.public_key(),
            Some("mallory".into()),
            Some(Signature::from_bytes(&fingerprint)),
        );
        assert!(!wrong_seed.is_valid());

        // One flipped byte in the fingerprint.
        let mut tampered = fingerprint;
        tampered[7] ^= 0x01;
        let tampered = Meta::new(
            MetaType::DEFAULT,
            private_key.public_key(),
            Some("alice".into()),
            Some(Signature::from_bytes(&tampered)),
        );
        assert!(!tampered.is_valid());

        // Seeded type without seed.
        let missing = Meta::new(MetaType::DEFAULT, private_key.public_key(), None, None);
        assert!(!missing.is_valid());

        // Key-only type carrying a seed.
        let unexpected = Meta::new(
            MetaType::KEY_ONLY,
            private_key.public_key(),
            Some("alice".into()),
            Some(Signature::from_bytes(&fingerprint)),
        );
        assert!(!unexpected.is_valid());
    }

    #[test]
    fn matches_id_and_key() {
        let private_key = PrivateKey::new();
        let meta = Meta::generate(MetaType::DEFAULT, &private_key, Some("alice")).unwrap();

        let id = meta.generate_id(EntityType::USER, Some("laptop"));
        assert_eq!(id.name(), Some("alice"));
        assert!(meta.matches_id(&id));
        assert!(meta.matches_key(&private_key.public_key()));

        let other_key = PrivateKey::new();
        let other_meta = Meta::generate(MetaType::DEFAULT, &other_key, Some("alice")).unwrap();
        assert!(!meta.matches_id(&other_meta.generate_id(EntityType::USER, None)));
        assert!(!meta.matches_key(&other_key.public_key()));

        // Name needs to equal the seed.
        let renamed = ID::new(Some("bob"), id.address().clone(), None);
        assert!(!meta.matches_id(&renamed));
    }

    #[test]
    fn group_meta_matches_founder_key() {
        let founder_key = PrivateKey::new();
        let founder_meta =
            Meta::generate(MetaType::DEFAULT, &founder_key, Some("founder")).unwrap();

        // A group meta is generated with the founder's private key.
        let group_meta = Meta::generate(MetaType::DEFAULT, &founder_key, Some("pandas")).unwrap();
        assert!(group_meta.matches_key(founder_meta.public_key()));
    }

    #[test]
    fn wire_format() {
        let private_key = PrivateKey::new();
        let meta = Meta::generate(MetaType::DEFAULT, &private_key, Some("alice")).unwrap();

        let json = serde_json::to_value(&meta).unwrap();
        assert_eq!(json["type"], 1);
        assert_eq!(json["seed"], "alice");
        assert!(json["key"].is_string());
        assert!(json["fingerprint"].is_string());

        let meta_again: Meta = serde_json::from_value(json).unwrap();
        assert_eq!(meta, meta_again);
        assert!(meta_again.is_valid());

        let meta = Meta::generate(MetaType::KEY_ONLY, &private_key, None).unwrap();
        let json = serde_json::to_value(&meta).unwrap();
        assert!(json.get("seed").is_none());
        assert!(json.get("fingerprint").is_none());
    }
}
