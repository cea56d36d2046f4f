// SPDX-License-Identifier: MIT OR Apache-2.0

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::identity::Meta;

/// Size of the key material digest inside an address.
pub const DIGEST_LEN: usize = 20;

/// Size of the checksum at the end of an address.
pub const CHECKSUM_LEN: usize = 4;

/// Size of a hashed address in bytes.
pub const ADDRESS_LEN: usize = 1 + DIGEST_LEN + CHECKSUM_LEN;

const ANYWHERE: &str = "anywhere";

const EVERYWHERE: &str = "everywhere";

/// Network type carried in the first byte of every address.
///
/// The lowest bit marks groups, the highest bit marks broadcast pseudo-identities.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityType(u8);

impl EntityType {
    pub const USER: EntityType = EntityType(0x00);
    pub const GROUP: EntityType = EntityType(0x01);
    pub const STATION: EntityType = EntityType(0x02);
    pub const BOT: EntityType = EntityType(0x04);
    pub const ANY: EntityType = EntityType(0x80);
    pub const EVERY: EntityType = EntityType(0x81);

    const GROUP_BIT: u8 = 0x01;
    const BROADCAST_BIT: u8 = 0x80;

    pub const fn from_u8(value: u8) -> Self {
        Self(value)
    }

    pub const fn as_u8(&self) -> u8 {
        self.0
    }

    pub fn is_user(&self) -> bool {
        self.0 & Self::GROUP_BIT == 0
    }

    pub fn is_group(&self) -> bool {
        self.0 & Self::GROUP_BIT == Self::GROUP_BIT
    }

    pub fn is_broadcast(&self) -> bool {
        self.0 & Self::BROADCAST_BIT == Self::BROADCAST_BIT
    }
}

/// Network address of an identity.
///
/// Either one of the two broadcast addresses (`anywhere`, `everywhere`) or the hex encoding of
/// `type ‖ digest ‖ checksum` where the digest is derived from the key material of a [`Meta`].
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Address {
    entity_type: EntityType,
    repr: String,
}

impl Address {
    /// Broadcast address matching any single recipient.
    pub fn anywhere() -> Self {
        Self {
            entity_type: EntityType::ANY,
            repr: ANYWHERE.to_string(),
        }
    }

    /// Broadcast address matching every recipient.
    pub fn everywhere() -> Self {
        Self {
            entity_type: EntityType::EVERY,
            repr: EVERYWHERE.to_string(),
        }
    }

    /// Derives the address of an identity from its meta.
    ///
    /// Seeded metas hash their fingerprint, all others hash the raw public key. The same inputs
    /// always yield the same address.
    pub fn generate(meta: &Meta, entity_type: EntityType) -> Self {
        let digest = match meta.fingerprint() {
            Some(fingerprint) if meta.meta_type().has_seed() => digest(&fingerprint.to_bytes()),
            _ => digest(meta.public_key().as_bytes()),
        };

        let mut bytes = Vec::with_capacity(ADDRESS_LEN);
        bytes.push(entity_type.as_u8());
        bytes.extend_from_slice(&digest);
        let checksum = checksum(&bytes);
        bytes.extend_from_slice(&checksum);

        Self {
            entity_type,
            repr: hex::encode(bytes),
        }
    }

    /// Parses an address string, returns `None` for malformed input.
    pub fn parse(value: &str) -> Option<Self> {
        value.parse().ok()
    }

    pub fn entity_type(&self) -> EntityType {
        self.entity_type
    }

    pub fn is_user(&self) -> bool {
        self.entity_type.is_user()
    }

    pub fn is_group(&self) -> bool {
        self.entity_type.is_group()
    }

    pub fn is_broadcast(&self) -> bool {
        self.entity_type.is_broadcast()
    }

    pub fn as_str(&self) -> &str {
        &self.repr
    }
}

fn digest(material: &[u8]) -> [u8; DIGEST_LEN] {
    let hash = blake3::hash(material);
    let mut out = [0u8; DIGEST_LEN];
    out.copy_from_slice(&hash.as_bytes()[..DIGEST_LEN]);
    out
}

fn checksum(bytes: &[u8]) -> [u8; CHECKSUM_LEN] {
    let hash = blake3::hash(bytes);
    let mut out = [0u8; CHECKSUM_LEN];
    out.copy_from_slice(&hash.as_bytes()[..CHECKSUM_LEN]);
    out
}

impl FromStr for Address {
    type Err = AddressError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            ANYWHERE => return Ok(Self::anywhere()),
            EVERYWHERE => return Ok(Self::everywhere()),
            _ => (),
        }

        let bytes = hex::decode(value)?;
        if bytes.len() != ADDRESS_LEN {
            return Err(AddressError::InvalidLength(bytes.len()));
        }

        let (head, tail) = bytes.split_at(1 + DIGEST_LEN);
        if checksum(head).as_slice() != tail {
            return Err(AddressError::InvalidChecksum);
        }

        Ok(Self {
            entity_type: EntityType::from_u8(bytes[0]),
            repr: hex::encode(&bytes),
        })
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.repr)
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Address").field(&self.repr).finish()
    }
}

impl Serialize for Address {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.repr)
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let value = String::deserialize(deserializer)?;
        value.parse().map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Error)]
pub enum AddressError {
    #[error("address is not valid hex: {0}")]
    Hex(#[from] hex::FromHexError),

    #[error("invalid address length {0} bytes, expected {ADDRESS_LEN} bytes")]
    InvalidLength(usize),

    #[error("address checksum does not match")]
    InvalidChecksum,
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use rstest::rstest;

    use crate::PrivateKey;
    use crate::identity::{Meta, MetaType};

    use super::{Address, AddressError, EntityType};

    #[rstest]
    #[case(EntityType::USER, true, false, false)]
    #[case(EntityType::GROUP, false, true, false)]
    #[case(EntityType::STATION, true, false, false)]
    #[case(EntityType::BOT, true, false, false)]
    #[case(EntityType::ANY, true, false, true)]
    #[case(EntityType::EVERY, false, true, true)]
    fn entity_type_bits(
        #[case] entity_type: EntityType,
        #[case] is_user: bool,
        #[case] is_group: bool,
        #[case] is_broadcast: bool,
    ) {
        assert_eq!(entity_type.is_user(), is_user);
        assert_eq!(entity_type.is_group(), is_group);
        assert_eq!(entity_type.is_broadcast(), is_broadcast);
    }

    #[test]
    fn deterministic_generation() {
        let private_key = PrivateKey::new();
        let meta = Meta::generate(MetaType::DEFAULT, &private_key, Some("alice")).unwrap();

        let address = Address::generate(&meta, EntityType::USER);
        let address_again = Address::generate(&meta, EntityType::USER);
        assert_eq!(address, address_again);
        assert!(address.is_user());

        // The network type is part of the address.
        let group_address = Address::generate(&meta, EntityType::GROUP);
        assert_ne!(address, group_address);
        assert!(group_address.is_group());
    }

    #[test]
    fn parse_hashed_address() {
        let private_key = PrivateKey::new();
        let meta = Meta::generate(MetaType::KEY_ONLY, &private_key, None).unwrap();
        let address = Address::generate(&meta, EntityType::BOT);

        let parsed: Address = address.as_str().parse().unwrap();
        assert_eq!(parsed, address);
        assert_eq!(parsed.entity_type(), EntityType::BOT);

        // Uppercase hex is accepted but rendered in canonical form.
        let parsed = Address::parse(&address.as_str().to_uppercase()).unwrap();
        assert_eq!(parsed, address);
    }

    #[test]
    fn parse_broadcast_address() {
        assert_eq!(Address::parse("anywhere").unwrap(), Address::anywhere());
        assert_eq!(Address::parse("everywhere").unwrap(), Address::everywhere());
        assert!(Address::anywhere().is_broadcast());
        assert!(Address::everywhere().is_group());
    }

    #[test]
    fn reject_malformed_addresses() {
        let private_key = PrivateKey::new();
        let meta = Meta::generate(MetaType::KEY_ONLY, &private_key, None).unwrap();
        let address = Address::generate(&meta, EntityType::USER);

        assert_matches!("zz".parse::<Address>(), Err(AddressError::Hex(_)));
        assert_matches!("abcd".parse::<Address>(), Err(AddressError::InvalidLength(2)));

        // Flip one byte of the digest.
        let mut bytes = hex::decode(address.as_str()).unwrap();
        bytes[5] ^= 0xff;
        assert_matches!(
            hex::encode(bytes).parse::<Address>(),
            Err(AddressError::InvalidChecksum)
        );

        assert!(Address::parse("nowhere").is_none());
    }
}
