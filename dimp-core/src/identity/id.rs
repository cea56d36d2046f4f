// SPDX-License-Identifier: MIT OR Apache-2.0

use std::collections::HashMap;
use std::fmt;
use std::hash::Hash as StdHash;
use std::str::FromStr;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::identity::{Address, AddressError, EntityType};

const ANYONE: &str = "anyone";

const EVERYONE: &str = "everyone";

/// Identifier of a user or group in the form `name@address/terminal`.
///
/// Name and terminal are optional. Two IDs are equal when their canonical string forms are equal,
/// clones are cheap and share the same allocation.
#[derive(Clone)]
pub struct ID(Arc<IdInner>);

struct IdInner {
    name: Option<String>,
    address: Address,
    terminal: Option<String>,
    repr: String,
}

impl ID {
    pub fn new(name: Option<&str>, address: Address, terminal: Option<&str>) -> Self {
        let name = name.filter(|name| !name.is_empty()).map(str::to_string);
        let terminal = terminal
            .filter(|terminal| !terminal.is_empty())
            .map(str::to_string);
        let repr = canonical(name.as_deref(), &address, terminal.as_deref());
        Self(Arc::new(IdInner {
            name,
            address,
            terminal,
            repr,
        }))
    }

    /// Broadcast pseudo-identity `anyone@anywhere`.
    pub fn anyone() -> Self {
        Self::new(Some(ANYONE), Address::anywhere(), None)
    }

    /// Broadcast pseudo-identity `everyone@everywhere`, used as a group.
    pub fn everyone() -> Self {
        Self::new(Some(EVERYONE), Address::everywhere(), None)
    }

    /// Parses a canonical ID string, returns `None` for malformed input.
    pub fn parse(value: &str) -> Option<Self> {
        value.parse().ok()
    }

    pub fn name(&self) -> Option<&str> {
        self.0.name.as_deref()
    }

    pub fn address(&self) -> &Address {
        &self.0.address
    }

    pub fn terminal(&self) -> Option<&str> {
        self.0.terminal.as_deref()
    }

    pub fn entity_type(&self) -> EntityType {
        self.0.address.entity_type()
    }

    pub fn is_user(&self) -> bool {
        self.0.address.is_user()
    }

    pub fn is_group(&self) -> bool {
        self.0.address.is_group()
    }

    pub fn is_broadcast(&self) -> bool {
        self.0.address.is_broadcast()
    }

    pub fn as_str(&self) -> &str {
        &self.0.repr
    }

    /// Returns `true` if both IDs point at the same allocation.
    pub fn ptr_eq(&self, other: &ID) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    fn is_shared(&self) -> bool {
        Arc::strong_count(&self.0) > 1
    }
}

fn canonical(name: Option<&str>, address: &Address, terminal: Option<&str>) -> String {
    let mut repr = match name {
        Some(name) => format!("{name}@{address}"),
        None => address.to_string(),
    };
    if let Some(terminal) = terminal {
        repr.push('/');
        repr.push_str(terminal);
    }
    repr
}

impl FromStr for ID {
    type Err = IdError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let (rest, terminal) = match value.split_once('/') {
            Some((_, "")) => return Err(IdError::EmptyTerminal),
            Some((rest, terminal)) => (rest, Some(terminal)),
            None => (value, None),
        };
        let (name, address) = match rest.split_once('@') {
            Some(("", _)) => return Err(IdError::EmptyName),
            Some((_, address)) if address.contains('@') => {
                return Err(IdError::InvalidFormat(value.to_string()));
            }
            Some((name, address)) => (Some(name), address),
            None => (None, rest),
        };
        let address: Address = address.parse()?;
        Ok(ID::new(name, address, terminal))
    }
}

impl PartialEq for ID {
    fn eq(&self, other: &Self) -> bool {
        self.as_str() == other.as_str()
    }
}

impl Eq for ID {}

impl StdHash for ID {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.as_str().hash(state)
    }
}

impl PartialOrd for ID {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ID {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.as_str().cmp(other.as_str())
    }
}

impl fmt::Display for ID {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl fmt::Debug for ID {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ID").field(&self.as_str()).finish()
    }
}

impl Serialize for ID {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ID {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let value = String::deserialize(deserializer)?;
        value.parse().map_err(serde::de::Error::custom)
    }
}

/// Interning cache for IDs.
///
/// As long as an ID handed out by the factory is alive somewhere, every lookup of the same
/// canonical string returns that same object. [`IdFactory::reduce_memory`] only drops entries
/// nobody but the factory holds on to.
#[derive(Default)]
pub struct IdFactory {
    ids: RwLock<HashMap<String, ID>>,
}

impl IdFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create_id(&self, name: Option<&str>, address: Address, terminal: Option<&str>) -> ID {
        let id = ID::new(name, address, terminal);
        if let Some(cached) = self.ids.read().get(id.as_str()) {
            return cached.clone();
        }
        self.intern(id)
    }

    pub fn parse_id(&self, value: &str) -> Option<ID> {
        if let Some(cached) = self.ids.read().get(value) {
            return Some(cached.clone());
        }
        let id = ID::parse(value)?;
        Some(self.intern(id))
    }

    fn intern(&self, id: ID) -> ID {
        let mut ids = self.ids.write();
        ids.entry(id.as_str().to_string()).or_insert(id).clone()
    }

    pub fn len(&self) -> usize {
        self.ids.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.read().is_empty()
    }

    /// Drops all cached IDs which are not referenced outside of the factory anymore.
    ///
    /// Returns the number of removed entries.
    pub fn reduce_memory(&self) -> usize {
        let mut ids = self.ids.write();
        let before = ids.len();
        ids.retain(|_, id| id.is_shared());
        let removed = before - ids.len();
        debug!(removed, remaining = ids.len(), "pruned id cache");
        removed
    }
}

impl fmt::Debug for IdFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdFactory")
            .field("len", &self.len())
            .finish()
    }
}

#[derive(Debug, Error)]
pub enum IdError {
    #[error("id has an empty name")]
    EmptyName,

    #[error("id has an empty terminal")]
    EmptyTerminal,

    #[error("invalid id format '{0}'")]
    InvalidFormat(String),

    #[error(transparent)]
    Address(#[from] AddressError),
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use assert_matches::assert_matches;

    use crate::PrivateKey;
    use crate::identity::{EntityType, Meta, MetaType};

    use super::{ID, IdError, IdFactory};

    fn user_id(name: &str) -> ID {
        let private_key = PrivateKey::new();
        let meta = Meta::generate(MetaType::DEFAULT, &private_key, Some(name)).unwrap();
        meta.generate_id(EntityType::USER, None)
    }

    #[test]
    fn canonical_string() {
        let id = user_id("alice");
        let with_terminal = ID::new(id.name(), id.address().clone(), Some("phone"));
        assert_eq!(
            with_terminal.as_str(),
            format!("alice@{}/phone", id.address())
        );

        let parsed: ID = with_terminal.as_str().parse().unwrap();
        assert_eq!(parsed, with_terminal);
        assert_eq!(parsed.terminal(), Some("phone"));
        assert_ne!(parsed, id);

        // Name is optional.
        let anonymous = ID::parse(id.address().as_str()).unwrap();
        assert_eq!(anonymous.name(), None);
        assert_eq!(anonymous.address(), id.address());
    }

    #[test]
    fn broadcast_ids() {
        assert_eq!(ID::anyone().as_str(), "anyone@anywhere");
        assert_eq!(ID::everyone().as_str(), "everyone@everywhere");
        assert!(ID::anyone().is_broadcast());
        assert!(ID::anyone().is_user());
        assert!(ID::everyone().is_group());
        assert_eq!(ID::parse("anyone@anywhere").unwrap(), ID::anyone());
    }

    #[test]
    fn malformed_ids() {
        assert!(ID::parse("").is_none());
        assert!(ID::parse("alice@").is_none());
        assert!(ID::parse("alice@123456").is_none());
        assert_matches!("@anywhere".parse::<ID>(), Err(IdError::EmptyName));
        assert_matches!("anyone@anywhere/".parse::<ID>(), Err(IdError::EmptyTerminal));
        assert_matches!(
            "a@b@anywhere".parse::<ID>(),
            Err(IdError::InvalidFormat(_))
        );
    }

    #[test]
    fn ordering_by_string() {
        let ids: BTreeSet<ID> = ["everyone@everywhere", "anyone@anywhere"]
            .iter()
            .map(|value| ID::parse(value).unwrap())
            .collect();
        let first = ids.iter().next().unwrap();
        assert_eq!(first, &ID::anyone());
    }

    #[test]
    fn factory_interns_ids() {
        let factory = IdFactory::new();
        let id = user_id("alice");

        let id_1 = factory.parse_id(id.as_str()).unwrap();
        let id_2 = factory.parse_id(id.as_str()).unwrap();
        let id_3 = factory.create_id(Some("alice"), id.address().clone(), None);
        assert!(id_1.ptr_eq(&id_2));
        assert!(id_1.ptr_eq(&id_3));
        assert_eq!(factory.len(), 1);

        assert!(factory.parse_id("not an id").is_none());
        assert_eq!(factory.len(), 1);
    }

    #[test]
    fn factory_keeps_live_ids() {
        let factory = IdFactory::new();
        let alice = factory.parse_id(user_id("alice").as_str()).unwrap();
        let bob = factory.parse_id(user_id("bob").as_str()).unwrap();
        let bob_str = bob.as_str().to_string();
        drop(bob);

        assert_eq!(factory.reduce_memory(), 1);
        assert_eq!(factory.len(), 1);

        // Alice is still referenced, the factory hands out the same object again.
        let alice_again = factory.parse_id(alice.as_str()).unwrap();
        assert!(alice.ptr_eq(&alice_again));

        let bob_again = factory.parse_id(&bob_str).unwrap();
        assert_eq!(bob_again.as_str(), bob_str);
    }
}
