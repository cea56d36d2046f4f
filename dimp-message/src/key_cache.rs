// SPDX-License-Identifier: MIT OR Apache-2.0

//! Cache of symmetric message keys, one per direction.
//!
//! Keys are not rotated per message. A sender reuses the key it last used for a receiver (or
//! group), so the receiver only needs the wrapped key once. Persistence is left to the
//! application through [`KeyStore`].
use std::collections::BTreeMap;

use dimp_core::cbor::{DecodeError, EncodeError, decode_cbor, encode_cbor};
use dimp_core::{ID, SymmetricKey};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, trace};

/// Result of asking the cache for a key to encrypt with.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum KeyLookup {
    /// Key was cached already, the receiver might know it.
    Reused(SymmetricKey),

    /// Key was generated for this message and cached.
    Generated(SymmetricKey),
}

impl KeyLookup {
    pub fn key(&self) -> &SymmetricKey {
        match self {
            KeyLookup::Reused(key) | KeyLookup::Generated(key) => key,
        }
    }

    pub fn into_key(self) -> SymmetricKey {
        match self {
            KeyLookup::Reused(key) | KeyLookup::Generated(key) => key,
        }
    }

    pub fn is_reused(&self) -> bool {
        matches!(self, KeyLookup::Reused(_))
    }
}

/// Access to symmetric keys per `(sender, receiver)` direction.
///
/// For group messages the receiver is the group ID.
pub trait CipherKeyDelegate {
    /// Returns the cached key for the direction. Broadcast receivers always get
    /// [`SymmetricKey::Plain`].
    fn cipher_key(&self, sender: &ID, receiver: &ID) -> Option<SymmetricKey>;

    /// Overwrites the key for the direction. Ignored for broadcast receivers.
    fn cache_cipher_key(&self, sender: &ID, receiver: &ID, key: SymmetricKey);

    /// Returns the cached key or generates and caches a new one.
    ///
    /// The default implementation is not atomic, two callers might both generate a key and one of
    /// them gets overwritten. Implementations shared between threads should override it.
    fn cipher_key_or_generate<F, E>(
        &self,
        sender: &ID,
        receiver: &ID,
        generate: F,
    ) -> Result<KeyLookup, E>
    where
        F: FnOnce() -> Result<SymmetricKey, E>,
    {
        if let Some(key) = self.cipher_key(sender, receiver) {
            return Ok(KeyLookup::Reused(key));
        }
        let key = generate()?;
        self.cache_cipher_key(sender, receiver, key.clone());
        Ok(KeyLookup::Generated(key))
    }
}

/// Persistence of the key table.
pub trait KeyStore {
    fn load_keys(&self) -> Option<CipherKeyTable>;

    /// Returns `false` if the table could not be written.
    fn save_keys(&self, table: &CipherKeyTable) -> bool;
}

/// Nested map of `sender -> receiver -> key`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CipherKeyTable(BTreeMap<ID, BTreeMap<ID, SymmetricKey>>);

impl CipherKeyTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, sender: &ID, receiver: &ID) -> Option<&SymmetricKey> {
        self.0.get(sender).and_then(|keys| keys.get(receiver))
    }

    /// Returns the key which was replaced, if any.
    pub fn insert(
        &mut self,
        sender: &ID,
        receiver: &ID,
        key: SymmetricKey,
    ) -> Option<SymmetricKey> {
        self.0
            .entry(sender.clone())
            .or_default()
            .insert(receiver.clone(), key)
    }

    /// Adds all keys of `other` which are not present yet.
    pub fn merge(&mut self, other: CipherKeyTable) -> usize {
        let mut added = 0;
        for (sender, keys) in other.0 {
            let entry = self.0.entry(sender).or_default();
            for (receiver, key) in keys {
                if !entry.contains_key(&receiver) {
                    entry.insert(receiver, key);
                    added += 1;
                }
            }
        }
        added
    }

    pub fn len(&self) -> usize {
        self.0.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, KeyCacheError> {
        Ok(encode_cbor(self)?)
    }

    pub fn try_from_bytes(bytes: &[u8]) -> Result<Self, KeyCacheError> {
        Ok(decode_cbor(bytes)?)
    }
}

#[derive(Debug, Default)]
struct KeyCacheState {
    table: CipherKeyTable,
    dirty: bool,
}

/// In-memory key table backed by a [`KeyStore`].
///
/// Writes only mark the table dirty, [`KeyCache::flush`] hands it to the store.
#[derive(Debug)]
pub struct KeyCache<S> {
    store: S,
    state: Mutex<KeyCacheState>,
}

impl<S> KeyCache<S>
where
    S: KeyStore,
{
    /// Creates the cache and loads the persisted keys.
    pub fn new(store: S) -> Self {
        let cache = Self {
            store,
            state: Mutex::new(KeyCacheState::default()),
        };
        cache.reload();
        cache
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Merges the persisted table into memory. Keys in memory win over persisted ones, they
    /// might not have been flushed yet.
    ///
    /// Returns the number of keys added.
    pub fn reload(&self) -> usize {
        let Some(table) = self.store.load_keys() else {
            return 0;
        };
        let added = self.state.lock().table.merge(table);
        debug!(added, "reloaded cipher keys");
        added
    }

    /// Writes the table to the store if it changed since the last flush.
    ///
    /// Returns `false` if there was nothing to write.
    pub fn flush(&self) -> Result<bool, KeyCacheError> {
        let mut state = self.state.lock();
        if !state.dirty {
            return Ok(false);
        }
        if !self.store.save_keys(&state.table) {
            return Err(KeyCacheError::SaveFailed);
        }
        state.dirty = false;
        debug!(keys = state.table.len(), "flushed cipher keys");
        Ok(true)
    }

    pub fn is_dirty(&self) -> bool {
        self.state.lock().dirty
    }

    pub fn len(&self) -> usize {
        self.state.lock().table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<S> CipherKeyDelegate for KeyCache<S>
where
    S: KeyStore,
{
    fn cipher_key(&self, sender: &ID, receiver: &ID) -> Option<SymmetricKey> {
        if receiver.is_broadcast() {
            return Some(SymmetricKey::Plain);
        }
        let key = self.state.lock().table.get(sender, receiver).cloned();
        if key.is_some() {
            trace!(%sender, %receiver, "cipher key cache hit");
        }
        key
    }

    fn cache_cipher_key(&self, sender: &ID, receiver: &ID, key: SymmetricKey) {
        if receiver.is_broadcast() {
            return;
        }
        let mut state = self.state.lock();
        state.table.insert(sender, receiver, key);
        state.dirty = true;
    }

    /// Check, generate and insert happen under one lock, concurrent callers for the same
    /// direction end up with the same key.
    fn cipher_key_or_generate<F, E>(
        &self,
        sender: &ID,
        receiver: &ID,
        generate: F,
    ) -> Result<KeyLookup, E>
    where
        F: FnOnce() -> Result<SymmetricKey, E>,
    {
        if receiver.is_broadcast() {
            return Ok(KeyLookup::Reused(SymmetricKey::Plain));
        }
        let mut state = self.state.lock();
        if let Some(key) = state.table.get(sender, receiver) {
            return Ok(KeyLookup::Reused(key.clone()));
        }
        let key = generate()?;
        state.table.insert(sender, receiver, key.clone());
        state.dirty = true;
        debug!(%sender, %receiver, "generated cipher key");
        Ok(KeyLookup::Generated(key))
    }
}

#[derive(Debug, Error)]
pub enum KeyCacheError {
    #[error("key store refused to save the cipher keys")]
    SaveFailed,

    #[error(transparent)]
    Encode(#[from] EncodeError),

    #[error(transparent)]
    Decode(#[from] DecodeError),
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;

    use assert_matches::assert_matches;
    use dimp_core::test_utils::Account;
    use dimp_core::{ID, Rng, SymmetricKey};

    use crate::test_utils::MemoryKeyStore;

    use super::{CipherKeyDelegate, CipherKeyTable, KeyCache, KeyCacheError, KeyLookup};

    #[test]
    fn broadcast_uses_plain_key() {
        let cache = KeyCache::new(MemoryKeyStore::default());
        let alice = Account::user("alice");
        let rng = Rng::from_seed([1; 32]);

        assert_eq!(
            cache.cipher_key(&alice.id, &ID::anyone()),
            Some(SymmetricKey::Plain)
        );
        cache.cache_cipher_key(
            &alice.id,
            &ID::anyone(),
            SymmetricKey::generate(&rng).unwrap(),
        );
        assert!(cache.is_empty());
        assert!(!cache.is_dirty());
        assert_eq!(
            cache.cipher_key(&alice.id, &ID::everyone()),
            Some(SymmetricKey::Plain)
        );
    }

    #[test]
    fn directions_are_separate() {
        let cache = KeyCache::new(MemoryKeyStore::default());
        let alice = Account::user("alice");
        let bob = Account::user("bob");
        let rng = Rng::from_seed([1; 32]);

        let key = SymmetricKey::generate(&rng).unwrap();
        cache.cache_cipher_key(&alice.id, &bob.id, key.clone());
        assert_eq!(cache.cipher_key(&alice.id, &bob.id), Some(key));
        assert_eq!(cache.cipher_key(&bob.id, &alice.id), None);

        // Later keys overwrite earlier ones.
        let key = SymmetricKey::generate(&rng).unwrap();
        cache.cache_cipher_key(&alice.id, &bob.id, key.clone());
        assert_eq!(cache.cipher_key(&alice.id, &bob.id), Some(key));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn flush_only_when_dirty() {
        let cache = KeyCache::new(MemoryKeyStore::default());
        let alice = Account::user("alice");
        let bob = Account::user("bob");
        let rng = Rng::from_seed([1; 32]);

        assert!(!cache.flush().unwrap());
        assert_eq!(cache.store().saves(), 0);

        cache.cache_cipher_key(&alice.id, &bob.id, SymmetricKey::generate(&rng).unwrap());
        assert!(cache.is_dirty());
        assert!(cache.flush().unwrap());
        assert!(!cache.flush().unwrap());
        assert_eq!(cache.store().saves(), 1);

        cache.store().set_read_only(true);
        cache.cache_cipher_key(&bob.id, &alice.id, SymmetricKey::generate(&rng).unwrap());
        assert_matches!(cache.flush(), Err(KeyCacheError::SaveFailed));
        assert!(cache.is_dirty());
    }

    #[test]
    fn reload_keeps_unsaved_keys() {
        let alice = Account::user("alice");
        let bob = Account::user("bob");
        let carol = Account::user("carol");
        let rng = Rng::from_seed([1; 32]);

        let persisted = SymmetricKey::generate(&rng).unwrap();
        let mut table = CipherKeyTable::new();
        table.insert(&alice.id, &bob.id, persisted.clone());
        table.insert(&alice.id, &carol.id, persisted.clone());
        let store = MemoryKeyStore::default();
        store.set(&table).unwrap();

        let cache = KeyCache::new(store);
        assert_eq!(cache.len(), 2);
        assert!(!cache.is_dirty());

        let fresh = SymmetricKey::generate(&rng).unwrap();
        cache.cache_cipher_key(&alice.id, &bob.id, fresh.clone());
        assert_eq!(cache.reload(), 0);
        assert_eq!(cache.cipher_key(&alice.id, &bob.id), Some(fresh));
        assert_eq!(cache.cipher_key(&alice.id, &carol.id), Some(persisted));
    }

    #[test]
    fn table_encoding() {
        let alice = Account::user("alice");
        let bob = Account::user("bob");
        let rng = Rng::from_seed([1; 32]);

        let mut table = CipherKeyTable::new();
        let key = SymmetricKey::generate(&rng).unwrap();
        assert!(table.insert(&alice.id, &bob.id, key).is_none());
        let bytes = table.to_bytes().unwrap();
        assert_eq!(CipherKeyTable::try_from_bytes(&bytes).unwrap(), table);
        assert_matches!(
            CipherKeyTable::try_from_bytes(&[0xff, 0x00]),
            Err(KeyCacheError::Decode(_))
        );
    }

    #[test]
    fn generate_once_per_direction() {
        let cache = Arc::new(KeyCache::new(MemoryKeyStore::default()));
        let generated = Arc::new(AtomicUsize::new(0));
        let alice = Account::user("alice");
        let bob = Account::user("bob");

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cache = cache.clone();
                let generated = generated.clone();
                let (alice, bob) = (alice.id.clone(), bob.id.clone());
                thread::spawn(move || {
                    cache
                        .cipher_key_or_generate(&alice, &bob, || {
                            generated.fetch_add(1, Ordering::SeqCst);
                            SymmetricKey::generate(&Rng::default())
                        })
                        .unwrap()
                        .into_key()
                })
            })
            .collect();

        let keys: Vec<SymmetricKey> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert_eq!(generated.load(Ordering::SeqCst), 1);
        assert!(keys.windows(2).all(|pair| pair[0] == pair[1]));

        let lookup = cache
            .cipher_key_or_generate(&alice.id, &bob.id, || SymmetricKey::generate(&Rng::default()))
            .unwrap();
        assert_matches!(lookup, KeyLookup::Reused(_));
    }
}
