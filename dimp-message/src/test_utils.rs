// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test doubles for the message pipeline.
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use dimp_core::{ID, SymmetricKey};
use parking_lot::Mutex;

use crate::key_cache::{CipherKeyDelegate, CipherKeyTable, KeyCacheError, KeyLookup, KeyStore};

/// Key store keeping the CBOR encoded table in memory.
#[derive(Debug, Default)]
pub struct MemoryKeyStore {
    bytes: Mutex<Option<Vec<u8>>>,
    saves: AtomicUsize,
    read_only: AtomicBool,
}

impl MemoryKeyStore {
    /// Replaces the persisted table.
    pub fn set(&self, table: &CipherKeyTable) -> Result<(), KeyCacheError> {
        *self.bytes.lock() = Some(table.to_bytes()?);
        Ok(())
    }

    /// Number of successful saves.
    pub fn saves(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    /// Makes every following save fail.
    pub fn set_read_only(&self, read_only: bool) {
        self.read_only.store(read_only, Ordering::SeqCst);
    }
}

impl KeyStore for MemoryKeyStore {
    fn load_keys(&self) -> Option<CipherKeyTable> {
        let bytes = self.bytes.lock();
        CipherKeyTable::try_from_bytes(bytes.as_deref()?).ok()
    }

    fn save_keys(&self, table: &CipherKeyTable) -> bool {
        if self.read_only.load(Ordering::SeqCst) || self.set(table).is_err() {
            return false;
        }
        self.saves.fetch_add(1, Ordering::SeqCst);
        true
    }
}

/// Wraps a key cache and counts how often keys were generated and cached.
#[derive(Debug)]
pub struct CountingKeyCache<K> {
    inner: K,
    generated: AtomicUsize,
    cached: AtomicUsize,
}

impl<K> CountingKeyCache<K> {
    pub fn new(inner: K) -> Self {
        Self {
            inner,
            generated: AtomicUsize::new(0),
            cached: AtomicUsize::new(0),
        }
    }

    pub fn generated(&self) -> usize {
        self.generated.load(Ordering::SeqCst)
    }

    pub fn cached(&self) -> usize {
        self.cached.load(Ordering::SeqCst)
    }
}

impl<K> CipherKeyDelegate for CountingKeyCache<K>
where
    K: CipherKeyDelegate,
{
    fn cipher_key(&self, sender: &ID, receiver: &ID) -> Option<SymmetricKey> {
        self.inner.cipher_key(sender, receiver)
    }

    fn cache_cipher_key(&self, sender: &ID, receiver: &ID, key: SymmetricKey) {
        self.cached.fetch_add(1, Ordering::SeqCst);
        self.inner.cache_cipher_key(sender, receiver, key);
    }

    fn cipher_key_or_generate<F, E>(
        &self,
        sender: &ID,
        receiver: &ID,
        generate: F,
    ) -> Result<KeyLookup, E>
    where
        F: FnOnce() -> Result<SymmetricKey, E>,
    {
        self.inner.cipher_key_or_generate(sender, receiver, || {
            self.generated.fetch_add(1, Ordering::SeqCst);
            generate()
        })
    }
}
