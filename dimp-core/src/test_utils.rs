// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory identities and data sources for tests.
use std::collections::HashMap;

use parking_lot::RwLock;

use crate::crypto::x25519::{self, SecretKey};
use crate::crypto::{PrivateKey, Rng};
use crate::document::{AnyDocument, Bulletin, Visa};
use crate::entity::{Archivist, EntityDataSource, GroupDataSource, UserDataSource};
use crate::identity::{EntityType, ID, Meta, MetaType};

#[cfg(feature = "test_utils")]
pub fn setup_logging() {
    if std::env::var("RUST_LOG").is_ok() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .try_init();
    }
}

/// Key material and meta of a test identity.
#[derive(Clone, Debug)]
pub struct Account {
    pub id: ID,
    pub meta: Meta,
    pub signing_key: PrivateKey,
    pub decryption_key: SecretKey,
    founder: Option<ID>,
}

impl Account {
    /// User with a seeded meta, named after the seed.
    pub fn user(seed: &str) -> Self {
        let signing_key = PrivateKey::new();
        let meta = Meta::generate(MetaType::DEFAULT, &signing_key, Some(seed)).unwrap();
        Self {
            id: meta.generate_id(EntityType::USER, None),
            meta,
            signing_key,
            decryption_key: SecretKey::from_rng(&Rng::default()).unwrap(),
            founder: None,
        }
    }

    /// Group whose meta is generated with the founder's private key.
    pub fn group(seed: &str, founder: &Account) -> Self {
        let signing_key = founder.signing_key.clone();
        let meta = Meta::generate(MetaType::DEFAULT, &signing_key, Some(seed)).unwrap();
        Self {
            id: meta.generate_id(EntityType::GROUP, None),
            meta,
            signing_key,
            decryption_key: SecretKey::from_rng(&Rng::default()).unwrap(),
            founder: Some(founder.id.clone()),
        }
    }

    pub fn encryption_key(&self) -> x25519::PublicKey {
        self.decryption_key.public_key()
    }

    /// Visa carrying the encryption key, signed with the account's key.
    pub fn visa(&self) -> Visa {
        self.visa_for(&self.id)
    }

    /// Visa for any user ID signed with this account's key, used to forge documents.
    pub fn visa_for(&self, id: &ID) -> Visa {
        let mut visa = Visa::new(id.clone()).unwrap();
        visa.set_public_key(&self.encryption_key());
        visa.sign(&self.signing_key).unwrap();
        visa
    }

    pub fn bulletin(&self, name: &str) -> Bulletin {
        let mut bulletin = Bulletin::new(self.id.clone()).unwrap();
        bulletin.set_name(name);
        if let Some(founder) = &self.founder {
            bulletin.set_founder(founder);
        }
        bulletin.sign(&self.signing_key).unwrap();
        bulletin
    }
}

#[derive(Clone, Debug)]
struct LocalKeys {
    signing_key: PrivateKey,
    decryption_keys: Vec<SecretKey>,
}

/// Data source keeping everything in memory.
#[derive(Debug, Default)]
pub struct MemoryFacebook {
    metas: RwLock<HashMap<ID, Meta>>,
    documents: RwLock<HashMap<ID, Vec<AnyDocument>>>,
    members: RwLock<HashMap<ID, Vec<ID>>>,
    contacts: RwLock<HashMap<ID, Vec<ID>>>,
    keys: RwLock<HashMap<ID, LocalKeys>>,
    local_users: RwLock<Vec<ID>>,
}

impl MemoryFacebook {
    pub fn add_meta(&self, id: &ID, meta: &Meta) {
        self.metas.write().insert(id.clone(), meta.clone());
    }

    pub fn add_document(&self, document: AnyDocument) {
        let id = document.document().identifier().clone();
        self.documents.write().entry(id).or_default().push(document);
    }

    pub fn remove_documents(&self, id: &ID) {
        self.documents.write().remove(id);
    }

    /// Publishes meta and visa (users) or meta only (groups) of an account.
    pub fn add_account(&self, account: &Account) {
        self.add_meta(&account.id, &account.meta);
        if account.id.is_user() {
            self.add_document(account.visa().into());
        }
    }

    /// Publishes an account and registers its private keys.
    pub fn add_local_user(&self, account: &Account) {
        self.add_account(account);
        self.keys.write().insert(
            account.id.clone(),
            LocalKeys {
                signing_key: account.signing_key.clone(),
                decryption_keys: vec![account.decryption_key.clone()],
            },
        );
        self.local_users.write().push(account.id.clone());
    }

    /// Adds an older decryption key the user still accepts messages for.
    pub fn add_decryption_key(&self, id: &ID, key: SecretKey) {
        if let Some(keys) = self.keys.write().get_mut(id) {
            keys.decryption_keys.push(key);
        }
    }

    pub fn set_members(&self, group: &ID, members: Vec<ID>) {
        self.members.write().insert(group.clone(), members);
    }

    pub fn add_contact(&self, user: &ID, contact: &ID) {
        self.contacts
            .write()
            .entry(user.clone())
            .or_default()
            .push(contact.clone());
    }
}

impl EntityDataSource for MemoryFacebook {
    fn meta(&self, id: &ID) -> Option<Meta> {
        self.metas.read().get(id).cloned()
    }

    fn documents(&self, id: &ID) -> Vec<AnyDocument> {
        self.documents.read().get(id).cloned().unwrap_or_default()
    }
}

impl UserDataSource for MemoryFacebook {
    fn contacts(&self, user: &ID) -> Vec<ID> {
        self.contacts.read().get(user).cloned().unwrap_or_default()
    }

    fn private_keys_for_decryption(&self, user: &ID) -> Vec<SecretKey> {
        self.keys
            .read()
            .get(user)
            .map(|keys| keys.decryption_keys.clone())
            .unwrap_or_default()
    }

    fn private_key_for_signature(&self, user: &ID) -> Option<PrivateKey> {
        self.keys
            .read()
            .get(user)
            .map(|keys| keys.signing_key.clone())
    }

    fn local_users(&self) -> Vec<ID> {
        self.local_users.read().clone()
    }
}

impl GroupDataSource for MemoryFacebook {
    fn members(&self, group: &ID) -> Vec<ID> {
        self.members.read().get(group).cloned().unwrap_or_default()
    }
}

impl Archivist for MemoryFacebook {
    fn save_meta(&self, id: &ID, meta: &Meta) -> bool {
        if !meta.matches_id(id) {
            return false;
        }
        self.add_meta(id, meta);
        true
    }

    fn save_document(&self, document: &AnyDocument) -> bool {
        self.add_document(document.clone());
        true
    }
}
