// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::crypto::x25519;
use crate::crypto::{PrivateKey, PublicKey, Signature};
use crate::document::{AnyDocument, Visa};
use crate::entity::data_source::{verification_keys, verified_visa};
use crate::entity::{EntityDataSource, UserDataSource};
use crate::identity::{ID, Meta};

/// View on a user identity.
///
/// Only holds the ID, every query goes to the data source passed in by the caller.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct User {
    id: ID,
}

impl User {
    /// Creates the view if the user can receive messages: broadcast IDs always, everybody else
    /// only once an encryption key is known.
    pub fn try_create<D>(id: &ID, data_source: &D) -> Option<Self>
    where
        D: UserDataSource + ?Sized,
    {
        if !id.is_user() {
            return None;
        }
        if id.is_broadcast() || data_source.public_key_for_encryption(id).is_some() {
            return Some(Self { id: id.clone() });
        }
        None
    }

    pub fn id(&self) -> &ID {
        &self.id
    }

    pub fn meta<D>(&self, data_source: &D) -> Option<Meta>
    where
        D: EntityDataSource + ?Sized,
    {
        data_source.meta(&self.id)
    }

    pub fn documents<D>(&self, data_source: &D) -> Vec<AnyDocument>
    where
        D: EntityDataSource + ?Sized,
    {
        data_source.documents(&self.id)
    }

    /// Freshest visa signed by the user's meta key.
    pub fn visa<D>(&self, data_source: &D) -> Option<Visa>
    where
        D: EntityDataSource + ?Sized,
    {
        verified_visa(data_source, &self.id)
    }

    pub fn contacts<D>(&self, data_source: &D) -> Vec<ID>
    where
        D: UserDataSource + ?Sized,
    {
        data_source.contacts(&self.id)
    }

    pub fn encryption_key<D>(&self, data_source: &D) -> Option<x25519::PublicKey>
    where
        D: UserDataSource + ?Sized,
    {
        data_source.public_key_for_encryption(&self.id)
    }

    /// Keys to check the user's signatures with: the data source's candidates first, the meta key
    /// last.
    pub fn verification_keys<D>(&self, data_source: &D) -> Vec<PublicKey>
    where
        D: UserDataSource + ?Sized,
    {
        verification_keys(data_source, &self.id)
    }

    /// Returns `true` if any of the verification keys accepts the signature.
    pub fn verify<D>(&self, data: &[u8], signature: &Signature, data_source: &D) -> bool
    where
        D: UserDataSource + ?Sized,
    {
        self.verification_keys(data_source)
            .iter()
            .any(|key| key.verify(data, signature))
    }

    pub fn decryption_keys<D>(&self, data_source: &D) -> Vec<x25519::SecretKey>
    where
        D: UserDataSource + ?Sized,
    {
        data_source.private_keys_for_decryption(&self.id)
    }

    pub fn signing_key<D>(&self, data_source: &D) -> Option<PrivateKey>
    where
        D: UserDataSource + ?Sized,
    {
        data_source.private_key_for_signature(&self.id)
    }
}
