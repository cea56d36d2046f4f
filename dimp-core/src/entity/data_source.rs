// SPDX-License-Identifier: MIT OR Apache-2.0

//! Interfaces to the application's identity storage.
//!
//! Users and groups hold no state, every query ends up in one of these traits. Implementations
//! are shared between threads and use interior mutability where they need to write.
use crate::crypto::x25519;
use crate::crypto::{PrivateKey, PublicKey};
use crate::document::{AnyDocument, Bulletin, Visa, last_bulletin, last_visa};
use crate::identity::{ID, Meta};

/// Resolves metas and documents of any identity.
pub trait EntityDataSource {
    fn meta(&self, id: &ID) -> Option<Meta>;

    fn documents(&self, id: &ID) -> Vec<AnyDocument>;
}

/// Resolves contacts and key material of users.
pub trait UserDataSource: EntityDataSource {
    fn contacts(&self, user: &ID) -> Vec<ID>;

    /// Key for encrypting message keys to this user.
    ///
    /// Defaults to the key of the freshest visa which verifies against the user's meta.
    fn public_key_for_encryption(&self, user: &ID) -> Option<x25519::PublicKey> {
        verified_visa(self, user).and_then(|visa| visa.public_key())
    }

    /// Additional keys the user might have signed messages with, tried in order before the meta
    /// key. Used during key rotation.
    fn public_keys_for_verification(&self, _user: &ID) -> Vec<PublicKey> {
        Vec::new()
    }

    /// Candidate keys for decrypting message keys, tried in order.
    fn private_keys_for_decryption(&self, user: &ID) -> Vec<x25519::SecretKey>;

    fn private_key_for_signature(&self, user: &ID) -> Option<PrivateKey>;

    /// Users this process holds private keys for.
    fn local_users(&self) -> Vec<ID> {
        Vec::new()
    }
}

/// Resolves group membership.
pub trait GroupDataSource: EntityDataSource {
    /// Defaults to the member whose meta key generated the group meta, see [`find_founder`].
    fn founder(&self, group: &ID) -> Option<ID> {
        find_founder(self, group)
    }

    /// The owner of a simple group is its founder.
    fn owner(&self, group: &ID) -> Option<ID> {
        self.founder(group)
    }

    fn members(&self, group: &ID) -> Vec<ID>;

    /// Defaults to the assistants listed in the freshest verified bulletin.
    fn assistants(&self, group: &ID) -> Vec<ID> {
        verified_bulletin(self, group)
            .map(|bulletin| bulletin.assistants())
            .unwrap_or_default()
    }
}

/// Stores identity data received with a handshake.
pub trait Archivist {
    fn save_meta(&self, id: &ID, meta: &Meta) -> bool;

    fn save_document(&self, document: &AnyDocument) -> bool;
}

/// Finds the group member whose meta key matches the group meta.
///
/// The group meta is generated with the founder's private key, so the founder is the member for
/// which [`Meta::matches_key`] holds. Members whose meta does not belong to their ID are ignored.
/// If several members qualify the smallest ID wins, the result does not depend on the order of
/// the member list.
pub fn find_founder<D>(data_source: &D, group: &ID) -> Option<ID>
where
    D: GroupDataSource + ?Sized,
{
    let group_meta = data_source.meta(group)?;
    if !group_meta.is_valid() {
        return None;
    }
    data_source
        .members(group)
        .into_iter()
        .filter(|member| match data_source.meta(member) {
            Some(meta) => meta.matches_id(member) && group_meta.matches_key(meta.public_key()),
            None => false,
        })
        .min()
}

/// Keys to check a user's signatures with: the data source's candidates first, the meta key last.
///
/// The meta key is only included if the meta belongs to the ID.
pub fn verification_keys<D>(data_source: &D, user: &ID) -> Vec<PublicKey>
where
    D: UserDataSource + ?Sized,
{
    let mut keys = data_source.public_keys_for_verification(user);
    if let Some(meta) = data_source
        .meta(user)
        .filter(|meta| meta.matches_id(user) && !keys.contains(meta.public_key()))
    {
        keys.push(*meta.public_key());
    }
    keys
}

/// Freshest visa of a user, only if it is signed by the user's meta key.
pub fn verified_visa<D>(data_source: &D, user: &ID) -> Option<Visa>
where
    D: EntityDataSource + ?Sized,
{
    let meta = data_source.meta(user)?;
    if !meta.matches_id(user) {
        return None;
    }
    let documents = data_source.documents(user);
    let mut visa = last_visa(&documents)?.clone();
    visa.verify(meta.public_key()).then_some(visa)
}

/// Freshest bulletin of a group, only if it is signed by the group's meta key.
pub fn verified_bulletin<D>(data_source: &D, group: &ID) -> Option<Bulletin>
where
    D: EntityDataSource + ?Sized,
{
    let meta = data_source.meta(group)?;
    if !meta.matches_id(group) {
        return None;
    }
    let documents = data_source.documents(group);
    let mut bulletin = last_bulletin(&documents)?.clone();
    bulletin.verify(meta.public_key()).then_some(bulletin)
}
