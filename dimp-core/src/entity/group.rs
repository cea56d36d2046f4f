// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::document::{AnyDocument, Bulletin};
use crate::entity::data_source::verified_bulletin;
use crate::entity::{EntityDataSource, GroupDataSource};
use crate::identity::{ID, Meta};

/// View on a group identity.
///
/// Like [`User`](crate::User) it only holds the ID and asks the data source for everything else.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Group {
    id: ID,
}

impl Group {
    /// Creates the view once the group's meta and at least one member are known. Broadcast groups
    /// need neither.
    pub fn try_create<D>(id: &ID, data_source: &D) -> Option<Self>
    where
        D: GroupDataSource + ?Sized,
    {
        if !id.is_group() {
            return None;
        }
        if id.is_broadcast() {
            return Some(Self { id: id.clone() });
        }
        let meta = data_source.meta(id)?;
        if !meta.matches_id(id) || data_source.members(id).is_empty() {
            return None;
        }
        Some(Self { id: id.clone() })
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

    /// Freshest bulletin signed by the group meta key.
    pub fn bulletin<D>(&self, data_source: &D) -> Option<Bulletin>
    where
        D: EntityDataSource + ?Sized,
    {
        verified_bulletin(data_source, &self.id)
    }

    /// Display name from the bulletin.
    pub fn name<D>(&self, data_source: &D) -> Option<String>
    where
        D: EntityDataSource + ?Sized,
    {
        self.bulletin(data_source)
            .and_then(|bulletin| bulletin.name().map(str::to_string))
    }

    pub fn founder<D>(&self, data_source: &D) -> Option<ID>
    where
        D: GroupDataSource + ?Sized,
    {
        data_source.founder(&self.id)
    }

    pub fn owner<D>(&self, data_source: &D) -> Option<ID>
    where
        D: GroupDataSource + ?Sized,
    {
        data_source.owner(&self.id)
    }

    /// Members of the group, the owner always comes first.
    pub fn members<D>(&self, data_source: &D) -> Vec<ID>
    where
        D: GroupDataSource + ?Sized,
    {
        let mut members = data_source.members(&self.id);
        if let Some(owner) = data_source.owner(&self.id) {
            members.retain(|member| member != &owner);
            members.insert(0, owner);
        }
        members
    }

    pub fn assistants<D>(&self, data_source: &D) -> Vec<ID>
    where
        D: GroupDataSource + ?Sized,
    {
        data_source.assistants(&self.id)
    }

    pub fn is_member<D>(&self, id: &ID, data_source: &D) -> bool
    where
        D: GroupDataSource + ?Sized,
    {
        self.members(data_source).contains(id)
    }
}
