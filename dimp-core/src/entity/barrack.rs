// SPDX-License-Identifier: MIT OR Apache-2.0

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::crypto::Rng;
use crate::entity::{Group, GroupDataSource, User, UserDataSource};
use crate::identity::{Address, ID, IdFactory};

/// How [`Barrack::reduce_memory`] picks the entries to drop.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "policy", rename_all = "snake_case")]
pub enum EvictionPolicy {
    /// Drop a random sample of the given share of entries.
    Random { percent: u8 },

    /// Drop the given share of entries which were not looked up for the longest time.
    LeastRecentlyUsed { percent: u8 },
}

impl EvictionPolicy {
    fn percent(&self) -> usize {
        let percent = match self {
            EvictionPolicy::Random { percent } => *percent,
            EvictionPolicy::LeastRecentlyUsed { percent } => *percent,
        };
        usize::from(percent.min(100))
    }
}

impl Default for EvictionPolicy {
    fn default() -> Self {
        EvictionPolicy::Random { percent: 50 }
    }
}

#[derive(Debug)]
struct Cached<T> {
    entity: T,
    last_access: AtomicU64,
}

impl<T> Cached<T> {
    fn new(entity: T, tick: u64) -> Self {
        Self {
            entity,
            last_access: AtomicU64::new(tick),
        }
    }

    fn touch(&self, tick: u64) {
        self.last_access.fetch_max(tick, Ordering::Relaxed);
    }
}

type Cache<T> = RwLock<HashMap<ID, Cached<T>>>;

/// Identity registry.
///
/// Caches [`User`] and [`Group`] views and interns [`ID`]s. A view is created at most once per ID,
/// even under concurrent lookups, and only after the data source can provide what it needs.
/// Failed creations are not remembered, a later lookup tries again.
#[derive(Debug)]
pub struct Barrack {
    policy: EvictionPolicy,
    ids: IdFactory,
    users: Cache<User>,
    groups: Cache<Group>,
    clock: AtomicU64,
    rng: Rng,
}

impl Barrack {
    pub fn new(policy: EvictionPolicy) -> Self {
        Self {
            policy,
            ids: IdFactory::new(),
            users: RwLock::new(HashMap::new()),
            groups: RwLock::new(HashMap::new()),
            clock: AtomicU64::new(0),
            rng: Rng::default(),
        }
    }

    pub fn policy(&self) -> EvictionPolicy {
        self.policy
    }

    pub fn ids(&self) -> &IdFactory {
        &self.ids
    }

    pub fn parse_id(&self, value: &str) -> Option<ID> {
        self.ids.parse_id(value)
    }

    pub fn create_id(&self, name: Option<&str>, address: Address, terminal: Option<&str>) -> ID {
        self.ids.create_id(name, address, terminal)
    }

    pub fn get_user<D>(&self, id: &ID, data_source: &D) -> Option<User>
    where
        D: UserDataSource + ?Sized,
    {
        self.get_user_with(id, |id| User::try_create(id, data_source))
    }

    /// Looks up a user, calling `create` on a miss.
    pub fn get_user_with<F>(&self, id: &ID, create: F) -> Option<User>
    where
        F: FnOnce(&ID) -> Option<User>,
    {
        self.get_or_create(&self.users, id, create)
    }

    pub fn get_group<D>(&self, id: &ID, data_source: &D) -> Option<Group>
    where
        D: GroupDataSource + ?Sized,
    {
        self.get_group_with(id, |id| Group::try_create(id, data_source))
    }

    /// Looks up a group, calling `create` on a miss.
    pub fn get_group_with<F>(&self, id: &ID, create: F) -> Option<Group>
    where
        F: FnOnce(&ID) -> Option<Group>,
    {
        self.get_or_create(&self.groups, id, create)
    }

    fn get_or_create<T, F>(&self, cache: &Cache<T>, id: &ID, create: F) -> Option<T>
    where
        T: Clone,
        F: FnOnce(&ID) -> Option<T>,
    {
        let tick = self.clock.fetch_add(1, Ordering::Relaxed);

        if let Some(cached) = cache.read().get(id) {
            trace!(%id, "identity cache hit");
            cached.touch(tick);
            return Some(cached.entity.clone());
        }

        // Check again under the write lock, another thread might have won the race.
        let mut cache = cache.write();
        if let Some(cached) = cache.get(id) {
            cached.touch(tick);
            return Some(cached.entity.clone());
        }

        let entity = create(id)?;
        cache.insert(id.clone(), Cached::new(entity.clone(), tick));
        Some(entity)
    }

    /// Picks the local user who should decrypt a message sent to `receiver`.
    ///
    /// Any local user for broadcast receivers, the first local member for groups and the exact
    /// match otherwise.
    pub fn select_local_user<D>(
        &self,
        receiver: &ID,
        local_users: &[ID],
        data_source: &D,
    ) -> Option<ID>
    where
        D: GroupDataSource + ?Sized,
    {
        if receiver.is_broadcast() {
            return local_users.first().cloned();
        }
        if receiver.is_group() {
            let group = self.get_group(receiver, data_source)?;
            let members = group.members(data_source);
            return local_users
                .iter()
                .find(|user| members.contains(user))
                .cloned();
        }
        local_users.iter().find(|user| *user == receiver).cloned()
    }

    pub fn user_count(&self) -> usize {
        self.users.read().len()
    }

    pub fn group_count(&self) -> usize {
        self.groups.read().len()
    }

    /// Drops a share of the cached users and groups according to the eviction policy, then
    /// prunes IDs nobody holds on to anymore.
    ///
    /// Returns the number of evicted users and groups.
    pub fn reduce_memory(&self) -> usize {
        let users = self.evict(&self.users);
        let groups = self.evict(&self.groups);
        let ids = self.ids.reduce_memory();
        debug!(users, groups, ids, policy = ?self.policy, "reduced identity caches");
        users + groups
    }

    fn evict<T>(&self, cache: &Cache<T>) -> usize {
        let mut cache = cache.write();
        let count = cache.len() * self.policy.percent() / 100;
        if count == 0 {
            return 0;
        }

        let victims: Vec<ID> = match self.policy {
            EvictionPolicy::Random { .. } => {
                let candidates: Vec<ID> = cache.keys().cloned().collect();
                self.rng.choose_multiple(&candidates, count)
            }
            EvictionPolicy::LeastRecentlyUsed { .. } => {
                let mut candidates: Vec<(u64, ID)> = cache
                    .iter()
                    .map(|(id, cached)| (cached.last_access.load(Ordering::Relaxed), id.clone()))
                    .collect();
                candidates.sort();
                candidates.into_iter().take(count).map(|(_, id)| id).collect()
            }
        };

        for id in &victims {
            cache.remove(id);
        }
        victims.len()
    }
}

impl Default for Barrack {
    fn default() -> Self {
        Self::new(EvictionPolicy::default())
    }
}
