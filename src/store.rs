//! Bidirectional name/id cache for users and groups
//!
//! Both namespaces sit behind a single `RwLock`, so a bulk replace is
//! observed either completely or not at all. Every bulk replace or mode
//! change bumps an epoch; lookups that read a local file without the lock
//! only insert their result if the epoch is unchanged.

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::principal::{Kind, Principal};

/// Bidirectional index: fwd[name] and rev[id] stay in sync
#[derive(Debug, Default)]
pub(crate) struct BiMap {
    fwd: HashMap<String, i32>,
    rev: HashMap<i32, String>,
}

impl BiMap {
    #[inline]
    fn id(&self, name: &str) -> Option<i32> {
        self.fwd.get(name).copied()
    }

    #[inline]
    fn name(&self, id: i32) -> Option<&str> {
        self.rev.get(&id).map(String::as_str)
    }

    /// Insert a pair, first evicting whatever either side pointed at before
    fn put(&mut self, name: &str, id: i32) {
        if let Some(old_id) = self.fwd.remove(name) {
            if old_id != id {
                tracing::debug!(principal = name, old_id, id, "evicting stale id");
            }
            self.rev.remove(&old_id);
        }
        if let Some(old_name) = self.rev.remove(&id) {
            if old_name != name {
                tracing::debug!(id, old_name = %old_name, principal = name, "evicting stale name");
            }
            self.fwd.remove(&old_name);
        }
        self.fwd.insert(name.to_string(), id);
        self.rev.insert(id, name.to_string());
    }

    fn len(&self) -> usize {
        self.fwd.len()
    }
}

#[derive(Debug)]
struct Tables {
    users: BiMap,
    groups: BiMap,
    local: bool,
    epoch: u64,
}

impl Tables {
    #[inline]
    fn map(&self, kind: Kind) -> &BiMap {
        match kind {
            Kind::User => &self.users,
            Kind::Group => &self.groups,
        }
    }

    #[inline]
    fn map_mut(&mut self, kind: Kind) -> &mut BiMap {
        match kind {
            Kind::User => &mut self.users,
            Kind::Group => &mut self.groups,
        }
    }
}

/// Name/id cache with its resolution mode.
///
/// `local` is true while the local account database is authoritative;
/// otherwise every unknown name is generated.
#[derive(Debug)]
pub struct IdentityStore {
    tables: RwLock<Tables>,
}

impl IdentityStore {
    pub fn new(local: bool) -> Self {
        Self {
            tables: RwLock::new(Tables {
                users: BiMap::default(),
                groups: BiMap::default(),
                local,
                epoch: 0,
            }),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, Tables> {
        self.tables.read().unwrap_or_else(|p| p.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Tables> {
        self.tables.write().unwrap_or_else(|p| p.into_inner())
    }

    /// Cached id for a name
    pub fn get_id(&self, kind: Kind, name: &str) -> Option<i32> {
        self.read().map(kind).id(name)
    }

    /// Cached name for an id
    pub fn get_name(&self, kind: Kind, id: i32) -> Option<String> {
        self.read().map(kind).name(id).map(str::to_string)
    }

    /// Insert a pair, replacing any stale reverse entries
    pub fn put(&self, kind: Kind, name: &str, id: i32) {
        self.write().map_mut(kind).put(name, id);
    }

    /// Counter bumped by every bulk replace and mode change
    pub fn epoch(&self) -> u64 {
        self.read().epoch
    }

    /// Cache `name -> id` if the name is still unknown and no refresh ran
    /// since `epoch`.
    ///
    /// Returns the id cached for `name` afterwards, or `None` when the
    /// caller's result is stale and the lookup has to start over.
    pub fn put_id_if_current(&self, kind: Kind, name: &str, id: i32, epoch: u64) -> Option<i32> {
        let mut t = self.write();
        if let Some(existing) = t.map(kind).id(name) {
            return Some(existing);
        }
        if t.epoch != epoch {
            return None;
        }
        t.map_mut(kind).put(name, id);
        Some(id)
    }

    /// Reverse counterpart of [`put_id_if_current`](Self::put_id_if_current)
    pub fn put_name_if_current(&self, kind: Kind, id: i32, name: &str, epoch: u64) -> Option<String> {
        let mut t = self.write();
        if let Some(existing) = t.map(kind).name(id) {
            return Some(existing.to_string());
        }
        if t.epoch != epoch {
            return None;
        }
        t.map_mut(kind).put(name, id);
        Some(name.to_string())
    }

    /// Apply a snapshot for one kind and set the mode flag.
    ///
    /// Names absent from `entries` keep their cached ids.
    pub fn bulk_replace<'a, I>(&self, kind: Kind, entries: I, is_local: bool)
    where
        I: IntoIterator<Item = (&'a str, i32)>,
    {
        let mut t = self.write();
        let map = t.map_mut(kind);
        for (name, id) in entries {
            map.put(name, id);
        }
        t.local = is_local;
        t.epoch += 1;
    }

    /// Apply user and group snapshots in one step
    pub fn replace_all<'a, U, G>(&self, users: U, groups: G, is_local: bool)
    where
        U: IntoIterator<Item = (&'a str, i32)>,
        G: IntoIterator<Item = (&'a str, i32)>,
    {
        let mut t = self.write();
        for (name, id) in users {
            t.users.put(name, id);
        }
        for (name, id) in groups {
            t.groups.put(name, id);
        }
        t.local = is_local;
        t.epoch += 1;
    }

    pub fn is_local(&self) -> bool {
        self.read().local
    }

    pub fn set_local(&self, local: bool) {
        let mut t = self.write();
        t.local = local;
        t.epoch += 1;
    }

    /// Number of cached names of a kind
    pub fn len(&self, kind: Kind) -> usize {
        self.read().map(kind).len()
    }

    /// All cached principals of a kind, sorted by id
    pub fn principals(&self, kind: Kind) -> Vec<Principal> {
        let t = self.read();
        let mut r: Vec<Principal> = t
            .map(kind)
            .fwd
            .iter()
            .map(|(name, &id)| Principal::new(kind, name.as_str(), id))
            .collect();
        r.sort_by_key(|p| p.id);
        r
    }
}
