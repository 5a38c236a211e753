//! Client-side mirror of the entities held by the flow authority.
//!
//! An [`EntityStore`] holds one entity type keyed by id. Incoming data is applied
//! through the revision rule: an entity only replaces the held one when its revision is
//! strictly newer (or the caller overrides the check because it authored the change).
//!
//! Two short-lived caches absorb races between local edits and out-of-band polling:
//! ids added recently survive an authoritative list that does not mention them yet, and
//! ids removed recently are not resurrected by a stale list that still does. Both caches
//! are swept by [`EntityStore::expire_caches`].

use crate::types::{ComponentStatus, ConnectionEntity, EntityId, EntityKind, NodeEntity, Revision};
use indexmap::IndexMap;
use std::collections::HashSet;

/// An entity that can be held by an [`EntityStore`].
pub trait StoredEntity: Clone {
    /// Unique id.
    fn id(&self) -> &str;
    /// Kind of entity.
    fn kind(&self) -> EntityKind;
    /// Current revision.
    fn revision(&self) -> &Revision;
    /// Mutable access to the revision, for stamping server responses.
    fn revision_mut(&mut self) -> &mut Revision;
    /// Stacking order.
    fn z_index(&self) -> i64;
    /// Replaces the live status without touching structural state.
    fn set_status(&mut self, status: ComponentStatus);
}

impl StoredEntity for ConnectionEntity {
    fn id(&self) -> &str {
        &self.id
    }

    fn kind(&self) -> EntityKind {
        EntityKind::Connection
    }

    fn revision(&self) -> &Revision {
        &self.revision
    }

    fn revision_mut(&mut self) -> &mut Revision {
        &mut self.revision
    }

    fn z_index(&self) -> i64 {
        self.z_index
    }

    fn set_status(&mut self, status: ComponentStatus) {
        self.status = status;
    }
}

impl StoredEntity for NodeEntity {
    fn id(&self) -> &str {
        &self.id
    }

    fn kind(&self) -> EntityKind {
        self.kind
    }

    fn revision(&self) -> &Revision {
        &self.revision
    }

    fn revision_mut(&mut self) -> &mut Revision {
        &mut self.revision
    }

    fn z_index(&self) -> i64 {
        self.z_index
    }

    fn set_status(&mut self, status: ComponentStatus) {
        self.status = status;
    }
}

/// Ids stamped with the time (ms) they were last touched.
#[derive(Debug, Clone, Default)]
pub struct TimedCache {
    entries: IndexMap<EntityId, u64>,
}

impl TimedCache {
    /// Records `id` at `now`, replacing any earlier stamp.
    pub fn stamp(&mut self, id: &str, now: u64) {
        self.entries.insert(id.to_string(), now);
    }

    /// Whether `id` is currently cached.
    pub fn contains(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    /// Drops every entry stamped strictly before `cutoff` and returns how many went.
    pub fn expire(&mut self, cutoff: u64) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, stamp| *stamp >= cutoff);
        before - self.entries.len()
    }

    /// Number of cached ids.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// What a `set` call was given.
#[derive(Debug, Clone)]
pub enum Incoming<T> {
    /// A single entity; nothing else is implied about the rest of the store
    One(T),
    /// The authoritative complete list for this entity type
    All(Vec<T>),
}

/// Options accepted by `set`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SetOptions {
    /// Newly entered entities should be selected
    pub select_all: bool,
    /// Geometry changes should be animated
    pub transition: bool,
    /// Apply regardless of revision ordering
    pub override_revision_check: bool,
}

impl SetOptions {
    /// Options used when applying the response to a mutation this client authored.
    pub fn authored() -> Self {
        Self {
            override_revision_check: true,
            ..Self::default()
        }
    }
}

/// The outcome of a reconciling operation.
///
/// `entered`, `applied` and `removed` are disjoint: an id is entered when it was not
/// held before, applied when a held entity was replaced, and removed when it left.
#[derive(Debug, Clone, PartialEq)]
pub struct Reconciliation<T> {
    /// Ids seen for the first time
    pub entered: Vec<EntityId>,
    /// Ids whose held entity was replaced
    pub applied: Vec<EntityId>,
    /// Entities that left the store
    pub removed: Vec<T>,
}

impl<T> Default for Reconciliation<T> {
    fn default() -> Self {
        Self {
            entered: Vec::new(),
            applied: Vec::new(),
            removed: Vec::new(),
        }
    }
}

impl<T> Reconciliation<T> {
    /// Whether nothing changed.
    pub fn is_empty(&self) -> bool {
        self.entered.is_empty() && self.applied.is_empty() && self.removed.is_empty()
    }
}

/// In-memory mirror of one entity type.
#[derive(Debug, Clone)]
pub struct EntityStore<T> {
    entities: IndexMap<EntityId, T>,
    added: TimedCache,
    removed: TimedCache,
}

impl<T> Default for EntityStore<T> {
    fn default() -> Self {
        Self {
            entities: IndexMap::new(),
            added: TimedCache::default(),
            removed: TimedCache::default(),
        }
    }
}

/// Store of connections.
pub type ConnectionStore = EntityStore<ConnectionEntity>;

/// Store of processors, ports, groups, funnels and labels.
pub type NodeStore = EntityStore<NodeEntity>;

impl<T: StoredEntity> EntityStore<T> {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of held entities.
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// The held entity with `id`.
    pub fn get(&self, id: &str) -> Option<&T> {
        self.entities.get(id)
    }

    /// Whether an entity with `id` is held.
    pub fn contains(&self, id: &str) -> bool {
        self.entities.contains_key(id)
    }

    /// All held entities, in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.entities.values()
    }

    /// All held ids, in insertion order.
    pub fn ids(&self) -> Vec<EntityId> {
        self.entities.keys().cloned().collect()
    }

    /// Held entities sorted by ascending z-index; equal z-indices keep insertion order.
    pub fn sorted(&self) -> Vec<&T> {
        let mut sorted: Vec<&T> = self.entities.values().collect();
        sorted.sort_by_key(|e| e.z_index());
        sorted
    }

    /// Whether `id` is shielded by the recently-added cache.
    pub fn recently_added(&self, id: &str) -> bool {
        self.added.contains(id)
    }

    /// Whether `id` is shielded by the recently-removed cache.
    pub fn recently_removed(&self, id: &str) -> bool {
        self.removed.contains(id)
    }

    /// Inserts entities unconditionally and stamps them as recently added.
    ///
    /// Used when the caller knows the entities are new, e.g. the response to a create.
    pub fn add(&mut self, entities: Vec<T>, now: u64) -> Reconciliation<T> {
        let mut result = Reconciliation::default();
        for entity in entities {
            let id = entity.id().to_string();
            self.added.stamp(&id, now);
            if self.entities.insert(id.clone(), entity).is_some() {
                result.applied.push(id);
            } else {
                result.entered.push(id);
            }
        }
        result
    }

    /// Reconciling upsert.
    ///
    /// Given [`Incoming::All`], held ids missing from the list are removed unless they were
    /// recently added. Each incoming entity is then applied when its revision is newer and
    /// its id was not recently removed, or unconditionally with `override_revision_check`.
    pub fn set(&mut self, incoming: Incoming<T>, override_revision_check: bool) -> Reconciliation<T> {
        let mut result = Reconciliation::default();

        let proposed = match incoming {
            Incoming::One(entity) => vec![entity],
            Incoming::All(entities) => {
                let present: HashSet<&str> = entities.iter().map(|e| e.id()).collect();
                let stale: Vec<EntityId> = self
                    .entities
                    .keys()
                    .filter(|id| !present.contains(id.as_str()) && !self.added.contains(id))
                    .cloned()
                    .collect();
                for id in stale {
                    if let Some(entity) = self.entities.shift_remove(&id) {
                        log::debug!("{id} is no longer present; removing");
                        result.removed.push(entity);
                    }
                }
                entities
            }
        };

        for entity in proposed {
            let id = entity.id().to_string();
            let accept = match self.entities.get(&id) {
                _ if override_revision_check => true,
                _ if self.removed.contains(&id) => false,
                Some(current) => entity.revision().is_newer_than(current.revision()),
                None => true,
            };

            if !accept {
                log::debug!("discarding stale revision {:?} for {id}", entity.revision().version);
                continue;
            }

            if self.entities.insert(id.clone(), entity).is_some() {
                result.applied.push(id);
            } else {
                result.entered.push(id);
            }
        }

        result
    }

    /// Deletes the given ids and stamps them as recently removed.
    pub fn remove<I, S>(&mut self, ids: I, now: u64) -> Vec<T>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut removed = Vec::new();
        for id in ids {
            let id = id.as_ref();
            self.removed.stamp(id, now);
            if let Some(entity) = self.entities.shift_remove(id) {
                log::debug!("removed {id}");
                removed.push(entity);
            }
        }
        removed
    }

    /// Deletes every held entity.
    pub fn remove_all(&mut self, now: u64) -> Vec<T> {
        let ids = self.ids();
        self.remove(ids, now)
    }

    /// Replaces the live status of `id`. Returns whether it was held.
    pub fn update_status(&mut self, id: &str, status: ComponentStatus) -> bool {
        match self.entities.get_mut(id) {
            Some(entity) => {
                entity.set_status(status);
                true
            }
            None => false,
        }
    }

    /// Sweeps cache entries stamped before `cutoff`.
    pub fn expire_caches(&mut self, cutoff: u64) {
        let added = self.added.expire(cutoff);
        let removed = self.removed.expire(cutoff);
        if added + removed > 0 {
            log::debug!("expired {added} added and {removed} removed cache entries");
        }
    }
}
