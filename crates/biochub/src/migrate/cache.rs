//! Natural-key to surrogate-id caches for reference entities
//!
//! Lookups go cache → target store → insert. The cache is only written after
//! the store has confirmed the row, so a failed insert never leaves a stale
//! id behind.

use crate::db::DbResult;
use crate::models::{Id, NaturalKey, NewEntity};
use crate::store::TargetStore;
use biochub_common::types::EntityKind;
use std::collections::HashMap;
use tracing::debug;

/// How a key was resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Already in the cache
    Cached,
    /// Found in the target store by natural key
    Existing,
    /// Inserted by this call
    Created,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolved {
    pub id: Id,
    pub outcome: Outcome,
}

impl Resolved {
    pub fn created(&self) -> bool {
        self.outcome == Outcome::Created
    }
}

/// Cache for a single entity kind.
#[derive(Debug, Clone)]
pub struct DedupCache {
    kind: EntityKind,
    entries: HashMap<NaturalKey, Id>,
}

impl DedupCache {
    pub fn new(kind: EntityKind) -> Self {
        Self {
            kind,
            entries: HashMap::new(),
        }
    }

    pub fn kind(&self) -> EntityKind {
        self.kind
    }

    pub fn preload(&mut self, rows: impl IntoIterator<Item = (NaturalKey, Id)>) {
        self.entries.extend(rows);
    }

    pub fn get(&self, key: &NaturalKey) -> Option<Id> {
        self.entries.get(key).copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Resolve `key`, inserting the entity produced by `build` when neither
    /// the cache nor the store knows it. A `Duplicate` from the insert means
    /// another writer created the row between the check and the insert; it is
    /// returned as is.
    pub async fn resolve_or_create<S, F>(
        &mut self,
        store: &S,
        key: NaturalKey,
        build: F,
    ) -> DbResult<Resolved>
    where
        S: TargetStore + ?Sized,
        F: FnOnce() -> NewEntity,
    {
        if let Some(id) = self.get(&key) {
            return Ok(Resolved {
                id,
                outcome: Outcome::Cached,
            });
        }

        if let Some(id) = store.find_entity(&key).await? {
            debug!(kind = %self.kind, key = %key, id, "Found existing entity");
            self.entries.insert(key, id);
            return Ok(Resolved {
                id,
                outcome: Outcome::Existing,
            });
        }

        let entity = build();
        debug_assert_eq!(entity.key(), key);
        let id = store.insert_entity(&entity).await?;
        debug!(kind = %self.kind, key = %key, id, "Created entity");
        self.entries.insert(key, id);

        Ok(Resolved {
            id,
            outcome: Outcome::Created,
        })
    }
}

/// Caches for every reference kind, shared by both hubs for a whole run.
#[derive(Debug, Clone)]
pub struct ReferenceCaches {
    caches: HashMap<EntityKind, DedupCache>,
    /// Every known species spelling, pointing at its taxonomy-keyed row
    species_aliases: HashMap<String, Id>,
}

impl Default for ReferenceCaches {
    fn default() -> Self {
        Self::new()
    }
}

impl ReferenceCaches {
    pub fn new() -> Self {
        Self {
            caches: EntityKind::EXTRACTION_ORDER
                .into_iter()
                .map(|kind| (kind, DedupCache::new(kind)))
                .collect(),
            species_aliases: HashMap::new(),
        }
    }

    /// Fill every cache from rows already in the target.
    pub async fn load<S: TargetStore + ?Sized>(store: &S) -> DbResult<Self> {
        let mut caches = Self::new();

        for kind in EntityKind::EXTRACTION_ORDER {
            let rows = store.load_keys(kind).await?;
            debug!(kind = %kind, rows = rows.len(), "Preloaded cache");
            caches.cache_mut(kind).preload(rows);
        }

        for species in store.load_species().await? {
            caches.add_species_alias(&species.scientific_name, species.id);
        }

        Ok(caches)
    }

    fn cache_mut(&mut self, kind: EntityKind) -> &mut DedupCache {
        self.caches
            .entry(kind)
            .or_insert_with(|| DedupCache::new(kind))
    }

    pub fn get(&self, key: &NaturalKey) -> Option<Id> {
        self.caches.get(&key.kind()).and_then(|cache| cache.get(key))
    }

    pub fn len(&self, kind: EntityKind) -> usize {
        self.caches.get(&kind).map_or(0, DedupCache::len)
    }

    pub async fn resolve_or_create<S, F>(
        &mut self,
        store: &S,
        key: NaturalKey,
        build: F,
    ) -> DbResult<Resolved>
    where
        S: TargetStore + ?Sized,
        F: FnOnce() -> NewEntity,
    {
        self.cache_mut(key.kind())
            .resolve_or_create(store, key, build)
            .await
    }

    /// Remember `name` as a spelling of species `id`. The first mapping for a
    /// spelling wins.
    pub fn add_species_alias(&mut self, name: &str, id: Id) {
        let name = name.trim();
        if !name.is_empty() {
            self.species_aliases.entry(name.to_string()).or_insert(id);
        }
    }

    /// Species by taxonomy id, falling back to any known spelling of its name.
    pub fn resolve_species(&self, taxonomy_id: Option<i64>, name: Option<&str>) -> Option<Id> {
        taxonomy_id
            .and_then(|taxonomy_id| self.get(&NaturalKey::Species { taxonomy_id }))
            .or_else(|| {
                name.map(str::trim)
                    .and_then(|name| self.species_aliases.get(name).copied())
            })
    }

    pub fn tag_id(&self, tag: &str) -> Option<Id> {
        self.get(&NaturalKey::Tag(tag.to_string()))
    }

    pub fn provider_id(&self, name: &str) -> Option<Id> {
        self.get(&NaturalKey::DataProvider(name.to_string()))
    }

    pub fn user_id(&self, email: &str) -> Option<Id> {
        self.get(&NaturalKey::User(email.to_string()))
    }

    pub fn recipe_id(&self, name: &str) -> Option<Id> {
        self.get(&NaturalKey::Recipe(name.to_string()))
    }

    pub fn genome_id(&self, species_id: Id, build: &str) -> Option<Id> {
        self.get(&NaturalKey::Genome {
            species_id,
            build: build.to_string(),
        })
    }
}
