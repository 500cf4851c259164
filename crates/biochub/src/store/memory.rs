//! In-process target store used for dry runs and tests

use super::TargetStore;
use crate::db::seed::{
    BIOC_RELEASES, HUBS, STATS_TABLES, STATUSES, SYSTEM_USER_EMAIL, SYSTEM_USER_NAME,
    SYSTEM_USER_ROLE,
};
use crate::db::{DbError, DbResult};
use crate::models::{
    Id, LookupRow, NaturalKey, NewEntity, NewResource, NewResourceFile, NewSourceFile, NewUser,
    ResourceBiocLink, ResourceTagLink, SpeciesRow, TableCount,
};
use async_trait::async_trait;
use biochub_common::types::EntityKind;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use tokio::sync::Mutex;

/// Full contents of a [`MemoryStore`]. Comparable, so two runs can be
/// checked for identical results.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemoryState {
    pub hubs: Vec<LookupRow>,
    pub statuses: Vec<LookupRow>,
    pub bioc_releases: Vec<LookupRow>,
    pub organizations: u64,
    pub entities: BTreeMap<NaturalKey, (Id, NewEntity)>,
    pub resources: BTreeMap<Id, NewResource>,
    pub resource_tags: BTreeSet<ResourceTagLink>,
    pub resource_bioc_versions: BTreeSet<ResourceBiocLink>,
    pub resource_files: Vec<NewResourceFile>,
    pub source_files: Vec<NewSourceFile>,
    next_ids: BTreeMap<EntityKind, Id>,
    // uniqueness indexes mirroring the target's unique constraints
    resource_keys: HashSet<(Id, String, i32)>,
    resource_file_keys: HashSet<(Id, String)>,
    source_file_keys: HashSet<(Id, String)>,
}

impl MemoryState {
    pub fn count(&self, kind: EntityKind) -> usize {
        self.entities.keys().filter(|k| k.kind() == kind).count()
    }

    /// Entities of one kind, ordered by natural key.
    pub fn entities_of(&self, kind: EntityKind) -> Vec<&NewEntity> {
        self.entities
            .iter()
            .filter(|(k, _)| k.kind() == kind)
            .map(|(_, (_, entity))| entity)
            .collect()
    }

    fn allocate(&mut self, kind: EntityKind) -> Id {
        let next = self.next_ids.entry(kind).or_insert(1);
        let id = *next;
        *next += 1;
        id
    }
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    /// Empty store with no reference rows at all.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store holding the same reference rows `init-db` seeds.
    pub fn seeded() -> Self {
        let mut state = MemoryState {
            organizations: 1,
            ..MemoryState::default()
        };

        state.hubs = HUBS
            .iter()
            .zip(1..)
            .map(|(hub, id)| LookupRow {
                id,
                name: hub.code().to_string(),
            })
            .collect();
        state.statuses = STATUSES
            .iter()
            .map(|s| LookupRow {
                id: s.id,
                name: s.status.to_string(),
            })
            .collect();
        state.bioc_releases = BIOC_RELEASES
            .iter()
            .zip(1..)
            .map(|(r, id)| LookupRow {
                id,
                name: r.version.to_string(),
            })
            .collect();

        let system_user = NewEntity::User(NewUser {
            email: SYSTEM_USER_EMAIL.to_string(),
            full_name: Some(SYSTEM_USER_NAME.to_string()),
            role: SYSTEM_USER_ROLE.to_string(),
        });
        let id = state.allocate(EntityKind::User);
        state.entities.insert(system_user.key(), (id, system_user));

        Self {
            state: Mutex::new(state),
        }
    }

    /// Drop a lookup row, for exercising misconfigured targets.
    pub async fn remove_status(&self, name: &str) {
        self.state.lock().await.statuses.retain(|s| s.name != name);
    }

    pub async fn state(&self) -> MemoryState {
        self.state.lock().await.clone()
    }
}

#[async_trait]
impl TargetStore for MemoryStore {
    async fn load_hubs(&self) -> DbResult<Vec<LookupRow>> {
        Ok(self.state.lock().await.hubs.clone())
    }

    async fn load_statuses(&self) -> DbResult<Vec<LookupRow>> {
        Ok(self.state.lock().await.statuses.clone())
    }

    async fn load_bioc_releases(&self) -> DbResult<Vec<LookupRow>> {
        Ok(self.state.lock().await.bioc_releases.clone())
    }

    async fn load_species(&self) -> DbResult<Vec<SpeciesRow>> {
        let state = self.state.lock().await;
        Ok(state
            .entities
            .values()
            .filter_map(|(id, entity)| match entity {
                NewEntity::Species(s) => Some(SpeciesRow {
                    id: *id,
                    scientific_name: s.scientific_name.clone(),
                    taxonomy_id: s.taxonomy_id,
                }),
                _ => None,
            })
            .collect())
    }

    async fn load_keys(&self, kind: EntityKind) -> DbResult<Vec<(NaturalKey, Id)>> {
        let state = self.state.lock().await;
        Ok(state
            .entities
            .iter()
            .filter(|(key, _)| key.kind() == kind)
            .map(|(key, (id, _))| (key.clone(), *id))
            .collect())
    }

    async fn find_entity(&self, key: &NaturalKey) -> DbResult<Option<Id>> {
        Ok(self.state.lock().await.entities.get(key).map(|(id, _)| *id))
    }

    async fn insert_entity(&self, entity: &NewEntity) -> DbResult<Id> {
        let mut state = self.state.lock().await;
        let key = entity.key();
        if state.entities.contains_key(&key) {
            return Err(DbError::duplicate(key.kind().as_str(), &key.to_string()));
        }
        let id = state.allocate(key.kind());
        state.entities.insert(key, (id, entity.clone()));
        Ok(id)
    }

    async fn resource_index(&self, hub_id: Id) -> DbResult<HashMap<String, Id>> {
        let state = self.state.lock().await;
        Ok(state
            .resources
            .iter()
            .filter(|(_, r)| r.hub_id == hub_id)
            .map(|(id, r)| (r.hub_accession.clone(), *id))
            .collect())
    }

    async fn insert_resources(&self, batch: &[NewResource]) -> DbResult<Vec<(String, Id)>> {
        let mut state = self.state.lock().await;

        // the batch is all or nothing, like the single INSERT it stands in for
        let mut batch_keys = HashSet::with_capacity(batch.len());
        for resource in batch {
            let key = (
                resource.hub_id,
                resource.hub_accession.clone(),
                resource.version_number,
            );
            if state.resource_keys.contains(&key) || !batch_keys.insert(key) {
                return Err(DbError::duplicate("resource", &resource.hub_accession));
            }
        }
        state.resource_keys.extend(batch_keys);

        let mut next_id = state.resources.keys().next_back().map_or(1, |last| last + 1);
        let mut inserted = Vec::with_capacity(batch.len());
        for resource in batch {
            state.resources.insert(next_id, resource.clone());
            inserted.push((resource.hub_accession.clone(), next_id));
            next_id += 1;
        }
        Ok(inserted)
    }

    async fn insert_resource_tags(&self, links: &[ResourceTagLink]) -> DbResult<u64> {
        let mut state = self.state.lock().await;
        Ok(links
            .iter()
            .filter(|link| state.resource_tags.insert(**link))
            .count() as u64)
    }

    async fn insert_resource_bioc_versions(&self, links: &[ResourceBiocLink]) -> DbResult<u64> {
        let mut state = self.state.lock().await;
        Ok(links
            .iter()
            .filter(|link| state.resource_bioc_versions.insert(**link))
            .count() as u64)
    }

    async fn insert_resource_files(&self, files: &[NewResourceFile]) -> DbResult<u64> {
        let mut state = self.state.lock().await;
        let mut inserted = 0;
        for file in files {
            let key = (file.resource_id, file.file_path.clone());
            if state.resource_file_keys.insert(key) {
                state.resource_files.push(file.clone());
                inserted += 1;
            }
        }
        Ok(inserted)
    }

    async fn insert_source_files(&self, files: &[NewSourceFile]) -> DbResult<u64> {
        let mut state = self.state.lock().await;
        let mut inserted = 0;
        for file in files {
            let key = (file.resource_id, file.source_url.clone());
            if state.source_file_keys.insert(key) {
                state.source_files.push(file.clone());
                inserted += 1;
            }
        }
        Ok(inserted)
    }

    async fn table_counts(&self) -> DbResult<Vec<TableCount>> {
        let state = self.state.lock().await;
        let rows_for = |table: &str| -> usize {
            match table {
                "organizations" => state.organizations as usize,
                "users" => state.count(EntityKind::User),
                "species" => state.count(EntityKind::Species),
                "genomes" => state.count(EntityKind::Genome),
                "data_providers" => state.count(EntityKind::DataProvider),
                "recipes" => state.count(EntityKind::Recipe),
                "storage_locations" => state.count(EntityKind::StorageLocation),
                "tags" => state.count(EntityKind::Tag),
                "hubs" => state.hubs.len(),
                "resource_statuses" => state.statuses.len(),
                "bioc_releases" => state.bioc_releases.len(),
                "resources" => state.resources.len(),
                "resource_files" => state.resource_files.len(),
                "source_files" => state.source_files.len(),
                "resource_tags" => state.resource_tags.len(),
                "resource_bioc_versions" => state.resource_bioc_versions.len(),
                _ => 0,
            }
        };

        Ok(STATS_TABLES
            .iter()
            .map(|table| TableCount {
                table: table.to_string(),
                rows: rows_for(table) as i64,
            })
            .collect())
    }
}
