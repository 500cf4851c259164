//! Target store abstraction
//!
//! The migration engine only talks to a [`TargetStore`]. Reference entities
//! go through a find-then-insert pair so deduplication never depends on
//! engine-specific upsert syntax. Relationship inserts are idempotent: rows
//! that already exist are skipped and not counted.

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

use crate::db::DbResult;
use crate::models::{
    Id, LookupRow, NaturalKey, NewEntity, NewResource, NewResourceFile, NewSourceFile,
    ResourceBiocLink, ResourceTagLink, SpeciesRow, TableCount,
};
use async_trait::async_trait;
use biochub_common::types::EntityKind;
use std::collections::HashMap;

#[async_trait]
pub trait TargetStore: Send + Sync {
    /// Hubs keyed by code (`AH`, `EH`).
    async fn load_hubs(&self) -> DbResult<Vec<LookupRow>>;

    /// Resource statuses keyed by status name.
    async fn load_statuses(&self) -> DbResult<Vec<LookupRow>>;

    /// Bioconductor releases keyed by version string.
    async fn load_bioc_releases(&self) -> DbResult<Vec<LookupRow>>;

    async fn load_species(&self) -> DbResult<Vec<SpeciesRow>>;

    /// Every existing entity of `kind` with its natural key.
    async fn load_keys(&self, kind: EntityKind) -> DbResult<Vec<(NaturalKey, Id)>>;

    async fn find_entity(&self, key: &NaturalKey) -> DbResult<Option<Id>>;

    /// Insert a reference entity. An existing natural key is a `Duplicate` error.
    async fn insert_entity(&self, entity: &NewEntity) -> DbResult<Id>;

    /// Accession to resource id for every resource of a hub.
    async fn resource_index(&self, hub_id: Id) -> DbResult<HashMap<String, Id>>;

    /// Insert a batch of resources, returning `(accession, id)` per row.
    async fn insert_resources(&self, batch: &[NewResource]) -> DbResult<Vec<(String, Id)>>;

    async fn insert_resource_tags(&self, links: &[ResourceTagLink]) -> DbResult<u64>;

    async fn insert_resource_bioc_versions(&self, links: &[ResourceBiocLink]) -> DbResult<u64>;

    async fn insert_resource_files(&self, files: &[NewResourceFile]) -> DbResult<u64>;

    async fn insert_source_files(&self, files: &[NewSourceFile]) -> DbResult<u64>;

    async fn table_counts(&self) -> DbResult<Vec<TableCount>>;
}
