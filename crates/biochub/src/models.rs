//! Target-side row types
//!
//! `New*` structs are what the migration engine hands to a [`TargetStore`];
//! [`NaturalKey`] is the identity each reference entity is deduplicated on.
//!
//! [`TargetStore`]: crate::store::TargetStore

use biochub_common::types::{EntityKind, LocationType};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Surrogate key assigned by the target store.
pub type Id = i64;

/// Real-world identity of a reference entity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum NaturalKey {
    Species { taxonomy_id: i64 },
    Genome { species_id: Id, build: String },
    DataProvider(String),
    /// Keyed by email
    User(String),
    Recipe(String),
    /// Synthetic `Storage <n>` name
    StorageLocation(String),
    Tag(String),
}

impl NaturalKey {
    pub fn kind(&self) -> EntityKind {
        match self {
            NaturalKey::Species { .. } => EntityKind::Species,
            NaturalKey::Genome { .. } => EntityKind::Genome,
            NaturalKey::DataProvider(_) => EntityKind::DataProvider,
            NaturalKey::User(_) => EntityKind::User,
            NaturalKey::Recipe(_) => EntityKind::Recipe,
            NaturalKey::StorageLocation(_) => EntityKind::StorageLocation,
            NaturalKey::Tag(_) => EntityKind::Tag,
        }
    }
}

impl std::fmt::Display for NaturalKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NaturalKey::Species { taxonomy_id } => write!(f, "taxonomy id {}", taxonomy_id),
            NaturalKey::Genome { species_id, build } => {
                write!(f, "{} (species {})", build, species_id)
            },
            NaturalKey::DataProvider(name)
            | NaturalKey::User(name)
            | NaturalKey::Recipe(name)
            | NaturalKey::StorageLocation(name)
            | NaturalKey::Tag(name) => f.write_str(name),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewSpecies {
    pub scientific_name: String,
    pub taxonomy_id: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewGenome {
    pub species_id: Id,
    pub genome_build: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewDataProvider {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewUser {
    pub email: String,
    pub full_name: Option<String>,
    pub role: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewRecipe {
    pub name: String,
    pub package_name: Option<String>,
    pub preparer_class: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewStorageLocation {
    pub name: String,
    pub location_type: LocationType,
    pub base_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewTag {
    pub tag: String,
}

/// A reference entity ready to be inserted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum NewEntity {
    Species(NewSpecies),
    Genome(NewGenome),
    DataProvider(NewDataProvider),
    User(NewUser),
    Recipe(NewRecipe),
    StorageLocation(NewStorageLocation),
    Tag(NewTag),
}

impl NewEntity {
    pub fn key(&self) -> NaturalKey {
        match self {
            NewEntity::Species(s) => NaturalKey::Species {
                taxonomy_id: s.taxonomy_id,
            },
            NewEntity::Genome(g) => NaturalKey::Genome {
                species_id: g.species_id,
                build: g.genome_build.clone(),
            },
            NewEntity::DataProvider(p) => NaturalKey::DataProvider(p.name.clone()),
            NewEntity::User(u) => NaturalKey::User(u.email.clone()),
            NewEntity::Recipe(r) => NaturalKey::Recipe(r.name.clone()),
            NewEntity::StorageLocation(s) => NaturalKey::StorageLocation(s.name.clone()),
            NewEntity::Tag(t) => NaturalKey::Tag(t.tag.clone()),
        }
    }

    pub fn kind(&self) -> EntityKind {
        self.key().kind()
    }
}

/// Normalized resource row. Every reference except hub and status is optional.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewResource {
    pub hub_id: Id,
    pub hub_accession: String,
    pub title: String,
    pub description: Option<String>,
    pub species_id: Option<Id>,
    pub genome_id: Option<Id>,
    pub coordinate_1_based: Option<bool>,
    pub data_provider_id: Option<Id>,
    pub recipe_id: Option<Id>,
    pub maintainer_id: Option<Id>,
    pub status_id: Id,
    pub created_at: DateTime<Utc>,
    pub valid_from: DateTime<Utc>,
    pub valid_to: Option<DateTime<Utc>>,
    pub version_number: i32,
    pub deleted_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ResourceTagLink {
    pub resource_id: Id,
    pub tag_id: Id,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ResourceBiocLink {
    pub resource_id: Id,
    pub bioc_release_id: Id,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewResourceFile {
    pub resource_id: Id,
    pub storage_location_id: Option<Id>,
    pub file_path: String,
    pub rdata_class: Option<String>,
    pub dispatch_class: Option<String>,
    pub valid_from: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewSourceFile {
    pub resource_id: Id,
    pub source_url: String,
    pub source_type: Option<String>,
    pub source_version: Option<String>,
    pub md5_hash: Option<String>,
    pub file_size_bytes: Option<i64>,
    pub last_modified_date: Option<DateTime<Utc>>,
    pub valid_from: DateTime<Utc>,
}

/// Row from a seeded lookup table (hubs, statuses, releases).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LookupRow {
    pub id: Id,
    pub name: String,
}

/// Existing species, used to seed name aliases on preload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpeciesRow {
    pub id: Id,
    pub scientific_name: String,
    pub taxonomy_id: i64,
}

/// Row count of one target table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableCount {
    pub table: String,
    pub rows: i64,
}
