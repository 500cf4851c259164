//! Rows read from a hub snapshot
//!
//! Every text column is selected through `CAST(... AS TEXT)` because SQLite
//! does not enforce declared column types. Numbers that need validation
//! (taxonomy ids, sizes, flags) arrive as text and are parsed by the caller.

use sqlx::FromRow;

/// One row of the flat `resources` table.
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct SourceResource {
    pub id: i64,
    pub accession: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub species: Option<String>,
    pub taxonomy_id: Option<String>,
    pub genome: Option<String>,
    pub coordinate_1_based: Option<String>,
    pub data_provider: Option<String>,
    pub maintainer: Option<String>,
    pub status_id: Option<i64>,
    pub location_prefix_id: Option<i64>,
    pub recipe_id: Option<i64>,
    pub date_added: Option<String>,
    pub date_removed: Option<String>,
    pub preparer_class: Option<String>,
}

/// Occurrences of one (taxonomy id, species name) spelling.
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct SpeciesCount {
    pub name: String,
    pub taxonomy_id: String,
    pub occurrences: i64,
}

/// Distinct (species, genome build) pair.
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct GenomePair {
    pub species: Option<String>,
    pub taxonomy_id: Option<String>,
    pub genome: String,
}

#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct SourceRecipe {
    pub id: i64,
    pub recipe: Option<String>,
    pub package: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct SourceLocationPrefix {
    pub id: i64,
    pub location_prefix: Option<String>,
}

/// `tags` row with the owning resource's accession (absent for orphans).
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct TagRow {
    pub accession: Option<String>,
    pub tag: Option<String>,
}

/// `rdatapaths` row with the owning resource's accession and location id.
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct FileRow {
    pub accession: Option<String>,
    pub location_prefix_id: Option<i64>,
    pub path: Option<String>,
    pub rdata_class: Option<String>,
    pub dispatch_class: Option<String>,
}

/// `input_sources` row with the owning resource's accession.
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct SourceFileRow {
    pub accession: Option<String>,
    pub url: Option<String>,
    pub source_type: Option<String>,
    pub version: Option<String>,
    pub md5: Option<String>,
    pub size: Option<String>,
    pub last_modified: Option<String>,
}

/// `biocversions` row with the owning resource's accession.
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct BiocVersionRow {
    pub accession: Option<String>,
    pub version: Option<String>,
}
