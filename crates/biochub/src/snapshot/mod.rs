//! Read-only access to a hub's SQLite metadata snapshot

pub mod download;
pub mod models;

pub use download::{DownloadOutcome, DownloadStatus, SnapshotDownloader};
pub use models::*;

use biochub_common::types::HubCode;
use futures::stream::{BoxStream, StreamExt, TryStreamExt};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

/// Tables a snapshot must contain. `statuses` is optional.
pub const REQUIRED_TABLES: &[&str] = &[
    "resources",
    "tags",
    "rdatapaths",
    "input_sources",
    "biocversions",
    "recipes",
    "location_prefixes",
];

#[derive(Error, Debug)]
pub enum SnapshotError {
    #[error("Snapshot file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("{hub} snapshot is missing required table '{table}'")]
    MissingTable { hub: HubCode, table: String },

    #[error("Snapshot query failed: {0}")]
    Sqlx(#[from] sqlx::Error),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Download of {url} failed: {reason}")]
    Download { url: String, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type SnapshotResult<T> = Result<T, SnapshotError>;

/// Row stream borrowed from a snapshot's pool.
pub type RowStream<'a, T> = BoxStream<'a, SnapshotResult<T>>;

/// An opened hub snapshot.
#[derive(Debug, Clone)]
pub struct Snapshot {
    hub: HubCode,
    pool: SqlitePool,
}

impl Snapshot {
    /// Open a snapshot file read-only and check its required tables.
    pub async fn open(hub: HubCode, path: impl AsRef<Path>) -> SnapshotResult<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(SnapshotError::NotFound(path.to_path_buf()));
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .read_only(true)
            .create_if_missing(false);

        let pool = SqlitePoolOptions::new()
            .max_connections(2)
            .connect_with(options)
            .await?;

        let snapshot = Self::from_pool(hub, pool);
        snapshot.check_tables().await?;

        info!(hub = %hub, path = %path.display(), "Opened snapshot");
        Ok(snapshot)
    }

    /// Wrap an existing pool without checking its schema.
    pub fn from_pool(hub: HubCode, pool: SqlitePool) -> Self {
        Self { hub, pool }
    }

    pub fn hub(&self) -> HubCode {
        self.hub
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }

    pub async fn table_exists(&self, table: &str) -> SnapshotResult<bool> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?",
        )
        .bind(table)
        .fetch_one(&self.pool)
        .await?;
        Ok(count > 0)
    }

    pub async fn check_tables(&self) -> SnapshotResult<()> {
        for table in REQUIRED_TABLES {
            if !self.table_exists(table).await? {
                return Err(SnapshotError::MissingTable {
                    hub: self.hub,
                    table: table.to_string(),
                });
            }
        }
        Ok(())
    }

    pub async fn count_resources(&self) -> SnapshotResult<i64> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM resources")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    /// Occurrence counts per (taxonomy id, species spelling).
    pub async fn species_counts(&self) -> SnapshotResult<Vec<SpeciesCount>> {
        let rows = sqlx::query_as::<_, SpeciesCount>(
            r#"
            SELECT CAST(species AS TEXT) AS name,
                   CAST(taxonomyid AS TEXT) AS taxonomy_id,
                   COUNT(*) AS occurrences
            FROM resources
            WHERE species IS NOT NULL AND taxonomyid IS NOT NULL
            GROUP BY taxonomyid, species
            ORDER BY taxonomyid, occurrences DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn genome_pairs(&self) -> SnapshotResult<Vec<GenomePair>> {
        let rows = sqlx::query_as::<_, GenomePair>(
            r#"
            SELECT DISTINCT CAST(species AS TEXT) AS species,
                   CAST(taxonomyid AS TEXT) AS taxonomy_id,
                   CAST(genome AS TEXT) AS genome
            FROM resources
            WHERE genome IS NOT NULL
            ORDER BY species, genome
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn distinct_providers(&self) -> SnapshotResult<Vec<String>> {
        self.distinct_resource_values("dataprovider").await
    }

    pub async fn distinct_maintainers(&self) -> SnapshotResult<Vec<String>> {
        self.distinct_resource_values("maintainer").await
    }

    pub async fn distinct_preparer_classes(&self) -> SnapshotResult<Vec<String>> {
        self.distinct_resource_values("preparerclass").await
    }

    async fn distinct_resource_values(&self, column: &'static str) -> SnapshotResult<Vec<String>> {
        let sql = format!(
            "SELECT DISTINCT CAST({col} AS TEXT) AS value FROM resources \
             WHERE {col} IS NOT NULL ORDER BY value",
            col = column
        );
        let values = sqlx::query_scalar::<_, String>(&sql)
            .fetch_all(&self.pool)
            .await?;
        Ok(values)
    }

    pub async fn distinct_tags(&self) -> SnapshotResult<Vec<String>> {
        let values = sqlx::query_scalar::<_, String>(
            "SELECT DISTINCT CAST(tag AS TEXT) AS value FROM tags WHERE tag IS NOT NULL ORDER BY value",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(values)
    }

    pub async fn recipes(&self) -> SnapshotResult<Vec<SourceRecipe>> {
        let rows = sqlx::query_as::<_, SourceRecipe>(
            r#"
            SELECT id, CAST(recipe AS TEXT) AS recipe, CAST(package AS TEXT) AS package
            FROM recipes
            ORDER BY id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn location_prefixes(&self) -> SnapshotResult<Vec<SourceLocationPrefix>> {
        let rows = sqlx::query_as::<_, SourceLocationPrefix>(
            r#"
            SELECT id, CAST(location_prefix AS TEXT) AS location_prefix
            FROM location_prefixes
            ORDER BY id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Source status id to status name. Empty when the snapshot has no
    /// `statuses` table.
    pub async fn statuses(&self) -> SnapshotResult<HashMap<i64, String>> {
        if !self.table_exists("statuses").await? {
            debug!(hub = %self.hub, "Snapshot has no statuses table");
            return Ok(HashMap::new());
        }

        let rows = sqlx::query_as::<_, (i64, Option<String>)>(
            "SELECT id, CAST(status AS TEXT) FROM statuses",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .filter_map(|(id, status)| status.map(|s| (id, s)))
            .collect())
    }

    /// All resources in primary-key order.
    pub fn resources(&self) -> RowStream<'_, SourceResource> {
        self.stream(
            r#"
            SELECT id,
                   CAST(ah_id AS TEXT) AS accession,
                   CAST(title AS TEXT) AS title,
                   CAST(description AS TEXT) AS description,
                   CAST(species AS TEXT) AS species,
                   CAST(taxonomyid AS TEXT) AS taxonomy_id,
                   CAST(genome AS TEXT) AS genome,
                   CAST(coordinate_1_based AS TEXT) AS coordinate_1_based,
                   CAST(dataprovider AS TEXT) AS data_provider,
                   CAST(maintainer AS TEXT) AS maintainer,
                   CAST(status_id AS INTEGER) AS status_id,
                   CAST(location_prefix_id AS INTEGER) AS location_prefix_id,
                   CAST(recipe_id AS INTEGER) AS recipe_id,
                   CAST(rdatadateadded AS TEXT) AS date_added,
                   CAST(rdatadateremoved AS TEXT) AS date_removed,
                   CAST(preparerclass AS TEXT) AS preparer_class
            FROM resources
            ORDER BY id
            "#,
        )
    }

    pub fn tag_rows(&self) -> RowStream<'_, TagRow> {
        self.stream(
            r#"
            SELECT CAST(r.ah_id AS TEXT) AS accession, CAST(t.tag AS TEXT) AS tag
            FROM tags t
            LEFT JOIN resources r ON t.resource_id = r.id
            ORDER BY t.id
            "#,
        )
    }

    pub fn file_rows(&self) -> RowStream<'_, FileRow> {
        self.stream(
            r#"
            SELECT CAST(r.ah_id AS TEXT) AS accession,
                   CAST(r.location_prefix_id AS INTEGER) AS location_prefix_id,
                   CAST(rp.rdatapath AS TEXT) AS path,
                   CAST(rp.rdataclass AS TEXT) AS rdata_class,
                   CAST(rp.dispatchclass AS TEXT) AS dispatch_class
            FROM rdatapaths rp
            LEFT JOIN resources r ON rp.resource_id = r.id
            ORDER BY rp.id
            "#,
        )
    }

    pub fn source_file_rows(&self) -> RowStream<'_, SourceFileRow> {
        self.stream(
            r#"
            SELECT CAST(r.ah_id AS TEXT) AS accession,
                   CAST(i.sourceurl AS TEXT) AS url,
                   CAST(i.sourcetype AS TEXT) AS source_type,
                   CAST(i.sourceversion AS TEXT) AS version,
                   CAST(i.sourcemd5 AS TEXT) AS md5,
                   CAST(i.sourcesize AS TEXT) AS size,
                   CAST(i.sourcelastmodifieddate AS TEXT) AS last_modified
            FROM input_sources i
            LEFT JOIN resources r ON i.resource_id = r.id
            ORDER BY i.id
            "#,
        )
    }

    pub fn bioc_version_rows(&self) -> RowStream<'_, BiocVersionRow> {
        self.stream(
            r#"
            SELECT CAST(r.ah_id AS TEXT) AS accession, CAST(b.biocversion AS TEXT) AS version
            FROM biocversions b
            LEFT JOIN resources r ON b.resource_id = r.id
            ORDER BY b.id
            "#,
        )
    }

    fn stream<'a, T>(&'a self, sql: &'static str) -> RowStream<'a, T>
    where
        T: for<'r> sqlx::FromRow<'r, SqliteRow> + Send + Unpin + 'a,
    {
        sqlx::query_as::<_, T>(sql)
            .fetch(&self.pool)
            .map_err(SnapshotError::from)
            .boxed()
    }
}
