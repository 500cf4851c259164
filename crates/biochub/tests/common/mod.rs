//! Shared fixtures for biochub integration tests
//!
//! [`SnapshotFixture`] writes a small hub snapshot with the same table layout
//! as the published SQLite files. [`annotationhub`] and [`experimenthub`]
//! return the standard pair most tests migrate.
#![allow(dead_code)]

use anyhow::Result;
use async_trait::async_trait;
use biochub::db::{DbError, DbResult};
use biochub::models::{
    Id, LookupRow, NaturalKey, NewEntity, NewResource, NewResourceFile, NewSourceFile,
    ResourceBiocLink, ResourceTagLink, SpeciesRow, TableCount,
};
use biochub::snapshot::Snapshot;
use biochub::store::{MemoryStore, TargetStore};
use biochub_common::types::{EntityKind, HubCode};
use chrono::{DateTime, TimeZone, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};

const SNAPSHOT_SCHEMA: &str = r#"
CREATE TABLE resources (
    id INTEGER PRIMARY KEY,
    ah_id VARCHAR(10),
    title TEXT,
    dataprovider TEXT,
    species TEXT,
    taxonomyid INTEGER,
    genome TEXT,
    description TEXT,
    coordinate_1_based INTEGER,
    maintainer TEXT,
    status_id INTEGER,
    location_prefix_id INTEGER,
    recipe_id INTEGER,
    rdatadateadded TEXT,
    rdatadateremoved TEXT,
    record_id INTEGER,
    preparerclass TEXT
);
CREATE TABLE tags (id INTEGER PRIMARY KEY, tag TEXT, resource_id INTEGER);
CREATE TABLE rdatapaths (
    id INTEGER PRIMARY KEY,
    rdatapath TEXT,
    rdataclass TEXT,
    resource_id INTEGER,
    dispatchclass TEXT
);
CREATE TABLE input_sources (
    id INTEGER PRIMARY KEY,
    sourcesize TEXT,
    sourceurl TEXT,
    sourceversion TEXT,
    sourcemd5 TEXT,
    sourcelastmodifieddate TEXT,
    resource_id INTEGER,
    sourcetype TEXT
);
CREATE TABLE biocversions (id INTEGER PRIMARY KEY, biocversion TEXT, resource_id INTEGER);
CREATE TABLE recipes (id INTEGER PRIMARY KEY, recipe TEXT, package TEXT);
CREATE TABLE location_prefixes (id INTEGER PRIMARY KEY, location_prefix TEXT);
"#;

const STATUSES_SCHEMA: &str = "CREATE TABLE statuses (id INTEGER PRIMARY KEY, status TEXT);";

/// Fixed run time so separate runs produce identical rows.
pub fn reference_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0)
        .single()
        .unwrap_or_default()
}

// ============================================================================
// Snapshot Fixtures
// ============================================================================

/// Builder for one `resources` row.
#[derive(Debug, Clone)]
pub struct ResourceRow {
    pub id: i64,
    pub accession: Option<String>,
    pub title: Option<String>,
    pub species: Option<String>,
    pub taxonomy_id: Option<i64>,
    pub genome: Option<String>,
    pub provider: Option<String>,
    pub maintainer: Option<String>,
    pub status_id: Option<i64>,
    pub location_prefix_id: Option<i64>,
    pub recipe_id: Option<i64>,
    pub date_added: Option<String>,
    pub preparer_class: Option<String>,
}

impl ResourceRow {
    pub fn new(id: i64, accession: &str) -> Self {
        Self {
            id,
            accession: Some(accession.to_string()),
            title: Some(format!("Resource {}", accession)),
            species: None,
            taxonomy_id: None,
            genome: None,
            provider: None,
            maintainer: None,
            status_id: Some(1),
            location_prefix_id: None,
            recipe_id: None,
            date_added: Some("2016-05-01 00:00:00".to_string()),
            preparer_class: None,
        }
    }

    pub fn without_accession(id: i64) -> Self {
        Self {
            accession: None,
            ..Self::new(id, "")
        }
    }

    pub fn species(mut self, name: &str, taxonomy_id: i64) -> Self {
        self.species = Some(name.to_string());
        self.taxonomy_id = Some(taxonomy_id);
        self
    }

    pub fn genome(mut self, build: &str) -> Self {
        self.genome = Some(build.to_string());
        self
    }

    pub fn provider(mut self, name: &str) -> Self {
        self.provider = Some(name.to_string());
        self
    }

    pub fn maintainer(mut self, raw: &str) -> Self {
        self.maintainer = Some(raw.to_string());
        self
    }

    pub fn status(mut self, status_id: Option<i64>) -> Self {
        self.status_id = status_id;
        self
    }

    pub fn location(mut self, location_prefix_id: i64) -> Self {
        self.location_prefix_id = Some(location_prefix_id);
        self
    }

    pub fn recipe(mut self, recipe_id: i64) -> Self {
        self.recipe_id = Some(recipe_id);
        self
    }

    pub fn preparer(mut self, preparer_class: &str) -> Self {
        self.preparer_class = Some(preparer_class.to_string());
        self
    }

    pub fn date_added(mut self, raw: &str) -> Self {
        self.date_added = Some(raw.to_string());
        self
    }
}

/// Builder for a complete hub snapshot.
#[derive(Debug, Clone)]
pub struct SnapshotFixture {
    hub: HubCode,
    resources: Vec<ResourceRow>,
    tags: Vec<(i64, String)>,
    files: Vec<(i64, String, String, String)>,
    sources: Vec<(i64, String, Option<String>, Option<String>)>,
    bioc_versions: Vec<(i64, String)>,
    recipes: Vec<(i64, String, String)>,
    prefixes: Vec<(i64, String)>,
    statuses: Option<Vec<(i64, String)>>,
}

impl SnapshotFixture {
    pub fn new(hub: HubCode) -> Self {
        Self {
            hub,
            resources: Vec::new(),
            tags: Vec::new(),
            files: Vec::new(),
            sources: Vec::new(),
            bioc_versions: Vec::new(),
            recipes: Vec::new(),
            prefixes: Vec::new(),
            statuses: Some(vec![
                (1, "Public".to_string()),
                (2, "Unreviewed".to_string()),
                (11, "Removed by author request".to_string()),
            ]),
        }
    }

    pub fn resource(mut self, row: ResourceRow) -> Self {
        self.resources.push(row);
        self
    }

    pub fn tag(mut self, resource_id: i64, tag: &str) -> Self {
        self.tags.push((resource_id, tag.to_string()));
        self
    }

    pub fn file(mut self, resource_id: i64, path: &str, rdata_class: &str, dispatch: &str) -> Self {
        self.files.push((
            resource_id,
            path.to_string(),
            rdata_class.to_string(),
            dispatch.to_string(),
        ));
        self
    }

    pub fn source_file(
        mut self,
        resource_id: i64,
        url: &str,
        size: Option<&str>,
        last_modified: Option<&str>,
    ) -> Self {
        self.sources.push((
            resource_id,
            url.to_string(),
            size.map(str::to_string),
            last_modified.map(str::to_string),
        ));
        self
    }

    pub fn bioc_version(mut self, resource_id: i64, version: &str) -> Self {
        self.bioc_versions.push((resource_id, version.to_string()));
        self
    }

    pub fn recipe(mut self, id: i64, recipe: &str, package: &str) -> Self {
        self.recipes.push((id, recipe.to_string(), package.to_string()));
        self
    }

    pub fn location_prefix(mut self, id: i64, prefix: &str) -> Self {
        self.prefixes.push((id, prefix.to_string()));
        self
    }

    pub fn without_statuses(mut self) -> Self {
        self.statuses = None;
        self
    }

    /// Write the snapshot under `dir` and open it.
    pub async fn build(&self, dir: &Path) -> Result<Snapshot> {
        let path = dir.join(self.hub.snapshot_file_name());
        self.write(&path).await?;
        Ok(Snapshot::open(self.hub, &path).await?)
    }

    pub async fn write(&self, path: &Path) -> Result<()> {
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;

        sqlx::raw_sql(SNAPSHOT_SCHEMA).execute(&pool).await?;

        for r in &self.resources {
            sqlx::query(
                r#"
                INSERT INTO resources (
                    id, ah_id, title, dataprovider, species, taxonomyid, genome, maintainer,
                    status_id, location_prefix_id, recipe_id, rdatadateadded, preparerclass
                )
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(r.id)
            .bind(&r.accession)
            .bind(&r.title)
            .bind(&r.provider)
            .bind(&r.species)
            .bind(r.taxonomy_id)
            .bind(&r.genome)
            .bind(&r.maintainer)
            .bind(r.status_id)
            .bind(r.location_prefix_id)
            .bind(r.recipe_id)
            .bind(&r.date_added)
            .bind(&r.preparer_class)
            .execute(&pool)
            .await?;
        }

        for (resource_id, tag) in &self.tags {
            sqlx::query("INSERT INTO tags (tag, resource_id) VALUES (?, ?)")
                .bind(tag)
                .bind(resource_id)
                .execute(&pool)
                .await?;
        }

        for (resource_id, path, rdata_class, dispatch) in &self.files {
            sqlx::query(
                "INSERT INTO rdatapaths (rdatapath, rdataclass, resource_id, dispatchclass) \
                 VALUES (?, ?, ?, ?)",
            )
            .bind(path)
            .bind(rdata_class)
            .bind(resource_id)
            .bind(dispatch)
            .execute(&pool)
            .await?;
        }

        for (resource_id, url, size, last_modified) in &self.sources {
            sqlx::query(
                r#"
                INSERT INTO input_sources (
                    sourcesize, sourceurl, sourceversion, sourcemd5, sourcelastmodifieddate,
                    resource_id, sourcetype
                )
                VALUES (?, ?, 'v1', 'd41d8cd98f00b204e9800998ecf8427e', ?, ?, 'BigWig')
                "#,
            )
            .bind(size)
            .bind(url)
            .bind(last_modified)
            .bind(resource_id)
            .execute(&pool)
            .await?;
        }

        for (resource_id, version) in &self.bioc_versions {
            sqlx::query("INSERT INTO biocversions (biocversion, resource_id) VALUES (?, ?)")
                .bind(version)
                .bind(resource_id)
                .execute(&pool)
                .await?;
        }

        for (id, recipe, package) in &self.recipes {
            sqlx::query("INSERT INTO recipes (id, recipe, package) VALUES (?, ?, ?)")
                .bind(id)
                .bind(recipe)
                .bind(package)
                .execute(&pool)
                .await?;
        }

        for (id, prefix) in &self.prefixes {
            sqlx::query("INSERT INTO location_prefixes (id, location_prefix) VALUES (?, ?)")
                .bind(id)
                .bind(prefix)
                .execute(&pool)
                .await?;
        }

        if let Some(statuses) = &self.statuses {
            sqlx::raw_sql(STATUSES_SCHEMA).execute(&pool).await?;
            for (id, status) in statuses {
                sqlx::query("INSERT INTO statuses (id, status) VALUES (?, ?)")
                    .bind(id)
                    .bind(status)
                    .execute(&pool)
                    .await?;
            }
        }

        pool.close().await;
        Ok(())
    }
}

/// AnnotationHub fixture: two species spellings for 9606, an unresolved
/// recipe id, a missing status, a malformed date, an empty accession, a
/// repeated accession, and dangling satellite rows.
pub fn annotationhub() -> SnapshotFixture {
    SnapshotFixture::new(HubCode::AnnotationHub)
        .location_prefix(1, "http://s3.amazonaws.com/annotationhub/")
        .location_prefix(2, "ftp://ftp.ensembl.org/pub/")
        .location_prefix(3, "")
        .recipe(1, "ensemblGtfToGRangesRecipe", "AnnotationHubData")
        .recipe(2, "ucscTrackRecipe", "AnnotationHubData")
        .resource(
            ResourceRow::new(1, "AH1")
                .species("Homo sapiens", 9606)
                .genome("hg19")
                .provider("UCSC")
                .maintainer("Jane Doe <jane@x.org>")
                .location(1)
                .recipe(2)
                .preparer("UCSCTrackImportPreparer"),
        )
        .resource(
            ResourceRow::new(2, "AH2")
                .species("Homo sapiens", 9606)
                .genome("GRCh38")
                .provider("Ensembl")
                .maintainer("<jane@x.org>")
                .location(2)
                .recipe(1)
                .preparer("EnsemblGtfImportPreparer"),
        )
        .resource(
            ResourceRow::new(3, "AH3")
                .species("Homo Sapiens", 9606)
                .genome("hg19")
                .provider("UCSC")
                .maintainer("Bioconductor Package Maintainer")
                .status(Some(11))
                .location(1)
                .recipe(99)
                .preparer("UCSCTrackImportPreparer"),
        )
        .resource(
            ResourceRow::new(4, "AH4")
                .species("Mus musculus", 10090)
                .genome("mm10")
                .provider("UCSC")
                .maintainer("bob@y.org")
                .location(1)
                .recipe(2),
        )
        .resource(
            ResourceRow::new(5, "AH5")
                .species("Mus musculus", 10090)
                .genome("mm10")
                .provider("Ensembl")
                .maintainer("bob@y.org")
                .status(None)
                .location(2)
                .preparer("EnsemblGtfImportPreparer")
                .date_added("last tuesday"),
        )
        .resource(ResourceRow::without_accession(6))
        .resource(
            ResourceRow::new(7, "AH4")
                .species("Mus musculus", 10090)
                .genome("mm10")
                .provider("UCSC"),
        )
        .tag(1, "UCSC")
        .tag(1, "hg19")
        .tag(2, "GTF")
        .tag(3, "hg19")
        .tag(4, "UCSC")
        .tag(999, "Orphan")
        .file(1, "goldenpath/hg19/phastCons.bw", "GRanges", "BigWigFile")
        .file(2, "release-84/gtf/homo_sapiens/Homo_sapiens.GRCh38.84.gtf.gz", "GRanges", "GTFFile")
        .file(999, "nowhere.rda", "list", "Rda")
        .source_file(1, "http://hgdownload.cse.ucsc.edu/phastCons.bw", Some("12345"), Some("2013-03-19"))
        .source_file(2, "ftp://ftp.ensembl.org/pub/release-84/gtf/x.gtf.gz", Some("12 MB"), None)
        .source_file(4, "", None, None)
        .bioc_version(1, "3.0")
        .bioc_version(1, "3.1")
        .bioc_version(2, "3.21")
        .bioc_version(4, "1.0")
        .bioc_version(999, "3.21")
}

/// ExperimentHub fixture sharing species, a maintainer and a tag with
/// [`annotationhub`].
pub fn experimenthub() -> SnapshotFixture {
    SnapshotFixture::new(HubCode::ExperimentHub)
        .location_prefix(1, "https://experimenthub.bioconductor.org/fetch/")
        .resource(
            ResourceRow::new(1, "EH1")
                .species("Homo sapiens", 9606)
                .provider("GEO")
                .maintainer("Jane Doe <jane@x.org>")
                .location(1)
                .preparer("ExperimentHubDataPreparer"),
        )
        .resource(
            ResourceRow::new(2, "EH2")
                .species("Mus musculus", 10090)
                .genome("mm10")
                .provider("GEO")
                .maintainer("Carol <carol@z.org>")
                .status(Some(2))
                .location(1),
        )
        .tag(1, "ExperimentData")
        .tag(2, "UCSC")
        .file(1, "curatedTCGAData/x.rda", "SummarizedExperiment", "Rda")
        .bioc_version(1, "3.21")
}

/// Build both standard snapshots under `dir`.
pub async fn standard_snapshots(dir: &Path) -> Result<(Snapshot, Snapshot)> {
    let ah = annotationhub().build(dir).await?;
    let eh = experimenthub().build(dir).await?;
    Ok((ah, eh))
}

// ============================================================================
// Store Wrappers
// ============================================================================

/// Ways [`FaultyStore`] can misbehave.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    None,
    /// Fail the nth resource batch insert (1-based)
    ResourceBatch(usize),
    /// Fail every tag link insert
    TagLinks,
    /// Report no existing keys, so every insert races an existing row
    BlindLookups,
}

/// Delegates to a [`MemoryStore`] and injects one kind of failure.
pub struct FaultyStore<'a> {
    pub inner: &'a MemoryStore,
    pub fault: Fault,
    resource_batches: AtomicUsize,
}

impl<'a> FaultyStore<'a> {
    pub fn new(inner: &'a MemoryStore, fault: Fault) -> Self {
        Self {
            inner,
            fault,
            resource_batches: AtomicUsize::new(0),
        }
    }

    fn injected(what: &str) -> DbError {
        DbError::Sqlx(sqlx::Error::Protocol(format!("injected failure: {}", what)))
    }
}

#[async_trait]
impl<'a> TargetStore for FaultyStore<'a> {
    async fn load_hubs(&self) -> DbResult<Vec<LookupRow>> {
        self.inner.load_hubs().await
    }

    async fn load_statuses(&self) -> DbResult<Vec<LookupRow>> {
        self.inner.load_statuses().await
    }

    async fn load_bioc_releases(&self) -> DbResult<Vec<LookupRow>> {
        self.inner.load_bioc_releases().await
    }

    async fn load_species(&self) -> DbResult<Vec<SpeciesRow>> {
        if self.fault == Fault::BlindLookups {
            return Ok(Vec::new());
        }
        self.inner.load_species().await
    }

    async fn load_keys(&self, kind: EntityKind) -> DbResult<Vec<(NaturalKey, Id)>> {
        if self.fault == Fault::BlindLookups {
            return Ok(Vec::new());
        }
        self.inner.load_keys(kind).await
    }

    async fn find_entity(&self, key: &NaturalKey) -> DbResult<Option<Id>> {
        if self.fault == Fault::BlindLookups {
            return Ok(None);
        }
        self.inner.find_entity(key).await
    }

    async fn insert_entity(&self, entity: &NewEntity) -> DbResult<Id> {
        self.inner.insert_entity(entity).await
    }

    async fn resource_index(&self, hub_id: Id) -> DbResult<HashMap<String, Id>> {
        self.inner.resource_index(hub_id).await
    }

    async fn insert_resources(&self, batch: &[NewResource]) -> DbResult<Vec<(String, Id)>> {
        let call = self.resource_batches.fetch_add(1, Ordering::SeqCst) + 1;
        if self.fault == Fault::ResourceBatch(call) {
            return Err(Self::injected("resource batch"));
        }
        self.inner.insert_resources(batch).await
    }

    async fn insert_resource_tags(&self, links: &[ResourceTagLink]) -> DbResult<u64> {
        if self.fault == Fault::TagLinks {
            return Err(Self::injected("resource tags"));
        }
        self.inner.insert_resource_tags(links).await
    }

    async fn insert_resource_bioc_versions(&self, links: &[ResourceBiocLink]) -> DbResult<u64> {
        self.inner.insert_resource_bioc_versions(links).await
    }

    async fn insert_resource_files(&self, files: &[NewResourceFile]) -> DbResult<u64> {
        self.inner.insert_resource_files(files).await
    }

    async fn insert_source_files(&self, files: &[NewSourceFile]) -> DbResult<u64> {
        self.inner.insert_source_files(files).await
    }

    async fn table_counts(&self) -> DbResult<Vec<TableCount>> {
        self.inner.table_counts().await
    }
}
