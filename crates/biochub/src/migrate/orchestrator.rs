//! Migration pipeline
//!
//! Runs sequentially: load caches, count species over every snapshot, then
//! for each snapshot extract reference entities, then migrate resources,
//! then the relationship passes. Each step commits its own batches; a
//! failure leaves a consistent partial state that a re-run completes.

use super::cache::{ReferenceCaches, Resolved};
use super::extract::{HubLinks, SpeciesCensus};
use super::summary::{DataQuality, MigrationSummary};
use crate::config::{MigrationConfig, DEFAULT_BATCH_SIZE, DEFAULT_LINK_BATCH_SIZE};
use crate::db::seed::PUBLIC_STATUS;
use crate::error::{MigrateError, MigrateResult, Phase};
use crate::models::{Id, NewEntity};
use crate::snapshot::Snapshot;
use crate::store::TargetStore;
use biochub_common::types::{EntityKind, HubCode};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tracing::info;

#[derive(Debug, Clone)]
pub struct MigrateOptions {
    /// Resources per insert batch
    pub batch_size: usize,
    /// Relationship rows per insert batch
    pub link_batch_size: usize,
    /// Default for missing creation dates and `valid_from` of file rows
    pub reference_time: DateTime<Utc>,
}

impl Default for MigrateOptions {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            link_batch_size: DEFAULT_LINK_BATCH_SIZE,
            reference_time: Utc::now(),
        }
    }
}

impl MigrateOptions {
    pub fn from_config(config: &MigrationConfig) -> Self {
        Self {
            batch_size: config.batch_size,
            link_batch_size: config.link_batch_size,
            ..Self::default()
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn with_reference_time(mut self, reference_time: DateTime<Utc>) -> Self {
        self.reference_time = reference_time;
        self
    }
}

/// Seeded lookup rows the migration depends on.
#[derive(Debug, Clone)]
pub struct TargetLookups {
    pub hubs: HashMap<HubCode, Id>,
    /// Keyed by lowercase status name
    pub statuses: HashMap<String, Id>,
    pub public_status: Id,
    pub releases: HashMap<String, Id>,
}

impl TargetLookups {
    pub async fn load<S: TargetStore + ?Sized>(store: &S) -> MigrateResult<Self> {
        let hubs = store
            .load_hubs()
            .await?
            .into_iter()
            .filter_map(|row| row.name.parse::<HubCode>().ok().map(|hub| (hub, row.id)))
            .collect();

        let statuses: HashMap<String, Id> = store
            .load_statuses()
            .await?
            .into_iter()
            .map(|row| (row.name.trim().to_lowercase(), row.id))
            .collect();

        let public_status = statuses
            .get(&PUBLIC_STATUS.to_lowercase())
            .copied()
            .ok_or_else(|| {
                MigrateError::missing_reference(format!("resource status '{}'", PUBLIC_STATUS))
            })?;

        let releases = store
            .load_bioc_releases()
            .await?
            .into_iter()
            .map(|row| (row.name, row.id))
            .collect();

        Ok(Self {
            hubs,
            statuses,
            public_status,
            releases,
        })
    }

    pub fn hub_id(&self, hub: HubCode) -> MigrateResult<Id> {
        self.hubs
            .get(&hub)
            .copied()
            .ok_or_else(|| MigrateError::missing_reference(format!("hub '{}'", hub)))
    }

    pub fn status_id(&self, name: &str) -> Option<Id> {
        self.statuses.get(&name.trim().to_lowercase()).copied()
    }

    pub fn release_id(&self, version: &str) -> Option<Id> {
        self.releases.get(version.trim()).copied()
    }
}

/// State shared by every phase of one run.
pub struct Migrator<'a, S: TargetStore + ?Sized> {
    pub(super) store: &'a S,
    pub(super) options: MigrateOptions,
    pub(super) caches: ReferenceCaches,
    pub(super) lookups: TargetLookups,
    pub(super) census: SpeciesCensus,
    pub(super) links: HashMap<HubCode, HubLinks>,
    /// Accession to resource id per hub, filled by the resource pass
    pub(super) indexes: HashMap<HubCode, HashMap<String, Id>>,
    pub(super) summary: MigrationSummary,
}

impl<'a, S: TargetStore + ?Sized> Migrator<'a, S> {
    /// Load caches and lookups from the target.
    pub async fn new(store: &'a S, options: MigrateOptions) -> MigrateResult<Self> {
        let started_at = Utc::now();

        let result = Self::load(store, options, started_at).await;
        result.map_err(|e| e.in_phase(Phase::LoadCaches, None, 0))
    }

    async fn load(
        store: &'a S,
        options: MigrateOptions,
        started_at: DateTime<Utc>,
    ) -> MigrateResult<Self> {
        let lookups = TargetLookups::load(store).await?;
        let caches = ReferenceCaches::load(store).await?;

        info!(
            hubs = lookups.hubs.len(),
            statuses = lookups.statuses.len(),
            releases = lookups.releases.len(),
            "Loaded target lookups"
        );

        Ok(Self {
            store,
            options,
            caches,
            lookups,
            census: SpeciesCensus::default(),
            links: HashMap::new(),
            indexes: HashMap::new(),
            summary: MigrationSummary::new(started_at),
        })
    }

    /// Resolve an entity through the caches and count it when created.
    pub(super) async fn create(&mut self, entity: NewEntity) -> MigrateResult<Resolved> {
        let key = entity.key();
        let kind = key.kind();
        let resolved = self
            .caches
            .resolve_or_create(self.store, key, move || entity)
            .await?;
        if resolved.created() {
            self.summary.record_created(kind);
        }
        Ok(resolved)
    }

    pub(super) fn quality(&mut self, hub: HubCode) -> &mut DataQuality {
        &mut self.summary.hub_mut(hub).quality
    }

    /// Migrate every snapshot and return the run summary.
    pub async fn run(mut self, snapshots: &[&Snapshot]) -> MigrateResult<MigrationSummary> {
        for snapshot in snapshots {
            let hub = snapshot.hub();
            self.lookups
                .hub_id(hub)
                .map_err(|e| e.in_phase(Phase::LoadCaches, Some(hub), 0))?;
            self.summary.hub_mut(hub);
        }

        for snapshot in snapshots {
            let mut processed = 0;
            let result = self.census(snapshot, &mut processed).await;
            result.map_err(|e| e.in_phase(Phase::Census, Some(snapshot.hub()), processed))?;
        }

        for snapshot in snapshots {
            for kind in EntityKind::EXTRACTION_ORDER {
                let mut processed = 0;
                let result = self.extract(snapshot, kind, &mut processed).await;
                result.map_err(|e| {
                    e.in_phase(Phase::Extract(kind), Some(snapshot.hub()), processed)
                })?;
            }
        }

        for snapshot in snapshots {
            let mut processed = 0;
            let result = self.migrate_resources(snapshot, &mut processed).await;
            result.map_err(|e| e.in_phase(Phase::Resources, Some(snapshot.hub()), processed))?;
        }

        for snapshot in snapshots {
            let hub = snapshot.hub();

            let mut processed = 0;
            let result = self.migrate_tags(snapshot, &mut processed).await;
            result.map_err(|e| e.in_phase(Phase::Tags, Some(hub), processed))?;

            let mut processed = 0;
            let result = self.migrate_resource_files(snapshot, &mut processed).await;
            result.map_err(|e| e.in_phase(Phase::ResourceFiles, Some(hub), processed))?;

            let mut processed = 0;
            let result = self.migrate_source_files(snapshot, &mut processed).await;
            result.map_err(|e| e.in_phase(Phase::SourceFiles, Some(hub), processed))?;

            let mut processed = 0;
            let result = self.migrate_bioc_versions(snapshot, &mut processed).await;
            result.map_err(|e| e.in_phase(Phase::BiocVersions, Some(hub), processed))?;
        }

        self.summary.finished_at = Some(Utc::now());
        info!(
            entities = self.summary.total_entities(),
            resources = self.summary.total_resources(),
            links = self.summary.total_links(),
            total = self.summary.total_created(),
            "Migration complete"
        );
        Ok(self.summary)
    }

    async fn census(&mut self, snapshot: &Snapshot, processed: &mut u64) -> MigrateResult<()> {
        let rows = snapshot.species_counts().await?;
        *processed = rows.len() as u64;
        let invalid = self.census.add(snapshot.hub(), &rows);
        self.quality(snapshot.hub()).invalid_taxonomy_ids += invalid;
        Ok(())
    }
}

/// Migrate an AnnotationHub and an ExperimentHub snapshot into `store`.
pub async fn migrate<S: TargetStore + ?Sized>(
    store: &S,
    annotationhub: &Snapshot,
    experimenthub: &Snapshot,
    options: MigrateOptions,
) -> MigrateResult<MigrationSummary> {
    migrate_snapshots(store, &[annotationhub, experimenthub], options).await
}

/// Migrate any set of hub snapshots, in the given order.
#[tracing::instrument(skip_all, fields(snapshots = snapshots.len()))]
pub async fn migrate_snapshots<S: TargetStore + ?Sized>(
    store: &S,
    snapshots: &[&Snapshot],
    options: MigrateOptions,
) -> MigrateResult<MigrationSummary> {
    Migrator::new(store, options).await?.run(snapshots).await
}
