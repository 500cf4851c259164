//! Resource rows
//!
//! [`ResourceMapper`] turns one flat source row into a [`NewResource`] using
//! only in-memory lookups; the batched pass handles skipping and inserts.

use super::cache::ReferenceCaches;
use super::dates::{parse_flag, DateField};
use super::extract::{normalize_key, parse_taxonomy_id, HubLinks};
use super::maintainer::parse_maintainer;
use super::orchestrator::{Migrator, TargetLookups};
use super::summary::DataQuality;
use crate::error::MigrateResult;
use crate::models::{Id, NewResource};
use crate::snapshot::{Snapshot, SourceResource};
use crate::store::TargetStore;
use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use std::collections::{HashMap, HashSet};
use tracing::{debug, info};

/// Resolves the references of source resource rows for one hub.
pub struct ResourceMapper<'a> {
    pub hub_id: Id,
    pub caches: &'a ReferenceCaches,
    pub lookups: &'a TargetLookups,
    pub links: &'a HubLinks,
    /// Source `statuses` table
    pub source_statuses: &'a HashMap<i64, String>,
    pub reference_time: DateTime<Utc>,
}

impl ResourceMapper<'_> {
    /// Build the normalized row. `None` only for rows without an accession.
    pub fn map(&self, row: &SourceResource, quality: &mut DataQuality) -> Option<NewResource> {
        let accession = normalize_key(row.accession.as_deref())?;

        let title = normalize_key(row.title.as_deref()).unwrap_or_else(|| {
            quality.missing_titles += 1;
            accession.clone()
        });

        let taxonomy_id = row.taxonomy_id.as_deref().and_then(parse_taxonomy_id);
        let species_id = self
            .caches
            .resolve_species(taxonomy_id, row.species.as_deref());
        let genome_id = species_id.zip(normalize_key(row.genome.as_deref())).and_then(
            |(species_id, build)| self.caches.genome_id(species_id, &build),
        );

        let data_provider_id = normalize_key(row.data_provider.as_deref())
            .and_then(|name| self.caches.provider_id(&name));

        let maintainer_id = parse_maintainer(row.maintainer.as_deref())
            .email
            .and_then(|email| self.caches.user_id(&email));

        let added = DateField::read(row.date_added.as_deref());
        let removed = DateField::read(row.date_removed.as_deref());
        quality.malformed_dates += u64::from(added.is_malformed()) + u64::from(removed.is_malformed());
        let created_at = added.value().unwrap_or(self.reference_time);

        Some(NewResource {
            hub_id: self.hub_id,
            title,
            description: normalize_key(row.description.as_deref()),
            species_id,
            genome_id,
            coordinate_1_based: row.coordinate_1_based.as_deref().and_then(parse_flag),
            data_provider_id,
            recipe_id: self.recipe_id(row, &accession, quality),
            maintainer_id,
            status_id: self.status_id(row.status_id, quality),
            created_at,
            valid_from: created_at,
            valid_to: None,
            version_number: 1,
            deleted_at: removed.value(),
            hub_accession: accession,
        })
    }

    fn recipe_id(&self, row: &SourceResource, accession: &str, quality: &mut DataQuality) -> Option<Id> {
        if let Some(source_id) = row.recipe_id {
            if let Some(id) = self.links.recipe_ids.get(&source_id) {
                return Some(*id);
            }
            quality.unresolved_recipe_ids += 1;
            debug!(accession, recipe_id = source_id, "recipe_id has no recipes row");
        }

        normalize_key(row.preparer_class.as_deref()).and_then(|name| self.caches.recipe_id(&name))
    }

    fn status_id(&self, source_status: Option<i64>, quality: &mut DataQuality) -> Id {
        let resolved = source_status
            .and_then(|id| self.source_statuses.get(&id))
            .and_then(|name| self.lookups.status_id(name));

        resolved.unwrap_or_else(|| {
            quality.status_fallbacks += 1;
            self.lookups.public_status
        })
    }
}

impl<S: TargetStore + ?Sized> Migrator<'_, S> {
    /// Stream every resource of `snapshot` into the target.
    #[tracing::instrument(skip_all, fields(hub = %snapshot.hub()))]
    pub(super) async fn migrate_resources(
        &mut self,
        snapshot: &Snapshot,
        processed: &mut u64,
    ) -> MigrateResult<()> {
        let hub = snapshot.hub();
        let hub_id = self.lookups.hub_id(hub)?;
        let batch_size = self.options.batch_size.max(1);

        let source_statuses = snapshot.statuses().await?;
        let mut index = self.store.resource_index(hub_id).await?;
        let existing = index.len();
        let links = self.links.remove(&hub).unwrap_or_default();

        let mut quality = DataQuality::default();
        let mut seen: HashSet<String> = HashSet::new();
        let mut batch: Vec<NewResource> = Vec::with_capacity(batch_size);
        let mut inserted = 0u64;

        let mapper = ResourceMapper {
            hub_id,
            caches: &self.caches,
            lookups: &self.lookups,
            links: &links,
            source_statuses: &source_statuses,
            reference_time: self.options.reference_time,
        };

        let mut rows = snapshot.resources();
        while let Some(row) = rows.try_next().await? {
            *processed += 1;

            let Some(accession) = normalize_key(row.accession.as_deref()) else {
                quality.empty_accessions += 1;
                continue;
            };
            if !seen.insert(accession.clone()) {
                quality.duplicate_accessions += 1;
                continue;
            }
            if index.contains_key(&accession) {
                quality.existing_resources += 1;
                continue;
            }

            if let Some(resource) = mapper.map(&row, &mut quality) {
                batch.push(resource);
            }

            if batch.len() >= batch_size {
                inserted += flush(self.store, &mut batch, &mut index).await?;
                debug!(inserted, processed = *processed, "Flushed resource batch");
            }
        }
        inserted += flush(self.store, &mut batch, &mut index).await?;

        info!(
            source = *processed,
            created = inserted,
            existing,
            "Migrated resources"
        );

        self.links.insert(hub, links);
        self.indexes.insert(hub, index);
        let summary = self.summary.hub_mut(hub);
        summary.source_resources += *processed;
        summary.resources += inserted;
        summary.quality.merge(&quality);
        Ok(())
    }
}

async fn flush<S: TargetStore + ?Sized>(
    store: &S,
    batch: &mut Vec<NewResource>,
    index: &mut HashMap<String, Id>,
) -> MigrateResult<u64> {
    if batch.is_empty() {
        return Ok(0);
    }
    let rows = store.insert_resources(batch).await?;
    let inserted = rows.len() as u64;
    index.extend(rows);
    batch.clear();
    Ok(inserted)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn lookups() -> TargetLookups {
        TargetLookups {
            hubs: HashMap::new(),
            statuses: [("public".to_string(), 1), ("removed by author request".to_string(), 11)]
                .into_iter()
                .collect(),
            public_status: 1,
            releases: HashMap::new(),
        }
    }

    fn row(accession: Option<&str>) -> SourceResource {
        SourceResource {
            id: 1,
            accession: accession.map(str::to_string),
            title: None,
            description: Some("  ".to_string()),
            species: Some("Homo sapiens".to_string()),
            taxonomy_id: Some("9606".to_string()),
            genome: Some("hg38".to_string()),
            coordinate_1_based: Some("1".to_string()),
            data_provider: Some("UCSC".to_string()),
            maintainer: Some("Jane Doe <jane@x.org>".to_string()),
            status_id: Some(2),
            location_prefix_id: None,
            recipe_id: Some(99),
            date_added: Some("2016-05-01".to_string()),
            date_removed: Some("garbage".to_string()),
            preparer_class: Some("UCSCTrackImportPreparer".to_string()),
        }
    }

    #[test]
    fn test_mapper_resolves_and_falls_back() {
        let mut caches = ReferenceCaches::new();
        caches.add_species_alias("Homo sapiens", 10);

        let lookups = lookups();
        let links = HubLinks::default();
        let statuses: HashMap<i64, String> = [(2, "Removed by author request".to_string())]
            .into_iter()
            .collect();
        let reference_time = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let mapper = ResourceMapper {
            hub_id: 1,
            caches: &caches,
            lookups: &lookups,
            links: &links,
            source_statuses: &statuses,
            reference_time,
        };

        let mut quality = DataQuality::default();
        let resource = mapper.map(&row(Some(" AH5012 ")), &mut quality).unwrap();

        assert_eq!(resource.hub_accession, "AH5012");
        assert_eq!(resource.title, "AH5012");
        assert_eq!(resource.description, None);
        assert_eq!(resource.species_id, Some(10));
        assert_eq!(resource.genome_id, None);
        assert_eq!(resource.coordinate_1_based, Some(true));
        assert_eq!(resource.status_id, 11);
        assert_eq!(resource.recipe_id, None);
        assert_eq!(
            resource.created_at,
            Utc.with_ymd_and_hms(2016, 5, 1, 0, 0, 0).unwrap()
        );
        assert_eq!(resource.valid_from, resource.created_at);
        assert_eq!(resource.deleted_at, None);
        assert_eq!(resource.version_number, 1);

        assert_eq!(quality.missing_titles, 1);
        assert_eq!(quality.unresolved_recipe_ids, 1);
        assert_eq!(quality.malformed_dates, 1);
        assert_eq!(quality.status_fallbacks, 0);
    }

    #[test]
    fn test_mapper_defaults_status_and_dates() {
        let caches = ReferenceCaches::new();
        let lookups = lookups();
        let links = HubLinks::default();
        let statuses = HashMap::new();
        let reference_time = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let mapper = ResourceMapper {
            hub_id: 2,
            caches: &caches,
            lookups: &lookups,
            links: &links,
            source_statuses: &statuses,
            reference_time,
        };

        let mut source = row(Some("EH1"));
        source.date_added = None;
        source.date_removed = None;
        source.recipe_id = None;

        let mut quality = DataQuality::default();
        let resource = mapper.map(&source, &mut quality).unwrap();
        assert_eq!(resource.status_id, 1);
        assert_eq!(resource.created_at, reference_time);
        assert_eq!(quality.status_fallbacks, 1);
        assert_eq!(quality.unresolved_recipe_ids, 0);
        assert_eq!(quality.malformed_dates, 0);

        assert!(mapper.map(&row(Some("  ")), &mut quality).is_none());
        assert!(mapper.map(&row(None), &mut quality).is_none());
    }
}
