//! Relationship passes: tags, file manifests, source provenance and
//! Bioconductor version links. Rows are matched to migrated resources by
//! accession.

use super::dates::{parse_size, DateField};
use super::extract::normalize_key;
use super::orchestrator::Migrator;
use super::summary::DataQuality;
use crate::error::MigrateResult;
use crate::models::{Id, NewResourceFile, NewSourceFile, ResourceBiocLink, ResourceTagLink};
use crate::snapshot::{Snapshot, SourceFileRow};
use crate::store::TargetStore;
use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use std::collections::HashMap;
use tracing::info;

/// Target id for a satellite row's accession. Orphans are counted.
fn resource_for(
    index: &HashMap<String, Id>,
    accession: Option<&str>,
    quality: &mut DataQuality,
) -> Option<Id> {
    let id = accession
        .map(str::trim)
        .and_then(|accession| index.get(accession))
        .copied();
    if id.is_none() {
        quality.orphan_links += 1;
    }
    id
}

/// Source-file record for an `input_sources` row.
pub fn source_file(
    resource_id: Id,
    row: &SourceFileRow,
    valid_from: DateTime<Utc>,
    quality: &mut DataQuality,
) -> Option<NewSourceFile> {
    let Some(source_url) = normalize_key(row.url.as_deref()) else {
        quality.empty_source_urls += 1;
        return None;
    };

    let last_modified = DateField::read(row.last_modified.as_deref());
    if last_modified.is_malformed() {
        quality.malformed_dates += 1;
    }

    Some(NewSourceFile {
        resource_id,
        source_url,
        source_type: normalize_key(row.source_type.as_deref()),
        source_version: normalize_key(row.version.as_deref()),
        md5_hash: normalize_key(row.md5.as_deref()),
        file_size_bytes: row.size.as_deref().and_then(parse_size),
        last_modified_date: last_modified.value(),
        valid_from,
    })
}

impl<S: TargetStore + ?Sized> Migrator<'_, S> {
    fn resource_index(&mut self, snapshot: &Snapshot) -> HashMap<String, Id> {
        self.indexes.remove(&snapshot.hub()).unwrap_or_default()
    }

    fn finish_pass(&mut self, snapshot: &Snapshot, index: HashMap<String, Id>, quality: &DataQuality) {
        self.indexes.insert(snapshot.hub(), index);
        self.summary.hub_mut(snapshot.hub()).quality.merge(quality);
    }

    #[tracing::instrument(skip_all, fields(hub = %snapshot.hub()))]
    pub(super) async fn migrate_tags(
        &mut self,
        snapshot: &Snapshot,
        processed: &mut u64,
    ) -> MigrateResult<()> {
        let index = self.resource_index(snapshot);
        let batch_size = self.options.link_batch_size.max(1);
        let mut quality = DataQuality::default();
        let mut batch = Vec::with_capacity(batch_size);
        let mut inserted = 0;

        let mut rows = snapshot.tag_rows();
        while let Some(row) = rows.try_next().await? {
            *processed += 1;
            let Some(resource_id) = resource_for(&index, row.accession.as_deref(), &mut quality)
            else {
                continue;
            };
            let Some(tag_id) = normalize_key(row.tag.as_deref()).and_then(|tag| self.caches.tag_id(&tag))
            else {
                quality.unknown_tags += 1;
                continue;
            };

            batch.push(ResourceTagLink { resource_id, tag_id });
            if batch.len() >= batch_size {
                inserted += self.store.insert_resource_tags(&batch).await?;
                batch.clear();
            }
        }
        if !batch.is_empty() {
            inserted += self.store.insert_resource_tags(&batch).await?;
        }

        info!(source = *processed, created = inserted, "Linked resource tags");
        self.summary.hub_mut(snapshot.hub()).resource_tags += inserted;
        self.finish_pass(snapshot, index, &quality);
        Ok(())
    }

    #[tracing::instrument(skip_all, fields(hub = %snapshot.hub()))]
    pub(super) async fn migrate_resource_files(
        &mut self,
        snapshot: &Snapshot,
        processed: &mut u64,
    ) -> MigrateResult<()> {
        let index = self.resource_index(snapshot);
        let location_ids = self
            .links
            .get(&snapshot.hub())
            .map(|links| links.location_ids.clone())
            .unwrap_or_default();
        let batch_size = self.options.link_batch_size.max(1);
        let valid_from = self.options.reference_time;
        let mut quality = DataQuality::default();
        let mut batch = Vec::with_capacity(batch_size);
        let mut inserted = 0;

        let mut rows = snapshot.file_rows();
        while let Some(row) = rows.try_next().await? {
            *processed += 1;
            let Some(resource_id) = resource_for(&index, row.accession.as_deref(), &mut quality)
            else {
                continue;
            };
            let Some(file_path) = normalize_key(row.path.as_deref()) else {
                quality.empty_file_paths += 1;
                continue;
            };

            batch.push(NewResourceFile {
                resource_id,
                storage_location_id: row
                    .location_prefix_id
                    .and_then(|id| location_ids.get(&id).copied()),
                file_path,
                rdata_class: normalize_key(row.rdata_class.as_deref()),
                dispatch_class: normalize_key(row.dispatch_class.as_deref()),
                valid_from,
            });
            if batch.len() >= batch_size {
                inserted += self.store.insert_resource_files(&batch).await?;
                batch.clear();
            }
        }
        if !batch.is_empty() {
            inserted += self.store.insert_resource_files(&batch).await?;
        }

        info!(source = *processed, created = inserted, "Linked resource files");
        self.summary.hub_mut(snapshot.hub()).resource_files += inserted;
        self.finish_pass(snapshot, index, &quality);
        Ok(())
    }

    #[tracing::instrument(skip_all, fields(hub = %snapshot.hub()))]
    pub(super) async fn migrate_source_files(
        &mut self,
        snapshot: &Snapshot,
        processed: &mut u64,
    ) -> MigrateResult<()> {
        let index = self.resource_index(snapshot);
        let batch_size = self.options.link_batch_size.max(1);
        let valid_from = self.options.reference_time;
        let mut quality = DataQuality::default();
        let mut batch = Vec::with_capacity(batch_size);
        let mut inserted = 0;

        let mut rows = snapshot.source_file_rows();
        while let Some(row) = rows.try_next().await? {
            *processed += 1;
            let Some(resource_id) = resource_for(&index, row.accession.as_deref(), &mut quality)
            else {
                continue;
            };
            let Some(file) = source_file(resource_id, &row, valid_from, &mut quality) else {
                continue;
            };

            batch.push(file);
            if batch.len() >= batch_size {
                inserted += self.store.insert_source_files(&batch).await?;
                batch.clear();
            }
        }
        if !batch.is_empty() {
            inserted += self.store.insert_source_files(&batch).await?;
        }

        info!(source = *processed, created = inserted, "Linked source files");
        self.summary.hub_mut(snapshot.hub()).source_files += inserted;
        self.finish_pass(snapshot, index, &quality);
        Ok(())
    }

    #[tracing::instrument(skip_all, fields(hub = %snapshot.hub()))]
    pub(super) async fn migrate_bioc_versions(
        &mut self,
        snapshot: &Snapshot,
        processed: &mut u64,
    ) -> MigrateResult<()> {
        let index = self.resource_index(snapshot);
        let batch_size = self.options.link_batch_size.max(1);
        let mut quality = DataQuality::default();
        let mut batch = Vec::with_capacity(batch_size);
        let mut inserted = 0;

        let mut rows = snapshot.bioc_version_rows();
        while let Some(row) = rows.try_next().await? {
            *processed += 1;
            let Some(resource_id) = resource_for(&index, row.accession.as_deref(), &mut quality)
            else {
                continue;
            };
            let Some(bioc_release_id) = normalize_key(row.version.as_deref())
                .and_then(|version| self.lookups.release_id(&version))
            else {
                quality.unknown_bioc_releases += 1;
                continue;
            };

            batch.push(ResourceBiocLink {
                resource_id,
                bioc_release_id,
            });
            if batch.len() >= batch_size {
                inserted += self.store.insert_resource_bioc_versions(&batch).await?;
                batch.clear();
            }
        }
        if !batch.is_empty() {
            inserted += self.store.insert_resource_bioc_versions(&batch).await?;
        }

        info!(source = *processed, created = inserted, "Linked bioc versions");
        self.summary.hub_mut(snapshot.hub()).bioc_versions += inserted;
        self.finish_pass(snapshot, index, &quality);
        Ok(())
    }
}
