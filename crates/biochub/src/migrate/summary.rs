//! Migration run summary

use biochub_common::types::{EntityKind, HubCode};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

/// Source defects that were recovered from instead of aborting the run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DataQuality {
    /// Species rows whose taxonomy id is not a positive integer
    pub invalid_taxonomy_ids: u64,
    /// Genome pairs whose species could not be resolved
    pub unresolved_genome_species: u64,
    pub maintainers_without_email: u64,
    /// Location prefixes with an empty URL
    pub empty_location_prefixes: u64,
    pub empty_accessions: u64,
    pub duplicate_accessions: u64,
    /// Resources skipped because the target already holds them
    pub existing_resources: u64,
    pub missing_titles: u64,
    pub malformed_dates: u64,
    pub status_fallbacks: u64,
    /// `recipe_id` values with no matching `recipes` row
    pub unresolved_recipe_ids: u64,
    /// Satellite rows whose resource is missing from the snapshot or target
    pub orphan_links: u64,
    pub unknown_tags: u64,
    pub unknown_bioc_releases: u64,
    pub empty_file_paths: u64,
    pub empty_source_urls: u64,
}

impl DataQuality {
    pub fn merge(&mut self, other: &DataQuality) {
        self.invalid_taxonomy_ids += other.invalid_taxonomy_ids;
        self.unresolved_genome_species += other.unresolved_genome_species;
        self.maintainers_without_email += other.maintainers_without_email;
        self.empty_location_prefixes += other.empty_location_prefixes;
        self.empty_accessions += other.empty_accessions;
        self.duplicate_accessions += other.duplicate_accessions;
        self.existing_resources += other.existing_resources;
        self.missing_titles += other.missing_titles;
        self.malformed_dates += other.malformed_dates;
        self.status_fallbacks += other.status_fallbacks;
        self.unresolved_recipe_ids += other.unresolved_recipe_ids;
        self.orphan_links += other.orphan_links;
        self.unknown_tags += other.unknown_tags;
        self.unknown_bioc_releases += other.unknown_bioc_releases;
        self.empty_file_paths += other.empty_file_paths;
        self.empty_source_urls += other.empty_source_urls;
    }

    pub fn is_clean(&self) -> bool {
        *self == DataQuality::default()
    }
}

/// Rows written for one hub.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct HubSummary {
    pub source_resources: u64,
    pub resources: u64,
    pub resource_tags: u64,
    pub resource_files: u64,
    pub source_files: u64,
    pub bioc_versions: u64,
    pub quality: DataQuality,
}

impl HubSummary {
    pub fn links(&self) -> u64 {
        self.resource_tags + self.resource_files + self.source_files + self.bioc_versions
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MigrationSummary {
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub dry_run: bool,
    /// Reference entities created by this run, per kind
    pub created: BTreeMap<EntityKind, u64>,
    pub hubs: BTreeMap<HubCode, HubSummary>,
}

impl MigrationSummary {
    pub fn new(started_at: DateTime<Utc>) -> Self {
        Self {
            started_at,
            finished_at: None,
            dry_run: false,
            created: EntityKind::EXTRACTION_ORDER
                .into_iter()
                .map(|kind| (kind, 0))
                .collect(),
            hubs: BTreeMap::new(),
        }
    }

    pub fn record_created(&mut self, kind: EntityKind) {
        *self.created.entry(kind).or_default() += 1;
    }

    pub fn created_of(&self, kind: EntityKind) -> u64 {
        self.created.get(&kind).copied().unwrap_or(0)
    }

    pub fn hub_mut(&mut self, hub: HubCode) -> &mut HubSummary {
        self.hubs.entry(hub).or_default()
    }

    pub fn total_entities(&self) -> u64 {
        self.created.values().sum()
    }

    pub fn total_resources(&self) -> u64 {
        self.hubs.values().map(|h| h.resources).sum()
    }

    pub fn total_links(&self) -> u64 {
        self.hubs.values().map(HubSummary::links).sum()
    }

    /// Every row this run inserted.
    pub fn total_created(&self) -> u64 {
        self.total_entities() + self.total_resources() + self.total_links()
    }

    pub fn quality(&self) -> DataQuality {
        let mut total = DataQuality::default();
        for hub in self.hubs.values() {
            total.merge(&hub.quality);
        }
        total
    }

    pub fn elapsed_secs(&self) -> Option<f64> {
        self.finished_at
            .map(|end| (end - self.started_at).num_milliseconds() as f64 / 1000.0)
    }
}

impl fmt::Display for MigrationSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Reference entities created:")?;
        for (kind, count) in &self.created {
            writeln!(f, "  {:<18} {:>10}", kind.as_str(), count)?;
        }

        for (hub, summary) in &self.hubs {
            writeln!(f, "{} ({}):", hub.display_name(), hub)?;
            writeln!(f, "  {:<18} {:>10}", "source rows", summary.source_resources)?;
            writeln!(f, "  {:<18} {:>10}", "resources", summary.resources)?;
            writeln!(f, "  {:<18} {:>10}", "resource tags", summary.resource_tags)?;
            writeln!(f, "  {:<18} {:>10}", "resource files", summary.resource_files)?;
            writeln!(f, "  {:<18} {:>10}", "source files", summary.source_files)?;
            writeln!(f, "  {:<18} {:>10}", "bioc versions", summary.bioc_versions)?;
        }

        let quality = self.quality();
        if !quality.is_clean() {
            writeln!(f, "Data quality:")?;
            if let Ok(serde_json::Value::Object(fields)) = serde_json::to_value(&quality) {
                for (name, value) in fields {
                    if value.as_u64().unwrap_or(0) > 0 {
                        writeln!(f, "  {:<26} {:>10}", name, value)?;
                    }
                }
            }
        }

        write!(f, "Total rows created: {}", self.total_created())?;
        if let Some(secs) = self.elapsed_secs() {
            write!(f, " in {:.1}s", secs)?;
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_quality_merges_across_hubs() {
        let mut summary = MigrationSummary::new(Utc::now());
        summary.hub_mut(HubCode::AnnotationHub).quality.orphan_links = 2;
        summary.hub_mut(HubCode::ExperimentHub).quality.orphan_links = 3;
        summary.hub_mut(HubCode::ExperimentHub).quality.status_fallbacks = 1;

        let quality = summary.quality();
        assert_eq!(quality.orphan_links, 5);
        assert_eq!(quality.status_fallbacks, 1);
        assert!(!quality.is_clean());
    }

    #[test]
    fn test_totals() {
        let mut summary = MigrationSummary::new(Utc::now());
        summary.record_created(EntityKind::Species);
        summary.record_created(EntityKind::Tag);
        let hub = summary.hub_mut(HubCode::AnnotationHub);
        hub.resources = 4;
        hub.resource_tags = 3;
        hub.bioc_versions = 1;

        assert_eq!(summary.total_entities(), 2);
        assert_eq!(summary.total_links(), 4);
        assert_eq!(summary.total_created(), 10);
    }

    #[test]
    fn test_summary_serializes_kinds_as_keys() {
        let mut summary = MigrationSummary::new(Utc::now());
        summary.record_created(EntityKind::DataProvider);
        summary.hub_mut(HubCode::ExperimentHub);

        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["created"]["data_provider"], 1);
        assert!(json["hubs"]["EH"].is_object());
    }
}
