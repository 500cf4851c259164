//! Reference-entity extraction
//!
//! Candidate building is pure: snapshot rows in, `New*` values out. The
//! passes at the bottom feed candidates through the dedup caches.

use super::cache::ReferenceCaches;
use super::maintainer::parse_maintainer;
use super::orchestrator::Migrator;
use crate::db::seed::MAINTAINER_ROLE;
use crate::error::MigrateResult;
use crate::models::{
    Id, NewDataProvider, NewEntity, NewGenome, NewRecipe, NewSpecies,
    NewStorageLocation, NewTag, NewUser,
};
use crate::snapshot::{GenomePair, Snapshot, SourceLocationPrefix, SourceRecipe, SpeciesCount};
use crate::store::TargetStore;
use biochub_common::types::{EntityKind, HubCode, LocationType};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tracing::{debug, info};

/// Trimmed value, or `None` when nothing is left.
pub fn normalize_key(raw: Option<&str>) -> Option<String> {
    raw.map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Taxonomy ids arrive as text and sometimes as floats (`9606.0`).
pub fn parse_taxonomy_id(raw: &str) -> Option<i64> {
    let raw = raw.trim();
    let digits = match raw.split_once('.') {
        Some((whole, fraction)) if fraction.bytes().all(|b| b == b'0') => whole,
        Some(_) => return None,
        None => raw,
    };
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse::<i64>().ok().filter(|id| *id > 0)
}

pub fn storage_location_name(location_prefix_id: i64) -> String {
    format!("Storage {}", location_prefix_id)
}

/// Species spellings counted across every snapshot of a run, so the
/// canonical name does not depend on snapshot order.
#[derive(Debug, Clone, Default)]
pub struct SpeciesCensus {
    counts: BTreeMap<i64, BTreeMap<String, i64>>,
    by_hub: BTreeMap<HubCode, BTreeSet<i64>>,
}

impl SpeciesCensus {
    /// Add one snapshot's counts. Returns the number of resources whose
    /// taxonomy id could not be parsed.
    pub fn add(&mut self, hub: HubCode, rows: &[SpeciesCount]) -> u64 {
        let mut invalid = 0;
        for row in rows {
            let Some(taxonomy_id) = parse_taxonomy_id(&row.taxonomy_id) else {
                invalid += row.occurrences.max(0) as u64;
                continue;
            };
            let Some(name) = normalize_key(Some(&row.name)) else {
                continue;
            };
            *self
                .counts
                .entry(taxonomy_id)
                .or_default()
                .entry(name)
                .or_default() += row.occurrences;
            self.by_hub.entry(hub).or_default().insert(taxonomy_id);
        }
        invalid
    }

    /// Most frequent spelling; ties go to the lexicographically smallest.
    pub fn canonical_name(&self, taxonomy_id: i64) -> Option<&str> {
        self.counts
            .get(&taxonomy_id)?
            .iter()
            .max_by(|(a_name, a_count), (b_name, b_count)| {
                a_count.cmp(b_count).then_with(|| b_name.cmp(a_name))
            })
            .map(|(name, _)| name.as_str())
    }

    /// Taxonomy ids seen in one hub, ascending.
    pub fn taxonomy_ids(&self, hub: HubCode) -> Vec<i64> {
        self.by_hub
            .get(&hub)
            .map(|ids| ids.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn spellings(&self, taxonomy_id: i64) -> impl Iterator<Item = &str> {
        self.counts
            .get(&taxonomy_id)
            .into_iter()
            .flat_map(|names| names.keys().map(String::as_str))
    }

    pub fn species_candidate(&self, taxonomy_id: i64) -> Option<NewSpecies> {
        self.canonical_name(taxonomy_id).map(|name| NewSpecies {
            scientific_name: name.to_string(),
            taxonomy_id,
        })
    }
}

/// Genome candidates whose species resolves. Also returns how many pairs
/// were dropped for an unknown species.
pub fn genome_candidates(pairs: &[GenomePair], caches: &ReferenceCaches) -> (Vec<NewGenome>, u64) {
    let mut candidates = BTreeSet::new();
    let mut unresolved = 0;

    for pair in pairs {
        let Some(build) = normalize_key(Some(&pair.genome)) else {
            continue;
        };
        let taxonomy_id = pair.taxonomy_id.as_deref().and_then(parse_taxonomy_id);
        match caches.resolve_species(taxonomy_id, pair.species.as_deref()) {
            Some(species_id) => {
                candidates.insert((species_id, build));
            },
            None => unresolved += 1,
        }
    }

    let genomes = candidates
        .into_iter()
        .map(|(species_id, genome_build)| NewGenome {
            species_id,
            genome_build,
        })
        .collect();
    (genomes, unresolved)
}

/// Distinct normalized values, sorted.
fn distinct(values: &[String]) -> BTreeSet<String> {
    values
        .iter()
        .filter_map(|v| normalize_key(Some(v)))
        .collect()
}

pub fn provider_candidates(values: &[String]) -> Vec<NewDataProvider> {
    distinct(values)
        .into_iter()
        .map(|name| NewDataProvider { name })
        .collect()
}

pub fn tag_candidates(values: &[String]) -> Vec<NewTag> {
    distinct(values).into_iter().map(|tag| NewTag { tag }).collect()
}

/// One user per distinct email; the first named spelling supplies the full
/// name. Returns the number of maintainer strings without an email.
pub fn user_candidates(maintainers: &[String]) -> (Vec<NewUser>, u64) {
    let mut users: BTreeMap<String, Option<String>> = BTreeMap::new();
    let mut without_email = 0;

    for raw in maintainers {
        let parsed = parse_maintainer(Some(raw));
        match parsed.email {
            Some(email) => {
                let name = users.entry(email).or_default();
                if name.is_none() {
                    *name = parsed.name;
                }
            },
            None => without_email += 1,
        }
    }

    let users = users
        .into_iter()
        .map(|(email, full_name)| NewUser {
            email,
            full_name,
            role: MAINTAINER_ROLE.to_string(),
        })
        .collect();
    (users, without_email)
}

/// Recipes from the `recipes` table, tagged with their source row id, then
/// one recipe per distinct preparer class.
pub fn recipe_candidates(
    recipes: &[SourceRecipe],
    preparer_classes: &[String],
) -> Vec<(Option<i64>, NewRecipe)> {
    let from_table = recipes.iter().filter_map(|row| {
        normalize_key(row.recipe.as_deref()).map(|name| {
            (
                Some(row.id),
                NewRecipe {
                    name,
                    package_name: normalize_key(row.package.as_deref()),
                    preparer_class: None,
                },
            )
        })
    });

    let from_preparers = distinct(preparer_classes).into_iter().map(|name| {
        (
            None,
            NewRecipe {
                preparer_class: Some(name.clone()),
                name,
                package_name: None,
            },
        )
    });

    from_table.chain(from_preparers).collect()
}

/// Storage locations keyed by source prefix id. Also returns the number of
/// prefixes with no URL.
pub fn storage_candidates(prefixes: &[SourceLocationPrefix]) -> (Vec<(i64, NewStorageLocation)>, u64) {
    let mut locations = Vec::with_capacity(prefixes.len());
    let mut empty = 0;

    for prefix in prefixes {
        match normalize_key(prefix.location_prefix.as_deref()) {
            Some(base_url) => locations.push((
                prefix.id,
                NewStorageLocation {
                    name: storage_location_name(prefix.id),
                    location_type: LocationType::classify(&base_url),
                    base_url,
                },
            )),
            None => empty += 1,
        }
    }

    (locations, empty)
}

/// Source id maps produced by extraction, used by later passes of the same hub.
#[derive(Debug, Clone, Default)]
pub struct HubLinks {
    /// `recipes.id` to target recipe id
    pub recipe_ids: HashMap<i64, Id>,
    /// `location_prefixes.id` to target storage location id
    pub location_ids: HashMap<i64, Id>,
}

impl<S: TargetStore + ?Sized> Migrator<'_, S> {
    /// Run one extraction pass for `kind` over `snapshot`.
    #[tracing::instrument(skip_all, fields(hub = %snapshot.hub(), kind = %kind))]
    pub(super) async fn extract(
        &mut self,
        snapshot: &Snapshot,
        kind: EntityKind,
        processed: &mut u64,
    ) -> MigrateResult<()> {
        let before = self.summary.created_of(kind);

        match kind {
            EntityKind::Species => self.extract_species(snapshot, processed).await?,
            EntityKind::Genome => self.extract_genomes(snapshot, processed).await?,
            EntityKind::DataProvider => {
                let values = snapshot.distinct_providers().await?;
                for provider in provider_candidates(&values) {
                    *processed += 1;
                    self.create(NewEntity::DataProvider(provider)).await?;
                }
            },
            EntityKind::User => {
                let values = snapshot.distinct_maintainers().await?;
                let (users, without_email) = user_candidates(&values);
                self.quality(snapshot.hub()).maintainers_without_email += without_email;
                for user in users {
                    *processed += 1;
                    self.create(NewEntity::User(user)).await?;
                }
            },
            EntityKind::Recipe => self.extract_recipes(snapshot, processed).await?,
            EntityKind::StorageLocation => self.extract_storage(snapshot, processed).await?,
            EntityKind::Tag => {
                let values = snapshot.distinct_tags().await?;
                for tag in tag_candidates(&values) {
                    *processed += 1;
                    self.create(NewEntity::Tag(tag)).await?;
                }
            },
        }

        info!(
            created = self.summary.created_of(kind) - before,
            total = self.caches.len(kind),
            "Extracted {}",
            kind.table()
        );
        Ok(())
    }

    async fn extract_species(&mut self, snapshot: &Snapshot, processed: &mut u64) -> MigrateResult<()> {
        for taxonomy_id in self.census.taxonomy_ids(snapshot.hub()) {
            let Some(species) = self.census.species_candidate(taxonomy_id) else {
                continue;
            };
            *processed += 1;
            let resolved = self.create(NewEntity::Species(species)).await?;

            let spellings: Vec<String> =
                self.census.spellings(taxonomy_id).map(str::to_string).collect();
            for name in spellings {
                self.caches.add_species_alias(&name, resolved.id);
            }
        }
        Ok(())
    }

    async fn extract_genomes(&mut self, snapshot: &Snapshot, processed: &mut u64) -> MigrateResult<()> {
        let pairs = snapshot.genome_pairs().await?;
        let (genomes, unresolved) = genome_candidates(&pairs, &self.caches);
        if unresolved > 0 {
            debug!(unresolved, "Genome pairs with unknown species");
        }
        self.quality(snapshot.hub()).unresolved_genome_species += unresolved;

        for genome in genomes {
            *processed += 1;
            self.create(NewEntity::Genome(genome)).await?;
        }
        Ok(())
    }

    async fn extract_recipes(&mut self, snapshot: &Snapshot, processed: &mut u64) -> MigrateResult<()> {
        let recipes = snapshot.recipes().await?;
        let preparers = snapshot.distinct_preparer_classes().await?;
        let mut recipe_ids = HashMap::new();

        for (source_id, recipe) in recipe_candidates(&recipes, &preparers) {
            *processed += 1;
            let resolved = self.create(NewEntity::Recipe(recipe)).await?;
            if let Some(source_id) = source_id {
                recipe_ids.insert(source_id, resolved.id);
            }
        }

        self.links.entry(snapshot.hub()).or_default().recipe_ids = recipe_ids;
        Ok(())
    }

    async fn extract_storage(&mut self, snapshot: &Snapshot, processed: &mut u64) -> MigrateResult<()> {
        let prefixes = snapshot.location_prefixes().await?;
        let (locations, empty) = storage_candidates(&prefixes);
        self.quality(snapshot.hub()).empty_location_prefixes += empty;

        let mut location_ids = HashMap::new();
        for (source_id, location) in locations {
            *processed += 1;
            let resolved = self.create(NewEntity::StorageLocation(location)).await?;
            location_ids.insert(source_id, resolved.id);
        }

        self.links.entry(snapshot.hub()).or_default().location_ids = location_ids;
        Ok(())
    }
}
