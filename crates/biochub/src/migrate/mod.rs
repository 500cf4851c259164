//! Snapshot to target migration engine
//!
//! Reference entities (species, genomes, providers, users, recipes, storage
//! locations, tags) are deduplicated on natural keys through
//! [`ReferenceCaches`]; resources and their relationship rows are matched by
//! hub accession. Every pass is idempotent, so a re-run against a partially
//! migrated target converges without duplicates.

pub mod cache;
pub mod dates;
pub mod extract;
pub mod maintainer;
pub mod orchestrator;
pub mod relationships;
pub mod resources;
pub mod summary;

pub use cache::{DedupCache, Outcome, ReferenceCaches, Resolved};
pub use maintainer::{parse_maintainer, Maintainer};
pub use orchestrator::{migrate, migrate_snapshots, MigrateOptions, Migrator, TargetLookups};
pub use summary::{DataQuality, HubSummary, MigrationSummary};
