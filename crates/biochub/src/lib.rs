//! Biochub: mirrors the Bioconductor AnnotationHub and ExperimentHub
//! metadata snapshots into a normalized PostgreSQL catalog.
#![deny(clippy::unwrap_used, clippy::expect_used)]

pub mod config;
pub mod db;
pub mod error;
pub mod migrate;
pub mod models;
pub mod snapshot;
pub mod store;

pub use config::Config;
pub use error::{MigrateError, MigrateResult, Phase};
