//! Migration errors

use crate::db::DbError;
use crate::snapshot::SnapshotError;
use biochub_common::types::{EntityKind, HubCode};
use std::fmt;
use thiserror::Error;

/// Step of a migration run, used to report where a failure happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    LoadCaches,
    Census,
    Extract(EntityKind),
    Resources,
    Tags,
    ResourceFiles,
    SourceFiles,
    BiocVersions,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::LoadCaches => f.write_str("load caches"),
            Phase::Census => f.write_str("species census"),
            Phase::Extract(kind) => write!(f, "extract {}", kind),
            Phase::Resources => f.write_str("resources"),
            Phase::Tags => f.write_str("resource tags"),
            Phase::ResourceFiles => f.write_str("resource files"),
            Phase::SourceFiles => f.write_str("source files"),
            Phase::BiocVersions => f.write_str("bioc versions"),
        }
    }
}

/// Where a migration stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhaseContext {
    pub phase: Phase,
    pub hub: Option<HubCode>,
    /// Rows the phase had processed before the failure
    pub processed: u64,
}

impl fmt::Display for PhaseContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.hub {
            Some(hub) => write!(
                f,
                "{} phase for {} after {} rows",
                self.phase, hub, self.processed
            ),
            None => write!(f, "{} phase after {} rows", self.phase, self.processed),
        }
    }
}

#[derive(Error, Debug)]
pub enum MigrateError {
    #[error(transparent)]
    Store(#[from] DbError),

    #[error(transparent)]
    Snapshot(#[from] SnapshotError),

    /// Target is missing a row the migration cannot run without
    #[error("Missing reference data in target: {0}. Run `biochub init-db` first.")]
    MissingReference(String),

    #[error("Migration failed in {context}: {source}")]
    Failed {
        context: PhaseContext,
        #[source]
        source: Box<MigrateError>,
    },
}

impl MigrateError {
    pub fn missing_reference(message: impl Into<String>) -> Self {
        Self::MissingReference(message.into())
    }

    /// Attach phase context. Errors that already carry context are kept as is.
    pub fn in_phase(self, phase: Phase, hub: Option<HubCode>, processed: u64) -> Self {
        match self {
            failed @ MigrateError::Failed { .. } => failed,
            other => MigrateError::Failed {
                context: PhaseContext {
                    phase,
                    hub,
                    processed,
                },
                source: Box::new(other),
            },
        }
    }

    pub fn context(&self) -> Option<&PhaseContext> {
        match self {
            MigrateError::Failed { context, .. } => Some(context),
            _ => None,
        }
    }

    /// Innermost error, below any phase context.
    pub fn root(&self) -> &MigrateError {
        match self {
            MigrateError::Failed { source, .. } => source.root(),
            other => other,
        }
    }

    pub fn is_duplicate(&self) -> bool {
        matches!(self.root(), MigrateError::Store(e) if e.is_duplicate())
    }
}

pub type MigrateResult<T> = Result<T, MigrateError>;
