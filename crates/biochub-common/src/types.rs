//! Domain enums shared between the migration engine and the CLI

use crate::error::BiochubError;
use serde::{Deserialize, Serialize};

/// One of the two Bioconductor metadata hubs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum HubCode {
    #[serde(rename = "AH")]
    AnnotationHub,
    #[serde(rename = "EH")]
    ExperimentHub,
}

impl HubCode {
    pub const ALL: [HubCode; 2] = [HubCode::AnnotationHub, HubCode::ExperimentHub];

    /// Short code stored in `hubs.code` and used as accession prefix.
    pub fn code(self) -> &'static str {
        match self {
            HubCode::AnnotationHub => "AH",
            HubCode::ExperimentHub => "EH",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            HubCode::AnnotationHub => "AnnotationHub",
            HubCode::ExperimentHub => "ExperimentHub",
        }
    }

    /// File name of the published metadata snapshot.
    pub fn snapshot_file_name(self) -> &'static str {
        match self {
            HubCode::AnnotationHub => "annotationhub.sqlite3",
            HubCode::ExperimentHub => "experimenthub.sqlite3",
        }
    }

    pub fn default_snapshot_url(self) -> &'static str {
        match self {
            HubCode::AnnotationHub => {
                "https://annotationhub.bioconductor.org/metadata/annotationhub.sqlite3"
            },
            HubCode::ExperimentHub => {
                "https://experimenthub.bioconductor.org/metadata/experimenthub.sqlite3"
            },
        }
    }
}

impl std::fmt::Display for HubCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

impl std::str::FromStr for HubCode {
    type Err = BiochubError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "ah" | "annotationhub" => Ok(HubCode::AnnotationHub),
            "eh" | "experimenthub" => Ok(HubCode::ExperimentHub),
            _ => Err(BiochubError::UnknownHub(s.to_string())),
        }
    }
}

/// Access scheme of a storage location, derived from its URL prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LocationType {
    #[default]
    Local,
    Http,
    Ftp,
    S3,
}

impl LocationType {
    /// Classify a location prefix by scheme. Anything unrecognised is local.
    pub fn classify(prefix: &str) -> Self {
        let lower = prefix.trim_start().to_ascii_lowercase();
        if lower.starts_with("http://") || lower.starts_with("https://") {
            LocationType::Http
        } else if lower.starts_with("ftp://") {
            LocationType::Ftp
        } else if lower.starts_with("s3://") {
            LocationType::S3
        } else {
            LocationType::Local
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            LocationType::Local => "local",
            LocationType::Http => "http",
            LocationType::Ftp => "ftp",
            LocationType::S3 => "s3",
        }
    }
}

impl std::fmt::Display for LocationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for LocationType {
    type Err = BiochubError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "local" => Ok(LocationType::Local),
            "http" => Ok(LocationType::Http),
            "ftp" => Ok(LocationType::Ftp),
            "s3" => Ok(LocationType::S3),
            other => Err(BiochubError::UnknownLocationType(other.to_string())),
        }
    }
}

/// Reference entity kinds that are deduplicated during a migration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Species,
    Genome,
    DataProvider,
    User,
    Recipe,
    StorageLocation,
    Tag,
}

impl EntityKind {
    /// Extraction order. Genomes depend on species, everything else is free.
    pub const EXTRACTION_ORDER: [EntityKind; 7] = [
        EntityKind::Species,
        EntityKind::Genome,
        EntityKind::DataProvider,
        EntityKind::User,
        EntityKind::Recipe,
        EntityKind::StorageLocation,
        EntityKind::Tag,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            EntityKind::Species => "species",
            EntityKind::Genome => "genome",
            EntityKind::DataProvider => "data_provider",
            EntityKind::User => "user",
            EntityKind::Recipe => "recipe",
            EntityKind::StorageLocation => "storage_location",
            EntityKind::Tag => "tag",
        }
    }

    /// Target table holding this kind.
    pub fn table(self) -> &'static str {
        match self {
            EntityKind::Species => "species",
            EntityKind::Genome => "genomes",
            EntityKind::DataProvider => "data_providers",
            EntityKind::User => "users",
            EntityKind::Recipe => "recipes",
            EntityKind::StorageLocation => "storage_locations",
            EntityKind::Tag => "tags",
        }
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for EntityKind {
    type Err = BiochubError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EntityKind::EXTRACTION_ORDER
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| BiochubError::UnknownEntityKind(s.to_string()))
    }
}
