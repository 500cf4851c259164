//! Static reference rows every target needs before a migration can run

use biochub_common::types::HubCode;

pub struct SeedStatus {
    pub id: i64,
    pub status: &'static str,
    pub is_public: bool,
}

pub struct SeedRelease {
    pub version: &'static str,
    pub release_date: &'static str,
    pub r_version: &'static str,
}

/// Status every resource falls back to when the source gives none.
pub const PUBLIC_STATUS: &str = "Public";

/// Role assigned to users created from maintainer strings.
pub const MAINTAINER_ROLE: &str = "maintainer";

pub const SYSTEM_USER_EMAIL: &str = "system@bioconductor.org";
pub const SYSTEM_USER_NAME: &str = "Bioconductor System";
pub const SYSTEM_USER_ROLE: &str = "admin";

pub const ORGANIZATION_NAME: &str = "Bioconductor";
pub const ORGANIZATION_SHORT_NAME: &str = "bioconductor";
pub const ORGANIZATION_WEBSITE: &str = "https://bioconductor.org";

pub const HUBS: [HubCode; 2] = HubCode::ALL;

/// Lifecycle statuses used by the hubs, with their upstream ids.
pub const STATUSES: &[SeedStatus] = &[
    SeedStatus { id: 1, status: "Public", is_public: true },
    SeedStatus { id: 2, status: "Unreviewed", is_public: false },
    SeedStatus { id: 3, status: "Private", is_public: false },
    SeedStatus { id: 10, status: "Removed from original web location", is_public: false },
    SeedStatus { id: 11, status: "Removed by author request", is_public: false },
    SeedStatus { id: 12, status: "Moved from AnnotationHub to ExperimentHub", is_public: false },
    SeedStatus { id: 13, status: "Replaced by more current version", is_public: false },
    SeedStatus { id: 14, status: "Invalid metadata", is_public: false },
    SeedStatus { id: 15, status: "Did not make review deadline for biocversion", is_public: false },
    SeedStatus { id: 99, status: "Defunct", is_public: false },
];

/// Bioconductor releases that hub records can declare compatibility with.
pub const BIOC_RELEASES: &[SeedRelease] = &[
    SeedRelease { version: "2.12", release_date: "2013-04-04", r_version: "3.0" },
    SeedRelease { version: "2.13", release_date: "2013-10-15", r_version: "3.0" },
    SeedRelease { version: "2.14", release_date: "2014-04-14", r_version: "3.1" },
    SeedRelease { version: "3.0", release_date: "2014-10-14", r_version: "3.1" },
    SeedRelease { version: "3.1", release_date: "2015-04-17", r_version: "3.2" },
    SeedRelease { version: "3.2", release_date: "2015-10-14", r_version: "3.2" },
    SeedRelease { version: "3.3", release_date: "2016-05-04", r_version: "3.3" },
    SeedRelease { version: "3.4", release_date: "2016-10-18", r_version: "3.3" },
    SeedRelease { version: "3.5", release_date: "2017-04-25", r_version: "3.4" },
    SeedRelease { version: "3.6", release_date: "2017-10-31", r_version: "3.4" },
    SeedRelease { version: "3.7", release_date: "2018-05-01", r_version: "3.5" },
    SeedRelease { version: "3.8", release_date: "2018-10-31", r_version: "3.5" },
    SeedRelease { version: "3.9", release_date: "2019-05-03", r_version: "3.6" },
    SeedRelease { version: "3.10", release_date: "2019-10-30", r_version: "3.6" },
    SeedRelease { version: "3.11", release_date: "2020-04-28", r_version: "4.0" },
    SeedRelease { version: "3.12", release_date: "2020-10-28", r_version: "4.0" },
    SeedRelease { version: "3.13", release_date: "2021-05-20", r_version: "4.1" },
    SeedRelease { version: "3.14", release_date: "2021-10-27", r_version: "4.1" },
    SeedRelease { version: "3.15", release_date: "2022-04-27", r_version: "4.2" },
    SeedRelease { version: "3.16", release_date: "2022-11-02", r_version: "4.2" },
    SeedRelease { version: "3.17", release_date: "2023-04-26", r_version: "4.3" },
    SeedRelease { version: "3.18", release_date: "2023-10-25", r_version: "4.3" },
    SeedRelease { version: "3.19", release_date: "2024-05-01", r_version: "4.4" },
    SeedRelease { version: "3.20", release_date: "2024-10-30", r_version: "4.4" },
    SeedRelease { version: "3.21", release_date: "2025-04-16", r_version: "4.5" },
];

/// The release flagged `is_current`.
pub const CURRENT_RELEASE: &str = "3.21";

/// Tables reported by `stats`, in dependency order.
pub const STATS_TABLES: &[&str] = &[
    "organizations",
    "users",
    "species",
    "genomes",
    "data_providers",
    "recipes",
    "hubs",
    "resource_statuses",
    "resources",
    "storage_locations",
    "resource_files",
    "source_files",
    "tags",
    "resource_tags",
    "bioc_releases",
    "resource_bioc_versions",
    "audit_log",
];

/// Tables `verify` requires to be queryable.
pub const CORE_TABLES: &[&str] = &["hubs", "resource_statuses", "bioc_releases", "resources"];
