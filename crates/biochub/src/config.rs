//! Configuration management

use biochub_common::types::HubCode;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

// ============================================================================
// Configuration Constants
// ============================================================================

/// Default database URL for local development.
pub const DEFAULT_DATABASE_URL: &str = "postgresql://localhost/biochub";

/// Default maximum database connections in the pool.
pub const DEFAULT_DATABASE_MAX_CONNECTIONS: u32 = 5;

/// Default minimum database connections in the pool.
pub const DEFAULT_DATABASE_MIN_CONNECTIONS: u32 = 1;

/// Default database connection timeout in seconds.
pub const DEFAULT_DATABASE_CONNECT_TIMEOUT_SECS: u64 = 10;

/// Default database idle timeout in seconds (10 minutes).
pub const DEFAULT_DATABASE_IDLE_TIMEOUT_SECS: u64 = 600;

/// Default directory holding downloaded snapshots.
pub const DEFAULT_DATA_DIR: &str = "./data";

/// Snapshots younger than this are not downloaded again.
pub const DEFAULT_MAX_SNAPSHOT_AGE_DAYS: u64 = 2;

/// Default HTTP timeout for snapshot downloads (the AnnotationHub file is large).
pub const DEFAULT_DOWNLOAD_TIMEOUT_SECS: u64 = 600;

/// Default download attempts before giving up.
pub const DEFAULT_DOWNLOAD_MAX_RETRIES: u32 = 3;

/// Upper bound accepted for `BIOCHUB_DOWNLOAD_RETRIES`.
pub const MAX_DOWNLOAD_RETRIES: u32 = 10;

/// Default number of resource rows per insert batch.
pub const DEFAULT_BATCH_SIZE: usize = 1000;

/// Default number of relationship rows per insert batch.
pub const DEFAULT_LINK_BATCH_SIZE: usize = 5000;

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    pub database: DatabaseConfig,
    pub snapshots: SnapshotConfig,
    pub migration: MigrationConfig,
}

/// Target database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub connect_timeout_secs: u64,
    pub idle_timeout_secs: u64,
}

/// Where snapshots live and where they come from
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotConfig {
    pub data_dir: PathBuf,
    pub annotationhub_url: String,
    pub experimenthub_url: String,
    pub max_age_days: u64,
    pub timeout_secs: u64,
    pub max_retries: u32,
}

/// Migration tunables. Batch sizes only affect throughput.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationConfig {
    pub batch_size: usize,
    pub link_batch_size: usize,
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

impl Config {
    /// Load configuration from `.env`, the environment, and defaults
    pub fn load() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let config = Config {
            database: DatabaseConfig {
                url: std::env::var("DATABASE_URL")
                    .or_else(|_| std::env::var("POSTGRES_URI"))
                    .unwrap_or_else(|_| DEFAULT_DATABASE_URL.to_string()),
                max_connections: env_or("DB_MAX_CONNECTIONS", DEFAULT_DATABASE_MAX_CONNECTIONS),
                min_connections: env_or("DB_MIN_CONNECTIONS", DEFAULT_DATABASE_MIN_CONNECTIONS),
                connect_timeout_secs: env_or(
                    "DB_CONNECT_TIMEOUT",
                    DEFAULT_DATABASE_CONNECT_TIMEOUT_SECS,
                ),
                idle_timeout_secs: env_or("DB_IDLE_TIMEOUT", DEFAULT_DATABASE_IDLE_TIMEOUT_SECS),
            },
            snapshots: SnapshotConfig {
                data_dir: std::env::var("BIOCHUB_DATA_DIR")
                    .map(PathBuf::from)
                    .unwrap_or_else(|_| PathBuf::from(DEFAULT_DATA_DIR)),
                annotationhub_url: std::env::var("BIOCHUB_AH_URL").unwrap_or_else(|_| {
                    HubCode::AnnotationHub.default_snapshot_url().to_string()
                }),
                experimenthub_url: std::env::var("BIOCHUB_EH_URL").unwrap_or_else(|_| {
                    HubCode::ExperimentHub.default_snapshot_url().to_string()
                }),
                max_age_days: env_or("BIOCHUB_MAX_SNAPSHOT_AGE_DAYS", DEFAULT_MAX_SNAPSHOT_AGE_DAYS),
                timeout_secs: env_or("BIOCHUB_DOWNLOAD_TIMEOUT", DEFAULT_DOWNLOAD_TIMEOUT_SECS),
                max_retries: env_or("BIOCHUB_DOWNLOAD_RETRIES", DEFAULT_DOWNLOAD_MAX_RETRIES),
            },
            migration: MigrationConfig {
                batch_size: env_or("BIOCHUB_BATCH_SIZE", DEFAULT_BATCH_SIZE),
                link_batch_size: env_or("BIOCHUB_LINK_BATCH_SIZE", DEFAULT_LINK_BATCH_SIZE),
            },
        };

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.database.url.is_empty() {
            anyhow::bail!("Database URL cannot be empty");
        }

        if self.database.max_connections == 0 {
            anyhow::bail!("Database max_connections must be greater than 0");
        }

        if self.database.min_connections > self.database.max_connections {
            anyhow::bail!(
                "Database min_connections ({}) cannot be greater than max_connections ({})",
                self.database.min_connections,
                self.database.max_connections
            );
        }

        let retries = self.snapshots.max_retries;
        if retries == 0 || retries > MAX_DOWNLOAD_RETRIES {
            anyhow::bail!(
                "Download max_retries must be between 1 and {}, got {}",
                MAX_DOWNLOAD_RETRIES,
                retries
            );
        }

        if self.migration.batch_size == 0 || self.migration.link_batch_size == 0 {
            anyhow::bail!("Batch sizes must be greater than 0");
        }

        Ok(())
    }

    /// Snapshot URL configured for a hub
    pub fn snapshot_url(&self, hub: HubCode) -> &str {
        match hub {
            HubCode::AnnotationHub => &self.snapshots.annotationhub_url,
            HubCode::ExperimentHub => &self.snapshots.experimenthub_url,
        }
    }

    /// Local path of a hub's snapshot inside the data directory
    pub fn snapshot_path(&self, hub: HubCode) -> PathBuf {
        self.snapshots.data_dir.join(hub.snapshot_file_name())
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_DATABASE_URL.to_string(),
            max_connections: DEFAULT_DATABASE_MAX_CONNECTIONS,
            min_connections: DEFAULT_DATABASE_MIN_CONNECTIONS,
            connect_timeout_secs: DEFAULT_DATABASE_CONNECT_TIMEOUT_SECS,
            idle_timeout_secs: DEFAULT_DATABASE_IDLE_TIMEOUT_SECS,
        }
    }
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            annotationhub_url: HubCode::AnnotationHub.default_snapshot_url().to_string(),
            experimenthub_url: HubCode::ExperimentHub.default_snapshot_url().to_string(),
            max_age_days: DEFAULT_MAX_SNAPSHOT_AGE_DAYS,
            timeout_secs: DEFAULT_DOWNLOAD_TIMEOUT_SECS,
            max_retries: DEFAULT_DOWNLOAD_MAX_RETRIES,
        }
    }
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            link_batch_size: DEFAULT_LINK_BATCH_SIZE,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serial_test::serial;

    const VARS: [&str; 6] = [
        "DATABASE_URL",
        "POSTGRES_URI",
        "DB_MAX_CONNECTIONS",
        "BIOCHUB_DATA_DIR",
        "BIOCHUB_BATCH_SIZE",
        "BIOCHUB_AH_URL",
    ];

    fn clear_env() {
        for var in VARS {
            std::env::remove_var(var);
        }
    }

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.migration.batch_size, 1000);
        assert_eq!(config.snapshots.max_age_days, 2);
    }

    #[test]
    #[serial]
    fn test_load_from_env() {
        clear_env();
        std::env::set_var("DATABASE_URL", "postgresql://db.internal/hubs");
        std::env::set_var("DB_MAX_CONNECTIONS", "12");
        std::env::set_var("BIOCHUB_DATA_DIR", "/var/lib/biochub");
        std::env::set_var("BIOCHUB_BATCH_SIZE", "250");

        let config = Config::load().unwrap();
        assert_eq!(config.database.url, "postgresql://db.internal/hubs");
        assert_eq!(config.database.max_connections, 12);
        assert_eq!(config.migration.batch_size, 250);
        assert_eq!(
            config.snapshot_path(HubCode::ExperimentHub),
            PathBuf::from("/var/lib/biochub/experimenthub.sqlite3")
        );

        clear_env();
    }

    #[test]
    #[serial]
    fn test_postgres_uri_fallback() {
        clear_env();
        std::env::set_var("POSTGRES_URI", "postgresql://fallback/hubs");

        let config = Config::load().unwrap();
        assert_eq!(config.database.url, "postgresql://fallback/hubs");

        clear_env();
    }

    #[test]
    #[serial]
    fn test_invalid_numbers_fall_back_to_defaults() {
        clear_env();
        std::env::set_var("BIOCHUB_BATCH_SIZE", "lots");

        let config = Config::load().unwrap();
        assert_eq!(config.migration.batch_size, DEFAULT_BATCH_SIZE);

        clear_env();
    }

    #[test]
    fn test_validate_rejects_zero_batch() {
        let mut config = Config::default();
        config.migration.batch_size = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_bounds_download_retries() {
        let mut config = Config::default();
        config.snapshots.max_retries = 0;
        assert!(config.validate().is_err());
        config.snapshots.max_retries = 40;
        assert!(config.validate().is_err());
        config.snapshots.max_retries = MAX_DOWNLOAD_RETRIES;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_min_over_max() {
        let mut config = Config::default();
        config.database.min_connections = 10;
        config.database.max_connections = 2;
        assert!(config.validate().is_err());
    }
}
