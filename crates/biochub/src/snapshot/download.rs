// Snapshot downloader with freshness caching

use super::{SnapshotError, SnapshotResult};
use crate::config::SnapshotConfig;
use biochub_common::types::HubCode;
use futures::StreamExt;
use reqwest::Client;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tokio::io::AsyncWriteExt;
use tracing::{info, warn};

const SECONDS_PER_DAY: u64 = 24 * 60 * 60;

/// Longest wait between two attempts.
const MAX_BACKOFF: Duration = Duration::from_secs(300);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DownloadStatus {
    /// Local copy was young enough and was kept
    Fresh,
    Downloaded,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DownloadOutcome {
    pub hub: HubCode,
    pub path: PathBuf,
    pub status: DownloadStatus,
    pub bytes: u64,
}

/// Fetches hub snapshots into a data directory.
pub struct SnapshotDownloader {
    client: Client,
    data_dir: PathBuf,
    max_age: Duration,
    max_retries: u32,
    backoff_base: Duration,
}

impl SnapshotDownloader {
    pub fn new(config: &SnapshotConfig) -> SnapshotResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(concat!("biochub/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            data_dir: config.data_dir.clone(),
            max_age: Duration::from_secs(config.max_age_days * SECONDS_PER_DAY),
            max_retries: config.max_retries.max(1),
            backoff_base: Duration::from_secs(1),
        })
    }

    /// Base delay between attempts; doubles after each failure.
    pub fn with_backoff(mut self, base: Duration) -> Self {
        self.backoff_base = base;
        self
    }

    pub fn path_for(&self, hub: HubCode) -> PathBuf {
        self.data_dir.join(hub.snapshot_file_name())
    }

    /// Download the hub snapshot unless a fresh local copy exists.
    pub async fn ensure(&self, hub: HubCode, url: &str) -> SnapshotResult<DownloadOutcome> {
        let path = self.path_for(hub);

        if let Some(bytes) = fresh_size(&path, self.max_age).await {
            info!(hub = %hub, path = %path.display(), "Snapshot is fresh, skipping download");
            return Ok(DownloadOutcome {
                hub,
                path,
                status: DownloadStatus::Fresh,
                bytes,
            });
        }

        self.fetch(hub, url).await
    }

    /// Download the hub snapshot unconditionally.
    pub async fn fetch(&self, hub: HubCode, url: &str) -> SnapshotResult<DownloadOutcome> {
        tokio::fs::create_dir_all(&self.data_dir).await?;
        let path = self.path_for(hub);

        info!(hub = %hub, url, "Downloading snapshot");
        let bytes = self.download_with_retry(url, &path).await?;
        info!(hub = %hub, bytes, mb = bytes / (1024 * 1024), "Snapshot downloaded");

        Ok(DownloadOutcome {
            hub,
            path,
            status: DownloadStatus::Downloaded,
            bytes,
        })
    }

    async fn download_with_retry(&self, url: &str, dest: &Path) -> SnapshotResult<u64> {
        let mut attempt = 1;
        loop {
            match self.download_once(url, dest).await {
                Ok(bytes) => return Ok(bytes),
                Err(e) if attempt < self.max_retries => {
                    let backoff = backoff_delay(self.backoff_base, attempt);
                    warn!(
                        attempt,
                        max_retries = self.max_retries,
                        error = %e,
                        "Download attempt failed, retrying in {:?}",
                        backoff
                    );
                    tokio::time::sleep(backoff).await;
                    attempt += 1;
                },
                Err(e) => return Err(e),
            }
        }
    }

    /// Stream the body into `<dest>.part`, then rename into place so a failed
    /// transfer never replaces a usable snapshot.
    async fn download_once(&self, url: &str, dest: &Path) -> SnapshotResult<u64> {
        let response = self.client.get(url).send().await?;

        if !response.status().is_success() {
            return Err(SnapshotError::Download {
                url: url.to_string(),
                reason: format!("HTTP {}", response.status()),
            });
        }

        let mut partial = dest.as_os_str().to_owned();
        partial.push(".part");
        let partial = PathBuf::from(partial);

        let written = match write_body(response, &partial).await {
            Ok(0) => Err(SnapshotError::Download {
                url: url.to_string(),
                reason: "empty response body".to_string(),
            }),
            other => other,
        };
        let written = match written {
            Ok(written) => written,
            Err(e) => {
                tokio::fs::remove_file(&partial).await.ok();
                return Err(e);
            },
        };

        tokio::fs::rename(&partial, dest).await?;
        Ok(written)
    }
}

async fn write_body(response: reqwest::Response, path: &Path) -> SnapshotResult<u64> {
    let mut file = tokio::fs::File::create(path).await?;
    let mut stream = response.bytes_stream();
    let mut written = 0u64;

    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        file.write_all(&chunk).await?;
        written += chunk.len() as u64;
    }

    file.flush().await?;
    Ok(written)
}

/// Delay after the given failed attempt: `base * 2^(attempt - 1)`, capped.
fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    2u32.checked_pow(attempt.saturating_sub(1))
        .and_then(|factor| base.checked_mul(factor))
        .map_or(MAX_BACKOFF, |delay| delay.min(MAX_BACKOFF))
}

/// Size of `path` when it exists and was modified within `max_age`.
async fn fresh_size(path: &Path, max_age: Duration) -> Option<u64> {
    let metadata = tokio::fs::metadata(path).await.ok()?;
    let modified = metadata.modified().ok()?;
    let age = SystemTime::now().duration_since(modified).unwrap_or_default();
    (age < max_age).then_some(metadata.len())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_file_is_not_fresh() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("annotationhub.sqlite3");
        assert_eq!(fresh_size(&path, Duration::from_secs(3600)).await, None);
    }

    #[tokio::test]
    async fn test_recent_file_is_fresh_until_max_age_zero() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("annotationhub.sqlite3");
        std::fs::write(&path, b"SQLite format 3\0").unwrap();

        assert_eq!(fresh_size(&path, Duration::from_secs(3600)).await, Some(16));
        assert_eq!(fresh_size(&path, Duration::ZERO).await, None);
    }

    #[test]
    fn test_backoff_doubles_and_saturates() {
        let base = Duration::from_secs(1);
        assert_eq!(backoff_delay(base, 1), Duration::from_secs(1));
        assert_eq!(backoff_delay(base, 3), Duration::from_secs(4));
        assert_eq!(backoff_delay(base, 20), MAX_BACKOFF);
        assert_eq!(backoff_delay(base, 33), MAX_BACKOFF);
        assert_eq!(backoff_delay(base, u32::MAX), MAX_BACKOFF);
        assert_eq!(backoff_delay(Duration::from_millis(1), 40), MAX_BACKOFF);
    }

    #[test]
    fn test_path_for_uses_hub_file_name() {
        let config = SnapshotConfig {
            data_dir: PathBuf::from("/data"),
            ..SnapshotConfig::default()
        };
        let downloader = SnapshotDownloader::new(&config).unwrap();
        assert_eq!(
            downloader.path_for(HubCode::AnnotationHub),
            PathBuf::from("/data/annotationhub.sqlite3")
        );
    }
}
