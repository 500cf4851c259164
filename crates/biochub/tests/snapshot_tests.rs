//! Snapshot reader tests

mod common;

use anyhow::Result;
use biochub::snapshot::{Snapshot, SnapshotError};
use biochub_common::types::HubCode;
use common::{annotationhub, ResourceRow, SnapshotFixture};
use futures::TryStreamExt;

#[tokio::test]
async fn test_open_missing_file() {
    let dir = tempfile::tempdir().unwrap_or_else(|e| panic!("tempdir: {}", e));
    let result = Snapshot::open(HubCode::AnnotationHub, dir.path().join("missing.sqlite3")).await;
    assert!(matches!(result, Err(SnapshotError::NotFound(_))));
}

#[tokio::test]
async fn test_open_rejects_missing_table() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("broken.sqlite3");
    SnapshotFixture::new(HubCode::ExperimentHub).write(&path).await?;

    let pool = sqlx::SqlitePool::connect(&format!("sqlite://{}", path.display())).await?;
    sqlx::query("DROP TABLE biocversions").execute(&pool).await?;
    pool.close().await;

    match Snapshot::open(HubCode::ExperimentHub, &path).await {
        Err(SnapshotError::MissingTable { hub, table }) => {
            assert_eq!(hub, HubCode::ExperimentHub);
            assert_eq!(table, "biocversions");
        },
        other => anyhow::bail!("expected a missing table error, got {:?}", other.err()),
    }
    Ok(())
}

#[tokio::test]
async fn test_species_counts_group_spellings() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let snapshot = annotationhub().build(dir.path()).await?;

    let counts = snapshot.species_counts().await?;
    let human: Vec<(String, i64)> = counts
        .iter()
        .filter(|c| c.taxonomy_id == "9606")
        .map(|c| (c.name.clone(), c.occurrences))
        .collect();
    assert_eq!(
        human,
        vec![("Homo sapiens".to_string(), 2), ("Homo Sapiens".to_string(), 1)]
    );
    Ok(())
}

#[tokio::test]
async fn test_distinct_values_and_lookups() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let snapshot = annotationhub().build(dir.path()).await?;

    assert_eq!(snapshot.count_resources().await?, 7);
    assert_eq!(snapshot.distinct_providers().await?, vec!["Ensembl", "UCSC"]);
    assert_eq!(
        snapshot.distinct_tags().await?,
        vec!["GTF", "Orphan", "UCSC", "hg19"]
    );
    assert_eq!(snapshot.recipes().await?.len(), 2);
    assert_eq!(snapshot.location_prefixes().await?.len(), 3);

    let statuses = snapshot.statuses().await?;
    assert_eq!(statuses.get(&11).map(String::as_str), Some("Removed by author request"));
    Ok(())
}

#[tokio::test]
async fn test_statuses_table_is_optional() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let snapshot = SnapshotFixture::new(HubCode::AnnotationHub)
        .without_statuses()
        .resource(ResourceRow::new(1, "AH1"))
        .build(dir.path())
        .await?;

    assert!(snapshot.statuses().await?.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_resources_stream_in_id_order() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let snapshot = annotationhub().build(dir.path()).await?;

    let rows: Vec<_> = snapshot.resources().try_collect().await?;
    let ids: Vec<i64> = rows.iter().map(|r| r.id).collect();
    assert_eq!(ids, vec![1, 2, 3, 4, 5, 6, 7]);

    let ah1 = &rows[0];
    assert_eq!(ah1.accession.as_deref(), Some("AH1"));
    assert_eq!(ah1.taxonomy_id.as_deref(), Some("9606"));
    assert_eq!(ah1.status_id, Some(1));
    assert_eq!(rows[5].accession, None);
    Ok(())
}

#[tokio::test]
async fn test_satellite_rows_carry_accession() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let snapshot = annotationhub().build(dir.path()).await?;

    let tags: Vec<_> = snapshot.tag_rows().try_collect().await?;
    assert_eq!(tags.len(), 6);
    assert_eq!(tags[0].accession.as_deref(), Some("AH1"));
    // resource 999 does not exist
    assert_eq!(tags[5].accession, None);

    let files: Vec<_> = snapshot.file_rows().try_collect().await?;
    assert_eq!(files[0].location_prefix_id, Some(1));
    assert_eq!(files[1].dispatch_class.as_deref(), Some("GTFFile"));

    let sources: Vec<_> = snapshot.source_file_rows().try_collect().await?;
    assert_eq!(sources[0].size.as_deref(), Some("12345"));

    let versions: Vec<_> = snapshot.bioc_version_rows().try_collect().await?;
    assert_eq!(versions.len(), 5);
    Ok(())
}
