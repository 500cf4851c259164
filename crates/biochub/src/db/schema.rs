//! Schema creation, reference seeding, statistics, and verification

use super::seed::{
    BIOC_RELEASES, CORE_TABLES, CURRENT_RELEASE, HUBS, ORGANIZATION_NAME,
    ORGANIZATION_SHORT_NAME, ORGANIZATION_WEBSITE, STATS_TABLES, STATUSES, SYSTEM_USER_EMAIL,
    SYSTEM_USER_NAME, SYSTEM_USER_ROLE,
};
use super::{DbError, DbResult};
use crate::models::TableCount;
use chrono::NaiveDate;
use serde::Serialize;
use sqlx::migrate::Migrator;
use sqlx::PgPool;
use tracing::{info, instrument, warn};

pub static MIGRATOR: Migrator = sqlx::migrate!("../../migrations");

/// Apply pending SQL migrations.
#[instrument(skip(pool))]
pub async fn run_migrations(pool: &PgPool) -> DbResult<()> {
    MIGRATOR.run(pool).await?;
    info!("Database migrations applied");
    Ok(())
}

/// Rows inserted by [`seed`]. Zero everywhere on an already seeded target.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct SeedReport {
    pub hubs: u64,
    pub statuses: u64,
    pub bioc_releases: u64,
    pub organizations: u64,
    pub users: u64,
}

/// Insert hubs, statuses, releases, the Bioconductor organization, and the
/// system user when they are absent.
#[instrument(skip(pool))]
pub async fn seed(pool: &PgPool) -> DbResult<SeedReport> {
    let mut report = SeedReport::default();
    let mut tx = pool.begin().await?;

    for hub in HUBS {
        let result = sqlx::query(
            r#"
            INSERT INTO hubs (name, code, description)
            VALUES ($1, $2, $3)
            ON CONFLICT (code) DO NOTHING
            "#,
        )
        .bind(hub.display_name())
        .bind(hub.code())
        .bind(format!("Bioconductor {}", hub.display_name()))
        .execute(&mut *tx)
        .await?;
        report.hubs += result.rows_affected();
    }

    for status in STATUSES {
        let sort_order = i32::try_from(status.id)
            .map_err(|_| DbError::config(format!("status id {} out of range", status.id)))?;
        let result = sqlx::query(
            r#"
            INSERT INTO resource_statuses (id, status, display_name, is_public, sort_order)
            VALUES ($1, $2, $2, $3, $4)
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(status.id)
        .bind(status.status)
        .bind(status.is_public)
        .bind(sort_order)
        .execute(&mut *tx)
        .await?;
        report.statuses += result.rows_affected();
    }

    for release in BIOC_RELEASES {
        let release_date = NaiveDate::parse_from_str(release.release_date, "%Y-%m-%d")
            .map_err(|e| DbError::config(format!("release {}: {}", release.version, e)))?;
        let result = sqlx::query(
            r#"
            INSERT INTO bioc_releases (version, release_date, is_current, r_version_min, r_version_max)
            VALUES ($1, $2, $3, $4, $4)
            ON CONFLICT (version) DO NOTHING
            "#,
        )
        .bind(release.version)
        .bind(release_date)
        .bind(release.version == CURRENT_RELEASE)
        .bind(release.r_version)
        .execute(&mut *tx)
        .await?;
        report.bioc_releases += result.rows_affected();
    }

    sqlx::query("UPDATE bioc_releases SET is_current = (version = $1)")
        .bind(CURRENT_RELEASE)
        .execute(&mut *tx)
        .await?;

    let result = sqlx::query(
        r#"
        INSERT INTO organizations (name, short_name, website)
        VALUES ($1, $2, $3)
        ON CONFLICT (short_name) DO NOTHING
        "#,
    )
    .bind(ORGANIZATION_NAME)
    .bind(ORGANIZATION_SHORT_NAME)
    .bind(ORGANIZATION_WEBSITE)
    .execute(&mut *tx)
    .await?;
    report.organizations += result.rows_affected();

    let result = sqlx::query(
        r#"
        INSERT INTO users (email, full_name, role, organization_id)
        VALUES ($1, $2, $3, (SELECT id FROM organizations WHERE short_name = $4))
        ON CONFLICT (email) DO NOTHING
        "#,
    )
    .bind(SYSTEM_USER_EMAIL)
    .bind(SYSTEM_USER_NAME)
    .bind(SYSTEM_USER_ROLE)
    .bind(ORGANIZATION_SHORT_NAME)
    .execute(&mut *tx)
    .await?;
    report.users += result.rows_affected();

    tx.commit().await?;

    info!(
        hubs = report.hubs,
        statuses = report.statuses,
        bioc_releases = report.bioc_releases,
        "Reference data seeded"
    );

    Ok(report)
}

/// Row counts for every catalog table.
pub async fn table_counts(pool: &PgPool) -> DbResult<Vec<TableCount>> {
    let mut counts = Vec::with_capacity(STATS_TABLES.len());
    for table in STATS_TABLES {
        let rows = sqlx::query_scalar::<_, i64>(&format!("SELECT COUNT(*) FROM {}", table))
            .fetch_one(pool)
            .await?;
        counts.push(TableCount {
            table: table.to_string(),
            rows,
        });
    }
    Ok(counts)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableCheck {
    pub table: String,
    pub rows: Option<i64>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VerifyReport {
    pub checks: Vec<TableCheck>,
}

impl VerifyReport {
    pub fn is_healthy(&self) -> bool {
        self.checks.iter().all(|c| c.error.is_none())
    }
}

/// Check the core tables exist and can be read.
#[instrument(skip(pool))]
pub async fn verify(pool: &PgPool) -> DbResult<VerifyReport> {
    super::health_check(pool).await?;

    let mut checks = Vec::with_capacity(CORE_TABLES.len());
    for table in CORE_TABLES {
        let result = sqlx::query_scalar::<_, i64>(&format!("SELECT COUNT(*) FROM {}", table))
            .fetch_one(pool)
            .await;
        let check = match result {
            Ok(rows) => TableCheck {
                table: table.to_string(),
                rows: Some(rows),
                error: None,
            },
            Err(e) => {
                warn!(table, error = %e, "Table check failed");
                TableCheck {
                    table: table.to_string(),
                    rows: None,
                    error: Some(e.to_string()),
                }
            },
        };
        checks.push(check);
    }

    Ok(VerifyReport { checks })
}
