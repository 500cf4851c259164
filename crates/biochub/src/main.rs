//! biochub - Bioconductor hub catalog mirror

use anyhow::{Context, Result};
use biochub::config::Config;
use biochub::db::{self, schema};
use biochub::migrate::{self, MigrateOptions, MigrationSummary};
use biochub::snapshot::{Snapshot, SnapshotDownloader};
use biochub::store::{MemoryStore, PgStore};
use biochub_common::logging::{init_logging, LogConfig, LogLevel};
use biochub_common::types::HubCode;
use clap::{Parser, Subcommand};
use sqlx::PgPool;
use std::path::PathBuf;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "biochub")]
#[command(author, version, about = "Mirror Bioconductor hub metadata into PostgreSQL")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Download hub snapshots into the data directory
    Download {
        /// Only this hub (AH or EH)
        #[arg(long)]
        hub: Option<HubCode>,

        /// Download even when the local copy is fresh
        #[arg(short, long)]
        force: bool,
    },

    /// Create the schema and seed reference rows
    InitDb,

    /// Migrate both hub snapshots into the target database
    Migrate {
        /// AnnotationHub snapshot (defaults to the data directory)
        #[arg(long)]
        annotationhub: Option<PathBuf>,

        /// ExperimentHub snapshot (defaults to the data directory)
        #[arg(long)]
        experimenthub: Option<PathBuf>,

        /// Resources per insert batch
        #[arg(long)]
        batch_size: Option<usize>,

        /// Download stale or missing snapshots first
        #[arg(long)]
        download: bool,

        /// Migrate into an in-memory target and report what would be created
        #[arg(long)]
        dry_run: bool,

        /// Print the summary as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show row counts per table
    Stats {
        #[arg(long)]
        json: bool,
    },

    /// Check that the core tables are present and readable
    Verify,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // LOG_LEVEL in the environment takes precedence over -v
    let log_config = if std::env::var_os("LOG_LEVEL").is_some() {
        LogConfig::from_env()?
    } else {
        LogConfig::builder()
            .level(LogLevel::from_verbosity(cli.verbose))
            .build()
    };
    let _guard = init_logging(&log_config)?;

    let config = Config::load().context("Failed to load configuration")?;

    match cli.command {
        Command::Download { hub, force } => download(&config, hub, force).await,
        Command::InitDb => init_db(&config).await,
        Command::Migrate {
            annotationhub,
            experimenthub,
            batch_size,
            download,
            dry_run,
            json,
        } => {
            let mut config = config;
            if let Some(batch_size) = batch_size {
                config.migration.batch_size = batch_size;
            }
            config.validate()?;

            let paths = SnapshotPaths {
                annotationhub,
                experimenthub,
            };
            let summary = run_migration(&config, paths, download, dry_run).await?;

            if json {
                println!("{}", serde_json::to_string_pretty(&summary)?);
            } else {
                println!("{}", summary);
            }
            Ok(())
        },
        Command::Stats { json } => stats(&config, json).await,
        Command::Verify => verify(&config).await,
    }
}

async fn connect(config: &Config) -> Result<PgPool> {
    db::create_pool(&config.database)
        .await
        .context("Failed to connect to the target database")
}

async fn download(config: &Config, hub: Option<HubCode>, force: bool) -> Result<()> {
    let downloader = SnapshotDownloader::new(&config.snapshots)?;
    let hubs = hub.map_or(HubCode::ALL.to_vec(), |hub| vec![hub]);

    for hub in hubs {
        let url = config.snapshot_url(hub);
        let result = if force {
            downloader.fetch(hub, url).await
        } else {
            downloader.ensure(hub, url).await
        };
        let outcome =
            result.with_context(|| format!("Failed to download {} snapshot", hub.display_name()))?;

        println!(
            "{}: {} ({} bytes, {:?})",
            hub.display_name(),
            outcome.path.display(),
            outcome.bytes,
            outcome.status
        );
    }
    Ok(())
}

async fn init_db(config: &Config) -> Result<()> {
    let pool = connect(config).await?;
    schema::run_migrations(&pool)
        .await
        .context("Failed to apply migrations")?;
    let report = schema::seed(&pool).await.context("Failed to seed reference data")?;

    println!(
        "Schema ready. Seeded {} hubs, {} statuses, {} releases, {} organizations, {} users.",
        report.hubs, report.statuses, report.bioc_releases, report.organizations, report.users
    );
    pool.close().await;
    Ok(())
}

struct SnapshotPaths {
    annotationhub: Option<PathBuf>,
    experimenthub: Option<PathBuf>,
}

impl SnapshotPaths {
    fn get(&self, hub: HubCode) -> Option<&PathBuf> {
        match hub {
            HubCode::AnnotationHub => self.annotationhub.as_ref(),
            HubCode::ExperimentHub => self.experimenthub.as_ref(),
        }
    }
}

async fn open_snapshot(
    config: &Config,
    paths: &SnapshotPaths,
    hub: HubCode,
    download: bool,
) -> Result<Snapshot> {
    let path = match paths.get(hub) {
        Some(path) => path.clone(),
        None if download => {
            let downloader = SnapshotDownloader::new(&config.snapshots)?;
            downloader
                .ensure(hub, config.snapshot_url(hub))
                .await
                .with_context(|| format!("Failed to download {} snapshot", hub.display_name()))?
                .path
        },
        None => config.snapshot_path(hub),
    };

    Snapshot::open(hub, &path)
        .await
        .with_context(|| format!("Failed to open {} snapshot at {}", hub.display_name(), path.display()))
}

async fn run_migration(
    config: &Config,
    paths: SnapshotPaths,
    download: bool,
    dry_run: bool,
) -> Result<MigrationSummary> {
    let annotationhub = open_snapshot(config, &paths, HubCode::AnnotationHub, download).await?;
    let experimenthub = open_snapshot(config, &paths, HubCode::ExperimentHub, download).await?;
    let options = MigrateOptions::from_config(&config.migration);

    info!(
        batch_size = options.batch_size,
        link_batch_size = options.link_batch_size,
        dry_run,
        "Starting migration"
    );

    let result = if dry_run {
        let store = MemoryStore::seeded();
        migrate::migrate(&store, &annotationhub, &experimenthub, options)
            .await
            .map(|mut summary| {
                summary.dry_run = true;
                summary
            })
    } else {
        let pool = connect(config).await?;
        let store = PgStore::new(pool.clone());
        let result = migrate::migrate(&store, &annotationhub, &experimenthub, options).await;
        pool.close().await;
        result
    };

    annotationhub.close().await;
    experimenthub.close().await;

    let summary = result.context("Migration failed")?;
    if !summary.quality().is_clean() {
        warn!("Source data quality issues were recovered; see the summary");
    }
    Ok(summary)
}

async fn stats(config: &Config, json: bool) -> Result<()> {
    let pool = connect(config).await?;
    let counts = schema::table_counts(&pool)
        .await
        .context("Failed to count rows")?;
    pool.close().await;

    if json {
        println!("{}", serde_json::to_string_pretty(&counts)?);
        return Ok(());
    }

    let total: i64 = counts.iter().map(|c| c.rows).sum();
    for count in &counts {
        println!("{:<24} {:>12}", count.table, count.rows);
    }
    println!("{:<24} {:>12}", "total", total);
    Ok(())
}

async fn verify(config: &Config) -> Result<()> {
    let pool = connect(config).await?;
    let report = schema::verify(&pool).await.context("Verification failed")?;
    pool.close().await;

    for check in &report.checks {
        match (&check.rows, &check.error) {
            (Some(rows), _) => println!("ok    {:<24} {} rows", check.table, rows),
            (None, Some(error)) => println!("FAIL  {:<24} {}", check.table, error),
            (None, None) => println!("FAIL  {:<24}", check.table),
        }
    }

    if !report.is_healthy() {
        anyhow::bail!("Target database is missing or cannot read core tables");
    }
    println!("Target database looks healthy");
    Ok(())
}
