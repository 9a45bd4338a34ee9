mod cli;
mod config;
mod display;

use std::path::Path;

use advisor::backend::build_backend;
use advisor::{AnalysisMode, AnalysisOutcome, AnalysisRun, BackendError, ModelBackend, ModelRequest};
use anyhow::Context;
use async_trait::async_trait;
use chrono::Utc;
use clap::Parser;
use common::logger::init_logger;
use common::time::now_ms;
use market::{HyperliquidFeed, run_collector};
use store::{SnapshotStore, SqliteSnapshotStore};
use tokio::sync::watch;

use cli::{Cli, Command};
use config::AppConfig;
use display::StoreStatus;

/// Stands in for a model during dry runs, which never reach the backend.
struct NoBackend;

#[async_trait]
impl ModelBackend for NoBackend {
    fn name(&self) -> &str {
        "none"
    }

    async fn send(&self, _request: &ModelRequest) -> Result<String, BackendError> {
        Err(BackendError::EmptyResponse)
    }
}

/// Creates the parent directory of a file-backed SQLite url.
async fn ensure_db_dir(database_url: &str) -> anyhow::Result<()> {
    let path = database_url
        .trim_start_matches("sqlite://")
        .trim_start_matches("sqlite:")
        .split('?')
        .next()
        .unwrap_or_default();

    if path.is_empty() || path.starts_with(":memory:") {
        return Ok(());
    }

    if let Some(parent) = Path::new(path).parent()
        && !parent.as_os_str().is_empty()
    {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("creating database directory {}", parent.display()))?;
    }
    Ok(())
}

async fn open_store(cfg: &AppConfig) -> anyhow::Result<SqliteSnapshotStore> {
    ensure_db_dir(&cfg.database_url).await?;
    SqliteSnapshotStore::connect(&cfg.database_url)
        .await
        .with_context(|| format!("opening snapshot store {}", cfg.database_url))
}

/// Flips the returned receiver to `true` on ctrl-c.
fn shutdown_signal() -> watch::Receiver<bool> {
    let (tx, rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("shutdown signal received");
            let _ = tx.send(true);
        }
        // a dropped sender reads as shutdown to the collector
        tx.closed().await;
    });
    rx
}

async fn collect(cfg: &AppConfig, store: &SqliteSnapshotStore) -> anyhow::Result<()> {
    let feed = HyperliquidFeed::new(cfg.hl_info_url.clone(), cfg.book_depth).context("building exchange client")?;

    let cycles = run_collector(&feed, store, &cfg.assets, cfg.poll_interval, shutdown_signal()).await;
    println!("collector stopped after {cycles} cycles");
    Ok(())
}

async fn analyze(cfg: &AppConfig, store: &SqliteSnapshotStore, dry_run: bool) -> anyhow::Result<()> {
    let backend: Box<dyn ModelBackend> = if dry_run {
        Box::new(NoBackend)
    } else {
        build_backend(&cfg.backend).context("configuring model backend")?
    };
    let mode = if dry_run { AnalysisMode::DryRun } else { AnalysisMode::Full };

    let analysis = cfg.analysis();
    let run = AnalysisRun::new(&analysis, Utc::now());
    let outcome = run
        .execute(store, backend.as_ref(), mode, shutdown_signal())
        .await
        .context("analysis run failed")?;

    match outcome {
        AnalysisOutcome::DryRun(state) => println!("{}", state.to_canonical_json()?),
        AnalysisOutcome::Ranked(report) => print!("{}", display::render_report(&report)),
        AnalysisOutcome::NoUsableData(insufficient) => print!("{}", display::render_insufficient(&insufficient)),
        AnalysisOutcome::Unavailable { attempts, last_failure } => {
            println!("analysis unavailable after {attempts} attempts: {last_failure}")
        }
        AnalysisOutcome::Aborted => println!("analysis aborted"),
    }
    Ok(())
}

async fn status(cfg: &AppConfig, store: &SqliteSnapshotStore) -> anyhow::Result<()> {
    let count = store.count().await.context("counting snapshots")?;
    let latest_ms = store.latest_timestamp().await.context("reading latest snapshot")?;

    print!(
        "{}",
        display::render_status(&StoreStatus {
            database_url: &cfg.database_url,
            assets: &cfg.assets,
            count,
            latest_ms,
            now_ms: now_ms(),
        })
    );
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let cfg = AppConfig::from_env().context("invalid configuration")?;
    init_logger("market-advisor", cfg.log_json);

    let store = open_store(&cfg).await?;

    match cli.command {
        Command::Collect => collect(&cfg, &store).await,
        Command::Analyze { dry_run } => analyze(&cfg, &store, dry_run).await,
        Command::Status => status(&cfg, &store).await,
    }
}
