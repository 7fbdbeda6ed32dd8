//! Job orchestrator binary for the Syndicate economy.
//!
//! Wires the configuration, the `PostgreSQL` store, and the `Dragonfly`
//! lease lock and report cache into a [`Scheduler`], then runs the schedule
//! table until Ctrl-C.
//!
//! # Startup Sequence
//!
//! 1. Load configuration from `$SYNDICATE_CONFIG` (default
//!    `syndicate-config.yaml`)
//! 2. Initialize structured logging (tracing)
//! 3. Connect to `PostgreSQL` and run migrations
//! 4. Connect to `Dragonfly`
//! 5. Run the scheduler loop, or a single entry with `run-once <entry>`
//!
//! # Usage
//!
//! ```text
//! syndicate-engine                 # run the schedule until Ctrl-C
//! syndicate-engine run-once daily  # run one entry now and exit
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use chrono::Utc;
use syndicate_core::config::LoggingConfig;
use syndicate_core::{JobRun, Scheduler, SyndicateConfig, schedule_table};
use syndicate_db::{DragonflyPool, PostgresConfig, PostgresPool};
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Default configuration file, relative to the working directory.
const DEFAULT_CONFIG_PATH: &str = "syndicate-config.yaml";

#[tokio::main]
async fn main() -> Result<()> {
    let config = load_config()?;
    init_logging(&config.logging);
    info!(
        business_types = config.catalogs.business_types.len(),
        heist_targets = config.catalogs.heist_targets.len(),
        zones = config.catalogs.zones.len(),
        "syndicate-engine starting"
    );

    let pg_config = PostgresConfig::from_infrastructure(&config.infrastructure);
    let postgres = PostgresPool::connect(&pg_config)
        .await
        .context("connecting to PostgreSQL")?;
    postgres
        .run_migrations()
        .await
        .context("running migrations")?;
    let dragonfly = DragonflyPool::connect(&config.infrastructure.dragonfly_url)
        .await
        .context("connecting to Dragonfly")?;

    let config = Arc::new(config);
    let scheduler = Scheduler::new(
        postgres.store(),
        dragonfly.clone(),
        dragonfly,
        Arc::clone(&config),
    );

    let args: Vec<String> = std::env::args().skip(1).collect();
    let result = match args.first().map(String::as_str) {
        None => {
            run_until_ctrl_c(&scheduler).await;
            Ok(())
        }
        Some("run-once") => {
            let name = args.get(1).context("run-once needs an entry name")?;
            run_once(&scheduler, &config, name).await
        }
        Some(other) => Err(anyhow::anyhow!("unknown command {other:?}")),
    };

    postgres.close().await;
    info!("syndicate-engine stopped");
    result
}

/// Load configuration from `$SYNDICATE_CONFIG` or the default path.
///
/// A missing default file falls back to built-in defaults; a missing file
/// named explicitly is an error.
fn load_config() -> Result<SyndicateConfig> {
    let explicit = std::env::var_os("SYNDICATE_CONFIG").map(PathBuf::from);
    let path = explicit
        .clone()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));
    if explicit.is_none() && !path.exists() {
        eprintln!("{DEFAULT_CONFIG_PATH} not found, using defaults");
        return Ok(SyndicateConfig::default());
    }
    SyndicateConfig::from_file(&path)
        .with_context(|| format!("loading configuration from {}", path.display()))
}

fn init_logging(logging: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));
    if logging.json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .init();
    }
}

async fn run_until_ctrl_c<S, L, C>(scheduler: &Scheduler<S, L, C>)
where
    S: syndicate_core::Store,
    L: syndicate_core::LeaseLock,
    C: syndicate_core::ReportCache,
{
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Ctrl-C received, shutting down"),
            Err(e) => error!(error = %e, "cannot listen for Ctrl-C, shutting down"),
        }
        let _ = shutdown_tx.send(true);
    });
    scheduler.run_until(shutdown_rx).await;
}

async fn run_once<S, L, C>(
    scheduler: &Scheduler<S, L, C>,
    config: &SyndicateConfig,
    name: &str,
) -> Result<()>
where
    S: syndicate_core::Store,
    L: syndicate_core::LeaseLock,
    C: syndicate_core::ReportCache,
{
    let table = schedule_table(&config.scheduler);
    let Some(entry) = table.iter().find(|entry| entry.name == name) else {
        let known: Vec<_> = table.iter().map(|entry| entry.name).collect();
        bail!("unknown schedule entry {name:?}, expected one of {known:?}");
    };

    match scheduler.run_entry(entry, Utc::now()).await? {
        JobRun::Completed(summaries) => {
            info!(job = entry.name, sub_jobs = summaries.len(), "run-once completed");
            Ok(())
        }
        JobRun::Skipped => {
            warn!(job = entry.name, "lease held by another instance, nothing ran");
            Ok(())
        }
        JobRun::Failed { job, error, .. } => {
            Err(anyhow::Error::new(error).context(format!("{} failed at {job}", entry.name)))
        }
    }
}

#[cfg(test)]
mod tests {
    use syndicate_core::{MemoryLeaseLock, MemoryReportCache, MemoryStore};

    use super::*;

    fn scheduler() -> Scheduler<MemoryStore, MemoryLeaseLock, MemoryReportCache> {
        Scheduler::new(
            MemoryStore::new(),
            MemoryLeaseLock::new(),
            MemoryReportCache::new(),
            Arc::new(SyndicateConfig::default()),
        )
    }

    #[tokio::test]
    async fn run_once_executes_a_known_entry() {
        let config = SyndicateConfig::default();
        assert!(run_once(&scheduler(), &config, "daily").await.is_ok());
        assert!(run_once(&scheduler(), &config, "weekly").await.is_ok());
    }

    #[tokio::test]
    async fn run_once_rejects_unknown_entries() {
        let config = SyndicateConfig::default();
        let result = run_once(&scheduler(), &config, "hourly").await;
        assert!(result.is_err_and(|e| e.to_string().contains("hourly")));
    }
}
