//! Explicit schedule table and lease-locked job runner.
//!
//! Every entry is a named composite of [`SubJob`]s sharing one lease lock.
//! A run takes the lease, executes the sub-jobs in order (each in its own
//! transaction), stops at the first failure, and releases the lease with a
//! compare-and-delete on its token. When another instance holds the lease
//! the run is skipped, not retried.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::future::join_all;
use rand::SeedableRng;
use rand::rngs::StdRng;
use tokio::sync::{Mutex, watch};
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tracing::{debug, error, info, warn};

use crate::config::{SchedulerConfig, SyndicateConfig};
use crate::error::ServiceError;
use crate::jobs::{self, JobSummary, SubJob};
use crate::store::{LeaseLock, ReportCache, Store, StoreError, job_lock_key};

/// Sub-jobs of the daily entry, in run order.
pub const DAILY_JOBS: &[SubJob] = &[
    SubJob::ReopenBusinesses,
    SubJob::DailyIncome,
    SubJob::RaidChecks,
    SubJob::InvestmentMaturity,
];

/// Sub-jobs of the weekly entry, in run order.
pub const WEEKLY_JOBS: &[SubJob] = &[
    SubJob::Payroll,
    SubJob::Interest,
    SubJob::MarketCompetition,
];

/// One row of the schedule table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduleEntry {
    /// Entry name; also names the lease key.
    pub name: &'static str,
    /// Time between runs.
    pub cadence: Duration,
    /// How long a run may hold the lease before it expires.
    pub lease: Duration,
    /// What the entry runs.
    pub sub_jobs: &'static [SubJob],
}

/// The schedule table for a configuration.
pub fn schedule_table(config: &SchedulerConfig) -> Vec<ScheduleEntry> {
    let lease = Duration::from_secs(config.lease_secs.max(1));
    vec![
        ScheduleEntry {
            name: "daily",
            cadence: Duration::from_secs(config.daily_interval_secs.max(1)),
            lease,
            sub_jobs: DAILY_JOBS,
        },
        ScheduleEntry {
            name: "weekly",
            cadence: Duration::from_secs(config.weekly_interval_secs.max(1)),
            lease,
            sub_jobs: WEEKLY_JOBS,
        },
    ]
}

/// Outcome of one scheduled run.
#[derive(Debug)]
pub enum JobRun {
    /// Every sub-job committed.
    Completed(Vec<JobSummary>),
    /// Another holder had the lease; nothing ran.
    Skipped,
    /// A sub-job failed. Earlier sub-jobs stay committed; later ones did not
    /// run.
    Failed {
        /// The failing sub-job.
        job: SubJob,
        /// Summaries of the sub-jobs that committed before it.
        completed: Vec<JobSummary>,
        /// Why it failed.
        error: ServiceError,
    },
}

/// Runs schedule entries against a store, a lease lock, and a report cache.
#[derive(Debug)]
pub struct Scheduler<S, L, C> {
    store: S,
    locks: L,
    cache: C,
    config: Arc<SyndicateConfig>,
    rng: Mutex<StdRng>,
}

impl<S: Store, L: LeaseLock, C: ReportCache> Scheduler<S, L, C> {
    /// A scheduler drawing randomness from OS entropy.
    pub fn new(store: S, locks: L, cache: C, config: Arc<SyndicateConfig>) -> Self {
        Self::with_rng(store, locks, cache, config, StdRng::from_os_rng())
    }

    /// A scheduler with an explicit random source.
    pub fn with_rng(
        store: S,
        locks: L,
        cache: C,
        config: Arc<SyndicateConfig>,
        rng: StdRng,
    ) -> Self {
        Self {
            store,
            locks,
            cache,
            config,
            rng: Mutex::new(rng),
        }
    }

    /// Run one entry now under its lease.
    ///
    /// Only a lease backend failure is an error; sub-job failures are
    /// reported as [`JobRun::Failed`].
    pub async fn run_entry(
        &self,
        entry: &ScheduleEntry,
        now: DateTime<Utc>,
    ) -> Result<JobRun, StoreError> {
        let key = job_lock_key(entry.name);
        let Some(token) = self.locks.try_acquire(&key, entry.lease).await? else {
            debug!(job = entry.name, "lease held elsewhere, skipping run");
            return Ok(JobRun::Skipped);
        };

        let run = self.run_composite(entry, now).await;

        match self.locks.release(&key, &token).await {
            Ok(true) => {}
            Ok(false) => warn!(job = entry.name, "lease expired before release"),
            Err(err) => warn!(job = entry.name, error = %err, "failed to release lease"),
        }
        Ok(run)
    }

    async fn run_composite(&self, entry: &ScheduleEntry, now: DateTime<Utc>) -> JobRun {
        let mut completed = Vec::with_capacity(entry.sub_jobs.len());
        for &job in entry.sub_jobs {
            match self.run_sub_job(job, now).await {
                Ok(summary) => completed.push(summary),
                Err(err) => {
                    error!(
                        entry = entry.name,
                        job = %job,
                        kind = ?err.kind(),
                        error = %err,
                        "sub-job failed, stopping entry"
                    );
                    return JobRun::Failed {
                        job,
                        completed,
                        error: err,
                    };
                }
            }
        }
        JobRun::Completed(completed)
    }

    /// Run a single sub-job without taking a lease.
    pub async fn run_sub_job(
        &self,
        job: SubJob,
        now: DateTime<Utc>,
    ) -> Result<JobSummary, ServiceError> {
        let config = &*self.config;
        match job {
            SubJob::ReopenBusinesses => jobs::reopen_businesses(&self.store, now).await,
            SubJob::DailyIncome => {
                let mut rng = self.rng.lock().await;
                jobs::daily_income(&self.store, now, &mut rng).await
            }
            SubJob::RaidChecks => {
                let mut rng = self.rng.lock().await;
                jobs::raid_checks(&self.store, &config.business, now, &mut rng).await
            }
            SubJob::InvestmentMaturity => jobs::mature_investments(&self.store, now).await,
            SubJob::Payroll => jobs::payroll(&self.store, now).await,
            SubJob::Interest => jobs::accrue_interest(&self.store, &config.interest, now).await,
            SubJob::MarketCompetition => {
                let mut rng = self.rng.lock().await;
                jobs::market_competition(&self.store, &self.cache, config, now, &mut rng).await
            }
        }
    }

    /// Drive every schedule entry on its cadence until `shutdown` turns true
    /// or its sender is dropped.
    pub async fn run_until(&self, shutdown: watch::Receiver<bool>) {
        let table = schedule_table(&self.config.scheduler);
        info!(
            entries = table.len(),
            run_on_start = self.config.scheduler.run_on_start,
            "scheduler starting"
        );
        join_all(
            table
                .iter()
                .map(|entry| self.entry_loop(entry, shutdown.clone())),
        )
        .await;
        info!("scheduler stopped");
    }

    async fn entry_loop(&self, entry: &ScheduleEntry, mut shutdown: watch::Receiver<bool>) {
        let first = if self.config.scheduler.run_on_start {
            Instant::now()
        } else {
            Instant::now()
                .checked_add(entry.cadence)
                .unwrap_or_else(Instant::now)
        };
        let mut ticker = interval_at(first, entry.cadence);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            if *shutdown.borrow() {
                break;
            }
            tokio::select! {
                _ = ticker.tick() => {}
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    continue;
                }
            }

            match self.run_entry(entry, Utc::now()).await {
                Ok(JobRun::Completed(summaries)) => info!(
                    job = entry.name,
                    sub_jobs = summaries.len(),
                    "scheduled run completed"
                ),
                Ok(JobRun::Skipped | JobRun::Failed { .. }) => {}
                Err(err) => error!(job = entry.name, error = %err, "lease backend unavailable, run skipped"),
            }
        }
        debug!(job = entry.name, "entry loop stopped");
    }
}
