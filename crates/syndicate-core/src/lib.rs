//! Configuration, storage seam, services, and job orchestration for the
//! Syndicate economy.
//!
//! This crate wires the pure rules of `syndicate-ledger` and
//! `syndicate-economy` to storage. Every player operation and every batch
//! job opens a [`StoreTx`], re-reads what it needs under row locks, runs
//! the domain rule, writes, and commits. Any error drops the transaction.
//!
//! # Modules
//!
//! - [`config`] -- Loading `syndicate-config.yaml` into strongly-typed
//!   structs, including the business, heist, and zone catalogs.
//! - [`store`] -- The [`Store`] / [`StoreTx`] transaction seam plus the
//!   [`LeaseLock`] and [`ReportCache`] coordination traits.
//! - [`memory`] -- In-memory implementations of every storage trait.
//! - [`services`] -- [`Economy`], the player-facing operations.
//! - [`jobs`] -- Batch sub-jobs (income, raids, payroll, interest, markets).
//! - [`scheduler`] -- The schedule table and lease-locked [`Scheduler`].
//! - [`error`] -- [`ServiceError`], wrapping domain and storage failures.
//!
//! [`Economy`]: services::Economy
//! [`Scheduler`]: scheduler::Scheduler

pub mod config;
pub mod error;
pub mod jobs;
pub mod memory;
pub mod scheduler;
pub mod services;
pub mod store;

pub use config::{ConfigError, SyndicateConfig};
pub use error::ServiceError;
pub use jobs::{JobSummary, SubJob};
pub use memory::{MemoryLeaseLock, MemoryReportCache, MemoryStore};
pub use scheduler::{JobRun, ScheduleEntry, Scheduler, schedule_table};
pub use services::Economy;
pub use store::{LeaseLock, LeaseToken, ReportCache, Store, StoreError, StoreTx};
