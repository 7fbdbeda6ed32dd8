//! Data layer for the Syndicate economy (`PostgreSQL` + `Dragonfly`).
//!
//! `PostgreSQL` holds every durable record: ledger accounts and their
//! journal, businesses, world-owned competitors, heists, and investments.
//! `Dragonfly` holds short-lived coordination state: scheduler leases and the
//! last market report per group.
//!
//! # Architecture
//!
//! ```text
//! Economy / Scheduler (syndicate-core)
//!     |
//!     +-- Store / StoreTx -------> PostgreSQL (PgStore over PostgresPool)
//!     |                             one transaction per operation or job
//!     |
//!     +-- LeaseLock / ReportCache -> Dragonfly (DragonflyPool)
//! ```
//!
//! # Modules
//!
//! - [`postgres`] -- `PostgreSQL` connection pool, configuration, migrations
//! - [`store`] -- [`PgStore`] / [`PgTx`], the transactional store
//! - [`rows`] -- Row structs and their decoding into domain types
//! - [`dragonfly`] -- `Dragonfly` lease locks and report cache
//! - [`error`] -- Shared error types

pub mod dragonfly;
pub mod error;
pub mod postgres;
pub mod rows;
pub mod store;

// Re-export primary types for convenience.
pub use dragonfly::DragonflyPool;
pub use error::DbError;
pub use postgres::{PostgresConfig, PostgresPool};
pub use store::{PgStore, PgTx};
