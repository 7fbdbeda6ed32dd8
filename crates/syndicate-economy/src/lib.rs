//! Business, heist, market, and investment logic for the Syndicate economy.
//!
//! This crate contains the logic layer of the economy -- everything that
//! operates on records without touching I/O. It sits between
//! `syndicate-types` (which defines the data structures) and
//! `syndicate-core` (which loads records inside a storage transaction, calls
//! into this crate, and writes the results back).
//!
//! Randomness is always injected as `&mut impl Rng` so production code can
//! use an OS-seeded `StdRng` and tests a seeded one.
//!
//! # Modules
//!
//! - [`business`] -- Daily income, raid checks, reopening, purchase and sale rules
//! - [`heist`] -- Heist planning, crew, progress, success chance, execution
//! - [`market`] -- Traffic-share scoring, normalization, saturation, NPC behaviour
//! - [`investment`] -- Fixed-term investment placement and maturity
//! - [`config`] -- Tunable rules for each of the above
//! - [`error`] -- Error types for every module

pub mod business;
pub mod config;
pub mod error;
pub mod heist;
pub mod investment;
pub mod market;

// Re-export primary types at crate root for convenience.
pub use business::{IncomeRoll, RaidOutcome};
pub use config::{BusinessRules, HeistRules, InvestmentTerm, MarketRules};
pub use error::{BusinessError, HeistError, InvestmentError, MarketError};
pub use heist::{HeistResolution, PlanningContext};
pub use market::{
    Competitor, CompetitorId, MarketGroup, MarketReport, NpcAction, NpcDecision, ScoreBreakdown,
    TrafficShare,
    evaluate_group, run_weekly,
};
