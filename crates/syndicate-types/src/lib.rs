//! Shared type definitions for the Syndicate organization economy.
//!
//! This crate is the single source of truth for records that cross crate
//! boundaries: ledger accounts, businesses, NPC businesses, heists, and
//! investments, plus the static catalog entries they are created from. Types
//! flow downstream to `TypeScript` via `ts-rs` for game clients.
//!
//! # Modules
//!
//! - [`ids`] -- UUID newtypes for records and string newtypes for catalog keys
//! - [`enums`] -- Account kinds, roles, statuses, categories, outcomes
//! - [`structs`] -- Persisted records and their default-enforcing constructors
//! - [`catalog`] -- Business types, heist targets, zones
//! - [`error`] -- The [`ErrorKind`] taxonomy

pub mod catalog;
pub mod enums;
pub mod error;
pub mod ids;
pub mod structs;

// Re-export all public types at crate root for convenience.
pub use catalog::{BusinessType, HeistTarget, ZoneDefinition};
pub use enums::{
    AccountKind, BusinessCategory, BusinessStatus, HeistOutcome, HeistRole, HeistStatus,
    InvestmentStatus, JournalEntryType, MarketCategory, MemberRole, NpcPersonality, NpcStatus,
    RiskTier, SaturationLevel, ZoneType,
};
pub use error::ErrorKind;
pub use ids::{
    BusinessId, BusinessTypeKey, CharacterId, HeistId, HeistTargetKey, InvestmentId,
    JournalEntryId, NpcBusinessId, OrganizationId, ZoneKey,
};
pub use structs::{
    Balances, Business, CrewAssignment, Heist, Investment, JournalEntry, LedgerAccount, Member,
    NpcBusiness, Organization, PAYROLL_INTERVAL_DAYS, PayrollConfig, ZoneInfluence,
};
