//! Error taxonomy shared by every layer of the economy.
//!
//! Each crate defines its own `thiserror` enum; every variant maps onto one
//! [`ErrorKind`] so callers (and the transport layer above this workspace)
//! can react to the class of failure without matching on crate internals.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// Class of a failed economy operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum ErrorKind {
    /// Non-positive or malformed quantity. Rejected before any state change.
    InvalidAmount,
    /// The source balance cannot cover the amount. A business-rule outcome,
    /// never retried automatically.
    InsufficientFunds,
    /// The caller's role or membership, re-read inside the transaction, does
    /// not permit the operation.
    NotAuthorized,
    /// A referenced organization, business, heist, or record does not exist.
    NotFound,
    /// The record's lifecycle state does not allow the operation.
    InvalidStateTransition,
    /// A cooldown, level, heat, or catalog requirement is not met.
    RequirementNotMet,
    /// The storage or locking backend failed.
    Storage,
}

impl ErrorKind {
    /// Whether this kind is a caller-facing business outcome rather than an
    /// infrastructure fault.
    pub const fn is_business_rule(self) -> bool {
        !matches!(self, Self::Storage)
    }
}
