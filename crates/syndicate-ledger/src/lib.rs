//! Organization bank accounts for the Syndicate economy.
//!
//! Every organization owns one [`LedgerAccount`] split into four named
//! sub-balances (operating, war, investment, emergency). No sub-balance may
//! ever go negative, and every movement is recorded as a signed
//! [`JournalEntry`] so a run can be audited after the fact.
//!
//! # Architecture
//!
//! - [`ledger`] -- The [`Ledger`] working copy: deposits, withdrawals,
//!   transfers, and generic credits/debits with journal capture.
//! - [`journal`] -- The [`JournalEntryBuilder`] for validated entry construction.
//! - [`authorization`] -- Role checks against membership read in-transaction.
//! - [`interest`] -- Snapshot-based interest accrual.
//! - [`payroll`] -- Payroll configuration and payday planning.
//! - [`conservation`] -- Opening balances + journal == closing balances.
//!
//! The crate performs no I/O. Callers load an account inside their storage
//! transaction, wrap it in a [`Ledger`], apply operations, and write back the
//! parts returned by [`Ledger::into_parts`].
//!
//! # Usage
//!
//! ```
//! use chrono::Utc;
//! use rust_decimal::Decimal;
//! use syndicate_ledger::{ConservationResult, Ledger};
//! use syndicate_types::{AccountKind, CharacterId, LedgerAccount, OrganizationId};
//!
//! let now = Utc::now();
//! let account = LedgerAccount::open(OrganizationId::new(), now);
//! let mut ledger = Ledger::new(account, now);
//!
//! ledger.deposit(AccountKind::Operating, Decimal::new(500, 0), CharacterId::new()).ok();
//! ledger.transfer(AccountKind::Operating, AccountKind::War, Decimal::new(200, 0)).ok();
//!
//! assert_eq!(ledger.balances().war, Decimal::new(200, 0));
//! assert_eq!(ledger.verify_conservation(), ConservationResult::Balanced);
//! ```

pub mod authorization;
pub mod conservation;
pub mod interest;
pub mod journal;
pub mod ledger;
pub mod payroll;

// Re-export primary types at crate root.
pub use authorization::{
    Actor, authorize_debit, authorize_deposit, authorize_leader, authorize_member, authorize_officer,
};
pub use conservation::ConservationResult;
pub use interest::{InterestAccrual, InterestPolicy, compute_interest};
pub use journal::JournalEntryBuilder;
pub use ledger::{Ledger, validate_amount, validate_rate};
pub use payroll::{PayrollLine, PayrollPlan, configure_payroll, plan_payroll};

use std::collections::BTreeMap;

use rust_decimal::Decimal;

use syndicate_types::{AccountKind, CharacterId, ErrorKind};

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors that can occur when mutating a ledger account.
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    /// Amount is not strictly positive or has more than two decimal places.
    #[error("amount must be positive with at most two decimal places, got {amount}")]
    InvalidAmount {
        /// The rejected amount.
        amount: Decimal,
    },

    /// Source and destination of a transfer are the same sub-account.
    #[error("cannot transfer from {account:?} into itself")]
    SameAccount {
        /// The account named on both sides.
        account: AccountKind,
    },

    /// The sub-balance cannot cover the debit.
    #[error("insufficient funds in {account:?}: requested {requested}, available {available}")]
    InsufficientFunds {
        /// The sub-account being debited.
        account: AccountKind,
        /// Amount requested.
        requested: Decimal,
        /// Amount available.
        available: Decimal,
    },

    /// The actor's role does not permit the action.
    #[error("character {character} is not allowed to {action}")]
    NotAuthorized {
        /// The rejected character.
        character: CharacterId,
        /// What they attempted.
        action: &'static str,
    },

    /// A required field was not set on the builder.
    #[error("missing required field: {0}")]
    MissingField(&'static str),

    /// A balance computation exceeded the decimal range.
    #[error("arithmetic overflow on {account:?}")]
    Overflow {
        /// The sub-account being computed.
        account: AccountKind,
    },
}

impl LedgerError {
    /// The error class callers dispatch on.
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidAmount { .. }
            | Self::SameAccount { .. }
            | Self::MissingField(_)
            | Self::Overflow { .. } => ErrorKind::InvalidAmount,
            Self::InsufficientFunds { .. } => ErrorKind::InsufficientFunds,
            Self::NotAuthorized { .. } => ErrorKind::NotAuthorized,
        }
    }
}

// ---------------------------------------------------------------------------
// Anomaly type
// ---------------------------------------------------------------------------

/// A conservation violation: the journal does not explain the closing
/// balances, or a sub-balance went negative.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerAnomaly {
    /// Per-account mismatch: (expected from opening + journal, actual closing).
    pub mismatches: BTreeMap<AccountKind, (Decimal, Decimal)>,
    /// Sub-accounts whose closing balance is negative.
    pub negative: Vec<AccountKind>,
    /// Human-readable description of the anomaly.
    pub message: String,
}

impl core::fmt::Display for LedgerAnomaly {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.message)
    }
}
