//! Error types for the syndicate-economy crate.
//!
//! All operations that can fail return typed errors rather than panicking.
//! Every enum exposes `kind()` so callers can map failures onto the shared
//! [`ErrorKind`] taxonomy.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use syndicate_types::{BusinessId, CharacterId, ErrorKind, HeistStatus, InvestmentId};

/// Errors raised by business rules.
#[derive(Debug, thiserror::Error)]
pub enum BusinessError {
    /// The income range of a business cannot be rolled.
    #[error("invalid income range [{min}, {max}]")]
    InvalidIncomeRange {
        /// Lower bound.
        min: Decimal,
        /// Upper bound.
        max: Decimal,
    },

    /// The organization's level is below the catalog requirement.
    #[error("organization level {actual} is below the required level {required}")]
    LevelTooLow {
        /// Required level.
        required: u32,
        /// Current level.
        actual: u32,
    },

    /// The business does not belong to the acting organization.
    #[error("business not found: {0}")]
    NotOwned(BusinessId),

    /// The business is already closed.
    #[error("business {0} is already closed")]
    AlreadyClosed(BusinessId),

    /// The business is shut down by a raid.
    #[error("business {business} is closed by a raid until {until:?}")]
    UnderRaid {
        /// The raided business.
        business: BusinessId,
        /// End of the closure.
        until: Option<DateTime<Utc>>,
    },

    /// An arithmetic overflow occurred during a money computation.
    #[error("arithmetic overflow: {context}")]
    ArithmeticOverflow {
        /// Description of what was being computed.
        context: &'static str,
    },
}

impl BusinessError {
    /// The error class callers dispatch on.
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidIncomeRange { .. } | Self::ArithmeticOverflow { .. } => {
                ErrorKind::InvalidAmount
            }
            Self::LevelTooLow { .. } => ErrorKind::RequirementNotMet,
            Self::NotOwned(_) => ErrorKind::NotFound,
            Self::AlreadyClosed(_) | Self::UnderRaid { .. } => ErrorKind::InvalidStateTransition,
        }
    }
}

/// Errors raised by the heist state machine.
#[derive(Debug, thiserror::Error)]
pub enum HeistError {
    /// The target was hit too recently.
    #[error("target is on cooldown until {available_at}")]
    CooldownActive {
        /// When the target can be planned again.
        available_at: DateTime<Utc>,
    },

    /// The organization's level is below the target requirement.
    #[error("organization level {actual} is below the required level {required}")]
    LevelTooLow {
        /// Required level.
        required: u32,
        /// Current level.
        actual: u32,
    },

    /// Planning would push active heat above the cap.
    #[error("active heat {current} plus {added} exceeds the cap of {max}")]
    HeatTooHigh {
        /// Heat of the organization's active heists.
        current: u32,
        /// Heat the new heist would add.
        added: u32,
        /// Configured cap.
        max: u32,
    },

    /// The operation is not allowed in the heist's current status.
    #[error("cannot {action} a heist in status {status:?}")]
    InvalidStatus {
        /// Attempted operation.
        action: &'static str,
        /// Current status.
        status: HeistStatus,
    },

    /// The member is already on the crew.
    #[error("character {0} is already on the crew")]
    DuplicateMember(CharacterId),

    /// The crew is already at full headcount.
    #[error("crew is full ({required} members)")]
    CrewFull {
        /// Required headcount.
        required: u32,
    },

    /// The member is not on the crew.
    #[error("character {0} is not on the crew")]
    NotOnCrew(CharacterId),

    /// The character does not belong to the planning organization.
    #[error("character {0} is not a member of the organization")]
    NotAMember(CharacterId),

    /// Progress increments must be positive.
    #[error("progress increment must be positive")]
    InvalidProgress,

    /// Execution requires full staffing and complete preparation.
    #[error("heist is not ready: crew {crew}/{required}, progress {progress}/100")]
    NotReady {
        /// Current headcount.
        crew: usize,
        /// Required headcount.
        required: u32,
        /// Current progress.
        progress: u32,
    },

    /// The payout range cannot be rolled.
    #[error("invalid payout range [{min}, {max}]")]
    InvalidPayoutRange {
        /// Lower bound.
        min: Decimal,
        /// Upper bound.
        max: Decimal,
    },
}

impl HeistError {
    /// The error class callers dispatch on.
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::CooldownActive { .. } | Self::LevelTooLow { .. } | Self::HeatTooHigh { .. } => {
                ErrorKind::RequirementNotMet
            }
            Self::InvalidStatus { .. }
            | Self::DuplicateMember(_)
            | Self::CrewFull { .. }
            | Self::NotReady { .. } => ErrorKind::InvalidStateTransition,
            Self::NotOnCrew(_) => ErrorKind::NotFound,
            Self::NotAMember(_) => ErrorKind::NotAuthorized,
            Self::InvalidProgress | Self::InvalidPayoutRange { .. } => ErrorKind::InvalidAmount,
        }
    }
}

/// Errors raised while scoring a market.
#[derive(Debug, thiserror::Error)]
pub enum MarketError {
    /// The configured share band is empty or outside `[0, 1]`.
    #[error("invalid share band [{min}, {max}]")]
    InvalidShareBand {
        /// Configured minimum share.
        min: f64,
        /// Configured maximum share.
        max: f64,
    },

    /// The configured price range is empty.
    #[error("invalid price range [{min}, {max}]")]
    InvalidPriceRange {
        /// Configured cheapest modifier.
        min: f64,
        /// Configured most expensive modifier.
        max: f64,
    },
}

impl MarketError {
    /// The error class callers dispatch on.
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidShareBand { .. } | Self::InvalidPriceRange { .. } => {
                ErrorKind::RequirementNotMet
            }
        }
    }
}

/// Errors raised by investment rules.
#[derive(Debug, thiserror::Error)]
pub enum InvestmentError {
    /// No investment product exists for the requested term.
    #[error("no investment product with a {days}-day term")]
    UnknownTerm {
        /// Requested term.
        days: u32,
    },

    /// The investment has already paid out.
    #[error("investment {0} has already matured")]
    AlreadyMatured(InvestmentId),

    /// The investment is not yet due.
    #[error("investment {id} matures at {matures_at}")]
    NotYetDue {
        /// The investment.
        id: InvestmentId,
        /// Maturity date.
        matures_at: DateTime<Utc>,
    },

    /// An arithmetic overflow occurred during the payout computation.
    #[error("arithmetic overflow computing payout for investment {0}")]
    ArithmeticOverflow(InvestmentId),
}

impl InvestmentError {
    /// The error class callers dispatch on.
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::UnknownTerm { .. } => ErrorKind::NotFound,
            Self::AlreadyMatured(_) | Self::NotYetDue { .. } => ErrorKind::InvalidStateTransition,
            Self::ArithmeticOverflow(_) => ErrorKind::InvalidAmount,
        }
    }
}
