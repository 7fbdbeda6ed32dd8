//! Error type for services and jobs.

use syndicate_economy::{BusinessError, HeistError, InvestmentError, MarketError};
use syndicate_ledger::{LedgerAnomaly, LedgerError};
use syndicate_types::ErrorKind;

use crate::store::StoreError;

/// Anything a service call or job run can fail with.
///
/// Every failure aborts the enclosing transaction.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    /// Ledger rule violated.
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    /// Business rule violated.
    #[error(transparent)]
    Business(#[from] BusinessError),

    /// Heist rule violated.
    #[error(transparent)]
    Heist(#[from] HeistError),

    /// Market evaluation failed.
    #[error(transparent)]
    Market(#[from] MarketError),

    /// Investment rule violated.
    #[error(transparent)]
    Investment(#[from] InvestmentError),

    /// Storage, lock, or cache backend failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// A referenced record or catalog entry does not exist.
    #[error("{entity} not found: {id}")]
    NotFound {
        /// Kind of record.
        entity: &'static str,
        /// Its identifier or key.
        id: String,
    },

    /// The journal does not explain an account's balances. Nothing is
    /// written.
    #[error("ledger conservation violated: {0}")]
    Conservation(Box<LedgerAnomaly>),
}

impl ServiceError {
    /// Shorthand for [`ServiceError::NotFound`].
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// The error class callers dispatch on.
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Ledger(err) => err.kind(),
            Self::Business(err) => err.kind(),
            Self::Heist(err) => err.kind(),
            Self::Market(err) => err.kind(),
            Self::Investment(err) => err.kind(),
            Self::Store(err) => err.kind(),
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::Conservation(_) => ErrorKind::Storage,
        }
    }
}

#[cfg(test)]
mod tests {
    use syndicate_types::{AccountKind, CharacterId};

    use super::*;

    #[test]
    fn kind_passes_through_wrapped_errors() {
        let err = ServiceError::from(LedgerError::NotAuthorized {
            character: CharacterId::new(),
            action: "withdraw",
        });
        assert_eq!(err.kind(), ErrorKind::NotAuthorized);

        let err = ServiceError::from(LedgerError::SameAccount {
            account: AccountKind::War,
        });
        assert_eq!(err.kind(), ErrorKind::InvalidAmount);

        assert_eq!(ServiceError::not_found("heist", "x").kind(), ErrorKind::NotFound);
    }
}
