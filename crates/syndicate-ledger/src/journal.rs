//! Journal entry construction.
//!
//! Provides a [`JournalEntryBuilder`] that enforces the journal invariant:
//! every entry names one sub-account, carries a strictly positive magnitude,
//! and records its direction as the sign of `delta`. Builders validate inputs
//! before producing a [`JournalEntry`].

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use syndicate_types::{AccountKind, JournalEntry, JournalEntryId, JournalEntryType, OrganizationId};

use crate::LedgerError;
use crate::ledger::validate_amount;

/// Direction of a journal movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
    Credit,
    Debit,
}

/// Builder for constructing validated [`JournalEntry`] values.
///
/// # Examples
///
/// ```
/// use chrono::Utc;
/// use rust_decimal::Decimal;
/// use syndicate_ledger::JournalEntryBuilder;
/// use syndicate_types::{AccountKind, JournalEntryType, OrganizationId};
///
/// let entry = JournalEntryBuilder::new(
///     OrganizationId::new(),
///     AccountKind::Operating,
///     JournalEntryType::RaidFine,
///     Utc::now(),
/// )
/// .debit(Decimal::new(7_500, 0))
/// .build();
///
/// assert!(entry.is_ok_and(|e| e.delta == Decimal::new(-7_500, 0)));
/// ```
#[derive(Debug)]
pub struct JournalEntryBuilder {
    organization_id: OrganizationId,
    account: AccountKind,
    entry_type: JournalEntryType,
    movement: Option<(Side, Decimal)>,
    counterpart: Option<Uuid>,
    memo: Option<String>,
    created_at: DateTime<Utc>,
}

impl JournalEntryBuilder {
    /// Start building an entry on one sub-account.
    pub const fn new(
        organization_id: OrganizationId,
        account: AccountKind,
        entry_type: JournalEntryType,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            organization_id,
            account,
            entry_type,
            movement: None,
            counterpart: None,
            memo: None,
            created_at,
        }
    }

    /// Record money arriving in the sub-account.
    #[must_use]
    pub const fn credit(mut self, amount: Decimal) -> Self {
        self.movement = Some((Side::Credit, amount));
        self
    }

    /// Record money leaving the sub-account.
    #[must_use]
    pub const fn debit(mut self, amount: Decimal) -> Self {
        self.movement = Some((Side::Debit, amount));
        self
    }

    /// Link the entry to the record that caused it.
    #[must_use]
    pub const fn counterpart(mut self, id: Option<Uuid>) -> Self {
        self.counterpart = id;
        self
    }

    /// Override the default memo tag.
    #[must_use]
    pub fn memo(mut self, memo: impl Into<String>) -> Self {
        self.memo = Some(memo.into());
        self
    }

    /// Validate inputs and produce a [`JournalEntry`].
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::MissingField`] if neither `credit` nor `debit`
    /// was called, and [`LedgerError::InvalidAmount`] if the magnitude is not
    /// a positive whole-cent amount.
    pub fn build(self) -> Result<JournalEntry, LedgerError> {
        let (side, amount) = self.movement.ok_or(LedgerError::MissingField("amount"))?;
        let amount = validate_amount(amount)?;
        let mut delta = amount;
        delta.set_sign_negative(side == Side::Debit);

        Ok(JournalEntry {
            id: JournalEntryId::new(),
            organization_id: self.organization_id,
            account: self.account,
            entry_type: self.entry_type,
            delta,
            counterpart: self.counterpart,
            memo: self
                .memo
                .unwrap_or_else(|| memo_tag(self.entry_type).to_owned()),
            created_at: self.created_at,
        })
    }
}

/// Default machine-readable memo for each entry type.
pub const fn memo_tag(entry_type: JournalEntryType) -> &'static str {
    match entry_type {
        JournalEntryType::Deposit => "DEPOSIT",
        JournalEntryType::Withdrawal => "WITHDRAWAL",
        JournalEntryType::TransferOut => "TRANSFER_OUT",
        JournalEntryType::TransferIn => "TRANSFER_IN",
        JournalEntryType::Interest => "INTEREST",
        JournalEntryType::BusinessIncome => "BUSINESS_INCOME",
        JournalEntryType::RaidFine => "RAID_FINE",
        JournalEntryType::BusinessPurchase => "BUSINESS_PURCHASE",
        JournalEntryType::BusinessSale => "BUSINESS_SALE",
        JournalEntryType::Payroll => "PAYROLL",
        JournalEntryType::HeistEquipment => "HEIST_EQUIPMENT",
        JournalEntryType::HeistPayout => "HEIST_PAYOUT",
        JournalEntryType::InvestmentPlaced => "INVESTMENT_PLACED",
        JournalEntryType::InvestmentMatured => "INVESTMENT_MATURED",
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;

    fn builder() -> JournalEntryBuilder {
        JournalEntryBuilder::new(
            OrganizationId::new(),
            AccountKind::War,
            JournalEntryType::TransferIn,
            Utc::now(),
        )
    }

    #[test]
    fn credit_produces_positive_delta() {
        let entry = builder().credit(dec!(12.50)).build();
        assert!(entry.is_ok());
        if let Ok(entry) = entry {
            assert_eq!(entry.delta, dec!(12.50));
            assert_eq!(entry.memo, "TRANSFER_IN");
        }
    }

    #[test]
    fn debit_produces_negative_delta() {
        let entry = builder().debit(dec!(3)).memo("custom").build();
        assert!(entry.is_ok_and(|e| e.delta == dec!(-3) && e.memo == "custom"));
    }

    #[test]
    fn missing_amount_is_rejected() {
        let result = builder().build();
        assert!(matches!(result, Err(LedgerError::MissingField("amount"))));
    }

    #[test]
    fn zero_and_negative_amounts_are_rejected() {
        assert!(matches!(
            builder().credit(Decimal::ZERO).build(),
            Err(LedgerError::InvalidAmount { .. })
        ));
        assert!(matches!(
            builder().debit(dec!(-5)).build(),
            Err(LedgerError::InvalidAmount { .. })
        ));
    }

    #[test]
    fn counterpart_is_recorded() {
        let id = Uuid::now_v7();
        let entry = builder().credit(dec!(1)).counterpart(Some(id)).build();
        assert!(entry.is_ok_and(|e| e.counterpart == Some(id)));
    }
}
