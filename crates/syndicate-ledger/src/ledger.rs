//! The working copy of one organization's account inside a transaction.
//!
//! A [`Ledger`] wraps a [`LedgerAccount`] loaded under a row lock, applies
//! validated movements to it, and captures one [`JournalEntry`] per
//! movement. Every operation checks all preconditions before touching any
//! balance, so a failed call leaves the working copy unchanged.
//!
//! # Design
//!
//! - **No negatives**: debits fail with [`LedgerError::InsufficientFunds`]
//!   instead of overdrawing.
//! - **Whole cents**: amounts are positive with at most two decimal places.
//! - **Audit**: every movement appends exactly one journal entry (two for an
//!   internal transfer).

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use syndicate_types::{
    AccountKind, Balances, CharacterId, JournalEntry, JournalEntryType, LedgerAccount,
    OrganizationId, PayrollConfig,
};

use crate::conservation::{ConservationResult, verify_conservation};
use crate::{JournalEntryBuilder, LedgerError};

/// Maximum number of decimal places an amount may carry.
const MAX_SCALE: u32 = 2;

/// Validate that an amount is strictly positive and has at most two decimal
/// places.
///
/// Trailing zeros are ignored, so `12.500` is accepted as `12.50`.
pub fn validate_amount(amount: Decimal) -> Result<Decimal, LedgerError> {
    if amount <= Decimal::ZERO || amount.normalize().scale() > MAX_SCALE {
        return Err(LedgerError::InvalidAmount { amount });
    }
    Ok(amount)
}

/// Like [`validate_amount`] but zero is allowed.
///
/// For configured rates such as wages and bonuses, where zero means "none".
pub fn validate_rate(amount: Decimal) -> Result<Decimal, LedgerError> {
    if amount < Decimal::ZERO || amount.normalize().scale() > MAX_SCALE {
        return Err(LedgerError::InvalidAmount { amount });
    }
    Ok(amount)
}

// ---------------------------------------------------------------------------
// Ledger
// ---------------------------------------------------------------------------

/// An organization account plus the journal of movements applied to it.
#[derive(Debug, Clone)]
pub struct Ledger {
    account: LedgerAccount,
    opening: Balances,
    journal: Vec<JournalEntry>,
    now: DateTime<Utc>,
}

impl Ledger {
    /// Wrap an account loaded at `now`. Its current balances become the
    /// opening snapshot for conservation checks.
    pub const fn new(account: LedgerAccount, now: DateTime<Utc>) -> Self {
        let opening = account.balances;
        Self {
            account,
            opening,
            journal: Vec::new(),
            now,
        }
    }

    /// The organization that owns the account.
    pub const fn organization_id(&self) -> OrganizationId {
        self.account.organization_id
    }

    /// The account in its current working state.
    pub const fn account(&self) -> &LedgerAccount {
        &self.account
    }

    /// Current sub-balances.
    pub const fn balances(&self) -> &Balances {
        &self.account.balances
    }

    /// Sub-balances when the ledger was opened.
    pub const fn opening(&self) -> &Balances {
        &self.opening
    }

    /// Entries recorded since the ledger was opened.
    pub fn journal(&self) -> &[JournalEntry] {
        &self.journal
    }

    /// The instant all entries are stamped with.
    pub const fn now(&self) -> DateTime<Utc> {
        self.now
    }

    /// Mutable access to the embedded payroll settings.
    pub const fn payroll_mut(&mut self) -> &mut PayrollConfig {
        &mut self.account.payroll
    }

    /// Record when interest was last evaluated.
    pub const fn mark_interest(&mut self, at: DateTime<Utc>) {
        self.account.last_interest_at = Some(at);
    }

    /// Credit a sub-account and journal the movement.
    ///
    /// Returns the new sub-balance.
    pub fn credit(
        &mut self,
        account: AccountKind,
        amount: Decimal,
        entry_type: JournalEntryType,
        counterpart: Option<Uuid>,
    ) -> Result<Decimal, LedgerError> {
        let entry = self.entry(account, entry_type, counterpart).credit(amount).build()?;
        let updated = self
            .account
            .balances
            .get(account)
            .checked_add(amount)
            .ok_or(LedgerError::Overflow { account })?;
        *self.account.balances.get_mut(account) = updated;
        self.journal.push(entry);
        Ok(updated)
    }

    /// Debit a sub-account and journal the movement.
    ///
    /// Returns the new sub-balance.
    pub fn debit(
        &mut self,
        account: AccountKind,
        amount: Decimal,
        entry_type: JournalEntryType,
        counterpart: Option<Uuid>,
    ) -> Result<Decimal, LedgerError> {
        let entry = self.entry(account, entry_type, counterpart).debit(amount).build()?;
        let updated = self.checked_remaining(account, amount)?;
        *self.account.balances.get_mut(account) = updated;
        self.journal.push(entry);
        Ok(updated)
    }

    /// Move money from a member's personal balance into a sub-account.
    ///
    /// The character side of the movement is applied by the caller through
    /// the same storage transaction.
    pub fn deposit(
        &mut self,
        account: AccountKind,
        amount: Decimal,
        depositor: CharacterId,
    ) -> Result<Decimal, LedgerError> {
        self.credit(
            account,
            amount,
            JournalEntryType::Deposit,
            Some(depositor.into_inner()),
        )
    }

    /// Move money from a sub-account to a member's personal balance.
    pub fn withdraw(
        &mut self,
        account: AccountKind,
        amount: Decimal,
        recipient: CharacterId,
    ) -> Result<Decimal, LedgerError> {
        self.debit(
            account,
            amount,
            JournalEntryType::Withdrawal,
            Some(recipient.into_inner()),
        )
    }

    /// Move money between two sub-accounts of the same organization.
    ///
    /// Rejects a transfer into the source account itself. Both sides are
    /// validated before either balance moves.
    pub fn transfer(
        &mut self,
        from: AccountKind,
        to: AccountKind,
        amount: Decimal,
    ) -> Result<(), LedgerError> {
        let amount = validate_amount(amount)?;
        if from == to {
            return Err(LedgerError::SameAccount { account: from });
        }

        let out = self
            .entry(from, JournalEntryType::TransferOut, None)
            .debit(amount)
            .build()?;
        let into = self
            .entry(to, JournalEntryType::TransferIn, None)
            .credit(amount)
            .build()?;
        let source = self.checked_remaining(from, amount)?;
        let destination = self
            .account
            .balances
            .get(to)
            .checked_add(amount)
            .ok_or(LedgerError::Overflow { account: to })?;

        *self.account.balances.get_mut(from) = source;
        *self.account.balances.get_mut(to) = destination;
        self.journal.push(out);
        self.journal.push(into);
        Ok(())
    }

    /// Verify that opening balances plus the journal explain the current
    /// balances.
    pub fn verify_conservation(&self) -> ConservationResult {
        verify_conservation(&self.opening, &self.account.balances, &self.journal)
    }

    /// Finish the working copy: the account to persist and the entries to
    /// append.
    pub fn into_parts(mut self) -> (LedgerAccount, Vec<JournalEntry>) {
        self.account.updated_at = self.now;
        (self.account, self.journal)
    }

    fn entry(
        &self,
        account: AccountKind,
        entry_type: JournalEntryType,
        counterpart: Option<Uuid>,
    ) -> JournalEntryBuilder {
        JournalEntryBuilder::new(self.account.organization_id, account, entry_type, self.now)
            .counterpart(counterpart)
    }

    fn checked_remaining(&self, account: AccountKind, amount: Decimal) -> Result<Decimal, LedgerError> {
        let available = self.account.balances.get(account);
        if available < amount {
            return Err(LedgerError::InsufficientFunds {
                account,
                requested: amount,
                available,
            });
        }
        available
            .checked_sub(amount)
            .ok_or(LedgerError::Overflow { account })
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;

    fn funded(operating: Decimal) -> Ledger {
        let now = Utc::now();
        let mut account = LedgerAccount::open(OrganizationId::new(), now);
        account.balances.operating = operating;
        Ledger::new(account, now)
    }

    #[test]
    fn new_ledger_has_empty_journal() {
        let ledger = funded(dec!(100));
        assert!(ledger.journal().is_empty());
        assert_eq!(ledger.opening().operating, dec!(100));
    }

    #[test]
    fn deposit_credits_and_journals() {
        let mut ledger = funded(Decimal::ZERO);
        let member = CharacterId::new();
        let result = ledger.deposit(AccountKind::Emergency, dec!(250.75), member);
        assert_eq!(result.ok(), Some(dec!(250.75)));
        assert_eq!(ledger.journal().len(), 1);
        let entry = ledger.journal().first();
        assert!(entry.is_some_and(|e| e.counterpart == Some(member.into_inner())
            && e.entry_type == JournalEntryType::Deposit));
    }

    #[test]
    fn withdraw_beyond_balance_fails_without_change() {
        let mut ledger = funded(dec!(40));
        let result = ledger.withdraw(AccountKind::Operating, dec!(40.01), CharacterId::new());
        assert!(matches!(
            result,
            Err(LedgerError::InsufficientFunds { available, .. }) if available == dec!(40)
        ));
        assert_eq!(ledger.balances().operating, dec!(40));
        assert!(ledger.journal().is_empty());
    }

    #[test]
    fn withdraw_whole_balance_leaves_zero() {
        let mut ledger = funded(dec!(40));
        let result = ledger.withdraw(AccountKind::Operating, dec!(40), CharacterId::new());
        assert_eq!(result.ok(), Some(Decimal::ZERO));
    }

    #[test]
    fn transfer_moves_between_accounts() {
        let mut ledger = funded(dec!(1000));
        assert!(ledger
            .transfer(AccountKind::Operating, AccountKind::War, dec!(300))
            .is_ok());
        assert_eq!(ledger.balances().operating, dec!(700));
        assert_eq!(ledger.balances().war, dec!(300));
        assert_eq!(ledger.balances().total(), dec!(1000));
        assert_eq!(ledger.journal().len(), 2);
    }

    #[test]
    fn transfer_into_same_account_is_rejected() {
        let mut ledger = funded(dec!(1000));
        let result = ledger.transfer(AccountKind::War, AccountKind::War, dec!(1));
        assert!(matches!(result, Err(LedgerError::SameAccount { .. })));
    }

    #[test]
    fn transfer_with_insufficient_source_changes_nothing() {
        let mut ledger = funded(dec!(10));
        let result = ledger.transfer(AccountKind::Operating, AccountKind::Investment, dec!(11));
        assert!(result.is_err());
        assert_eq!(ledger.balances().operating, dec!(10));
        assert_eq!(ledger.balances().investment, Decimal::ZERO);
        assert!(ledger.journal().is_empty());
    }

    #[test]
    fn amounts_are_validated() {
        assert!(validate_amount(dec!(0.01)).is_ok());
        assert!(validate_amount(dec!(12.500)).is_ok());
        assert!(validate_amount(dec!(0.001)).is_err());
        assert!(validate_amount(Decimal::ZERO).is_err());
        assert!(validate_amount(dec!(-1)).is_err());
    }

    #[test]
    fn rates_allow_zero_but_not_sub_cent() {
        assert!(validate_rate(Decimal::ZERO).is_ok());
        assert!(validate_rate(dec!(10.50)).is_ok());
        assert!(validate_rate(dec!(10.005)).is_err());
        assert!(validate_rate(dec!(-0.01)).is_err());
    }

    #[test]
    fn fractional_cent_deposit_is_rejected() {
        let mut ledger = funded(Decimal::ZERO);
        let result = ledger.deposit(AccountKind::Operating, dec!(1.005), CharacterId::new());
        assert!(matches!(result, Err(LedgerError::InvalidAmount { .. })));
        assert_eq!(ledger.balances().operating, Decimal::ZERO);
    }

    #[test]
    fn mixed_operations_conserve() {
        let mut ledger = funded(dec!(500));
        let member = CharacterId::new();
        assert!(ledger.deposit(AccountKind::Operating, dec!(120), member).is_ok());
        assert!(ledger.transfer(AccountKind::Operating, AccountKind::Emergency, dec!(200)).is_ok());
        assert!(ledger.withdraw(AccountKind::Emergency, dec!(50), member).is_ok());
        assert!(ledger.withdraw(AccountKind::War, dec!(1), member).is_err());
        assert_eq!(ledger.verify_conservation(), ConservationResult::Balanced);
        assert_eq!(ledger.balances().total(), dec!(570));
    }

    #[test]
    fn into_parts_stamps_update_time() {
        let ledger = funded(dec!(1));
        let now = ledger.now();
        let (account, journal) = ledger.into_parts();
        assert_eq!(account.updated_at, now);
        assert!(journal.is_empty());
    }
}
