//! Conservation verification for organization accounts.
//!
//! Money only enters or leaves an account through journaled movements. For
//! every sub-account A, the check is:
//!
//! ```text
//! opening(A) + sum(delta of entries on A) == closing(A)
//! closing(A) >= 0
//! ```
//!
//! A violation produces a [`LedgerAnomaly`], the economy's most critical
//! integrity alert.

use std::collections::BTreeMap;

use rust_decimal::Decimal;

use syndicate_types::{AccountKind, Balances, JournalEntry};

use crate::LedgerAnomaly;

/// The result of a conservation check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConservationResult {
    /// The journal explains every balance and none is negative.
    Balanced,
    /// At least one account is unexplained or negative.
    Anomaly(LedgerAnomaly),
}

/// Verify that `opening` plus the journal deltas equals `closing` for every
/// sub-account, and that no closing sub-balance is negative.
pub fn verify_conservation(
    opening: &Balances,
    closing: &Balances,
    journal: &[JournalEntry],
) -> ConservationResult {
    let mut expected: BTreeMap<AccountKind, Decimal> = AccountKind::ALL
        .iter()
        .map(|kind| (*kind, opening.get(*kind)))
        .collect();

    for entry in journal {
        let slot = expected.entry(entry.account).or_insert(Decimal::ZERO);
        *slot = match slot.checked_add(entry.delta) {
            Some(value) => value,
            None => return overflow_anomaly(entry.account),
        };
    }

    let mut mismatches = BTreeMap::new();
    for (kind, want) in &expected {
        let actual = closing.get(*kind);
        if *want != actual {
            mismatches.insert(*kind, (*want, actual));
        }
    }

    let negative: Vec<AccountKind> = AccountKind::ALL
        .iter()
        .copied()
        .filter(|kind| closing.get(*kind) < Decimal::ZERO)
        .collect();

    if mismatches.is_empty() && negative.is_empty() {
        return ConservationResult::Balanced;
    }

    let message = format!(
        "LEDGER_ANOMALY: {} unexplained account(s), {} negative account(s)",
        mismatches.len(),
        negative.len()
    );
    tracing::error!(
        target: "syndicate::audit",
        mismatched = mismatches.len(),
        negative = negative.len(),
        "ledger conservation violated"
    );
    ConservationResult::Anomaly(LedgerAnomaly {
        mismatches,
        negative,
        message,
    })
}

fn overflow_anomaly(account: AccountKind) -> ConservationResult {
    ConservationResult::Anomaly(LedgerAnomaly {
        mismatches: BTreeMap::new(),
        negative: Vec::new(),
        message: format!("LEDGER_ANOMALY: overflow while summing {account:?}"),
    })
}
