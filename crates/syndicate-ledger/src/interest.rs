//! Interest accrual.
//!
//! Interest is computed from a single snapshot of the four sub-balances taken
//! before any credit is applied, so the order in which accounts are credited
//! can never influence the amounts. Both the total and each account's share
//! are floored to whole units; the flooring remainder is not paid out.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use syndicate_types::{AccountKind, Balances, JournalEntryType, LedgerAccount};

use crate::{Ledger, LedgerError};

/// Tunables for periodic interest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InterestPolicy {
    /// Minimum total balance that earns interest (default: 10 000).
    pub min_balance: Decimal,
    /// Rate applied below the bonus threshold (default: 1%).
    pub base_rate: Decimal,
    /// Total balance from which the bonus rate applies (default: 1 000 000).
    pub bonus_threshold: Decimal,
    /// Rate applied at or above the bonus threshold (default: 1.5%).
    pub bonus_rate: Decimal,
    /// Minimum days between two accruals for one organization (default: 7).
    pub interval_days: u32,
}

impl Default for InterestPolicy {
    fn default() -> Self {
        Self {
            min_balance: Decimal::new(10_000, 0),
            base_rate: Decimal::new(1, 2),
            bonus_threshold: Decimal::new(1_000_000, 0),
            bonus_rate: Decimal::new(15, 3),
            interval_days: 7,
        }
    }
}

impl InterestPolicy {
    /// Whether the account is due for another accrual at `now`.
    pub fn is_due(&self, account: &LedgerAccount, now: DateTime<Utc>) -> bool {
        account.last_interest_at.is_none_or(|last| {
            last.checked_add_signed(Duration::days(i64::from(self.interval_days)))
                .is_none_or(|next| next <= now)
        })
    }
}

/// Outcome of one interest evaluation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InterestAccrual {
    /// Total balance is under the minimum; nothing was paid.
    BelowThreshold {
        /// Total balance at snapshot time.
        total: Decimal,
    },
    /// Interest was paid.
    Accrued {
        /// Rate that applied.
        rate: Decimal,
        /// Floored interest on the total.
        interest: Decimal,
        /// Amount credited to each sub-account (zero-weight accounts omitted).
        credits: BTreeMap<AccountKind, Decimal>,
    },
}

impl InterestAccrual {
    /// Sum of all per-account credits.
    pub fn credited(&self) -> Decimal {
        match self {
            Self::BelowThreshold { .. } => Decimal::ZERO,
            Self::Accrued { credits, .. } => credits
                .values()
                .fold(Decimal::ZERO, |acc, value| acc.saturating_add(*value)),
        }
    }
}

/// Compute interest for a balance snapshot without applying it.
///
/// Each account receives `floor(interest * balance / total)`.
pub fn compute_interest(
    snapshot: &Balances,
    policy: &InterestPolicy,
) -> Result<InterestAccrual, LedgerError> {
    let total = snapshot.total();
    if total <= Decimal::ZERO || total < policy.min_balance {
        return Ok(InterestAccrual::BelowThreshold { total });
    }

    let rate = if total >= policy.bonus_threshold {
        policy.bonus_rate
    } else {
        policy.base_rate
    };
    let interest = total
        .checked_mul(rate)
        .ok_or(LedgerError::Overflow {
            account: AccountKind::Operating,
        })?
        .floor();

    let mut credits = BTreeMap::new();
    for kind in AccountKind::ALL {
        let weight = snapshot.get(kind);
        if weight <= Decimal::ZERO {
            continue;
        }
        let share = interest
            .checked_mul(weight)
            .and_then(|scaled| scaled.checked_div(total))
            .ok_or(LedgerError::Overflow { account: kind })?
            .floor();
        if share > Decimal::ZERO {
            credits.insert(kind, share);
        }
    }

    Ok(InterestAccrual::Accrued {
        rate,
        interest,
        credits,
    })
}

impl Ledger {
    /// Accrue interest from the current balances and stamp
    /// `last_interest_at`, whether or not anything was paid.
    pub fn accrue_interest(&mut self, policy: &InterestPolicy) -> Result<InterestAccrual, LedgerError> {
        let snapshot = *self.balances();
        let accrual = compute_interest(&snapshot, policy)?;
        if let InterestAccrual::Accrued { credits, .. } = &accrual {
            for (kind, amount) in credits {
                self.credit(*kind, *amount, JournalEntryType::Interest, None)?;
            }
        }
        let now = self.now();
        self.mark_interest(now);
        Ok(accrual)
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use syndicate_types::OrganizationId;

    use super::*;
    use crate::ConservationResult;

    fn ledger_with(balances: Balances) -> Ledger {
        let now = Utc::now();
        let mut account = LedgerAccount::open(OrganizationId::new(), now);
        account.balances = balances;
        Ledger::new(account, now)
    }

    #[test]
    fn below_minimum_pays_nothing() {
        let balances = Balances {
            operating: dec!(9999),
            ..Balances::default()
        };
        let accrual = compute_interest(&balances, &InterestPolicy::default());
        assert_eq!(
            accrual.ok(),
            Some(InterestAccrual::BelowThreshold { total: dec!(9999) })
        );
    }

    #[test]
    fn base_rate_split_by_weight() {
        let balances = Balances {
            operating: dec!(15000),
            war: dec!(5000),
            investment: Decimal::ZERO,
            emergency: Decimal::ZERO,
        };
        let accrual = compute_interest(&balances, &InterestPolicy::default());
        match accrual {
            Ok(InterestAccrual::Accrued {
                rate,
                interest,
                credits,
            }) => {
                assert_eq!(rate, dec!(0.01));
                assert_eq!(interest, dec!(200));
                assert_eq!(credits.get(&AccountKind::Operating), Some(&dec!(150)));
                assert_eq!(credits.get(&AccountKind::War), Some(&dec!(50)));
                assert!(!credits.contains_key(&AccountKind::Investment));
            }
            other => unreachable!("unexpected accrual {other:?}"),
        }
    }

    #[test]
    fn bonus_rate_applies_at_threshold() {
        let balances = Balances {
            operating: dec!(1000000),
            ..Balances::default()
        };
        let accrual = compute_interest(&balances, &InterestPolicy::default());
        assert!(matches!(
            accrual,
            Ok(InterestAccrual::Accrued { rate, interest, .. })
                if rate == dec!(0.015) && interest == dec!(15000)
        ));
    }

    #[test]
    fn split_floors_each_share() {
        let balances = Balances {
            operating: dec!(10001),
            war: dec!(10001),
            investment: dec!(10001),
            emergency: Decimal::ZERO,
        };
        // interest = floor(30003 * 0.01) = 300, each third = 100.
        let accrual = compute_interest(&balances, &InterestPolicy::default());
        assert_eq!(accrual.map(|a| a.credited()).ok(), Some(dec!(300)));
    }

    #[test]
    fn accrue_interest_credits_and_stamps() {
        let mut ledger = ledger_with(Balances {
            operating: dec!(20000),
            emergency: dec!(20000),
            ..Balances::default()
        });
        let accrual = ledger.accrue_interest(&InterestPolicy::default());
        assert!(accrual.is_ok());
        assert_eq!(ledger.balances().operating, dec!(20200));
        assert_eq!(ledger.balances().emergency, dec!(20200));
        assert!(ledger.account().last_interest_at.is_some());
        assert_eq!(ledger.verify_conservation(), ConservationResult::Balanced);
    }

    #[test]
    fn interest_due_respects_interval() {
        let now = Utc::now();
        let policy = InterestPolicy::default();
        let mut account = LedgerAccount::open(OrganizationId::new(), now);
        assert!(policy.is_due(&account, now));
        account.last_interest_at = now.checked_sub_signed(Duration::days(3));
        assert!(!policy.is_due(&account, now));
        account.last_interest_at = now.checked_sub_signed(Duration::days(7));
        assert!(policy.is_due(&account, now));
    }
}
