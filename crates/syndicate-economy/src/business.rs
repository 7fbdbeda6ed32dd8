//! Organization-owned business rules: income, raids, reopening, sale.
//!
//! Functions here mutate a [`Business`] in place and report the money that
//! must move. The caller applies that money to the ledger inside the same
//! storage transaction as the business update.

use chrono::{DateTime, Duration, NaiveTime, Utc};
use rand::Rng;
use rust_decimal::Decimal;
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};

use syndicate_types::{
    Business, BusinessCategory, BusinessStatus, BusinessType, Organization, OrganizationId,
};

use crate::config::BusinessRules;
use crate::error::BusinessError;

// ---------------------------------------------------------------------------
// Income
// ---------------------------------------------------------------------------

/// One day's income roll for a business.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IncomeRoll {
    /// Gross income drawn from the income range.
    pub gross: Decimal,
    /// Gross minus operating cost; may be negative.
    pub net: Decimal,
    /// Amount actually credited: `max(net, 0)`.
    pub credited: Decimal,
}

/// Midnight UTC of the day containing `now`.
pub fn day_start(now: DateTime<Utc>) -> DateTime<Utc> {
    now.date_naive().and_time(NaiveTime::MIN).and_utc()
}

/// Whether the business should be paid for today.
pub fn income_due(business: &Business, now: DateTime<Utc>) -> bool {
    business.status == BusinessStatus::Active
        && business
            .last_income_at
            .is_none_or(|last| last < day_start(now))
}

/// Roll today's income: a uniform whole amount in `[income_min, income_max]`
/// minus the operating cost.
pub fn daily_income(business: &Business, rng: &mut impl Rng) -> Result<IncomeRoll, BusinessError> {
    let gross = roll_whole(business.income_min, business.income_max, rng).ok_or(
        BusinessError::InvalidIncomeRange {
            min: business.income_min,
            max: business.income_max,
        },
    )?;
    let net = gross
        .checked_sub(business.operating_cost)
        .ok_or(BusinessError::ArithmeticOverflow {
            context: "daily net income",
        })?;
    Ok(IncomeRoll {
        gross,
        net,
        credited: net.max(Decimal::ZERO),
    })
}

/// Record a credited income roll on the business.
pub fn apply_income(
    business: &mut Business,
    roll: &IncomeRoll,
    now: DateTime<Utc>,
) -> Result<(), BusinessError> {
    business.total_earnings = business
        .total_earnings
        .checked_add(roll.credited)
        .ok_or(BusinessError::ArithmeticOverflow {
            context: "total earnings",
        })?;
    business.last_income_at = Some(now);
    Ok(())
}

/// Uniform whole number in `[min, max]`, or `None` if the range is empty or
/// out of `i64` range.
pub(crate) fn roll_whole(min: Decimal, max: Decimal, rng: &mut impl Rng) -> Option<Decimal> {
    let lo = min.ceil().to_i64()?;
    let hi = max.floor().to_i64()?;
    if lo > hi {
        return None;
    }
    Some(Decimal::from(rng.random_range(lo..=hi)))
}

// ---------------------------------------------------------------------------
// Raids
// ---------------------------------------------------------------------------

/// Result of one raid check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RaidOutcome {
    /// No raid; the next check is scheduled.
    Clear {
        /// When the next check is due.
        next_check: DateTime<Utc>,
    },
    /// The business was raided and owes a fine.
    Raided {
        /// Fine to debit from operating.
        fine: Decimal,
        /// Closure length in days.
        closure_days: u32,
        /// Whether this raid closed the business for good.
        permanent: bool,
    },
}

/// Whether a raid check is due: criminal, active, and past `next_raid_check`.
pub fn raid_due(business: &Business, now: DateTime<Utc>) -> bool {
    business.category == BusinessCategory::Criminal
        && business.status == BusinessStatus::Active
        && business.next_raid_check.is_some_and(|due| due <= now)
}

/// Roll a raid check and apply its effect to the business.
///
/// A raid sets status `Raided`, bumps the raid count, and closes the business
/// for a uniform `[closure_min_days, closure_max_days]`. Reaching
/// `permanent_closure_raids` closes it for good instead. The fine is
/// `floor(startup * (1 + u * fine_spread))` with `u` uniform in `[0, 1)`.
pub fn raid_check(
    business: &mut Business,
    rules: &BusinessRules,
    now: DateTime<Utc>,
    rng: &mut impl Rng,
) -> Result<RaidOutcome, BusinessError> {
    let probability = business.risk_tier.raid_probability();
    if rng.random::<f64>() >= probability {
        let next_check = add_days(now, 1);
        business.next_raid_check = Some(next_check);
        return Ok(RaidOutcome::Clear { next_check });
    }

    let multiplier = Decimal::from_f64(1.0 + rng.random::<f64>() * rules.fine_spread).ok_or(
        BusinessError::ArithmeticOverflow {
            context: "raid fine multiplier",
        },
    )?;
    let fine = business
        .startup_cost
        .checked_mul(multiplier)
        .ok_or(BusinessError::ArithmeticOverflow { context: "raid fine" })?
        .floor();
    let low = rules.closure_min_days.min(rules.closure_max_days);
    let high = rules.closure_min_days.max(rules.closure_max_days);
    let closure_days = rng.random_range(low..=high);

    business.raid_count = business.raid_count.saturating_add(1);
    let permanent = business.raid_count >= rules.permanent_closure_raids;
    if permanent {
        business.status = BusinessStatus::Closed;
        business.closed_until = None;
        business.next_raid_check = None;
    } else {
        business.status = BusinessStatus::Raided;
        business.closed_until = Some(add_days(now, closure_days));
    }

    Ok(RaidOutcome::Raided {
        fine,
        closure_days,
        permanent,
    })
}

/// Extend a raid closure because the fine could not be paid.
pub fn extend_closure(business: &mut Business, rules: &BusinessRules) {
    if business.status == BusinessStatus::Raided {
        business.closed_until = business
            .closed_until
            .map(|until| add_days(until, rules.unpaid_fine_extension_days));
    }
}

/// Reopen a raided business whose closure has elapsed. Returns whether it
/// reopened; calling it again is a no-op.
pub fn reopen_if_elapsed(business: &mut Business, now: DateTime<Utc>) -> bool {
    let elapsed = business.status == BusinessStatus::Raided
        && business.closed_until.is_some_and(|until| until <= now);
    if !elapsed {
        return false;
    }
    business.status = BusinessStatus::Active;
    business.closed_until = None;
    if business.category == BusinessCategory::Criminal {
        business.next_raid_check = Some(add_days(now, 1));
    }
    true
}

// ---------------------------------------------------------------------------
// Purchase and sale
// ---------------------------------------------------------------------------

/// Check catalog requirements for a purchase.
pub const fn validate_purchase(
    organization: &Organization,
    business_type: &BusinessType,
) -> Result<(), BusinessError> {
    if organization.level < business_type.required_level {
        return Err(BusinessError::LevelTooLow {
            required: business_type.required_level,
            actual: organization.level,
        });
    }
    Ok(())
}

/// Close a business for sale and return the proceeds:
/// `floor(startup_cost * sale_value_ratio)`.
pub fn sell(
    business: &mut Business,
    seller: OrganizationId,
    rules: &BusinessRules,
) -> Result<Decimal, BusinessError> {
    if business.organization_id != seller {
        return Err(BusinessError::NotOwned(business.id));
    }
    match business.status {
        BusinessStatus::Closed => return Err(BusinessError::AlreadyClosed(business.id)),
        BusinessStatus::Raided => {
            return Err(BusinessError::UnderRaid {
                business: business.id,
                until: business.closed_until,
            });
        }
        BusinessStatus::Active => {}
    }
    let proceeds = business
        .startup_cost
        .checked_mul(rules.sale_value_ratio)
        .ok_or(BusinessError::ArithmeticOverflow {
            context: "sale proceeds",
        })?
        .floor();
    business.status = BusinessStatus::Closed;
    business.next_raid_check = None;
    Ok(proceeds)
}

fn add_days(at: DateTime<Utc>, days: u32) -> DateTime<Utc> {
    at.checked_add_signed(Duration::days(i64::from(days)))
        .unwrap_or(at)
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use rust_decimal_macros::dec;

    use syndicate_types::{BusinessTypeKey, CharacterId, MarketCategory, RiskTier, ZoneKey};

    use super::*;

    fn catalog(category: BusinessCategory, risk_tier: RiskTier) -> BusinessType {
        BusinessType {
            key: BusinessTypeKey::new("chop_shop"),
            name: "Chop Shop".to_owned(),
            category,
            market: MarketCategory::Workshop,
            startup_cost: dec!(10000),
            income_min: dec!(500),
            income_max: dec!(900),
            operating_cost: dec!(200),
            risk_tier,
            required_level: 2,
        }
    }

    fn business(risk_tier: RiskTier) -> Business {
        Business::purchase(
            OrganizationId::new(),
            &catalog(BusinessCategory::Criminal, risk_tier),
            ZoneKey::new("docks"),
            Utc::now(),
        )
    }

    fn organization(level: u32) -> Organization {
        Organization {
            id: OrganizationId::new(),
            name: "Southside".to_owned(),
            level,
            leader_id: CharacterId::new(),
        }
    }

    #[test]
    fn income_stays_within_range() {
        let mut rng = StdRng::seed_from_u64(7);
        let shop = business(RiskTier::Risky);
        for _ in 0..200 {
            let roll = daily_income(&shop, &mut rng);
            assert!(roll.is_ok_and(|r| r.gross >= dec!(500)
                && r.gross <= dec!(900)
                && r.net == r.gross - dec!(200)
                && r.credited == r.net));
        }
    }

    #[test]
    fn negative_net_credits_nothing() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut shop = business(RiskTier::Risky);
        shop.operating_cost = dec!(5000);
        let roll = daily_income(&shop, &mut rng);
        assert!(roll.is_ok_and(|r| r.net < Decimal::ZERO && r.credited == Decimal::ZERO));
    }

    #[test]
    fn inverted_income_range_is_rejected() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut shop = business(RiskTier::Risky);
        shop.income_min = dec!(1000);
        assert!(matches!(
            daily_income(&shop, &mut rng),
            Err(BusinessError::InvalidIncomeRange { .. })
        ));
    }

    #[test]
    fn income_due_once_per_day() {
        let now = Utc::now();
        let mut shop = business(RiskTier::Risky);
        assert!(income_due(&shop, now));
        let roll = IncomeRoll {
            gross: dec!(600),
            net: dec!(400),
            credited: dec!(400),
        };
        assert!(apply_income(&mut shop, &roll, now).is_ok());
        assert!(!income_due(&shop, now));
        assert_eq!(shop.total_earnings, dec!(400));
        assert!(income_due(&shop, now + Duration::days(1)));
    }

    #[test]
    fn raided_business_earns_nothing() {
        let mut shop = business(RiskTier::Risky);
        shop.status = BusinessStatus::Raided;
        assert!(!income_due(&shop, Utc::now()));
    }

    #[test]
    fn safe_tier_is_never_raided() {
        let mut rng = StdRng::seed_from_u64(3);
        let now = Utc::now();
        let mut shop = business(RiskTier::Safe);
        for _ in 0..500 {
            let outcome = raid_check(&mut shop, &BusinessRules::default(), now, &mut rng);
            assert!(matches!(outcome, Ok(RaidOutcome::Clear { .. })));
        }
        assert_eq!(shop.next_raid_check, Some(now + Duration::days(1)));
    }

    #[test]
    fn raid_rate_matches_tier() {
        let mut rng = StdRng::seed_from_u64(0x5eed);
        let now = Utc::now();
        let rules = BusinessRules {
            permanent_closure_raids: u32::MAX,
            ..BusinessRules::default()
        };
        let trials = 10_000_u32;
        let mut raids = 0_u32;
        for _ in 0..trials {
            let mut shop = business(RiskTier::VeryRisky);
            if let Ok(RaidOutcome::Raided { .. }) = raid_check(&mut shop, &rules, now, &mut rng) {
                raids += 1;
            }
        }
        let rate = f64::from(raids) / f64::from(trials);
        assert!((rate - 0.15).abs() < 0.02, "raid rate {rate}");
    }

    #[test]
    fn raid_sets_fine_and_closure_bounds() {
        let mut rng = StdRng::seed_from_u64(11);
        let now = Utc::now();
        let rules = BusinessRules::default();
        let mut seen = 0;
        for _ in 0..2_000 {
            let mut shop = business(RiskTier::ExtremelyRisky);
            if let Ok(RaidOutcome::Raided {
                fine,
                closure_days,
                permanent,
            }) = raid_check(&mut shop, &rules, now, &mut rng)
            {
                seen += 1;
                assert!(fine >= dec!(10000) && fine < dec!(30000));
                assert_eq!(fine, fine.floor());
                assert!((3..=7).contains(&closure_days));
                assert!(!permanent);
                assert_eq!(shop.status, BusinessStatus::Raided);
                assert_eq!(shop.raid_count, 1);
                assert_eq!(
                    shop.closed_until,
                    Some(now + Duration::days(i64::from(closure_days)))
                );
            }
        }
        assert!(seen > 0);
    }

    #[test]
    fn fifth_raid_closes_permanently() {
        let mut rng = StdRng::seed_from_u64(5);
        let now = Utc::now();
        let mut shop = business(RiskTier::ExtremelyRisky);
        shop.raid_count = 4;
        let outcome = loop {
            let outcome = raid_check(&mut shop, &BusinessRules::default(), now, &mut rng);
            if let Ok(RaidOutcome::Raided { permanent, .. }) = outcome {
                break permanent;
            }
        };
        assert!(outcome);
        assert_eq!(shop.status, BusinessStatus::Closed);
        assert!(shop.closed_until.is_none());
    }

    #[test]
    fn unpaid_fine_extends_closure() {
        let now = Utc::now();
        let mut shop = business(RiskTier::Risky);
        shop.status = BusinessStatus::Raided;
        shop.closed_until = Some(now + Duration::days(4));
        extend_closure(&mut shop, &BusinessRules::default());
        assert_eq!(shop.closed_until, Some(now + Duration::days(11)));
    }

    #[test]
    fn reopen_is_idempotent() {
        let now = Utc::now();
        let mut shop = business(RiskTier::Risky);
        shop.status = BusinessStatus::Raided;
        shop.closed_until = Some(now - Duration::hours(1));
        assert!(reopen_if_elapsed(&mut shop, now));
        let after_first = shop.clone();
        assert!(!reopen_if_elapsed(&mut shop, now));
        assert_eq!(shop, after_first);
        assert_eq!(shop.status, BusinessStatus::Active);
        assert_eq!(shop.next_raid_check, Some(now + Duration::days(1)));
    }

    #[test]
    fn closure_not_yet_elapsed_stays_raided() {
        let now = Utc::now();
        let mut shop = business(RiskTier::Risky);
        shop.status = BusinessStatus::Raided;
        shop.closed_until = Some(now + Duration::hours(1));
        assert!(!reopen_if_elapsed(&mut shop, now));
        assert_eq!(shop.status, BusinessStatus::Raided);
    }

    #[test]
    fn purchase_requires_level() {
        let entry = catalog(BusinessCategory::Legal, RiskTier::Safe);
        assert!(matches!(
            validate_purchase(&organization(1), &entry),
            Err(BusinessError::LevelTooLow { required: 2, actual: 1 })
        ));
        assert!(validate_purchase(&organization(2), &entry).is_ok());
    }

    #[test]
    fn sale_returns_half_and_closes() {
        let mut shop = business(RiskTier::Risky);
        let owner = shop.organization_id;
        let proceeds = sell(&mut shop, owner, &BusinessRules::default());
        assert_eq!(proceeds.ok(), Some(dec!(5000)));
        assert_eq!(shop.status, BusinessStatus::Closed);
        assert!(matches!(
            sell(&mut shop, owner, &BusinessRules::default()),
            Err(BusinessError::AlreadyClosed(_))
        ));
    }

    #[test]
    fn cannot_sell_someone_elses_business() {
        let mut shop = business(RiskTier::Risky);
        let result = sell(&mut shop, OrganizationId::new(), &BusinessRules::default());
        assert!(matches!(result, Err(BusinessError::NotOwned(_))));
        assert_eq!(shop.status, BusinessStatus::Active);
    }
}
