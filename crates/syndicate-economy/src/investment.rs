//! Fixed-term investments.
//!
//! Placing an investment moves principal out of the investment account; at
//! maturity the principal comes back with `floor(principal * rate)` on top.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use syndicate_types::{Investment, InvestmentStatus, OrganizationId};

use crate::config::InvestmentTerm;
use crate::error::InvestmentError;

/// Open a new investment on the product with the requested term.
pub fn place(
    organization_id: OrganizationId,
    principal: Decimal,
    term_days: u32,
    terms: &[InvestmentTerm],
    now: DateTime<Utc>,
) -> Result<Investment, InvestmentError> {
    let term = terms
        .iter()
        .find(|term| term.days == term_days)
        .ok_or(InvestmentError::UnknownTerm { days: term_days })?;
    Ok(Investment::place(
        organization_id,
        principal,
        term.rate,
        term.days,
        now,
    ))
}

/// Whether an active investment has reached maturity.
pub fn is_due(investment: &Investment, now: DateTime<Utc>) -> bool {
    investment.status == InvestmentStatus::Active && investment.matures_at <= now
}

/// Principal plus floored return.
pub fn maturity_payout(investment: &Investment) -> Result<Decimal, InvestmentError> {
    investment
        .principal
        .checked_mul(investment.return_rate)
        .map(|gain| gain.floor())
        .and_then(|gain| investment.principal.checked_add(gain))
        .ok_or(InvestmentError::ArithmeticOverflow(investment.id))
}

/// Mark a due investment matured and return the amount to credit.
pub fn mature(investment: &mut Investment, now: DateTime<Utc>) -> Result<Decimal, InvestmentError> {
    if investment.status == InvestmentStatus::Matured {
        return Err(InvestmentError::AlreadyMatured(investment.id));
    }
    if investment.matures_at > now {
        return Err(InvestmentError::NotYetDue {
            id: investment.id,
            matures_at: investment.matures_at,
        });
    }
    let payout = maturity_payout(investment)?;
    investment.status = InvestmentStatus::Matured;
    investment.payout = Some(payout);
    Ok(payout)
}
