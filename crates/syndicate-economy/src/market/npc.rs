//! Weekly behaviour of world-owned businesses.
//!
//! Each open business takes exactly one action per evaluation: close, cut
//! price, raise price, raise quality, or hold. Closures never take a
//! zone/category below the configured population floor.

use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};

use syndicate_types::{NpcBusiness, NpcBusinessId, NpcPersonality, NpcStatus};

use crate::config::MarketRules;

/// Behavioural constants fixed by personality.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PersonalityProfile {
    /// Probability of surviving a failed week that would otherwise close it.
    pub resilience: f64,
    /// Price modifier change per adjustment.
    pub price_step: f64,
    /// Minimum days between two adjustments.
    pub cooldown_days: i64,
}

/// The constants for a personality.
pub const fn profile(personality: NpcPersonality) -> PersonalityProfile {
    match personality {
        NpcPersonality::Passive => PersonalityProfile {
            resilience: 0.70,
            price_step: 0.03,
            cooldown_days: 14,
        },
        NpcPersonality::Balanced => PersonalityProfile {
            resilience: 0.55,
            price_step: 0.05,
            cooldown_days: 10,
        },
        NpcPersonality::Aggressive => PersonalityProfile {
            resilience: 0.40,
            price_step: 0.08,
            cooldown_days: 7,
        },
        NpcPersonality::QualityFocused => PersonalityProfile {
            resilience: 0.60,
            price_step: 0.04,
            cooldown_days: 10,
        },
    }
}

/// The single action a business took this week.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum NpcAction {
    /// Nothing changed.
    Hold,
    /// Closed for good.
    Close,
    /// Cut prices.
    LowerPrice {
        /// Previous modifier.
        from: f64,
        /// New modifier.
        to: f64,
    },
    /// Raised prices.
    RaisePrice {
        /// Previous modifier.
        from: f64,
        /// New modifier.
        to: f64,
    },
    /// Improved quality.
    RaiseQuality {
        /// Previous quality.
        from: u8,
        /// New quality.
        to: u8,
    },
}

/// The outcome of one business's weekly evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NpcDecision {
    /// The business.
    pub id: NpcBusinessId,
    /// Revenue this week divided by the previous rolling average.
    pub ratio: f64,
    /// What it did.
    pub action: NpcAction,
    /// Status after the evaluation.
    pub status: NpcStatus,
}

/// Fold this week's revenue into the rolling average and streak counters.
///
/// Returns the revenue ratio against the previous average. The first
/// observed week seeds the average and reports a neutral ratio of 1.0.
pub fn record_week(npc: &mut NpcBusiness, revenue: f64, alpha: f64) -> f64 {
    let revenue = if revenue.is_finite() { revenue.max(0.0) } else { 0.0 };
    npc.last_week_revenue = revenue;

    if npc.average_revenue <= 0.0 {
        npc.average_revenue = revenue;
        return 1.0;
    }

    let ratio = revenue / npc.average_revenue;
    npc.average_revenue = alpha.mul_add(revenue, (1.0 - alpha) * npc.average_revenue);
    if ratio >= 1.0 {
        npc.consecutive_gain_weeks = npc.consecutive_gain_weeks.saturating_add(1);
        npc.consecutive_loss_weeks = 0;
    } else {
        npc.consecutive_loss_weeks = npc.consecutive_loss_weeks.saturating_add(1);
        npc.consecutive_gain_weeks = 0;
    }
    ratio
}

fn cooldown_elapsed(npc: &NpcBusiness, cooldown_days: i64, now: DateTime<Utc>) -> bool {
    npc.last_adjusted_at
        .is_none_or(|last| now.signed_duration_since(last) >= Duration::days(cooldown_days))
}

/// Evaluate one open business after its week has been recorded.
///
/// `open_in_group` is the number of open world-owned businesses in the
/// zone/category, this one included.
pub fn decide(
    npc: &mut NpcBusiness,
    ratio: f64,
    open_in_group: usize,
    rules: &MarketRules,
    now: DateTime<Utc>,
    rng: &mut impl Rng,
) -> NpcAction {
    let traits = profile(npc.personality);
    let floor_protected = open_in_group <= rules.min_population;
    let losing = npc.consecutive_loss_weeks >= rules.min_loss_weeks;
    let ready = cooldown_elapsed(npc, traits.cooldown_days, now);

    let action = if losing
        && ratio < rules.closing_threshold
        && !floor_protected
        && rng.random::<f64>() >= traits.resilience
    {
        npc.status = NpcStatus::Closed;
        npc.closed_at = Some(now);
        NpcAction::Close
    } else if ratio < rules.decline_threshold && ready && npc.price_modifier > rules.min_price {
        let from = npc.price_modifier;
        let to = (from - traits.price_step).max(rules.min_price);
        npc.price_modifier = to;
        npc.last_adjusted_at = Some(now);
        NpcAction::LowerPrice { from, to }
    } else if ratio > rules.growth_threshold
        && npc.consecutive_gain_weeks >= rules.min_gain_weeks
        && ready
    {
        grow(npc, traits, rules, now)
    } else {
        NpcAction::Hold
    };

    if npc.status != NpcStatus::Closed {
        npc.status = if ratio >= rules.growth_threshold {
            NpcStatus::Thriving
        } else if ratio >= rules.decline_threshold {
            NpcStatus::Stable
        } else if losing && !floor_protected {
            NpcStatus::Closing
        } else {
            NpcStatus::Struggling
        };
    }
    action
}

fn grow(
    npc: &mut NpcBusiness,
    traits: PersonalityProfile,
    rules: &MarketRules,
    now: DateTime<Utc>,
) -> NpcAction {
    if npc.personality == NpcPersonality::QualityFocused {
        if npc.quality >= 10 {
            return NpcAction::Hold;
        }
        let from = npc.quality;
        npc.quality = from.saturating_add(1);
        npc.last_adjusted_at = Some(now);
        return NpcAction::RaiseQuality {
            from,
            to: npc.quality,
        };
    }
    if npc.price_modifier >= rules.max_price {
        return NpcAction::Hold;
    }
    let from = npc.price_modifier;
    let to = (from + traits.price_step).min(rules.max_price);
    npc.price_modifier = to;
    npc.last_adjusted_at = Some(now);
    NpcAction::RaisePrice { from, to }
}
