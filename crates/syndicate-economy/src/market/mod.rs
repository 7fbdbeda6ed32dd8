//! Market competition for one zone and market category.
//!
//! Organization-owned and world-owned businesses in the same zone/category
//! compete for a fixed pool of customer traffic:
//!
//! 1. [`score`] every open business on reputation, price, quality, and
//!    territory.
//! 2. [`share`] turns scores into traffic shares that sum to 1.0 within the
//!    configured band.
//! 3. [`saturation`] scales the whole group's demand by how crowded it is.
//! 4. [`npc`] lets world-owned businesses react to their weekly revenue.
//!
//! Zones are independent; callers evaluate them in parallel.

pub mod npc;
pub mod saturation;
pub mod score;
pub mod share;

pub use npc::{NpcAction, NpcDecision};
pub use saturation::Saturation;
pub use score::{Competitor, CompetitorId, ScoreBreakdown, TerritoryControl};

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};

use syndicate_types::{
    Business, BusinessStatus, MarketCategory, NpcBusiness, NpcBusinessId, NpcStatus, ZoneInfluence,
    ZoneKey,
};

use crate::config::MarketRules;
use crate::error::MarketError;

/// One business's slice of the market.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrafficShare {
    /// The business.
    pub id: CompetitorId,
    /// Score breakdown.
    pub score: ScoreBreakdown,
    /// Score divided by the group's total score.
    pub raw_share: f64,
    /// Share after band clamping and renormalization.
    pub share: f64,
    /// `base_demand * saturation multiplier * share`.
    pub projected_revenue: f64,
}

/// Result of evaluating one zone/category group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketReport {
    /// Zone evaluated.
    pub zone: ZoneKey,
    /// Market category evaluated.
    pub market: MarketCategory,
    /// Group saturation.
    pub saturation: Saturation,
    /// Per-business shares, in input order.
    pub shares: Vec<TrafficShare>,
    /// When the report was computed.
    pub computed_at: DateTime<Utc>,
}

impl MarketReport {
    /// Projected weekly revenue of a world-owned business, if it competed.
    pub fn npc_revenue(&self, id: NpcBusinessId) -> Option<f64> {
        self.shares
            .iter()
            .find(|share| share.id == CompetitorId::Npc(id))
            .map(|share| share.projected_revenue)
    }
}

/// Competitor view of an organization-owned business. Closed businesses do
/// not compete.
pub fn business_competitor(business: &Business) -> Option<Competitor> {
    (business.status != BusinessStatus::Closed).then_some(Competitor {
        id: CompetitorId::Organization(business.id),
        reputation: business.reputation,
        price_modifier: business.price_modifier,
        quality: business.quality,
        protected_by: Some(business.organization_id),
    })
}

/// Competitor view of a world-owned business. Closed businesses do not
/// compete.
pub fn npc_competitor(npc: &NpcBusiness) -> Option<Competitor> {
    (npc.status != NpcStatus::Closed).then_some(Competitor {
        id: CompetitorId::Npc(npc.id),
        reputation: npc.reputation,
        price_modifier: npc.price_modifier,
        quality: npc.quality,
        protected_by: npc.protected_by,
    })
}

/// Inputs describing the group being evaluated.
#[derive(Debug, Clone, Copy)]
pub struct MarketGroup<'a> {
    /// Zone.
    pub zone: &'a ZoneKey,
    /// Market category.
    pub market: MarketCategory,
    /// Businesses allowed in this zone/category by the zone type.
    pub capacity: u32,
    /// Weekly customer demand for this category.
    pub base_demand: f64,
    /// Influence over the zone.
    pub influence: &'a [ZoneInfluence],
}

/// Score, share, and project revenue for every competitor in a group.
pub fn evaluate_group(
    group: &MarketGroup<'_>,
    competitors: &[Competitor],
    rules: &MarketRules,
    now: DateTime<Utc>,
) -> Result<MarketReport, MarketError> {
    validate(rules)?;

    let control = score::territory_control(group.influence, rules);
    let scores: Vec<ScoreBreakdown> = competitors
        .iter()
        .map(|competitor| score::score(competitor, control, rules))
        .collect();
    let totals: Vec<f64> = scores.iter().map(|s| s.total).collect();
    let sum: f64 = totals.iter().sum();
    let shares = share::normalize_shares(&totals, rules.min_share, rules.max_share);
    let saturation = saturation::saturation(competitors.len(), group.capacity);
    let count = f64::from(u32::try_from(competitors.len()).unwrap_or(u32::MAX));

    let entries = competitors
        .iter()
        .zip(scores)
        .zip(shares)
        .map(|((competitor, score), share)| TrafficShare {
            id: competitor.id,
            score,
            raw_share: if sum > 0.0 { score.total / sum } else { 1.0 / count },
            share,
            projected_revenue: group.base_demand.max(0.0) * saturation.multiplier * share,
        })
        .collect();

    Ok(MarketReport {
        zone: group.zone.clone(),
        market: group.market,
        saturation,
        shares: entries,
        computed_at: now,
    })
}

fn validate(rules: &MarketRules) -> Result<(), MarketError> {
    let band_ok = rules.min_share.is_finite()
        && rules.max_share.is_finite()
        && rules.min_share >= 0.0
        && rules.max_share <= 1.0
        && rules.min_share <= rules.max_share;
    if !band_ok {
        return Err(MarketError::InvalidShareBand {
            min: rules.min_share,
            max: rules.max_share,
        });
    }
    if !(rules.min_price < rules.max_price) {
        return Err(MarketError::InvalidPriceRange {
            min: rules.min_price,
            max: rules.max_price,
        });
    }
    Ok(())
}

/// Run the weekly evaluation for the world-owned businesses of one group.
///
/// Revenue comes from the group's [`MarketReport`]. Businesses are evaluated
/// in order; each closure lowers the open count seen by the next one, so the
/// population floor holds for the whole group.
pub fn run_weekly(
    npcs: &mut [NpcBusiness],
    revenues: &BTreeMap<NpcBusinessId, f64>,
    rules: &MarketRules,
    now: DateTime<Utc>,
    rng: &mut impl Rng,
) -> Vec<NpcDecision> {
    let mut open = npcs
        .iter()
        .filter(|npc| npc.status != NpcStatus::Closed)
        .count();
    let mut decisions = Vec::with_capacity(open);

    for npc in npcs.iter_mut().filter(|npc| npc.status != NpcStatus::Closed) {
        let revenue = revenues.get(&npc.id).copied().unwrap_or(0.0);
        let ratio = npc::record_week(npc, revenue, rules.ema_alpha);
        let action = npc::decide(npc, ratio, open, rules, now, rng);
        if action == NpcAction::Close {
            open = open.saturating_sub(1);
        }
        decisions.push(NpcDecision {
            id: npc.id,
            ratio,
            action,
            status: npc.status,
        });
    }
    decisions
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    use syndicate_types::{NpcPersonality, OrganizationId};

    use super::*;

    fn diner(name: &str) -> NpcBusiness {
        NpcBusiness::open(
            name,
            ZoneKey::new("downtown"),
            MarketCategory::Restaurant,
            NpcPersonality::Aggressive,
        )
    }

    #[test]
    fn report_shares_sum_to_one() {
        let zone = ZoneKey::new("downtown");
        let owner = OrganizationId::new();
        let influence = [ZoneInfluence {
            organization_id: owner,
            influence: 500.0,
        }];
        let group = MarketGroup {
            zone: &zone,
            market: MarketCategory::Restaurant,
            capacity: 3,
            base_demand: 10_000.0,
            influence: &influence,
        };
        let mut npcs: Vec<NpcBusiness> = (0..3).map(|i| diner(&format!("Diner {i}"))).collect();
        if let Some(first) = npcs.first_mut() {
            first.protected_by = Some(owner);
        }
        let competitors: Vec<Competitor> = npcs.iter().filter_map(npc_competitor).collect();
        let report = evaluate_group(&group, &competitors, &MarketRules::default(), Utc::now());
        let Ok(report) = report else {
            unreachable!("valid rules");
        };
        let total: f64 = report.shares.iter().map(|s| s.share).sum();
        assert!((total - 1.0).abs() < 1e-9);
        // 3 of 3 slots: saturated.
        assert_eq!(report.saturation.level, syndicate_types::SaturationLevel::Saturated);
        let protected = report.shares.first().map(|s| s.share).unwrap_or(0.0);
        let other = report.shares.get(1).map(|s| s.share).unwrap_or(0.0);
        assert!(protected > other);
        let revenue: f64 = report.shares.iter().map(|s| s.projected_revenue).sum();
        assert!((revenue - 8_500.0).abs() < 1e-6);
    }

    #[test]
    fn closed_businesses_do_not_compete() {
        let mut closed = diner("Shuttered");
        closed.status = NpcStatus::Closed;
        assert!(npc_competitor(&closed).is_none());
    }

    #[test]
    fn invalid_band_is_rejected() {
        let zone = ZoneKey::new("downtown");
        let group = MarketGroup {
            zone: &zone,
            market: MarketCategory::Bar,
            capacity: 3,
            base_demand: 1.0,
            influence: &[],
        };
        let rules = MarketRules {
            min_share: 0.7,
            max_share: 0.2,
            ..MarketRules::default()
        };
        assert!(evaluate_group(&group, &[], &rules, Utc::now()).is_err());
    }

    #[test]
    fn weekly_run_respects_population_floor() {
        let rules = MarketRules::default();
        let mut rng = StdRng::seed_from_u64(7);
        let now = Utc::now();
        let mut npcs: Vec<NpcBusiness> = (0..5)
            .map(|i| {
                let mut npc = diner(&format!("Diner {i}"));
                npc.average_revenue = 1_000.0;
                npc.consecutive_loss_weeks = 8;
                npc
            })
            .collect();
        let revenues: BTreeMap<NpcBusinessId, f64> =
            npcs.iter().map(|npc| (npc.id, 100.0)).collect();

        // Every business collapses every week; the floor of two must hold.
        for week in 0..10 {
            let at = now + chrono::Duration::days(7 * week);
            let decisions = run_weekly(&mut npcs, &revenues, &rules, at, &mut rng);
            let open = npcs.iter().filter(|n| n.status != NpcStatus::Closed).count();
            assert!(open >= rules.min_population);
            assert!(decisions.iter().all(|d| d.status != NpcStatus::Closed || d.action == NpcAction::Close));
        }
        let open = npcs.iter().filter(|n| n.status != NpcStatus::Closed).count();
        assert_eq!(open, rules.min_population);
    }
}
