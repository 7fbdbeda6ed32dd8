//! Per-business competitive scores.
//!
//! All four sub-scores live on a 0--100 scale before weighting.

use serde::{Deserialize, Serialize};

use syndicate_types::{BusinessId, NpcBusinessId, OrganizationId, ZoneInfluence};

use crate::config::MarketRules;

/// Which kind of business a competitor is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(tag = "owner", content = "id", rename_all = "snake_case")]
pub enum CompetitorId {
    /// Organization-owned.
    Organization(BusinessId),
    /// World-owned.
    Npc(NpcBusinessId),
}

/// The inputs a business competes with.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Competitor {
    /// Identity.
    pub id: CompetitorId,
    /// Reputation (0--100).
    pub reputation: f64,
    /// Price modifier.
    pub price_modifier: f64,
    /// Quality (1--10).
    pub quality: u8,
    /// Organization whose territory bonus applies: the owner for
    /// organization businesses, the protector for world-owned ones.
    pub protected_by: Option<OrganizationId>,
}

/// Who controls a zone, derived from influence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerritoryControl {
    /// Nobody holds influence.
    Unclaimed,
    /// The leader is well ahead of the runner-up.
    Uncontested(OrganizationId),
    /// The runner-up holds at least `contested_ratio` of the leader's influence.
    Contested(OrganizationId),
}

/// Determine zone control from influence entries.
pub fn territory_control(influence: &[ZoneInfluence], rules: &MarketRules) -> TerritoryControl {
    let mut ranked: Vec<&ZoneInfluence> = influence
        .iter()
        .filter(|entry| entry.influence.is_finite() && entry.influence > 0.0)
        .collect();
    ranked.sort_by(|a, b| b.influence.total_cmp(&a.influence));

    match ranked.as_slice() {
        [] => TerritoryControl::Unclaimed,
        [leader] => TerritoryControl::Uncontested(leader.organization_id),
        [leader, runner_up, ..] => {
            if runner_up.influence >= leader.influence * rules.contested_ratio {
                TerritoryControl::Contested(leader.organization_id)
            } else {
                TerritoryControl::Uncontested(leader.organization_id)
            }
        }
    }
}

/// A business's score, broken down.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    /// `reputation * reputation_weight`.
    pub reputation: f64,
    /// 100 at the cheapest price, 0 at the most expensive.
    pub price: f64,
    /// `quality / 10 * 100`.
    pub quality: f64,
    /// Control bonus of the protecting organization.
    pub territory: f64,
    /// Weighted total.
    pub total: f64,
}

/// Score one competitor.
pub fn score(
    competitor: &Competitor,
    control: TerritoryControl,
    rules: &MarketRules,
) -> ScoreBreakdown {
    let reputation = competitor.reputation.clamp(0.0, 100.0) * rules.reputation_weight;
    let price = price_score(competitor.price_modifier, rules);
    let quality = f64::from(competitor.quality.min(10)) / 10.0 * 100.0;
    let territory = match (control, competitor.protected_by) {
        (TerritoryControl::Uncontested(holder), Some(org)) if holder == org => {
            rules.uncontested_bonus
        }
        (TerritoryControl::Contested(holder), Some(org)) if holder == org => rules.contested_bonus,
        _ => 0.0,
    };
    let total = reputation
        + price * rules.price_weight
        + quality * rules.quality_weight
        + territory * rules.territory_weight;

    ScoreBreakdown {
        reputation,
        price,
        quality,
        territory,
        total: if total.is_finite() { total.max(0.0) } else { 0.0 },
    }
}

/// Linear price score: 100 at `min_price`, 0 at `max_price`.
pub fn price_score(price_modifier: f64, rules: &MarketRules) -> f64 {
    let span = rules.max_price - rules.min_price;
    if !price_modifier.is_finite() || span <= 0.0 {
        return 0.0;
    }
    let clamped = price_modifier.clamp(rules.min_price, rules.max_price);
    (rules.max_price - clamped) / span * 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn influence(org: OrganizationId, amount: f64) -> ZoneInfluence {
        ZoneInfluence {
            organization_id: org,
            influence: amount,
        }
    }

    fn competitor(protected_by: Option<OrganizationId>) -> Competitor {
        Competitor {
            id: CompetitorId::Npc(NpcBusinessId::new()),
            reputation: 50.0,
            price_modifier: 1.0,
            quality: 5,
            protected_by,
        }
    }

    #[test]
    fn price_score_is_linear_and_clamped() {
        let rules = MarketRules::default();
        assert!((price_score(0.7, &rules) - 100.0).abs() < 1e-9);
        assert!((price_score(1.0, &rules) - 50.0).abs() < 1e-9);
        assert!(price_score(1.3, &rules).abs() < 1e-9);
        assert!((price_score(0.5, &rules) - 100.0).abs() < 1e-9);
        assert!(price_score(1.5, &rules).abs() < 1e-9);
    }

    #[test]
    fn control_is_contested_at_eighty_percent() {
        let rules = MarketRules::default();
        let leader = OrganizationId::new();
        let rival = OrganizationId::new();
        assert_eq!(
            territory_control(&[influence(leader, 100.0), influence(rival, 80.0)], &rules),
            TerritoryControl::Contested(leader)
        );
        assert_eq!(
            territory_control(&[influence(rival, 79.0), influence(leader, 100.0)], &rules),
            TerritoryControl::Uncontested(leader)
        );
        assert_eq!(territory_control(&[], &rules), TerritoryControl::Unclaimed);
    }

    #[test]
    fn territory_bonus_only_for_the_holder() {
        let rules = MarketRules::default();
        let holder = OrganizationId::new();
        let control = TerritoryControl::Uncontested(holder);
        assert!((score(&competitor(Some(holder)), control, &rules).territory - 100.0).abs() < 1e-9);
        assert!(score(&competitor(Some(OrganizationId::new())), control, &rules)
            .territory
            .abs()
            < 1e-9);
        assert!(score(&competitor(None), control, &rules).territory.abs() < 1e-9);
        let contested = TerritoryControl::Contested(holder);
        assert!((score(&competitor(Some(holder)), contested, &rules).territory - 50.0).abs() < 1e-9);
    }

    #[test]
    fn total_is_weighted_sum() {
        let rules = MarketRules::default();
        let breakdown = score(&competitor(None), TerritoryControl::Unclaimed, &rules);
        // 50*0.3 + 50*0.25 + 50*0.25 + 0 = 40.
        assert!((breakdown.total - 40.0).abs() < 1e-9);
    }
}
