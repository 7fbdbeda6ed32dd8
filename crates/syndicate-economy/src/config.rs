//! Tunable rules for the economy logic.
//!
//! These values correspond to the `business`, `heists`, `market`, and
//! `investments` sections of `syndicate-config.yaml`. Every struct
//! deserializes with `#[serde(default)]` so a partial section only overrides
//! the keys it names.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Rules for organization-owned businesses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BusinessRules {
    /// Raid count at which a business closes for good (default: 5).
    pub permanent_closure_raids: u32,
    /// Shortest raid closure in days (default: 3).
    pub closure_min_days: u32,
    /// Longest raid closure in days (default: 7).
    pub closure_max_days: u32,
    /// Days added to a closure when the fine cannot be paid (default: 7).
    pub unpaid_fine_extension_days: u32,
    /// Extra fine multiplier range on top of the startup cost (default: 2.0,
    /// giving fines of 1x to 3x).
    pub fine_spread: f64,
    /// Fraction of the startup cost returned on sale (default: 0.5).
    pub sale_value_ratio: Decimal,
}

impl Default for BusinessRules {
    fn default() -> Self {
        Self {
            permanent_closure_raids: 5,
            closure_min_days: 3,
            closure_max_days: 7,
            unpaid_fine_extension_days: 7,
            fine_spread: 2.0,
            sale_value_ratio: Decimal::new(5, 1),
        }
    }
}

/// Rules for heist planning and execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeistRules {
    /// Cap on the summed heat of an organization's active heists (default: 100).
    pub max_active_heat: u32,
    /// Width of the partial-success band above the success chance (default: 30).
    pub partial_band: f64,
    /// Fraction of the minimum payout paid on partial success (default: 0.5).
    pub partial_payout_ratio: Decimal,
    /// Risk level from which failures can cost lives (default: 70).
    pub casualty_risk_threshold: u32,
    /// Chance of casualties on a high-risk failure (default: 0.2).
    pub casualty_chance: f64,
}

impl Default for HeistRules {
    fn default() -> Self {
        Self {
            max_active_heat: 100,
            partial_band: 30.0,
            partial_payout_ratio: Decimal::new(5, 1),
            casualty_risk_threshold: 70,
            casualty_chance: 0.2,
        }
    }
}

/// Rules for traffic-share scoring and world-owned business behaviour.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarketRules {
    /// Fixed weight of the reputation score (default: 0.30).
    pub reputation_weight: f64,
    /// Weight of the price score (default: 0.25).
    pub price_weight: f64,
    /// Weight of the quality score (default: 0.25).
    pub quality_weight: f64,
    /// Weight of the territory score (default: 0.20).
    pub territory_weight: f64,
    /// Lowest share any single business may end up with (default: 0.05).
    pub min_share: f64,
    /// Highest share any single business may end up with (default: 0.60).
    pub max_share: f64,
    /// Territory score when the protector controls the zone uncontested (default: 100).
    pub uncontested_bonus: f64,
    /// Territory score when control is contested (default: 50).
    pub contested_bonus: f64,
    /// Runner-up influence, relative to the leader, that makes control
    /// contested (default: 0.8).
    pub contested_ratio: f64,
    /// Cheapest price modifier; scores 100 on price (default: 0.7).
    pub min_price: f64,
    /// Most expensive price modifier; scores 0 on price (default: 1.3).
    pub max_price: f64,
    /// Smoothing factor of the weekly revenue average (default: 0.25).
    pub ema_alpha: f64,
    /// Consecutive loss weeks before closure is considered (default: 4).
    pub min_loss_weeks: u32,
    /// Revenue ratio under which closure is considered (default: 0.5).
    pub closing_threshold: f64,
    /// Revenue ratio under which prices are cut (default: 0.85).
    pub decline_threshold: f64,
    /// Revenue ratio above which growth actions are taken (default: 1.15).
    pub growth_threshold: f64,
    /// Consecutive gain weeks required for a growth action (default: 2).
    pub min_gain_weeks: u32,
    /// Open world-owned businesses a zone/category never drops below (default: 2).
    pub min_population: usize,
}

impl Default for MarketRules {
    fn default() -> Self {
        Self {
            reputation_weight: 0.30,
            price_weight: 0.25,
            quality_weight: 0.25,
            territory_weight: 0.20,
            min_share: 0.05,
            max_share: 0.60,
            uncontested_bonus: 100.0,
            contested_bonus: 50.0,
            contested_ratio: 0.8,
            min_price: 0.7,
            max_price: 1.3,
            ema_alpha: 0.25,
            min_loss_weeks: 4,
            closing_threshold: 0.5,
            decline_threshold: 0.85,
            growth_threshold: 1.15,
            min_gain_weeks: 2,
            min_population: 2,
        }
    }
}

/// One fixed-term investment product.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvestmentTerm {
    /// Term length in days.
    pub days: u32,
    /// Return over the full term (0.05 = 5%).
    pub rate: Decimal,
}

/// The default investment products: 7, 30, and 90 days.
pub fn default_investment_terms() -> Vec<InvestmentTerm> {
    vec![
        InvestmentTerm {
            days: 7,
            rate: Decimal::new(2, 2),
        },
        InvestmentTerm {
            days: 30,
            rate: Decimal::new(8, 2),
        },
        InvestmentTerm {
            days: 90,
            rate: Decimal::new(25, 2),
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_section_keeps_other_defaults() {
        let rules: Result<MarketRules, _> = serde_json::from_str(r#"{"min_population": 3}"#);
        let rules = rules.unwrap_or_default();
        assert_eq!(rules.min_population, 3);
        assert_eq!(rules.min_loss_weeks, 4);
    }

    #[test]
    fn default_share_band_is_valid() {
        let rules = MarketRules::default();
        assert!(rules.min_share < rules.max_share);
        assert!(rules.min_price < rules.max_price);
    }
}
