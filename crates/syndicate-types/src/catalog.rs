//! Static game-content catalog entries.
//!
//! Business types, heist targets, and zones are configuration inputs. They are
//! deserialized from the `catalogs` section of the configuration file and never
//! mutated at runtime.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::enums::{BusinessCategory, MarketCategory, RiskTier, ZoneType};
use crate::ids::{BusinessTypeKey, HeistTargetKey, ZoneKey};

/// A purchasable business type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct BusinessType {
    /// Catalog key.
    pub key: BusinessTypeKey,
    /// Display name.
    pub name: String,
    /// Legal or criminal.
    pub category: BusinessCategory,
    /// Market the business competes in.
    pub market: MarketCategory,
    /// Purchase price, debited from the operating account.
    #[ts(as = "String")]
    pub startup_cost: Decimal,
    /// Lower bound of the daily gross income roll (inclusive).
    #[ts(as = "String")]
    pub income_min: Decimal,
    /// Upper bound of the daily gross income roll (inclusive).
    #[ts(as = "String")]
    pub income_max: Decimal,
    /// Fixed daily operating cost subtracted from gross income.
    #[ts(as = "String")]
    pub operating_cost: Decimal,
    /// Raid exposure.
    pub risk_tier: RiskTier,
    /// Minimum organization level required to buy.
    #[serde(default)]
    pub required_level: u32,
}

/// A heist target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct HeistTarget {
    /// Catalog key.
    pub key: HeistTargetKey,
    /// Display name.
    pub name: String,
    /// Lower bound of the success payout.
    #[ts(as = "String")]
    pub payout_min: Decimal,
    /// Upper bound of the success payout.
    #[ts(as = "String")]
    pub payout_max: Decimal,
    /// Crew headcount required before the heist can become ready.
    pub required_crew: u32,
    /// Equipment cost debited when planning starts.
    #[ts(as = "String")]
    pub equipment_cost: Decimal,
    /// Base risk level (0--100).
    pub base_risk: u32,
    /// Heat this heist adds while active (0--100).
    pub heat: u32,
    /// Days that must pass after a completed heist on this target.
    pub cooldown_days: u32,
    /// Minimum organization level required to plan.
    #[serde(default)]
    pub required_level: u32,
}

/// A zone of the city.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct ZoneDefinition {
    /// Catalog key.
    pub key: ZoneKey,
    /// Display name.
    pub name: String,
    /// District type; selects the capacity row.
    pub zone_type: ZoneType,
}
