//! Enumeration types for the organization economy.
//!
//! Every enum serializes in `snake_case` so the same names are used in the
//! YAML catalogs, the database, and the generated `TypeScript` bindings.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

// ---------------------------------------------------------------------------
// Ledger
// ---------------------------------------------------------------------------

/// One of the four named sub-balances of an organization's ledger account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum AccountKind {
    /// Day-to-day funds: income, fines, purchases, payroll.
    Operating,
    /// Funds earmarked for territory wars.
    War,
    /// Funds placed into fixed-term investments.
    Investment,
    /// Reserve only the organization's sole leader may draw on.
    Emergency,
}

impl AccountKind {
    /// All account kinds in canonical order.
    pub const ALL: [Self; 4] = [Self::Operating, Self::War, Self::Investment, Self::Emergency];
}

/// Category of a ledger journal entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum JournalEntryType {
    /// Member deposited personal funds.
    Deposit,
    /// Member withdrew funds to their personal balance.
    Withdrawal,
    /// Internal transfer, debit side.
    TransferOut,
    /// Internal transfer, credit side.
    TransferIn,
    /// Periodic interest accrual.
    Interest,
    /// Daily business income.
    BusinessIncome,
    /// Fine paid after a raid.
    RaidFine,
    /// Purchase of a business.
    BusinessPurchase,
    /// Proceeds from selling a business.
    BusinessSale,
    /// Wages and officer bonuses paid to members.
    Payroll,
    /// Equipment bought while planning a heist.
    HeistEquipment,
    /// Loot from an executed heist.
    HeistPayout,
    /// Principal moved into an investment.
    InvestmentPlaced,
    /// Principal plus return from a matured investment.
    InvestmentMatured,
}

/// Role of a character inside an organization.
///
/// Ordered by privilege: `Member < Officer < Leader`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum MemberRole {
    /// Regular member.
    Member,
    /// Officer with access to shared funds.
    Officer,
    /// Leader of the organization.
    Leader,
}

impl MemberRole {
    /// Whether this role carries at least officer privileges.
    pub const fn is_officer_or_above(self) -> bool {
        matches!(self, Self::Officer | Self::Leader)
    }
}

// ---------------------------------------------------------------------------
// Businesses
// ---------------------------------------------------------------------------

/// Legal standing of a business type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum BusinessCategory {
    /// A legitimate front. Never raided.
    Legal,
    /// A criminal operation subject to raid checks.
    Criminal,
}

/// The customer market a business competes in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum MarketCategory {
    /// Restaurants and diners.
    Restaurant,
    /// Bars and taverns.
    Bar,
    /// Nightclubs.
    Nightclub,
    /// Shops and pawnbrokers.
    Retail,
    /// Gambling halls.
    Casino,
    /// Garages, chop shops, workshops.
    Workshop,
}

impl MarketCategory {
    /// All market categories in canonical order.
    pub const ALL: [Self; 6] = [
        Self::Restaurant,
        Self::Bar,
        Self::Nightclub,
        Self::Retail,
        Self::Casino,
        Self::Workshop,
    ];

    /// The `snake_case` name used in configuration, storage, and cache keys.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Restaurant => "restaurant",
            Self::Bar => "bar",
            Self::Nightclub => "nightclub",
            Self::Retail => "retail",
            Self::Casino => "casino",
            Self::Workshop => "workshop",
        }
    }
}

/// Law-enforcement exposure of a criminal business type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum RiskTier {
    /// Never raided.
    Safe,
    /// 5% daily raid chance.
    Risky,
    /// 15% daily raid chance.
    VeryRisky,
    /// 25% daily raid chance.
    ExtremelyRisky,
}

impl RiskTier {
    /// Daily raid probability for this tier, in `[0, 1]`.
    pub const fn raid_probability(self) -> f64 {
        match self {
            Self::Safe => 0.0,
            Self::Risky => 0.05,
            Self::VeryRisky => 0.15,
            Self::ExtremelyRisky => 0.25,
        }
    }
}

/// Lifecycle status of an organization-owned business.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum BusinessStatus {
    /// Open and earning.
    Active,
    /// Shut down by a raid until the closure window elapses.
    Raided,
    /// Sold or permanently shut down.
    Closed,
}

/// Health of a world-owned business as seen by the market engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum NpcStatus {
    /// Revenue growing.
    Thriving,
    /// Revenue flat.
    Stable,
    /// Revenue declining.
    Struggling,
    /// Sustained losses; a closure candidate.
    Closing,
    /// Permanently closed.
    Closed,
}

/// Behavioural profile of a world-owned business.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum NpcPersonality {
    /// Slow to react, hard to kill.
    Passive,
    /// Middle of the road.
    Balanced,
    /// Large, frequent price moves; folds quickly.
    Aggressive,
    /// Answers growth with quality instead of price.
    QualityFocused,
}

/// Kind of district a zone is; drives per-category capacity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum ZoneType {
    /// Dense city centre.
    Downtown,
    /// Shopping streets.
    Commercial,
    /// Warehouses and yards.
    Industrial,
    /// Housing blocks.
    Residential,
    /// Docks and piers.
    Waterfront,
}

/// Discrete market saturation level of a zone/category group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum SaturationLevel {
    /// Fewer businesses than demand supports.
    Undersaturated,
    /// Supply roughly matches demand.
    Balanced,
    /// More businesses than ideal.
    Saturated,
    /// Far more businesses than demand supports.
    Oversaturated,
}

// ---------------------------------------------------------------------------
// Heists
// ---------------------------------------------------------------------------

/// Lifecycle status of a heist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum HeistStatus {
    /// Crew and preparation still incomplete.
    Planning,
    /// Fully staffed and fully prepared.
    Ready,
    /// Being executed.
    InProgress,
    /// Executed; immutable from now on.
    Completed,
    /// Abandoned before execution.
    Cancelled,
}

impl HeistStatus {
    /// Whether the heist still counts toward the organization's active heat.
    pub const fn is_active(self) -> bool {
        matches!(self, Self::Planning | Self::Ready | Self::InProgress)
    }
}

/// Result of an executed heist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum HeistOutcome {
    /// Full payout.
    Success,
    /// Reduced payout, some crew arrested.
    PartialSuccess,
    /// No payout, most crew arrested.
    Failure,
}

/// Position a crew member fills on a heist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum HeistRole {
    /// Runs the job on site.
    Mastermind,
    /// Handles alarms and cameras.
    Hacker,
    /// Gets the crew out.
    Driver,
    /// Handles guards.
    Muscle,
    /// Watches for police.
    Lookout,
    /// Opens the vault.
    Safecracker,
}

// ---------------------------------------------------------------------------
// Investments
// ---------------------------------------------------------------------------

/// Lifecycle status of an investment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum InvestmentStatus {
    /// Principal locked until maturity.
    Active,
    /// Paid out.
    Matured,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_ordering_reflects_privilege() {
        assert!(MemberRole::Member < MemberRole::Officer);
        assert!(MemberRole::Officer < MemberRole::Leader);
        assert!(!MemberRole::Member.is_officer_or_above());
        assert!(MemberRole::Leader.is_officer_or_above());
    }

    #[test]
    fn raid_probability_is_monotonic_in_tier() {
        let tiers = [
            RiskTier::Safe,
            RiskTier::Risky,
            RiskTier::VeryRisky,
            RiskTier::ExtremelyRisky,
        ];
        for pair in tiers.windows(2) {
            if let [lower, higher] = pair {
                assert!(lower.raid_probability() < higher.raid_probability());
            }
        }
    }

    #[test]
    fn enums_use_snake_case_names() {
        let json = serde_json::to_string(&RiskTier::ExtremelyRisky).ok();
        assert_eq!(json.as_deref(), Some("\"extremely_risky\""));
    }

    #[test]
    fn market_names_match_serde() {
        for market in MarketCategory::ALL {
            let json = serde_json::to_string(&market).ok();
            assert_eq!(json, Some(format!("\"{}\"", market.as_str())));
        }
    }
}
