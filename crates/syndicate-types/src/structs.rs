//! Core records of the organization economy.
//!
//! Records with lifecycle defaults are created through constructors so that
//! "never set" and "explicitly active" are never conflated. Mutation rules live
//! in the logic crates (`syndicate-ledger`, `syndicate-economy`); this module
//! only defines the shapes and trivial accessors.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use ts_rs::TS;
use uuid::Uuid;

use crate::catalog::{BusinessType, HeistTarget};
use crate::enums::{
    AccountKind, BusinessCategory, BusinessStatus, HeistOutcome, HeistRole, HeistStatus,
    InvestmentStatus, JournalEntryType, MarketCategory, MemberRole, NpcPersonality, NpcStatus,
    RiskTier,
};
use crate::ids::{
    BusinessId, BusinessTypeKey, CharacterId, HeistId, HeistTargetKey, InvestmentId,
    JournalEntryId, NpcBusinessId, OrganizationId, ZoneKey,
};

/// Days between scheduled paydays.
pub const PAYROLL_INTERVAL_DAYS: i64 = 7;

// ---------------------------------------------------------------------------
// Organizations (external, read-only)
// ---------------------------------------------------------------------------

/// A player organization as exposed by the membership source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Organization {
    /// Organization identifier.
    pub id: OrganizationId,
    /// Display name.
    pub name: String,
    /// Progression level; gates catalog entries.
    pub level: u32,
    /// The organization's single leader.
    pub leader_id: CharacterId,
}

/// One member of an organization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Member {
    /// The member's character.
    pub character_id: CharacterId,
    /// The member's current role.
    pub role: MemberRole,
}

/// Influence an organization holds over a zone (read-only modifier).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct ZoneInfluence {
    /// The influencing organization.
    pub organization_id: OrganizationId,
    /// Influence points; only relative size matters.
    pub influence: f64,
}

// ---------------------------------------------------------------------------
// Ledger
// ---------------------------------------------------------------------------

/// The four sub-balances of a ledger account.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Balances {
    /// Operating funds.
    #[ts(as = "String")]
    pub operating: Decimal,
    /// War chest.
    #[ts(as = "String")]
    pub war: Decimal,
    /// Investment funds.
    #[ts(as = "String")]
    pub investment: Decimal,
    /// Emergency reserve.
    #[ts(as = "String")]
    pub emergency: Decimal,
}

impl Balances {
    /// Read one sub-balance.
    pub const fn get(&self, kind: AccountKind) -> Decimal {
        match kind {
            AccountKind::Operating => self.operating,
            AccountKind::War => self.war,
            AccountKind::Investment => self.investment,
            AccountKind::Emergency => self.emergency,
        }
    }

    /// Mutable access to one sub-balance.
    pub fn get_mut(&mut self, kind: AccountKind) -> &mut Decimal {
        match kind {
            AccountKind::Operating => &mut self.operating,
            AccountKind::War => &mut self.war,
            AccountKind::Investment => &mut self.investment,
            AccountKind::Emergency => &mut self.emergency,
        }
    }

    /// Derived total of all four sub-balances.
    pub fn total(&self) -> Decimal {
        AccountKind::ALL
            .iter()
            .fold(Decimal::ZERO, |acc, kind| acc.saturating_add(self.get(*kind)))
    }
}

/// Payroll settings embedded in a ledger account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct PayrollConfig {
    /// Weekly wage per member.
    #[ts(as = "BTreeMap<CharacterId, String>")]
    pub wages: BTreeMap<CharacterId, Decimal>,
    /// Extra weekly amount paid to every officer on the wage list.
    #[ts(as = "String")]
    pub officer_bonus: Decimal,
    /// Next scheduled payday.
    pub next_payday: DateTime<Utc>,
    /// When payroll was last paid, if ever.
    pub last_paid: Option<DateTime<Utc>>,
}

impl PayrollConfig {
    /// Empty payroll with the first payday one interval after `now`.
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            wages: BTreeMap::new(),
            officer_bonus: Decimal::ZERO,
            next_payday: now
                .checked_add_signed(Duration::days(PAYROLL_INTERVAL_DAYS))
                .unwrap_or(now),
            last_paid: None,
        }
    }
}

/// An organization's multi-account bank balance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct LedgerAccount {
    /// Owning organization.
    pub organization_id: OrganizationId,
    /// Current sub-balances.
    pub balances: Balances,
    /// Payroll configuration.
    pub payroll: PayrollConfig,
    /// When interest was last accrued, if ever.
    pub last_interest_at: Option<DateTime<Utc>>,
    /// Last mutation time.
    pub updated_at: DateTime<Utc>,
}

impl LedgerAccount {
    /// Open an empty account for an organization.
    pub fn open(organization_id: OrganizationId, now: DateTime<Utc>) -> Self {
        Self {
            organization_id,
            balances: Balances::default(),
            payroll: PayrollConfig::new(now),
            last_interest_at: None,
            updated_at: now,
        }
    }
}

/// One signed movement on one sub-balance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct JournalEntry {
    /// Entry identifier.
    pub id: JournalEntryId,
    /// Organization whose account moved.
    pub organization_id: OrganizationId,
    /// Sub-balance that moved.
    pub account: AccountKind,
    /// What caused the movement.
    pub entry_type: JournalEntryType,
    /// Signed change (positive credit, negative debit).
    #[ts(as = "String")]
    pub delta: Decimal,
    /// Related record (character, business, heist, investment).
    pub counterpart: Option<Uuid>,
    /// Short machine-readable reason tag.
    pub memo: String,
    /// When the entry was recorded.
    pub created_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Businesses
// ---------------------------------------------------------------------------

/// Reputation a freshly purchased business starts with.
pub const DEFAULT_BUSINESS_REPUTATION: f64 = 50.0;

/// Quality a freshly purchased business starts with.
pub const DEFAULT_BUSINESS_QUALITY: u8 = 5;

/// An organization-owned, income-generating business.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Business {
    /// Business identifier.
    pub id: BusinessId,
    /// Owning organization.
    pub organization_id: OrganizationId,
    /// Catalog type.
    pub business_type: BusinessTypeKey,
    /// Display name.
    pub name: String,
    /// Legal or criminal.
    pub category: BusinessCategory,
    /// Market the business competes in.
    pub market: MarketCategory,
    /// Zone the business is located in.
    pub zone: ZoneKey,
    /// Price paid at purchase.
    #[ts(as = "String")]
    pub startup_cost: Decimal,
    /// Lower bound of the daily gross income roll.
    #[ts(as = "String")]
    pub income_min: Decimal,
    /// Upper bound of the daily gross income roll.
    #[ts(as = "String")]
    pub income_max: Decimal,
    /// Fixed daily operating cost.
    #[ts(as = "String")]
    pub operating_cost: Decimal,
    /// Raid exposure.
    pub risk_tier: RiskTier,
    /// Lifecycle status.
    pub status: BusinessStatus,
    /// Income credited over the business's lifetime.
    #[ts(as = "String")]
    pub total_earnings: Decimal,
    /// Number of raids suffered.
    pub raid_count: u32,
    /// When the next raid check is due (criminal businesses only).
    pub next_raid_check: Option<DateTime<Utc>>,
    /// When income was last credited.
    pub last_income_at: Option<DateTime<Utc>>,
    /// End of the current raid closure.
    pub closed_until: Option<DateTime<Utc>>,
    /// Customer reputation (0--100).
    pub reputation: f64,
    /// Service quality (1--10).
    pub quality: u8,
    /// Price multiplier relative to the market norm.
    pub price_modifier: f64,
    /// When the business was bought.
    pub purchased_at: DateTime<Utc>,
}

impl Business {
    /// Create a freshly purchased business from its catalog entry.
    ///
    /// Starts `Active` with zero earnings and raids. Criminal businesses get
    /// their first raid check one day after purchase.
    pub fn purchase(
        organization_id: OrganizationId,
        business_type: &BusinessType,
        zone: ZoneKey,
        now: DateTime<Utc>,
    ) -> Self {
        let next_raid_check = match business_type.category {
            BusinessCategory::Criminal => now.checked_add_signed(Duration::days(1)),
            BusinessCategory::Legal => None,
        };
        Self {
            id: BusinessId::new(),
            organization_id,
            business_type: business_type.key.clone(),
            name: business_type.name.clone(),
            category: business_type.category,
            market: business_type.market,
            zone,
            startup_cost: business_type.startup_cost,
            income_min: business_type.income_min,
            income_max: business_type.income_max,
            operating_cost: business_type.operating_cost,
            risk_tier: business_type.risk_tier,
            status: BusinessStatus::Active,
            total_earnings: Decimal::ZERO,
            raid_count: 0,
            next_raid_check,
            last_income_at: None,
            closed_until: None,
            reputation: DEFAULT_BUSINESS_REPUTATION,
            quality: DEFAULT_BUSINESS_QUALITY,
            price_modifier: 1.0,
            purchased_at: now,
        }
    }
}

/// A world-owned business competing for traffic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct NpcBusiness {
    /// Business identifier.
    pub id: NpcBusinessId,
    /// Display name.
    pub name: String,
    /// Zone the business is located in.
    pub zone: ZoneKey,
    /// Market the business competes in.
    pub market: MarketCategory,
    /// Market health.
    pub status: NpcStatus,
    /// Behavioural profile.
    pub personality: NpcPersonality,
    /// Service quality (1--10).
    pub quality: u8,
    /// Price multiplier (0.7--1.3 in practice).
    pub price_modifier: f64,
    /// Customer reputation (0--100).
    pub reputation: f64,
    /// Exponential moving average of weekly revenue.
    pub average_revenue: f64,
    /// Revenue of the most recent evaluated week.
    pub last_week_revenue: f64,
    /// Consecutive weeks with revenue at or above average.
    pub consecutive_gain_weeks: u32,
    /// Consecutive weeks with revenue below average.
    pub consecutive_loss_weeks: u32,
    /// Organization paying for protection, if any.
    pub protected_by: Option<OrganizationId>,
    /// When price or quality was last changed.
    pub last_adjusted_at: Option<DateTime<Utc>>,
    /// When the business closed, if it has.
    pub closed_at: Option<DateTime<Utc>>,
}

impl NpcBusiness {
    /// Create a newly opened world-owned business with neutral market state.
    pub fn open(
        name: impl Into<String>,
        zone: ZoneKey,
        market: MarketCategory,
        personality: NpcPersonality,
    ) -> Self {
        Self {
            id: NpcBusinessId::new(),
            name: name.into(),
            zone,
            market,
            status: NpcStatus::Stable,
            personality,
            quality: DEFAULT_BUSINESS_QUALITY,
            price_modifier: 1.0,
            reputation: DEFAULT_BUSINESS_REPUTATION,
            average_revenue: 0.0,
            last_week_revenue: 0.0,
            consecutive_gain_weeks: 0,
            consecutive_loss_weeks: 0,
            protected_by: None,
            last_adjusted_at: None,
            closed_at: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Heists
// ---------------------------------------------------------------------------

/// A crew member staffed on a heist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct CrewAssignment {
    /// The staffed character.
    pub member: CharacterId,
    /// Their role.
    pub role: HeistRole,
    /// Relevant skill level (0--100).
    pub skill: u32,
}

/// A planned, executed, or cancelled heist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Heist {
    /// Heist identifier.
    pub id: HeistId,
    /// Planning organization.
    pub organization_id: OrganizationId,
    /// Catalog target.
    pub target: HeistTargetKey,
    /// Lower bound of the success payout.
    #[ts(as = "String")]
    pub payout_min: Decimal,
    /// Upper bound of the success payout.
    #[ts(as = "String")]
    pub payout_max: Decimal,
    /// Required crew headcount.
    pub required_crew: u32,
    /// Staffed crew.
    pub crew: Vec<CrewAssignment>,
    /// Planning progress (0--100).
    pub progress: u32,
    /// Equipment cost paid at planning time.
    #[ts(as = "String")]
    pub equipment_cost: Decimal,
    /// Risk level (0--100).
    pub risk_level: u32,
    /// Heat level (0--100), including the organization's other active heists
    /// at planning time.
    pub heat_level: u32,
    /// Heat this heist alone adds while active (the target's heat).
    pub target_heat: u32,
    /// Lifecycle status.
    pub status: HeistStatus,
    /// Outcome once completed.
    pub outcome: Option<HeistOutcome>,
    /// Payout once completed.
    #[ts(as = "String")]
    pub payout: Decimal,
    /// Crew arrested during execution.
    pub arrested: Vec<CharacterId>,
    /// Crew killed during execution.
    pub casualties: Vec<CharacterId>,
    /// When planning started.
    pub created_at: DateTime<Utc>,
    /// When the heist completed or was cancelled.
    pub finished_at: Option<DateTime<Utc>>,
}

impl Heist {
    /// Start planning a heist against a catalog target.
    ///
    /// The heist starts in `Planning` with no crew, zero progress, and the
    /// target's base risk. `heat_level` is supplied by the caller because it
    /// depends on the organization's other active heists.
    pub fn plan(
        organization_id: OrganizationId,
        target: &HeistTarget,
        heat_level: u32,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: HeistId::new(),
            organization_id,
            target: target.key.clone(),
            payout_min: target.payout_min,
            payout_max: target.payout_max,
            required_crew: target.required_crew,
            crew: Vec::new(),
            progress: 0,
            equipment_cost: target.equipment_cost,
            risk_level: target.base_risk.min(100),
            heat_level: heat_level.min(100),
            target_heat: target.heat.min(100),
            status: HeistStatus::Planning,
            outcome: None,
            payout: Decimal::ZERO,
            arrested: Vec::new(),
            casualties: Vec::new(),
            created_at: now,
            finished_at: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Investments
// ---------------------------------------------------------------------------

/// A fixed-term investment funded from the investment account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Investment {
    /// Investment identifier.
    pub id: InvestmentId,
    /// Owning organization.
    pub organization_id: OrganizationId,
    /// Amount invested.
    #[ts(as = "String")]
    pub principal: Decimal,
    /// Return over the full term (0.05 = 5%).
    #[ts(as = "String")]
    pub return_rate: Decimal,
    /// When the principal was placed.
    pub placed_at: DateTime<Utc>,
    /// When the investment pays out.
    pub matures_at: DateTime<Utc>,
    /// Lifecycle status.
    pub status: InvestmentStatus,
    /// Amount paid out at maturity.
    #[ts(as = "Option<String>")]
    pub payout: Option<Decimal>,
}

impl Investment {
    /// Place a new active investment.
    pub fn place(
        organization_id: OrganizationId,
        principal: Decimal,
        return_rate: Decimal,
        term_days: u32,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: InvestmentId::new(),
            organization_id,
            principal,
            return_rate,
            placed_at: now,
            matures_at: now
                .checked_add_signed(Duration::days(i64::from(term_days)))
                .unwrap_or(now),
            status: InvestmentStatus::Active,
            payout: None,
        }
    }
}
