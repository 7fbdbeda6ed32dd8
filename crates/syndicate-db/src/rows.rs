//! Row shapes of the `PostgreSQL` schema and their decoding into domain types.
//!
//! Enumerations are stored as `TEXT` holding the same `snake_case` names
//! serde produces, so encoding goes through `serde_json` rather than a second
//! hand-maintained string table. Unsigned domain counters are stored in
//! signed SQL integers and converted with range checks.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use serde::de::DeserializeOwned;
use sqlx::types::Json;
use syndicate_types::{
    Balances, Business, BusinessTypeKey, CharacterId, CrewAssignment, Heist, HeistTargetKey,
    Investment, LedgerAccount, Member, NpcBusiness, Organization, PayrollConfig, ZoneInfluence,
    ZoneKey,
};
use uuid::Uuid;

use crate::error::DbError;

/// Encode a unit enum variant as its stored name.
pub fn enum_to_db<T: Serialize>(value: T) -> Result<String, DbError> {
    match serde_json::to_value(value)? {
        serde_json::Value::String(name) => Ok(name),
        other => Err(DbError::Config(format!(
            "expected a unit variant, got {other}"
        ))),
    }
}

/// Decode a stored enum name.
pub fn enum_from_db<T: DeserializeOwned>(entity: &'static str, raw: &str) -> Result<T, DbError> {
    serde_json::from_value(serde_json::Value::String(raw.to_owned()))
        .map_err(|e| DbError::decode(entity, format!("unknown value {raw:?}: {e}")))
}

/// Widen a stored signed counter into the domain's unsigned one.
pub fn to_u32(entity: &'static str, field: &str, value: i32) -> Result<u32, DbError> {
    u32::try_from(value)
        .map_err(|e| DbError::decode(entity, format!("{field} is negative ({value}): {e}")))
}

/// Narrow a domain counter for storage.
pub fn to_i32(entity: &'static str, field: &str, value: u32) -> Result<i32, DbError> {
    i32::try_from(value)
        .map_err(|e| DbError::decode(entity, format!("{field} out of range ({value}): {e}")))
}

fn quality_from_db(entity: &'static str, value: i16) -> Result<u8, DbError> {
    u8::try_from(value)
        .map_err(|e| DbError::decode(entity, format!("quality out of range ({value}): {e}")))
}

// ---------------------------------------------------------------------------
// Membership
// ---------------------------------------------------------------------------

/// A row from the `organizations` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct OrganizationRow {
    /// Organization UUID.
    pub id: Uuid,
    /// Display name.
    pub name: String,
    /// Progression level.
    pub level: i32,
    /// Leader's character UUID.
    pub leader_id: Uuid,
}

impl TryFrom<OrganizationRow> for Organization {
    type Error = DbError;

    fn try_from(row: OrganizationRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id.into(),
            name: row.name,
            level: to_u32("organization", "level", row.level)?,
            leader_id: row.leader_id.into(),
        })
    }
}

/// A row from the `organization_members` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct MemberRow {
    /// Member's character UUID.
    pub character_id: Uuid,
    /// Role name.
    pub role: String,
}

impl TryFrom<MemberRow> for Member {
    type Error = DbError;

    fn try_from(row: MemberRow) -> Result<Self, Self::Error> {
        Ok(Self {
            character_id: row.character_id.into(),
            role: enum_from_db("member", &row.role)?,
        })
    }
}

/// A row from the `zone_influence` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct InfluenceRow {
    /// Influencing organization.
    pub organization_id: Uuid,
    /// Influence points.
    pub influence: f64,
}

impl From<InfluenceRow> for ZoneInfluence {
    fn from(row: InfluenceRow) -> Self {
        Self {
            organization_id: row.organization_id.into(),
            influence: row.influence,
        }
    }
}

// ---------------------------------------------------------------------------
// Ledger
// ---------------------------------------------------------------------------

/// A row from the `ledger_accounts` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct LedgerAccountRow {
    /// Owning organization.
    pub organization_id: Uuid,
    /// Operating balance.
    pub operating: Decimal,
    /// War chest balance.
    pub war: Decimal,
    /// Investment balance.
    pub investment: Decimal,
    /// Emergency balance.
    pub emergency: Decimal,
    /// Weekly wage per character.
    pub wages: Json<BTreeMap<CharacterId, Decimal>>,
    /// Officer bonus.
    pub officer_bonus: Decimal,
    /// Next payday.
    pub next_payday: DateTime<Utc>,
    /// Last payroll payment.
    pub last_paid: Option<DateTime<Utc>>,
    /// Last interest accrual.
    pub last_interest_at: Option<DateTime<Utc>>,
    /// Last mutation.
    pub updated_at: DateTime<Utc>,
}

impl From<LedgerAccountRow> for LedgerAccount {
    fn from(row: LedgerAccountRow) -> Self {
        Self {
            organization_id: row.organization_id.into(),
            balances: Balances {
                operating: row.operating,
                war: row.war,
                investment: row.investment,
                emergency: row.emergency,
            },
            payroll: PayrollConfig {
                wages: row.wages.0,
                officer_bonus: row.officer_bonus,
                next_payday: row.next_payday,
                last_paid: row.last_paid,
            },
            last_interest_at: row.last_interest_at,
            updated_at: row.updated_at,
        }
    }
}

/// Column list shared by every `ledger_accounts` select.
pub const LEDGER_COLUMNS: &str = "organization_id, operating, war, investment, emergency, wages, \
     officer_bonus, next_payday, last_paid, last_interest_at, updated_at";

// ---------------------------------------------------------------------------
// Businesses
// ---------------------------------------------------------------------------

/// A row from the `businesses` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct BusinessRow {
    /// Business UUID.
    pub id: Uuid,
    /// Owning organization.
    pub organization_id: Uuid,
    /// Catalog type key.
    pub business_type: String,
    /// Display name.
    pub name: String,
    /// Legal or criminal.
    pub category: String,
    /// Market category.
    pub market: String,
    /// Zone key.
    pub zone: String,
    /// Purchase price.
    pub startup_cost: Decimal,
    /// Income roll lower bound.
    pub income_min: Decimal,
    /// Income roll upper bound.
    pub income_max: Decimal,
    /// Daily operating cost.
    pub operating_cost: Decimal,
    /// Raid exposure.
    pub risk_tier: String,
    /// Lifecycle status.
    pub status: String,
    /// Lifetime income.
    pub total_earnings: Decimal,
    /// Raids suffered.
    pub raid_count: i32,
    /// Next raid check.
    pub next_raid_check: Option<DateTime<Utc>>,
    /// Last income credit.
    pub last_income_at: Option<DateTime<Utc>>,
    /// End of the current closure.
    pub closed_until: Option<DateTime<Utc>>,
    /// Customer reputation.
    pub reputation: f64,
    /// Service quality.
    pub quality: i16,
    /// Price multiplier.
    pub price_modifier: f64,
    /// Purchase time.
    pub purchased_at: DateTime<Utc>,
}

impl TryFrom<BusinessRow> for Business {
    type Error = DbError;

    fn try_from(row: BusinessRow) -> Result<Self, Self::Error> {
        const ENTITY: &str = "business";
        Ok(Self {
            id: row.id.into(),
            organization_id: row.organization_id.into(),
            business_type: BusinessTypeKey::new(row.business_type),
            name: row.name,
            category: enum_from_db(ENTITY, &row.category)?,
            market: enum_from_db(ENTITY, &row.market)?,
            zone: ZoneKey::new(row.zone),
            startup_cost: row.startup_cost,
            income_min: row.income_min,
            income_max: row.income_max,
            operating_cost: row.operating_cost,
            risk_tier: enum_from_db(ENTITY, &row.risk_tier)?,
            status: enum_from_db(ENTITY, &row.status)?,
            total_earnings: row.total_earnings,
            raid_count: to_u32(ENTITY, "raid_count", row.raid_count)?,
            next_raid_check: row.next_raid_check,
            last_income_at: row.last_income_at,
            closed_until: row.closed_until,
            reputation: row.reputation,
            quality: quality_from_db(ENTITY, row.quality)?,
            price_modifier: row.price_modifier,
            purchased_at: row.purchased_at,
        })
    }
}

/// Column list shared by every `businesses` select.
pub const BUSINESS_COLUMNS: &str = "id, organization_id, business_type, name, category, market, \
     zone, startup_cost, income_min, income_max, operating_cost, risk_tier, status, \
     total_earnings, raid_count, next_raid_check, last_income_at, closed_until, reputation, \
     quality, price_modifier, purchased_at";

/// A row from the `npc_businesses` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct NpcBusinessRow {
    /// Business UUID.
    pub id: Uuid,
    /// Display name.
    pub name: String,
    /// Zone key.
    pub zone: String,
    /// Market category.
    pub market: String,
    /// Market health.
    pub status: String,
    /// Behavioural profile.
    pub personality: String,
    /// Service quality.
    pub quality: i16,
    /// Price multiplier.
    pub price_modifier: f64,
    /// Customer reputation.
    pub reputation: f64,
    /// Revenue moving average.
    pub average_revenue: f64,
    /// Revenue of the last evaluated week.
    pub last_week_revenue: f64,
    /// Weeks at or above average.
    pub consecutive_gain_weeks: i32,
    /// Weeks below average.
    pub consecutive_loss_weeks: i32,
    /// Protecting organization.
    pub protected_by: Option<Uuid>,
    /// Last price or quality change.
    pub last_adjusted_at: Option<DateTime<Utc>>,
    /// Closure time.
    pub closed_at: Option<DateTime<Utc>>,
}

impl TryFrom<NpcBusinessRow> for NpcBusiness {
    type Error = DbError;

    fn try_from(row: NpcBusinessRow) -> Result<Self, Self::Error> {
        const ENTITY: &str = "npc business";
        Ok(Self {
            id: row.id.into(),
            name: row.name,
            zone: ZoneKey::new(row.zone),
            market: enum_from_db(ENTITY, &row.market)?,
            status: enum_from_db(ENTITY, &row.status)?,
            personality: enum_from_db(ENTITY, &row.personality)?,
            quality: quality_from_db(ENTITY, row.quality)?,
            price_modifier: row.price_modifier,
            reputation: row.reputation,
            average_revenue: row.average_revenue,
            last_week_revenue: row.last_week_revenue,
            consecutive_gain_weeks: to_u32(ENTITY, "consecutive_gain_weeks", row.consecutive_gain_weeks)?,
            consecutive_loss_weeks: to_u32(ENTITY, "consecutive_loss_weeks", row.consecutive_loss_weeks)?,
            protected_by: row.protected_by.map(Into::into),
            last_adjusted_at: row.last_adjusted_at,
            closed_at: row.closed_at,
        })
    }
}

/// Column list shared by every `npc_businesses` select.
pub const NPC_COLUMNS: &str = "id, name, zone, market, status, personality, quality, \
     price_modifier, reputation, average_revenue, last_week_revenue, consecutive_gain_weeks, \
     consecutive_loss_weeks, protected_by, last_adjusted_at, closed_at";

// ---------------------------------------------------------------------------
// Heists
// ---------------------------------------------------------------------------

/// A row from the `heists` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct HeistRow {
    /// Heist UUID.
    pub id: Uuid,
    /// Planning organization.
    pub organization_id: Uuid,
    /// Target key.
    pub target: String,
    /// Payout lower bound.
    pub payout_min: Decimal,
    /// Payout upper bound.
    pub payout_max: Decimal,
    /// Required headcount.
    pub required_crew: i32,
    /// Staffed crew.
    pub crew: Json<Vec<CrewAssignment>>,
    /// Planning progress.
    pub progress: i32,
    /// Equipment cost.
    pub equipment_cost: Decimal,
    /// Risk level.
    pub risk_level: i32,
    /// Heat level.
    pub heat_level: i32,
    /// The target's own heat.
    pub target_heat: i32,
    /// Lifecycle status.
    pub status: String,
    /// Outcome once completed.
    pub outcome: Option<String>,
    /// Payout once completed.
    pub payout: Decimal,
    /// Arrested crew.
    pub arrested: Vec<Uuid>,
    /// Killed crew.
    pub casualties: Vec<Uuid>,
    /// Planning start.
    pub created_at: DateTime<Utc>,
    /// Completion or cancellation.
    pub finished_at: Option<DateTime<Utc>>,
}

impl TryFrom<HeistRow> for Heist {
    type Error = DbError;

    fn try_from(row: HeistRow) -> Result<Self, Self::Error> {
        const ENTITY: &str = "heist";
        Ok(Self {
            id: row.id.into(),
            organization_id: row.organization_id.into(),
            target: HeistTargetKey::new(row.target),
            payout_min: row.payout_min,
            payout_max: row.payout_max,
            required_crew: to_u32(ENTITY, "required_crew", row.required_crew)?,
            crew: row.crew.0,
            progress: to_u32(ENTITY, "progress", row.progress)?,
            equipment_cost: row.equipment_cost,
            risk_level: to_u32(ENTITY, "risk_level", row.risk_level)?,
            heat_level: to_u32(ENTITY, "heat_level", row.heat_level)?,
            target_heat: to_u32(ENTITY, "target_heat", row.target_heat)?,
            status: enum_from_db(ENTITY, &row.status)?,
            outcome: row
                .outcome
                .as_deref()
                .map(|raw| enum_from_db(ENTITY, raw))
                .transpose()?,
            payout: row.payout,
            arrested: row.arrested.into_iter().map(Into::into).collect(),
            casualties: row.casualties.into_iter().map(Into::into).collect(),
            created_at: row.created_at,
            finished_at: row.finished_at,
        })
    }
}

/// Column list shared by every `heists` select.
pub const HEIST_COLUMNS: &str = "id, organization_id, target, payout_min, payout_max, \
     required_crew, crew, progress, equipment_cost, risk_level, heat_level, target_heat, status, \
     outcome, payout, arrested, casualties, created_at, finished_at";

// ---------------------------------------------------------------------------
// Investments
// ---------------------------------------------------------------------------

/// A row from the `investments` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct InvestmentRow {
    /// Investment UUID.
    pub id: Uuid,
    /// Owning organization.
    pub organization_id: Uuid,
    /// Amount invested.
    pub principal: Decimal,
    /// Return over the full term.
    pub return_rate: Decimal,
    /// Placement time.
    pub placed_at: DateTime<Utc>,
    /// Maturity time.
    pub matures_at: DateTime<Utc>,
    /// Lifecycle status.
    pub status: String,
    /// Maturity payout.
    pub payout: Option<Decimal>,
}

impl TryFrom<InvestmentRow> for Investment {
    type Error = DbError;

    fn try_from(row: InvestmentRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id.into(),
            organization_id: row.organization_id.into(),
            principal: row.principal,
            return_rate: row.return_rate,
            placed_at: row.placed_at,
            matures_at: row.matures_at,
            status: enum_from_db("investment", &row.status)?,
            payout: row.payout,
        })
    }
}

/// Column list shared by every `investments` select.
pub const INVESTMENT_COLUMNS: &str =
    "id, organization_id, principal, return_rate, placed_at, matures_at, status, payout";
