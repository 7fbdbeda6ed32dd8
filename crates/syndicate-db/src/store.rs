//! `PostgreSQL` implementation of the [`Store`] / [`StoreTx`] seam.
//!
//! Each [`PgTx`] wraps one database transaction. Reads that precede a write
//! take `FOR UPDATE` row locks, and every list query orders by primary key so
//! concurrent batch jobs acquire locks in the same order.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::types::Json;
use sqlx::{PgPool, Postgres, Transaction};
use syndicate_core::{Store, StoreError, StoreTx};
use syndicate_economy::business::day_start;
use syndicate_types::{
    Business, BusinessCategory, BusinessId, BusinessStatus, CharacterId, Heist, HeistId,
    HeistStatus, HeistTargetKey, Investment, InvestmentStatus, JournalEntry, LedgerAccount,
    MarketCategory, Member, MemberRole, NpcBusiness, NpcStatus, Organization, OrganizationId,
    ZoneInfluence, ZoneKey,
};
use uuid::Uuid;

use crate::error::DbError;
use crate::rows::{
    BUSINESS_COLUMNS, BusinessRow, HEIST_COLUMNS, HeistRow, INVESTMENT_COLUMNS, InfluenceRow,
    InvestmentRow, LEDGER_COLUMNS, LedgerAccountRow, MemberRow, NPC_COLUMNS, NpcBusinessRow,
    OrganizationRow, enum_from_db, enum_to_db, to_i32,
};

/// Transactional store over a `PostgreSQL` pool.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Create a store bound to a connection pool.
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl Store for PgStore {
    type Tx = PgTx;

    async fn begin(&self) -> Result<PgTx, StoreError> {
        let tx = self.pool.begin().await.map_err(DbError::from)?;
        Ok(PgTx { tx })
    }
}

/// One open `PostgreSQL` transaction. Dropping it rolls back.
pub struct PgTx {
    tx: Transaction<'static, Postgres>,
}

impl std::fmt::Debug for PgTx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PgTx").finish_non_exhaustive()
    }
}

fn decode_all<R, T>(rows: Vec<R>) -> Result<Vec<T>, DbError>
where
    T: TryFrom<R, Error = DbError>,
{
    rows.into_iter().map(T::try_from).collect()
}

/// Record one movement on a character's personal balance.
async fn log_character_transaction(
    conn: &mut sqlx::PgConnection,
    character: CharacterId,
    delta: Decimal,
    reason: &str,
    context: &serde_json::Value,
) -> Result<(), DbError> {
    sqlx::query(
        r"INSERT INTO character_transactions (character_id, delta, reason, context)
          VALUES ($1, $2, $3, $4)",
    )
    .bind(character.into_inner())
    .bind(delta)
    .bind(reason)
    .bind(Json(context))
    .execute(conn)
    .await?;
    Ok(())
}

impl PgTx {
    async fn upsert_business(&mut self, business: &Business) -> Result<(), DbError> {
        const ENTITY: &str = "business";
        sqlx::query(
            r"INSERT INTO businesses (id, organization_id, business_type, name, category, market, zone,
                  startup_cost, income_min, income_max, operating_cost, risk_tier, status,
                  total_earnings, raid_count, next_raid_check, last_income_at, closed_until,
                  reputation, quality, price_modifier, purchased_at)
              VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17,
                  $18, $19, $20, $21, $22)
              ON CONFLICT (id) DO UPDATE SET
                  status = EXCLUDED.status,
                  total_earnings = EXCLUDED.total_earnings,
                  raid_count = EXCLUDED.raid_count,
                  next_raid_check = EXCLUDED.next_raid_check,
                  last_income_at = EXCLUDED.last_income_at,
                  closed_until = EXCLUDED.closed_until,
                  reputation = EXCLUDED.reputation,
                  quality = EXCLUDED.quality,
                  price_modifier = EXCLUDED.price_modifier",
        )
        .bind(business.id.into_inner())
        .bind(business.organization_id.into_inner())
        .bind(business.business_type.as_str())
        .bind(&business.name)
        .bind(enum_to_db(business.category)?)
        .bind(business.market.as_str())
        .bind(business.zone.as_str())
        .bind(business.startup_cost)
        .bind(business.income_min)
        .bind(business.income_max)
        .bind(business.operating_cost)
        .bind(enum_to_db(business.risk_tier)?)
        .bind(enum_to_db(business.status)?)
        .bind(business.total_earnings)
        .bind(to_i32(ENTITY, "raid_count", business.raid_count)?)
        .bind(business.next_raid_check)
        .bind(business.last_income_at)
        .bind(business.closed_until)
        .bind(business.reputation)
        .bind(i16::from(business.quality))
        .bind(business.price_modifier)
        .bind(business.purchased_at)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn upsert_heist(&mut self, heist: &Heist) -> Result<(), DbError> {
        const ENTITY: &str = "heist";
        let arrested: Vec<Uuid> = heist.arrested.iter().map(|c| c.into_inner()).collect();
        let casualties: Vec<Uuid> = heist.casualties.iter().map(|c| c.into_inner()).collect();
        let outcome = heist.outcome.map(enum_to_db).transpose()?;
        sqlx::query(
            r"INSERT INTO heists (id, organization_id, target, payout_min, payout_max, required_crew,
                  crew, progress, equipment_cost, risk_level, heat_level, target_heat, status,
                  outcome, payout, arrested, casualties, created_at, finished_at)
              VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17,
                  $18, $19)
              ON CONFLICT (id) DO UPDATE SET
                  crew = EXCLUDED.crew,
                  progress = EXCLUDED.progress,
                  risk_level = EXCLUDED.risk_level,
                  heat_level = EXCLUDED.heat_level,
                  status = EXCLUDED.status,
                  outcome = EXCLUDED.outcome,
                  payout = EXCLUDED.payout,
                  arrested = EXCLUDED.arrested,
                  casualties = EXCLUDED.casualties,
                  finished_at = EXCLUDED.finished_at",
        )
        .bind(heist.id.into_inner())
        .bind(heist.organization_id.into_inner())
        .bind(heist.target.as_str())
        .bind(heist.payout_min)
        .bind(heist.payout_max)
        .bind(to_i32(ENTITY, "required_crew", heist.required_crew)?)
        .bind(Json(&heist.crew))
        .bind(to_i32(ENTITY, "progress", heist.progress)?)
        .bind(heist.equipment_cost)
        .bind(to_i32(ENTITY, "risk_level", heist.risk_level)?)
        .bind(to_i32(ENTITY, "heat_level", heist.heat_level)?)
        .bind(to_i32(ENTITY, "target_heat", heist.target_heat)?)
        .bind(enum_to_db(heist.status)?)
        .bind(outcome)
        .bind(heist.payout)
        .bind(&arrested)
        .bind(&casualties)
        .bind(heist.created_at)
        .bind(heist.finished_at)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn upsert_investment(&mut self, investment: &Investment) -> Result<(), DbError> {
        sqlx::query(
            r"INSERT INTO investments (id, organization_id, principal, return_rate, placed_at,
                  matures_at, status, payout)
              VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
              ON CONFLICT (id) DO UPDATE SET
                  status = EXCLUDED.status,
                  payout = EXCLUDED.payout",
        )
        .bind(investment.id.into_inner())
        .bind(investment.organization_id.into_inner())
        .bind(investment.principal)
        .bind(investment.return_rate)
        .bind(investment.placed_at)
        .bind(investment.matures_at)
        .bind(enum_to_db(investment.status)?)
        .bind(investment.payout)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn select_businesses(
        &mut self,
        filter: &str,
        binds: BusinessFilter<'_>,
    ) -> Result<Vec<Business>, DbError> {
        let sql = format!("SELECT {BUSINESS_COLUMNS} FROM businesses WHERE {filter} ORDER BY id FOR UPDATE");
        let query = sqlx::query_as::<_, BusinessRow>(&sql);
        let query = match binds {
            BusinessFilter::Income { active, since } => query.bind(active).bind(since),
            BusinessFilter::Raid { criminal, active, now } => {
                query.bind(criminal).bind(active).bind(now)
            }
            BusinessFilter::Reopen { raided, now } => query.bind(raided).bind(now),
        };
        let rows = query.fetch_all(&mut *self.tx).await?;
        decode_all(rows)
    }
}

/// Bind values of the batch-job business selections.
enum BusinessFilter<'a> {
    Income { active: &'a str, since: DateTime<Utc> },
    Raid { criminal: &'a str, active: &'a str, now: DateTime<Utc> },
    Reopen { raided: &'a str, now: DateTime<Utc> },
}

impl StoreTx for PgTx {
    async fn organization(&mut self, id: OrganizationId) -> Result<Option<Organization>, StoreError> {
        let row = sqlx::query_as::<_, OrganizationRow>(
            "SELECT id, name, level, leader_id FROM organizations WHERE id = $1",
        )
        .bind(id.into_inner())
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(DbError::from)?;
        Ok(row.map(Organization::try_from).transpose()?)
    }

    async fn member_role(
        &mut self,
        organization: OrganizationId,
        character: CharacterId,
    ) -> Result<Option<MemberRole>, StoreError> {
        let role: Option<String> = sqlx::query_scalar(
            r"SELECT role FROM organization_members
              WHERE organization_id = $1 AND character_id = $2
              FOR SHARE",
        )
        .bind(organization.into_inner())
        .bind(character.into_inner())
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(DbError::from)?;
        Ok(role
            .as_deref()
            .map(|raw| enum_from_db("member", raw))
            .transpose()?)
    }

    async fn members(&mut self, organization: OrganizationId) -> Result<Vec<Member>, StoreError> {
        let rows = sqlx::query_as::<_, MemberRow>(
            r"SELECT character_id, role FROM organization_members
              WHERE organization_id = $1
              ORDER BY character_id",
        )
        .bind(organization.into_inner())
        .fetch_all(&mut *self.tx)
        .await
        .map_err(DbError::from)?;
        Ok(decode_all(rows)?)
    }

    async fn ledger_for_update(
        &mut self,
        organization: OrganizationId,
        now: DateTime<Utc>,
    ) -> Result<LedgerAccount, StoreError> {
        // The row must exist before the lock: FOR UPDATE on a missing row
        // locks nothing, and two first writers would both start from zero.
        let empty = LedgerAccount::open(organization, now);
        sqlx::query(
            r"INSERT INTO ledger_accounts (organization_id, next_payday, updated_at)
              VALUES ($1, $2, $3)
              ON CONFLICT (organization_id) DO NOTHING",
        )
        .bind(organization.into_inner())
        .bind(empty.payroll.next_payday)
        .bind(empty.updated_at)
        .execute(&mut *self.tx)
        .await
        .map_err(DbError::from)?;

        let sql = format!(
            "SELECT {LEDGER_COLUMNS} FROM ledger_accounts WHERE organization_id = $1 FOR UPDATE"
        );
        let row = sqlx::query_as::<_, LedgerAccountRow>(&sql)
            .bind(organization.into_inner())
            .fetch_one(&mut *self.tx)
            .await
            .map_err(DbError::from)?;
        Ok(LedgerAccount::from(row))
    }

    async fn ledgers_for_update(&mut self) -> Result<Vec<LedgerAccount>, StoreError> {
        let sql = format!(
            "SELECT {LEDGER_COLUMNS} FROM ledger_accounts ORDER BY organization_id FOR UPDATE"
        );
        let rows = sqlx::query_as::<_, LedgerAccountRow>(&sql)
            .fetch_all(&mut *self.tx)
            .await
            .map_err(DbError::from)?;
        Ok(rows.into_iter().map(LedgerAccount::from).collect())
    }

    async fn payroll_due_for_update(
        &mut self,
        now: DateTime<Utc>,
    ) -> Result<Vec<LedgerAccount>, StoreError> {
        let sql = format!(
            "SELECT {LEDGER_COLUMNS} FROM ledger_accounts WHERE next_payday <= $1 \
             ORDER BY organization_id FOR UPDATE"
        );
        let rows = sqlx::query_as::<_, LedgerAccountRow>(&sql)
            .bind(now)
            .fetch_all(&mut *self.tx)
            .await
            .map_err(DbError::from)?;
        Ok(rows.into_iter().map(LedgerAccount::from).collect())
    }

    async fn save_ledger(&mut self, account: &LedgerAccount) -> Result<(), StoreError> {
        let balances = &account.balances;
        let payroll = &account.payroll;
        sqlx::query(
            r"INSERT INTO ledger_accounts (organization_id, operating, war, investment, emergency,
                  wages, officer_bonus, next_payday, last_paid, last_interest_at, updated_at)
              VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
              ON CONFLICT (organization_id) DO UPDATE SET
                  operating = EXCLUDED.operating,
                  war = EXCLUDED.war,
                  investment = EXCLUDED.investment,
                  emergency = EXCLUDED.emergency,
                  wages = EXCLUDED.wages,
                  officer_bonus = EXCLUDED.officer_bonus,
                  next_payday = EXCLUDED.next_payday,
                  last_paid = EXCLUDED.last_paid,
                  last_interest_at = EXCLUDED.last_interest_at,
                  updated_at = EXCLUDED.updated_at",
        )
        .bind(account.organization_id.into_inner())
        .bind(balances.operating)
        .bind(balances.war)
        .bind(balances.investment)
        .bind(balances.emergency)
        .bind(Json(&payroll.wages))
        .bind(payroll.officer_bonus)
        .bind(payroll.next_payday)
        .bind(payroll.last_paid)
        .bind(account.last_interest_at)
        .bind(account.updated_at)
        .execute(&mut *self.tx)
        .await
        .map_err(DbError::from)?;
        Ok(())
    }

    async fn append_journal(&mut self, entries: &[JournalEntry]) -> Result<(), StoreError> {
        if entries.is_empty() {
            return Ok(());
        }

        let len = entries.len();
        let mut ids = Vec::with_capacity(len);
        let mut organizations = Vec::with_capacity(len);
        let mut accounts = Vec::with_capacity(len);
        let mut entry_types = Vec::with_capacity(len);
        let mut deltas = Vec::with_capacity(len);
        let mut counterparts: Vec<Option<Uuid>> = Vec::with_capacity(len);
        let mut memos = Vec::with_capacity(len);
        let mut timestamps = Vec::with_capacity(len);

        for entry in entries {
            ids.push(entry.id.into_inner());
            organizations.push(entry.organization_id.into_inner());
            accounts.push(enum_to_db(entry.account)?);
            entry_types.push(enum_to_db(entry.entry_type)?);
            deltas.push(entry.delta);
            counterparts.push(entry.counterpart);
            memos.push(entry.memo.clone());
            timestamps.push(entry.created_at);
        }

        sqlx::query(
            r"INSERT INTO ledger_journal (id, organization_id, account, entry_type, delta, counterpart, memo, created_at)
              SELECT * FROM UNNEST($1::UUID[], $2::UUID[], $3::TEXT[], $4::TEXT[], $5::NUMERIC[], $6::UUID[], $7::TEXT[], $8::TIMESTAMPTZ[])",
        )
        .bind(&ids)
        .bind(&organizations)
        .bind(&accounts)
        .bind(&entry_types)
        .bind(&deltas)
        .bind(&counterparts)
        .bind(&memos)
        .bind(&timestamps)
        .execute(&mut *self.tx)
        .await
        .map_err(DbError::from)?;

        tracing::debug!(count = len, "Appended ledger journal entries (batch UNNEST)");
        Ok(())
    }

    async fn credit_character(
        &mut self,
        character: CharacterId,
        amount: Decimal,
        reason: &str,
        context: &serde_json::Value,
    ) -> Result<Decimal, StoreError> {
        let balance: Decimal = sqlx::query_scalar(
            r"INSERT INTO character_balances (character_id, balance, updated_at)
              VALUES ($1, $2, now())
              ON CONFLICT (character_id) DO UPDATE SET
                  balance = character_balances.balance + EXCLUDED.balance,
                  updated_at = now()
              RETURNING balance",
        )
        .bind(character.into_inner())
        .bind(amount)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(DbError::from)?;

        log_character_transaction(&mut self.tx, character, amount, reason, context).await?;
        Ok(balance)
    }

    async fn debit_character(
        &mut self,
        character: CharacterId,
        amount: Decimal,
        reason: &str,
        context: &serde_json::Value,
    ) -> Result<Decimal, StoreError> {
        let available: Option<Decimal> = sqlx::query_scalar(
            "SELECT balance FROM character_balances WHERE character_id = $1 FOR UPDATE",
        )
        .bind(character.into_inner())
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(DbError::from)?;
        let available = available.unwrap_or(Decimal::ZERO);

        let remaining = available
            .checked_sub(amount)
            .filter(|remaining| *remaining >= Decimal::ZERO)
            .ok_or(StoreError::InsufficientCharacterFunds {
                character,
                requested: amount,
                available,
            })?;

        sqlx::query(
            "UPDATE character_balances SET balance = $2, updated_at = now() WHERE character_id = $1",
        )
        .bind(character.into_inner())
        .bind(remaining)
        .execute(&mut *self.tx)
        .await
        .map_err(DbError::from)?;

        let mut delta = amount;
        delta.set_sign_negative(true);
        log_character_transaction(&mut self.tx, character, delta, reason, context).await?;
        Ok(remaining)
    }

    async fn insert_business(&mut self, business: &Business) -> Result<(), StoreError> {
        Ok(self.upsert_business(business).await?)
    }

    async fn business_for_update(&mut self, id: BusinessId) -> Result<Option<Business>, StoreError> {
        let sql = format!("SELECT {BUSINESS_COLUMNS} FROM businesses WHERE id = $1 FOR UPDATE");
        let row = sqlx::query_as::<_, BusinessRow>(&sql)
            .bind(id.into_inner())
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(DbError::from)?;
        Ok(row.map(Business::try_from).transpose()?)
    }

    async fn save_business(&mut self, business: &Business) -> Result<(), StoreError> {
        Ok(self.upsert_business(business).await?)
    }

    async fn businesses_due_income(&mut self, now: DateTime<Utc>) -> Result<Vec<Business>, StoreError> {
        let active = enum_to_db(BusinessStatus::Active)?;
        Ok(self
            .select_businesses(
                "status = $1 AND (last_income_at IS NULL OR last_income_at < $2)",
                BusinessFilter::Income {
                    active: &active,
                    since: day_start(now),
                },
            )
            .await?)
    }

    async fn businesses_due_raid(&mut self, now: DateTime<Utc>) -> Result<Vec<Business>, StoreError> {
        let criminal = enum_to_db(BusinessCategory::Criminal)?;
        let active = enum_to_db(BusinessStatus::Active)?;
        Ok(self
            .select_businesses(
                "category = $1 AND status = $2 AND next_raid_check <= $3",
                BusinessFilter::Raid {
                    criminal: &criminal,
                    active: &active,
                    now,
                },
            )
            .await?)
    }

    async fn businesses_due_reopen(&mut self, now: DateTime<Utc>) -> Result<Vec<Business>, StoreError> {
        let raided = enum_to_db(BusinessStatus::Raided)?;
        Ok(self
            .select_businesses(
                "status = $1 AND closed_until <= $2",
                BusinessFilter::Reopen { raided: &raided, now },
            )
            .await?)
    }

    async fn businesses_in_market(
        &mut self,
        zone: &ZoneKey,
        market: MarketCategory,
    ) -> Result<Vec<Business>, StoreError> {
        let closed = enum_to_db(BusinessStatus::Closed)?;
        let sql = format!(
            "SELECT {BUSINESS_COLUMNS} FROM businesses \
             WHERE zone = $1 AND market = $2 AND status <> $3 ORDER BY id"
        );
        let rows = sqlx::query_as::<_, BusinessRow>(&sql)
            .bind(zone.as_str())
            .bind(market.as_str())
            .bind(&closed)
            .fetch_all(&mut *self.tx)
            .await
            .map_err(DbError::from)?;
        Ok(decode_all(rows)?)
    }

    async fn market_groups(&mut self) -> Result<Vec<(ZoneKey, MarketCategory)>, StoreError> {
        let closed_business = enum_to_db(BusinessStatus::Closed)?;
        let closed_npc = enum_to_db(NpcStatus::Closed)?;
        let rows: Vec<(String, String)> = sqlx::query_as(
            r"SELECT zone, market FROM businesses WHERE status <> $1
              UNION
              SELECT zone, market FROM npc_businesses WHERE status <> $2
              ORDER BY zone, market",
        )
        .bind(&closed_business)
        .bind(&closed_npc)
        .fetch_all(&mut *self.tx)
        .await
        .map_err(DbError::from)?;

        let groups = rows
            .into_iter()
            .map(|(zone, market)| {
                enum_from_db("market group", &market).map(|market| (ZoneKey::new(zone), market))
            })
            .collect::<Result<Vec<_>, DbError>>()?;
        Ok(groups)
    }

    async fn npc_businesses_for_update(
        &mut self,
        zone: &ZoneKey,
        market: MarketCategory,
    ) -> Result<Vec<NpcBusiness>, StoreError> {
        let sql = format!(
            "SELECT {NPC_COLUMNS} FROM npc_businesses \
             WHERE zone = $1 AND market = $2 ORDER BY id FOR UPDATE"
        );
        let rows = sqlx::query_as::<_, NpcBusinessRow>(&sql)
            .bind(zone.as_str())
            .bind(market.as_str())
            .fetch_all(&mut *self.tx)
            .await
            .map_err(DbError::from)?;
        Ok(decode_all(rows)?)
    }

    async fn save_npc_business(&mut self, npc: &NpcBusiness) -> Result<(), StoreError> {
        const ENTITY: &str = "npc business";
        sqlx::query(
            r"INSERT INTO npc_businesses (id, name, zone, market, status, personality, quality,
                  price_modifier, reputation, average_revenue, last_week_revenue,
                  consecutive_gain_weeks, consecutive_loss_weeks, protected_by, last_adjusted_at,
                  closed_at)
              VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
              ON CONFLICT (id) DO UPDATE SET
                  status = EXCLUDED.status,
                  quality = EXCLUDED.quality,
                  price_modifier = EXCLUDED.price_modifier,
                  reputation = EXCLUDED.reputation,
                  average_revenue = EXCLUDED.average_revenue,
                  last_week_revenue = EXCLUDED.last_week_revenue,
                  consecutive_gain_weeks = EXCLUDED.consecutive_gain_weeks,
                  consecutive_loss_weeks = EXCLUDED.consecutive_loss_weeks,
                  protected_by = EXCLUDED.protected_by,
                  last_adjusted_at = EXCLUDED.last_adjusted_at,
                  closed_at = EXCLUDED.closed_at",
        )
        .bind(npc.id.into_inner())
        .bind(&npc.name)
        .bind(npc.zone.as_str())
        .bind(npc.market.as_str())
        .bind(enum_to_db(npc.status)?)
        .bind(enum_to_db(npc.personality)?)
        .bind(i16::from(npc.quality))
        .bind(npc.price_modifier)
        .bind(npc.reputation)
        .bind(npc.average_revenue)
        .bind(npc.last_week_revenue)
        .bind(to_i32(ENTITY, "consecutive_gain_weeks", npc.consecutive_gain_weeks)?)
        .bind(to_i32(ENTITY, "consecutive_loss_weeks", npc.consecutive_loss_weeks)?)
        .bind(npc.protected_by.map(OrganizationId::into_inner))
        .bind(npc.last_adjusted_at)
        .bind(npc.closed_at)
        .execute(&mut *self.tx)
        .await
        .map_err(DbError::from)?;
        Ok(())
    }

    async fn zone_influence(&mut self, zone: &ZoneKey) -> Result<Vec<ZoneInfluence>, StoreError> {
        let rows = sqlx::query_as::<_, InfluenceRow>(
            r"SELECT organization_id, influence FROM zone_influence
              WHERE zone = $1
              ORDER BY organization_id",
        )
        .bind(zone.as_str())
        .fetch_all(&mut *self.tx)
        .await
        .map_err(DbError::from)?;
        Ok(rows.into_iter().map(ZoneInfluence::from).collect())
    }

    async fn insert_heist(&mut self, heist: &Heist) -> Result<(), StoreError> {
        Ok(self.upsert_heist(heist).await?)
    }

    async fn heist_for_update(&mut self, id: HeistId) -> Result<Option<Heist>, StoreError> {
        let sql = format!("SELECT {HEIST_COLUMNS} FROM heists WHERE id = $1 FOR UPDATE");
        let row = sqlx::query_as::<_, HeistRow>(&sql)
            .bind(id.into_inner())
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(DbError::from)?;
        Ok(row.map(Heist::try_from).transpose()?)
    }

    async fn save_heist(&mut self, heist: &Heist) -> Result<(), StoreError> {
        Ok(self.upsert_heist(heist).await?)
    }

    async fn active_heists_for_update(
        &mut self,
        organization: OrganizationId,
    ) -> Result<Vec<Heist>, StoreError> {
        let active = [HeistStatus::Planning, HeistStatus::Ready, HeistStatus::InProgress]
            .into_iter()
            .map(enum_to_db)
            .collect::<Result<Vec<_>, _>>()?;
        let sql = format!(
            "SELECT {HEIST_COLUMNS} FROM heists \
             WHERE organization_id = $1 AND status = ANY($2) ORDER BY id FOR UPDATE"
        );
        let rows = sqlx::query_as::<_, HeistRow>(&sql)
            .bind(organization.into_inner())
            .bind(&active)
            .fetch_all(&mut *self.tx)
            .await
            .map_err(DbError::from)?;
        Ok(decode_all(rows)?)
    }

    async fn last_completed_heist(
        &mut self,
        organization: OrganizationId,
        target: &HeistTargetKey,
    ) -> Result<Option<DateTime<Utc>>, StoreError> {
        let completed = enum_to_db(HeistStatus::Completed)?;
        let finished: Option<DateTime<Utc>> = sqlx::query_scalar(
            r"SELECT MAX(finished_at) FROM heists
              WHERE organization_id = $1 AND target = $2 AND status = $3",
        )
        .bind(organization.into_inner())
        .bind(target.as_str())
        .bind(&completed)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(DbError::from)?;
        Ok(finished)
    }

    async fn insert_investment(&mut self, investment: &Investment) -> Result<(), StoreError> {
        Ok(self.upsert_investment(investment).await?)
    }

    async fn investments_due_for_update(
        &mut self,
        now: DateTime<Utc>,
    ) -> Result<Vec<Investment>, StoreError> {
        let active = enum_to_db(InvestmentStatus::Active)?;
        let sql = format!(
            "SELECT {INVESTMENT_COLUMNS} FROM investments \
             WHERE status = $1 AND matures_at <= $2 ORDER BY id FOR UPDATE"
        );
        let rows = sqlx::query_as::<_, InvestmentRow>(&sql)
            .bind(&active)
            .bind(now)
            .fetch_all(&mut *self.tx)
            .await
            .map_err(DbError::from)?;
        Ok(decode_all(rows)?)
    }

    async fn save_investment(&mut self, investment: &Investment) -> Result<(), StoreError> {
        Ok(self.upsert_investment(investment).await?)
    }

    async fn commit(self) -> Result<(), StoreError> {
        self.tx.commit().await.map_err(DbError::from)?;
        Ok(())
    }
}
