//! Batch sub-jobs run by the scheduler.
//!
//! Each sub-job is one all-or-nothing transaction: the first error aborts
//! and rolls back the whole batch. The market sub-job is the exception, with
//! one transaction per (zone, category) group evaluated concurrently.

use std::collections::BTreeMap;
use std::collections::btree_map::Entry;

use chrono::{DateTime, Utc};
use futures::future::try_join_all;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::json;
use syndicate_economy::business::{self, RaidOutcome};
use syndicate_economy::market::{self, MarketGroup, NpcAction};
use syndicate_economy::{BusinessRules, investment};
use syndicate_ledger::{InterestPolicy, Ledger, PayrollPlan, plan_payroll};
use syndicate_types::{
    AccountKind, JournalEntryType, MarketCategory, NpcBusinessId, OrganizationId, ZoneKey,
};
use tracing::{info, warn};

use crate::config::SyndicateConfig;
use crate::error::ServiceError;
use crate::services::{open_ledger, persist_ledger};
use crate::store::{ReportCache, Store, StoreTx};

/// One unit of scheduled work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SubJob {
    /// Reopen raided businesses whose closure elapsed.
    ReopenBusinesses,
    /// Credit daily business income.
    DailyIncome,
    /// Roll raid checks on criminal businesses.
    RaidChecks,
    /// Pay out matured investments.
    InvestmentMaturity,
    /// Pay wages and officer bonuses.
    Payroll,
    /// Accrue interest on ledger accounts.
    Interest,
    /// Score markets and run world-owned business behaviour.
    MarketCompetition,
}

impl SubJob {
    /// Name used in logs.
    pub const fn name(self) -> &'static str {
        match self {
            Self::ReopenBusinesses => "reopen_businesses",
            Self::DailyIncome => "daily_income",
            Self::RaidChecks => "raid_checks",
            Self::InvestmentMaturity => "investment_maturity",
            Self::Payroll => "payroll",
            Self::Interest => "interest",
            Self::MarketCompetition => "market_competition",
        }
    }
}

impl core::fmt::Display for SubJob {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.name())
    }
}

/// What a sub-job did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobSummary {
    /// Which sub-job.
    pub job: SubJob,
    /// Records examined.
    pub processed: usize,
    /// Records changed.
    pub affected: usize,
    /// Records deliberately left alone (unaffordable payroll, unpaid fine).
    pub skipped: usize,
    /// Money moved between ledgers and characters, in absolute value.
    pub total_moved: Decimal,
}

impl JobSummary {
    const fn new(job: SubJob) -> Self {
        Self {
            job,
            processed: 0,
            affected: 0,
            skipped: 0,
            total_moved: Decimal::ZERO,
        }
    }

    const fn processed(&mut self) {
        self.processed = self.processed.saturating_add(1);
    }

    const fn affected(&mut self) {
        self.affected = self.affected.saturating_add(1);
    }

    const fn skipped(&mut self) {
        self.skipped = self.skipped.saturating_add(1);
    }

    fn moved(&mut self, amount: Decimal) {
        self.total_moved = self.total_moved.saturating_add(amount.abs());
    }

    fn log(self) -> Self {
        info!(
            job = %self.job,
            processed = self.processed,
            affected = self.affected,
            skipped = self.skipped,
            total_moved = %self.total_moved,
            "job finished"
        );
        self
    }
}

/// Lock (or open) a ledger into the batch's working set.
async fn batch_ledger<'a, T: StoreTx>(
    tx: &mut T,
    ledgers: &'a mut BTreeMap<OrganizationId, Ledger>,
    organization_id: OrganizationId,
    now: DateTime<Utc>,
) -> Result<&'a mut Ledger, ServiceError> {
    match ledgers.entry(organization_id) {
        Entry::Occupied(slot) => Ok(slot.into_mut()),
        Entry::Vacant(slot) => Ok(slot.insert(open_ledger(tx, organization_id, now).await?)),
    }
}

async fn persist_all<T: StoreTx>(
    tx: &mut T,
    ledgers: BTreeMap<OrganizationId, Ledger>,
) -> Result<(), ServiceError> {
    for ledger in ledgers.into_values() {
        persist_ledger(tx, ledger).await?;
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Daily
// ---------------------------------------------------------------------------

/// Reopen raided businesses whose closure has elapsed. Idempotent.
pub async fn reopen_businesses<S: Store>(
    store: &S,
    now: DateTime<Utc>,
) -> Result<JobSummary, ServiceError> {
    let mut summary = JobSummary::new(SubJob::ReopenBusinesses);
    let mut tx = store.begin().await?;
    for mut due in tx.businesses_due_reopen(now).await? {
        summary.processed();
        if business::reopen_if_elapsed(&mut due, now) {
            tx.save_business(&due).await?;
            summary.affected();
        }
    }
    tx.commit().await?;
    Ok(summary.log())
}

/// Credit one day of income to every active business not yet paid today.
pub async fn daily_income<S: Store>(
    store: &S,
    now: DateTime<Utc>,
    rng: &mut StdRng,
) -> Result<JobSummary, ServiceError> {
    let mut summary = JobSummary::new(SubJob::DailyIncome);
    let mut tx = store.begin().await?;
    let mut ledgers = BTreeMap::new();

    for mut earning in tx.businesses_due_income(now).await? {
        summary.processed();
        let roll = business::daily_income(&earning, rng)?;
        if roll.credited > Decimal::ZERO {
            let ledger = batch_ledger(&mut tx, &mut ledgers, earning.organization_id, now).await?;
            ledger.credit(
                AccountKind::Operating,
                roll.credited,
                JournalEntryType::BusinessIncome,
                Some(earning.id.into_inner()),
            )?;
            summary.moved(roll.credited);
            summary.affected();
        }
        business::apply_income(&mut earning, &roll, now)?;
        tx.save_business(&earning).await?;
    }

    persist_all(&mut tx, ledgers).await?;
    tx.commit().await?;
    Ok(summary.log())
}

/// Roll due raid checks. A fine the operating account cannot cover is left
/// unpaid and extends the closure instead.
pub async fn raid_checks<S: Store>(
    store: &S,
    rules: &BusinessRules,
    now: DateTime<Utc>,
    rng: &mut StdRng,
) -> Result<JobSummary, ServiceError> {
    let mut summary = JobSummary::new(SubJob::RaidChecks);
    let mut tx = store.begin().await?;
    let mut ledgers = BTreeMap::new();

    for mut checked in tx.businesses_due_raid(now).await? {
        summary.processed();
        let outcome = business::raid_check(&mut checked, rules, now, rng)?;
        if let RaidOutcome::Raided {
            fine,
            closure_days,
            permanent,
        } = outcome
        {
            summary.affected();
            let ledger = batch_ledger(&mut tx, &mut ledgers, checked.organization_id, now).await?;
            let operating = ledger.balances().operating;
            if fine > Decimal::ZERO && operating >= fine {
                ledger.debit(
                    AccountKind::Operating,
                    fine,
                    JournalEntryType::RaidFine,
                    Some(checked.id.into_inner()),
                )?;
                summary.moved(fine);
            } else if fine > Decimal::ZERO {
                business::extend_closure(&mut checked, rules);
                summary.skipped();
                warn!(
                    business_id = %checked.id,
                    organization_id = %checked.organization_id,
                    %fine,
                    %operating,
                    "raid fine unpaid, closure extended"
                );
            }
            warn!(
                target: "syndicate::audit",
                business_id = %checked.id,
                organization_id = %checked.organization_id,
                raid_count = checked.raid_count,
                closure_days,
                permanent,
                "business raided"
            );
        }
        tx.save_business(&checked).await?;
    }

    persist_all(&mut tx, ledgers).await?;
    tx.commit().await?;
    Ok(summary.log())
}

/// Pay out every investment that has reached maturity.
pub async fn mature_investments<S: Store>(
    store: &S,
    now: DateTime<Utc>,
) -> Result<JobSummary, ServiceError> {
    let mut summary = JobSummary::new(SubJob::InvestmentMaturity);
    let mut tx = store.begin().await?;
    let mut ledgers = BTreeMap::new();

    for mut due in tx.investments_due_for_update(now).await? {
        summary.processed();
        let payout = investment::mature(&mut due, now)?;
        if payout > Decimal::ZERO {
            let ledger = batch_ledger(&mut tx, &mut ledgers, due.organization_id, now).await?;
            ledger.credit(
                AccountKind::Investment,
                payout,
                JournalEntryType::InvestmentMatured,
                Some(due.id.into_inner()),
            )?;
            summary.moved(payout);
        }
        tx.save_investment(&due).await?;
        summary.affected();
    }

    persist_all(&mut tx, ledgers).await?;
    tx.commit().await?;
    Ok(summary.log())
}

// ---------------------------------------------------------------------------
// Weekly
// ---------------------------------------------------------------------------

/// Pay every organization whose payday has arrived. An organization that
/// cannot cover its full payroll is skipped untouched.
pub async fn payroll<S: Store>(store: &S, now: DateTime<Utc>) -> Result<JobSummary, ServiceError> {
    let mut summary = JobSummary::new(SubJob::Payroll);
    let mut tx = store.begin().await?;

    for account in tx.payroll_due_for_update(now).await? {
        summary.processed();
        let organization_id = account.organization_id;
        let members = tx.members(organization_id).await?;
        let mut ledger = Ledger::new(account, now);
        let plan = plan_payroll(
            &ledger.account().payroll,
            &members,
            ledger.balances().operating,
        )?;

        match plan {
            PayrollPlan::Pay { lines, total } => {
                ledger.pay_payroll(&lines, total)?;
                for line in &lines {
                    let amount = line.total()?;
                    if amount > Decimal::ZERO {
                        tx.credit_character(
                            line.member,
                            amount,
                            "payroll",
                            &json!({ "organization_id": organization_id, "role": line.role }),
                        )
                        .await?;
                    }
                }
                persist_ledger(&mut tx, ledger).await?;
                summary.moved(total);
                summary.affected();
            }
            PayrollPlan::Skipped {
                required,
                available,
            } => {
                summary.skipped();
                warn!(
                    organization_id = %organization_id,
                    %required,
                    %available,
                    "payroll skipped, operating account cannot cover it"
                );
            }
            PayrollPlan::Empty => {
                ledger.advance_payday(false);
                persist_ledger(&mut tx, ledger).await?;
            }
        }
    }

    tx.commit().await?;
    Ok(summary.log())
}

/// Accrue interest for every account due under `policy`.
pub async fn accrue_interest<S: Store>(
    store: &S,
    policy: &InterestPolicy,
    now: DateTime<Utc>,
) -> Result<JobSummary, ServiceError> {
    let mut summary = JobSummary::new(SubJob::Interest);
    let mut tx = store.begin().await?;

    for account in tx.ledgers_for_update().await? {
        if !policy.is_due(&account, now) {
            continue;
        }
        summary.processed();
        let mut ledger = Ledger::new(account, now);
        let accrual = ledger.accrue_interest(policy)?;
        let credited = accrual.credited();
        if credited > Decimal::ZERO {
            summary.moved(credited);
            summary.affected();
        }
        persist_ledger(&mut tx, ledger).await?;
    }

    tx.commit().await?;
    Ok(summary.log())
}

/// Evaluate every market group concurrently, each in its own transaction.
///
/// Projected revenue drives world-owned business behaviour; no money moves.
/// Reports are cached after their group commits; a cache failure is logged
/// and does not fail the job.
pub async fn market_competition<S: Store, C: ReportCache>(
    store: &S,
    cache: &C,
    config: &SyndicateConfig,
    now: DateTime<Utc>,
    rng: &mut StdRng,
) -> Result<JobSummary, ServiceError> {
    let groups = {
        let mut tx = store.begin().await?;
        let groups = tx.market_groups().await?;
        tx.commit().await?;
        groups
    };
    let seeded: Vec<_> = groups
        .into_iter()
        .map(|(zone, market)| (zone, market, StdRng::from_rng(&mut *rng)))
        .collect();

    let outcomes = try_join_all(seeded.into_iter().map(|(zone, market, group_rng)| {
        market_group(store, cache, config, zone, market, now, group_rng)
    }))
    .await?;

    let mut summary = JobSummary::new(SubJob::MarketCompetition);
    for changed in outcomes {
        summary.processed();
        for _ in 0..changed {
            summary.affected();
        }
    }
    Ok(summary.log())
}

/// Evaluate one group. Returns how many world-owned businesses acted.
async fn market_group<S: Store, C: ReportCache>(
    store: &S,
    cache: &C,
    config: &SyndicateConfig,
    zone: ZoneKey,
    category: MarketCategory,
    now: DateTime<Utc>,
    mut rng: StdRng,
) -> Result<usize, ServiceError> {
    let capacity = match config.catalogs.zone(&zone) {
        Some(definition) => config.market.capacity_for(definition.zone_type, category),
        None => {
            warn!(zone = %zone, "zone missing from catalog, treating capacity as zero");
            0
        }
    };

    let mut tx = store.begin().await?;
    let owned = tx.businesses_in_market(&zone, category).await?;
    let mut npcs = tx.npc_businesses_for_update(&zone, category).await?;
    let influence = tx.zone_influence(&zone).await?;

    let competitors: Vec<_> = owned
        .iter()
        .filter_map(market::business_competitor)
        .chain(npcs.iter().filter_map(market::npc_competitor))
        .collect();
    if competitors.is_empty() {
        return Ok(0);
    }

    let group = MarketGroup {
        zone: &zone,
        market: category,
        capacity,
        base_demand: config.market.base_demand_for(category),
        influence: &influence,
    };
    let report = market::evaluate_group(&group, &competitors, &config.market.rules, now)?;
    let revenues: BTreeMap<NpcBusinessId, f64> = npcs
        .iter()
        .filter_map(|npc| report.npc_revenue(npc.id).map(|revenue| (npc.id, revenue)))
        .collect();
    let decisions = market::run_weekly(&mut npcs, &revenues, &config.market.rules, now, &mut rng);

    for npc in npcs
        .iter()
        .filter(|npc| decisions.iter().any(|d| d.id == npc.id))
    {
        tx.save_npc_business(npc).await?;
    }
    tx.commit().await?;

    let mut changed = 0_usize;
    for decision in &decisions {
        match decision.action {
            NpcAction::Hold => {}
            NpcAction::Close => {
                changed = changed.saturating_add(1);
                info!(
                    zone = %zone,
                    market = category.as_str(),
                    npc_business_id = %decision.id,
                    ratio = decision.ratio,
                    "world business closed"
                );
            }
            _ => changed = changed.saturating_add(1),
        }
    }

    if let Err(err) = cache.put_market_report(&report).await {
        warn!(zone = %zone, market = category.as_str(), error = %err, "failed to cache market report");
    }
    info!(
        zone = %zone,
        market = category.as_str(),
        competitors = competitors.len(),
        saturation = ?report.saturation.level,
        acted = changed,
        "market evaluated"
    );
    Ok(changed)
}
