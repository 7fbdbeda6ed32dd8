//! In-memory backends for tests and single-instance runs.
//!
//! [`MemoryStore`] serializes transactions: `begin` takes an owned lock on
//! the whole state and works on a copy, `commit` swaps the copy in. Dropping
//! a [`MemoryTx`] discards the copy, which is exactly a rollback.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use syndicate_economy::{MarketReport, business, investment};
use syndicate_types::{
    Business, BusinessId, BusinessStatus, CharacterId, Heist, HeistId, HeistStatus,
    HeistTargetKey, Investment, InvestmentId, JournalEntry, LedgerAccount, MarketCategory, Member,
    MemberRole, NpcBusiness, NpcBusinessId, NpcStatus, Organization, OrganizationId,
    ZoneInfluence, ZoneKey,
};
use tokio::sync::{Mutex, OwnedMutexGuard};
use tokio::time::Instant;

use crate::store::{LeaseLock, LeaseToken, ReportCache, Store, StoreError, StoreTx, market_report_key};

/// Everything the in-memory store holds.
#[derive(Debug, Clone, Default)]
pub struct MemoryState {
    /// Organizations by id.
    pub organizations: BTreeMap<OrganizationId, Organization>,
    /// Current members per organization.
    pub members: BTreeMap<OrganizationId, Vec<Member>>,
    /// Personal character balances.
    pub characters: BTreeMap<CharacterId, Decimal>,
    /// Ledger accounts by organization.
    pub ledgers: BTreeMap<OrganizationId, LedgerAccount>,
    /// Append-only journal.
    pub journal: Vec<JournalEntry>,
    /// Organization-owned businesses.
    pub businesses: BTreeMap<BusinessId, Business>,
    /// World-owned businesses.
    pub npcs: BTreeMap<NpcBusinessId, NpcBusiness>,
    /// Heists.
    pub heists: BTreeMap<HeistId, Heist>,
    /// Investments.
    pub investments: BTreeMap<InvestmentId, Investment>,
    /// Influence per zone.
    pub influence: BTreeMap<ZoneKey, Vec<ZoneInfluence>>,
}

impl MemoryState {
    /// Register an organization with its members.
    pub fn add_organization(&mut self, organization: Organization, members: Vec<Member>) {
        self.members.insert(organization.id, members);
        self.organizations.insert(organization.id, organization);
    }

    /// Change (or add) a member's role.
    pub fn set_role(&mut self, organization: OrganizationId, character: CharacterId, role: MemberRole) {
        let members = self.members.entry(organization).or_default();
        match members.iter_mut().find(|m| m.character_id == character) {
            Some(member) => member.role = role,
            None => members.push(Member {
                character_id: character,
                role,
            }),
        }
    }

    /// Remove a member from an organization.
    pub fn remove_member(&mut self, organization: OrganizationId, character: CharacterId) {
        if let Some(members) = self.members.get_mut(&organization) {
            members.retain(|m| m.character_id != character);
        }
    }

    /// A character's personal balance (zero if never seen).
    pub fn character_balance(&self, character: CharacterId) -> Decimal {
        self.characters.get(&character).copied().unwrap_or_default()
    }

    /// Journal entries of one organization, oldest first.
    pub fn journal_for(&self, organization: OrganizationId) -> Vec<&JournalEntry> {
        self.journal
            .iter()
            .filter(|entry| entry.organization_id == organization)
            .collect()
    }
}

/// Transactional in-memory store.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryStore {
    /// An empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `f` against the committed state, outside any transaction.
    pub async fn with_state<R>(&self, f: impl FnOnce(&mut MemoryState) -> R) -> R {
        let mut state = self.state.lock().await;
        f(&mut state)
    }

    /// A copy of the committed state.
    pub async fn snapshot(&self) -> MemoryState {
        self.state.lock().await.clone()
    }
}

impl Store for MemoryStore {
    type Tx = MemoryTx;

    async fn begin(&self) -> Result<MemoryTx, StoreError> {
        let guard = Arc::clone(&self.state).lock_owned().await;
        let working = guard.clone();
        Ok(MemoryTx { guard, working })
    }
}

/// An open in-memory transaction.
#[derive(Debug)]
pub struct MemoryTx {
    guard: OwnedMutexGuard<MemoryState>,
    working: MemoryState,
}

fn sorted_filter<K, V: Clone>(
    map: &BTreeMap<K, V>,
    mut keep: impl FnMut(&V) -> bool,
) -> Vec<V> {
    map.values().filter(|v| keep(v)).cloned().collect()
}

impl StoreTx for MemoryTx {
    async fn organization(&mut self, id: OrganizationId) -> Result<Option<Organization>, StoreError> {
        Ok(self.working.organizations.get(&id).cloned())
    }

    async fn member_role(
        &mut self,
        organization: OrganizationId,
        character: CharacterId,
    ) -> Result<Option<MemberRole>, StoreError> {
        Ok(self
            .working
            .members
            .get(&organization)
            .and_then(|members| members.iter().find(|m| m.character_id == character))
            .map(|m| m.role))
    }

    async fn members(&mut self, organization: OrganizationId) -> Result<Vec<Member>, StoreError> {
        let mut members = self.working.members.get(&organization).cloned().unwrap_or_default();
        members.sort_by_key(|m| m.character_id);
        Ok(members)
    }

    async fn ledger_for_update(
        &mut self,
        organization: OrganizationId,
        now: DateTime<Utc>,
    ) -> Result<LedgerAccount, StoreError> {
        Ok(self
            .working
            .ledgers
            .entry(organization)
            .or_insert_with(|| LedgerAccount::open(organization, now))
            .clone())
    }

    async fn ledgers_for_update(&mut self) -> Result<Vec<LedgerAccount>, StoreError> {
        Ok(sorted_filter(&self.working.ledgers, |_| true))
    }

    async fn payroll_due_for_update(
        &mut self,
        now: DateTime<Utc>,
    ) -> Result<Vec<LedgerAccount>, StoreError> {
        Ok(sorted_filter(&self.working.ledgers, |account| {
            account.payroll.next_payday <= now
        }))
    }

    async fn save_ledger(&mut self, account: &LedgerAccount) -> Result<(), StoreError> {
        self.working
            .ledgers
            .insert(account.organization_id, account.clone());
        Ok(())
    }

    async fn append_journal(&mut self, entries: &[JournalEntry]) -> Result<(), StoreError> {
        self.working.journal.extend_from_slice(entries);
        Ok(())
    }

    async fn credit_character(
        &mut self,
        character: CharacterId,
        amount: Decimal,
        _reason: &str,
        _context: &serde_json::Value,
    ) -> Result<Decimal, StoreError> {
        let balance = self.working.characters.entry(character).or_default();
        *balance = balance.checked_add(amount).ok_or_else(|| StoreError::Corrupt {
            entity: "character balance",
            message: format!("overflow crediting {character}"),
        })?;
        Ok(*balance)
    }

    async fn debit_character(
        &mut self,
        character: CharacterId,
        amount: Decimal,
        _reason: &str,
        _context: &serde_json::Value,
    ) -> Result<Decimal, StoreError> {
        let available = self.working.character_balance(character);
        let remaining = available
            .checked_sub(amount)
            .filter(|remaining| *remaining >= Decimal::ZERO)
            .ok_or(StoreError::InsufficientCharacterFunds {
                character,
                requested: amount,
                available,
            })?;
        self.working.characters.insert(character, remaining);
        Ok(remaining)
    }

    async fn insert_business(&mut self, business: &Business) -> Result<(), StoreError> {
        self.working.businesses.insert(business.id, business.clone());
        Ok(())
    }

    async fn business_for_update(&mut self, id: BusinessId) -> Result<Option<Business>, StoreError> {
        Ok(self.working.businesses.get(&id).cloned())
    }

    async fn save_business(&mut self, business: &Business) -> Result<(), StoreError> {
        self.working.businesses.insert(business.id, business.clone());
        Ok(())
    }

    async fn businesses_due_income(&mut self, now: DateTime<Utc>) -> Result<Vec<Business>, StoreError> {
        Ok(sorted_filter(&self.working.businesses, |b| {
            business::income_due(b, now)
        }))
    }

    async fn businesses_due_raid(&mut self, now: DateTime<Utc>) -> Result<Vec<Business>, StoreError> {
        Ok(sorted_filter(&self.working.businesses, |b| {
            business::raid_due(b, now)
        }))
    }

    async fn businesses_due_reopen(&mut self, now: DateTime<Utc>) -> Result<Vec<Business>, StoreError> {
        Ok(sorted_filter(&self.working.businesses, |b| {
            b.status == BusinessStatus::Raided && b.closed_until.is_some_and(|until| until <= now)
        }))
    }

    async fn businesses_in_market(
        &mut self,
        zone: &ZoneKey,
        market: MarketCategory,
    ) -> Result<Vec<Business>, StoreError> {
        Ok(sorted_filter(&self.working.businesses, |b| {
            &b.zone == zone && b.market == market && b.status != BusinessStatus::Closed
        }))
    }

    async fn market_groups(&mut self) -> Result<Vec<(ZoneKey, MarketCategory)>, StoreError> {
        let owned = self
            .working
            .businesses
            .values()
            .filter(|b| b.status != BusinessStatus::Closed)
            .map(|b| (b.zone.clone(), b.market));
        let world = self
            .working
            .npcs
            .values()
            .filter(|n| n.status != NpcStatus::Closed)
            .map(|n| (n.zone.clone(), n.market));
        let groups: BTreeSet<_> = owned.chain(world).collect();
        Ok(groups.into_iter().collect())
    }

    async fn npc_businesses_for_update(
        &mut self,
        zone: &ZoneKey,
        market: MarketCategory,
    ) -> Result<Vec<NpcBusiness>, StoreError> {
        Ok(sorted_filter(&self.working.npcs, |n| {
            &n.zone == zone && n.market == market
        }))
    }

    async fn save_npc_business(&mut self, npc: &NpcBusiness) -> Result<(), StoreError> {
        self.working.npcs.insert(npc.id, npc.clone());
        Ok(())
    }

    async fn zone_influence(&mut self, zone: &ZoneKey) -> Result<Vec<ZoneInfluence>, StoreError> {
        Ok(self.working.influence.get(zone).cloned().unwrap_or_default())
    }

    async fn insert_heist(&mut self, heist: &Heist) -> Result<(), StoreError> {
        self.working.heists.insert(heist.id, heist.clone());
        Ok(())
    }

    async fn heist_for_update(&mut self, id: HeistId) -> Result<Option<Heist>, StoreError> {
        Ok(self.working.heists.get(&id).cloned())
    }

    async fn save_heist(&mut self, heist: &Heist) -> Result<(), StoreError> {
        self.working.heists.insert(heist.id, heist.clone());
        Ok(())
    }

    async fn active_heists_for_update(
        &mut self,
        organization: OrganizationId,
    ) -> Result<Vec<Heist>, StoreError> {
        Ok(sorted_filter(&self.working.heists, |h| {
            h.organization_id == organization && h.status.is_active()
        }))
    }

    async fn last_completed_heist(
        &mut self,
        organization: OrganizationId,
        target: &HeistTargetKey,
    ) -> Result<Option<DateTime<Utc>>, StoreError> {
        Ok(self
            .working
            .heists
            .values()
            .filter(|h| {
                h.organization_id == organization
                    && &h.target == target
                    && h.status == HeistStatus::Completed
            })
            .filter_map(|h| h.finished_at)
            .max())
    }

    async fn insert_investment(&mut self, investment: &Investment) -> Result<(), StoreError> {
        self.working
            .investments
            .insert(investment.id, investment.clone());
        Ok(())
    }

    async fn investments_due_for_update(
        &mut self,
        now: DateTime<Utc>,
    ) -> Result<Vec<Investment>, StoreError> {
        Ok(sorted_filter(&self.working.investments, |i| {
            investment::is_due(i, now)
        }))
    }

    async fn save_investment(&mut self, investment: &Investment) -> Result<(), StoreError> {
        self.working
            .investments
            .insert(investment.id, investment.clone());
        Ok(())
    }

    async fn commit(self) -> Result<(), StoreError> {
        let Self { mut guard, working } = self;
        *guard = working;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Leases and cache
// ---------------------------------------------------------------------------

#[derive(Debug)]
struct Lease {
    token: LeaseToken,
    expires_at: Instant,
}

/// Process-local lease lock with real expiry.
#[derive(Debug, Clone, Default)]
pub struct MemoryLeaseLock {
    leases: Arc<Mutex<BTreeMap<String, Lease>>>,
}

impl MemoryLeaseLock {
    /// An empty lock table.
    pub fn new() -> Self {
        Self::default()
    }
}

impl LeaseLock for MemoryLeaseLock {
    async fn try_acquire(&self, key: &str, lease: Duration) -> Result<Option<LeaseToken>, StoreError> {
        let now = Instant::now();
        let mut leases = self.leases.lock().await;
        if leases.get(key).is_some_and(|held| held.expires_at > now) {
            return Ok(None);
        }
        let token = LeaseToken::generate();
        leases.insert(
            key.to_owned(),
            Lease {
                token: token.clone(),
                expires_at: now.checked_add(lease).unwrap_or(now),
            },
        );
        Ok(Some(token))
    }

    async fn release(&self, key: &str, token: &LeaseToken) -> Result<bool, StoreError> {
        let mut leases = self.leases.lock().await;
        let held = leases
            .get(key)
            .is_some_and(|lease| &lease.token == token && lease.expires_at > Instant::now());
        if held {
            leases.remove(key);
        }
        Ok(held)
    }
}

/// Process-local market report cache.
#[derive(Debug, Clone, Default)]
pub struct MemoryReportCache {
    reports: Arc<Mutex<BTreeMap<String, MarketReport>>>,
}

impl MemoryReportCache {
    /// An empty cache.
    pub fn new() -> Self {
        Self::default()
    }
}

impl ReportCache for MemoryReportCache {
    async fn put_market_report(&self, report: &MarketReport) -> Result<(), StoreError> {
        self.reports
            .lock()
            .await
            .insert(market_report_key(&report.zone, report.market), report.clone());
        Ok(())
    }

    async fn market_report(
        &self,
        zone: &ZoneKey,
        market: MarketCategory,
    ) -> Result<Option<MarketReport>, StoreError> {
        Ok(self
            .reports
            .lock()
            .await
            .get(&market_report_key(zone, market))
            .cloned())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use rust_decimal_macros::dec;

    use super::*;

    #[tokio::test]
    async fn dropped_transaction_rolls_back() {
        let store = MemoryStore::new();
        let org = OrganizationId::new();
        {
            let tx = store.begin().await;
            let Ok(mut tx) = tx else {
                unreachable!("memory begin is infallible");
            };
            let saved = tx.save_ledger(&LedgerAccount::open(org, Utc::now())).await;
            assert!(saved.is_ok());
        }
        assert!(store.snapshot().await.ledgers.is_empty());

        let Ok(mut tx) = store.begin().await else {
            unreachable!("memory begin is infallible");
        };
        assert!(tx.save_ledger(&LedgerAccount::open(org, Utc::now())).await.is_ok());
        assert!(tx.commit().await.is_ok());
        assert!(store.snapshot().await.ledgers.contains_key(&org));
    }

    #[tokio::test]
    async fn character_debit_never_goes_negative() {
        let store = MemoryStore::new();
        let character = CharacterId::new();
        store
            .with_state(|state| state.characters.insert(character, dec!(30)))
            .await;
        let Ok(mut tx) = store.begin().await else {
            unreachable!("memory begin is infallible");
        };
        let context = serde_json::Value::Null;
        let result = tx.debit_character(character, dec!(50), "test", &context).await;
        assert!(matches!(
            result,
            Err(StoreError::InsufficientCharacterFunds { .. })
        ));
        let result = tx.debit_character(character, dec!(30), "test", &context).await;
        assert_eq!(result.ok(), Some(Decimal::ZERO));
    }

    #[tokio::test]
    async fn lease_is_exclusive_until_released() {
        let locks = MemoryLeaseLock::new();
        let first = locks.try_acquire("lock:job:daily", Duration::from_secs(60)).await;
        let Ok(Some(token)) = first else {
            unreachable!("free lease must be granted");
        };
        let second = locks.try_acquire("lock:job:daily", Duration::from_secs(60)).await;
        assert!(matches!(second, Ok(None)));

        let stranger = LeaseToken::generate();
        assert!(matches!(locks.release("lock:job:daily", &stranger).await, Ok(false)));
        assert!(matches!(locks.release("lock:job:daily", &token).await, Ok(true)));

        let third = locks.try_acquire("lock:job:daily", Duration::from_secs(60)).await;
        assert!(matches!(third, Ok(Some(_))));
    }

    #[tokio::test]
    async fn expired_lease_can_be_taken_over() {
        let locks = MemoryLeaseLock::new();
        let first = locks.try_acquire("lock:job:weekly", Duration::from_millis(20)).await;
        let Ok(Some(stale)) = first else {
            unreachable!("free lease must be granted");
        };
        tokio::time::sleep(Duration::from_millis(60)).await;

        let second = locks.try_acquire("lock:job:weekly", Duration::from_secs(60)).await;
        let Ok(Some(fresh)) = second else {
            unreachable!("expired lease must be re-granted");
        };
        // The old holder cannot release the new holder's lease.
        assert!(matches!(locks.release("lock:job:weekly", &stale).await, Ok(false)));
        assert!(matches!(locks.release("lock:job:weekly", &fresh).await, Ok(true)));
    }
}
