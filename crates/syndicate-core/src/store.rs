//! The storage seam.
//!
//! Services and jobs never talk to a database directly. They open a
//! [`StoreTx`] through [`Store::begin`], read the rows they are about to
//! change (row-locked by backends that support it), run pure domain logic,
//! write the results back, and [`StoreTx::commit`]. Dropping a transaction
//! without committing rolls it back.
//!
//! Every list-returning method yields records ordered by identifier so batch
//! jobs process (and lock) rows in a stable order.
//!
//! Cross-instance coordination lives behind [`LeaseLock`], and the hot market
//! report cache behind [`ReportCache`].

use std::time::Duration;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use syndicate_economy::MarketReport;
use syndicate_types::{
    Business, BusinessId, CharacterId, ErrorKind, Heist, HeistId, HeistTargetKey, Investment,
    JournalEntry, LedgerAccount, MarketCategory, Member, MemberRole, NpcBusiness, Organization,
    OrganizationId, ZoneInfluence, ZoneKey,
};
use uuid::Uuid;

/// Errors raised by storage, lock, and cache backends.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A row the caller expected to exist is missing.
    #[error("{entity} not found: {id}")]
    NotFound {
        /// Kind of record.
        entity: &'static str,
        /// Its identifier.
        id: String,
    },

    /// A character's personal balance cannot cover a debit.
    #[error("character {character} has insufficient funds: requested {requested}, available {available}")]
    InsufficientCharacterFunds {
        /// The character being debited.
        character: CharacterId,
        /// Amount requested.
        requested: Decimal,
        /// Current personal balance.
        available: Decimal,
    },

    /// A stored value could not be decoded into its domain type.
    #[error("corrupt {entity} row: {message}")]
    Corrupt {
        /// Kind of record.
        entity: &'static str,
        /// What was wrong with it.
        message: String,
    },

    /// The database or connection pool failed.
    #[error("storage backend error: {0}")]
    Backend(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// The lock or cache backend failed.
    #[error("coordination backend error: {0}")]
    Coordination(String),
}

impl StoreError {
    /// The error class callers dispatch on.
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::InsufficientCharacterFunds { .. } => ErrorKind::InsufficientFunds,
            Self::Corrupt { .. } | Self::Backend(_) | Self::Coordination(_) => ErrorKind::Storage,
        }
    }
}

/// A transactional store.
pub trait Store: Send + Sync {
    /// The transaction type handed out by [`Store::begin`].
    type Tx: StoreTx;

    /// Open a transaction.
    fn begin(&self) -> impl Future<Output = Result<Self::Tx, StoreError>> + Send;
}

/// One open transaction. Reads that precede a write lock the rows they
/// return until commit or rollback.
pub trait StoreTx: Send {
    // -- Membership (external, read-only) ------------------------------------

    /// Read an organization.
    fn organization(
        &mut self,
        id: OrganizationId,
    ) -> impl Future<Output = Result<Option<Organization>, StoreError>> + Send;

    /// Current role of a character in an organization, `None` if not a member.
    fn member_role(
        &mut self,
        organization: OrganizationId,
        character: CharacterId,
    ) -> impl Future<Output = Result<Option<MemberRole>, StoreError>> + Send;

    /// Current members of an organization.
    fn members(
        &mut self,
        organization: OrganizationId,
    ) -> impl Future<Output = Result<Vec<Member>, StoreError>> + Send;

    // -- Ledger ---------------------------------------------------------------

    /// Lock and read one organization's ledger account.
    ///
    /// An organization without an account gets an empty one (opened at
    /// `now`), created and locked before it is read, so two first operations
    /// on the same organization serialize on the same row.
    fn ledger_for_update(
        &mut self,
        organization: OrganizationId,
        now: DateTime<Utc>,
    ) -> impl Future<Output = Result<LedgerAccount, StoreError>> + Send;

    /// Lock and read every ledger account.
    fn ledgers_for_update(
        &mut self,
    ) -> impl Future<Output = Result<Vec<LedgerAccount>, StoreError>> + Send;

    /// Lock and read the ledger accounts whose payday has arrived.
    fn payroll_due_for_update(
        &mut self,
        now: DateTime<Utc>,
    ) -> impl Future<Output = Result<Vec<LedgerAccount>, StoreError>> + Send;

    /// Insert or replace a ledger account.
    fn save_ledger(
        &mut self,
        account: &LedgerAccount,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Append journal entries.
    fn append_journal(
        &mut self,
        entries: &[JournalEntry],
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    // -- Character balances (external) ---------------------------------------

    /// Credit a character's personal balance. Returns the new balance.
    fn credit_character(
        &mut self,
        character: CharacterId,
        amount: Decimal,
        reason: &str,
        context: &serde_json::Value,
    ) -> impl Future<Output = Result<Decimal, StoreError>> + Send;

    /// Debit a character's personal balance. Fails with
    /// [`StoreError::InsufficientCharacterFunds`] rather than going negative.
    fn debit_character(
        &mut self,
        character: CharacterId,
        amount: Decimal,
        reason: &str,
        context: &serde_json::Value,
    ) -> impl Future<Output = Result<Decimal, StoreError>> + Send;

    // -- Businesses -----------------------------------------------------------

    /// Insert a newly purchased business.
    fn insert_business(
        &mut self,
        business: &Business,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Lock and read one business.
    fn business_for_update(
        &mut self,
        id: BusinessId,
    ) -> impl Future<Output = Result<Option<Business>, StoreError>> + Send;

    /// Write back a business.
    fn save_business(
        &mut self,
        business: &Business,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Lock and read active businesses not yet paid for the UTC day of `now`.
    fn businesses_due_income(
        &mut self,
        now: DateTime<Utc>,
    ) -> impl Future<Output = Result<Vec<Business>, StoreError>> + Send;

    /// Lock and read active criminal businesses whose raid check is due.
    fn businesses_due_raid(
        &mut self,
        now: DateTime<Utc>,
    ) -> impl Future<Output = Result<Vec<Business>, StoreError>> + Send;

    /// Lock and read raided businesses whose closure has elapsed.
    fn businesses_due_reopen(
        &mut self,
        now: DateTime<Utc>,
    ) -> impl Future<Output = Result<Vec<Business>, StoreError>> + Send;

    /// Read the non-closed organization businesses of one market group.
    fn businesses_in_market(
        &mut self,
        zone: &ZoneKey,
        market: MarketCategory,
    ) -> impl Future<Output = Result<Vec<Business>, StoreError>> + Send;

    // -- Market ---------------------------------------------------------------

    /// Every (zone, category) with at least one non-closed competitor.
    fn market_groups(
        &mut self,
    ) -> impl Future<Output = Result<Vec<(ZoneKey, MarketCategory)>, StoreError>> + Send;

    /// Lock and read the world-owned businesses of one market group.
    fn npc_businesses_for_update(
        &mut self,
        zone: &ZoneKey,
        market: MarketCategory,
    ) -> impl Future<Output = Result<Vec<NpcBusiness>, StoreError>> + Send;

    /// Write back a world-owned business.
    fn save_npc_business(
        &mut self,
        npc: &NpcBusiness,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Influence organizations hold over a zone.
    fn zone_influence(
        &mut self,
        zone: &ZoneKey,
    ) -> impl Future<Output = Result<Vec<ZoneInfluence>, StoreError>> + Send;

    // -- Heists ---------------------------------------------------------------

    /// Insert a newly planned heist.
    fn insert_heist(&mut self, heist: &Heist)
    -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Lock and read one heist.
    fn heist_for_update(
        &mut self,
        id: HeistId,
    ) -> impl Future<Output = Result<Option<Heist>, StoreError>> + Send;

    /// Write back a heist.
    fn save_heist(&mut self, heist: &Heist) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Lock and read an organization's planning, ready, and in-progress heists.
    fn active_heists_for_update(
        &mut self,
        organization: OrganizationId,
    ) -> impl Future<Output = Result<Vec<Heist>, StoreError>> + Send;

    /// When the organization last completed a heist on `target`.
    fn last_completed_heist(
        &mut self,
        organization: OrganizationId,
        target: &HeistTargetKey,
    ) -> impl Future<Output = Result<Option<DateTime<Utc>>, StoreError>> + Send;

    // -- Investments ----------------------------------------------------------

    /// Insert a newly placed investment.
    fn insert_investment(
        &mut self,
        investment: &Investment,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Lock and read active investments that have reached maturity.
    fn investments_due_for_update(
        &mut self,
        now: DateTime<Utc>,
    ) -> impl Future<Output = Result<Vec<Investment>, StoreError>> + Send;

    /// Write back an investment.
    fn save_investment(
        &mut self,
        investment: &Investment,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    // -------------------------------------------------------------------------

    /// Make every write of this transaction durable.
    fn commit(self) -> impl Future<Output = Result<(), StoreError>> + Send;
}

/// Proof of holding a lease. Only the holder's token can release it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeaseToken(String);

impl LeaseToken {
    /// A fresh random token.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Borrow the token value.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Bounded-expiry mutual exclusion across server instances.
pub trait LeaseLock: Send + Sync {
    /// Take the lease on `key` for `lease`, or `None` if someone else holds it.
    fn try_acquire(
        &self,
        key: &str,
        lease: Duration,
    ) -> impl Future<Output = Result<Option<LeaseToken>, StoreError>> + Send;

    /// Release the lease if `token` still holds it. Returns whether it did; an
    /// expired or stolen lease is left alone.
    fn release(
        &self,
        key: &str,
        token: &LeaseToken,
    ) -> impl Future<Output = Result<bool, StoreError>> + Send;
}

/// Hot-state cache of the last market report per group.
pub trait ReportCache: Send + Sync {
    /// Replace the cached report for the report's group.
    fn put_market_report(
        &self,
        report: &MarketReport,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// The last cached report for a group.
    fn market_report(
        &self,
        zone: &ZoneKey,
        market: MarketCategory,
    ) -> impl Future<Output = Result<Option<MarketReport>, StoreError>> + Send;
}

/// Lease key of a scheduler entry.
pub fn job_lock_key(name: &str) -> String {
    format!("lock:job:{name}")
}

/// Cache key of a market group's last report.
pub fn market_report_key(zone: &ZoneKey, market: MarketCategory) -> String {
    format!("market:report:{zone}:{}", market.as_str())
}
