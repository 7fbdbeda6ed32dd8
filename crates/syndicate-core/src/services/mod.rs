//! Player-initiated operations.
//!
//! Each public method on [`Economy`] is one transaction: open, re-read the
//! caller's membership and role, lock the rows it will change, run the domain
//! rule, write, commit. Any error drops the transaction and nothing is kept.

mod businesses;
mod heists;
mod investments;
mod treasury;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rand::SeedableRng;
use rand::rngs::StdRng;
use syndicate_ledger::{Actor, ConservationResult, Ledger};
use syndicate_types::{CharacterId, LedgerAccount, Organization, OrganizationId};
use tokio::sync::Mutex;

use crate::config::SyndicateConfig;
use crate::error::ServiceError;
use crate::store::{Store, StoreTx};

/// Service facade over a [`Store`].
#[derive(Debug)]
pub struct Economy<S> {
    store: S,
    config: Arc<SyndicateConfig>,
    rng: Mutex<StdRng>,
}

impl<S: Store> Economy<S> {
    /// Services backed by `store`, drawing randomness from OS entropy.
    pub fn new(store: S, config: Arc<SyndicateConfig>) -> Self {
        Self::with_rng(store, config, StdRng::from_os_rng())
    }

    /// Services with an explicit random source.
    pub fn with_rng(store: S, config: Arc<SyndicateConfig>, rng: StdRng) -> Self {
        Self {
            store,
            config,
            rng: Mutex::new(rng),
        }
    }

    /// The underlying store.
    pub const fn store(&self) -> &S {
        &self.store
    }

    /// The active configuration.
    pub fn config(&self) -> &SyndicateConfig {
        &self.config
    }
}

/// Read the organization and the caller's current role inside `tx`.
pub(crate) async fn resolve_actor<T: StoreTx>(
    tx: &mut T,
    organization_id: OrganizationId,
    character: CharacterId,
) -> Result<(Organization, Actor), ServiceError> {
    let organization = tx
        .organization(organization_id)
        .await?
        .ok_or_else(|| ServiceError::not_found("organization", organization_id))?;
    let role = tx.member_role(organization_id, character).await?;
    let actor = Actor::resolve(character, role, &organization);
    Ok((organization, actor))
}

/// Lock the organization's account, opening an empty one on first use.
pub(crate) async fn open_ledger<T: StoreTx>(
    tx: &mut T,
    organization_id: OrganizationId,
    now: DateTime<Utc>,
) -> Result<Ledger, ServiceError> {
    let account = tx.ledger_for_update(organization_id, now).await?;
    Ok(Ledger::new(account, now))
}

/// Verify conservation, then write the account and its new journal entries.
pub(crate) async fn persist_ledger<T: StoreTx>(
    tx: &mut T,
    ledger: Ledger,
) -> Result<LedgerAccount, ServiceError> {
    if let ConservationResult::Anomaly(anomaly) = ledger.verify_conservation() {
        return Err(ServiceError::Conservation(Box::new(anomaly)));
    }
    let (account, journal) = ledger.into_parts();
    tx.save_ledger(&account).await?;
    if !journal.is_empty() {
        tx.append_journal(&journal).await?;
    }
    Ok(account)
}

#[cfg(test)]
pub(crate) mod fixtures {
    //! Shared setup for service and job tests.

    use std::sync::Arc;

    use chrono::Utc;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;
    use syndicate_types::{
        BusinessCategory, BusinessType, BusinessTypeKey, CharacterId, HeistTarget, HeistTargetKey,
        LedgerAccount, MarketCategory, Member, MemberRole, Organization, OrganizationId, RiskTier,
        ZoneDefinition, ZoneKey, ZoneType,
    };

    use super::Economy;
    use crate::config::SyndicateConfig;
    use crate::memory::MemoryStore;

    /// One organization with a leader, an officer, and a plain member.
    pub struct Gang {
        pub id: OrganizationId,
        pub leader: CharacterId,
        pub officer: CharacterId,
        pub member: CharacterId,
    }

    pub fn config() -> SyndicateConfig {
        let mut config = SyndicateConfig::default();
        config.catalogs.zones.push(ZoneDefinition {
            key: ZoneKey::new("docks"),
            name: "The Docks".to_owned(),
            zone_type: ZoneType::Waterfront,
        });
        config.catalogs.business_types.push(BusinessType {
            key: BusinessTypeKey::new("dockside_bar"),
            name: "Dockside Bar".to_owned(),
            category: BusinessCategory::Criminal,
            market: MarketCategory::Bar,
            startup_cost: dec!(20000),
            income_min: dec!(500),
            income_max: dec!(1500),
            operating_cost: dec!(200),
            risk_tier: RiskTier::VeryRisky,
            required_level: 2,
        });
        config.catalogs.heist_targets.push(HeistTarget {
            key: HeistTargetKey::new("jewelry_store"),
            name: "Jewelry Store".to_owned(),
            payout_min: dec!(10000),
            payout_max: dec!(30000),
            required_crew: 2,
            equipment_cost: dec!(2000),
            base_risk: 30,
            heat: 25,
            cooldown_days: 3,
            required_level: 1,
        });
        config
    }

    /// Seed a gang whose operating account holds `operating`.
    pub async fn seed_gang(store: &MemoryStore, operating: Decimal) -> Gang {
        let gang = Gang {
            id: OrganizationId::new(),
            leader: CharacterId::new(),
            officer: CharacterId::new(),
            member: CharacterId::new(),
        };
        let organization = Organization {
            id: gang.id,
            name: "Westside Kings".to_owned(),
            level: 3,
            leader_id: gang.leader,
        };
        let members = vec![
            Member {
                character_id: gang.leader,
                role: MemberRole::Leader,
            },
            Member {
                character_id: gang.officer,
                role: MemberRole::Officer,
            },
            Member {
                character_id: gang.member,
                role: MemberRole::Member,
            },
        ];
        let mut account = LedgerAccount::open(gang.id, Utc::now());
        account.balances.operating = operating;
        store
            .with_state(|state| {
                state.add_organization(organization, members);
                state.ledgers.insert(gang.id, account);
            })
            .await;
        gang
    }

    pub fn economy(store: &MemoryStore) -> Economy<MemoryStore> {
        Economy::with_rng(store.clone(), Arc::new(config()), StdRng::seed_from_u64(7))
    }
}
