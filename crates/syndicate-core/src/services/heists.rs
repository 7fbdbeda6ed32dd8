//! Heist planning, staffing, preparation, and execution.

use chrono::Utc;
use rust_decimal::Decimal;
use syndicate_economy::heist::{self, HeistResolution, PlanningContext};
use syndicate_ledger::{authorize_member, authorize_officer};
use syndicate_types::{
    AccountKind, CharacterId, CrewAssignment, Heist, HeistId, HeistTargetKey, JournalEntryType,
    OrganizationId,
};
use tracing::{info, warn};

use super::{Economy, open_ledger, persist_ledger, resolve_actor};
use crate::error::ServiceError;
use crate::store::{Store, StoreTx};

/// Lock a heist and check it belongs to the organization.
async fn owned_heist<T: StoreTx>(
    tx: &mut T,
    organization_id: OrganizationId,
    heist_id: HeistId,
) -> Result<Heist, ServiceError> {
    tx.heist_for_update(heist_id)
        .await?
        .filter(|heist| heist.organization_id == organization_id)
        .ok_or_else(|| ServiceError::not_found("heist", heist_id))
}

impl<S: Store> Economy<S> {
    /// Start planning a heist. Equipment is paid from operating up front.
    pub async fn plan_heist(
        &self,
        organization_id: OrganizationId,
        character: CharacterId,
        target: &HeistTargetKey,
    ) -> Result<Heist, ServiceError> {
        let now = Utc::now();
        let entry = self
            .config
            .catalogs
            .heist_target(target)
            .ok_or_else(|| ServiceError::not_found("heist target", target))?;

        let mut tx = self.store.begin().await?;
        let (organization, actor) = resolve_actor(&mut tx, organization_id, character).await?;
        authorize_officer(&actor, "plan a heist")?;

        let active = tx.active_heists_for_update(organization_id).await?;
        let last_completed = tx.last_completed_heist(organization_id, target).await?;
        let context = PlanningContext {
            organization: &organization,
            target: entry,
            active_heists: &active,
            last_completed,
            now,
        };
        let planned = heist::plan(&context, &self.config.heists)?;

        let mut ledger = open_ledger(&mut tx, organization_id, now).await?;
        if planned.equipment_cost > Decimal::ZERO {
            ledger.debit(
                AccountKind::Operating,
                planned.equipment_cost,
                JournalEntryType::HeistEquipment,
                Some(planned.id.into_inner()),
            )?;
        }
        tx.insert_heist(&planned).await?;
        persist_ledger(&mut tx, ledger).await?;
        tx.commit().await?;

        info!(
            organization_id = %organization_id,
            heist_id = %planned.id,
            target = %planned.target,
            heat = planned.heat_level,
            equipment = %planned.equipment_cost,
            "heist planned"
        );
        Ok(planned)
    }

    /// Put a member on the crew.
    pub async fn assign_heist_role(
        &self,
        organization_id: OrganizationId,
        character: CharacterId,
        heist_id: HeistId,
        assignment: CrewAssignment,
    ) -> Result<Heist, ServiceError> {
        let mut tx = self.store.begin().await?;
        let (_, actor) = resolve_actor(&mut tx, organization_id, character).await?;
        authorize_officer(&actor, "staff a heist")?;

        let mut staffed = owned_heist(&mut tx, organization_id, heist_id).await?;
        let members = tx.members(organization_id).await?;
        heist::assign_role(&mut staffed, assignment, &members)?;
        tx.save_heist(&staffed).await?;
        tx.commit().await?;

        info!(
            heist_id = %heist_id,
            member = %assignment.member,
            role = ?assignment.role,
            status = ?staffed.status,
            "crew assigned"
        );
        Ok(staffed)
    }

    /// Take a member off the crew.
    pub async fn remove_heist_member(
        &self,
        organization_id: OrganizationId,
        character: CharacterId,
        heist_id: HeistId,
        member: CharacterId,
    ) -> Result<Heist, ServiceError> {
        let mut tx = self.store.begin().await?;
        let (_, actor) = resolve_actor(&mut tx, organization_id, character).await?;
        authorize_officer(&actor, "staff a heist")?;

        let mut staffed = owned_heist(&mut tx, organization_id, heist_id).await?;
        heist::remove_member(&mut staffed, member)?;
        tx.save_heist(&staffed).await?;
        tx.commit().await?;

        info!(heist_id = %heist_id, member = %member, "crew member removed");
        Ok(staffed)
    }

    /// Record preparation work. Any member may contribute.
    pub async fn add_heist_progress(
        &self,
        organization_id: OrganizationId,
        character: CharacterId,
        heist_id: HeistId,
        increment: u32,
    ) -> Result<Heist, ServiceError> {
        let mut tx = self.store.begin().await?;
        let (_, actor) = resolve_actor(&mut tx, organization_id, character).await?;
        authorize_member(&actor, "prepare a heist")?;

        let mut prepared = owned_heist(&mut tx, organization_id, heist_id).await?;
        let progress = heist::add_progress(&mut prepared, increment)?;
        tx.save_heist(&prepared).await?;
        tx.commit().await?;

        info!(heist_id = %heist_id, progress, status = ?prepared.status, "heist progress");
        Ok(prepared)
    }

    /// Abandon a heist that has not started.
    pub async fn cancel_heist(
        &self,
        organization_id: OrganizationId,
        character: CharacterId,
        heist_id: HeistId,
    ) -> Result<Heist, ServiceError> {
        let now = Utc::now();
        let mut tx = self.store.begin().await?;
        let (_, actor) = resolve_actor(&mut tx, organization_id, character).await?;
        authorize_officer(&actor, "cancel a heist")?;

        let mut cancelled = owned_heist(&mut tx, organization_id, heist_id).await?;
        heist::cancel(&mut cancelled, now)?;
        tx.save_heist(&cancelled).await?;
        tx.commit().await?;

        info!(heist_id = %heist_id, "heist cancelled");
        Ok(cancelled)
    }

    /// Run a ready heist. Outcome, crew disposition, and payout are written
    /// together.
    pub async fn execute_heist(
        &self,
        organization_id: OrganizationId,
        character: CharacterId,
        heist_id: HeistId,
    ) -> Result<HeistResolution, ServiceError> {
        let now = Utc::now();
        let mut tx = self.store.begin().await?;
        let (_, actor) = resolve_actor(&mut tx, organization_id, character).await?;
        authorize_officer(&actor, "execute a heist")?;

        let mut executed = owned_heist(&mut tx, organization_id, heist_id).await?;
        let resolution = {
            let mut rng = self.rng.lock().await;
            heist::execute(&mut executed, &self.config.heists, now, &mut *rng)?
        };

        let mut ledger = open_ledger(&mut tx, organization_id, now).await?;
        if resolution.payout > Decimal::ZERO {
            ledger.credit(
                AccountKind::Operating,
                resolution.payout,
                JournalEntryType::HeistPayout,
                Some(heist_id.into_inner()),
            )?;
        }
        tx.save_heist(&executed).await?;
        persist_ledger(&mut tx, ledger).await?;
        tx.commit().await?;

        info!(
            heist_id = %heist_id,
            outcome = ?resolution.outcome,
            payout = %resolution.payout,
            chance = resolution.chance,
            roll = resolution.roll,
            arrested = resolution.arrested.len(),
            "heist executed"
        );
        if !resolution.casualties.is_empty() {
            warn!(
                heist_id = %heist_id,
                casualties = resolution.casualties.len(),
                "heist crew lost"
            );
        }
        Ok(resolution)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;
    use rust_decimal_macros::dec;
    use syndicate_types::{ErrorKind, HeistRole, HeistStatus};

    use super::*;
    use crate::memory::MemoryStore;
    use crate::services::fixtures::{Gang, economy, seed_gang};

    fn jewelry() -> HeistTargetKey {
        HeistTargetKey::new("jewelry_store")
    }

    fn crew(member: CharacterId, role: HeistRole) -> CrewAssignment {
        CrewAssignment {
            member,
            role,
            skill: 80,
        }
    }

    async fn ready_heist(economy: &Economy<MemoryStore>, gang: &Gang) -> Heist {
        let Ok(planned) = economy.plan_heist(gang.id, gang.officer, &jewelry()).await else {
            unreachable!("planning must succeed");
        };
        for (member, role) in [(gang.member, HeistRole::Driver), (gang.officer, HeistRole::Hacker)] {
            let staffed = economy
                .assign_heist_role(gang.id, gang.officer, planned.id, crew(member, role))
                .await;
            assert!(staffed.is_ok());
        }
        let Ok(ready) = economy
            .add_heist_progress(gang.id, gang.member, planned.id, 100)
            .await
        else {
            unreachable!("progress must succeed");
        };
        ready
    }

    #[tokio::test]
    async fn cancelled_heist_keeps_equipment_cost() {
        let store = MemoryStore::new();
        let gang = seed_gang(&store, dec!(5000)).await;
        let economy = economy(&store);

        let Ok(planned) = economy.plan_heist(gang.id, gang.officer, &jewelry()).await else {
            unreachable!("planning must succeed");
        };
        assert_eq!(planned.status, HeistStatus::Planning);
        assert_eq!(planned.heat_level, 25);

        let cancelled = economy.cancel_heist(gang.id, gang.officer, planned.id).await;
        assert_eq!(cancelled.ok().map(|h| h.status), Some(HeistStatus::Cancelled));

        let state = store.snapshot().await;
        assert_eq!(
            state.ledgers.get(&gang.id).map(|a| a.balances.operating),
            Some(dec!(3000))
        );

        let again = economy.cancel_heist(gang.id, gang.officer, planned.id).await;
        assert_eq!(again.err().map(|e| e.kind()), Some(ErrorKind::InvalidStateTransition));
    }

    #[tokio::test]
    async fn planning_without_equipment_funds_creates_nothing() {
        let store = MemoryStore::new();
        let gang = seed_gang(&store, dec!(1999)).await;
        let economy = economy(&store);

        let result = economy.plan_heist(gang.id, gang.officer, &jewelry()).await;
        assert_eq!(result.err().map(|e| e.kind()), Some(ErrorKind::InsufficientFunds));
        assert!(store.snapshot().await.heists.is_empty());
    }

    #[tokio::test]
    async fn heat_cap_blocks_further_concurrent_heists() {
        let store = MemoryStore::new();
        let gang = seed_gang(&store, dec!(100000)).await;
        let economy = economy(&store);

        // Each active heist adds its target's 25 heat once.
        let mut levels = Vec::new();
        for _ in 0..4 {
            let planned = economy.plan_heist(gang.id, gang.officer, &jewelry()).await;
            levels.push(planned.ok().map(|h| h.heat_level));
        }
        assert_eq!(levels, vec![Some(25), Some(50), Some(75), Some(100)]);

        let fifth = economy.plan_heist(gang.id, gang.officer, &jewelry()).await;
        assert_eq!(fifth.err().map(|e| e.kind()), Some(ErrorKind::RequirementNotMet));
    }

    #[tokio::test]
    async fn cooldown_blocks_replanning_a_recent_target() {
        let store = MemoryStore::new();
        let gang = seed_gang(&store, dec!(100000)).await;
        let economy = economy(&store);

        let mut ready = ready_heist(&economy, &gang).await;
        ready.status = HeistStatus::Completed;
        ready.finished_at = Some(Utc::now() - Duration::days(1));
        store
            .with_state(|s| s.heists.insert(ready.id, ready.clone()))
            .await;

        let blocked = economy.plan_heist(gang.id, gang.officer, &jewelry()).await;
        assert_eq!(blocked.err().map(|e| e.kind()), Some(ErrorKind::RequirementNotMet));

        store
            .with_state(|s| {
                if let Some(done) = s.heists.get_mut(&ready.id) {
                    done.finished_at = Some(Utc::now() - Duration::days(4));
                }
            })
            .await;
        assert!(economy.plan_heist(gang.id, gang.officer, &jewelry()).await.is_ok());
    }

    #[tokio::test]
    async fn only_members_can_join_the_crew() {
        let store = MemoryStore::new();
        let gang = seed_gang(&store, dec!(5000)).await;
        let economy = economy(&store);
        let Ok(planned) = economy.plan_heist(gang.id, gang.officer, &jewelry()).await else {
            unreachable!("planning must succeed");
        };

        let outsider = crew(CharacterId::new(), HeistRole::Muscle);
        let result = economy
            .assign_heist_role(gang.id, gang.officer, planned.id, outsider)
            .await;
        assert_eq!(result.err().map(|e| e.kind()), Some(ErrorKind::NotAuthorized));

        let by_member = economy
            .assign_heist_role(gang.id, gang.member, planned.id, crew(gang.member, HeistRole::Muscle))
            .await;
        assert_eq!(by_member.err().map(|e| e.kind()), Some(ErrorKind::NotAuthorized));
    }

    #[tokio::test]
    async fn staffed_and_prepared_heist_becomes_ready_and_executes() {
        let store = MemoryStore::new();
        let gang = seed_gang(&store, dec!(5000)).await;
        let economy = economy(&store);

        let ready = ready_heist(&economy, &gang).await;
        assert_eq!(ready.status, HeistStatus::Ready);

        let removed = economy
            .remove_heist_member(gang.id, gang.officer, ready.id, gang.member)
            .await;
        assert_eq!(removed.ok().map(|h| h.status), Some(HeistStatus::Planning));
        let early = economy.execute_heist(gang.id, gang.officer, ready.id).await;
        assert_eq!(early.err().map(|e| e.kind()), Some(ErrorKind::InvalidStateTransition));

        let restaffed = economy
            .assign_heist_role(gang.id, gang.officer, ready.id, crew(gang.member, HeistRole::Driver))
            .await;
        assert_eq!(restaffed.ok().map(|h| h.status), Some(HeistStatus::Ready));

        let Ok(resolution) = economy.execute_heist(gang.id, gang.officer, ready.id).await else {
            unreachable!("ready heist must execute");
        };
        let state = store.snapshot().await;
        let stored = state.heists.get(&ready.id);
        assert_eq!(stored.map(|h| h.status), Some(HeistStatus::Completed));
        assert_eq!(stored.and_then(|h| h.outcome), Some(resolution.outcome));
        assert_eq!(
            state.ledgers.get(&gang.id).map(|a| a.balances.operating),
            Some(dec!(3000) + resolution.payout)
        );

        let twice = economy.execute_heist(gang.id, gang.officer, ready.id).await;
        assert_eq!(twice.err().map(|e| e.kind()), Some(ErrorKind::InvalidStateTransition));
    }

    #[tokio::test]
    async fn other_organizations_heists_are_invisible() {
        let store = MemoryStore::new();
        let gang = seed_gang(&store, dec!(5000)).await;
        let rival = seed_gang(&store, dec!(5000)).await;
        let economy = economy(&store);
        let Ok(planned) = economy.plan_heist(gang.id, gang.officer, &jewelry()).await else {
            unreachable!("planning must succeed");
        };

        let result = economy.cancel_heist(rival.id, rival.officer, planned.id).await;
        assert_eq!(result.err().map(|e| e.kind()), Some(ErrorKind::NotFound));
    }
}
