//! Buying and selling organization businesses.

use chrono::Utc;
use rust_decimal::Decimal;
use syndicate_economy::business;
use syndicate_ledger::authorize_officer;
use syndicate_types::{
    AccountKind, Business, BusinessId, BusinessTypeKey, CharacterId, JournalEntryType,
    OrganizationId, ZoneKey,
};
use tracing::info;

use super::{Economy, open_ledger, persist_ledger, resolve_actor};
use crate::error::ServiceError;
use crate::store::{Store, StoreTx};

impl<S: Store> Economy<S> {
    /// Buy a business from the catalog into a zone, paid from operating.
    pub async fn purchase_business(
        &self,
        organization_id: OrganizationId,
        character: CharacterId,
        business_type: &BusinessTypeKey,
        zone: &ZoneKey,
    ) -> Result<Business, ServiceError> {
        let now = Utc::now();
        let catalog = &self.config.catalogs;
        let entry = catalog
            .business_type(business_type)
            .ok_or_else(|| ServiceError::not_found("business type", business_type))?;
        let zone = catalog
            .zone(zone)
            .ok_or_else(|| ServiceError::not_found("zone", zone))?;

        let mut tx = self.store.begin().await?;
        let (organization, actor) = resolve_actor(&mut tx, organization_id, character).await?;
        authorize_officer(&actor, "purchase a business")?;
        business::validate_purchase(&organization, entry)?;

        let purchased = Business::purchase(organization_id, entry, zone.key.clone(), now);
        let mut ledger = open_ledger(&mut tx, organization_id, now).await?;
        ledger.debit(
            AccountKind::Operating,
            entry.startup_cost,
            JournalEntryType::BusinessPurchase,
            Some(purchased.id.into_inner()),
        )?;
        tx.insert_business(&purchased).await?;
        persist_ledger(&mut tx, ledger).await?;
        tx.commit().await?;

        info!(
            organization_id = %organization_id,
            business_id = %purchased.id,
            business_type = %purchased.business_type,
            zone = %purchased.zone,
            cost = %purchased.startup_cost,
            "business purchased"
        );
        Ok(purchased)
    }

    /// Sell an active business back for a fraction of its startup cost.
    /// Returns the proceeds credited to operating.
    pub async fn sell_business(
        &self,
        organization_id: OrganizationId,
        character: CharacterId,
        business_id: BusinessId,
    ) -> Result<Decimal, ServiceError> {
        let now = Utc::now();
        let mut tx = self.store.begin().await?;
        let (_, actor) = resolve_actor(&mut tx, organization_id, character).await?;
        authorize_officer(&actor, "sell a business")?;

        let mut owned = tx
            .business_for_update(business_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("business", business_id))?;
        let proceeds = business::sell(&mut owned, organization_id, &self.config.business)?;

        let mut ledger = open_ledger(&mut tx, organization_id, now).await?;
        if proceeds > Decimal::ZERO {
            ledger.credit(
                AccountKind::Operating,
                proceeds,
                JournalEntryType::BusinessSale,
                Some(business_id.into_inner()),
            )?;
        }
        tx.save_business(&owned).await?;
        persist_ledger(&mut tx, ledger).await?;
        tx.commit().await?;

        info!(
            organization_id = %organization_id,
            business_id = %business_id,
            %proceeds,
            "business sold"
        );
        Ok(proceeds)
    }
}
