//! Fixed-term investments funded from the investment account.

use chrono::Utc;
use rust_decimal::Decimal;
use syndicate_economy::investment;
use syndicate_ledger::{authorize_debit, validate_amount};
use syndicate_types::{AccountKind, CharacterId, Investment, JournalEntryType, OrganizationId};
use tracing::info;

use super::{Economy, open_ledger, persist_ledger, resolve_actor};
use crate::error::ServiceError;
use crate::store::{Store, StoreTx};

impl<S: Store> Economy<S> {
    /// Lock `principal` from the investment account into a product of
    /// `term_days`. Matured by the daily job.
    pub async fn place_investment(
        &self,
        organization_id: OrganizationId,
        character: CharacterId,
        principal: Decimal,
        term_days: u32,
    ) -> Result<Investment, ServiceError> {
        let now = Utc::now();
        let principal = validate_amount(principal)?;
        let placed = investment::place(
            organization_id,
            principal,
            term_days,
            &self.config.investments.terms,
            now,
        )?;

        let mut tx = self.store.begin().await?;
        let (_, actor) = resolve_actor(&mut tx, organization_id, character).await?;
        authorize_debit(&actor, AccountKind::Investment)?;

        let mut ledger = open_ledger(&mut tx, organization_id, now).await?;
        ledger.debit(
            AccountKind::Investment,
            principal,
            JournalEntryType::InvestmentPlaced,
            Some(placed.id.into_inner()),
        )?;
        tx.insert_investment(&placed).await?;
        persist_ledger(&mut tx, ledger).await?;
        tx.commit().await?;

        info!(
            organization_id = %organization_id,
            investment_id = %placed.id,
            %principal,
            rate = %placed.return_rate,
            matures_at = %placed.matures_at,
            "investment placed"
        );
        Ok(placed)
    }
}
