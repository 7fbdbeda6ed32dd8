//! Deposits, withdrawals, transfers, and payroll settings.

use std::collections::BTreeMap;

use chrono::Utc;
use rust_decimal::Decimal;
use serde_json::json;
use syndicate_ledger::{
    authorize_debit, authorize_deposit, authorize_member, configure_payroll, validate_amount,
};
use syndicate_types::{AccountKind, Balances, CharacterId, OrganizationId, PayrollConfig};
use tracing::info;

use super::{Economy, open_ledger, persist_ledger, resolve_actor};
use crate::error::ServiceError;
use crate::store::{Store, StoreTx};

impl<S: Store> Economy<S> {
    /// Current balances. Members only.
    pub async fn balances(
        &self,
        organization_id: OrganizationId,
        character: CharacterId,
    ) -> Result<Balances, ServiceError> {
        let mut tx = self.store.begin().await?;
        let (_, actor) = resolve_actor(&mut tx, organization_id, character).await?;
        authorize_member(&actor, "view the organization account")?;
        let ledger = open_ledger(&mut tx, organization_id, Utc::now()).await?;
        Ok(*ledger.balances())
    }

    /// Move money from the caller's personal balance into a sub-account.
    pub async fn deposit(
        &self,
        organization_id: OrganizationId,
        character: CharacterId,
        account: AccountKind,
        amount: Decimal,
    ) -> Result<Balances, ServiceError> {
        let now = Utc::now();
        let amount = validate_amount(amount)?;
        let mut tx = self.store.begin().await?;
        let (_, actor) = resolve_actor(&mut tx, organization_id, character).await?;
        authorize_deposit(&actor)?;

        let mut ledger = open_ledger(&mut tx, organization_id, now).await?;
        ledger.deposit(account, amount, character)?;
        tx.debit_character(
            character,
            amount,
            "organization deposit",
            &json!({ "organization_id": organization_id, "account": account }),
        )
        .await?;
        let saved = persist_ledger(&mut tx, ledger).await?;
        tx.commit().await?;

        info!(
            organization_id = %organization_id,
            character_id = %character,
            account = ?account,
            %amount,
            "deposit recorded"
        );
        Ok(saved.balances)
    }

    /// Move money from a sub-account to the caller's personal balance.
    pub async fn withdraw(
        &self,
        organization_id: OrganizationId,
        character: CharacterId,
        account: AccountKind,
        amount: Decimal,
    ) -> Result<Balances, ServiceError> {
        let now = Utc::now();
        let amount = validate_amount(amount)?;
        let mut tx = self.store.begin().await?;
        let (_, actor) = resolve_actor(&mut tx, organization_id, character).await?;
        authorize_debit(&actor, account)?;

        let mut ledger = open_ledger(&mut tx, organization_id, now).await?;
        ledger.withdraw(account, amount, character)?;
        tx.credit_character(
            character,
            amount,
            "organization withdrawal",
            &json!({ "organization_id": organization_id, "account": account }),
        )
        .await?;
        let saved = persist_ledger(&mut tx, ledger).await?;
        tx.commit().await?;

        info!(
            organization_id = %organization_id,
            character_id = %character,
            account = ?account,
            %amount,
            "withdrawal recorded"
        );
        Ok(saved.balances)
    }

    /// Move money between two sub-accounts.
    pub async fn transfer(
        &self,
        organization_id: OrganizationId,
        character: CharacterId,
        from: AccountKind,
        to: AccountKind,
        amount: Decimal,
    ) -> Result<Balances, ServiceError> {
        let now = Utc::now();
        let mut tx = self.store.begin().await?;
        let (_, actor) = resolve_actor(&mut tx, organization_id, character).await?;
        authorize_debit(&actor, from)?;

        let mut ledger = open_ledger(&mut tx, organization_id, now).await?;
        ledger.transfer(from, to, amount)?;
        let saved = persist_ledger(&mut tx, ledger).await?;
        tx.commit().await?;

        info!(
            organization_id = %organization_id,
            character_id = %character,
            from = ?from,
            to = ?to,
            %amount,
            "transfer recorded"
        );
        Ok(saved.balances)
    }

    /// Replace the wage list and officer bonus. Sole leader only.
    pub async fn configure_payroll(
        &self,
        organization_id: OrganizationId,
        character: CharacterId,
        wages: BTreeMap<CharacterId, Decimal>,
        officer_bonus: Decimal,
    ) -> Result<PayrollConfig, ServiceError> {
        let now = Utc::now();
        let mut tx = self.store.begin().await?;
        let (_, actor) = resolve_actor(&mut tx, organization_id, character).await?;

        let mut ledger = open_ledger(&mut tx, organization_id, now).await?;
        configure_payroll(&mut ledger, &actor, wages, officer_bonus)?;
        let saved = persist_ledger(&mut tx, ledger).await?;
        tx.commit().await?;

        info!(
            organization_id = %organization_id,
            members = saved.payroll.wages.len(),
            officer_bonus = %saved.payroll.officer_bonus,
            "payroll configured"
        );
        Ok(saved.payroll)
    }
}
