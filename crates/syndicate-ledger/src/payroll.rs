//! Payroll configuration and payday planning.
//!
//! Payroll is all-or-nothing: either every line of the plan is paid from
//! the operating account, or nothing moves and the payday is skipped.

use std::collections::BTreeMap;

use chrono::Duration;
use rust_decimal::Decimal;

use syndicate_types::{
    AccountKind, CharacterId, JournalEntryType, Member, MemberRole, PAYROLL_INTERVAL_DAYS,
    PayrollConfig,
};

use crate::authorization::{Actor, authorize_leader};
use crate::{Ledger, LedgerError, validate_rate};

/// One member's pay for a payday.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PayrollLine {
    /// The paid member.
    pub member: CharacterId,
    /// Their role at payday.
    pub role: MemberRole,
    /// Configured wage.
    pub wage: Decimal,
    /// Officer bonus, zero for other roles.
    pub bonus: Decimal,
}

impl PayrollLine {
    /// Wage plus bonus.
    pub fn total(&self) -> Result<Decimal, LedgerError> {
        self.wage
            .checked_add(self.bonus)
            .ok_or(LedgerError::Overflow {
                account: AccountKind::Operating,
            })
    }
}

/// What a payday will do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PayrollPlan {
    /// Pay every line.
    Pay {
        /// Lines to pay, in member order.
        lines: Vec<PayrollLine>,
        /// Sum of all lines.
        total: Decimal,
    },
    /// The operating account cannot cover the full payroll.
    Skipped {
        /// Full payroll amount.
        required: Decimal,
        /// Operating balance.
        available: Decimal,
    },
    /// No current member has a wage configured.
    Empty,
}

/// Plan a payday.
///
/// Only members still in `members` are paid; wage entries for characters
/// who left are ignored. Officers also receive the officer bonus.
pub fn plan_payroll(
    config: &PayrollConfig,
    members: &[Member],
    operating: Decimal,
) -> Result<PayrollPlan, LedgerError> {
    let mut lines = Vec::new();
    let mut total = Decimal::ZERO;

    for member in members {
        let Some(wage) = config.wages.get(&member.character_id) else {
            continue;
        };
        let bonus = if member.role == MemberRole::Officer {
            config.officer_bonus
        } else {
            Decimal::ZERO
        };
        let line = PayrollLine {
            member: member.character_id,
            role: member.role,
            wage: *wage,
            bonus,
        };
        total = total
            .checked_add(line.total()?)
            .ok_or(LedgerError::Overflow {
                account: AccountKind::Operating,
            })?;
        lines.push(line);
    }

    if total <= Decimal::ZERO {
        return Ok(PayrollPlan::Empty);
    }
    if total > operating {
        return Ok(PayrollPlan::Skipped {
            required: total,
            available: operating,
        });
    }
    Ok(PayrollPlan::Pay { lines, total })
}

/// Replace wages and officer bonus. Sole leader only; amounts must be
/// whole cents and not negative.
pub fn configure_payroll(
    ledger: &mut Ledger,
    actor: &Actor,
    wages: BTreeMap<CharacterId, Decimal>,
    officer_bonus: Decimal,
) -> Result<(), LedgerError> {
    authorize_leader(actor, "configure payroll")?;
    for amount in wages.values().copied().chain(std::iter::once(officer_bonus)) {
        validate_rate(amount)?;
    }

    let payroll = ledger.payroll_mut();
    payroll.wages = wages;
    payroll.officer_bonus = officer_bonus;
    Ok(())
}

impl Ledger {
    /// Debit every planned line from operating and advance the payday.
    ///
    /// Fails with [`LedgerError::InsufficientFunds`] before moving anything
    /// if operating cannot cover `total`. Character credits are applied by
    /// the caller in the same transaction.
    pub fn pay_payroll(&mut self, lines: &[PayrollLine], total: Decimal) -> Result<(), LedgerError> {
        let available = self.balances().operating;
        if available < total {
            return Err(LedgerError::InsufficientFunds {
                account: AccountKind::Operating,
                requested: total,
                available,
            });
        }
        for line in lines {
            let amount = line.total()?;
            if amount > Decimal::ZERO {
                self.debit(
                    AccountKind::Operating,
                    amount,
                    JournalEntryType::Payroll,
                    Some(line.member.into_inner()),
                )?;
            }
        }
        self.advance_payday(true);
        Ok(())
    }

    /// Move `next_payday` one interval past now, recording `last_paid` when
    /// money actually moved.
    pub fn advance_payday(&mut self, paid: bool) {
        let now = self.now();
        let payroll = self.payroll_mut();
        if paid {
            payroll.last_paid = Some(now);
        }
        payroll.next_payday = now
            .checked_add_signed(Duration::days(PAYROLL_INTERVAL_DAYS))
            .unwrap_or(now);
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use rust_decimal_macros::dec;

    use syndicate_types::{LedgerAccount, Organization, OrganizationId};

    use super::*;
    use crate::ConservationResult;

    struct Crew {
        leader: Member,
        officer: Member,
        grunt: Member,
    }

    fn crew() -> Crew {
        Crew {
            leader: Member {
                character_id: CharacterId::new(),
                role: MemberRole::Leader,
            },
            officer: Member {
                character_id: CharacterId::new(),
                role: MemberRole::Officer,
            },
            grunt: Member {
                character_id: CharacterId::new(),
                role: MemberRole::Member,
            },
        }
    }

    fn config(wages: &[(CharacterId, Decimal)]) -> PayrollConfig {
        let mut config = PayrollConfig::new(Utc::now());
        config.wages = wages.iter().copied().collect();
        config
    }

    #[test]
    fn pays_wages_from_operating() {
        let crew = crew();
        let config = config(&[
            (crew.grunt.character_id, dec!(100)),
            (crew.leader.character_id, dec!(50)),
        ]);
        let members = [crew.leader, crew.grunt];
        let plan = plan_payroll(&config, &members, dec!(200));
        let Ok(PayrollPlan::Pay { lines, total }) = plan else {
            unreachable!("expected a payable plan");
        };
        assert_eq!(total, dec!(150));

        let now = Utc::now();
        let mut account = LedgerAccount::open(OrganizationId::new(), now);
        account.balances.operating = dec!(200);
        let mut ledger = Ledger::new(account, now);
        assert!(ledger.pay_payroll(&lines, total).is_ok());
        assert_eq!(ledger.balances().operating, dec!(50));
        assert_eq!(ledger.account().payroll.last_paid, Some(now));
        assert!(ledger.account().payroll.next_payday > now);
        assert_eq!(ledger.verify_conservation(), ConservationResult::Balanced);
    }

    #[test]
    fn insufficient_operating_skips_entirely() {
        let crew = crew();
        let config = config(&[
            (crew.grunt.character_id, dec!(100)),
            (crew.leader.character_id, dec!(50)),
        ]);
        let plan = plan_payroll(&config, &[crew.leader, crew.grunt], dec!(100));
        assert_eq!(
            plan.ok(),
            Some(PayrollPlan::Skipped {
                required: dec!(150),
                available: dec!(100),
            })
        );
    }

    #[test]
    fn officers_receive_bonus() {
        let crew = crew();
        let mut config = config(&[(crew.officer.character_id, dec!(80))]);
        config.officer_bonus = dec!(20);
        let plan = plan_payroll(&config, &[crew.officer], dec!(1000));
        assert!(matches!(plan, Ok(PayrollPlan::Pay { total, .. }) if total == dec!(100)));
    }

    #[test]
    fn departed_members_are_not_paid() {
        let crew = crew();
        let config = config(&[(crew.grunt.character_id, dec!(100))]);
        let plan = plan_payroll(&config, &[crew.leader], dec!(1000));
        assert_eq!(plan.ok(), Some(PayrollPlan::Empty));
    }

    #[test]
    fn only_the_leader_configures_payroll() {
        let crew = crew();
        let organization = Organization {
            id: OrganizationId::new(),
            name: "Eastside".to_owned(),
            level: 1,
            leader_id: crew.leader.character_id,
        };
        let now = Utc::now();
        let mut ledger = Ledger::new(LedgerAccount::open(organization.id, now), now);
        let wages: BTreeMap<_, _> = [(crew.grunt.character_id, dec!(10))].into_iter().collect();

        let officer = Actor::resolve(crew.officer.character_id, Some(MemberRole::Officer), &organization);
        assert!(configure_payroll(&mut ledger, &officer, wages.clone(), dec!(5)).is_err());

        let leader = Actor::resolve(crew.leader.character_id, Some(MemberRole::Leader), &organization);
        assert!(configure_payroll(&mut ledger, &leader, wages, dec!(5)).is_ok());
        assert_eq!(ledger.account().payroll.officer_bonus, dec!(5));

        let negative: BTreeMap<_, _> = [(crew.grunt.character_id, dec!(-1))].into_iter().collect();
        assert!(matches!(
            configure_payroll(&mut ledger, &leader, negative, dec!(0)),
            Err(LedgerError::InvalidAmount { .. })
        ));
    }

    #[test]
    fn sub_cent_wages_are_rejected_at_configuration() {
        let crew = crew();
        let organization = Organization {
            id: OrganizationId::new(),
            name: "Eastside".to_owned(),
            level: 1,
            leader_id: crew.leader.character_id,
        };
        let now = Utc::now();
        let mut ledger = Ledger::new(LedgerAccount::open(organization.id, now), now);
        let leader = Actor::resolve(crew.leader.character_id, Some(MemberRole::Leader), &organization);

        let sub_cent: BTreeMap<_, _> = [(crew.grunt.character_id, dec!(10.005))].into_iter().collect();
        assert!(matches!(
            configure_payroll(&mut ledger, &leader, sub_cent, dec!(0)),
            Err(LedgerError::InvalidAmount { amount }) if amount == dec!(10.005)
        ));
        let wages: BTreeMap<_, _> = [(crew.grunt.character_id, dec!(10))].into_iter().collect();
        assert!(matches!(
            configure_payroll(&mut ledger, &leader, wages, dec!(2.505)),
            Err(LedgerError::InvalidAmount { .. })
        ));
        assert!(ledger.account().payroll.wages.is_empty());
    }
}
