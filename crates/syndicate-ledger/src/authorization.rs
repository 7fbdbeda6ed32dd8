//! Role checks for ledger mutations.
//!
//! The [`Actor`] is resolved from membership read inside the caller's
//! storage transaction, immediately before the mutation, so a member demoted
//! a moment ago is already rejected. Every rejection is logged on the
//! `syndicate::audit` target.

use syndicate_types::{AccountKind, CharacterId, MemberRole, Organization};

use crate::LedgerError;

/// A character acting on an organization, with their current standing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
    /// The acting character.
    pub character_id: CharacterId,
    /// Their role, or `None` if they are not a member.
    pub role: Option<MemberRole>,
    /// Whether the organization records this character as its leader.
    pub is_recorded_leader: bool,
}

impl Actor {
    /// Resolve an actor from a freshly read role and organization record.
    pub fn resolve(
        character_id: CharacterId,
        role: Option<MemberRole>,
        organization: &Organization,
    ) -> Self {
        Self {
            character_id,
            role,
            is_recorded_leader: organization.leader_id == character_id,
        }
    }

    /// Whether the character currently belongs to the organization.
    pub const fn is_member(&self) -> bool {
        self.role.is_some()
    }

    /// Whether the character holds officer privileges or better.
    pub const fn is_officer_or_above(&self) -> bool {
        matches!(self.role, Some(role) if role.is_officer_or_above())
    }

    /// Whether the character is the organization's one leader: leader role
    /// and recorded as leader.
    pub const fn is_sole_leader(&self) -> bool {
        matches!(self.role, Some(MemberRole::Leader)) && self.is_recorded_leader
    }
}

/// Any member may deposit.
pub fn authorize_deposit(actor: &Actor) -> Result<(), LedgerError> {
    authorize_member(actor, "deposit")
}

/// Require current membership for `action`.
pub fn authorize_member(actor: &Actor, action: &'static str) -> Result<(), LedgerError> {
    if actor.is_member() {
        Ok(())
    } else {
        Err(reject(actor, action))
    }
}

/// Emergency funds are the sole leader's; other accounts need an officer.
pub fn authorize_debit(actor: &Actor, account: AccountKind) -> Result<(), LedgerError> {
    match account {
        AccountKind::Emergency if actor.is_sole_leader() => Ok(()),
        AccountKind::Emergency => Err(reject(actor, "debit the emergency account")),
        _ if actor.is_officer_or_above() => Ok(()),
        _ => Err(reject(actor, "debit organization funds")),
    }
}

/// Require officer or leader for `action`.
pub fn authorize_officer(actor: &Actor, action: &'static str) -> Result<(), LedgerError> {
    if actor.is_officer_or_above() {
        Ok(())
    } else {
        Err(reject(actor, action))
    }
}

/// Require the sole leader for `action`.
pub fn authorize_leader(actor: &Actor, action: &'static str) -> Result<(), LedgerError> {
    if actor.is_sole_leader() {
        Ok(())
    } else {
        Err(reject(actor, action))
    }
}

fn reject(actor: &Actor, action: &'static str) -> LedgerError {
    tracing::warn!(
        target: "syndicate::audit",
        character_id = %actor.character_id,
        role = ?actor.role,
        action,
        "privileged operation rejected"
    );
    LedgerError::NotAuthorized {
        character: actor.character_id,
        action,
    }
}

#[cfg(test)]
mod tests {
    use syndicate_types::OrganizationId;

    use super::*;

    fn org(leader: CharacterId) -> Organization {
        Organization {
            id: OrganizationId::new(),
            name: "Westside".to_owned(),
            level: 3,
            leader_id: leader,
        }
    }

    #[test]
    fn non_member_cannot_deposit() {
        let leader = CharacterId::new();
        let stranger = Actor::resolve(CharacterId::new(), None, &org(leader));
        assert!(authorize_deposit(&stranger).is_err());
        let member = Actor::resolve(CharacterId::new(), Some(MemberRole::Member), &org(leader));
        assert!(authorize_deposit(&member).is_ok());
    }

    #[test]
    fn member_cannot_debit_operating() {
        let organization = org(CharacterId::new());
        let member = Actor::resolve(CharacterId::new(), Some(MemberRole::Member), &organization);
        assert!(authorize_debit(&member, AccountKind::Operating).is_err());
        let officer = Actor::resolve(CharacterId::new(), Some(MemberRole::Officer), &organization);
        assert!(authorize_debit(&officer, AccountKind::War).is_ok());
    }

    #[test]
    fn emergency_requires_recorded_leader() {
        let leader_id = CharacterId::new();
        let organization = org(leader_id);
        let leader = Actor::resolve(leader_id, Some(MemberRole::Leader), &organization);
        assert!(authorize_debit(&leader, AccountKind::Emergency).is_ok());

        let officer = Actor::resolve(CharacterId::new(), Some(MemberRole::Officer), &organization);
        assert!(authorize_debit(&officer, AccountKind::Emergency).is_err());

        // Leader role without being the recorded leader is not enough.
        let pretender = Actor::resolve(CharacterId::new(), Some(MemberRole::Leader), &organization);
        assert!(authorize_debit(&pretender, AccountKind::Emergency).is_err());
        assert!(authorize_leader(&pretender, "configure payroll").is_err());
    }

    #[test]
    fn rejection_carries_action() {
        let organization = org(CharacterId::new());
        let member = Actor::resolve(CharacterId::new(), Some(MemberRole::Member), &organization);
        let err = authorize_officer(&member, "plan a heist");
        assert!(matches!(
            err,
            Err(LedgerError::NotAuthorized { action: "plan a heist", .. })
        ));
    }
}
