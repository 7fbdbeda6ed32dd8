//! The heist state machine.
//!
//! ```text
//! planning ──(crew full + progress 100)──▶ ready ──execute──▶ in_progress ──▶ completed
//!    ▲                                       │
//!    └──────────(member removed)─────────────┘
//! planning | ready ──cancel──▶ cancelled
//! ```
//!
//! Completed and cancelled heists are immutable. Every function validates
//! before mutating, so a rejected call leaves the heist untouched.

use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use rand::seq::index;
use rust_decimal::Decimal;

use syndicate_types::{
    CharacterId, CrewAssignment, Heist, HeistOutcome, HeistStatus, HeistTarget, Member,
    Organization,
};

use crate::business::roll_whole;
use crate::config::HeistRules;
use crate::error::HeistError;

/// Maximum planning progress and skill level.
pub const MAX_PROGRESS: u32 = 100;

/// Floor of the success chance, in percent.
pub const MIN_SUCCESS_CHANCE: f64 = 5.0;

/// Ceiling of the success chance, in percent.
pub const MAX_SUCCESS_CHANCE: f64 = 95.0;

// ---------------------------------------------------------------------------
// Planning
// ---------------------------------------------------------------------------

/// Everything needed to validate a new heist, read inside one transaction.
#[derive(Debug, Clone, Copy)]
pub struct PlanningContext<'a> {
    /// The planning organization.
    pub organization: &'a Organization,
    /// The chosen target.
    pub target: &'a HeistTarget,
    /// The organization's heists that still carry heat.
    pub active_heists: &'a [Heist],
    /// When the organization last completed a heist on this target.
    pub last_completed: Option<DateTime<Utc>>,
    /// Current time.
    pub now: DateTime<Utc>,
}

/// Summed heat of the heists that are still active.
///
/// Each heist contributes its target's own heat, not the combined level it
/// was planned at, so earlier heists are counted once.
pub fn active_heat(heists: &[Heist]) -> u32 {
    heists
        .iter()
        .filter(|heist| heist.status.is_active())
        .fold(0_u32, |acc, heist| acc.saturating_add(heist.target_heat))
}

/// Validate cooldown, level, and heat, then create the heist in `Planning`.
///
/// The new heist's heat is `min(100, active heat + target heat)`.
pub fn plan(context: &PlanningContext<'_>, rules: &HeistRules) -> Result<Heist, HeistError> {
    let target = context.target;

    if let Some(last) = context.last_completed {
        let available_at = last
            .checked_add_signed(Duration::days(i64::from(target.cooldown_days)))
            .unwrap_or(last);
        if context.now < available_at {
            return Err(HeistError::CooldownActive { available_at });
        }
    }

    if context.organization.level < target.required_level {
        return Err(HeistError::LevelTooLow {
            required: target.required_level,
            actual: context.organization.level,
        });
    }

    let current = active_heat(context.active_heists);
    let combined = current.saturating_add(target.heat);
    if combined > rules.max_active_heat {
        return Err(HeistError::HeatTooHigh {
            current,
            added: target.heat,
            max: rules.max_active_heat,
        });
    }

    Ok(Heist::plan(
        context.organization.id,
        target,
        combined.min(MAX_PROGRESS),
        context.now,
    ))
}

// ---------------------------------------------------------------------------
// Crew and progress
// ---------------------------------------------------------------------------

/// Staff a crew position. Only allowed while planning; the character must be
/// a current member and not already on the crew.
pub fn assign_role(
    heist: &mut Heist,
    mut assignment: CrewAssignment,
    members: &[Member],
) -> Result<(), HeistError> {
    require_status(heist, "assign crew to", &[HeistStatus::Planning])?;
    if !members
        .iter()
        .any(|member| member.character_id == assignment.member)
    {
        return Err(HeistError::NotAMember(assignment.member));
    }
    if heist.crew.iter().any(|c| c.member == assignment.member) {
        return Err(HeistError::DuplicateMember(assignment.member));
    }
    if crew_size(heist) >= heist.required_crew {
        return Err(HeistError::CrewFull {
            required: heist.required_crew,
        });
    }

    assignment.skill = assignment.skill.min(MAX_PROGRESS);
    heist.crew.push(assignment);
    promote_if_ready(heist);
    Ok(())
}

/// Take a member off the crew. A ready heist falls back to planning.
pub fn remove_member(heist: &mut Heist, member: CharacterId) -> Result<(), HeistError> {
    require_status(
        heist,
        "remove crew from",
        &[HeistStatus::Planning, HeistStatus::Ready],
    )?;
    let position = heist
        .crew
        .iter()
        .position(|c| c.member == member)
        .ok_or(HeistError::NotOnCrew(member))?;
    heist.crew.remove(position);
    heist.status = HeistStatus::Planning;
    Ok(())
}

/// Add planning progress, clamped at 100. Returns the new progress.
pub fn add_progress(heist: &mut Heist, increment: u32) -> Result<u32, HeistError> {
    if increment == 0 {
        return Err(HeistError::InvalidProgress);
    }
    require_status(heist, "prepare", &[HeistStatus::Planning, HeistStatus::Ready])?;
    heist.progress = heist.progress.saturating_add(increment).min(MAX_PROGRESS);
    promote_if_ready(heist);
    Ok(heist.progress)
}

fn promote_if_ready(heist: &mut Heist) {
    if heist.status == HeistStatus::Planning && is_prepared(heist) {
        heist.status = HeistStatus::Ready;
    }
}

fn is_prepared(heist: &Heist) -> bool {
    crew_size(heist) == heist.required_crew && heist.progress >= MAX_PROGRESS
}

fn crew_size(heist: &Heist) -> u32 {
    u32::try_from(heist.crew.len()).unwrap_or(u32::MAX)
}

fn require_status(
    heist: &Heist,
    action: &'static str,
    allowed: &[HeistStatus],
) -> Result<(), HeistError> {
    if allowed.contains(&heist.status) {
        Ok(())
    } else {
        Err(HeistError::InvalidStatus {
            action,
            status: heist.status,
        })
    }
}

// ---------------------------------------------------------------------------
// Execution
// ---------------------------------------------------------------------------

/// Success chance in percent:
/// `20 + 30*progress + 40*mean_skill - 50*risk - 20*heat`, each factor
/// normalized to `[0, 1]`, clamped to `[5, 95]`.
pub fn success_chance(heist: &Heist) -> f64 {
    let mean_skill = if heist.crew.is_empty() {
        0.0
    } else {
        let total: u32 = heist
            .crew
            .iter()
            .fold(0, |acc, c| acc.saturating_add(c.skill.min(MAX_PROGRESS)));
        f64::from(total) / f64::from(crew_size(heist))
    };
    let unit = |value: u32| f64::from(value.min(MAX_PROGRESS)) / 100.0;

    let chance = 20.0 + 30.0 * unit(heist.progress) + 40.0 * (mean_skill / 100.0)
        - 50.0 * unit(heist.risk_level)
        - 20.0 * unit(heist.heat_level);
    chance.clamp(MIN_SUCCESS_CHANCE, MAX_SUCCESS_CHANCE)
}

/// What happened when a heist was executed.
#[derive(Debug, Clone, PartialEq)]
pub struct HeistResolution {
    /// Outcome band the roll fell in.
    pub outcome: HeistOutcome,
    /// Loot to credit to operating.
    pub payout: Decimal,
    /// Arrested crew, without duplicates.
    pub arrested: Vec<CharacterId>,
    /// Killed crew, disjoint from `arrested`.
    pub casualties: Vec<CharacterId>,
    /// Success chance in percent.
    pub chance: f64,
    /// The roll in `[0, 100)`.
    pub roll: f64,
}

/// Execute a ready heist and complete it.
///
/// The heist moves to `InProgress` once every precondition holds and is
/// left `Completed` with its outcome.
///
/// One roll in `[0, 100)`: at or under the success chance is a success;
/// within `partial_band` above it a partial success; anything else fails.
pub fn execute(
    heist: &mut Heist,
    rules: &HeistRules,
    now: DateTime<Utc>,
    rng: &mut impl Rng,
) -> Result<HeistResolution, HeistError> {
    require_status(heist, "execute", &[HeistStatus::Ready])?;
    if !is_prepared(heist) {
        return Err(HeistError::NotReady {
            crew: heist.crew.len(),
            required: heist.required_crew,
            progress: heist.progress,
        });
    }
    if heist.payout_min > heist.payout_max {
        return Err(HeistError::InvalidPayoutRange {
            min: heist.payout_min,
            max: heist.payout_max,
        });
    }
    heist.status = HeistStatus::InProgress;

    let chance = success_chance(heist);
    let roll = rng.random::<f64>() * 100.0;
    let crew: Vec<CharacterId> = heist.crew.iter().map(|c| c.member).collect();

    let resolution = if roll <= chance {
        let payout = roll_whole(heist.payout_min, heist.payout_max, rng).ok_or(
            HeistError::InvalidPayoutRange {
                min: heist.payout_min,
                max: heist.payout_max,
            },
        )?;
        HeistResolution {
            outcome: HeistOutcome::Success,
            payout,
            arrested: Vec::new(),
            casualties: Vec::new(),
            chance,
            roll,
        }
    } else if roll <= chance + rules.partial_band {
        let payout = heist
            .payout_min
            .checked_mul(rules.partial_payout_ratio)
            .unwrap_or(Decimal::ZERO)
            .floor();
        let most = crew.len().div_ceil(2);
        let count = if most == 0 { 0 } else { rng.random_range(1..=most) };
        HeistResolution {
            outcome: HeistOutcome::PartialSuccess,
            payout,
            arrested: pick(&crew, count, rng),
            casualties: Vec::new(),
            chance,
            roll,
        }
    } else {
        // round(0.6 * n), at least one.
        let count = crew.len().saturating_mul(3).saturating_add(2) / 5;
        let arrested = pick(&crew, count.max(1), rng);
        let casualties = if heist.risk_level >= rules.casualty_risk_threshold
            && rng.random::<f64>() < rules.casualty_chance
        {
            let free: Vec<CharacterId> = crew
                .iter()
                .copied()
                .filter(|member| !arrested.contains(member))
                .collect();
            let count = rng.random_range(1..=2_usize);
            pick(&free, count, rng)
        } else {
            Vec::new()
        };
        HeistResolution {
            outcome: HeistOutcome::Failure,
            payout: Decimal::ZERO,
            arrested,
            casualties,
            chance,
            roll,
        }
    };

    heist.status = HeistStatus::Completed;
    heist.outcome = Some(resolution.outcome);
    heist.payout = resolution.payout;
    heist.arrested.clone_from(&resolution.arrested);
    heist.casualties.clone_from(&resolution.casualties);
    heist.finished_at = Some(now);
    Ok(resolution)
}

/// Up to `count` distinct members drawn without replacement.
fn pick(pool: &[CharacterId], count: usize, rng: &mut impl Rng) -> Vec<CharacterId> {
    let amount = count.min(pool.len());
    index::sample(rng, pool.len(), amount)
        .into_iter()
        .filter_map(|i| pool.get(i).copied())
        .collect()
}

/// Abandon a heist that has not started. Equipment is not refunded.
pub fn cancel(heist: &mut Heist, now: DateTime<Utc>) -> Result<(), HeistError> {
    require_status(heist, "cancel", &[HeistStatus::Planning, HeistStatus::Ready])?;
    heist.status = HeistStatus::Cancelled;
    heist.finished_at = Some(now);
    Ok(())
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use rust_decimal_macros::dec;

    use syndicate_types::{HeistRole, HeistTargetKey, MemberRole, OrganizationId};

    use super::*;

    fn target() -> HeistTarget {
        HeistTarget {
            key: HeistTargetKey::new("armored_truck"),
            name: "Armored Truck".to_owned(),
            payout_min: dec!(20000),
            payout_max: dec!(40000),
            required_crew: 3,
            equipment_cost: dec!(2500),
            base_risk: 40,
            heat: 30,
            cooldown_days: 3,
            required_level: 2,
        }
    }

    fn organization() -> Organization {
        Organization {
            id: OrganizationId::new(),
            name: "Northside".to_owned(),
            level: 3,
            leader_id: CharacterId::new(),
        }
    }

    fn members(count: usize) -> Vec<Member> {
        (0..count)
            .map(|_| Member {
                character_id: CharacterId::new(),
                role: MemberRole::Member,
            })
            .collect()
    }

    fn planned(target: &HeistTarget) -> Heist {
        let org = organization();
        let context = PlanningContext {
            organization: &org,
            target,
            active_heists: &[],
            last_completed: None,
            now: Utc::now(),
        };
        plan(&context, &HeistRules::default()).unwrap_or_else(|_| unreachable!())
    }

    fn staffed(target: &HeistTarget, skill: u32) -> (Heist, Vec<Member>) {
        let mut heist = planned(target);
        let roster = members(usize::try_from(target.required_crew).unwrap_or(0));
        for member in &roster {
            let assignment = CrewAssignment {
                member: member.character_id,
                role: HeistRole::Muscle,
                skill,
            };
            assert!(assign_role(&mut heist, assignment, &roster).is_ok());
        }
        assert!(add_progress(&mut heist, 100).is_ok());
        (heist, roster)
    }

    #[test]
    fn plan_starts_in_planning_with_target_heat() {
        let heist = planned(&target());
        assert_eq!(heist.status, HeistStatus::Planning);
        assert_eq!(heist.heat_level, 30);
        assert_eq!(heist.risk_level, 40);
        assert!(heist.crew.is_empty());
    }

    #[test]
    fn cooldown_blocks_replanning() {
        let org = organization();
        let target = target();
        let now = Utc::now();
        let context = PlanningContext {
            organization: &org,
            target: &target,
            active_heists: &[],
            last_completed: Some(now - Duration::days(1)),
            now,
        };
        let err = plan(&context, &HeistRules::default());
        assert!(matches!(err, Err(HeistError::CooldownActive { .. })));

        let context = PlanningContext {
            last_completed: Some(now - Duration::days(3)),
            ..context
        };
        assert!(plan(&context, &HeistRules::default()).is_ok());
    }

    #[test]
    fn level_requirement_is_enforced() {
        let mut org = organization();
        org.level = 1;
        let target = target();
        let context = PlanningContext {
            organization: &org,
            target: &target,
            active_heists: &[],
            last_completed: None,
            now: Utc::now(),
        };
        let err = plan(&context, &HeistRules::default());
        assert!(err.is_err_and(|e| e.kind() == syndicate_types::ErrorKind::RequirementNotMet));
    }

    #[test]
    fn active_heat_caps_planning() {
        let org = organization();
        let target = target();
        let active: Vec<Heist> = (0..3).map(|_| planned(&target)).collect();
        let context = PlanningContext {
            organization: &org,
            target: &target,
            active_heists: &active,
            last_completed: None,
            now: Utc::now(),
        };
        // 3 x 30 + 30 = 120 > 100.
        assert!(matches!(
            plan(&context, &HeistRules::default()),
            Err(HeistError::HeatTooHigh { current: 90, .. })
        ));

        let cancelled: Vec<Heist> = active
            .iter()
            .cloned()
            .map(|mut h| {
                h.status = HeistStatus::Cancelled;
                h
            })
            .collect();
        let context = PlanningContext {
            active_heists: &cancelled,
            ..context
        };
        assert!(plan(&context, &HeistRules::default()).is_ok());
    }

    #[test]
    fn heat_of_new_heist_includes_active() {
        let org = organization();
        let target = target();
        let active = vec![planned(&target)];
        let context = PlanningContext {
            organization: &org,
            target: &target,
            active_heists: &active,
            last_completed: None,
            now: Utc::now(),
        };
        let heist = plan(&context, &HeistRules::default());
        assert!(heist.is_ok_and(|h| h.heat_level == 60 && h.target_heat == 30));
    }

    #[test]
    fn earlier_heists_count_their_own_heat_once() {
        let org = organization();
        let target = target();
        let now = Utc::now();
        let mut active = Vec::new();
        for expected in [30, 60, 90] {
            let context = PlanningContext {
                organization: &org,
                target: &target,
                active_heists: &active,
                last_completed: None,
                now,
            };
            let Ok(heist) = plan(&context, &HeistRules::default()) else {
                unreachable!("heat {expected} is within the cap");
            };
            assert_eq!(heist.heat_level, expected);
            active.push(heist);
        }
        assert_eq!(active_heat(&active), 90);
    }

    #[test]
    fn crew_rules() {
        let target = target();
        let mut heist = planned(&target);
        let roster = members(4);
        let outsider = CharacterId::new();
        let assign = |member: CharacterId| CrewAssignment {
            member,
            role: HeistRole::Driver,
            skill: 150,
        };

        assert!(matches!(
            assign_role(&mut heist, assign(outsider), &roster),
            Err(HeistError::NotAMember(_))
        ));
        let ids: Vec<CharacterId> = roster.iter().map(|m| m.character_id).collect();
        let [a, b, c, d] = ids.as_slice() else {
            unreachable!();
        };
        assert!(assign_role(&mut heist, assign(*a), &roster).is_ok());
        assert!(matches!(
            assign_role(&mut heist, assign(*a), &roster),
            Err(HeistError::DuplicateMember(_))
        ));
        assert!(assign_role(&mut heist, assign(*b), &roster).is_ok());
        assert!(assign_role(&mut heist, assign(*c), &roster).is_ok());
        assert!(matches!(
            assign_role(&mut heist, assign(*d), &roster),
            Err(HeistError::CrewFull { required: 3 })
        ));
        assert!(heist.crew.iter().all(|member| member.skill == 100));
        // Crew full but progress 0: still planning.
        assert_eq!(heist.status, HeistStatus::Planning);
    }

    #[test]
    fn progress_clamps_and_promotes() {
        let (heist, _) = staffed(&target(), 50);
        assert_eq!(heist.progress, 100);
        assert_eq!(heist.status, HeistStatus::Ready);

        let mut fresh = planned(&target());
        assert!(matches!(add_progress(&mut fresh, 0), Err(HeistError::InvalidProgress)));
        assert_eq!(add_progress(&mut fresh, 60).ok(), Some(60));
        assert_eq!(add_progress(&mut fresh, 60).ok(), Some(100));
        assert_eq!(fresh.status, HeistStatus::Planning);
    }

    #[test]
    fn removing_member_reverts_to_planning() {
        let (mut heist, roster) = staffed(&target(), 50);
        let first = roster.first().map(|m| m.character_id).unwrap_or_default();
        assert!(remove_member(&mut heist, first).is_ok());
        assert_eq!(heist.status, HeistStatus::Planning);
        assert!(matches!(
            remove_member(&mut heist, first),
            Err(HeistError::NotOnCrew(_))
        ));
    }

    #[test]
    fn success_chance_is_monotonic_and_clamped() {
        let (mut heist, _) = staffed(&target(), 50);
        // 20 + 30 + 20 - 20 - 6 = 44.
        assert!((success_chance(&heist) - 44.0).abs() < 1e-9);

        let base = success_chance(&heist);
        heist.risk_level = 80;
        assert!(success_chance(&heist) < base);
        heist.risk_level = 40;
        heist.heat_level = 90;
        assert!(success_chance(&heist) < base);

        heist.risk_level = 100;
        heist.heat_level = 100;
        heist.progress = 0;
        for member in &mut heist.crew {
            member.skill = 0;
        }
        assert!((success_chance(&heist) - MIN_SUCCESS_CHANCE).abs() < 1e-9);

        heist.risk_level = 0;
        heist.heat_level = 0;
        heist.progress = 100;
        for member in &mut heist.crew {
            member.skill = 100;
        }
        // 20 + 30 + 40 = 90, the best a crew can do.
        assert!((success_chance(&heist) - 90.0).abs() < 1e-9);
    }

    #[test]
    fn execute_requires_ready() {
        let mut heist = planned(&target());
        let mut rng = StdRng::seed_from_u64(1);
        let result = execute(&mut heist, &HeistRules::default(), Utc::now(), &mut rng);
        assert!(matches!(result, Err(HeistError::InvalidStatus { .. })));
        assert_eq!(heist.status, HeistStatus::Planning);
    }

    #[test]
    fn execution_outcomes_respect_invariants() {
        let rules = HeistRules::default();
        let mut rng = StdRng::seed_from_u64(42);
        let mut target = target();
        target.base_risk = 90;
        target.required_crew = 5;
        let mut seen = [false; 3];
        for _ in 0..400 {
            let (mut heist, _) = staffed(&target, 40);
            let Ok(resolution) = execute(&mut heist, &rules, Utc::now(), &mut rng) else {
                unreachable!("ready heist must execute");
            };
            assert_eq!(heist.status, HeistStatus::Completed);
            assert!(resolution.roll >= 0.0 && resolution.roll < 100.0);

            let mut all: Vec<CharacterId> = resolution.arrested.clone();
            all.extend(resolution.casualties.iter().copied());
            let before = all.len();
            all.sort();
            all.dedup();
            assert_eq!(all.len(), before, "arrests and casualties must be distinct");

            match resolution.outcome {
                HeistOutcome::Success => {
                    seen[0] = true;
                    assert!(resolution.payout >= dec!(20000) && resolution.payout <= dec!(40000));
                    assert!(resolution.arrested.is_empty());
                }
                HeistOutcome::PartialSuccess => {
                    seen[1] = true;
                    assert_eq!(resolution.payout, dec!(10000));
                    assert!((1..=3).contains(&resolution.arrested.len()));
                }
                HeistOutcome::Failure => {
                    seen[2] = true;
                    assert_eq!(resolution.payout, Decimal::ZERO);
                    assert_eq!(resolution.arrested.len(), 3);
                    assert!(resolution.casualties.len() <= 2);
                }
            }
        }
        assert!(seen.iter().all(|s| *s));
    }

    #[test]
    fn completed_heist_is_immutable() {
        let (mut heist, roster) = staffed(&target(), 50);
        let mut rng = StdRng::seed_from_u64(9);
        assert!(execute(&mut heist, &HeistRules::default(), Utc::now(), &mut rng).is_ok());
        let snapshot = heist.clone();
        assert!(cancel(&mut heist, Utc::now()).is_err());
        assert!(add_progress(&mut heist, 1).is_err());
        let first = roster.first().map(|m| m.character_id).unwrap_or_default();
        assert!(remove_member(&mut heist, first).is_err());
        assert_eq!(heist, snapshot);
    }

    #[test]
    fn cancel_half_staffed_planning_heist() {
        let mut target = target();
        target.required_crew = 4;
        let mut heist = planned(&target);
        let roster = members(2);
        for member in &roster {
            let assignment = CrewAssignment {
                member: member.character_id,
                role: HeistRole::Lookout,
                skill: 40,
            };
            assert!(assign_role(&mut heist, assignment, &roster).is_ok());
        }
        assert_eq!(heist.crew.len(), 2);
        assert_eq!(heist.status, HeistStatus::Planning);

        assert!(cancel(&mut heist, Utc::now()).is_ok());
        assert_eq!(heist.status, HeistStatus::Cancelled);
        assert!(heist.finished_at.is_some());
        assert!(!heist.status.is_active());
    }

    #[test]
    fn in_progress_heist_cannot_be_cancelled() {
        let (mut heist, _) = staffed(&target(), 50);
        heist.status = HeistStatus::InProgress;
        let snapshot = heist.clone();
        let result = cancel(&mut heist, Utc::now());
        assert!(result.is_err_and(|e| e.kind() == syndicate_types::ErrorKind::InvalidStateTransition));
        assert_eq!(heist, snapshot);
    }

    #[test]
    fn cancel_from_ready() {
        let (mut heist, _) = staffed(&target(), 50);
        assert!(cancel(&mut heist, Utc::now()).is_ok());
        assert_eq!(heist.status, HeistStatus::Cancelled);
        assert!(heist.finished_at.is_some());
    }
}
