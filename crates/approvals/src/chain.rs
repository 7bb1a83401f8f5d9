use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use procureflow_auth::Role;
use procureflow_core::{Actor, DomainError, DomainResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApprovalOutcome {
    Approved,
    Rejected,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelDecision {
    pub actor: Actor,
    pub outcome: ApprovalOutcome,
    pub comment: Option<String>,
    pub decided_at: DateTime<Utc>,
}

/// One step of a chain. Levels are numbered from 1.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalLevel {
    pub level: u32,
    pub role: Role,
    pub decision: Option<LevelDecision>,
}

/// Ordered approval levels snapshotted from the authorization matrix.
///
/// Levels are decided strictly in order. Any rejection ends the chain.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalChain {
    levels: Vec<ApprovalLevel>,
}

impl ApprovalChain {
    pub fn from_roles(roles: Vec<Role>) -> DomainResult<Self> {
        if roles.is_empty() {
            return Err(DomainError::validation("approval chain needs at least one level"));
        }
        let levels = roles
            .into_iter()
            .zip(1u32..)
            .map(|(role, level)| ApprovalLevel {
                level,
                role,
                decision: None,
            })
            .collect();
        Ok(Self { levels })
    }

    pub fn levels(&self) -> &[ApprovalLevel] {
        &self.levels
    }

    pub fn is_rejected(&self) -> bool {
        self.levels.iter().any(|l| {
            l.decision
                .as_ref()
                .is_some_and(|d| d.outcome == ApprovalOutcome::Rejected)
        })
    }

    pub fn is_approved(&self) -> bool {
        !self.levels.is_empty()
            && self.levels.iter().all(|l| {
                l.decision
                    .as_ref()
                    .is_some_and(|d| d.outcome == ApprovalOutcome::Approved)
            })
    }

    /// The first undecided level, or `None` once the chain is finished.
    pub fn current_level(&self) -> Option<&ApprovalLevel> {
        if self.is_rejected() {
            return None;
        }
        self.levels.iter().find(|l| l.decision.is_none())
    }

    /// Check that `actor` (holding `roles`) may decide the current level and
    /// return that level's number.
    ///
    /// `admin` may decide any level. An actor who already decided one level
    /// of this chain may not decide another.
    pub fn authorize_decision(&self, actor: &Actor, roles: &[Role]) -> DomainResult<u32> {
        let current = self
            .current_level()
            .ok_or_else(|| DomainError::invariant("approval chain is already complete"))?;

        let holds_role = roles.iter().any(|r| r == &current.role || r.is_admin());
        if !holds_role {
            return Err(DomainError::unauthorized(format!(
                "level {} must be decided by role '{}'",
                current.level, current.role
            )));
        }

        let already_decided = self.levels.iter().any(|l| {
            l.decision
                .as_ref()
                .is_some_and(|d| d.actor.user_id == actor.user_id)
        });
        if already_decided {
            return Err(DomainError::unauthorized(
                "the same approver cannot decide more than one level",
            ));
        }

        Ok(current.level)
    }

    /// Record a decision on `level` (callers validate with
    /// [`authorize_decision`](Self::authorize_decision) first).
    pub fn record(&mut self, level: u32, decision: LevelDecision) {
        if let Some(l) = self.levels.iter_mut().find(|l| l.level == level) {
            l.decision = Some(decision);
        }
    }

    /// Whether approving `level` would complete the chain.
    pub fn is_final_level(&self, level: u32) -> bool {
        self.levels.last().is_some_and(|l| l.level == level)
    }
}

#[cfg(test)]
mod tests {
    use procureflow_core::UserId;

    use super::*;

    fn actor(name: &str) -> Actor {
        Actor::new(UserId::new(), name)
    }

    fn decide(chain: &mut ApprovalChain, who: &Actor, roles: &[Role], outcome: ApprovalOutcome) -> DomainResult<u32> {
        let level = chain.authorize_decision(who, roles)?;
        chain.record(
            level,
            LevelDecision {
                actor: who.clone(),
                outcome,
                comment: None,
                decided_at: Utc::now(),
            },
        );
        Ok(level)
    }

    fn two_level_chain() -> ApprovalChain {
        ApprovalChain::from_roles(vec![Role::PROCUREMENT_MANAGER, Role::FINANCE_MANAGER]).unwrap()
    }

    #[test]
    fn levels_are_decided_in_order() {
        let mut chain = two_level_chain();
        let pm = actor("pm");
        let fm = actor("fm");

        // Finance cannot jump ahead of procurement.
        let err = decide(&mut chain, &fm, &[Role::FINANCE_MANAGER], ApprovalOutcome::Approved).unwrap_err();
        assert!(matches!(err, DomainError::Unauthorized(_)));

        assert_eq!(decide(&mut chain, &pm, &[Role::PROCUREMENT_MANAGER], ApprovalOutcome::Approved).unwrap(), 1);
        assert!(!chain.is_approved());
        assert_eq!(chain.current_level().unwrap().level, 2);

        assert_eq!(decide(&mut chain, &fm, &[Role::FINANCE_MANAGER], ApprovalOutcome::Approved).unwrap(), 2);
        assert!(chain.is_approved());
        assert!(chain.current_level().is_none());
    }

    #[test]
    fn one_actor_cannot_sign_two_levels() {
        let mut chain = two_level_chain();
        let both = actor("both");
        let roles = [Role::PROCUREMENT_MANAGER, Role::FINANCE_MANAGER];

        decide(&mut chain, &both, &roles, ApprovalOutcome::Approved).unwrap();
        let err = decide(&mut chain, &both, &roles, ApprovalOutcome::Approved).unwrap_err();
        assert!(matches!(err, DomainError::Unauthorized(msg) if msg.contains("more than one level")));
    }

    #[test]
    fn rejection_ends_the_chain() {
        let mut chain = two_level_chain();
        decide(&mut chain, &actor("pm"), &[Role::PROCUREMENT_MANAGER], ApprovalOutcome::Rejected).unwrap();

        assert!(chain.is_rejected());
        assert!(!chain.is_approved());
        assert!(chain.current_level().is_none());
        let err = chain.authorize_decision(&actor("fm"), &[Role::FINANCE_MANAGER]).unwrap_err();
        assert!(matches!(err, DomainError::InvariantViolation(_)));
    }

    #[test]
    fn admin_may_decide_any_level() {
        let chain = two_level_chain();
        assert_eq!(chain.authorize_decision(&actor("root"), &[Role::ADMIN]).unwrap(), 1);
    }

    #[test]
    fn empty_chain_is_rejected() {
        assert!(ApprovalChain::from_roles(vec![]).is_err());
    }
}
