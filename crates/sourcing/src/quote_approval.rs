use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use procureflow_approvals::{ApprovalChain, ApprovalOutcome, LevelDecision};
use procureflow_auth::Role;
use procureflow_core::{
    Actor, Aggregate, AggregateRoot, DomainError, Money, StatusChange, document_id, require_text,
};
use procureflow_events::{AuditRecord, Audited, Event};
use procureflow_suppliers::SupplierId;

use crate::material_request::MaterialRequestId;
use crate::quote::QuoteId;
use crate::quote_pack::QuotePackId;
use crate::rfq::RfqId;

document_id!(
    /// Quote approval identifier.
    QuoteApprovalId
);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuoteApprovalStatus {
    Pending,
    Approved,
    Rejected,
}

impl QuoteApprovalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuoteApprovalStatus::Pending => "pending",
            QuoteApprovalStatus::Approved => "approved",
            QuoteApprovalStatus::Rejected => "rejected",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        [Self::Pending, Self::Approved, Self::Rejected]
            .into_iter()
            .find(|s| s.as_str() == value)
    }
}

/// Aggregate root: QuoteApproval.
///
/// The approval chain is snapshotted from the matrix when the approval is
/// requested; later matrix edits do not affect it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuoteApproval {
    id: QuoteApprovalId,
    approval_number: String,
    quote_pack_id: Option<QuotePackId>,
    rfq_id: Option<RfqId>,
    mr_id: Option<MaterialRequestId>,
    selected_quote_id: Option<QuoteId>,
    supplier_id: Option<SupplierId>,
    amount: Option<Money>,
    justification: Option<String>,
    requested_by: Option<Actor>,
    department: String,
    chain: ApprovalChain,
    status: QuoteApprovalStatus,
    history: Vec<StatusChange<QuoteApprovalStatus>>,
    version: u64,
    #[serde(skip)]
    created: bool,
}

impl QuoteApproval {
    pub fn empty(id: QuoteApprovalId) -> Self {
        Self {
            id,
            approval_number: String::new(),
            quote_pack_id: None,
            rfq_id: None,
            mr_id: None,
            selected_quote_id: None,
            supplier_id: None,
            amount: None,
            justification: None,
            requested_by: None,
            department: String::new(),
            chain: ApprovalChain::default(),
            status: QuoteApprovalStatus::Pending,
            history: Vec::new(),
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> QuoteApprovalId {
        self.id
    }

    pub fn approval_number(&self) -> &str {
        &self.approval_number
    }

    pub fn quote_pack_id(&self) -> Option<QuotePackId> {
        self.quote_pack_id
    }

    pub fn mr_id(&self) -> Option<MaterialRequestId> {
        self.mr_id
    }

    pub fn selected_quote_id(&self) -> Option<QuoteId> {
        self.selected_quote_id
    }

    pub fn supplier_id(&self) -> Option<SupplierId> {
        self.supplier_id
    }

    pub fn amount(&self) -> Option<&Money> {
        self.amount.as_ref()
    }

    pub fn department(&self) -> &str {
        &self.department
    }

    pub fn chain(&self) -> &ApprovalChain {
        &self.chain
    }

    pub fn status(&self) -> QuoteApprovalStatus {
        self.status
    }

    pub fn history(&self) -> &[StatusChange<QuoteApprovalStatus>] {
        &self.history
    }
}

impl AggregateRoot for QuoteApproval {
    type Id = QuoteApprovalId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: RequestQuoteApproval.
///
/// `lowest_quote_id` is the pack's lowest-total quote at request time;
/// selecting any other quote requires a justification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestQuoteApproval {
    pub approval_id: QuoteApprovalId,
    pub approval_number: String,
    pub quote_pack_id: QuotePackId,
    pub rfq_id: RfqId,
    pub mr_id: MaterialRequestId,
    pub selected_quote_id: QuoteId,
    pub lowest_quote_id: QuoteId,
    pub supplier_id: SupplierId,
    pub amount: Money,
    pub justification: Option<String>,
    pub department: String,
    pub levels: Vec<Role>,
    pub actor: Actor,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ApproveQuoteApproval (current level).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApproveQuoteApproval {
    pub approval_id: QuoteApprovalId,
    pub roles: Vec<Role>,
    pub comment: Option<String>,
    pub actor: Actor,
    pub occurred_at: DateTime<Utc>,
}

/// Command: RejectQuoteApproval (current level).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RejectQuoteApproval {
    pub approval_id: QuoteApprovalId,
    pub roles: Vec<Role>,
    pub reason: String,
    pub actor: Actor,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum QuoteApprovalCommand {
    Request(RequestQuoteApproval),
    Approve(ApproveQuoteApproval),
    Reject(RejectQuoteApproval),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuoteApprovalRequested {
    pub approval_id: QuoteApprovalId,
    pub approval_number: String,
    pub quote_pack_id: QuotePackId,
    pub rfq_id: RfqId,
    pub mr_id: MaterialRequestId,
    pub selected_quote_id: QuoteId,
    pub supplier_id: SupplierId,
    pub amount: Money,
    pub justification: Option<String>,
    pub department: String,
    pub chain: ApprovalChain,
    pub actor: Actor,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuoteApprovalLevelDecided {
    pub approval_id: QuoteApprovalId,
    pub level: u32,
    pub decision: LevelDecision,
}

/// Final approval. Carries what the procurement flow needs to follow up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuoteApprovalApproved {
    pub approval_id: QuoteApprovalId,
    pub quote_pack_id: QuotePackId,
    pub mr_id: MaterialRequestId,
    pub selected_quote_id: QuoteId,
    pub actor: Actor,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuoteApprovalRejected {
    pub approval_id: QuoteApprovalId,
    pub quote_pack_id: QuotePackId,
    pub reason: String,
    pub actor: Actor,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum QuoteApprovalEvent {
    QuoteApprovalRequested(QuoteApprovalRequested),
    QuoteApprovalLevelDecided(QuoteApprovalLevelDecided),
    QuoteApprovalApproved(QuoteApprovalApproved),
    QuoteApprovalRejected(QuoteApprovalRejected),
}

impl Event for QuoteApprovalEvent {
    fn event_type(&self) -> &'static str {
        match self {
            QuoteApprovalEvent::QuoteApprovalRequested(_) => "sourcing.quote_approval.requested",
            QuoteApprovalEvent::QuoteApprovalLevelDecided(_) => {
                "sourcing.quote_approval.level_decided"
            }
            QuoteApprovalEvent::QuoteApprovalApproved(_) => "sourcing.quote_approval.approved",
            QuoteApprovalEvent::QuoteApprovalRejected(_) => "sourcing.quote_approval.rejected",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            QuoteApprovalEvent::QuoteApprovalRequested(e) => e.occurred_at,
            QuoteApprovalEvent::QuoteApprovalLevelDecided(e) => e.decision.decided_at,
            QuoteApprovalEvent::QuoteApprovalApproved(e) => e.occurred_at,
            QuoteApprovalEvent::QuoteApprovalRejected(e) => e.occurred_at,
        }
    }
}

impl Audited for QuoteApprovalEvent {
    fn audit_record(&self) -> Option<AuditRecord> {
        let (status, actor, note) = match self {
            QuoteApprovalEvent::QuoteApprovalRequested(e) => {
                (QuoteApprovalStatus::Pending, &e.actor, e.justification.clone())
            }
            QuoteApprovalEvent::QuoteApprovalLevelDecided(_) => return None,
            QuoteApprovalEvent::QuoteApprovalApproved(e) => {
                (QuoteApprovalStatus::Approved, &e.actor, None)
            }
            QuoteApprovalEvent::QuoteApprovalRejected(e) => {
                (QuoteApprovalStatus::Rejected, &e.actor, Some(e.reason.clone()))
            }
        };
        Some(AuditRecord {
            status: status.as_str(),
            actor: actor.clone(),
            note,
        })
    }
}

impl Aggregate for QuoteApproval {
    type Command = QuoteApprovalCommand;
    type Event = QuoteApprovalEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            QuoteApprovalEvent::QuoteApprovalRequested(e) => {
                self.id = e.approval_id;
                self.approval_number = e.approval_number.clone();
                self.quote_pack_id = Some(e.quote_pack_id);
                self.rfq_id = Some(e.rfq_id);
                self.mr_id = Some(e.mr_id);
                self.selected_quote_id = Some(e.selected_quote_id);
                self.supplier_id = Some(e.supplier_id);
                self.amount = Some(e.amount.clone());
                self.justification = e.justification.clone();
                self.requested_by = Some(e.actor.clone());
                self.department = e.department.clone();
                self.chain = e.chain.clone();
                self.status = QuoteApprovalStatus::Pending;
                self.history.push(StatusChange::initial(
                    QuoteApprovalStatus::Pending,
                    e.occurred_at,
                    &e.actor,
                ));
                self.created = true;
            }
            QuoteApprovalEvent::QuoteApprovalLevelDecided(e) => {
                self.chain.record(e.level, e.decision.clone());
            }
            QuoteApprovalEvent::QuoteApprovalApproved(e) => {
                self.move_to(QuoteApprovalStatus::Approved, &e.actor, e.occurred_at, None)
            }
            QuoteApprovalEvent::QuoteApprovalRejected(e) => self.move_to(
                QuoteApprovalStatus::Rejected,
                &e.actor,
                e.occurred_at,
                Some(e.reason.clone()),
            ),
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            QuoteApprovalCommand::Request(cmd) => self.handle_request(cmd),
            QuoteApprovalCommand::Approve(cmd) => self.handle_approve(cmd),
            QuoteApprovalCommand::Reject(cmd) => self.handle_reject(cmd),
        }
    }
}

impl QuoteApproval {
    fn move_to(
        &mut self,
        to: QuoteApprovalStatus,
        actor: &Actor,
        at: DateTime<Utc>,
        note: Option<String>,
    ) {
        self.history
            .push(StatusChange::transition(self.status, to, at, actor, note));
        self.status = to;
    }

    fn ensure_pending(&self, approval_id: QuoteApprovalId) -> Result<(), DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        if self.id != approval_id {
            return Err(DomainError::invariant("approval_id mismatch"));
        }
        if self.status != QuoteApprovalStatus::Pending {
            return Err(DomainError::invariant(format!(
                "quote approval is already {}",
                self.status.as_str()
            )));
        }
        Ok(())
    }

    fn pack_and_mr(&self) -> Result<(QuotePackId, MaterialRequestId), DomainError> {
        match (self.quote_pack_id, self.mr_id) {
            (Some(pack), Some(mr)) => Ok((pack, mr)),
            _ => Err(DomainError::invariant("quote approval is missing its references")),
        }
    }

    fn handle_request(
        &self,
        cmd: &RequestQuoteApproval,
    ) -> Result<Vec<QuoteApprovalEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("quote approval already exists"));
        }
        let justification = cmd
            .justification
            .as_deref()
            .map(str::trim)
            .filter(|j| !j.is_empty())
            .map(str::to_string);
        if cmd.selected_quote_id != cmd.lowest_quote_id && justification.is_none() {
            return Err(DomainError::validation(
                "justification is required when the lowest quote is not selected",
            ));
        }
        let chain = ApprovalChain::from_roles(cmd.levels.clone())?;

        Ok(vec![QuoteApprovalEvent::QuoteApprovalRequested(QuoteApprovalRequested {
            approval_id: cmd.approval_id,
            approval_number: cmd.approval_number.clone(),
            quote_pack_id: cmd.quote_pack_id,
            rfq_id: cmd.rfq_id,
            mr_id: cmd.mr_id,
            selected_quote_id: cmd.selected_quote_id,
            supplier_id: cmd.supplier_id,
            amount: cmd.amount.clone(),
            justification,
            department: cmd.department.clone(),
            chain,
            actor: cmd.actor.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_approve(
        &self,
        cmd: &ApproveQuoteApproval,
    ) -> Result<Vec<QuoteApprovalEvent>, DomainError> {
        self.ensure_pending(cmd.approval_id)?;
        let level = self.chain.authorize_decision(&cmd.actor, &cmd.roles)?;

        let mut events = vec![QuoteApprovalEvent::QuoteApprovalLevelDecided(
            QuoteApprovalLevelDecided {
                approval_id: cmd.approval_id,
                level,
                decision: LevelDecision {
                    actor: cmd.actor.clone(),
                    outcome: ApprovalOutcome::Approved,
                    comment: cmd.comment.clone(),
                    decided_at: cmd.occurred_at,
                },
            },
        )];

        if self.chain.is_final_level(level) {
            let (quote_pack_id, mr_id) = self.pack_and_mr()?;
            let selected_quote_id = self
                .selected_quote_id
                .ok_or_else(|| DomainError::invariant("quote approval has no selected quote"))?;
            events.push(QuoteApprovalEvent::QuoteApprovalApproved(QuoteApprovalApproved {
                approval_id: cmd.approval_id,
                quote_pack_id,
                mr_id,
                selected_quote_id,
                actor: cmd.actor.clone(),
                occurred_at: cmd.occurred_at,
            }));
        }

        Ok(events)
    }

    fn handle_reject(
        &self,
        cmd: &RejectQuoteApproval,
    ) -> Result<Vec<QuoteApprovalEvent>, DomainError> {
        self.ensure_pending(cmd.approval_id)?;
        require_text("reason", &cmd.reason)?;
        let level = self.chain.authorize_decision(&cmd.actor, &cmd.roles)?;
        let (quote_pack_id, _) = self.pack_and_mr()?;
        let reason = cmd.reason.trim().to_string();

        Ok(vec![
            QuoteApprovalEvent::QuoteApprovalLevelDecided(QuoteApprovalLevelDecided {
                approval_id: cmd.approval_id,
                level,
                decision: LevelDecision {
                    actor: cmd.actor.clone(),
                    outcome: ApprovalOutcome::Rejected,
                    comment: Some(reason.clone()),
                    decided_at: cmd.occurred_at,
                },
            }),
            QuoteApprovalEvent::QuoteApprovalRejected(QuoteApprovalRejected {
                approval_id: cmd.approval_id,
                quote_pack_id,
                reason,
                actor: cmd.actor.clone(),
                occurred_at: cmd.occurred_at,
            }),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use procureflow_core::{AggregateId, Currency, UserId};
    use procureflow_events::execute;

    fn request_cmd(selected: QuoteId, lowest: QuoteId, levels: Vec<Role>) -> RequestQuoteApproval {
        RequestQuoteApproval {
            approval_id: QuoteApprovalId::new(AggregateId::new()),
            approval_number: "QA-2026-00001".to_string(),
            quote_pack_id: QuotePackId::new(AggregateId::new()),
            rfq_id: RfqId::new(AggregateId::new()),
            mr_id: MaterialRequestId::new(AggregateId::new()),
            selected_quote_id: selected,
            lowest_quote_id: lowest,
            supplier_id: SupplierId::new(AggregateId::new()),
            amount: Money::new(6_000_000, Currency::parse("USD").unwrap()),
            justification: None,
            department: "Maintenance".to_string(),
            levels,
            actor: Actor::new(UserId::new(), "buyer"),
            occurred_at: Utc::now(),
        }
    }

    fn requested(levels: Vec<Role>) -> QuoteApproval {
        let q = QuoteId::new(AggregateId::new());
        let cmd = request_cmd(q, q, levels);
        let mut approval = QuoteApproval::empty(cmd.approval_id);
        execute(&mut approval, &QuoteApprovalCommand::Request(cmd)).unwrap();
        approval
    }

    fn approve(approval: &mut QuoteApproval, who: &Actor, roles: &[Role]) -> Result<Vec<QuoteApprovalEvent>, DomainError> {
        let cmd = QuoteApprovalCommand::Approve(ApproveQuoteApproval {
            approval_id: approval.id_typed(),
            roles: roles.to_vec(),
            comment: None,
            actor: who.clone(),
            occurred_at: Utc::now(),
        });
        execute(approval, &cmd)
    }

    #[test]
    fn non_lowest_selection_needs_justification() {
        let selected = QuoteId::new(AggregateId::new());
        let lowest = QuoteId::new(AggregateId::new());
        let mut cmd = request_cmd(selected, lowest, vec![Role::PROCUREMENT_MANAGER]);
        let approval = QuoteApproval::empty(cmd.approval_id);

        let err = approval
            .handle(&QuoteApprovalCommand::Request(cmd.clone()))
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(msg) if msg.contains("justification")));

        cmd.justification = Some("faster delivery".to_string());
        assert_eq!(approval.handle(&QuoteApprovalCommand::Request(cmd)).unwrap().len(), 1);
    }

    #[test]
    fn final_level_emits_approved() {
        let mut approval = requested(vec![Role::PROCUREMENT_MANAGER, Role::DIRECTOR]);
        let pm = Actor::new(UserId::new(), "pm");
        let director = Actor::new(UserId::new(), "director");

        let events = approve(&mut approval, &pm, &[Role::PROCUREMENT_MANAGER]).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(approval.status(), QuoteApprovalStatus::Pending);

        let events = approve(&mut approval, &director, &[Role::DIRECTOR]).unwrap();
        match &events[1] {
            QuoteApprovalEvent::QuoteApprovalApproved(e) => {
                assert_eq!(Some(e.selected_quote_id), approval.selected_quote_id())
            }
            _ => panic!("Expected QuoteApprovalApproved event"),
        }
        assert_eq!(approval.status(), QuoteApprovalStatus::Approved);
        assert!(approval.chain().is_approved());

        let err = approve(&mut approval, &Actor::new(UserId::new(), "x"), &[Role::ADMIN]).unwrap_err();
        assert!(matches!(err, DomainError::InvariantViolation(_)));
    }

    #[test]
    fn wrong_role_is_unauthorized() {
        let mut approval = requested(vec![Role::PROCUREMENT_MANAGER]);
        let err = approve(&mut approval, &Actor::new(UserId::new(), "fm"), &[Role::FINANCE_MANAGER]).unwrap_err();
        assert!(matches!(err, DomainError::Unauthorized(_)));
        assert_eq!(approval.version(), 1);
    }

    #[test]
    fn reject_requires_reason_and_ends_approval() {
        let mut approval = requested(vec![Role::PROCUREMENT_MANAGER, Role::DIRECTOR]);
        let reject = |reason: &str| {
            QuoteApprovalCommand::Reject(RejectQuoteApproval {
                approval_id: approval.id_typed(),
                roles: vec![Role::PROCUREMENT_MANAGER],
                reason: reason.to_string(),
                actor: Actor::new(UserId::new(), "pm"),
                occurred_at: Utc::now(),
            })
        };
        assert!(matches!(approval.handle(&reject("")), Err(DomainError::Validation(_))));

        let cmd = reject("over budget");
        execute(&mut approval, &cmd).unwrap();
        assert_eq!(approval.status(), QuoteApprovalStatus::Rejected);
        assert!(approval.chain().is_rejected());
        assert_eq!(approval.history().last().unwrap().note.as_deref(), Some("over budget"));
    }
}
