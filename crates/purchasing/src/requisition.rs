use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use procureflow_approvals::{ApprovalChain, ApprovalOutcome, LevelDecision};
use procureflow_auth::Role;
use procureflow_core::{
    Actor, Aggregate, AggregateRoot, DomainError, Money, StatusChange, document_id, require_text,
};
use procureflow_events::{AuditRecord, Audited, Event};
use procureflow_sourcing::{MaterialRequestId, QuoteApprovalId, QuoteId, QuoteLine};
use procureflow_suppliers::SupplierId;

document_id!(
    /// Purchase requisition identifier.
    PurchaseRequisitionId
);

impl PurchaseRequisitionId {
    /// The requisition raised from an approved quote approval.
    pub fn for_approval(approval_id: QuoteApprovalId) -> Self {
        Self(approval_id.aggregate_id().derive("purchase_requisition"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequisitionStatus {
    PendingApproval,
    Approved,
    Rejected,
}

impl RequisitionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequisitionStatus::PendingApproval => "pending_approval",
            RequisitionStatus::Approved => "approved",
            RequisitionStatus::Rejected => "rejected",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        [Self::PendingApproval, Self::Approved, Self::Rejected]
            .into_iter()
            .find(|s| s.as_str() == value)
    }
}

/// Aggregate root: PurchaseRequisition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PurchaseRequisition {
    id: PurchaseRequisitionId,
    pr_number: String,
    mr_id: Option<MaterialRequestId>,
    quote_approval_id: Option<QuoteApprovalId>,
    quote_id: Option<QuoteId>,
    supplier_id: Option<SupplierId>,
    department: String,
    lines: Vec<QuoteLine>,
    amount: Option<Money>,
    chain: ApprovalChain,
    status: RequisitionStatus,
    history: Vec<StatusChange<RequisitionStatus>>,
    version: u64,
    #[serde(skip)]
    created: bool,
}

impl PurchaseRequisition {
    pub fn empty(id: PurchaseRequisitionId) -> Self {
        Self {
            id,
            pr_number: String::new(),
            mr_id: None,
            quote_approval_id: None,
            quote_id: None,
            supplier_id: None,
            department: String::new(),
            lines: Vec::new(),
            amount: None,
            chain: ApprovalChain::default(),
            status: RequisitionStatus::PendingApproval,
            history: Vec::new(),
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> PurchaseRequisitionId {
        self.id
    }

    pub fn pr_number(&self) -> &str {
        &self.pr_number
    }

    pub fn mr_id(&self) -> Option<MaterialRequestId> {
        self.mr_id
    }

    pub fn supplier_id(&self) -> Option<SupplierId> {
        self.supplier_id
    }

    pub fn department(&self) -> &str {
        &self.department
    }

    pub fn lines(&self) -> &[QuoteLine] {
        &self.lines
    }

    pub fn amount(&self) -> Option<&Money> {
        self.amount.as_ref()
    }

    pub fn chain(&self) -> &ApprovalChain {
        &self.chain
    }

    pub fn status(&self) -> RequisitionStatus {
        self.status
    }

    pub fn history(&self) -> &[StatusChange<RequisitionStatus>] {
        &self.history
    }
}

impl AggregateRoot for PurchaseRequisition {
    type Id = PurchaseRequisitionId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: CreateRequisition (automated, from an approved quote approval).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateRequisition {
    pub pr_id: PurchaseRequisitionId,
    pub pr_number: String,
    pub mr_id: MaterialRequestId,
    pub quote_approval_id: QuoteApprovalId,
    pub quote_id: QuoteId,
    pub supplier_id: SupplierId,
    pub department: String,
    pub lines: Vec<QuoteLine>,
    pub amount: Money,
    pub levels: Vec<Role>,
    pub actor: Actor,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApproveRequisition {
    pub pr_id: PurchaseRequisitionId,
    pub roles: Vec<Role>,
    pub comment: Option<String>,
    pub actor: Actor,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RejectRequisition {
    pub pr_id: PurchaseRequisitionId,
    pub roles: Vec<Role>,
    pub reason: String,
    pub actor: Actor,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RequisitionCommand {
    Create(CreateRequisition),
    Approve(ApproveRequisition),
    Reject(RejectRequisition),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequisitionCreated {
    pub pr_id: PurchaseRequisitionId,
    pub pr_number: String,
    pub mr_id: MaterialRequestId,
    pub quote_approval_id: QuoteApprovalId,
    pub quote_id: QuoteId,
    pub supplier_id: SupplierId,
    pub department: String,
    pub lines: Vec<QuoteLine>,
    pub amount: Money,
    pub chain: ApprovalChain,
    pub actor: Actor,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequisitionLevelDecided {
    pub pr_id: PurchaseRequisitionId,
    pub level: u32,
    pub decision: LevelDecision,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequisitionApproved {
    pub pr_id: PurchaseRequisitionId,
    pub mr_id: MaterialRequestId,
    pub actor: Actor,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequisitionRejected {
    pub pr_id: PurchaseRequisitionId,
    pub mr_id: MaterialRequestId,
    pub reason: String,
    pub actor: Actor,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RequisitionEvent {
    RequisitionCreated(RequisitionCreated),
    RequisitionLevelDecided(RequisitionLevelDecided),
    RequisitionApproved(RequisitionApproved),
    RequisitionRejected(RequisitionRejected),
}

impl Event for RequisitionEvent {
    fn event_type(&self) -> &'static str {
        match self {
            RequisitionEvent::RequisitionCreated(_) => "purchasing.requisition.created",
            RequisitionEvent::RequisitionLevelDecided(_) => "purchasing.requisition.level_decided",
            RequisitionEvent::RequisitionApproved(_) => "purchasing.requisition.approved",
            RequisitionEvent::RequisitionRejected(_) => "purchasing.requisition.rejected",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            RequisitionEvent::RequisitionCreated(e) => e.occurred_at,
            RequisitionEvent::RequisitionLevelDecided(e) => e.decision.decided_at,
            RequisitionEvent::RequisitionApproved(e) => e.occurred_at,
            RequisitionEvent::RequisitionRejected(e) => e.occurred_at,
        }
    }
}

impl Audited for RequisitionEvent {
    fn audit_record(&self) -> Option<AuditRecord> {
        let (status, actor, note) = match self {
            RequisitionEvent::RequisitionCreated(e) => {
                (RequisitionStatus::PendingApproval, &e.actor, None)
            }
            RequisitionEvent::RequisitionLevelDecided(_) => return None,
            RequisitionEvent::RequisitionApproved(e) => (RequisitionStatus::Approved, &e.actor, None),
            RequisitionEvent::RequisitionRejected(e) => {
                (RequisitionStatus::Rejected, &e.actor, Some(e.reason.clone()))
            }
        };
        Some(AuditRecord {
            status: status.as_str(),
            actor: actor.clone(),
            note,
        })
    }
}

impl Aggregate for PurchaseRequisition {
    type Command = RequisitionCommand;
    type Event = RequisitionEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            RequisitionEvent::RequisitionCreated(e) => {
                self.id = e.pr_id;
                self.pr_number = e.pr_number.clone();
                self.mr_id = Some(e.mr_id);
                self.quote_approval_id = Some(e.quote_approval_id);
                self.quote_id = Some(e.quote_id);
                self.supplier_id = Some(e.supplier_id);
                self.department = e.department.clone();
                self.lines = e.lines.clone();
                self.amount = Some(e.amount.clone());
                self.chain = e.chain.clone();
                self.status = RequisitionStatus::PendingApproval;
                self.history.push(StatusChange::initial(
                    RequisitionStatus::PendingApproval,
                    e.occurred_at,
                    &e.actor,
                ));
                self.created = true;
            }
            RequisitionEvent::RequisitionLevelDecided(e) => {
                self.chain.record(e.level, e.decision.clone());
            }
            RequisitionEvent::RequisitionApproved(e) => {
                self.move_to(RequisitionStatus::Approved, &e.actor, e.occurred_at, None)
            }
            RequisitionEvent::RequisitionRejected(e) => self.move_to(
                RequisitionStatus::Rejected,
                &e.actor,
                e.occurred_at,
                Some(e.reason.clone()),
            ),
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            RequisitionCommand::Create(cmd) => self.handle_create(cmd),
            RequisitionCommand::Approve(cmd) => self.handle_approve(cmd),
            RequisitionCommand::Reject(cmd) => self.handle_reject(cmd),
        }
    }
}

impl PurchaseRequisition {
    fn move_to(
        &mut self,
        to: RequisitionStatus,
        actor: &Actor,
        at: DateTime<Utc>,
        note: Option<String>,
    ) {
        self.history
            .push(StatusChange::transition(self.status, to, at, actor, note));
        self.status = to;
    }

    fn ensure_pending(&self, pr_id: PurchaseRequisitionId) -> Result<MaterialRequestId, DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        if self.id != pr_id {
            return Err(DomainError::invariant("pr_id mismatch"));
        }
        if self.status != RequisitionStatus::PendingApproval {
            return Err(DomainError::invariant(format!(
                "purchase requisition is already {}",
                self.status.as_str()
            )));
        }
        self.mr_id
            .ok_or_else(|| DomainError::invariant("purchase requisition has no material request"))
    }

    fn handle_create(&self, cmd: &CreateRequisition) -> Result<Vec<RequisitionEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("purchase requisition already exists"));
        }
        if cmd.lines.is_empty() {
            return Err(DomainError::validation("at least one line is required"));
        }
        let chain = ApprovalChain::from_roles(cmd.levels.clone())?;

        Ok(vec![RequisitionEvent::RequisitionCreated(RequisitionCreated {
            pr_id: cmd.pr_id,
            pr_number: cmd.pr_number.clone(),
            mr_id: cmd.mr_id,
            quote_approval_id: cmd.quote_approval_id,
            quote_id: cmd.quote_id,
            supplier_id: cmd.supplier_id,
            department: cmd.department.clone(),
            lines: cmd.lines.clone(),
            amount: cmd.amount.clone(),
            chain,
            actor: cmd.actor.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_approve(&self, cmd: &ApproveRequisition) -> Result<Vec<RequisitionEvent>, DomainError> {
        let mr_id = self.ensure_pending(cmd.pr_id)?;
        let level = self.chain.authorize_decision(&cmd.actor, &cmd.roles)?;

        let mut events = vec![RequisitionEvent::RequisitionLevelDecided(RequisitionLevelDecided {
            pr_id: cmd.pr_id,
            level,
            decision: LevelDecision {
                actor: cmd.actor.clone(),
                outcome: ApprovalOutcome::Approved,
                comment: cmd.comment.clone(),
                decided_at: cmd.occurred_at,
            },
        })];
        if self.chain.is_final_level(level) {
            events.push(RequisitionEvent::RequisitionApproved(RequisitionApproved {
                pr_id: cmd.pr_id,
                mr_id,
                actor: cmd.actor.clone(),
                occurred_at: cmd.occurred_at,
            }));
        }
        Ok(events)
    }

    fn handle_reject(&self, cmd: &RejectRequisition) -> Result<Vec<RequisitionEvent>, DomainError> {
        let mr_id = self.ensure_pending(cmd.pr_id)?;
        require_text("reason", &cmd.reason)?;
        let level = self.chain.authorize_decision(&cmd.actor, &cmd.roles)?;
        let reason = cmd.reason.trim().to_string();

        Ok(vec![
            RequisitionEvent::RequisitionLevelDecided(RequisitionLevelDecided {
                pr_id: cmd.pr_id,
                level,
                decision: LevelDecision {
                    actor: cmd.actor.clone(),
                    outcome: ApprovalOutcome::Rejected,
                    comment: Some(reason.clone()),
                    decided_at: cmd.occurred_at,
                },
            }),
            RequisitionEvent::RequisitionRejected(RequisitionRejected {
                pr_id: cmd.pr_id,
                mr_id,
                reason,
                actor: cmd.actor.clone(),
                occurred_at: cmd.occurred_at,
            }),
        ])
    }
}
