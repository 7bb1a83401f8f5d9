use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use procureflow_core::{Actor, Aggregate, AggregateRoot, DomainError, Money, StatusChange, document_id};
use procureflow_events::{AuditRecord, Audited, Event};
use procureflow_suppliers::SupplierId;

use crate::material_request::MaterialRequestId;
use crate::quote::QuoteId;
use crate::quote_approval::QuoteApprovalId;
use crate::rfq::RfqId;

document_id!(
    /// Quote pack identifier (one pack per RFQ, derived from the RFQ id).
    QuotePackId
);

impl QuotePackId {
    pub fn for_rfq(rfq_id: RfqId) -> Self {
        Self(rfq_id.aggregate_id().derive("quote_pack"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuotePackStatus {
    Open,
    InApproval,
    Approved,
    Rejected,
}

impl QuotePackStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuotePackStatus::Open => "open",
            QuotePackStatus::InApproval => "in_approval",
            QuotePackStatus::Approved => "approved",
            QuotePackStatus::Rejected => "rejected",
        }
    }
}

/// A quote as seen by the comparison.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuoteSummary {
    pub quote_id: QuoteId,
    pub supplier_id: SupplierId,
    pub total: Money,
    pub max_lead_time_days: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankedQuote {
    pub rank: u32,
    #[serde(flatten)]
    pub summary: QuoteSummary,
    /// Amount above the lowest total, in minor units.
    pub delta_to_lowest_minor: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuoteComparison {
    pub ranked: Vec<RankedQuote>,
    pub lowest_total: Option<QuoteId>,
    pub fastest: Option<QuoteId>,
}

/// Rank quotes by total, then max lead time, then supplier id.
pub fn compare(entries: &[QuoteSummary]) -> QuoteComparison {
    let mut sorted: Vec<&QuoteSummary> = entries.iter().collect();
    sorted.sort_by(|a, b| {
        a.total
            .amount_minor
            .cmp(&b.total.amount_minor)
            .then(a.max_lead_time_days.cmp(&b.max_lead_time_days))
            .then(a.supplier_id.cmp(&b.supplier_id))
    });

    let lowest = sorted.first().map(|s| s.total.amount_minor).unwrap_or(0);
    let fastest = entries
        .iter()
        .min_by(|a, b| {
            a.max_lead_time_days
                .cmp(&b.max_lead_time_days)
                .then(a.total.amount_minor.cmp(&b.total.amount_minor))
                .then(a.supplier_id.cmp(&b.supplier_id))
        })
        .map(|s| s.quote_id);

    QuoteComparison {
        lowest_total: sorted.first().map(|s| s.quote_id),
        fastest,
        ranked: sorted
            .into_iter()
            .zip(1u32..)
            .map(|(summary, rank)| RankedQuote {
                rank,
                delta_to_lowest_minor: summary.total.amount_minor - lowest,
                summary: summary.clone(),
            })
            .collect(),
    }
}

/// Aggregate root: QuotePack.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuotePack {
    id: QuotePackId,
    rfq_id: Option<RfqId>,
    mr_id: Option<MaterialRequestId>,
    entries: Vec<QuoteSummary>,
    status: QuotePackStatus,
    approval_id: Option<QuoteApprovalId>,
    selected_quote_id: Option<QuoteId>,
    history: Vec<StatusChange<QuotePackStatus>>,
    version: u64,
    #[serde(skip)]
    created: bool,
}

impl QuotePack {
    pub fn empty(id: QuotePackId) -> Self {
        Self {
            id,
            rfq_id: None,
            mr_id: None,
            entries: Vec::new(),
            status: QuotePackStatus::Open,
            approval_id: None,
            selected_quote_id: None,
            history: Vec::new(),
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> QuotePackId {
        self.id
    }

    pub fn rfq_id(&self) -> Option<RfqId> {
        self.rfq_id
    }

    pub fn mr_id(&self) -> Option<MaterialRequestId> {
        self.mr_id
    }

    pub fn entries(&self) -> &[QuoteSummary] {
        &self.entries
    }

    pub fn entry(&self, quote_id: QuoteId) -> Option<&QuoteSummary> {
        self.entries.iter().find(|e| e.quote_id == quote_id)
    }

    pub fn status(&self) -> QuotePackStatus {
        self.status
    }

    pub fn approval_id(&self) -> Option<QuoteApprovalId> {
        self.approval_id
    }

    pub fn selected_quote_id(&self) -> Option<QuoteId> {
        self.selected_quote_id
    }

    pub fn history(&self) -> &[StatusChange<QuotePackStatus>] {
        &self.history
    }

    pub fn compare(&self) -> QuoteComparison {
        compare(&self.entries)
    }

    /// True while an approval on this pack is in progress.
    pub fn is_locked(&self) -> bool {
        self.status == QuotePackStatus::InApproval
    }
}

impl AggregateRoot for QuotePack {
    type Id = QuotePackId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: CreateQuotePack.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateQuotePack {
    pub pack_id: QuotePackId,
    pub rfq_id: RfqId,
    pub mr_id: MaterialRequestId,
    pub entries: Vec<QuoteSummary>,
    pub actor: Actor,
    pub occurred_at: DateTime<Utc>,
}

/// Command: StartApproval.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartApproval {
    pub pack_id: QuotePackId,
    pub approval_id: QuoteApprovalId,
    pub quote_id: QuoteId,
    pub actor: Actor,
    pub occurred_at: DateTime<Utc>,
}

/// Command: RecordDecision (automated, from the quote approval outcome).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordDecision {
    pub pack_id: QuotePackId,
    pub approval_id: QuoteApprovalId,
    pub approved: bool,
    pub actor: Actor,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum QuotePackCommand {
    Create(CreateQuotePack),
    StartApproval(StartApproval),
    RecordDecision(RecordDecision),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotePackCreated {
    pub pack_id: QuotePackId,
    pub rfq_id: RfqId,
    pub mr_id: MaterialRequestId,
    pub entries: Vec<QuoteSummary>,
    pub actor: Actor,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotePackApprovalStarted {
    pub pack_id: QuotePackId,
    pub approval_id: QuoteApprovalId,
    pub quote_id: QuoteId,
    pub actor: Actor,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotePackDecided {
    pub pack_id: QuotePackId,
    pub approval_id: QuoteApprovalId,
    pub approved: bool,
    pub actor: Actor,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum QuotePackEvent {
    QuotePackCreated(QuotePackCreated),
    QuotePackApprovalStarted(QuotePackApprovalStarted),
    QuotePackDecided(QuotePackDecided),
}

impl Event for QuotePackEvent {
    fn event_type(&self) -> &'static str {
        match self {
            QuotePackEvent::QuotePackCreated(_) => "sourcing.quote_pack.created",
            QuotePackEvent::QuotePackApprovalStarted(_) => "sourcing.quote_pack.approval_started",
            QuotePackEvent::QuotePackDecided(_) => "sourcing.quote_pack.decided",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            QuotePackEvent::QuotePackCreated(e) => e.occurred_at,
            QuotePackEvent::QuotePackApprovalStarted(e) => e.occurred_at,
            QuotePackEvent::QuotePackDecided(e) => e.occurred_at,
        }
    }
}

fn decided_status(approved: bool) -> QuotePackStatus {
    if approved {
        QuotePackStatus::Approved
    } else {
        QuotePackStatus::Rejected
    }
}

impl Audited for QuotePackEvent {
    fn audit_record(&self) -> Option<AuditRecord> {
        let (status, actor) = match self {
            QuotePackEvent::QuotePackCreated(e) => (QuotePackStatus::Open, &e.actor),
            QuotePackEvent::QuotePackApprovalStarted(e) => (QuotePackStatus::InApproval, &e.actor),
            QuotePackEvent::QuotePackDecided(e) => (decided_status(e.approved), &e.actor),
        };
        Some(AuditRecord {
            status: status.as_str(),
            actor: actor.clone(),
            note: None,
        })
    }
}

impl Aggregate for QuotePack {
    type Command = QuotePackCommand;
    type Event = QuotePackEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            QuotePackEvent::QuotePackCreated(e) => {
                self.id = e.pack_id;
                self.rfq_id = Some(e.rfq_id);
                self.mr_id = Some(e.mr_id);
                self.entries = e.entries.clone();
                self.status = QuotePackStatus::Open;
                self.history
                    .push(StatusChange::initial(QuotePackStatus::Open, e.occurred_at, &e.actor));
                self.created = true;
            }
            QuotePackEvent::QuotePackApprovalStarted(e) => {
                self.approval_id = Some(e.approval_id);
                self.selected_quote_id = Some(e.quote_id);
                self.move_to(QuotePackStatus::InApproval, &e.actor, e.occurred_at);
            }
            QuotePackEvent::QuotePackDecided(e) => {
                self.move_to(decided_status(e.approved), &e.actor, e.occurred_at);
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            QuotePackCommand::Create(cmd) => self.handle_create(cmd),
            QuotePackCommand::StartApproval(cmd) => self.handle_start_approval(cmd),
            QuotePackCommand::RecordDecision(cmd) => self.handle_record_decision(cmd),
        }
    }
}

impl QuotePack {
    fn move_to(&mut self, to: QuotePackStatus, actor: &Actor, at: DateTime<Utc>) {
        self.history
            .push(StatusChange::transition(self.status, to, at, actor, None));
        self.status = to;
    }

    fn ensure_exists(&self, pack_id: QuotePackId) -> Result<(), DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        if self.id != pack_id {
            return Err(DomainError::invariant("pack_id mismatch"));
        }
        Ok(())
    }

    fn handle_create(&self, cmd: &CreateQuotePack) -> Result<Vec<QuotePackEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("quote pack already exists for this rfq"));
        }
        let Some(first) = cmd.entries.first() else {
            return Err(DomainError::validation("a quote pack needs at least one quote"));
        };
        for (idx, entry) in cmd.entries.iter().enumerate() {
            if entry.total.currency != first.total.currency {
                return Err(DomainError::validation(format!(
                    "all quotes must share one currency ({} vs {})",
                    first.total.currency, entry.total.currency
                )));
            }
            if cmd.entries[..idx].iter().any(|e| e.quote_id == entry.quote_id) {
                return Err(DomainError::validation(format!(
                    "quote {} appears twice",
                    entry.quote_id
                )));
            }
        }

        Ok(vec![QuotePackEvent::QuotePackCreated(QuotePackCreated {
            pack_id: cmd.pack_id,
            rfq_id: cmd.rfq_id,
            mr_id: cmd.mr_id,
            entries: cmd.entries.clone(),
            actor: cmd.actor.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_start_approval(
        &self,
        cmd: &StartApproval,
    ) -> Result<Vec<QuotePackEvent>, DomainError> {
        self.ensure_exists(cmd.pack_id)?;
        if !matches!(self.status, QuotePackStatus::Open | QuotePackStatus::Rejected) {
            return Err(DomainError::invariant(format!(
                "quote pack is {}",
                self.status.as_str()
            )));
        }
        if self.entry(cmd.quote_id).is_none() {
            return Err(DomainError::validation("selected quote is not part of this pack"));
        }

        Ok(vec![QuotePackEvent::QuotePackApprovalStarted(QuotePackApprovalStarted {
            pack_id: cmd.pack_id,
            approval_id: cmd.approval_id,
            quote_id: cmd.quote_id,
            actor: cmd.actor.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_record_decision(
        &self,
        cmd: &RecordDecision,
    ) -> Result<Vec<QuotePackEvent>, DomainError> {
        self.ensure_exists(cmd.pack_id)?;
        if self.approval_id != Some(cmd.approval_id) {
            return Err(DomainError::invariant("decision is for a different approval"));
        }
        if self.status == decided_status(cmd.approved) {
            return Ok(vec![]);
        }
        if self.status != QuotePackStatus::InApproval {
            return Err(DomainError::invariant(format!(
                "quote pack is {}",
                self.status.as_str()
            )));
        }

        Ok(vec![QuotePackEvent::QuotePackDecided(QuotePackDecided {
            pack_id: cmd.pack_id,
            approval_id: cmd.approval_id,
            approved: cmd.approved,
            actor: cmd.actor.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }
}
