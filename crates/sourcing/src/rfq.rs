use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use procureflow_core::{
    Actor, Aggregate, AggregateRoot, DomainError, StatusChange, document_id, require_text,
};
use procureflow_events::{AuditRecord, Audited, Event};
use procureflow_suppliers::SupplierId;

use crate::material_request::{MaterialRequestId, RequestLine, normalize_lines};
use crate::quote::QuoteId;

document_id!(
    /// Request-for-quotation identifier.
    RfqId
);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RfqStatus {
    Draft,
    Sent,
    Closed,
    Cancelled,
}

impl RfqStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RfqStatus::Draft => "draft",
            RfqStatus::Sent => "sent",
            RfqStatus::Closed => "closed",
            RfqStatus::Cancelled => "cancelled",
        }
    }
}

/// A quote recorded against the RFQ.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceivedQuote {
    pub supplier_id: SupplierId,
    pub quote_id: QuoteId,
}

/// Aggregate root: Rfq.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Rfq {
    id: RfqId,
    rfq_number: String,
    mr_id: Option<MaterialRequestId>,
    title: String,
    lines: Vec<RequestLine>,
    invited_suppliers: Vec<SupplierId>,
    response_due: Option<DateTime<Utc>>,
    quotes: Vec<ReceivedQuote>,
    status: RfqStatus,
    history: Vec<StatusChange<RfqStatus>>,
    version: u64,
    #[serde(skip)]
    created: bool,
}

impl Rfq {
    pub fn empty(id: RfqId) -> Self {
        Self {
            id,
            rfq_number: String::new(),
            mr_id: None,
            title: String::new(),
            lines: Vec::new(),
            invited_suppliers: Vec::new(),
            response_due: None,
            quotes: Vec::new(),
            status: RfqStatus::Draft,
            history: Vec::new(),
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> RfqId {
        self.id
    }

    pub fn rfq_number(&self) -> &str {
        &self.rfq_number
    }

    pub fn mr_id(&self) -> Option<MaterialRequestId> {
        self.mr_id
    }

    pub fn lines(&self) -> &[RequestLine] {
        &self.lines
    }

    pub fn invited_suppliers(&self) -> &[SupplierId] {
        &self.invited_suppliers
    }

    pub fn response_due(&self) -> Option<DateTime<Utc>> {
        self.response_due
    }

    pub fn quotes(&self) -> &[ReceivedQuote] {
        &self.quotes
    }

    pub fn status(&self) -> RfqStatus {
        self.status
    }

    pub fn history(&self) -> &[StatusChange<RfqStatus>] {
        &self.history
    }

    pub fn is_invited(&self, supplier_id: SupplierId) -> bool {
        self.invited_suppliers.contains(&supplier_id)
    }
}

impl AggregateRoot for Rfq {
    type Id = RfqId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: CreateRfq.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateRfq {
    pub rfq_id: RfqId,
    pub rfq_number: String,
    pub mr_id: MaterialRequestId,
    pub title: String,
    pub lines: Vec<RequestLine>,
    pub supplier_ids: Vec<SupplierId>,
    pub response_due: DateTime<Utc>,
    pub actor: Actor,
    pub occurred_at: DateTime<Utc>,
}

/// Command: InviteSupplier (draft only).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InviteSupplier {
    pub rfq_id: RfqId,
    pub supplier_id: SupplierId,
    pub actor: Actor,
    pub occurred_at: DateTime<Utc>,
}

/// Command: SendRfq.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendRfq {
    pub rfq_id: RfqId,
    pub actor: Actor,
    pub occurred_at: DateTime<Utc>,
}

/// Command: RecordQuote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordQuote {
    pub rfq_id: RfqId,
    pub supplier_id: SupplierId,
    pub quote_id: QuoteId,
    pub actor: Actor,
    pub occurred_at: DateTime<Utc>,
}

/// Command: CloseRfq.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloseRfq {
    pub rfq_id: RfqId,
    pub actor: Actor,
    pub occurred_at: DateTime<Utc>,
}

/// Command: CancelRfq.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancelRfq {
    pub rfq_id: RfqId,
    pub reason: String,
    pub actor: Actor,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RfqCommand {
    Create(CreateRfq),
    InviteSupplier(InviteSupplier),
    Send(SendRfq),
    RecordQuote(RecordQuote),
    Close(CloseRfq),
    Cancel(CancelRfq),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RfqCreated {
    pub rfq_id: RfqId,
    pub rfq_number: String,
    pub mr_id: MaterialRequestId,
    pub title: String,
    pub lines: Vec<RequestLine>,
    pub supplier_ids: Vec<SupplierId>,
    pub response_due: DateTime<Utc>,
    pub actor: Actor,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupplierInvited {
    pub rfq_id: RfqId,
    pub supplier_id: SupplierId,
    pub actor: Actor,
    pub occurred_at: DateTime<Utc>,
}

/// Event: RfqSent. Carries the MR so the procurement flow can advance it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RfqSent {
    pub rfq_id: RfqId,
    pub mr_id: MaterialRequestId,
    pub actor: Actor,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuoteRecorded {
    pub rfq_id: RfqId,
    pub supplier_id: SupplierId,
    pub quote_id: QuoteId,
    pub actor: Actor,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RfqClosed {
    pub rfq_id: RfqId,
    pub actor: Actor,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RfqCancelled {
    pub rfq_id: RfqId,
    pub reason: String,
    pub actor: Actor,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RfqEvent {
    RfqCreated(RfqCreated),
    SupplierInvited(SupplierInvited),
    RfqSent(RfqSent),
    QuoteRecorded(QuoteRecorded),
    RfqClosed(RfqClosed),
    RfqCancelled(RfqCancelled),
}

impl Event for RfqEvent {
    fn event_type(&self) -> &'static str {
        match self {
            RfqEvent::RfqCreated(_) => "sourcing.rfq.created",
            RfqEvent::SupplierInvited(_) => "sourcing.rfq.supplier_invited",
            RfqEvent::RfqSent(_) => "sourcing.rfq.sent",
            RfqEvent::QuoteRecorded(_) => "sourcing.rfq.quote_recorded",
            RfqEvent::RfqClosed(_) => "sourcing.rfq.closed",
            RfqEvent::RfqCancelled(_) => "sourcing.rfq.cancelled",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            RfqEvent::RfqCreated(e) => e.occurred_at,
            RfqEvent::SupplierInvited(e) => e.occurred_at,
            RfqEvent::RfqSent(e) => e.occurred_at,
            RfqEvent::QuoteRecorded(e) => e.occurred_at,
            RfqEvent::RfqClosed(e) => e.occurred_at,
            RfqEvent::RfqCancelled(e) => e.occurred_at,
        }
    }
}

impl Audited for RfqEvent {
    fn audit_record(&self) -> Option<AuditRecord> {
        let (status, actor, note) = match self {
            RfqEvent::RfqCreated(e) => (RfqStatus::Draft, &e.actor, None),
            RfqEvent::RfqSent(e) => (RfqStatus::Sent, &e.actor, None),
            RfqEvent::RfqClosed(e) => (RfqStatus::Closed, &e.actor, None),
            RfqEvent::RfqCancelled(e) => (RfqStatus::Cancelled, &e.actor, Some(e.reason.clone())),
            RfqEvent::SupplierInvited(_) | RfqEvent::QuoteRecorded(_) => return None,
        };
        Some(AuditRecord {
            status: status.as_str(),
            actor: actor.clone(),
            note,
        })
    }
}

impl Aggregate for Rfq {
    type Command = RfqCommand;
    type Event = RfqEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            RfqEvent::RfqCreated(e) => {
                self.id = e.rfq_id;
                self.rfq_number = e.rfq_number.clone();
                self.mr_id = Some(e.mr_id);
                self.title = e.title.clone();
                self.lines = e.lines.clone();
                self.invited_suppliers = e.supplier_ids.clone();
                self.response_due = Some(e.response_due);
                self.status = RfqStatus::Draft;
                self.history
                    .push(StatusChange::initial(RfqStatus::Draft, e.occurred_at, &e.actor));
                self.created = true;
            }
            RfqEvent::SupplierInvited(e) => {
                self.invited_suppliers.push(e.supplier_id);
            }
            RfqEvent::RfqSent(e) => self.move_to(RfqStatus::Sent, &e.actor, e.occurred_at, None),
            RfqEvent::QuoteRecorded(e) => {
                self.quotes.push(ReceivedQuote {
                    supplier_id: e.supplier_id,
                    quote_id: e.quote_id,
                });
            }
            RfqEvent::RfqClosed(e) => {
                self.move_to(RfqStatus::Closed, &e.actor, e.occurred_at, None)
            }
            RfqEvent::RfqCancelled(e) => self.move_to(
                RfqStatus::Cancelled,
                &e.actor,
                e.occurred_at,
                Some(e.reason.clone()),
            ),
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            RfqCommand::Create(cmd) => self.handle_create(cmd),
            RfqCommand::InviteSupplier(cmd) => self.handle_invite(cmd),
            RfqCommand::Send(cmd) => self.handle_send(cmd),
            RfqCommand::RecordQuote(cmd) => self.handle_record_quote(cmd),
            RfqCommand::Close(cmd) => self.handle_close(cmd),
            RfqCommand::Cancel(cmd) => self.handle_cancel(cmd),
        }
    }
}

impl Rfq {
    fn move_to(
        &mut self,
        to: RfqStatus,
        actor: &Actor,
        at: DateTime<Utc>,
        note: Option<String>,
    ) {
        self.history
            .push(StatusChange::transition(self.status, to, at, actor, note));
        self.status = to;
    }

    fn ensure_exists(&self, rfq_id: RfqId) -> Result<(), DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        if self.id != rfq_id {
            return Err(DomainError::invariant("rfq_id mismatch"));
        }
        Ok(())
    }

    fn handle_create(&self, cmd: &CreateRfq) -> Result<Vec<RfqEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("rfq already exists"));
        }
        require_text("title", &cmd.title)?;
        let lines = normalize_lines(&cmd.lines)?;

        let mut supplier_ids: Vec<SupplierId> = Vec::with_capacity(cmd.supplier_ids.len());
        for id in &cmd.supplier_ids {
            if !supplier_ids.contains(id) {
                supplier_ids.push(*id);
            }
        }

        Ok(vec![RfqEvent::RfqCreated(RfqCreated {
            rfq_id: cmd.rfq_id,
            rfq_number: cmd.rfq_number.clone(),
            mr_id: cmd.mr_id,
            title: cmd.title.trim().to_string(),
            lines,
            supplier_ids,
            response_due: cmd.response_due,
            actor: cmd.actor.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_invite(&self, cmd: &InviteSupplier) -> Result<Vec<RfqEvent>, DomainError> {
        self.ensure_exists(cmd.rfq_id)?;
        if self.status != RfqStatus::Draft {
            return Err(DomainError::invariant("suppliers can only be invited to a draft rfq"));
        }
        if self.is_invited(cmd.supplier_id) {
            return Err(DomainError::conflict("supplier is already invited"));
        }

        Ok(vec![RfqEvent::SupplierInvited(SupplierInvited {
            rfq_id: cmd.rfq_id,
            supplier_id: cmd.supplier_id,
            actor: cmd.actor.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_send(&self, cmd: &SendRfq) -> Result<Vec<RfqEvent>, DomainError> {
        self.ensure_exists(cmd.rfq_id)?;
        if self.status != RfqStatus::Draft {
            return Err(DomainError::invariant("only draft rfqs can be sent"));
        }
        if self.invited_suppliers.is_empty() {
            return Err(DomainError::validation("invite at least one supplier before sending"));
        }
        if self.response_due.is_none_or(|due| due <= cmd.occurred_at) {
            return Err(DomainError::validation("response_due must be in the future"));
        }
        let mr_id = self
            .mr_id
            .ok_or_else(|| DomainError::invariant("rfq has no material request"))?;

        Ok(vec![RfqEvent::RfqSent(RfqSent {
            rfq_id: cmd.rfq_id,
            mr_id,
            actor: cmd.actor.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_record_quote(&self, cmd: &RecordQuote) -> Result<Vec<RfqEvent>, DomainError> {
        self.ensure_exists(cmd.rfq_id)?;

        if let Some(existing) = self.quotes.iter().find(|q| q.supplier_id == cmd.supplier_id) {
            if existing.quote_id == cmd.quote_id {
                return Ok(vec![]);
            }
            return Err(DomainError::conflict("supplier has already quoted on this rfq"));
        }
        if self.status != RfqStatus::Sent {
            return Err(DomainError::invariant("rfq is not open for quotes"));
        }
        if !self.is_invited(cmd.supplier_id) {
            return Err(DomainError::invariant("supplier was not invited to this rfq"));
        }
        if self.response_due.is_some_and(|due| cmd.occurred_at > due) {
            return Err(DomainError::invariant("rfq response deadline has passed"));
        }

        Ok(vec![RfqEvent::QuoteRecorded(QuoteRecorded {
            rfq_id: cmd.rfq_id,
            supplier_id: cmd.supplier_id,
            quote_id: cmd.quote_id,
            actor: cmd.actor.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_close(&self, cmd: &CloseRfq) -> Result<Vec<RfqEvent>, DomainError> {
        self.ensure_exists(cmd.rfq_id)?;
        if self.status != RfqStatus::Sent {
            return Err(DomainError::invariant("only sent rfqs can be closed"));
        }

        Ok(vec![RfqEvent::RfqClosed(RfqClosed {
            rfq_id: cmd.rfq_id,
            actor: cmd.actor.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_cancel(&self, cmd: &CancelRfq) -> Result<Vec<RfqEvent>, DomainError> {
        self.ensure_exists(cmd.rfq_id)?;
        require_text("reason", &cmd.reason)?;
        if !matches!(self.status, RfqStatus::Draft | RfqStatus::Sent) {
            return Err(DomainError::invariant(format!(
                "rfq cannot be cancelled when {}",
                self.status.as_str()
            )));
        }

        Ok(vec![RfqEvent::RfqCancelled(RfqCancelled {
            rfq_id: cmd.rfq_id,
            reason: cmd.reason.trim().to_string(),
            actor: cmd.actor.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use procureflow_core::AggregateId;
    use procureflow_events::execute;

    fn supplier() -> SupplierId {
        SupplierId::new(AggregateId::new())
    }

    fn quote_id() -> QuoteId {
        QuoteId::new(AggregateId::new())
    }

    fn draft_rfq(suppliers: Vec<SupplierId>) -> Rfq {
        let id = RfqId::new(AggregateId::new());
        let mut rfq = Rfq::empty(id);
        let now = Utc::now();
        let cmd = CreateRfq {
            rfq_id: id,
            rfq_number: "RFQ-2026-00001".to_string(),
            mr_id: MaterialRequestId::new(AggregateId::new()),
            title: "Pump spares".to_string(),
            lines: vec![RequestLine {
                line_no: 7,
                description: "Seal kit".to_string(),
                quantity: 4,
                unit: "ea".to_string(),
            }],
            supplier_ids: suppliers,
            response_due: now + Duration::days(7),
            actor: Actor::system(),
            occurred_at: now,
        };
        execute(&mut rfq, &RfqCommand::Create(cmd)).unwrap();
        rfq
    }

    fn send(rfq: &mut Rfq) -> Result<Vec<RfqEvent>, DomainError> {
        let cmd = SendRfq {
            rfq_id: rfq.id_typed(),
            actor: Actor::system(),
            occurred_at: Utc::now(),
        };
        execute(rfq, &RfqCommand::Send(cmd))
    }

    fn record(rfq: &Rfq, supplier_id: SupplierId, quote_id: QuoteId) -> RfqCommand {
        RfqCommand::RecordQuote(RecordQuote {
            rfq_id: rfq.id_typed(),
            supplier_id,
            quote_id,
            actor: Actor::system(),
            occurred_at: Utc::now(),
        })
    }

    #[test]
    fn create_deduplicates_suppliers_and_renumbers_lines() {
        let s = supplier();
        let rfq = draft_rfq(vec![s, s]);
        assert_eq!(rfq.invited_suppliers(), [s]);
        assert_eq!(rfq.lines()[0].line_no, 1);
    }

    #[test]
    fn send_requires_an_invited_supplier() {
        let mut rfq = draft_rfq(vec![]);
        assert!(matches!(send(&mut rfq), Err(DomainError::Validation(_))));

        let s = supplier();
        let invite = RfqCommand::InviteSupplier(InviteSupplier {
            rfq_id: rfq.id_typed(),
            supplier_id: s,
            actor: Actor::system(),
            occurred_at: Utc::now(),
        });
        execute(&mut rfq, &invite).unwrap();
        assert!(matches!(rfq.handle(&invite), Err(DomainError::Conflict(_))));

        let events = send(&mut rfq).unwrap();
        assert!(matches!(&events[0], RfqEvent::RfqSent(e) if Some(e.mr_id) == rfq.mr_id()));
        assert_eq!(rfq.status(), RfqStatus::Sent);
        assert!(matches!(rfq.handle(&invite), Err(DomainError::InvariantViolation(_))));
    }

    #[test]
    fn one_quote_per_invited_supplier() {
        let (a, b) = (supplier(), supplier());
        let mut rfq = draft_rfq(vec![a]);

        let q = quote_id();
        assert!(matches!(rfq.handle(&record(&rfq, a, q)), Err(DomainError::InvariantViolation(_))));

        send(&mut rfq).unwrap();
        let cmd = record(&rfq, a, q);
        execute(&mut rfq, &cmd).unwrap();
        // Re-delivery of the same quote is harmless.
        assert!(rfq.handle(&record(&rfq, a, q)).unwrap().is_empty());
        assert!(matches!(rfq.handle(&record(&rfq, a, quote_id())), Err(DomainError::Conflict(_))));
        assert!(matches!(rfq.handle(&record(&rfq, b, quote_id())), Err(DomainError::InvariantViolation(_))));
        assert_eq!(rfq.quotes().len(), 1);
    }

    #[test]
    fn quotes_after_deadline_are_rejected() {
        let a = supplier();
        let mut rfq = draft_rfq(vec![a]);
        send(&mut rfq).unwrap();

        let late = RfqCommand::RecordQuote(RecordQuote {
            rfq_id: rfq.id_typed(),
            supplier_id: a,
            quote_id: quote_id(),
            actor: Actor::system(),
            occurred_at: Utc::now() + Duration::days(8),
        });
        let err = rfq.handle(&late).unwrap_err();
        assert_eq!(err, DomainError::invariant("rfq response deadline has passed"));
    }

    #[test]
    fn close_and_cancel_follow_the_lifecycle() {
        let mut rfq = draft_rfq(vec![supplier()]);
        let close = RfqCommand::Close(CloseRfq {
            rfq_id: rfq.id_typed(),
            actor: Actor::system(),
            occurred_at: Utc::now(),
        });
        assert!(rfq.handle(&close).is_err());

        send(&mut rfq).unwrap();
        execute(&mut rfq, &close).unwrap();
        assert_eq!(rfq.status(), RfqStatus::Closed);

        let cancel = RfqCommand::Cancel(CancelRfq {
            rfq_id: rfq.id_typed(),
            reason: "budget cut".to_string(),
            actor: Actor::system(),
            occurred_at: Utc::now(),
        });
        assert!(matches!(rfq.handle(&cancel), Err(DomainError::InvariantViolation(_))));
        assert_eq!(rfq.history().len(), 3);
    }
}
