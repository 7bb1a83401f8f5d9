use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use procureflow_core::{
    Actor, Aggregate, AggregateRoot, Currency, DomainError, DomainResult, Money, StatusChange,
    document_id, require_text,
};
use procureflow_events::{AuditRecord, Audited, Event};
use procureflow_suppliers::SupplierId;

use crate::material_request::MaterialRequestId;
use crate::rfq::RfqId;

document_id!(
    /// Supplier quote identifier.
    QuoteId
);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuoteStatus {
    Submitted,
    Accepted,
    Rejected,
    Withdrawn,
}

impl QuoteStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuoteStatus::Submitted => "submitted",
            QuoteStatus::Accepted => "accepted",
            QuoteStatus::Rejected => "rejected",
            QuoteStatus::Withdrawn => "withdrawn",
        }
    }
}

/// Priced line of a quote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuoteLine {
    #[serde(default)]
    pub line_no: u32,
    pub description: String,
    pub quantity: u64,
    pub unit_price_minor: u64,
    #[serde(default)]
    pub lead_time_days: u32,
}

/// Σ quantity × unit price over `lines`, failing on overflow.
pub fn lines_total(lines: &[QuoteLine], currency: &Currency) -> DomainResult<Money> {
    lines.iter().try_fold(Money::zero(currency.clone()), |acc, line| {
        acc.checked_add(&Money::line_total(
            line.quantity,
            line.unit_price_minor,
            currency,
        )?)
    })
}

/// Aggregate root: Quote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Quote {
    id: QuoteId,
    quote_number: String,
    rfq_id: Option<RfqId>,
    mr_id: Option<MaterialRequestId>,
    supplier_id: Option<SupplierId>,
    lines: Vec<QuoteLine>,
    total: Option<Money>,
    valid_until: Option<NaiveDate>,
    notes: Option<String>,
    status: QuoteStatus,
    history: Vec<StatusChange<QuoteStatus>>,
    version: u64,
    #[serde(skip)]
    created: bool,
}

impl Quote {
    pub fn empty(id: QuoteId) -> Self {
        Self {
            id,
            quote_number: String::new(),
            rfq_id: None,
            mr_id: None,
            supplier_id: None,
            lines: Vec::new(),
            total: None,
            valid_until: None,
            notes: None,
            status: QuoteStatus::Submitted,
            history: Vec::new(),
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> QuoteId {
        self.id
    }

    pub fn quote_number(&self) -> &str {
        &self.quote_number
    }

    pub fn rfq_id(&self) -> Option<RfqId> {
        self.rfq_id
    }

    pub fn mr_id(&self) -> Option<MaterialRequestId> {
        self.mr_id
    }

    pub fn supplier_id(&self) -> Option<SupplierId> {
        self.supplier_id
    }

    pub fn lines(&self) -> &[QuoteLine] {
        &self.lines
    }

    /// Quoted total; `None` until submitted.
    pub fn total(&self) -> Option<&Money> {
        self.total.as_ref()
    }

    pub fn max_lead_time_days(&self) -> u32 {
        self.lines.iter().map(|l| l.lead_time_days).max().unwrap_or(0)
    }

    pub fn status(&self) -> QuoteStatus {
        self.status
    }

    pub fn history(&self) -> &[StatusChange<QuoteStatus>] {
        &self.history
    }

    pub fn is_created(&self) -> bool {
        self.created
    }
}

impl AggregateRoot for Quote {
    type Id = QuoteId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: SubmitQuote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitQuote {
    pub quote_id: QuoteId,
    pub quote_number: String,
    pub rfq_id: RfqId,
    pub mr_id: MaterialRequestId,
    pub supplier_id: SupplierId,
    pub currency: Currency,
    pub lines: Vec<QuoteLine>,
    pub valid_until: NaiveDate,
    pub notes: Option<String>,
    pub actor: Actor,
    pub occurred_at: DateTime<Utc>,
}

/// Command: WithdrawQuote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WithdrawQuote {
    pub quote_id: QuoteId,
    pub reason: Option<String>,
    pub actor: Actor,
    pub occurred_at: DateTime<Utc>,
}

/// Command: AcceptQuote (automated).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AcceptQuote {
    pub quote_id: QuoteId,
    pub actor: Actor,
    pub occurred_at: DateTime<Utc>,
}

/// Command: RejectQuote (automated).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RejectQuote {
    pub quote_id: QuoteId,
    pub reason: String,
    pub actor: Actor,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum QuoteCommand {
    Submit(SubmitQuote),
    Withdraw(WithdrawQuote),
    Accept(AcceptQuote),
    Reject(RejectQuote),
}

/// Event: QuoteSubmitted. `total` is computed at submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuoteSubmitted {
    pub quote_id: QuoteId,
    pub quote_number: String,
    pub rfq_id: RfqId,
    pub mr_id: MaterialRequestId,
    pub supplier_id: SupplierId,
    pub lines: Vec<QuoteLine>,
    pub total: Money,
    pub valid_until: NaiveDate,
    pub notes: Option<String>,
    pub actor: Actor,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuoteWithdrawn {
    pub quote_id: QuoteId,
    pub reason: Option<String>,
    pub actor: Actor,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuoteAccepted {
    pub quote_id: QuoteId,
    pub actor: Actor,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuoteRejected {
    pub quote_id: QuoteId,
    pub reason: String,
    pub actor: Actor,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum QuoteEvent {
    QuoteSubmitted(QuoteSubmitted),
    QuoteWithdrawn(QuoteWithdrawn),
    QuoteAccepted(QuoteAccepted),
    QuoteRejected(QuoteRejected),
}

impl Event for QuoteEvent {
    fn event_type(&self) -> &'static str {
        match self {
            QuoteEvent::QuoteSubmitted(_) => "sourcing.quote.submitted",
            QuoteEvent::QuoteWithdrawn(_) => "sourcing.quote.withdrawn",
            QuoteEvent::QuoteAccepted(_) => "sourcing.quote.accepted",
            QuoteEvent::QuoteRejected(_) => "sourcing.quote.rejected",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            QuoteEvent::QuoteSubmitted(e) => e.occurred_at,
            QuoteEvent::QuoteWithdrawn(e) => e.occurred_at,
            QuoteEvent::QuoteAccepted(e) => e.occurred_at,
            QuoteEvent::QuoteRejected(e) => e.occurred_at,
        }
    }
}

impl Audited for QuoteEvent {
    fn audit_record(&self) -> Option<AuditRecord> {
        let (status, actor, note) = match self {
            QuoteEvent::QuoteSubmitted(e) => (QuoteStatus::Submitted, &e.actor, None),
            QuoteEvent::QuoteWithdrawn(e) => (QuoteStatus::Withdrawn, &e.actor, e.reason.clone()),
            QuoteEvent::QuoteAccepted(e) => (QuoteStatus::Accepted, &e.actor, None),
            QuoteEvent::QuoteRejected(e) => (QuoteStatus::Rejected, &e.actor, Some(e.reason.clone())),
        };
        Some(AuditRecord {
            status: status.as_str(),
            actor: actor.clone(),
            note,
        })
    }
}

impl Aggregate for Quote {
    type Command = QuoteCommand;
    type Event = QuoteEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            QuoteEvent::QuoteSubmitted(e) => {
                self.id = e.quote_id;
                self.quote_number = e.quote_number.clone();
                self.rfq_id = Some(e.rfq_id);
                self.mr_id = Some(e.mr_id);
                self.supplier_id = Some(e.supplier_id);
                self.lines = e.lines.clone();
                self.total = Some(e.total.clone());
                self.valid_until = Some(e.valid_until);
                self.notes = e.notes.clone();
                self.status = QuoteStatus::Submitted;
                self.history
                    .push(StatusChange::initial(QuoteStatus::Submitted, e.occurred_at, &e.actor));
                self.created = true;
            }
            QuoteEvent::QuoteWithdrawn(e) => {
                self.move_to(QuoteStatus::Withdrawn, &e.actor, e.occurred_at, e.reason.clone())
            }
            QuoteEvent::QuoteAccepted(e) => {
                self.move_to(QuoteStatus::Accepted, &e.actor, e.occurred_at, None)
            }
            QuoteEvent::QuoteRejected(e) => self.move_to(
                QuoteStatus::Rejected,
                &e.actor,
                e.occurred_at,
                Some(e.reason.clone()),
            ),
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            QuoteCommand::Submit(cmd) => self.handle_submit(cmd),
            QuoteCommand::Withdraw(cmd) => self.handle_withdraw(cmd),
            QuoteCommand::Accept(cmd) => self.handle_accept(cmd),
            QuoteCommand::Reject(cmd) => self.handle_reject(cmd),
        }
    }
}

impl Quote {
    fn move_to(
        &mut self,
        to: QuoteStatus,
        actor: &Actor,
        at: DateTime<Utc>,
        note: Option<String>,
    ) {
        self.history
            .push(StatusChange::transition(self.status, to, at, actor, note));
        self.status = to;
    }

    fn ensure_exists(&self, quote_id: QuoteId) -> Result<(), DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        if self.id != quote_id {
            return Err(DomainError::invariant("quote_id mismatch"));
        }
        Ok(())
    }

    /// Accept/reject share this guard: only a submitted quote can be decided,
    /// and repeating the decision it already has is a no-op.
    fn ensure_decidable(&self, target: QuoteStatus) -> Result<bool, DomainError> {
        if self.status == target {
            return Ok(false);
        }
        if self.status != QuoteStatus::Submitted {
            return Err(DomainError::invariant(format!(
                "quote is {} and cannot become {}",
                self.status.as_str(),
                target.as_str()
            )));
        }
        Ok(true)
    }

    fn handle_submit(&self, cmd: &SubmitQuote) -> Result<Vec<QuoteEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("quote already exists"));
        }
        if cmd.lines.is_empty() {
            return Err(DomainError::validation("at least one line is required"));
        }
        if cmd.valid_until < cmd.occurred_at.date_naive() {
            return Err(DomainError::validation("valid_until cannot be in the past"));
        }

        let mut lines = Vec::with_capacity(cmd.lines.len());
        for (line, line_no) in cmd.lines.iter().zip(1u32..) {
            require_text(&format!("lines[{line_no}].description"), &line.description)?;
            if line.quantity == 0 {
                return Err(DomainError::validation(format!(
                    "lines[{line_no}].quantity must be positive"
                )));
            }
            lines.push(QuoteLine {
                line_no,
                description: line.description.trim().to_string(),
                ..line.clone()
            });
        }
        let total = lines_total(&lines, &cmd.currency)?;

        Ok(vec![QuoteEvent::QuoteSubmitted(QuoteSubmitted {
            quote_id: cmd.quote_id,
            quote_number: cmd.quote_number.clone(),
            rfq_id: cmd.rfq_id,
            mr_id: cmd.mr_id,
            supplier_id: cmd.supplier_id,
            lines,
            total,
            valid_until: cmd.valid_until,
            notes: cmd.notes.clone(),
            actor: cmd.actor.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_withdraw(&self, cmd: &WithdrawQuote) -> Result<Vec<QuoteEvent>, DomainError> {
        self.ensure_exists(cmd.quote_id)?;
        if self.status != QuoteStatus::Submitted {
            return Err(DomainError::invariant("only submitted quotes can be withdrawn"));
        }

        Ok(vec![QuoteEvent::QuoteWithdrawn(QuoteWithdrawn {
            quote_id: cmd.quote_id,
            reason: cmd.reason.clone(),
            actor: cmd.actor.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_accept(&self, cmd: &AcceptQuote) -> Result<Vec<QuoteEvent>, DomainError> {
        self.ensure_exists(cmd.quote_id)?;
        if !self.ensure_decidable(QuoteStatus::Accepted)? {
            return Ok(vec![]);
        }

        Ok(vec![QuoteEvent::QuoteAccepted(QuoteAccepted {
            quote_id: cmd.quote_id,
            actor: cmd.actor.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_reject(&self, cmd: &RejectQuote) -> Result<Vec<QuoteEvent>, DomainError> {
        self.ensure_exists(cmd.quote_id)?;
        if !self.ensure_decidable(QuoteStatus::Rejected)? {
            return Ok(vec![]);
        }

        Ok(vec![QuoteEvent::QuoteRejected(QuoteRejected {
            quote_id: cmd.quote_id,
            reason: cmd.reason.clone(),
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

    fn qline(quantity: u64, unit_price_minor: u64, lead_time_days: u32) -> QuoteLine {
        QuoteLine {
            line_no: 0,
            description: "Seal kit".to_string(),
            quantity,
            unit_price_minor,
            lead_time_days,
        }
    }

    fn submit_cmd(id: QuoteId, lines: Vec<QuoteLine>) -> SubmitQuote {
        let now = Utc::now();
        SubmitQuote {
            quote_id: id,
            quote_number: "QT-2026-00001".to_string(),
            rfq_id: RfqId::new(AggregateId::new()),
            mr_id: MaterialRequestId::new(AggregateId::new()),
            supplier_id: SupplierId::new(AggregateId::new()),
            currency: Currency::parse("USD").unwrap(),
            lines,
            valid_until: (now + Duration::days(30)).date_naive(),
            notes: None,
            actor: Actor::system(),
            occurred_at: now,
        }
    }

    fn submitted() -> Quote {
        let id = QuoteId::new(AggregateId::new());
        let mut quote = Quote::empty(id);
        let cmd = submit_cmd(id, vec![qline(4, 1_250, 10), qline(1, 30_000, 21)]);
        execute(&mut quote, &QuoteCommand::Submit(cmd)).unwrap();
        quote
    }

    #[test]
    fn submit_computes_total_and_lead_time() {
        let quote = submitted();
        assert_eq!(quote.total().unwrap().amount_minor, 35_000);
        assert_eq!(quote.max_lead_time_days(), 21);
        assert_eq!(quote.lines()[1].line_no, 2);
    }

    #[test]
    fn submit_rejects_bad_lines_and_expired_validity() {
        let id = QuoteId::new(AggregateId::new());
        let quote = Quote::empty(id);

        let cmd = submit_cmd(id, vec![qline(0, 100, 1)]);
        assert!(matches!(quote.handle(&QuoteCommand::Submit(cmd)), Err(DomainError::Validation(_))));

        let mut cmd = submit_cmd(id, vec![qline(1, 100, 1)]);
        cmd.valid_until = (cmd.occurred_at - Duration::days(1)).date_naive();
        assert!(matches!(quote.handle(&QuoteCommand::Submit(cmd)), Err(DomainError::Validation(_))));

        let cmd = submit_cmd(id, vec![qline(u64::MAX, 2, 1)]);
        assert!(matches!(quote.handle(&QuoteCommand::Submit(cmd)), Err(DomainError::Validation(_))));
    }

    #[test]
    fn decisions_are_idempotent() {
        let mut quote = submitted();
        let accept = QuoteCommand::Accept(AcceptQuote {
            quote_id: quote.id_typed(),
            actor: Actor::system(),
            occurred_at: Utc::now(),
        });
        assert_eq!(execute(&mut quote, &accept).unwrap().len(), 1);
        assert!(execute(&mut quote, &accept).unwrap().is_empty());
        assert_eq!(quote.status(), QuoteStatus::Accepted);

        let reject = QuoteCommand::Reject(RejectQuote {
            quote_id: quote.id_typed(),
            reason: "another supplier selected".to_string(),
            actor: Actor::system(),
            occurred_at: Utc::now(),
        });
        assert!(matches!(quote.handle(&reject), Err(DomainError::InvariantViolation(_))));
    }

    #[test]
    fn withdrawn_quotes_cannot_be_accepted() {
        let mut quote = submitted();
        let withdraw = QuoteCommand::Withdraw(WithdrawQuote {
            quote_id: quote.id_typed(),
            reason: Some("pricing error".to_string()),
            actor: Actor::system(),
            occurred_at: Utc::now(),
        });
        execute(&mut quote, &withdraw).unwrap();
        assert_eq!(quote.status(), QuoteStatus::Withdrawn);
        assert!(quote.handle(&withdraw).is_err());

        let accept = QuoteCommand::Accept(AcceptQuote {
            quote_id: quote.id_typed(),
            actor: Actor::system(),
            occurred_at: Utc::now(),
        });
        assert!(quote.handle(&accept).is_err());
    }
}
