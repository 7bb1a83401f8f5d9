use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use procureflow_core::{
    Actor, Aggregate, AggregateRoot, DomainError, StatusChange, document_id, require_text,
};
use procureflow_events::{AuditRecord, Audited, Event};

document_id!(
    /// Material request identifier.
    MaterialRequestId
);

/// Material request status lifecycle.
///
/// Variants are declared in lifecycle order; see [`MaterialRequestStatus::rank`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MaterialRequestStatus {
    Draft,
    Submitted,
    RfqSent,
    QuotesReceived,
    QuoteApproved,
    PrApproved,
    PrRejected,
    PoIssued,
    Fulfilled,
    Cancelled,
}

impl MaterialRequestStatus {
    pub const ALL: [MaterialRequestStatus; 10] = [
        MaterialRequestStatus::Draft,
        MaterialRequestStatus::Submitted,
        MaterialRequestStatus::RfqSent,
        MaterialRequestStatus::QuotesReceived,
        MaterialRequestStatus::QuoteApproved,
        MaterialRequestStatus::PrApproved,
        MaterialRequestStatus::PrRejected,
        MaterialRequestStatus::PoIssued,
        MaterialRequestStatus::Fulfilled,
        MaterialRequestStatus::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MaterialRequestStatus::Draft => "draft",
            MaterialRequestStatus::Submitted => "submitted",
            MaterialRequestStatus::RfqSent => "rfq_sent",
            MaterialRequestStatus::QuotesReceived => "quotes_received",
            MaterialRequestStatus::QuoteApproved => "quote_approved",
            MaterialRequestStatus::PrApproved => "pr_approved",
            MaterialRequestStatus::PrRejected => "pr_rejected",
            MaterialRequestStatus::PoIssued => "po_issued",
            MaterialRequestStatus::Fulfilled => "fulfilled",
            MaterialRequestStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.as_str() == value)
    }

    /// Position in the lifecycle. Both PR outcomes share a rank so one can
    /// never silently replace the other.
    pub fn rank(&self) -> u8 {
        match self {
            MaterialRequestStatus::Draft => 0,
            MaterialRequestStatus::Submitted => 1,
            MaterialRequestStatus::RfqSent => 2,
            MaterialRequestStatus::QuotesReceived => 3,
            MaterialRequestStatus::QuoteApproved => 4,
            MaterialRequestStatus::PrApproved | MaterialRequestStatus::PrRejected => 5,
            MaterialRequestStatus::PoIssued => 6,
            MaterialRequestStatus::Fulfilled => 7,
            MaterialRequestStatus::Cancelled => u8::MAX,
        }
    }

    /// Transition table.
    pub fn can_transition_to(&self, to: MaterialRequestStatus) -> bool {
        use MaterialRequestStatus::*;

        matches!(
            (self, to),
            (Draft, Submitted)
                | (Draft, Cancelled)
                | (Submitted, RfqSent)
                | (Submitted, Cancelled)
                | (RfqSent, QuotesReceived)
                | (RfqSent, Cancelled)
                | (QuotesReceived, QuoteApproved)
                | (QuotesReceived, Cancelled)
                | (QuoteApproved, PrApproved)
                | (QuoteApproved, PrRejected)
                | (PrRejected, Cancelled)
                | (PrApproved, PoIssued)
                | (PoIssued, Fulfilled)
        )
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Normal,
    High,
    Urgent,
}

/// Requested item. Line numbers are assigned on creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestLine {
    #[serde(default)]
    pub line_no: u32,
    pub description: String,
    pub quantity: u64,
    pub unit: String,
}

/// Validate request lines and renumber them from 1.
pub fn normalize_lines(lines: &[RequestLine]) -> Result<Vec<RequestLine>, DomainError> {
    if lines.is_empty() {
        return Err(DomainError::validation("at least one line is required"));
    }
    lines
        .iter()
        .zip(1u32..)
        .map(|(line, line_no)| {
            require_text(&format!("lines[{line_no}].description"), &line.description)?;
            if line.quantity == 0 {
                return Err(DomainError::validation(format!(
                    "lines[{line_no}].quantity must be positive"
                )));
            }
            Ok(RequestLine {
                line_no,
                description: line.description.trim().to_string(),
                quantity: line.quantity,
                unit: line.unit.trim().to_string(),
            })
        })
        .collect()
}

/// Aggregate root: MaterialRequest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MaterialRequest {
    id: MaterialRequestId,
    mr_number: String,
    title: String,
    department: String,
    project: Option<String>,
    requested_by: Option<Actor>,
    required_by: Option<NaiveDate>,
    priority: Priority,
    lines: Vec<RequestLine>,
    status: MaterialRequestStatus,
    history: Vec<StatusChange<MaterialRequestStatus>>,
    version: u64,
    #[serde(skip)]
    created: bool,
}

impl MaterialRequest {
    pub fn empty(id: MaterialRequestId) -> Self {
        Self {
            id,
            mr_number: String::new(),
            title: String::new(),
            department: String::new(),
            project: None,
            requested_by: None,
            required_by: None,
            priority: Priority::Normal,
            lines: Vec::new(),
            status: MaterialRequestStatus::Draft,
            history: Vec::new(),
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> MaterialRequestId {
        self.id
    }

    pub fn mr_number(&self) -> &str {
        &self.mr_number
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn department(&self) -> &str {
        &self.department
    }

    pub fn lines(&self) -> &[RequestLine] {
        &self.lines
    }

    pub fn status(&self) -> MaterialRequestStatus {
        self.status
    }

    pub fn history(&self) -> &[StatusChange<MaterialRequestStatus>] {
        &self.history
    }

    pub fn is_created(&self) -> bool {
        self.created
    }

    /// Whether RFQs may be raised against this request.
    pub fn accepts_rfqs(&self) -> bool {
        matches!(
            self.status,
            MaterialRequestStatus::Submitted
                | MaterialRequestStatus::RfqSent
                | MaterialRequestStatus::QuotesReceived
        )
    }
}

impl AggregateRoot for MaterialRequest {
    type Id = MaterialRequestId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: CreateMaterialRequest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateMaterialRequest {
    pub mr_id: MaterialRequestId,
    pub mr_number: String,
    pub title: String,
    pub department: String,
    pub project: Option<String>,
    pub required_by: NaiveDate,
    pub priority: Priority,
    pub lines: Vec<RequestLine>,
    pub actor: Actor,
    pub occurred_at: DateTime<Utc>,
}

/// Command: Submit (draft → submitted).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitMaterialRequest {
    pub mr_id: MaterialRequestId,
    pub actor: Actor,
    pub occurred_at: DateTime<Utc>,
}

/// Command: Cancel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancelMaterialRequest {
    pub mr_id: MaterialRequestId,
    pub reason: String,
    pub actor: Actor,
    pub occurred_at: DateTime<Utc>,
}

/// Command: Advance (automated follow-up transitions).
///
/// Idempotent and monotonic: moving to the current or an earlier status is a
/// no-op.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdvanceMaterialRequest {
    pub mr_id: MaterialRequestId,
    pub to: MaterialRequestStatus,
    pub note: Option<String>,
    pub actor: Actor,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MaterialRequestCommand {
    Create(CreateMaterialRequest),
    Submit(SubmitMaterialRequest),
    Cancel(CancelMaterialRequest),
    Advance(AdvanceMaterialRequest),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaterialRequestCreated {
    pub mr_id: MaterialRequestId,
    pub mr_number: String,
    pub title: String,
    pub department: String,
    pub project: Option<String>,
    pub required_by: NaiveDate,
    pub priority: Priority,
    pub lines: Vec<RequestLine>,
    pub actor: Actor,
    pub occurred_at: DateTime<Utc>,
}

/// Any status move after creation (submit, cancel, automated advance).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaterialRequestStatusChanged {
    pub mr_id: MaterialRequestId,
    pub from: MaterialRequestStatus,
    pub to: MaterialRequestStatus,
    pub note: Option<String>,
    pub actor: Actor,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MaterialRequestEvent {
    MaterialRequestCreated(MaterialRequestCreated),
    MaterialRequestStatusChanged(MaterialRequestStatusChanged),
}

impl Event for MaterialRequestEvent {
    fn event_type(&self) -> &'static str {
        match self {
            MaterialRequestEvent::MaterialRequestCreated(_) => "sourcing.material_request.created",
            MaterialRequestEvent::MaterialRequestStatusChanged(_) => {
                "sourcing.material_request.status_changed"
            }
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            MaterialRequestEvent::MaterialRequestCreated(e) => e.occurred_at,
            MaterialRequestEvent::MaterialRequestStatusChanged(e) => e.occurred_at,
        }
    }
}

impl Audited for MaterialRequestEvent {
    fn audit_record(&self) -> Option<AuditRecord> {
        Some(match self {
            MaterialRequestEvent::MaterialRequestCreated(e) => AuditRecord {
                status: MaterialRequestStatus::Draft.as_str(),
                actor: e.actor.clone(),
                note: None,
            },
            MaterialRequestEvent::MaterialRequestStatusChanged(e) => AuditRecord {
                status: e.to.as_str(),
                actor: e.actor.clone(),
                note: e.note.clone(),
            },
        })
    }
}

impl Aggregate for MaterialRequest {
    type Command = MaterialRequestCommand;
    type Event = MaterialRequestEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            MaterialRequestEvent::MaterialRequestCreated(e) => {
                self.id = e.mr_id;
                self.mr_number = e.mr_number.clone();
                self.title = e.title.clone();
                self.department = e.department.clone();
                self.project = e.project.clone();
                self.requested_by = Some(e.actor.clone());
                self.required_by = Some(e.required_by);
                self.priority = e.priority;
                self.lines = e.lines.clone();
                self.status = MaterialRequestStatus::Draft;
                self.history.push(StatusChange::initial(
                    MaterialRequestStatus::Draft,
                    e.occurred_at,
                    &e.actor,
                ));
                self.created = true;
            }
            MaterialRequestEvent::MaterialRequestStatusChanged(e) => {
                self.history.push(StatusChange::transition(
                    e.from,
                    e.to,
                    e.occurred_at,
                    &e.actor,
                    e.note.clone(),
                ));
                self.status = e.to;
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            MaterialRequestCommand::Create(cmd) => self.handle_create(cmd),
            MaterialRequestCommand::Submit(cmd) => self.handle_submit(cmd),
            MaterialRequestCommand::Cancel(cmd) => self.handle_cancel(cmd),
            MaterialRequestCommand::Advance(cmd) => self.handle_advance(cmd),
        }
    }
}

impl MaterialRequest {
    fn ensure_exists(&self, mr_id: MaterialRequestId) -> Result<(), DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        if self.id != mr_id {
            return Err(DomainError::invariant("mr_id mismatch"));
        }
        Ok(())
    }

    fn transition(
        &self,
        to: MaterialRequestStatus,
        note: Option<String>,
        actor: &Actor,
        occurred_at: DateTime<Utc>,
    ) -> Result<Vec<MaterialRequestEvent>, DomainError> {
        if !self.status.can_transition_to(to) {
            return Err(DomainError::invariant(format!(
                "material request cannot move from {} to {}",
                self.status.as_str(),
                to.as_str()
            )));
        }

        Ok(vec![MaterialRequestEvent::MaterialRequestStatusChanged(
            MaterialRequestStatusChanged {
                mr_id: self.id,
                from: self.status,
                to,
                note,
                actor: actor.clone(),
                occurred_at,
            },
        )])
    }

    fn handle_create(
        &self,
        cmd: &CreateMaterialRequest,
    ) -> Result<Vec<MaterialRequestEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("material request already exists"));
        }
        require_text("title", &cmd.title)?;
        require_text("department", &cmd.department)?;
        if cmd.required_by < cmd.occurred_at.date_naive() {
            return Err(DomainError::validation("required_by cannot be in the past"));
        }
        let lines = normalize_lines(&cmd.lines)?;

        Ok(vec![MaterialRequestEvent::MaterialRequestCreated(
            MaterialRequestCreated {
                mr_id: cmd.mr_id,
                mr_number: cmd.mr_number.clone(),
                title: cmd.title.trim().to_string(),
                department: cmd.department.trim().to_string(),
                project: cmd
                    .project
                    .as_deref()
                    .map(str::trim)
                    .filter(|p| !p.is_empty())
                    .map(str::to_string),
                required_by: cmd.required_by,
                priority: cmd.priority,
                lines,
                actor: cmd.actor.clone(),
                occurred_at: cmd.occurred_at,
            },
        )])
    }

    fn handle_submit(
        &self,
        cmd: &SubmitMaterialRequest,
    ) -> Result<Vec<MaterialRequestEvent>, DomainError> {
        self.ensure_exists(cmd.mr_id)?;
        if self.status != MaterialRequestStatus::Draft {
            return Err(DomainError::invariant("only draft material requests can be submitted"));
        }
        self.transition(MaterialRequestStatus::Submitted, None, &cmd.actor, cmd.occurred_at)
    }

    fn handle_cancel(
        &self,
        cmd: &CancelMaterialRequest,
    ) -> Result<Vec<MaterialRequestEvent>, DomainError> {
        self.ensure_exists(cmd.mr_id)?;
        require_text("reason", &cmd.reason)?;
        self.transition(
            MaterialRequestStatus::Cancelled,
            Some(cmd.reason.trim().to_string()),
            &cmd.actor,
            cmd.occurred_at,
        )
    }

    fn handle_advance(
        &self,
        cmd: &AdvanceMaterialRequest,
    ) -> Result<Vec<MaterialRequestEvent>, DomainError> {
        self.ensure_exists(cmd.mr_id)?;
        if cmd.to == MaterialRequestStatus::Cancelled {
            return Err(DomainError::validation("use cancel to cancel a material request"));
        }
        if self.status == MaterialRequestStatus::Cancelled {
            return Err(DomainError::invariant("material request is cancelled"));
        }
        if cmd.to == self.status || cmd.to.rank() < self.status.rank() {
            return Ok(vec![]);
        }
        self.transition(cmd.to, cmd.note.clone(), &cmd.actor, cmd.occurred_at)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use proptest::prelude::*;
    use procureflow_core::AggregateId;
    use procureflow_events::execute;

    use MaterialRequestStatus::*;

    fn line(description: &str, quantity: u64) -> RequestLine {
        RequestLine {
            line_no: 0,
            description: description.to_string(),
            quantity,
            unit: "ea".to_string(),
        }
    }

    fn create_cmd(id: MaterialRequestId) -> CreateMaterialRequest {
        let now = Utc::now();
        CreateMaterialRequest {
            mr_id: id,
            mr_number: "MR-2026-00001".to_string(),
            title: "Pump spares".to_string(),
            department: "Maintenance".to_string(),
            project: Some("  ".to_string()),
            required_by: (now + Duration::days(14)).date_naive(),
            priority: Priority::High,
            lines: vec![line("Seal kit", 4), line("Impeller", 1)],
            actor: Actor::system(),
            occurred_at: now,
        }
    }

    fn created() -> MaterialRequest {
        let id = MaterialRequestId::new(AggregateId::new());
        let mut mr = MaterialRequest::empty(id);
        execute(&mut mr, &MaterialRequestCommand::Create(create_cmd(id))).unwrap();
        mr
    }

    fn advance(mr: &mut MaterialRequest, to: MaterialRequestStatus) -> Result<usize, DomainError> {
        let cmd = AdvanceMaterialRequest {
            mr_id: mr.id_typed(),
            to,
            note: None,
            actor: Actor::system(),
            occurred_at: Utc::now(),
        };
        execute(mr, &MaterialRequestCommand::Advance(cmd)).map(|evs| evs.len())
    }

    fn submit(mr: &mut MaterialRequest) {
        let cmd = SubmitMaterialRequest {
            mr_id: mr.id_typed(),
            actor: Actor::system(),
            occurred_at: Utc::now(),
        };
        execute(mr, &MaterialRequestCommand::Submit(cmd)).unwrap();
    }

    #[test]
    fn create_numbers_lines_and_starts_in_draft() {
        let mr = created();
        assert_eq!(mr.status(), Draft);
        assert_eq!(mr.lines()[1].line_no, 2);
        assert_eq!(mr.history().len(), 1);
        assert!(mr.history()[0].from.is_none());
        assert!(mr.project.is_none());
    }

    #[test]
    fn create_validates_required_fields() {
        let id = MaterialRequestId::new(AggregateId::new());
        let mr = MaterialRequest::empty(id);

        let mut cmd = create_cmd(id);
        cmd.lines.clear();
        assert!(matches!(
            mr.handle(&MaterialRequestCommand::Create(cmd)),
            Err(DomainError::Validation(_))
        ));

        let mut cmd = create_cmd(id);
        cmd.lines = vec![line("Seal kit", 0)];
        assert!(matches!(
            mr.handle(&MaterialRequestCommand::Create(cmd)),
            Err(DomainError::Validation(_))
        ));

        let mut cmd = create_cmd(id);
        cmd.required_by = (cmd.occurred_at - Duration::days(1)).date_naive();
        assert!(matches!(
            mr.handle(&MaterialRequestCommand::Create(cmd)),
            Err(DomainError::Validation(_))
        ));
    }

    #[test]
    fn advance_is_idempotent_and_monotonic() {
        let mut mr = created();
        submit(&mut mr);

        assert_eq!(advance(&mut mr, RfqSent).unwrap(), 1);
        assert_eq!(advance(&mut mr, RfqSent).unwrap(), 0);
        assert_eq!(advance(&mut mr, QuotesReceived).unwrap(), 1);
        // A late "rfq sent" trigger does not move the request backwards.
        assert_eq!(advance(&mut mr, RfqSent).unwrap(), 0);
        assert_eq!(mr.status(), QuotesReceived);

        // Skipping ahead is not in the table.
        assert!(matches!(advance(&mut mr, PoIssued), Err(DomainError::InvariantViolation(_))));
    }

    #[test]
    fn pr_outcomes_cannot_replace_each_other() {
        let mut mr = created();
        submit(&mut mr);
        for to in [RfqSent, QuotesReceived, QuoteApproved, PrApproved] {
            advance(&mut mr, to).unwrap();
        }
        assert!(advance(&mut mr, PrRejected).is_err());
        assert_eq!(mr.status(), PrApproved);
    }

    #[test]
    fn cancelled_requests_reject_advances() {
        let mut mr = created();
        let cmd = CancelMaterialRequest {
            mr_id: mr.id_typed(),
            reason: "duplicate".to_string(),
            actor: Actor::system(),
            occurred_at: Utc::now(),
        };
        execute(&mut mr, &MaterialRequestCommand::Cancel(cmd)).unwrap();
        assert_eq!(mr.status(), Cancelled);
        assert_eq!(mr.history().last().unwrap().note.as_deref(), Some("duplicate"));

        assert!(matches!(advance(&mut mr, Submitted), Err(DomainError::InvariantViolation(_))));
    }

    #[test]
    fn cancel_requires_reason_and_allowed_state() {
        let mut mr = created();
        let cancel = |reason: &str| {
            MaterialRequestCommand::Cancel(CancelMaterialRequest {
                mr_id: mr.id_typed(),
                reason: reason.to_string(),
                actor: Actor::system(),
                occurred_at: Utc::now(),
            })
        };
        assert!(matches!(mr.handle(&cancel(" ")), Err(DomainError::Validation(_))));

        submit(&mut mr);
        for to in [RfqSent, QuotesReceived, QuoteApproved] {
            advance(&mut mr, to).unwrap();
        }
        let cmd = MaterialRequestCommand::Cancel(CancelMaterialRequest {
            mr_id: mr.id_typed(),
            reason: "no longer needed".to_string(),
            actor: Actor::system(),
            occurred_at: Utc::now(),
        });
        assert!(matches!(mr.handle(&cmd), Err(DomainError::InvariantViolation(_))));
    }

    proptest! {
        #[test]
        fn status_rank_never_decreases(targets in proptest::collection::vec(0usize..9, 1..40)) {
            let mut mr = created();
            let mut last_rank = mr.status().rank();
            for idx in targets {
                let _ = advance(&mut mr, MaterialRequestStatus::ALL[idx]);
                prop_assert!(mr.status().rank() >= last_rank);
                last_rank = mr.status().rank();
            }
            for change in mr.history().iter().skip(1) {
                prop_assert!(change.from.is_some_and(|from| from.can_transition_to(change.to)));
            }
        }
    }
}
