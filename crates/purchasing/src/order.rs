use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use procureflow_core::{
    Actor, Aggregate, AggregateRoot, DomainError, Money, StatusChange, document_id, require_text,
};
use procureflow_events::{AuditRecord, Audited, Event};
use procureflow_sourcing::{MaterialRequestId, QuoteLine};
use procureflow_suppliers::SupplierId;

use crate::requisition::PurchaseRequisitionId;

document_id!(
    /// Purchase order identifier.
    PurchaseOrderId
);

impl PurchaseOrderId {
    /// The order drafted from an approved requisition.
    pub fn for_requisition(pr_id: PurchaseRequisitionId) -> Self {
        Self(pr_id.aggregate_id().derive("purchase_order"))
    }
}

/// Purchase order status lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PurchaseOrderStatus {
    Draft,
    Sent,
    Acknowledged,
    PartiallyReceived,
    Received,
    Closed,
    Cancelled,
}

impl PurchaseOrderStatus {
    pub const ALL: [PurchaseOrderStatus; 7] = [
        PurchaseOrderStatus::Draft,
        PurchaseOrderStatus::Sent,
        PurchaseOrderStatus::Acknowledged,
        PurchaseOrderStatus::PartiallyReceived,
        PurchaseOrderStatus::Received,
        PurchaseOrderStatus::Closed,
        PurchaseOrderStatus::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PurchaseOrderStatus::Draft => "draft",
            PurchaseOrderStatus::Sent => "sent",
            PurchaseOrderStatus::Acknowledged => "acknowledged",
            PurchaseOrderStatus::PartiallyReceived => "partially_received",
            PurchaseOrderStatus::Received => "received",
            PurchaseOrderStatus::Closed => "closed",
            PurchaseOrderStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.as_str() == value)
    }
}

/// Purchase order line item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLine {
    pub line_no: u32,
    pub description: String,
    pub quantity: u64,
    pub unit_price_minor: u64,
    pub received_quantity: u64,
}

impl OrderLine {
    pub fn outstanding(&self) -> u64 {
        self.quantity.saturating_sub(self.received_quantity)
    }
}

impl From<&QuoteLine> for OrderLine {
    fn from(line: &QuoteLine) -> Self {
        Self {
            line_no: line.line_no,
            description: line.description.clone(),
            quantity: line.quantity,
            unit_price_minor: line.unit_price_minor,
            received_quantity: 0,
        }
    }
}

/// Quantity received against one line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receipt {
    pub line_no: u32,
    pub quantity: u64,
}

/// Aggregate root: PurchaseOrder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PurchaseOrder {
    id: PurchaseOrderId,
    po_number: String,
    pr_id: Option<PurchaseRequisitionId>,
    mr_id: Option<MaterialRequestId>,
    supplier_id: Option<SupplierId>,
    lines: Vec<OrderLine>,
    amount: Option<Money>,
    supplier_reference: Option<String>,
    status: PurchaseOrderStatus,
    history: Vec<StatusChange<PurchaseOrderStatus>>,
    version: u64,
    #[serde(skip)]
    created: bool,
}

impl PurchaseOrder {
    /// Create an empty, not-yet-created aggregate instance for rehydration.
    pub fn empty(id: PurchaseOrderId) -> Self {
        Self {
            id,
            po_number: String::new(),
            pr_id: None,
            mr_id: None,
            supplier_id: None,
            lines: Vec::new(),
            amount: None,
            supplier_reference: None,
            status: PurchaseOrderStatus::Draft,
            history: Vec::new(),
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> PurchaseOrderId {
        self.id
    }

    pub fn po_number(&self) -> &str {
        &self.po_number
    }

    pub fn mr_id(&self) -> Option<MaterialRequestId> {
        self.mr_id
    }

    pub fn supplier_id(&self) -> Option<SupplierId> {
        self.supplier_id
    }

    pub fn lines(&self) -> &[OrderLine] {
        &self.lines
    }

    pub fn amount(&self) -> Option<&Money> {
        self.amount.as_ref()
    }

    pub fn status(&self) -> PurchaseOrderStatus {
        self.status
    }

    pub fn history(&self) -> &[StatusChange<PurchaseOrderStatus>] {
        &self.history
    }

    pub fn is_fully_received(&self) -> bool {
        !self.lines.is_empty() && self.lines.iter().all(|l| l.outstanding() == 0)
    }

    fn has_receipts(&self) -> bool {
        self.lines.iter().any(|l| l.received_quantity > 0)
    }
}

impl AggregateRoot for PurchaseOrder {
    type Id = PurchaseOrderId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: CreatePurchaseOrder (automated, from an approved requisition).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatePurchaseOrder {
    pub po_id: PurchaseOrderId,
    pub po_number: String,
    pub pr_id: PurchaseRequisitionId,
    pub mr_id: MaterialRequestId,
    pub supplier_id: SupplierId,
    pub lines: Vec<QuoteLine>,
    pub amount: Money,
    pub actor: Actor,
    pub occurred_at: DateTime<Utc>,
}

/// Command: SendPurchaseOrder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendPurchaseOrder {
    pub po_id: PurchaseOrderId,
    pub actor: Actor,
    pub occurred_at: DateTime<Utc>,
}

/// Command: Acknowledge (supplier confirmation).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Acknowledge {
    pub po_id: PurchaseOrderId,
    pub supplier_reference: Option<String>,
    pub actor: Actor,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ReceiveGoods.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiveGoods {
    pub po_id: PurchaseOrderId,
    pub receipts: Vec<Receipt>,
    pub actor: Actor,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ClosePurchaseOrder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClosePurchaseOrder {
    pub po_id: PurchaseOrderId,
    pub actor: Actor,
    pub occurred_at: DateTime<Utc>,
}

/// Command: CancelPurchaseOrder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancelPurchaseOrder {
    pub po_id: PurchaseOrderId,
    pub reason: String,
    pub actor: Actor,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PurchaseOrderCommand {
    Create(CreatePurchaseOrder),
    Send(SendPurchaseOrder),
    Acknowledge(Acknowledge),
    ReceiveGoods(ReceiveGoods),
    Close(ClosePurchaseOrder),
    Cancel(CancelPurchaseOrder),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseOrderCreated {
    pub po_id: PurchaseOrderId,
    pub po_number: String,
    pub pr_id: PurchaseRequisitionId,
    pub mr_id: MaterialRequestId,
    pub supplier_id: SupplierId,
    pub lines: Vec<OrderLine>,
    pub amount: Money,
    pub actor: Actor,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseOrderSent {
    pub po_id: PurchaseOrderId,
    pub mr_id: MaterialRequestId,
    pub actor: Actor,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseOrderAcknowledged {
    pub po_id: PurchaseOrderId,
    pub supplier_reference: Option<String>,
    pub actor: Actor,
    pub occurred_at: DateTime<Utc>,
}

/// Event: GoodsReceived.
///
/// `fully_received` is true when this receipt completed every line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GoodsReceived {
    pub po_id: PurchaseOrderId,
    pub mr_id: MaterialRequestId,
    pub receipts: Vec<Receipt>,
    pub fully_received: bool,
    pub actor: Actor,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseOrderClosed {
    pub po_id: PurchaseOrderId,
    pub actor: Actor,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseOrderCancelled {
    pub po_id: PurchaseOrderId,
    pub reason: String,
    pub actor: Actor,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PurchaseOrderEvent {
    PurchaseOrderCreated(PurchaseOrderCreated),
    PurchaseOrderSent(PurchaseOrderSent),
    PurchaseOrderAcknowledged(PurchaseOrderAcknowledged),
    GoodsReceived(GoodsReceived),
    PurchaseOrderClosed(PurchaseOrderClosed),
    PurchaseOrderCancelled(PurchaseOrderCancelled),
}

impl Event for PurchaseOrderEvent {
    fn event_type(&self) -> &'static str {
        match self {
            PurchaseOrderEvent::PurchaseOrderCreated(_) => "purchasing.order.created",
            PurchaseOrderEvent::PurchaseOrderSent(_) => "purchasing.order.sent",
            PurchaseOrderEvent::PurchaseOrderAcknowledged(_) => "purchasing.order.acknowledged",
            PurchaseOrderEvent::GoodsReceived(_) => "purchasing.order.goods_received",
            PurchaseOrderEvent::PurchaseOrderClosed(_) => "purchasing.order.closed",
            PurchaseOrderEvent::PurchaseOrderCancelled(_) => "purchasing.order.cancelled",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            PurchaseOrderEvent::PurchaseOrderCreated(e) => e.occurred_at,
            PurchaseOrderEvent::PurchaseOrderSent(e) => e.occurred_at,
            PurchaseOrderEvent::PurchaseOrderAcknowledged(e) => e.occurred_at,
            PurchaseOrderEvent::GoodsReceived(e) => e.occurred_at,
            PurchaseOrderEvent::PurchaseOrderClosed(e) => e.occurred_at,
            PurchaseOrderEvent::PurchaseOrderCancelled(e) => e.occurred_at,
        }
    }
}

fn received_status(fully_received: bool) -> PurchaseOrderStatus {
    if fully_received {
        PurchaseOrderStatus::Received
    } else {
        PurchaseOrderStatus::PartiallyReceived
    }
}

impl Audited for PurchaseOrderEvent {
    fn audit_record(&self) -> Option<AuditRecord> {
        let (status, actor, note) = match self {
            PurchaseOrderEvent::PurchaseOrderCreated(e) => (PurchaseOrderStatus::Draft, &e.actor, None),
            PurchaseOrderEvent::PurchaseOrderSent(e) => (PurchaseOrderStatus::Sent, &e.actor, None),
            PurchaseOrderEvent::PurchaseOrderAcknowledged(e) => (
                PurchaseOrderStatus::Acknowledged,
                &e.actor,
                e.supplier_reference.clone(),
            ),
            PurchaseOrderEvent::GoodsReceived(e) => (received_status(e.fully_received), &e.actor, None),
            PurchaseOrderEvent::PurchaseOrderClosed(e) => (PurchaseOrderStatus::Closed, &e.actor, None),
            PurchaseOrderEvent::PurchaseOrderCancelled(e) => {
                (PurchaseOrderStatus::Cancelled, &e.actor, Some(e.reason.clone()))
            }
        };
        Some(AuditRecord {
            status: status.as_str(),
            actor: actor.clone(),
            note,
        })
    }
}

impl Aggregate for PurchaseOrder {
    type Command = PurchaseOrderCommand;
    type Event = PurchaseOrderEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            PurchaseOrderEvent::PurchaseOrderCreated(e) => {
                self.id = e.po_id;
                self.po_number = e.po_number.clone();
                self.pr_id = Some(e.pr_id);
                self.mr_id = Some(e.mr_id);
                self.supplier_id = Some(e.supplier_id);
                self.lines = e.lines.clone();
                self.amount = Some(e.amount.clone());
                self.status = PurchaseOrderStatus::Draft;
                self.history.push(StatusChange::initial(
                    PurchaseOrderStatus::Draft,
                    e.occurred_at,
                    &e.actor,
                ));
                self.created = true;
            }
            PurchaseOrderEvent::PurchaseOrderSent(e) => {
                self.move_to(PurchaseOrderStatus::Sent, &e.actor, e.occurred_at, None)
            }
            PurchaseOrderEvent::PurchaseOrderAcknowledged(e) => {
                self.supplier_reference = e.supplier_reference.clone();
                self.move_to(
                    PurchaseOrderStatus::Acknowledged,
                    &e.actor,
                    e.occurred_at,
                    e.supplier_reference.clone(),
                );
            }
            PurchaseOrderEvent::GoodsReceived(e) => {
                for receipt in &e.receipts {
                    if let Some(line) = self.lines.iter_mut().find(|l| l.line_no == receipt.line_no) {
                        line.received_quantity += receipt.quantity;
                    }
                }
                let to = received_status(e.fully_received);
                if to != self.status {
                    self.move_to(to, &e.actor, e.occurred_at, None);
                }
            }
            PurchaseOrderEvent::PurchaseOrderClosed(e) => {
                self.move_to(PurchaseOrderStatus::Closed, &e.actor, e.occurred_at, None)
            }
            PurchaseOrderEvent::PurchaseOrderCancelled(e) => self.move_to(
                PurchaseOrderStatus::Cancelled,
                &e.actor,
                e.occurred_at,
                Some(e.reason.clone()),
            ),
        }

        // +1 per applied event.
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            PurchaseOrderCommand::Create(cmd) => self.handle_create(cmd),
            PurchaseOrderCommand::Send(cmd) => self.handle_send(cmd),
            PurchaseOrderCommand::Acknowledge(cmd) => self.handle_acknowledge(cmd),
            PurchaseOrderCommand::ReceiveGoods(cmd) => self.handle_receive(cmd),
            PurchaseOrderCommand::Close(cmd) => self.handle_close(cmd),
            PurchaseOrderCommand::Cancel(cmd) => self.handle_cancel(cmd),
        }
    }
}

impl PurchaseOrder {
    fn move_to(
        &mut self,
        to: PurchaseOrderStatus,
        actor: &Actor,
        at: DateTime<Utc>,
        note: Option<String>,
    ) {
        self.history
            .push(StatusChange::transition(self.status, to, at, actor, note));
        self.status = to;
    }

    fn ensure_order_id(&self, po_id: PurchaseOrderId) -> Result<(), DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        if self.id != po_id {
            return Err(DomainError::invariant("po_id mismatch"));
        }
        Ok(())
    }

    fn require_mr(&self) -> Result<MaterialRequestId, DomainError> {
        self.mr_id
            .ok_or_else(|| DomainError::invariant("purchase order has no material request"))
    }

    fn handle_create(
        &self,
        cmd: &CreatePurchaseOrder,
    ) -> Result<Vec<PurchaseOrderEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("purchase order already exists"));
        }
        if cmd.lines.is_empty() {
            return Err(DomainError::validation("cannot create a purchase order without lines"));
        }

        Ok(vec![PurchaseOrderEvent::PurchaseOrderCreated(PurchaseOrderCreated {
            po_id: cmd.po_id,
            po_number: cmd.po_number.clone(),
            pr_id: cmd.pr_id,
            mr_id: cmd.mr_id,
            supplier_id: cmd.supplier_id,
            lines: cmd.lines.iter().map(OrderLine::from).collect(),
            amount: cmd.amount.clone(),
            actor: cmd.actor.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_send(&self, cmd: &SendPurchaseOrder) -> Result<Vec<PurchaseOrderEvent>, DomainError> {
        self.ensure_order_id(cmd.po_id)?;
        if self.status != PurchaseOrderStatus::Draft {
            return Err(DomainError::invariant("only draft purchase orders can be sent"));
        }

        Ok(vec![PurchaseOrderEvent::PurchaseOrderSent(PurchaseOrderSent {
            po_id: cmd.po_id,
            mr_id: self.require_mr()?,
            actor: cmd.actor.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_acknowledge(&self, cmd: &Acknowledge) -> Result<Vec<PurchaseOrderEvent>, DomainError> {
        self.ensure_order_id(cmd.po_id)?;
        if self.status != PurchaseOrderStatus::Sent {
            return Err(DomainError::invariant("only sent purchase orders can be acknowledged"));
        }

        Ok(vec![PurchaseOrderEvent::PurchaseOrderAcknowledged(
            PurchaseOrderAcknowledged {
                po_id: cmd.po_id,
                supplier_reference: cmd
                    .supplier_reference
                    .as_deref()
                    .map(str::trim)
                    .filter(|r| !r.is_empty())
                    .map(str::to_string),
                actor: cmd.actor.clone(),
                occurred_at: cmd.occurred_at,
            },
        )])
    }

    fn handle_receive(&self, cmd: &ReceiveGoods) -> Result<Vec<PurchaseOrderEvent>, DomainError> {
        self.ensure_order_id(cmd.po_id)?;

        // Invariant: goods arrive only against an issued, still-open order.
        if !matches!(
            self.status,
            PurchaseOrderStatus::Sent
                | PurchaseOrderStatus::Acknowledged
                | PurchaseOrderStatus::PartiallyReceived
        ) {
            return Err(DomainError::invariant(format!(
                "cannot receive goods on a {} purchase order",
                self.status.as_str()
            )));
        }
        if cmd.receipts.is_empty() {
            return Err(DomainError::validation("at least one receipt line is required"));
        }

        let mut after = self.lines.clone();
        for receipt in &cmd.receipts {
            if receipt.quantity == 0 {
                return Err(DomainError::validation(format!(
                    "receipt for line {} must have a positive quantity",
                    receipt.line_no
                )));
            }
            let line = after
                .iter_mut()
                .find(|l| l.line_no == receipt.line_no)
                .ok_or_else(|| {
                    DomainError::validation(format!("line {} does not exist", receipt.line_no))
                })?;
            if receipt.quantity > line.outstanding() {
                return Err(DomainError::validation(format!(
                    "line {} would be over-received ({} outstanding, {} received)",
                    line.line_no,
                    line.outstanding(),
                    receipt.quantity
                )));
            }
            line.received_quantity += receipt.quantity;
        }
        let fully_received = after.iter().all(|l| l.outstanding() == 0);

        Ok(vec![PurchaseOrderEvent::GoodsReceived(GoodsReceived {
            po_id: cmd.po_id,
            mr_id: self.require_mr()?,
            receipts: cmd.receipts.clone(),
            fully_received,
            actor: cmd.actor.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_close(&self, cmd: &ClosePurchaseOrder) -> Result<Vec<PurchaseOrderEvent>, DomainError> {
        self.ensure_order_id(cmd.po_id)?;
        if self.status != PurchaseOrderStatus::Received {
            return Err(DomainError::invariant("only fully received purchase orders can be closed"));
        }

        Ok(vec![PurchaseOrderEvent::PurchaseOrderClosed(PurchaseOrderClosed {
            po_id: cmd.po_id,
            actor: cmd.actor.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_cancel(&self, cmd: &CancelPurchaseOrder) -> Result<Vec<PurchaseOrderEvent>, DomainError> {
        self.ensure_order_id(cmd.po_id)?;
        require_text("reason", &cmd.reason)?;
        if self.has_receipts()
            || !matches!(
                self.status,
                PurchaseOrderStatus::Draft | PurchaseOrderStatus::Sent | PurchaseOrderStatus::Acknowledged
            )
        {
            return Err(DomainError::invariant(format!(
                "cannot cancel a {} purchase order",
                self.status.as_str()
            )));
        }

        Ok(vec![PurchaseOrderEvent::PurchaseOrderCancelled(PurchaseOrderCancelled {
            po_id: cmd.po_id,
            reason: cmd.reason.trim().to_string(),
            actor: cmd.actor.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }
}
