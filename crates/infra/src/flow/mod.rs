//! Procurement flow: the process manager linking documents together.
//!
//! ```text
//! RfqSent                 → MR rfq_sent
//! QuoteSubmitted          → MR quotes_received
//! QuoteApprovalApproved   → accept selected quote, reject the rest of the pack,
//!                           pack approved, MR quote_approved, create PR
//! QuoteApprovalRejected   → pack rejected
//! RequisitionApproved     → MR pr_approved, draft PO
//! RequisitionRejected     → MR pr_rejected
//! PurchaseOrderSent       → MR po_issued
//! GoodsReceived (full)    → MR fulfilled
//! ```
//!
//! `react` is pure; `ProcurementFlow` turns steps into commands. Every step
//! is idempotent, so re-delivered events are harmless.

pub mod executor;

pub use executor::{FlowError, ProcurementFlow};

use serde_json::Value as JsonValue;

use procureflow_events::EventEnvelope;
use procureflow_purchasing::{
    PurchaseOrder, PurchaseOrderEvent, PurchaseRequisition, PurchaseRequisitionId, RequisitionEvent,
};
use procureflow_sourcing::{
    MaterialRequestId, MaterialRequestStatus, Quote, QuoteApproval, QuoteApprovalEvent,
    QuoteApprovalId, QuoteEvent, QuoteId, QuotePackId, Rfq, RfqEvent,
};

use crate::document::{self, Document};

/// One follow-up action derived from a committed event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlowStep {
    AdvanceMaterialRequest {
        mr_id: MaterialRequestId,
        to: MaterialRequestStatus,
        note: Option<String>,
    },
    AcceptQuote {
        quote_id: QuoteId,
    },
    /// Reject every still-submitted quote of the pack except the selected one.
    RejectOtherQuotes {
        pack_id: QuotePackId,
        selected_quote_id: QuoteId,
    },
    DecideQuotePack {
        pack_id: QuotePackId,
        approval_id: QuoteApprovalId,
        approved: bool,
    },
    CreateRequisition {
        approval_id: QuoteApprovalId,
    },
    DraftPurchaseOrder {
        pr_id: PurchaseRequisitionId,
    },
}

fn advance(mr_id: MaterialRequestId, to: MaterialRequestStatus, note: Option<String>) -> FlowStep {
    FlowStep::AdvanceMaterialRequest { mr_id, to, note }
}

/// Decide the follow-up steps for one committed event.
pub fn react(envelope: &EventEnvelope<JsonValue>) -> Result<Vec<FlowStep>, FlowError> {
    let steps = match envelope.aggregate_type() {
        document::RFQ => match decode::<Rfq>(envelope)? {
            RfqEvent::RfqSent(e) => vec![advance(e.mr_id, MaterialRequestStatus::RfqSent, None)],
            _ => vec![],
        },
        document::QUOTE => match decode::<Quote>(envelope)? {
            QuoteEvent::QuoteSubmitted(e) => vec![advance(
                e.mr_id,
                MaterialRequestStatus::QuotesReceived,
                Some(format!("quote {} received", e.quote_number)),
            )],
            _ => vec![],
        },
        document::QUOTE_APPROVAL => match decode::<QuoteApproval>(envelope)? {
            QuoteApprovalEvent::QuoteApprovalApproved(e) => vec![
                FlowStep::AcceptQuote {
                    quote_id: e.selected_quote_id,
                },
                FlowStep::RejectOtherQuotes {
                    pack_id: e.quote_pack_id,
                    selected_quote_id: e.selected_quote_id,
                },
                FlowStep::DecideQuotePack {
                    pack_id: e.quote_pack_id,
                    approval_id: e.approval_id,
                    approved: true,
                },
                advance(e.mr_id, MaterialRequestStatus::QuoteApproved, None),
                FlowStep::CreateRequisition {
                    approval_id: e.approval_id,
                },
            ],
            QuoteApprovalEvent::QuoteApprovalRejected(e) => vec![FlowStep::DecideQuotePack {
                pack_id: e.quote_pack_id,
                approval_id: e.approval_id,
                approved: false,
            }],
            _ => vec![],
        },
        document::PURCHASE_REQUISITION => match decode::<PurchaseRequisition>(envelope)? {
            RequisitionEvent::RequisitionApproved(e) => vec![
                advance(e.mr_id, MaterialRequestStatus::PrApproved, None),
                FlowStep::DraftPurchaseOrder { pr_id: e.pr_id },
            ],
            RequisitionEvent::RequisitionRejected(e) => {
                vec![advance(e.mr_id, MaterialRequestStatus::PrRejected, Some(e.reason))]
            }
            _ => vec![],
        },
        document::PURCHASE_ORDER => match decode::<PurchaseOrder>(envelope)? {
            PurchaseOrderEvent::PurchaseOrderSent(e) => {
                vec![advance(e.mr_id, MaterialRequestStatus::PoIssued, None)]
            }
            PurchaseOrderEvent::GoodsReceived(e) if e.fully_received => {
                vec![advance(e.mr_id, MaterialRequestStatus::Fulfilled, None)]
            }
            _ => vec![],
        },
        _ => vec![],
    };
    Ok(steps)
}

fn decode<D: Document>(envelope: &EventEnvelope<JsonValue>) -> Result<D::Event, FlowError> {
    serde_json::from_value(envelope.payload().clone())
        .map_err(|e| FlowError::Decode(format!("{}: {e}", envelope.event_type())))
}
