use std::sync::{Arc, PoisonError, RwLock};

use chrono::Utc;
use serde_json::Value as JsonValue;
use thiserror::Error;
use tracing::{debug, info, warn};

use procureflow_approvals::{AuthorizationMatrix, DocumentType};
use procureflow_core::{Actor, AggregateId};
use procureflow_events::{EventBus, EventEnvelope};
use procureflow_purchasing::{
    CreatePurchaseOrder, CreateRequisition, PurchaseOrder, PurchaseOrderCommand, PurchaseOrderId,
    PurchaseRequisition, PurchaseRequisitionId, RequisitionCommand, RequisitionStatus,
};
use procureflow_sourcing::{
    AcceptQuote, AdvanceMaterialRequest, MaterialRequest, MaterialRequestCommand,
    MaterialRequestId, MaterialRequestStatus, Quote,
    QuoteApproval, QuoteApprovalId, QuoteApprovalStatus, QuoteCommand, QuoteId, QuotePack,
    QuotePackCommand, QuotePackId, QuoteStatus, RecordDecision, RejectQuote,
};

use crate::command_dispatcher::{CommandDispatcher, DispatchError};
use crate::document::Document;
use crate::event_store::EventStore;
use crate::flow::{FlowStep, react};
use crate::numbering::{DocumentNumberer, NumberSeries};

const CONCURRENCY_ATTEMPTS: usize = 3;

#[derive(Debug, Error)]
pub enum FlowError {
    #[error("failed to decode event: {0}")]
    Decode(String),
    #[error(transparent)]
    Dispatch(#[from] DispatchError),
    #[error("{document} {id} is missing")]
    MissingDocument { document: &'static str, id: AggregateId },
    #[error("{document} {id} is not ready: {reason}")]
    NotReady {
        document: &'static str,
        id: AggregateId,
        reason: String,
    },
    #[error("approval routing failed: {0}")]
    Routing(String),
    #[error("{failed} of {total} flow steps failed")]
    StepsFailed { failed: usize, total: usize },
}

/// Executes flow steps against the dispatcher as the system actor.
pub struct ProcurementFlow<S, B> {
    dispatcher: Arc<CommandDispatcher<S, B>>,
    matrix: Arc<RwLock<AuthorizationMatrix>>,
    numberer: Arc<DocumentNumberer>,
}

impl<S, B> ProcurementFlow<S, B>
where
    S: EventStore,
    B: EventBus<EventEnvelope<JsonValue>>,
{
    pub fn new(
        dispatcher: Arc<CommandDispatcher<S, B>>,
        matrix: Arc<RwLock<AuthorizationMatrix>>,
        numberer: Arc<DocumentNumberer>,
    ) -> Self {
        Self {
            dispatcher,
            matrix,
            numberer,
        }
    }

    /// React to one committed event and run every resulting step.
    ///
    /// A failing step is logged and does not prevent the remaining steps.
    pub fn handle(&self, envelope: &EventEnvelope<JsonValue>) -> Result<usize, FlowError> {
        let steps = react(envelope)?;
        let total = steps.len();
        let mut failed = 0;

        for step in &steps {
            match self.run_with_retry(step) {
                Ok(()) => debug!(?step, event_type = envelope.event_type(), "flow step applied"),
                Err(err) => {
                    failed += 1;
                    warn!(
                        ?step,
                        event_type = envelope.event_type(),
                        aggregate_id = %envelope.aggregate_id(),
                        error = %err,
                        "procurement flow step failed"
                    );
                }
            }
        }

        if failed > 0 {
            return Err(FlowError::StepsFailed { failed, total });
        }
        Ok(total)
    }

    fn run_with_retry(&self, step: &FlowStep) -> Result<(), FlowError> {
        let mut attempt = 1;
        loop {
            match self.run(step) {
                Err(FlowError::Dispatch(DispatchError::Concurrency(_))) if attempt < CONCURRENCY_ATTEMPTS => {
                    attempt += 1;
                }
                other => return other,
            }
        }
    }

    pub fn run(&self, step: &FlowStep) -> Result<(), FlowError> {
        match step {
            FlowStep::AdvanceMaterialRequest { mr_id, to, note } => {
                self.dispatcher.dispatch::<MaterialRequest>(
                    mr_id.aggregate_id(),
                    MaterialRequestCommand::Advance(AdvanceMaterialRequest {
                        mr_id: *mr_id,
                        to: *to,
                        note: note.clone(),
                        actor: Actor::system(),
                        occurred_at: Utc::now(),
                    }),
                )?;
                Ok(())
            }
            FlowStep::AcceptQuote { quote_id } => {
                self.dispatcher.dispatch::<Quote>(
                    quote_id.aggregate_id(),
                    QuoteCommand::Accept(AcceptQuote {
                        quote_id: *quote_id,
                        actor: Actor::system(),
                        occurred_at: Utc::now(),
                    }),
                )?;
                Ok(())
            }
            FlowStep::RejectOtherQuotes {
                pack_id,
                selected_quote_id,
            } => self.reject_other_quotes(*pack_id, *selected_quote_id),
            FlowStep::DecideQuotePack {
                pack_id,
                approval_id,
                approved,
            } => {
                self.dispatcher.dispatch::<QuotePack>(
                    pack_id.aggregate_id(),
                    QuotePackCommand::RecordDecision(RecordDecision {
                        pack_id: *pack_id,
                        approval_id: *approval_id,
                        approved: *approved,
                        actor: Actor::system(),
                        occurred_at: Utc::now(),
                    }),
                )?;
                Ok(())
            }
            FlowStep::CreateRequisition { approval_id } => self.create_requisition(*approval_id),
            FlowStep::DraftPurchaseOrder { pr_id } => self.draft_purchase_order(*pr_id),
        }
    }

    fn reject_other_quotes(&self, pack_id: QuotePackId, selected: QuoteId) -> Result<(), FlowError> {
        let pack: QuotePack = self.require("quote pack", pack_id.aggregate_id())?;

        for entry in pack.entries().iter().filter(|e| e.quote_id != selected) {
            let quote: Quote = self.require("quote", entry.quote_id.aggregate_id())?;
            if quote.status() != QuoteStatus::Submitted {
                continue;
            }
            self.dispatcher.dispatch::<Quote>(
                entry.quote_id.aggregate_id(),
                QuoteCommand::Reject(RejectQuote {
                    quote_id: entry.quote_id,
                    reason: "another quote was selected".to_string(),
                    actor: Actor::system(),
                    occurred_at: Utc::now(),
                }),
            )?;
        }
        Ok(())
    }

    fn create_requisition(&self, approval_id: QuoteApprovalId) -> Result<(), FlowError> {
        let pr_id = PurchaseRequisitionId::for_approval(approval_id);
        if self.dispatcher.load::<PurchaseRequisition>(pr_id.aggregate_id())?.is_some() {
            return Ok(());
        }

        let approval: QuoteApproval = self.require("quote approval", approval_id.aggregate_id())?;
        if approval.status() != QuoteApprovalStatus::Approved {
            return Err(not_ready("quote approval", approval_id.aggregate_id(), approval.status().as_str()));
        }
        let (Some(quote_id), Some(mr_id), Some(supplier_id), Some(amount)) = (
            approval.selected_quote_id(),
            approval.mr_id(),
            approval.supplier_id(),
            approval.amount().cloned(),
        ) else {
            return Err(not_ready("quote approval", approval_id.aggregate_id(), "incomplete"));
        };
        if self.is_cancelled(mr_id)? {
            info!(%approval_id, %mr_id, "material request cancelled; no requisition created");
            return Ok(());
        }
        let quote: Quote = self.require("quote", quote_id.aggregate_id())?;

        let levels = self
            .matrix
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .resolve(
                DocumentType::PurchaseRequisition,
                Some(approval.department()),
                amount.amount_minor,
            )
            .map_err(|e| FlowError::Routing(e.to_string()))?;

        let now = Utc::now();
        let command = RequisitionCommand::Create(CreateRequisition {
            pr_id,
            pr_number: self.numberer.next(NumberSeries::PurchaseRequisition, now),
            mr_id,
            quote_approval_id: approval_id,
            quote_id,
            supplier_id,
            department: approval.department().to_string(),
            lines: quote.lines().to_vec(),
            amount,
            levels,
            actor: Actor::system(),
            occurred_at: now,
        });

        match self.dispatcher.dispatch::<PurchaseRequisition>(pr_id.aggregate_id(), command) {
            Ok(_) | Err(DispatchError::Conflict(_)) => Ok(()),
            Err(err) => Err(err.into()),
        }
    }

    fn draft_purchase_order(&self, pr_id: PurchaseRequisitionId) -> Result<(), FlowError> {
        let po_id = PurchaseOrderId::for_requisition(pr_id);
        if self.dispatcher.load::<PurchaseOrder>(po_id.aggregate_id())?.is_some() {
            return Ok(());
        }

        let pr: PurchaseRequisition = self.require("purchase requisition", pr_id.aggregate_id())?;
        if pr.status() != RequisitionStatus::Approved {
            return Err(not_ready("purchase requisition", pr_id.aggregate_id(), pr.status().as_str()));
        }
        let (Some(mr_id), Some(supplier_id), Some(amount)) = (pr.mr_id(), pr.supplier_id(), pr.amount().cloned())
        else {
            return Err(not_ready("purchase requisition", pr_id.aggregate_id(), "incomplete"));
        };
        if self.is_cancelled(mr_id)? {
            info!(%pr_id, %mr_id, "material request cancelled; no purchase order drafted");
            return Ok(());
        }

        let now = Utc::now();
        let command = PurchaseOrderCommand::Create(CreatePurchaseOrder {
            po_id,
            po_number: self.numberer.next(NumberSeries::PurchaseOrder, now),
            pr_id,
            mr_id,
            supplier_id,
            lines: pr.lines().to_vec(),
            amount,
            actor: Actor::system(),
            occurred_at: now,
        });

        match self.dispatcher.dispatch::<PurchaseOrder>(po_id.aggregate_id(), command) {
            Ok(_) | Err(DispatchError::Conflict(_)) => Ok(()),
            Err(err) => Err(err.into()),
        }
    }

    fn is_cancelled(&self, mr_id: MaterialRequestId) -> Result<bool, FlowError> {
        let mr: MaterialRequest = self.require("material request", mr_id.aggregate_id())?;
        Ok(mr.status() == MaterialRequestStatus::Cancelled)
    }

    fn require<D: Document>(&self, document: &'static str, id: AggregateId) -> Result<D, FlowError> {
        self.dispatcher
            .load::<D>(id)?
            .ok_or(FlowError::MissingDocument { document, id })
    }
}

fn not_ready(document: &'static str, id: AggregateId, reason: &str) -> FlowError {
    FlowError::NotReady {
        document,
        id,
        reason: reason.to_string(),
    }
}
