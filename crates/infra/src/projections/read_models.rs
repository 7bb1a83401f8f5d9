//! The full set of read models served by the API.

use std::sync::Arc;

use serde_json::Value as JsonValue;
use tracing::{info, warn};

use procureflow_events::EventEnvelope;
use procureflow_purchasing::{PurchaseOrder, PurchaseRequisition};
use procureflow_sourcing::{MaterialRequest, Quote, QuoteApproval, QuotePack, Rfq};
use procureflow_suppliers::Supplier;

use crate::event_store::{EventStore, EventStoreError};
use crate::projections::{
    ApprovalsInbox, DocumentProjection, Projection, ProjectionError, StatusHistoryProjection,
};

#[derive(Debug, Clone)]
pub struct ReadModels {
    pub suppliers: Arc<DocumentProjection<Supplier>>,
    pub material_requests: Arc<DocumentProjection<MaterialRequest>>,
    pub rfqs: Arc<DocumentProjection<Rfq>>,
    pub quotes: Arc<DocumentProjection<Quote>>,
    pub quote_packs: Arc<DocumentProjection<QuotePack>>,
    pub quote_approvals: Arc<DocumentProjection<QuoteApproval>>,
    pub requisitions: Arc<DocumentProjection<PurchaseRequisition>>,
    pub purchase_orders: Arc<DocumentProjection<PurchaseOrder>>,
    pub history: Arc<StatusHistoryProjection>,
    pub inbox: ApprovalsInbox,
}

impl Default for ReadModels {
    fn default() -> Self {
        Self::in_memory()
    }
}

impl ReadModels {
    pub fn in_memory() -> Self {
        let quote_approvals = Arc::new(DocumentProjection::in_memory());
        let requisitions = Arc::new(DocumentProjection::in_memory());
        Self {
            suppliers: Arc::new(DocumentProjection::in_memory()),
            material_requests: Arc::new(DocumentProjection::in_memory()),
            rfqs: Arc::new(DocumentProjection::in_memory()),
            quotes: Arc::new(DocumentProjection::in_memory()),
            quote_packs: Arc::new(DocumentProjection::in_memory()),
            inbox: ApprovalsInbox::new(quote_approvals.clone(), requisitions.clone()),
            quote_approvals,
            requisitions,
            purchase_orders: Arc::new(DocumentProjection::in_memory()),
            history: Arc::new(StatusHistoryProjection::in_memory()),
        }
    }

    fn projections(&self) -> [&dyn Projection; 9] {
        [
            self.suppliers.as_ref(),
            self.material_requests.as_ref(),
            self.rfqs.as_ref(),
            self.quotes.as_ref(),
            self.quote_packs.as_ref(),
            self.quote_approvals.as_ref(),
            self.requisitions.as_ref(),
            self.purchase_orders.as_ref(),
            self.history.as_ref(),
        ]
    }

    /// Feed one envelope to every projection; every projection sees it even
    /// if an earlier one fails. The first failure is returned.
    pub fn apply_envelope(&self, envelope: &EventEnvelope<JsonValue>) -> Result<(), ProjectionError> {
        let mut first_error = None;
        for projection in self.projections() {
            if let Err(err) = projection.apply_envelope(envelope) {
                warn!(projection = projection.name(), error = %err, "projection failed");
                first_error.get_or_insert(err);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    /// Rebuild every read model from the full event log.
    pub fn rebuild_from<S: EventStore>(&self, store: &S) -> Result<(), RebuildError> {
        let envelopes: Vec<EventEnvelope<JsonValue>> =
            store.load_all()?.iter().map(|e| e.to_envelope()).collect();

        for projection in self.projections() {
            projection.rebuild_from_scratch(envelopes.clone())?;
        }
        info!(events = envelopes.len(), "read models rebuilt");
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RebuildError {
    #[error(transparent)]
    Store(#[from] EventStoreError),
    #[error(transparent)]
    Projection(#[from] ProjectionError),
}
