//! Status history (audit trail) across every document kind.
//!
//! Each status-changing event becomes one `HistoryEntry`; `from` is filled
//! from the previous entry of the same document.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value as JsonValue;

use procureflow_core::{Actor, AggregateId};
use procureflow_events::{AuditRecord, Audited, EventEnvelope};
use procureflow_purchasing::{PurchaseOrder, PurchaseRequisition};
use procureflow_sourcing::{MaterialRequest, Quote, QuoteApproval, QuotePack, Rfq};
use procureflow_suppliers::Supplier;

use crate::document::{self, Document};
use crate::projections::cursor::{CursorDecision, InMemoryCursorStore, ProjectionCursorStore, decide};
use crate::projections::{Projection, ProjectionError, sort_for_replay};
use crate::read_model::{InMemoryReadStore, ReadStore};

const PROJECTION_NAME: &str = "audit.status_history";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HistoryEntry {
    pub document_id: AggregateId,
    pub document_type: String,
    pub sequence_number: u64,
    pub event_type: String,
    pub from: Option<String>,
    pub to: String,
    pub at: DateTime<Utc>,
    pub actor: Actor,
    pub note: Option<String>,
}

#[derive(Debug)]
pub struct StatusHistoryProjection<S = InMemoryReadStore<AggregateId, Vec<HistoryEntry>>, C = InMemoryCursorStore> {
    store: S,
    cursors: C,
}

impl StatusHistoryProjection {
    pub fn in_memory() -> Self {
        Self::new(InMemoryReadStore::new(), InMemoryCursorStore::new())
    }
}

impl<S, C> StatusHistoryProjection<S, C>
where
    S: ReadStore<AggregateId, Vec<HistoryEntry>>,
    C: ProjectionCursorStore,
{
    pub fn new(store: S, cursors: C) -> Self {
        Self { store, cursors }
    }

    /// Transitions of one document, oldest first. Empty when unknown.
    pub fn for_document(&self, document_id: AggregateId) -> Vec<HistoryEntry> {
        self.store.get(&document_id).unwrap_or_default()
    }

    fn apply(&self, envelope: &EventEnvelope<JsonValue>) -> Result<(), ProjectionError> {
        let aggregate_id = envelope.aggregate_id();
        let seq = envelope.sequence_number();
        let last = self.cursors.get_cursor(PROJECTION_NAME, aggregate_id).unwrap_or(0);

        match decide(last, seq) {
            CursorDecision::Skip => return Ok(()),
            CursorDecision::Gap { last, found } => {
                return Err(ProjectionError::NonMonotonicSequence { last, found });
            }
            CursorDecision::Apply => {}
        }

        if let Some(record) = audit_record(envelope)? {
            let mut entries = self.store.get(&aggregate_id).unwrap_or_default();
            let from = entries.last().map(|e| e.to.clone());
            entries.push(HistoryEntry {
                document_id: aggregate_id,
                document_type: envelope.aggregate_type().to_string(),
                sequence_number: seq,
                event_type: envelope.event_type().to_string(),
                from,
                to: record.status.to_string(),
                at: envelope.occurred_at(),
                actor: record.actor,
                note: record.note,
            });
            self.store.upsert(aggregate_id, entries);
        }

        self.cursors.update_cursor(PROJECTION_NAME, aggregate_id, seq);
        Ok(())
    }
}

impl<S, C> Projection for StatusHistoryProjection<S, C>
where
    S: ReadStore<AggregateId, Vec<HistoryEntry>>,
    C: ProjectionCursorStore,
{
    fn name(&self) -> &str {
        PROJECTION_NAME
    }

    fn apply_envelope(&self, envelope: &EventEnvelope<JsonValue>) -> Result<(), ProjectionError> {
        self.apply(envelope)
    }

    fn rebuild_from_scratch(&self, envelopes: Vec<EventEnvelope<JsonValue>>) -> Result<(), ProjectionError> {
        self.store.clear();
        self.cursors.clear_cursors(PROJECTION_NAME);

        for env in &sort_for_replay(envelopes) {
            self.apply(env)?;
        }
        Ok(())
    }
}

fn audit_record(envelope: &EventEnvelope<JsonValue>) -> Result<Option<AuditRecord>, ProjectionError> {
    match envelope.aggregate_type() {
        document::SUPPLIER => decode::<Supplier>(envelope),
        document::MATERIAL_REQUEST => decode::<MaterialRequest>(envelope),
        document::RFQ => decode::<Rfq>(envelope),
        document::QUOTE => decode::<Quote>(envelope),
        document::QUOTE_PACK => decode::<QuotePack>(envelope),
        document::QUOTE_APPROVAL => decode::<QuoteApproval>(envelope),
        document::PURCHASE_REQUISITION => decode::<PurchaseRequisition>(envelope),
        document::PURCHASE_ORDER => decode::<PurchaseOrder>(envelope),
        _ => Ok(None),
    }
}

fn decode<D: Document>(envelope: &EventEnvelope<JsonValue>) -> Result<Option<AuditRecord>, ProjectionError> {
    let ev: D::Event = serde_json::from_value(envelope.payload().clone())
        .map_err(|e| ProjectionError::Deserialize(format!("{}: {e}", envelope.event_type())))?;
    Ok(ev.audit_record())
}
