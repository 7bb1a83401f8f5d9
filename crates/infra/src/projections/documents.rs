//! Per-document snapshot projections (list views).
//!
//! One projection instance per document kind. Each applies the kind's events
//! onto a snapshot of the aggregate, so list endpoints read exactly what a
//! rehydrated document would show, only eventually consistent.

use std::marker::PhantomData;

use serde_json::Value as JsonValue;

use procureflow_core::AggregateId;
use procureflow_events::EventEnvelope;

use crate::document::Document;
use crate::projections::cursor::{CursorDecision, InMemoryCursorStore, ProjectionCursorStore, decide};
use crate::projections::{Projection, ProjectionError, sort_for_replay};
use crate::read_model::{InMemoryReadStore, ReadStore};

#[derive(Debug)]
pub struct DocumentProjection<D, S = InMemoryReadStore<AggregateId, D>, C = InMemoryCursorStore> {
    store: S,
    cursors: C,
    projection_name: String,
    _document: PhantomData<fn() -> D>,
}

impl<D: Document> DocumentProjection<D> {
    pub fn in_memory() -> Self {
        Self::new(InMemoryReadStore::new(), InMemoryCursorStore::new())
    }
}

impl<D, S, C> DocumentProjection<D, S, C>
where
    D: Document,
    S: ReadStore<AggregateId, D>,
    C: ProjectionCursorStore,
{
    pub fn new(store: S, cursors: C) -> Self {
        Self {
            store,
            cursors,
            projection_name: format!("{}.snapshots", D::AGGREGATE_TYPE),
            _document: PhantomData,
        }
    }

    pub fn get(&self, id: AggregateId) -> Option<D> {
        self.store.get(&id)
    }

    pub fn list(&self) -> Vec<D> {
        self.store.list()
    }

    fn apply(&self, envelope: &EventEnvelope<JsonValue>) -> Result<(), ProjectionError> {
        if envelope.aggregate_type() != D::AGGREGATE_TYPE {
            return Ok(());
        }

        let aggregate_id = envelope.aggregate_id();
        let seq = envelope.sequence_number();
        let last = self.cursors.get_cursor(&self.projection_name, aggregate_id).unwrap_or(0);

        match decide(last, seq) {
            CursorDecision::Skip => return Ok(()),
            CursorDecision::Gap { last, found } => {
                return Err(ProjectionError::NonMonotonicSequence { last, found });
            }
            CursorDecision::Apply => {}
        }

        let ev: D::Event = serde_json::from_value(envelope.payload().clone())
            .map_err(|e| ProjectionError::Deserialize(format!("{}: {e}", envelope.event_type())))?;

        let mut snapshot = self.store.get(&aggregate_id).unwrap_or_else(|| D::seed(aggregate_id));
        snapshot.apply(&ev);
        self.store.upsert(aggregate_id, snapshot);

        self.cursors.update_cursor(&self.projection_name, aggregate_id, seq);
        Ok(())
    }
}

impl<D, S, C> Projection for DocumentProjection<D, S, C>
where
    D: Document,
    S: ReadStore<AggregateId, D>,
    C: ProjectionCursorStore,
{
    fn name(&self) -> &str {
        &self.projection_name
    }

    fn apply_envelope(&self, envelope: &EventEnvelope<JsonValue>) -> Result<(), ProjectionError> {
        self.apply(envelope)
    }

    fn rebuild_from_scratch(&self, envelopes: Vec<EventEnvelope<JsonValue>>) -> Result<(), ProjectionError> {
        self.store.clear();
        self.cursors.clear_cursors(&self.projection_name);

        for env in &sort_for_replay(envelopes) {
            self.apply(env)?;
        }
        Ok(())
    }
}
