//! Command execution pipeline.
//!
//! ```text
//! Command
//!   ↓
//! 1. Load the document stream from the store
//!   ↓
//! 2. Rehydrate the aggregate (apply historical events)
//!   ↓
//! 3. Handle the command (pure decision logic, produces events)
//!   ↓
//! 4. Append to the store (optimistic concurrency on the loaded version)
//!   ↓
//! 5. Publish committed events to the bus (projections, procurement flow)
//! ```
//!
//! This module contains no IO itself; it composes the `EventStore` and
//! `EventBus` traits.

use serde_json::Value as JsonValue;
use thiserror::Error;
use uuid::Uuid;

use procureflow_core::{Aggregate, AggregateId, DomainError, ExpectedVersion};
use procureflow_events::{EventBus, EventEnvelope};

use crate::document::Document;
use crate::event_store::{EventStore, EventStoreError, StoredEvent, UncommittedEvent};

#[derive(Debug, Error)]
pub enum DispatchError {
    /// Optimistic concurrency failure (the stream moved between load and append).
    #[error("concurrent modification: {0}")]
    Concurrency(String),
    /// Domain-level conflict (already exists, duplicate).
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("invalid identifier: {0}")]
    InvalidId(String),
    #[error("invariant violated: {0}")]
    InvariantViolation(String),
    /// The actor may not decide (wrong approver role, segregation of duties).
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    #[error("not found")]
    NotFound,
    /// Historical payloads could not be decoded into the aggregate event type.
    #[error("event deserialization failed: {0}")]
    Deserialize(String),
    #[error(transparent)]
    Store(EventStoreError),
    /// Publication failed after a successful append (at-least-once; retry may duplicate).
    #[error("event publication failed: {0}")]
    Publish(String),
}

impl From<EventStoreError> for DispatchError {
    fn from(value: EventStoreError) -> Self {
        match value {
            EventStoreError::Concurrency(msg) => DispatchError::Concurrency(msg),
            other => DispatchError::Store(other),
        }
    }
}

impl From<DomainError> for DispatchError {
    fn from(value: DomainError) -> Self {
        match value {
            DomainError::Validation(msg) => DispatchError::Validation(msg),
            DomainError::InvariantViolation(msg) => DispatchError::InvariantViolation(msg),
            DomainError::InvalidId(msg) => DispatchError::InvalidId(msg),
            DomainError::Conflict(msg) => DispatchError::Conflict(msg),
            DomainError::Unauthorized(msg) => DispatchError::Unauthorized(msg),
            DomainError::NotFound => DispatchError::NotFound,
        }
    }
}

/// Result of a successful dispatch: the document after the command, plus the
/// events that were committed (empty when the command was a no-op).
#[derive(Debug, Clone)]
pub struct Committed<A> {
    pub state: A,
    pub events: Vec<StoredEvent>,
}

/// Reusable command execution engine for the event-sourced documents.
///
/// Events are persisted before publication: if the append fails nothing is
/// published. If publication fails after a successful append the error is
/// returned; consumers are idempotent so a retry is harmless.
#[derive(Debug)]
pub struct CommandDispatcher<S, B> {
    store: S,
    bus: B,
}

impl<S, B> CommandDispatcher<S, B> {
    pub fn new(store: S, bus: B) -> Self {
        Self { store, bus }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn bus(&self) -> &B {
        &self.bus
    }
}

impl<S, B> CommandDispatcher<S, B>
where
    S: EventStore,
    B: EventBus<EventEnvelope<JsonValue>>,
{
    /// Dispatch a command through the full pipeline and return the updated document.
    ///
    /// Creation commands on an existing document surface as
    /// `DispatchError::Conflict`; a stale stream surfaces as
    /// `DispatchError::Concurrency` and may be retried by the caller.
    pub fn dispatch<A>(
        &self,
        aggregate_id: AggregateId,
        command: A::Command,
    ) -> Result<Committed<A>, DispatchError>
    where
        A: Document,
    {
        let history = self.store.load_stream(aggregate_id)?;
        validate_loaded_stream::<A>(aggregate_id, &history)?;
        let expected = ExpectedVersion::Exact(stream_version(&history));

        let mut aggregate = A::seed(aggregate_id);
        apply_history(&mut aggregate, &history)?;

        let decided = aggregate.handle(&command).map_err(DispatchError::from)?;
        if decided.is_empty() {
            return Ok(Committed {
                state: aggregate,
                events: vec![],
            });
        }

        let uncommitted = decided
            .iter()
            .map(|ev| UncommittedEvent::from_typed(aggregate_id, A::AGGREGATE_TYPE, Uuid::now_v7(), ev))
            .collect::<Result<Vec<_>, _>>()?;

        let committed = self.store.append(uncommitted, expected)?;

        for ev in &decided {
            aggregate.apply(ev);
        }

        for stored in &committed {
            self.bus
                .publish(stored.to_envelope())
                .map_err(|e| DispatchError::Publish(format!("{e:?}")))?;
        }

        tracing::debug!(
            aggregate_type = A::AGGREGATE_TYPE,
            %aggregate_id,
            events = committed.len(),
            "command committed"
        );

        Ok(Committed {
            state: aggregate,
            events: committed,
        })
    }

    /// Rehydrate a document from its stream. `None` when it was never created.
    pub fn load<A>(&self, aggregate_id: AggregateId) -> Result<Option<A>, DispatchError>
    where
        A: Document,
    {
        let history = self.store.load_stream(aggregate_id)?;
        if history.is_empty() {
            return Ok(None);
        }
        validate_loaded_stream::<A>(aggregate_id, &history)?;

        let mut aggregate = A::seed(aggregate_id);
        apply_history(&mut aggregate, &history)?;
        Ok(aggregate.exists().then_some(aggregate))
    }
}

fn stream_version(stream: &[StoredEvent]) -> u64 {
    stream.last().map(|e| e.sequence_number).unwrap_or(0)
}

fn validate_loaded_stream<A: Document>(
    aggregate_id: AggregateId,
    stream: &[StoredEvent],
) -> Result<(), DispatchError> {
    let mut last = 0u64;
    for (idx, e) in stream.iter().enumerate() {
        if e.aggregate_id != aggregate_id {
            return Err(DispatchError::Store(EventStoreError::InvalidAppend(format!(
                "loaded stream contains wrong aggregate_id at index {idx}"
            ))));
        }
        // A document id of one kind must not resolve to a stream of another.
        if e.aggregate_type != A::AGGREGATE_TYPE {
            return Err(DispatchError::NotFound);
        }
        if e.sequence_number == 0 || e.sequence_number <= last {
            return Err(DispatchError::Store(EventStoreError::InvalidAppend(format!(
                "non-monotonic sequence_number in loaded stream (last={last}, found={})",
                e.sequence_number
            ))));
        }
        last = e.sequence_number;
    }
    Ok(())
}

fn apply_history<A: Document>(aggregate: &mut A, history: &[StoredEvent]) -> Result<(), DispatchError> {
    for stored in history {
        let ev: A::Event = serde_json::from_value(stored.payload.clone())
            .map_err(|e| DispatchError::Deserialize(e.to_string()))?;
        aggregate.apply(&ev);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use chrono::Utc;
    use procureflow_core::Actor;
    use procureflow_events::InMemoryEventBus;
    use procureflow_suppliers::{
        Deactivate, RegisterSupplier, Supplier, SupplierCommand, SupplierId, SupplierStatus,
    };

    use crate::event_store::InMemoryEventStore;

    type Dispatcher = CommandDispatcher<InMemoryEventStore, Arc<InMemoryEventBus<EventEnvelope<JsonValue>>>>;

    fn dispatcher() -> Dispatcher {
        CommandDispatcher::new(InMemoryEventStore::new(), Arc::new(InMemoryEventBus::new()))
    }

    fn register(id: SupplierId) -> SupplierCommand {
        SupplierCommand::RegisterSupplier(RegisterSupplier {
            supplier_id: id,
            code: "acme".to_string(),
            name: "Acme Industrial".to_string(),
            contact: None,
            categories: vec![],
            actor: Actor::system(),
            occurred_at: Utc::now(),
        })
    }

    #[test]
    fn dispatch_returns_updated_document_and_publishes() {
        let d = dispatcher();
        let sub = d.bus().subscribe();
        let id = SupplierId::new(AggregateId::new());

        let committed = d.dispatch::<Supplier>(id.aggregate_id(), register(id)).unwrap();
        assert_eq!(committed.state.code(), "ACME");
        assert_eq!(committed.events.len(), 1);

        let env = sub.try_recv().unwrap();
        assert_eq!(env.aggregate_type(), "suppliers.supplier");
        assert_eq!(env.sequence_number(), 1);
    }

    #[test]
    fn creating_twice_is_a_conflict() {
        let d = dispatcher();
        let id = SupplierId::new(AggregateId::new());
        d.dispatch::<Supplier>(id.aggregate_id(), register(id)).unwrap();

        let err = d.dispatch::<Supplier>(id.aggregate_id(), register(id)).unwrap_err();
        assert!(matches!(err, DispatchError::Conflict(_)));
    }

    #[test]
    fn load_rehydrates_and_reports_missing_documents() {
        let d = dispatcher();
        let id = SupplierId::new(AggregateId::new());
        assert!(d.load::<Supplier>(id.aggregate_id()).unwrap().is_none());

        d.dispatch::<Supplier>(id.aggregate_id(), register(id)).unwrap();
        d.dispatch::<Supplier>(
            id.aggregate_id(),
            SupplierCommand::Deactivate(Deactivate {
                supplier_id: id,
                reason: Some("audit".to_string()),
                actor: Actor::system(),
                occurred_at: Utc::now(),
            }),
        )
        .unwrap();

        let loaded = d.load::<Supplier>(id.aggregate_id()).unwrap().unwrap();
        assert_eq!(loaded.status(), SupplierStatus::Inactive);
        assert_eq!(loaded.history().len(), 2);
    }

    #[test]
    fn ids_of_another_document_kind_are_not_found() {
        let d = dispatcher();
        let id = SupplierId::new(AggregateId::new());
        d.dispatch::<Supplier>(id.aggregate_id(), register(id)).unwrap();

        let err = d
            .load::<procureflow_sourcing::MaterialRequest>(id.aggregate_id())
            .unwrap_err();
        assert!(matches!(err, DispatchError::NotFound));
    }
}
