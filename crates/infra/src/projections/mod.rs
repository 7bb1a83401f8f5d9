//! Projections (read model builders).
//!
//! Projections consume committed event envelopes and build query-oriented
//! read models. All projections are:
//! - **Rebuildable**: reconstructed from `EventStore::load_all`
//! - **Idempotent**: per-stream cursors make re-delivery harmless

use serde_json::Value as JsonValue;
use thiserror::Error;

use procureflow_events::EventEnvelope;

pub mod approvals_inbox;
pub mod cursor;
pub mod documents;
pub mod read_models;
pub mod status_history;

pub use approvals_inbox::{ApprovalsInbox, InboxItem};
pub use cursor::{InMemoryCursorStore, ProjectionCursorStore};
pub use documents::DocumentProjection;
pub use read_models::{ReadModels, RebuildError};
pub use status_history::{HistoryEntry, StatusHistoryProjection};

#[derive(Debug, Error)]
pub enum ProjectionError {
    #[error("failed to deserialize event: {0}")]
    Deserialize(String),
    #[error("non-monotonic sequence number (last={last}, found={found})")]
    NonMonotonicSequence { last: u64, found: u64 },
}

/// A read model fed from the event bus.
pub trait Projection: Send + Sync {
    fn name(&self) -> &str;

    fn apply_envelope(&self, envelope: &EventEnvelope<JsonValue>) -> Result<(), ProjectionError>;

    /// Clear the read model and its cursors, then replay `envelopes`.
    fn rebuild_from_scratch(&self, envelopes: Vec<EventEnvelope<JsonValue>>) -> Result<(), ProjectionError>;
}

/// Group envelopes by stream, each in sequence order.
pub(crate) fn sort_for_replay(mut envelopes: Vec<EventEnvelope<JsonValue>>) -> Vec<EventEnvelope<JsonValue>> {
    envelopes.sort_by_key(|e| (*e.aggregate_id().as_uuid().as_bytes(), e.sequence_number()));
    envelopes
}
