//! Projection cursors.
//!
//! A cursor is the last sequence number a projection has applied for one
//! document stream. Replays at or below the cursor are ignored, which makes
//! every projection safe under at-least-once delivery.

use std::collections::HashMap;
use std::sync::RwLock;

use procureflow_core::AggregateId;

/// Cursor persistence, keyed by projection name and document stream.
pub trait ProjectionCursorStore: Send + Sync {
    fn get_cursor(&self, projection_name: &str, aggregate_id: AggregateId) -> Option<u64>;
    fn update_cursor(&self, projection_name: &str, aggregate_id: AggregateId, sequence_number: u64);
    /// Forget every cursor of a projection (rebuild support).
    fn clear_cursors(&self, projection_name: &str);
}

#[derive(Debug, Default)]
pub struct InMemoryCursorStore {
    cursors: RwLock<HashMap<(String, AggregateId), u64>>,
}

impl InMemoryCursorStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ProjectionCursorStore for InMemoryCursorStore {
    fn get_cursor(&self, projection_name: &str, aggregate_id: AggregateId) -> Option<u64> {
        let cursors = self.cursors.read().ok()?;
        cursors.get(&(projection_name.to_string(), aggregate_id)).copied()
    }

    fn update_cursor(&self, projection_name: &str, aggregate_id: AggregateId, sequence_number: u64) {
        if let Ok(mut cursors) = self.cursors.write() {
            cursors.insert((projection_name.to_string(), aggregate_id), sequence_number);
        }
    }

    fn clear_cursors(&self, projection_name: &str) {
        if let Ok(mut cursors) = self.cursors.write() {
            cursors.retain(|(name, _), _| name != projection_name);
        }
    }
}

/// What to do with an incoming event given the stream's cursor.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum CursorDecision {
    Apply,
    /// Already applied (re-delivery).
    Skip,
    /// Sequence 0 or a gap in the stream.
    Gap { last: u64, found: u64 },
}

pub fn decide(last: u64, found: u64) -> CursorDecision {
    if found == 0 {
        CursorDecision::Gap { last, found }
    } else if found <= last {
        CursorDecision::Skip
    } else if found != last + 1 {
        CursorDecision::Gap { last, found }
    } else {
        CursorDecision::Apply
    }
}
