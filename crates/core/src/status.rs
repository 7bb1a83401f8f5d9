//! Status history entries (audit trail on every document).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::actor::Actor;

/// One recorded status transition.
///
/// `from` is `None` for the entry written when the document is created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusChange<S> {
    pub from: Option<S>,
    pub to: S,
    pub at: DateTime<Utc>,
    pub actor: Actor,
    pub note: Option<String>,
}

impl<S: Copy> StatusChange<S> {
    pub fn initial(to: S, at: DateTime<Utc>, actor: &Actor) -> Self {
        Self {
            from: None,
            to,
            at,
            actor: actor.clone(),
            note: None,
        }
    }

    pub fn transition(
        from: S,
        to: S,
        at: DateTime<Utc>,
        actor: &Actor,
        note: Option<String>,
    ) -> Self {
        Self {
            from: Some(from),
            to,
            at,
            actor: actor.clone(),
            note,
        }
    }
}
