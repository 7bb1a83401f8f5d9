//! Who performed an action.

use serde::{Deserialize, Serialize};

use crate::id::UserId;

/// The user (or the system) behind a command.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Actor {
    pub user_id: UserId,
    pub name: String,
}

impl Actor {
    pub fn new(user_id: UserId, name: impl Into<String>) -> Self {
        Self {
            user_id,
            name: name.into(),
        }
    }

    /// Actor recorded for automated workflow transitions.
    pub fn system() -> Self {
        Self::new(UserId::system(), "system")
    }
}
