use serde::{Deserialize, Serialize};

use procureflow_core::{Actor, UserId};

use crate::Role;

/// An identified caller together with its roles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub user_id: UserId,
    pub name: String,
    pub roles: Vec<Role>,
}

impl Principal {
    pub fn new(user_id: UserId, name: impl Into<String>, roles: Vec<Role>) -> Self {
        Self {
            user_id,
            name: name.into(),
            roles,
        }
    }

    /// The actor recorded on documents for commands issued by this principal.
    pub fn actor(&self) -> Actor {
        Actor::new(self.user_id, self.name.clone())
    }
}
