use procureflow_auth::{Principal, Role};
use procureflow_core::{Actor, UserId};

/// Principal context for a request (identity supplied upstream + roles).
///
/// Inserted by the identity middleware; present for every `/api` route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrincipalContext {
    principal: Principal,
}

impl PrincipalContext {
    pub fn new(principal: Principal) -> Self {
        Self { principal }
    }

    pub fn principal(&self) -> &Principal {
        &self.principal
    }

    pub fn user_id(&self) -> UserId {
        self.principal.user_id
    }

    pub fn roles(&self) -> &[Role] {
        &self.principal.roles
    }

    pub fn actor(&self) -> Actor {
        self.principal.actor()
    }
}
