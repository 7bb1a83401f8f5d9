use std::borrow::Cow;

use serde::{Deserialize, Serialize};

/// Role identifier used for RBAC and for approval-matrix levels.
///
/// Roles are opaque lower-case strings; the well-known ones used by the
/// default policy and matrix are provided as constants.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Role(Cow<'static, str>);

impl Role {
    pub const REQUESTER: Role = Role(Cow::Borrowed("requester"));
    pub const BUYER: Role = Role(Cow::Borrowed("buyer"));
    pub const PROCUREMENT_MANAGER: Role = Role(Cow::Borrowed("procurement_manager"));
    pub const FINANCE_MANAGER: Role = Role(Cow::Borrowed("finance_manager"));
    pub const DIRECTOR: Role = Role(Cow::Borrowed("director"));
    pub const SUPPLIER_PORTAL: Role = Role(Cow::Borrowed("supplier_portal"));
    pub const ADMIN: Role = Role(Cow::Borrowed("admin"));

    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    /// Build a role from user input (trimmed, lower-cased).
    pub fn parse(name: &str) -> Option<Self> {
        let name = name.trim().to_ascii_lowercase();
        if name.is_empty() {
            None
        } else {
            Some(Self(Cow::Owned(name)))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_admin(&self) -> bool {
        self.as_str() == "admin"
    }
}

impl core::fmt::Display for Role {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}
