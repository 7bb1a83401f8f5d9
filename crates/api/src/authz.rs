//! API-side authorization guard.
//!
//! Enforced at the route boundary before any command is dispatched; the
//! domain only checks approver roles on chain decisions.

use procureflow_auth::{AuthzError, Permission, authorize};

use crate::context::PrincipalContext;

pub const READ: &str = "procurement.read";
pub const SUPPLIERS_MANAGE: &str = "suppliers.manage";
pub const MRS_CREATE: &str = "mrs.create";
pub const MRS_SUBMIT: &str = "mrs.submit";
pub const MRS_CANCEL: &str = "mrs.cancel";
pub const RFQS_MANAGE: &str = "rfqs.manage";
pub const QUOTES_SUBMIT: &str = "quotes.submit";
pub const QUOTES_WITHDRAW: &str = "quotes.withdraw";
pub const QUOTE_PACKS_CREATE: &str = "quote_packs.create";
pub const QUOTE_APPROVALS_REQUEST: &str = "quote_approvals.request";
pub const QUOTE_APPROVALS_DECIDE: &str = "quote_approvals.decide";
pub const PRS_DECIDE: &str = "prs.decide";
pub const POS_SEND: &str = "pos.send";
pub const POS_ACKNOWLEDGE: &str = "pos.acknowledge";
pub const POS_RECEIVE: &str = "pos.receive";
pub const POS_CLOSE: &str = "pos.close";
pub const POS_CANCEL: &str = "pos.cancel";
pub const MATRIX_MANAGE: &str = "approvals.matrix.manage";

/// Check that the caller holds `permission`.
pub fn require(principal: &PrincipalContext, permission: &'static str) -> Result<(), AuthzError> {
    authorize(principal.principal(), &Permission::new(permission))
}
