//! Approval routing: the authorization matrix and multi-level approval chains.
//!
//! Pure domain logic (no IO). Documents that need approval (quote approvals,
//! purchase requisitions) snapshot a chain resolved from the matrix when they
//! are created, then record one decision per level.

pub mod chain;
pub mod matrix;

pub use chain::{ApprovalChain, ApprovalLevel, ApprovalOutcome, LevelDecision};
pub use matrix::{AuthorizationMatrix, DocumentType, MatrixRule};
