//! `procureflow-core` — domain foundation building blocks.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns).

pub mod actor;
pub mod aggregate;
pub mod error;
pub mod id;
pub mod money;
pub mod status;

pub use actor::Actor;
pub use aggregate::{Aggregate, AggregateRoot, ExpectedVersion};
pub use error::{require_text, DomainError, DomainResult};
pub use id::{AggregateId, UserId};
pub use money::{Currency, Money};
pub use status::StatusChange;
