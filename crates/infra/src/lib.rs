//! Infrastructure layer: event store, command dispatch, read models,
//! projections and the procurement flow.

pub mod command_dispatcher;
pub mod document;
pub mod event_store;
pub mod flow;
pub mod numbering;
pub mod projections;
pub mod read_model;
pub mod workers;
