//! `procureflow-auth` — authorization boundary (roles, permissions, policy).
//!
//! This crate is intentionally decoupled from HTTP and storage. Identity is
//! established upstream; this crate only answers "may this principal do X".

pub mod authorize;
pub mod permissions;
pub mod policy;
pub mod principal;
pub mod roles;

pub use authorize::{AuthzError, authorize};
pub use permissions::Permission;
pub use policy::permissions_for_roles;
pub use principal::Principal;
pub use roles::Role;
