//! Supplier master data (event-sourced, soft-deactivated, never deleted).

pub mod supplier;

pub use supplier::{
    ContactInfo, Deactivate, Reactivate, RegisterSupplier, Supplier, SupplierCommand,
    SupplierDeactivated, SupplierEvent, SupplierId, SupplierReactivated, SupplierRegistered,
    SupplierStatus, SupplierUpdated, UpdateDetails, normalize_code,
};
