//! Purchasing domain: purchase requisitions (multi-level approval) and
//! purchase orders (dispatch and goods receipt).
//!
//! This crate contains business rules implemented purely as deterministic
//! domain logic (no IO, no HTTP, no storage).

pub mod order;
pub mod requisition;

pub use order::{
    Acknowledge, CancelPurchaseOrder, ClosePurchaseOrder, CreatePurchaseOrder, GoodsReceived,
    OrderLine, PurchaseOrder, PurchaseOrderAcknowledged, PurchaseOrderCancelled,
    PurchaseOrderClosed, PurchaseOrderCommand, PurchaseOrderCreated, PurchaseOrderEvent,
    PurchaseOrderId, PurchaseOrderSent, PurchaseOrderStatus, ReceiveGoods, Receipt,
    SendPurchaseOrder,
};
pub use requisition::{
    ApproveRequisition, CreateRequisition, PurchaseRequisition, PurchaseRequisitionId,
    RejectRequisition, RequisitionApproved, RequisitionCommand, RequisitionCreated,
    RequisitionEvent, RequisitionLevelDecided, RequisitionRejected, RequisitionStatus,
};
