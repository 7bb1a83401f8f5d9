//! Stream naming for the event-sourced documents.
//!
//! Every document kind is stored under a stable `aggregate_type` string; the
//! dispatcher, projections and the procurement flow all key off it.

use serde::Serialize;
use serde::de::DeserializeOwned;

use procureflow_core::{Aggregate, AggregateId, DomainError};
use procureflow_events::{Audited, Event};
use procureflow_purchasing::{
    PurchaseOrder, PurchaseOrderId, PurchaseRequisition, PurchaseRequisitionId,
};
use procureflow_sourcing::{
    MaterialRequest, MaterialRequestId, Quote, QuoteApproval, QuoteApprovalId, QuoteId, QuotePack,
    QuotePackId, Rfq, RfqId,
};
use procureflow_suppliers::{Supplier, SupplierId};

pub const SUPPLIER: &str = "suppliers.supplier";
pub const MATERIAL_REQUEST: &str = "sourcing.material_request";
pub const RFQ: &str = "sourcing.rfq";
pub const QUOTE: &str = "sourcing.quote";
pub const QUOTE_PACK: &str = "sourcing.quote_pack";
pub const QUOTE_APPROVAL: &str = "sourcing.quote_approval";
pub const PURCHASE_REQUISITION: &str = "purchasing.requisition";
pub const PURCHASE_ORDER: &str = "purchasing.order";

/// An aggregate that can be stored, rehydrated and projected.
pub trait Document:
    Aggregate<Error = DomainError, Event: Event + Audited + Serialize + DeserializeOwned>
    + Clone
    + Serialize
    + Send
    + Sync
    + 'static
{
    /// Stream type recorded on every stored event.
    const AGGREGATE_TYPE: &'static str;

    /// Fresh, not-yet-created instance used as the rehydration seed.
    fn seed(id: AggregateId) -> Self;

    /// Whether a creation event has been applied.
    fn exists(&self) -> bool {
        self.version() > 0
    }
}

macro_rules! document {
    ($ty:ty, $id:ty, $stream:expr) => {
        impl Document for $ty {
            const AGGREGATE_TYPE: &'static str = $stream;

            fn seed(id: AggregateId) -> Self {
                <$ty>::empty(<$id>::new(id))
            }
        }
    };
}

document!(Supplier, SupplierId, SUPPLIER);
document!(MaterialRequest, MaterialRequestId, MATERIAL_REQUEST);
document!(Rfq, RfqId, RFQ);
document!(Quote, QuoteId, QUOTE);
document!(QuotePack, QuotePackId, QUOTE_PACK);
document!(QuoteApproval, QuoteApprovalId, QUOTE_APPROVAL);
document!(PurchaseRequisition, PurchaseRequisitionId, PURCHASE_REQUISITION);
document!(PurchaseOrder, PurchaseOrderId, PURCHASE_ORDER);
