use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use procureflow_approvals::DocumentType;
use procureflow_auth::Role;
use procureflow_purchasing::Receipt;
use procureflow_sourcing::{Priority, QuoteComparison, QuoteLine, QuotePack, RequestLine};

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize)]
pub struct RegisterSupplierRequest {
    pub code: String,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    #[serde(default)]
    pub categories: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateSupplierRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub categories: Option<Vec<String>>,
}

#[derive(Debug, Default, Deserialize)]
pub struct OptionalReasonRequest {
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ReasonRequest {
    pub reason: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct CommentRequest {
    pub comment: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateMaterialRequestRequest {
    pub title: String,
    pub department: String,
    pub project: Option<String>,
    pub required_by: NaiveDate,
    #[serde(default)]
    pub priority: Priority,
    pub lines: Vec<RequestLine>,
}

#[derive(Debug, Deserialize)]
pub struct CreateRfqRequest {
    pub mr_id: String,
    pub title: Option<String>,
    #[serde(default)]
    pub supplier_ids: Vec<String>,
    pub response_due: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct InviteSupplierRequest {
    pub supplier_id: String,
}

#[derive(Debug, Deserialize)]
pub struct SubmitQuoteRequest {
    pub rfq_id: String,
    pub supplier_id: String,
    pub currency: String,
    pub lines: Vec<QuoteLine>,
    pub valid_until: NaiveDate,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RequestQuoteApprovalRequest {
    pub quote_id: String,
    pub justification: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct AcknowledgeRequest {
    pub supplier_reference: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ReceiveGoodsRequest {
    pub receipts: Vec<Receipt>,
}

#[derive(Debug, Deserialize)]
pub struct ResolveMatrixRequest {
    pub document_type: DocumentType,
    pub department: Option<String>,
    pub amount_minor: u64,
}

// -------------------------
// Query parameters
// -------------------------

#[derive(Debug, Default, Deserialize)]
pub struct StatusFilter {
    pub status: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RfqFilter {
    pub mr_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct QuoteFilter {
    pub rfq_id: Option<String>,
}

// -------------------------
// Response DTOs
// -------------------------

/// A quote pack together with its comparison.
#[derive(Debug, Serialize)]
pub struct QuotePackView {
    #[serde(flatten)]
    pub pack: QuotePack,
    pub comparison: QuoteComparison,
}

impl From<QuotePack> for QuotePackView {
    fn from(pack: QuotePack) -> Self {
        Self {
            comparison: pack.compare(),
            pack,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ResolvedLevels {
    pub document_type: DocumentType,
    pub department: Option<String>,
    pub amount_minor: u64,
    pub levels: Vec<Role>,
}
