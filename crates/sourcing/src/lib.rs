//! Sourcing domain: material requests, RFQs, supplier quotes, quote packs
//! (comparison) and quote approvals.
//!
//! Pure, deterministic domain logic (no IO, no HTTP, no storage).

pub mod material_request;
pub mod quote;
pub mod quote_approval;
pub mod quote_pack;
pub mod rfq;

pub use material_request::{
    AdvanceMaterialRequest, CancelMaterialRequest, CreateMaterialRequest, MaterialRequest,
    MaterialRequestCommand, MaterialRequestCreated, MaterialRequestEvent, MaterialRequestId,
    MaterialRequestStatus, MaterialRequestStatusChanged, Priority, RequestLine,
    SubmitMaterialRequest,
};
pub use quote::{
    AcceptQuote, Quote, QuoteAccepted, QuoteCommand, QuoteEvent, QuoteId, QuoteLine,
    QuoteRejected, QuoteStatus, QuoteSubmitted, QuoteWithdrawn, RejectQuote, SubmitQuote,
    WithdrawQuote, lines_total,
};
pub use quote_approval::{
    ApproveQuoteApproval, QuoteApproval, QuoteApprovalApproved, QuoteApprovalCommand,
    QuoteApprovalEvent, QuoteApprovalId, QuoteApprovalLevelDecided, QuoteApprovalRejected,
    QuoteApprovalRequested, QuoteApprovalStatus, RejectQuoteApproval, RequestQuoteApproval,
};
pub use quote_pack::{
    CreateQuotePack, QuoteComparison, QuotePack, QuotePackApprovalStarted, QuotePackCommand,
    QuotePackCreated, QuotePackDecided, QuotePackEvent, QuotePackId, QuotePackStatus,
    QuoteSummary, RankedQuote, RecordDecision, StartApproval, compare,
};
pub use rfq::{
    CancelRfq, CloseRfq, CreateRfq, InviteSupplier, QuoteRecorded, ReceivedQuote, RecordQuote,
    Rfq, RfqCancelled, RfqClosed, RfqCommand, RfqCreated, RfqEvent, RfqId, RfqSent, RfqStatus,
    SendRfq, SupplierInvited,
};
