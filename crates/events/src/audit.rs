use procureflow_core::Actor;

/// Status entry carried by a status-changing event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditRecord {
    /// Status the document is in after the event (wire name, e.g. `"rfq_sent"`).
    pub status: &'static str,
    pub actor: Actor,
    pub note: Option<String>,
}

/// Events that may move a document to a new status.
///
/// Consumed by the status-history projection; events that do not change the
/// status return `None`.
pub trait Audited {
    fn audit_record(&self) -> Option<AuditRecord>;
}
