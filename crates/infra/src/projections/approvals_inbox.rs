//! Approvals inbox: documents waiting on a decision the caller may take.
//!
//! Read over the quote approval and requisition snapshots; an item is listed
//! when its current level could be decided by the caller right now.

use std::sync::Arc;

use serde::Serialize;

use procureflow_approvals::ApprovalChain;
use procureflow_auth::Role;
use procureflow_core::{Actor, AggregateId, AggregateRoot, Money};
use procureflow_purchasing::{PurchaseRequisition, RequisitionStatus};
use procureflow_sourcing::{MaterialRequestId, QuoteApproval, QuoteApprovalStatus};

use crate::projections::documents::DocumentProjection;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InboxItem {
    pub document_type: &'static str,
    pub document_id: AggregateId,
    pub number: String,
    pub mr_id: Option<MaterialRequestId>,
    pub department: String,
    pub amount: Option<Money>,
    pub level: u32,
    pub role: Role,
    pub total_levels: usize,
}

#[derive(Debug, Clone)]
pub struct ApprovalsInbox {
    quote_approvals: Arc<DocumentProjection<QuoteApproval>>,
    requisitions: Arc<DocumentProjection<PurchaseRequisition>>,
}

impl ApprovalsInbox {
    pub fn new(
        quote_approvals: Arc<DocumentProjection<QuoteApproval>>,
        requisitions: Arc<DocumentProjection<PurchaseRequisition>>,
    ) -> Self {
        Self {
            quote_approvals,
            requisitions,
        }
    }

    pub fn pending_for(&self, actor: &Actor, roles: &[Role]) -> Vec<InboxItem> {
        let approvals = self
            .quote_approvals
            .list()
            .into_iter()
            .filter(|qa| qa.status() == QuoteApprovalStatus::Pending)
            .filter_map(|qa| {
                item(
                    "quote_approval",
                    qa.id().aggregate_id(),
                    qa.approval_number(),
                    qa.mr_id(),
                    qa.department(),
                    qa.amount(),
                    qa.chain(),
                    actor,
                    roles,
                )
            });

        let requisitions = self
            .requisitions
            .list()
            .into_iter()
            .filter(|pr| pr.status() == RequisitionStatus::PendingApproval)
            .filter_map(|pr| {
                item(
                    "purchase_requisition",
                    pr.id().aggregate_id(),
                    pr.pr_number(),
                    pr.mr_id(),
                    pr.department(),
                    pr.amount(),
                    pr.chain(),
                    actor,
                    roles,
                )
            });

        let mut items: Vec<InboxItem> = approvals.chain(requisitions).collect();
        items.sort_by(|a, b| a.number.cmp(&b.number));
        items
    }
}

#[allow(clippy::too_many_arguments)]
fn item(
    document_type: &'static str,
    document_id: AggregateId,
    number: &str,
    mr_id: Option<MaterialRequestId>,
    department: &str,
    amount: Option<&Money>,
    chain: &ApprovalChain,
    actor: &Actor,
    roles: &[Role],
) -> Option<InboxItem> {
    let level = chain.authorize_decision(actor, roles).ok()?;
    let current = chain.current_level()?;
    Some(InboxItem {
        document_type,
        document_id,
        number: number.to_string(),
        mr_id,
        department: department.to_string(),
        amount: amount.cloned(),
        level,
        role: current.role.clone(),
        total_levels: chain.levels().len(),
    })
}
