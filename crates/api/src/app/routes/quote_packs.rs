use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Extension, Path},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;

use procureflow_approvals::DocumentType;
use procureflow_core::{Aggregate, AggregateId};
use procureflow_infra::numbering::NumberSeries;
use procureflow_sourcing::{
    MaterialRequest, MaterialRequestStatus, Quote, QuoteApproval, QuoteApprovalCommand,
    QuoteApprovalId, QuoteId, QuotePack, QuotePackCommand, QuotePackId, QuoteStatus,
    QuoteSummary, RequestQuoteApproval, StartApproval, compare,
};

use crate::app::dto;
use crate::app::errors::{parse_id, ApiError, ApiResult};
use crate::app::services::AppServices;
use crate::authz;
use crate::context::PrincipalContext;

pub fn router() -> Router {
    Router::new()
        .route("/:id", get(get_quote_pack))
        .route("/:id/approval", post(request_approval))
}

pub async fn get_quote_pack(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> ApiResult<Json<dto::QuotePackView>> {
    authz::require(&principal, authz::READ)?;
    let pack_id: QuotePackId = parse_id(&id, "quote pack id")?;
    let pack = services.load::<QuotePack>(pack_id.aggregate_id())?;
    Ok(Json(pack.into()))
}

/// Put the selected quote of a pack up for approval.
///
/// The approval chain is resolved from the matrix (MR department, selected
/// quote total) and snapshotted on the new quote approval; the pack is then
/// locked until the approval is decided.
///
/// Only a still-submitted quote can be selected, and only while the MR sits
/// at `quotes_received`. The lowest quote is ranked over submitted quotes.
pub async fn request_approval(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    body: Result<Json<dto::RequestQuoteApprovalRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<QuoteApproval>)> {
    authz::require(&principal, authz::QUOTE_APPROVALS_REQUEST)?;
    let pack_id: QuotePackId = parse_id(&id, "quote pack id")?;
    let Json(body) = body?;
    let quote_id: QuoteId = parse_id(&body.quote_id, "quote_id")?;

    let pack = services.load::<QuotePack>(pack_id.aggregate_id())?;
    let entry = pack
        .entry(quote_id)
        .cloned()
        .ok_or_else(|| ApiError::validation("selected quote is not part of this pack"))?;
    let (Some(rfq_id), Some(mr_id)) = (pack.rfq_id(), pack.mr_id()) else {
        return Err(ApiError::invariant("quote pack is incomplete"));
    };

    let mr = services
        .try_load::<MaterialRequest>(mr_id.aggregate_id())?
        .ok_or_else(|| ApiError::not_found("material request"))?;
    if mr.status() != MaterialRequestStatus::QuotesReceived {
        return Err(ApiError::invariant(format!(
            "material request is {}, expected quotes_received",
            mr.status().as_str()
        )));
    }

    let submitted = submitted_entries(&services, pack.entries())?;
    if !submitted.iter().any(|e| e.quote_id == quote_id) {
        return Err(ApiError::invariant("selected quote is no longer submitted"));
    }
    let lowest_quote_id = compare(&submitted).lowest_total.unwrap_or(quote_id);

    let now = Utc::now();
    let approval_id = QuoteApprovalId::new(AggregateId::new());
    let start = QuotePackCommand::StartApproval(StartApproval {
        pack_id,
        approval_id,
        quote_id,
        actor: principal.actor(),
        occurred_at: now,
    });
    // The pack must accept the approval before anything is committed.
    pack.handle(&start)?;

    let levels = services.resolve_levels(
        DocumentType::QuoteApproval,
        Some(mr.department()),
        entry.total.amount_minor,
    )?;

    let request = QuoteApprovalCommand::Request(RequestQuoteApproval {
        approval_id,
        approval_number: services.next_number(NumberSeries::QuoteApproval),
        quote_pack_id: pack_id,
        rfq_id,
        mr_id,
        selected_quote_id: quote_id,
        lowest_quote_id,
        supplier_id: entry.supplier_id,
        amount: entry.total,
        justification: body.justification,
        department: mr.department().to_string(),
        levels,
        actor: principal.actor(),
        occurred_at: now,
    });
    let approval = services.dispatch::<QuoteApproval>(approval_id.aggregate_id(), request)?;

    services.dispatch::<QuotePack>(pack_id.aggregate_id(), start)?;
    tracing::info!(
        %pack_id,
        %approval_id,
        levels = approval.chain().levels().len(),
        "quote approval requested"
    );
    Ok((StatusCode::CREATED, Json(approval)))
}

fn submitted_entries(services: &AppServices, entries: &[QuoteSummary]) -> ApiResult<Vec<QuoteSummary>> {
    let mut submitted = Vec::with_capacity(entries.len());
    for entry in entries {
        let quote = services.load::<Quote>(entry.quote_id.aggregate_id())?;
        if quote.status() == QuoteStatus::Submitted {
            submitted.push(entry.clone());
        }
    }
    Ok(submitted)
}
