use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Extension, Path, Query},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;

use procureflow_sourcing::{
    ApproveQuoteApproval, QuoteApproval, QuoteApprovalCommand, QuoteApprovalId,
    QuoteApprovalStatus, RejectQuoteApproval,
};

use crate::app::dto;
use crate::app::errors::{optional_body, parse_id, ApiError, ApiResult};
use crate::app::services::AppServices;
use crate::authz;
use crate::context::PrincipalContext;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_quote_approvals))
        .route("/:id", get(get_quote_approval))
        .route("/:id/approve", post(approve_quote_approval))
        .route("/:id/reject", post(reject_quote_approval))
}

pub async fn list_quote_approvals(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Query(filter): Query<dto::StatusFilter>,
) -> ApiResult<Json<Vec<QuoteApproval>>> {
    authz::require(&principal, authz::READ)?;
    let status = filter
        .status
        .as_deref()
        .map(|s| {
            QuoteApprovalStatus::parse(s)
                .ok_or_else(|| ApiError::validation(format!("unknown quote approval status '{s}'")))
        })
        .transpose()?;

    let mut approvals: Vec<QuoteApproval> = services
        .read_models()
        .quote_approvals
        .list()
        .into_iter()
        .filter(|qa| status.is_none_or(|s| qa.status() == s))
        .collect();
    approvals.sort_by(|a, b| a.approval_number().cmp(b.approval_number()));
    Ok(Json(approvals))
}

pub async fn get_quote_approval(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> ApiResult<Json<QuoteApproval>> {
    authz::require(&principal, authz::READ)?;
    let approval_id: QuoteApprovalId = parse_id(&id, "quote approval id")?;
    Ok(Json(services.load::<QuoteApproval>(approval_id.aggregate_id())?))
}

/// Approve the current level. The caller's roles are checked against the
/// level's role by the approval chain itself.
pub async fn approve_quote_approval(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    body: Result<Json<dto::CommentRequest>, JsonRejection>,
) -> ApiResult<Json<QuoteApproval>> {
    authz::require(&principal, authz::QUOTE_APPROVALS_DECIDE)?;
    let approval_id: QuoteApprovalId = parse_id(&id, "quote approval id")?;

    let cmd = QuoteApprovalCommand::Approve(ApproveQuoteApproval {
        approval_id,
        roles: principal.roles().to_vec(),
        comment: optional_body(body)?.comment,
        actor: principal.actor(),
        occurred_at: Utc::now(),
    });
    Ok(Json(services.dispatch::<QuoteApproval>(approval_id.aggregate_id(), cmd)?))
}

pub async fn reject_quote_approval(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    body: Result<Json<dto::ReasonRequest>, JsonRejection>,
) -> ApiResult<Json<QuoteApproval>> {
    authz::require(&principal, authz::QUOTE_APPROVALS_DECIDE)?;
    let approval_id: QuoteApprovalId = parse_id(&id, "quote approval id")?;
    let Json(body) = body?;

    let cmd = QuoteApprovalCommand::Reject(RejectQuoteApproval {
        approval_id,
        roles: principal.roles().to_vec(),
        reason: body.reason,
        actor: principal.actor(),
        occurred_at: Utc::now(),
    });
    Ok(Json(services.dispatch::<QuoteApproval>(approval_id.aggregate_id(), cmd)?))
}
