use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Extension, Path, Query},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;

use procureflow_purchasing::{
    ApproveRequisition, PurchaseRequisition, PurchaseRequisitionId, RejectRequisition,
    RequisitionCommand, RequisitionStatus,
};

use crate::app::dto;
use crate::app::errors::{optional_body, parse_id, ApiError, ApiResult};
use crate::app::services::AppServices;
use crate::authz;
use crate::context::PrincipalContext;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_requisitions))
        .route("/:id", get(get_requisition))
        .route("/:id/approve", post(approve_requisition))
        .route("/:id/reject", post(reject_requisition))
}

pub async fn list_requisitions(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Query(filter): Query<dto::StatusFilter>,
) -> ApiResult<Json<Vec<PurchaseRequisition>>> {
    authz::require(&principal, authz::READ)?;
    let status = filter
        .status
        .as_deref()
        .map(|s| {
            RequisitionStatus::parse(s)
                .ok_or_else(|| ApiError::validation(format!("unknown requisition status '{s}'")))
        })
        .transpose()?;

    let mut prs: Vec<PurchaseRequisition> = services
        .read_models()
        .requisitions
        .list()
        .into_iter()
        .filter(|pr| status.is_none_or(|s| pr.status() == s))
        .collect();
    prs.sort_by(|a, b| a.pr_number().cmp(b.pr_number()));
    Ok(Json(prs))
}

pub async fn get_requisition(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> ApiResult<Json<PurchaseRequisition>> {
    authz::require(&principal, authz::READ)?;
    let pr_id: PurchaseRequisitionId = parse_id(&id, "requisition id")?;
    Ok(Json(services.load::<PurchaseRequisition>(pr_id.aggregate_id())?))
}

pub async fn approve_requisition(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    body: Result<Json<dto::CommentRequest>, JsonRejection>,
) -> ApiResult<Json<PurchaseRequisition>> {
    authz::require(&principal, authz::PRS_DECIDE)?;
    let pr_id: PurchaseRequisitionId = parse_id(&id, "requisition id")?;

    let cmd = RequisitionCommand::Approve(ApproveRequisition {
        pr_id,
        roles: principal.roles().to_vec(),
        comment: optional_body(body)?.comment,
        actor: principal.actor(),
        occurred_at: Utc::now(),
    });
    let pr = services.dispatch::<PurchaseRequisition>(pr_id.aggregate_id(), cmd)?;
    tracing::info!(%pr_id, status = pr.status().as_str(), "requisition level approved");
    Ok(Json(pr))
}

pub async fn reject_requisition(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    body: Result<Json<dto::ReasonRequest>, JsonRejection>,
) -> ApiResult<Json<PurchaseRequisition>> {
    authz::require(&principal, authz::PRS_DECIDE)?;
    let pr_id: PurchaseRequisitionId = parse_id(&id, "requisition id")?;
    let Json(body) = body?;

    let cmd = RequisitionCommand::Reject(RejectRequisition {
        pr_id,
        roles: principal.roles().to_vec(),
        reason: body.reason,
        actor: principal.actor(),
        occurred_at: Utc::now(),
    });
    Ok(Json(services.dispatch::<PurchaseRequisition>(pr_id.aggregate_id(), cmd)?))
}
