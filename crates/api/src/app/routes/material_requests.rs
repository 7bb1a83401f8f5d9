use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Extension, Path, Query},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;

use procureflow_core::AggregateId;
use procureflow_infra::numbering::NumberSeries;
use procureflow_sourcing::{
    CancelMaterialRequest, CreateMaterialRequest, MaterialRequest, MaterialRequestCommand,
    MaterialRequestId, MaterialRequestStatus, SubmitMaterialRequest,
};

use crate::app::dto;
use crate::app::errors::{parse_id, ApiError, ApiResult};
use crate::app::services::AppServices;
use crate::authz;
use crate::context::PrincipalContext;

pub fn router() -> Router {
    Router::new()
        .route("/", post(create_material_request).get(list_material_requests))
        .route("/:id", get(get_material_request))
        .route("/:id/submit", post(submit_material_request))
        .route("/:id/cancel", post(cancel_material_request))
}

pub async fn create_material_request(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    body: Result<Json<dto::CreateMaterialRequestRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<MaterialRequest>)> {
    authz::require(&principal, authz::MRS_CREATE)?;
    let Json(body) = body?;

    let mr_id = MaterialRequestId::new(AggregateId::new());
    let cmd = MaterialRequestCommand::Create(CreateMaterialRequest {
        mr_id,
        mr_number: services.next_number(NumberSeries::MaterialRequest),
        title: body.title,
        department: body.department,
        project: body.project,
        required_by: body.required_by,
        priority: body.priority,
        lines: body.lines,
        actor: principal.actor(),
        occurred_at: Utc::now(),
    });

    let mr = services.dispatch::<MaterialRequest>(mr_id.aggregate_id(), cmd)?;
    tracing::info!(mr_id = %mr_id, mr_number = mr.mr_number(), "material request created");
    Ok((StatusCode::CREATED, Json(mr)))
}

pub async fn list_material_requests(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Query(filter): Query<dto::StatusFilter>,
) -> ApiResult<Json<Vec<MaterialRequest>>> {
    authz::require(&principal, authz::READ)?;

    let status = filter
        .status
        .as_deref()
        .map(|s| {
            MaterialRequestStatus::parse(s)
                .ok_or_else(|| ApiError::validation(format!("unknown material request status '{s}'")))
        })
        .transpose()?;

    let mut mrs: Vec<MaterialRequest> = services
        .read_models()
        .material_requests
        .list()
        .into_iter()
        .filter(|mr| status.is_none_or(|s| mr.status() == s))
        .collect();
    mrs.sort_by(|a, b| a.mr_number().cmp(b.mr_number()));
    Ok(Json(mrs))
}

pub async fn get_material_request(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> ApiResult<Json<MaterialRequest>> {
    authz::require(&principal, authz::READ)?;
    let mr_id: MaterialRequestId = parse_id(&id, "material request id")?;
    Ok(Json(services.load::<MaterialRequest>(mr_id.aggregate_id())?))
}

pub async fn submit_material_request(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> ApiResult<Json<MaterialRequest>> {
    authz::require(&principal, authz::MRS_SUBMIT)?;
    let mr_id: MaterialRequestId = parse_id(&id, "material request id")?;

    let cmd = MaterialRequestCommand::Submit(SubmitMaterialRequest {
        mr_id,
        actor: principal.actor(),
        occurred_at: Utc::now(),
    });
    Ok(Json(services.dispatch::<MaterialRequest>(mr_id.aggregate_id(), cmd)?))
}

pub async fn cancel_material_request(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    body: Result<Json<dto::ReasonRequest>, JsonRejection>,
) -> ApiResult<Json<MaterialRequest>> {
    authz::require(&principal, authz::MRS_CANCEL)?;
    let mr_id: MaterialRequestId = parse_id(&id, "material request id")?;
    let Json(body) = body?;

    let cmd = MaterialRequestCommand::Cancel(CancelMaterialRequest {
        mr_id,
        reason: body.reason,
        actor: principal.actor(),
        occurred_at: Utc::now(),
    });
    Ok(Json(services.dispatch::<MaterialRequest>(mr_id.aggregate_id(), cmd)?))
}
