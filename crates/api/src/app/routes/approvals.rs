use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Extension},
    routing::{get, post},
    Json, Router,
};

use procureflow_approvals::AuthorizationMatrix;
use procureflow_infra::projections::approvals_inbox::InboxItem;

use crate::app::dto;
use crate::app::errors::ApiResult;
use crate::app::services::AppServices;
use crate::authz;
use crate::context::PrincipalContext;

pub fn router() -> Router {
    Router::new()
        .route("/approvals/pending", get(pending_approvals))
        .route(
            "/authorization-matrix",
            get(get_matrix).put(replace_matrix),
        )
        .route("/authorization-matrix/resolve", post(resolve_matrix))
}

/// Documents whose current approval level the caller can decide.
pub async fn pending_approvals(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
) -> ApiResult<Json<Vec<InboxItem>>> {
    authz::require(&principal, authz::READ)?;
    let items = services
        .read_models()
        .inbox
        .pending_for(&principal.actor(), principal.roles());
    Ok(Json(items))
}

pub async fn get_matrix(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
) -> ApiResult<Json<AuthorizationMatrix>> {
    authz::require(&principal, authz::READ)?;
    Ok(Json(services.matrix()))
}

pub async fn replace_matrix(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    body: Result<Json<AuthorizationMatrix>, JsonRejection>,
) -> ApiResult<Json<AuthorizationMatrix>> {
    authz::require(&principal, authz::MATRIX_MANAGE)?;
    let Json(matrix) = body?;
    services.replace_matrix(matrix)?;
    tracing::info!(user_id = %principal.user_id(), "authorization matrix updated");
    Ok(Json(services.matrix()))
}

/// Preview the approval levels a document would be routed through.
pub async fn resolve_matrix(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    body: Result<Json<dto::ResolveMatrixRequest>, JsonRejection>,
) -> ApiResult<Json<dto::ResolvedLevels>> {
    authz::require(&principal, authz::READ)?;
    let Json(body) = body?;
    let levels = services.resolve_levels(
        body.document_type,
        body.department.as_deref(),
        body.amount_minor,
    )?;
    Ok(Json(dto::ResolvedLevels {
        document_type: body.document_type,
        department: body.department,
        amount_minor: body.amount_minor,
        levels,
    }))
}
