use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    routing::get,
    Json, Router,
};

use procureflow_core::AggregateId;
use procureflow_infra::projections::status_history::HistoryEntry;

use crate::app::errors::{parse_id, ApiError, ApiResult};
use crate::app::services::AppServices;
use crate::authz;
use crate::context::PrincipalContext;

pub fn router() -> Router {
    Router::new().route("/:document_id", get(document_history))
}

/// Status transitions of any procurement document, oldest first.
pub async fn document_history(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(document_id): Path<String>,
) -> ApiResult<Json<Vec<HistoryEntry>>> {
    authz::require(&principal, authz::READ)?;
    let document_id: AggregateId = parse_id(&document_id, "document id")?;

    let entries = services.read_models().history.for_document(document_id);
    if entries.is_empty() {
        return Err(ApiError::not_found("document history"));
    }
    Ok(Json(entries))
}
