use std::sync::Arc;

use axum::{
    extract::Extension,
    response::{sse::Event as SseEvent, IntoResponse},
    Json,
};
use serde_json::json;

use procureflow_auth::permissions_for_roles;

use crate::app::services::{self, AppServices};
use crate::context::PrincipalContext;

pub async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

pub async fn whoami(Extension(principal): Extension<PrincipalContext>) -> impl IntoResponse {
    let permissions = permissions_for_roles(principal.roles());
    Json(json!({
        "user_id": principal.user_id().to_string(),
        "name": principal.principal().name,
        "roles": principal.roles().iter().map(|r| r.as_str()).collect::<Vec<_>>(),
        "permissions": permissions.iter().map(|p| p.as_str()).collect::<Vec<_>>(),
    }))
}

/// Status notifications for every committed document change.
pub async fn stream(
    Extension(services): Extension<Arc<AppServices>>,
) -> axum::response::Sse<impl tokio_stream::Stream<Item = Result<SseEvent, std::convert::Infallible>>> {
    services::sse_stream(services.subscribe_realtime())
}
