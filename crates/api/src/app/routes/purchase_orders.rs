use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Extension, Path, Query},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;

use procureflow_purchasing::{
    Acknowledge, CancelPurchaseOrder, ClosePurchaseOrder, PurchaseOrder, PurchaseOrderCommand,
    PurchaseOrderId, PurchaseOrderStatus, ReceiveGoods, SendPurchaseOrder,
};

use crate::app::dto;
use crate::app::errors::{optional_body, parse_id, ApiError, ApiResult};
use crate::app::routes::suppliers::active_supplier;
use crate::app::services::AppServices;
use crate::authz;
use crate::context::PrincipalContext;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_purchase_orders))
        .route("/:id", get(get_purchase_order))
        .route("/:id/send", post(send_purchase_order))
        .route("/:id/acknowledge", post(acknowledge_purchase_order))
        .route("/:id/receive", post(receive_goods))
        .route("/:id/close", post(close_purchase_order))
        .route("/:id/cancel", post(cancel_purchase_order))
}

pub async fn list_purchase_orders(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Query(filter): Query<dto::StatusFilter>,
) -> ApiResult<Json<Vec<PurchaseOrder>>> {
    authz::require(&principal, authz::READ)?;
    let status = filter
        .status
        .as_deref()
        .map(|s| {
            PurchaseOrderStatus::parse(s)
                .ok_or_else(|| ApiError::validation(format!("unknown purchase order status '{s}'")))
        })
        .transpose()?;

    let mut pos: Vec<PurchaseOrder> = services
        .read_models()
        .purchase_orders
        .list()
        .into_iter()
        .filter(|po| status.is_none_or(|s| po.status() == s))
        .collect();
    pos.sort_by(|a, b| a.po_number().cmp(b.po_number()));
    Ok(Json(pos))
}

pub async fn get_purchase_order(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> ApiResult<Json<PurchaseOrder>> {
    authz::require(&principal, authz::READ)?;
    let po_id: PurchaseOrderId = parse_id(&id, "purchase order id")?;
    Ok(Json(services.load::<PurchaseOrder>(po_id.aggregate_id())?))
}

pub async fn send_purchase_order(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> ApiResult<Json<PurchaseOrder>> {
    authz::require(&principal, authz::POS_SEND)?;
    let po_id: PurchaseOrderId = parse_id(&id, "purchase order id")?;

    let po = services.load::<PurchaseOrder>(po_id.aggregate_id())?;
    if let Some(supplier_id) = po.supplier_id() {
        active_supplier(&services, supplier_id)?;
    }

    let cmd = PurchaseOrderCommand::Send(SendPurchaseOrder {
        po_id,
        actor: principal.actor(),
        occurred_at: Utc::now(),
    });
    let po = services.dispatch::<PurchaseOrder>(po_id.aggregate_id(), cmd)?;
    tracing::info!(%po_id, po_number = po.po_number(), "purchase order sent");
    Ok(Json(po))
}

pub async fn acknowledge_purchase_order(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    body: Result<Json<dto::AcknowledgeRequest>, JsonRejection>,
) -> ApiResult<Json<PurchaseOrder>> {
    authz::require(&principal, authz::POS_ACKNOWLEDGE)?;
    let po_id: PurchaseOrderId = parse_id(&id, "purchase order id")?;

    let cmd = PurchaseOrderCommand::Acknowledge(Acknowledge {
        po_id,
        supplier_reference: optional_body(body)?.supplier_reference,
        actor: principal.actor(),
        occurred_at: Utc::now(),
    });
    Ok(Json(services.dispatch::<PurchaseOrder>(po_id.aggregate_id(), cmd)?))
}

pub async fn receive_goods(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    body: Result<Json<dto::ReceiveGoodsRequest>, JsonRejection>,
) -> ApiResult<Json<PurchaseOrder>> {
    authz::require(&principal, authz::POS_RECEIVE)?;
    let po_id: PurchaseOrderId = parse_id(&id, "purchase order id")?;
    let Json(body) = body?;

    let cmd = PurchaseOrderCommand::ReceiveGoods(ReceiveGoods {
        po_id,
        receipts: body.receipts,
        actor: principal.actor(),
        occurred_at: Utc::now(),
    });
    Ok(Json(services.dispatch::<PurchaseOrder>(po_id.aggregate_id(), cmd)?))
}

pub async fn close_purchase_order(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> ApiResult<Json<PurchaseOrder>> {
    authz::require(&principal, authz::POS_CLOSE)?;
    let po_id: PurchaseOrderId = parse_id(&id, "purchase order id")?;

    let cmd = PurchaseOrderCommand::Close(ClosePurchaseOrder {
        po_id,
        actor: principal.actor(),
        occurred_at: Utc::now(),
    });
    Ok(Json(services.dispatch::<PurchaseOrder>(po_id.aggregate_id(), cmd)?))
}

pub async fn cancel_purchase_order(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    body: Result<Json<dto::ReasonRequest>, JsonRejection>,
) -> ApiResult<Json<PurchaseOrder>> {
    authz::require(&principal, authz::POS_CANCEL)?;
    let po_id: PurchaseOrderId = parse_id(&id, "purchase order id")?;
    let Json(body) = body?;

    let cmd = PurchaseOrderCommand::Cancel(CancelPurchaseOrder {
        po_id,
        reason: body.reason,
        actor: principal.actor(),
        occurred_at: Utc::now(),
    });
    Ok(Json(services.dispatch::<PurchaseOrder>(po_id.aggregate_id(), cmd)?))
}
