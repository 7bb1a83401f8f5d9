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
    CancelRfq, CloseRfq, CreateQuotePack, CreateRfq, InviteSupplier, MaterialRequest,
    MaterialRequestId, Quote, QuotePack, QuotePackCommand, QuotePackId, QuoteStatus, QuoteSummary,
    Rfq, RfqCommand, RfqId, RfqStatus, SendRfq,
};
use procureflow_suppliers::SupplierId;

use crate::app::dto;
use crate::app::errors::{parse_id, ApiError, ApiResult};
use crate::app::routes::suppliers::active_supplier;
use crate::app::services::AppServices;
use crate::authz;
use crate::context::PrincipalContext;

pub fn router() -> Router {
    Router::new()
        .route("/", post(create_rfq).get(list_rfqs))
        .route("/:id", get(get_rfq))
        .route("/:id/suppliers", post(invite_supplier))
        .route("/:id/send", post(send_rfq))
        .route("/:id/close", post(close_rfq))
        .route("/:id/cancel", post(cancel_rfq))
        .route("/:id/quote-pack", post(create_quote_pack))
}

pub async fn create_rfq(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    body: Result<Json<dto::CreateRfqRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Rfq>)> {
    authz::require(&principal, authz::RFQS_MANAGE)?;
    let Json(body) = body?;

    let mr_id: MaterialRequestId = parse_id(&body.mr_id, "mr_id")?;
    let mr = services
        .try_load::<MaterialRequest>(mr_id.aggregate_id())?
        .ok_or_else(|| ApiError::not_found("material request"))?;
    if !mr.accepts_rfqs() {
        return Err(ApiError::invariant(format!(
            "material request {} is {} and cannot be sourced",
            mr.mr_number(),
            mr.status().as_str()
        )));
    }

    let mut supplier_ids: Vec<SupplierId> = Vec::with_capacity(body.supplier_ids.len());
    for raw in &body.supplier_ids {
        let supplier_id: SupplierId = parse_id(raw, "supplier_id")?;
        active_supplier(&services, supplier_id)?;
        supplier_ids.push(supplier_id);
    }

    let rfq_id = RfqId::new(AggregateId::new());
    let cmd = RfqCommand::Create(CreateRfq {
        rfq_id,
        rfq_number: services.next_number(NumberSeries::Rfq),
        mr_id,
        title: body.title.unwrap_or_else(|| mr.title().to_string()),
        lines: mr.lines().to_vec(),
        supplier_ids,
        response_due: body.response_due,
        actor: principal.actor(),
        occurred_at: Utc::now(),
    });

    let rfq = services.dispatch::<Rfq>(rfq_id.aggregate_id(), cmd)?;
    Ok((StatusCode::CREATED, Json(rfq)))
}

pub async fn list_rfqs(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Query(filter): Query<dto::RfqFilter>,
) -> ApiResult<Json<Vec<Rfq>>> {
    authz::require(&principal, authz::READ)?;
    let mr_id: Option<MaterialRequestId> = filter
        .mr_id
        .as_deref()
        .map(|raw| parse_id(raw, "mr_id"))
        .transpose()?;

    let mut rfqs: Vec<Rfq> = services
        .read_models()
        .rfqs
        .list()
        .into_iter()
        .filter(|rfq| mr_id.is_none_or(|id| rfq.mr_id() == Some(id)))
        .collect();
    rfqs.sort_by(|a, b| a.rfq_number().cmp(b.rfq_number()));
    Ok(Json(rfqs))
}

pub async fn get_rfq(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> ApiResult<Json<Rfq>> {
    authz::require(&principal, authz::READ)?;
    let rfq_id: RfqId = parse_id(&id, "rfq id")?;
    Ok(Json(services.load::<Rfq>(rfq_id.aggregate_id())?))
}

pub async fn invite_supplier(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    body: Result<Json<dto::InviteSupplierRequest>, JsonRejection>,
) -> ApiResult<Json<Rfq>> {
    authz::require(&principal, authz::RFQS_MANAGE)?;
    let rfq_id: RfqId = parse_id(&id, "rfq id")?;
    let Json(body) = body?;
    let supplier_id: SupplierId = parse_id(&body.supplier_id, "supplier_id")?;
    active_supplier(&services, supplier_id)?;

    let cmd = RfqCommand::InviteSupplier(InviteSupplier {
        rfq_id,
        supplier_id,
        actor: principal.actor(),
        occurred_at: Utc::now(),
    });
    Ok(Json(services.dispatch::<Rfq>(rfq_id.aggregate_id(), cmd)?))
}

pub async fn send_rfq(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> ApiResult<Json<Rfq>> {
    authz::require(&principal, authz::RFQS_MANAGE)?;
    let rfq_id: RfqId = parse_id(&id, "rfq id")?;

    let cmd = RfqCommand::Send(SendRfq {
        rfq_id,
        actor: principal.actor(),
        occurred_at: Utc::now(),
    });
    Ok(Json(services.dispatch::<Rfq>(rfq_id.aggregate_id(), cmd)?))
}

pub async fn close_rfq(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> ApiResult<Json<Rfq>> {
    authz::require(&principal, authz::RFQS_MANAGE)?;
    let rfq_id: RfqId = parse_id(&id, "rfq id")?;

    let cmd = RfqCommand::Close(CloseRfq {
        rfq_id,
        actor: principal.actor(),
        occurred_at: Utc::now(),
    });
    Ok(Json(services.dispatch::<Rfq>(rfq_id.aggregate_id(), cmd)?))
}

pub async fn cancel_rfq(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    body: Result<Json<dto::ReasonRequest>, JsonRejection>,
) -> ApiResult<Json<Rfq>> {
    authz::require(&principal, authz::RFQS_MANAGE)?;
    let rfq_id: RfqId = parse_id(&id, "rfq id")?;
    let Json(body) = body?;

    let cmd = RfqCommand::Cancel(CancelRfq {
        rfq_id,
        reason: body.reason,
        actor: principal.actor(),
        occurred_at: Utc::now(),
    });
    Ok(Json(services.dispatch::<Rfq>(rfq_id.aggregate_id(), cmd)?))
}

/// Assemble the RFQ's submitted quotes into a pack for comparison.
pub async fn create_quote_pack(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> ApiResult<(StatusCode, Json<dto::QuotePackView>)> {
    authz::require(&principal, authz::QUOTE_PACKS_CREATE)?;
    let rfq_id: RfqId = parse_id(&id, "rfq id")?;

    let rfq = services.load::<Rfq>(rfq_id.aggregate_id())?;
    if !matches!(rfq.status(), RfqStatus::Sent | RfqStatus::Closed) {
        return Err(ApiError::invariant(format!(
            "rfq {} is {}; only sent or closed rfqs can be compared",
            rfq.rfq_number(),
            rfq.status().as_str()
        )));
    }
    let mr_id = rfq
        .mr_id()
        .ok_or_else(|| ApiError::invariant("rfq has no material request"))?;

    let mut entries: Vec<QuoteSummary> = Vec::new();
    for received in rfq.quotes() {
        let Some(quote) = services.try_load::<Quote>(received.quote_id.aggregate_id())? else {
            continue;
        };
        if quote.status() != QuoteStatus::Submitted {
            continue;
        }
        let Some(total) = quote.total() else {
            continue;
        };
        entries.push(QuoteSummary {
            quote_id: received.quote_id,
            supplier_id: received.supplier_id,
            total: total.clone(),
            max_lead_time_days: quote.max_lead_time_days(),
        });
    }

    let pack_id = QuotePackId::for_rfq(rfq_id);
    let cmd = QuotePackCommand::Create(CreateQuotePack {
        pack_id,
        rfq_id,
        mr_id,
        entries,
        actor: principal.actor(),
        occurred_at: Utc::now(),
    });

    let pack = services.dispatch::<QuotePack>(pack_id.aggregate_id(), cmd)?;
    Ok((StatusCode::CREATED, Json(pack.into())))
}
