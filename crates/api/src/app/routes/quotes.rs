use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Extension, Path, Query},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;

use procureflow_core::{Aggregate, AggregateId, Currency};
use procureflow_infra::numbering::NumberSeries;
use procureflow_sourcing::{
    Quote, QuoteCommand, QuoteId, QuotePack, QuotePackId, RecordQuote, Rfq, RfqCommand, RfqId,
    SubmitQuote, WithdrawQuote,
};
use procureflow_suppliers::SupplierId;

use crate::app::dto;
use crate::app::errors::{optional_body, parse_id, ApiError, ApiResult};
use crate::app::routes::suppliers::active_supplier;
use crate::app::services::AppServices;
use crate::authz;
use crate::context::PrincipalContext;

pub fn router() -> Router {
    Router::new()
        .route("/", post(submit_quote).get(list_quotes))
        .route("/:id", get(get_quote))
        .route("/:id/withdraw", post(withdraw_quote))
}

/// Submit a supplier quote against a sent RFQ.
///
/// The quote is validated first, then recorded on the RFQ (invitation,
/// one-per-supplier and deadline rules), then committed.
pub async fn submit_quote(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    body: Result<Json<dto::SubmitQuoteRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Quote>)> {
    authz::require(&principal, authz::QUOTES_SUBMIT)?;
    let Json(body) = body?;

    let rfq_id: RfqId = parse_id(&body.rfq_id, "rfq_id")?;
    let supplier_id: SupplierId = parse_id(&body.supplier_id, "supplier_id")?;
    let currency = Currency::parse(&body.currency)?;

    let rfq = services
        .try_load::<Rfq>(rfq_id.aggregate_id())?
        .ok_or_else(|| ApiError::not_found("rfq"))?;
    let mr_id = rfq
        .mr_id()
        .ok_or_else(|| ApiError::invariant("rfq has no material request"))?;
    active_supplier(&services, supplier_id)?;

    let now = Utc::now();
    let quote_id = QuoteId::new(AggregateId::new());
    let submit = QuoteCommand::Submit(SubmitQuote {
        quote_id,
        quote_number: services.next_number(NumberSeries::Quote),
        rfq_id,
        mr_id,
        supplier_id,
        currency,
        lines: body.lines,
        valid_until: body.valid_until,
        notes: body.notes,
        actor: principal.actor(),
        occurred_at: now,
    });
    Quote::empty(quote_id).handle(&submit)?;

    services.dispatch::<Rfq>(
        rfq_id.aggregate_id(),
        RfqCommand::RecordQuote(RecordQuote {
            rfq_id,
            supplier_id,
            quote_id,
            actor: principal.actor(),
            occurred_at: now,
        }),
    )?;

    let quote = services.dispatch::<Quote>(quote_id.aggregate_id(), submit)?;
    tracing::info!(%quote_id, %rfq_id, %supplier_id, "quote submitted");
    Ok((StatusCode::CREATED, Json(quote)))
}

pub async fn list_quotes(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Query(filter): Query<dto::QuoteFilter>,
) -> ApiResult<Json<Vec<Quote>>> {
    authz::require(&principal, authz::READ)?;
    let rfq_id: Option<RfqId> = filter
        .rfq_id
        .as_deref()
        .map(|raw| parse_id(raw, "rfq_id"))
        .transpose()?;

    let mut quotes: Vec<Quote> = services
        .read_models()
        .quotes
        .list()
        .into_iter()
        .filter(|q| rfq_id.is_none_or(|id| q.rfq_id() == Some(id)))
        .collect();
    quotes.sort_by(|a, b| a.quote_number().cmp(b.quote_number()));
    Ok(Json(quotes))
}

pub async fn get_quote(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> ApiResult<Json<Quote>> {
    authz::require(&principal, authz::READ)?;
    let quote_id: QuoteId = parse_id(&id, "quote id")?;
    Ok(Json(services.load::<Quote>(quote_id.aggregate_id())?))
}

pub async fn withdraw_quote(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    body: Result<Json<dto::OptionalReasonRequest>, JsonRejection>,
) -> ApiResult<Json<Quote>> {
    authz::require(&principal, authz::QUOTES_WITHDRAW)?;
    let quote_id: QuoteId = parse_id(&id, "quote id")?;
    let reason = optional_body(body)?.reason;

    let quote = services.load::<Quote>(quote_id.aggregate_id())?;
    if let Some(rfq_id) = quote.rfq_id() {
        let pack = services.try_load::<QuotePack>(QuotePackId::for_rfq(rfq_id).aggregate_id())?;
        if pack.is_some_and(|p| p.is_locked() && p.entry(quote_id).is_some()) {
            return Err(ApiError::invariant(
                "quote is part of an approval in progress and cannot be withdrawn",
            ));
        }
    }

    let cmd = QuoteCommand::Withdraw(WithdrawQuote {
        quote_id,
        reason,
        actor: principal.actor(),
        occurred_at: Utc::now(),
    });
    Ok(Json(services.dispatch::<Quote>(quote_id.aggregate_id(), cmd)?))
}
