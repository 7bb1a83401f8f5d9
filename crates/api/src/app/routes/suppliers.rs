use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Extension, Path, Query},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;

use procureflow_core::AggregateId;
use procureflow_suppliers::{
    ContactInfo, Deactivate, Reactivate, RegisterSupplier, Supplier, SupplierCommand, SupplierId,
    UpdateDetails, normalize_code,
};

use crate::app::dto;
use crate::app::errors::{optional_body, parse_id, ApiError, ApiResult};
use crate::app::services::AppServices;
use crate::authz;
use crate::context::PrincipalContext;

pub fn router() -> Router {
    Router::new()
        .route("/", post(register_supplier).get(list_suppliers))
        .route("/:id", get(get_supplier).put(update_supplier))
        .route("/:id/deactivate", post(deactivate_supplier))
        .route("/:id/reactivate", post(reactivate_supplier))
}

pub async fn register_supplier(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    body: Result<Json<dto::RegisterSupplierRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Supplier>)> {
    authz::require(&principal, authz::SUPPLIERS_MANAGE)?;
    let Json(body) = body?;

    // Codes are unique across the directory; checked against the read model.
    let code = normalize_code(&body.code);
    if !code.is_empty() && services.read_models().suppliers.list().iter().any(|s| s.code() == code) {
        return Err(ApiError::conflict(format!("supplier code '{code}' is already registered")));
    }

    let supplier_id = SupplierId::new(AggregateId::new());
    let contact = ContactInfo {
        email: body.email,
        phone: body.phone,
        address: body.address,
    };
    let cmd = SupplierCommand::RegisterSupplier(RegisterSupplier {
        supplier_id,
        code: body.code,
        name: body.name,
        contact: Some(contact),
        categories: body.categories,
        actor: principal.actor(),
        occurred_at: Utc::now(),
    });

    let supplier = services.dispatch::<Supplier>(supplier_id.aggregate_id(), cmd)?;
    Ok((StatusCode::CREATED, Json(supplier)))
}

pub async fn list_suppliers(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Query(filter): Query<dto::StatusFilter>,
) -> ApiResult<Json<Vec<Supplier>>> {
    authz::require(&principal, authz::READ)?;

    let mut suppliers: Vec<Supplier> = services
        .read_models()
        .suppliers
        .list()
        .into_iter()
        .filter(|s| filter.status.as_deref().is_none_or(|st| s.status().as_str() == st))
        .collect();
    suppliers.sort_by(|a, b| a.code().cmp(b.code()));
    Ok(Json(suppliers))
}

pub async fn get_supplier(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> ApiResult<Json<Supplier>> {
    authz::require(&principal, authz::READ)?;
    let supplier_id: SupplierId = parse_id(&id, "supplier id")?;
    Ok(Json(services.load::<Supplier>(supplier_id.aggregate_id())?))
}

pub async fn update_supplier(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    body: Result<Json<dto::UpdateSupplierRequest>, JsonRejection>,
) -> ApiResult<Json<Supplier>> {
    authz::require(&principal, authz::SUPPLIERS_MANAGE)?;
    let supplier_id: SupplierId = parse_id(&id, "supplier id")?;
    let Json(body) = body?;

    let current = services.load::<Supplier>(supplier_id.aggregate_id())?;
    let contact = (body.email.is_some() || body.phone.is_some() || body.address.is_some()).then(|| {
        let existing = current.contact();
        ContactInfo {
            email: body.email.or_else(|| existing.email.clone()),
            phone: body.phone.or_else(|| existing.phone.clone()),
            address: body.address.or_else(|| existing.address.clone()),
        }
    });

    let cmd = SupplierCommand::UpdateDetails(UpdateDetails {
        supplier_id,
        name: body.name,
        contact,
        categories: body.categories,
        actor: principal.actor(),
        occurred_at: Utc::now(),
    });
    Ok(Json(services.dispatch::<Supplier>(supplier_id.aggregate_id(), cmd)?))
}

pub async fn deactivate_supplier(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    body: Result<Json<dto::OptionalReasonRequest>, JsonRejection>,
) -> ApiResult<Json<Supplier>> {
    authz::require(&principal, authz::SUPPLIERS_MANAGE)?;
    let supplier_id: SupplierId = parse_id(&id, "supplier id")?;
    let reason = optional_body(body)?.reason;

    let cmd = SupplierCommand::Deactivate(Deactivate {
        supplier_id,
        reason,
        actor: principal.actor(),
        occurred_at: Utc::now(),
    });
    Ok(Json(services.dispatch::<Supplier>(supplier_id.aggregate_id(), cmd)?))
}

pub async fn reactivate_supplier(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> ApiResult<Json<Supplier>> {
    authz::require(&principal, authz::SUPPLIERS_MANAGE)?;
    let supplier_id: SupplierId = parse_id(&id, "supplier id")?;

    let cmd = SupplierCommand::Reactivate(Reactivate {
        supplier_id,
        actor: principal.actor(),
        occurred_at: Utc::now(),
    });
    Ok(Json(services.dispatch::<Supplier>(supplier_id.aggregate_id(), cmd)?))
}

/// Load a supplier that must be able to transact (active).
pub(crate) fn active_supplier(services: &AppServices, supplier_id: SupplierId) -> ApiResult<Supplier> {
    let supplier = services
        .try_load::<Supplier>(supplier_id.aggregate_id())?
        .ok_or_else(|| ApiError::not_found("supplier"))?;
    if !supplier.can_transact() {
        return Err(ApiError::invariant(format!(
            "supplier {} is inactive",
            supplier.code()
        )));
    }
    Ok(supplier)
}
