//! HTTP application: router, shared services and error mapping.
//!
//! - `services.rs`: event store, bus worker, read models and the flow
//! - `routes/`: handlers, one file per document type
//! - `dto.rs`: request bodies and response views
//! - `errors.rs`: JSON error responses

use std::sync::Arc;

use axum::{routing::get, Extension, Router};
use tower::ServiceBuilder;

use crate::middleware;

pub mod dto;
pub mod errors;
pub mod routes;
pub mod services;

/// Build the full HTTP router. `/health` is public; everything under `/api`
/// requires an identified caller.
pub fn build_app(services: Arc<services::AppServices>) -> Router {
    let protected = routes::router()
        .layer(Extension(services))
        .layer(axum::middleware::from_fn(middleware::identity_middleware));

    Router::new()
        .route("/health", get(routes::system::health))
        .nest("/api", protected)
        .layer(ServiceBuilder::new())
}
