use axum::{routing::get, Router};

pub mod approvals;
pub mod history;
pub mod material_requests;
pub mod purchase_orders;
pub mod quote_approvals;
pub mod quote_packs;
pub mod quotes;
pub mod requisitions;
pub mod rfqs;
pub mod suppliers;
pub mod system;

/// Router for all identified (`/api`) endpoints.
pub fn router() -> Router {
    Router::new()
        .route("/whoami", get(system::whoami))
        .route("/stream", get(system::stream))
        .nest("/suppliers", suppliers::router())
        .nest("/mrs", material_requests::router())
        .nest("/rfqs", rfqs::router())
        .nest("/quotes", quotes::router())
        .nest("/quote-packs", quote_packs::router())
        .nest("/quote-approvals", quote_approvals::router())
        .nest("/prs", requisitions::router())
        .nest("/pos", purchase_orders::router())
        .merge(approvals::router())
        .nest("/history", history::router())
}
