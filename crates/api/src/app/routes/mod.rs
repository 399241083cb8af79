use axum::{routing::get, Router};

pub mod alerts;
pub mod common;
pub mod kits;
pub mod reorders;
pub mod system;
pub mod tools;
pub mod warehouse;

/// Router for all tenant-scoped endpoints (mounted under `/api`).
pub fn router() -> Router {
    Router::new()
        .nest("/kits", kits::kits_router())
        .nest("/kit-items", kits::items_router())
        .nest("/reorder-requests", reorders::router())
        .nest("/tools", tools::tools_router())
        .nest("/tool-checkout", tools::checkout_router())
        .nest("/warehouse-stock", warehouse::router())
        .route("/alerts", get(alerts::list_alerts))
}
