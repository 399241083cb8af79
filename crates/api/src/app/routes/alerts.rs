use std::sync::Arc;

use axum::{extract::Extension, response::IntoResponse, Json};
use chrono::Utc;

use crate::app::services::AppServices;

/// Everything needing attention right now: low/out-of-stock items, pending
/// reorders, tools in maintenance, overdue checkouts.
pub async fn list_alerts(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<crate::context::TenantContext>,
) -> axum::response::Response {
    Json(services.alerts().alerts(tenant.tenant_id(), Utc::now())).into_response()
}
