use std::sync::Arc;

use axum::{
    extract::Extension,
    http::StatusCode,
    response::sse::Event as SseEvent,
};

use crate::app::services::{self, AppServices};

pub async fn health() -> StatusCode {
    StatusCode::OK
}

pub async fn stream(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<crate::context::TenantContext>,
) -> axum::response::Sse<impl tokio_stream::Stream<Item = Result<SseEvent, std::convert::Infallible>>>
{
    services::tenant_sse_stream(services, tenant.tenant_id())
}
