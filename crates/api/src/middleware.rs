use axum::{
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::Response,
};

use fieldkit_core::TenantId;

use crate::context::TenantContext;

/// Header that scopes every domain request to a tenant.
pub const TENANT_HEADER: &str = "x-tenant-id";

/// Derives the [`TenantContext`] from the `x-tenant-id` header.
///
/// Missing header -> 401; unparseable tenant id -> 400.
pub async fn tenant_middleware(
    mut req: axum::http::Request<axum::body::Body>,
    next: Next,
) -> Result<Response, StatusCode> {
    let tenant_id = extract_tenant_id(req.headers())?;

    req.extensions_mut().insert(TenantContext::new(tenant_id));

    Ok(next.run(req).await)
}

fn extract_tenant_id(headers: &HeaderMap) -> Result<TenantId, StatusCode> {
    let header = headers.get(TENANT_HEADER).ok_or(StatusCode::UNAUTHORIZED)?;

    let header = header.to_str().map_err(|_| StatusCode::BAD_REQUEST)?;

    let value = header.trim();
    if value.is_empty() {
        return Err(StatusCode::UNAUTHORIZED);
    }

    value.parse::<TenantId>().map_err(|_| StatusCode::BAD_REQUEST)
}
