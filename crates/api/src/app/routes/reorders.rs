use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, put},
    Json, Router,
};
use chrono::Utc;

use fieldkit_core::{AggregateId, TenantId, UserId};
use fieldkit_infra::aggregate_types;
use fieldkit_infra::command_dispatcher::rehydrate;
use fieldkit_inventory::{BoxId, KitId};
use fieldkit_reorders::{
    ApproveReorder, CancelReorder, MarkReorderOrdered, ReorderCommand, ReorderRequest,
    ReorderRequestId,
};

use crate::app::routes::common::parse_aggregate_id;
use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_reorders))
        .route("/:id", get(get_reorder))
        .route("/:id/approve", put(approve_reorder))
        .route("/:id/order", put(mark_ordered))
        .route("/:id/fulfill", put(fulfill_reorder))
        .route("/:id/cancel", put(cancel_reorder))
}

/// Full request state read back from the stream after a commit. Shared with
/// the manual-open route under `/kits`.
pub(crate) fn reorder_response(
    services: &AppServices,
    tenant_id: TenantId,
    request_agg: AggregateId,
    status: StatusCode,
) -> axum::response::Response {
    match rehydrate::<ReorderRequest, _>(
        services.dispatcher().store(),
        tenant_id,
        request_agg,
        |_, id| ReorderRequest::empty(ReorderRequestId::new(id)),
    ) {
        Ok(request) => (status, Json(dto::reorder_json(&request))).into_response(),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}

pub async fn list_reorders(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<crate::context::TenantContext>,
    Query(query): Query<dto::ReorderListQuery>,
) -> axum::response::Response {
    let kit_id = match &query.kit_id {
        Some(raw) => match parse_aggregate_id(raw, "kit_id") {
            Ok(v) => Some(KitId::new(v)),
            Err(resp) => return resp,
        },
        None => None,
    };

    Json(
        services
            .reorders()
            .list_filtered(tenant.tenant_id(), kit_id, query.status),
    )
    .into_response()
}

pub async fn get_reorder(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<crate::context::TenantContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let request_id = match parse_aggregate_id(&id, "reorder request id") {
        Ok(v) => ReorderRequestId::new(v),
        Err(resp) => return resp,
    };

    match services.reorders().get(tenant.tenant_id(), &request_id) {
        Some(request) => Json(request).into_response(),
        None => errors::json_error(StatusCode::NOT_FOUND, "not_found", "reorder request not found"),
    }
}

pub async fn approve_reorder(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<crate::context::TenantContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::ApproveReorderRequest>,
) -> axum::response::Response {
    let request_agg = match parse_aggregate_id(&id, "reorder request id") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    let approved_by = match body.approved_by.parse::<UserId>() {
        Ok(v) => v,
        Err(_) => {
            return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid approved_by")
        }
    };

    let command = ReorderCommand::Approve(ApproveReorder {
        tenant_id: tenant.tenant_id(),
        request_id: ReorderRequestId::new(request_agg),
        approved_by,
        occurred_at: Utc::now(),
    });

    dispatch_transition(&services, tenant, request_agg, command)
}

pub async fn mark_ordered(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<crate::context::TenantContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let request_agg = match parse_aggregate_id(&id, "reorder request id") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    let command = ReorderCommand::MarkOrdered(MarkReorderOrdered {
        tenant_id: tenant.tenant_id(),
        request_id: ReorderRequestId::new(request_agg),
        occurred_at: Utc::now(),
    });

    dispatch_transition(&services, tenant, request_agg, command)
}

pub async fn fulfill_reorder(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<crate::context::TenantContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::FulfillReorderRequest>,
) -> axum::response::Response {
    let request_agg = match parse_aggregate_id(&id, "reorder request id") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let destination_box_id = match parse_aggregate_id(&body.destination_box_id, "destination_box_id")
    {
        Ok(v) => BoxId::new(v),
        Err(resp) => return resp,
    };

    if let Err(e) = services.fulfillment().fulfill(
        tenant.tenant_id(),
        ReorderRequestId::new(request_agg),
        destination_box_id,
    ) {
        return errors::dispatch_error_to_response(e);
    }

    reorder_response(&services, tenant.tenant_id(), request_agg, StatusCode::OK)
}

pub async fn cancel_reorder(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<crate::context::TenantContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::CancelReorderRequest>,
) -> axum::response::Response {
    let request_agg = match parse_aggregate_id(&id, "reorder request id") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    let command = ReorderCommand::Cancel(CancelReorder {
        tenant_id: tenant.tenant_id(),
        request_id: ReorderRequestId::new(request_agg),
        reason: body.reason,
        occurred_at: Utc::now(),
    });

    dispatch_transition(&services, tenant, request_agg, command)
}

fn dispatch_transition(
    services: &AppServices,
    tenant: crate::context::TenantContext,
    request_agg: AggregateId,
    command: ReorderCommand,
) -> axum::response::Response {
    if let Err(e) = services.dispatch::<ReorderRequest>(
        tenant.tenant_id(),
        request_agg,
        aggregate_types::REORDER_REQUEST,
        command,
        |_, id| ReorderRequest::empty(ReorderRequestId::new(id)),
    ) {
        return errors::dispatch_error_to_response(e);
    }

    reorder_response(services, tenant.tenant_id(), request_agg, StatusCode::OK)
}
