use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;

use fieldkit_core::{AggregateId, DomainError, TenantId, UserId};
use fieldkit_infra::aggregate_types;
use fieldkit_infra::command_dispatcher::rehydrate;
use fieldkit_inventory::{
    BoxId, IssueStock, KitId, KitItem, KitItemCommand, KitItemId, RemoveItem, StockItem,
};
use fieldkit_reorders::{OpenReorder, ReorderCommand, ReorderRequest, ReorderRequestId};

use crate::app::routes::common::parse_aggregate_id;
use crate::app::routes::reorders::reorder_response;
use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub fn kits_router() -> Router {
    Router::new()
        .route("/:kit_id/items", post(stock_item).get(list_kit_items))
        .route("/:kit_id/reorder", post(open_reorder))
}

pub fn items_router() -> Router {
    Router::new()
        .route("/:id", get(get_kit_item))
        .route("/:id/issue", post(issue_stock))
        .route("/:id/remove", post(remove_item))
}

/// Full item state read back from the stream after a commit, so the caller
/// never waits on the read model.
fn item_response(
    services: &AppServices,
    tenant_id: TenantId,
    item_agg: AggregateId,
    status: StatusCode,
) -> axum::response::Response {
    match rehydrate::<KitItem, _>(services.dispatcher().store(), tenant_id, item_agg, |_, id| {
        KitItem::empty(KitItemId::new(id))
    }) {
        Ok(item) => (status, Json(dto::kit_item_json(&item))).into_response(),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}

pub async fn stock_item(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<crate::context::TenantContext>,
    Path(kit_id): Path<String>,
    Json(body): Json<dto::StockItemRequest>,
) -> axum::response::Response {
    let kit_id = match parse_aggregate_id(&kit_id, "kit id") {
        Ok(v) => KitId::new(v),
        Err(resp) => return resp,
    };
    let box_id = match parse_aggregate_id(&body.box_id, "box_id") {
        Ok(v) => BoxId::new(v),
        Err(resp) => return resp,
    };

    // One active row per (kit, box, part): checked against the read model,
    // so two creates under different item ids cannot both land.
    if services
        .kit_stock()
        .find_active(tenant.tenant_id(), kit_id, box_id, &body.part_number)
        .is_some()
    {
        return errors::domain_error_to_response(DomainError::duplicate_part(format!(
            "part {} already active in this box",
            body.part_number
        )));
    }

    let item_agg = AggregateId::new();
    let item_id = KitItemId::new(item_agg);

    let command = KitItemCommand::StockItem(StockItem {
        tenant_id: tenant.tenant_id(),
        item_id,
        kit_id,
        box_id,
        part_number: body.part_number,
        description: body.description,
        item_type: body.item_type,
        quantity: body.quantity,
        minimum_stock_level: body.minimum_stock_level,
        occurred_at: Utc::now(),
    });

    if let Err(e) = services.dispatch::<KitItem>(
        tenant.tenant_id(),
        item_agg,
        aggregate_types::KIT_ITEM,
        command,
        |_, id| KitItem::empty(KitItemId::new(id)),
    ) {
        return errors::dispatch_error_to_response(e);
    }

    item_response(&services, tenant.tenant_id(), item_agg, StatusCode::CREATED)
}

pub async fn list_kit_items(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<crate::context::TenantContext>,
    Path(kit_id): Path<String>,
) -> axum::response::Response {
    let kit_id = match parse_aggregate_id(&kit_id, "kit id") {
        Ok(v) => KitId::new(v),
        Err(resp) => return resp,
    };

    Json(services.kit_stock().list_for_kit(tenant.tenant_id(), kit_id)).into_response()
}

pub async fn get_kit_item(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<crate::context::TenantContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let item_id = match parse_aggregate_id(&id, "kit item id") {
        Ok(v) => KitItemId::new(v),
        Err(resp) => return resp,
    };

    match services.kit_stock().get(tenant.tenant_id(), &item_id) {
        Some(item) => Json(item).into_response(),
        None => errors::json_error(StatusCode::NOT_FOUND, "not_found", "kit item not found"),
    }
}

pub async fn issue_stock(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<crate::context::TenantContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::IssueStockRequest>,
) -> axum::response::Response {
    let item_agg = match parse_aggregate_id(&id, "kit item id") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let item_id = KitItemId::new(item_agg);

    let issued_to = match &body.issued_to {
        Some(raw) => match raw.parse::<UserId>() {
            Ok(v) => Some(v),
            Err(_) => {
                return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid issued_to")
            }
        },
        None => None,
    };

    let command = KitItemCommand::IssueStock(IssueStock {
        tenant_id: tenant.tenant_id(),
        item_id,
        quantity: body.quantity,
        issued_to,
        occurred_at: Utc::now(),
    });

    if let Err(e) = services.dispatch::<KitItem>(
        tenant.tenant_id(),
        item_agg,
        aggregate_types::KIT_ITEM,
        command,
        |_, id| KitItem::empty(KitItemId::new(id)),
    ) {
        return errors::dispatch_error_to_response(e);
    }

    item_response(&services, tenant.tenant_id(), item_agg, StatusCode::OK)
}

pub async fn remove_item(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<crate::context::TenantContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let item_agg = match parse_aggregate_id(&id, "kit item id") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    let command = KitItemCommand::RemoveItem(RemoveItem {
        tenant_id: tenant.tenant_id(),
        item_id: KitItemId::new(item_agg),
        occurred_at: Utc::now(),
    });

    if let Err(e) = services.dispatch::<KitItem>(
        tenant.tenant_id(),
        item_agg,
        aggregate_types::KIT_ITEM,
        command,
        |_, id| KitItem::empty(KitItemId::new(id)),
    ) {
        return errors::dispatch_error_to_response(e);
    }

    item_response(&services, tenant.tenant_id(), item_agg, StatusCode::OK)
}

pub async fn open_reorder(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<crate::context::TenantContext>,
    Path(kit_id): Path<String>,
    Json(body): Json<dto::OpenReorderRequest>,
) -> axum::response::Response {
    let kit_id = match parse_aggregate_id(&kit_id, "kit id") {
        Ok(v) => KitId::new(v),
        Err(resp) => return resp,
    };

    let item_id = match &body.item_id {
        Some(raw) => match parse_aggregate_id(raw, "item_id") {
            Ok(v) => Some(KitItemId::new(v)),
            Err(resp) => return resp,
        },
        None => None,
    };

    let requested_by = match &body.requested_by {
        Some(raw) => match raw.parse::<UserId>() {
            Ok(v) => Some(v),
            Err(_) => {
                return errors::json_error(
                    StatusCode::BAD_REQUEST,
                    "invalid_id",
                    "invalid requested_by",
                )
            }
        },
        None => None,
    };

    let request_agg = AggregateId::new();
    let request_id = ReorderRequestId::new(request_agg);

    let command = ReorderCommand::Open(OpenReorder {
        tenant_id: tenant.tenant_id(),
        request_id,
        kit_id,
        item_id,
        part_number: body.part_number,
        description: body.description,
        item_type: body.item_type,
        quantity_requested: body.quantity_requested,
        priority: body.priority,
        is_automatic: false,
        requested_by,
        notes: body.notes,
        occurred_at: Utc::now(),
    });

    if let Err(e) = services.dispatch::<ReorderRequest>(
        tenant.tenant_id(),
        request_agg,
        aggregate_types::REORDER_REQUEST,
        command,
        |_, id| ReorderRequest::empty(ReorderRequestId::new(id)),
    ) {
        return errors::dispatch_error_to_response(e);
    }

    reorder_response(&services, tenant.tenant_id(), request_agg, StatusCode::CREATED)
}
