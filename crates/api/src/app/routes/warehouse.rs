use std::sync::Arc;

use axum::{
    extract::Extension,
    http::StatusCode,
    response::IntoResponse,
    routing::post,
    Json, Router,
};
use chrono::Utc;

use fieldkit_core::AggregateId;
use fieldkit_infra::aggregate_types;
use fieldkit_infra::command_dispatcher::rehydrate;
use fieldkit_inventory::{
    ReceiveWarehouseStock, WarehouseId, WarehouseStock, WarehouseStockCommand, WarehouseStockId,
};

use crate::app::routes::common::parse_aggregate_id;
use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new().route("/", post(receive_stock).get(list_stock))
}

pub async fn receive_stock(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<crate::context::TenantContext>,
    Json(body): Json<dto::ReceiveWarehouseStockRequest>,
) -> axum::response::Response {
    let warehouse_id = match parse_aggregate_id(&body.warehouse_id, "warehouse_id") {
        Ok(v) => WarehouseId::new(v),
        Err(resp) => return resp,
    };

    // Receipts for a known part accumulate on the existing stream; unknown
    // parts start a new one.
    let stock_id = services
        .warehouse_stock()
        .find_by_part(tenant.tenant_id(), &body.part_number)
        .map(|existing| existing.stock_id)
        .unwrap_or_else(|| WarehouseStockId::new(AggregateId::new()));

    let command = WarehouseStockCommand::Receive(ReceiveWarehouseStock {
        tenant_id: tenant.tenant_id(),
        stock_id,
        warehouse_id,
        part_number: body.part_number,
        quantity: body.quantity,
        occurred_at: Utc::now(),
    });

    if let Err(e) = services.dispatch::<WarehouseStock>(
        tenant.tenant_id(),
        stock_id.0,
        aggregate_types::WAREHOUSE_STOCK,
        command,
        |_, id| WarehouseStock::empty(WarehouseStockId::new(id)),
    ) {
        return errors::dispatch_error_to_response(e);
    }

    match rehydrate::<WarehouseStock, _>(
        services.dispatcher().store(),
        tenant.tenant_id(),
        stock_id.0,
        |_, id| WarehouseStock::empty(WarehouseStockId::new(id)),
    ) {
        Ok(stock) => {
            (StatusCode::CREATED, Json(dto::warehouse_stock_json(&stock))).into_response()
        }
        Err(e) => errors::dispatch_error_to_response(e),
    }
}

pub async fn list_stock(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<crate::context::TenantContext>,
) -> axum::response::Response {
    Json(services.warehouse_stock().list(tenant.tenant_id())).into_response()
}
