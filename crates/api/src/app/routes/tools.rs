use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;

use fieldkit_checkouts::{
    days_overdue, is_overdue, CheckInTool, CheckOutTool, CheckoutId, ExtendCheckout, RegisterTool,
    ReturnToService, Tool, ToolCommand, ToolId, ToolStatus,
};
use fieldkit_core::{AggregateId, TenantId, UserId};
use fieldkit_infra::aggregate_types;
use fieldkit_infra::command_dispatcher::rehydrate;

use crate::app::routes::common::parse_aggregate_id;
use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub fn tools_router() -> Router {
    Router::new()
        .route("/", post(register_tool).get(list_tools))
        .route("/:id/availability", get(tool_availability))
        .route("/:id/return-to-service", post(return_to_service))
}

pub fn checkout_router() -> Router {
    Router::new()
        .route("/", post(check_out_tool))
        .route("/:id/checkin", post(check_in_tool))
        .route("/:id/extend", post(extend_checkout))
}

/// Full tool state (including custody history) read back from the stream
/// after a commit.
fn tool_response(
    services: &AppServices,
    tenant_id: TenantId,
    tool_agg: AggregateId,
    status: StatusCode,
    checkout_id: Option<CheckoutId>,
) -> axum::response::Response {
    match rehydrate::<Tool, _>(services.dispatcher().store(), tenant_id, tool_agg, |_, id| {
        Tool::empty(ToolId::new(id))
    }) {
        Ok(tool) => {
            let mut body = dto::tool_json(&tool);
            if let (Some(checkout_id), Some(map)) = (checkout_id, body.as_object_mut()) {
                map.insert(
                    "checkout_id".to_string(),
                    serde_json::Value::String(checkout_id.to_string()),
                );
            }
            (status, Json(body)).into_response()
        }
        Err(e) => errors::dispatch_error_to_response(e),
    }
}

pub async fn register_tool(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<crate::context::TenantContext>,
    Json(body): Json<dto::RegisterToolRequest>,
) -> axum::response::Response {
    let tool_agg = AggregateId::new();

    let command = ToolCommand::Register(RegisterTool {
        tenant_id: tenant.tenant_id(),
        tool_id: ToolId::new(tool_agg),
        name: body.name,
        serial_number: body.serial_number,
        calibration_due: body.calibration_due,
        occurred_at: Utc::now(),
    });

    if let Err(e) = services.dispatch::<Tool>(
        tenant.tenant_id(),
        tool_agg,
        aggregate_types::TOOL,
        command,
        |_, id| Tool::empty(ToolId::new(id)),
    ) {
        return errors::dispatch_error_to_response(e);
    }

    tool_response(&services, tenant.tenant_id(), tool_agg, StatusCode::CREATED, None)
}

pub async fn list_tools(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<crate::context::TenantContext>,
) -> axum::response::Response {
    Json(services.tools().list(tenant.tenant_id())).into_response()
}

pub async fn tool_availability(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<crate::context::TenantContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let tool_id = match parse_aggregate_id(&id, "tool id") {
        Ok(v) => ToolId::new(v),
        Err(resp) => return resp,
    };

    let Some(tool) = services.tools().get(tenant.tenant_id(), &tool_id) else {
        return errors::json_error(StatusCode::NOT_FOUND, "not_found", "tool not found");
    };

    let now = Utc::now();
    let open = tool.open_checkout();
    let overdue = open.map(|c| is_overdue(c, now)).unwrap_or(false);

    Json(serde_json::json!({
        "tool_id": tool.tool_id.to_string(),
        "name": tool.name,
        "status": tool.status,
        "available": tool.status == ToolStatus::Available,
        "open_checkout": open,
        "overdue": overdue,
        "days_overdue": open.map(|c| days_overdue(c, now)).unwrap_or(0),
    }))
    .into_response()
}

pub async fn return_to_service(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<crate::context::TenantContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let tool_agg = match parse_aggregate_id(&id, "tool id") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    let command = ToolCommand::ReturnToService(ReturnToService {
        tenant_id: tenant.tenant_id(),
        tool_id: ToolId::new(tool_agg),
        occurred_at: Utc::now(),
    });

    dispatch_tool(&services, tenant, tool_agg, command, None)
}

pub async fn check_out_tool(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<crate::context::TenantContext>,
    Json(body): Json<dto::CheckOutToolRequest>,
) -> axum::response::Response {
    let tool_agg = match parse_aggregate_id(&body.tool_id, "tool_id") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let user_id = match body.user_id.parse::<UserId>() {
        Ok(v) => v,
        Err(_) => {
            return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid user_id")
        }
    };

    let checkout_id = CheckoutId::new(AggregateId::new());

    let command = ToolCommand::CheckOut(CheckOutTool {
        tenant_id: tenant.tenant_id(),
        tool_id: ToolId::new(tool_agg),
        checkout_id,
        user_id,
        expected_return_date: body.expected_return_date,
        condition_at_checkout: body.condition_at_checkout,
        work_order: body.work_order,
        enforce_calibration: services.enforce_calibration(),
        occurred_at: Utc::now(),
    });

    if let Err(e) = services.dispatch::<Tool>(
        tenant.tenant_id(),
        tool_agg,
        aggregate_types::TOOL,
        command,
        |_, id| Tool::empty(ToolId::new(id)),
    ) {
        return errors::dispatch_error_to_response(e);
    }

    tool_response(
        &services,
        tenant.tenant_id(),
        tool_agg,
        StatusCode::CREATED,
        Some(checkout_id),
    )
}

pub async fn check_in_tool(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<crate::context::TenantContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::CheckInToolRequest>,
) -> axum::response::Response {
    let checkout_id = match parse_aggregate_id(&id, "checkout id") {
        Ok(v) => CheckoutId::new(v),
        Err(resp) => return resp,
    };

    // Checkout ids are routed to their tool stream via the directory index.
    let Some(tool_id) = services
        .tools()
        .tool_for_checkout(tenant.tenant_id(), checkout_id)
    else {
        return errors::json_error(StatusCode::NOT_FOUND, "not_found", "checkout not found");
    };

    let command = ToolCommand::CheckIn(CheckInTool {
        tenant_id: tenant.tenant_id(),
        tool_id,
        checkout_id,
        condition_at_return: body.condition_at_return,
        damage_reported: body.damage_reported,
        damage_severity: body.damage_severity,
        return_notes: body.return_notes,
        occurred_at: Utc::now(),
    });

    dispatch_tool(&services, tenant, tool_id.0, command, Some(checkout_id))
}

pub async fn extend_checkout(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<crate::context::TenantContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::ExtendCheckoutRequest>,
) -> axum::response::Response {
    let checkout_id = match parse_aggregate_id(&id, "checkout id") {
        Ok(v) => CheckoutId::new(v),
        Err(resp) => return resp,
    };

    let Some(tool_id) = services
        .tools()
        .tool_for_checkout(tenant.tenant_id(), checkout_id)
    else {
        return errors::json_error(StatusCode::NOT_FOUND, "not_found", "checkout not found");
    };

    let command = ToolCommand::Extend(ExtendCheckout {
        tenant_id: tenant.tenant_id(),
        tool_id,
        checkout_id,
        new_expected_return_date: body.new_expected_return_date,
        occurred_at: Utc::now(),
    });

    dispatch_tool(&services, tenant, tool_id.0, command, Some(checkout_id))
}

fn dispatch_tool(
    services: &AppServices,
    tenant: crate::context::TenantContext,
    tool_agg: AggregateId,
    command: ToolCommand,
    checkout_id: Option<CheckoutId>,
) -> axum::response::Response {
    if let Err(e) = services.dispatch::<Tool>(
        tenant.tenant_id(),
        tool_agg,
        aggregate_types::TOOL,
        command,
        |_, id| Tool::empty(ToolId::new(id)),
    ) {
        return errors::dispatch_error_to_response(e);
    }

    tool_response(services, tenant.tenant_id(), tool_agg, StatusCode::OK, checkout_id)
}
