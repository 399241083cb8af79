//! Request DTOs and response mapping helpers.
//!
//! Identifiers arrive as strings and are parsed in the handlers so a bad id
//! maps to a 400 with a stable `invalid_id` code. Mutating endpoints respond
//! with the full aggregate rehydrated after the commit (not the eventually
//! consistent read model), mapped here.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::json;

use fieldkit_checkouts::{DamageSeverity, Tool};
use fieldkit_inventory::{ItemType, KitItem, WarehouseStock};
use fieldkit_reorders::{ReorderPriority, ReorderRequest, ReorderStatus};

#[derive(Debug, Deserialize)]
pub struct StockItemRequest {
    pub box_id: String,
    pub part_number: String,
    pub description: String,
    pub item_type: ItemType,
    pub quantity: Decimal,
    pub minimum_stock_level: Option<Decimal>,
}

#[derive(Debug, Deserialize)]
pub struct IssueStockRequest {
    pub quantity: Decimal,
    pub issued_to: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct OpenReorderRequest {
    /// Kit item the request restocks, when one exists.
    pub item_id: Option<String>,
    pub part_number: String,
    pub description: String,
    pub item_type: ItemType,
    pub quantity_requested: Decimal,
    #[serde(default = "default_priority")]
    pub priority: ReorderPriority,
    pub requested_by: Option<String>,
    pub notes: Option<String>,
}

fn default_priority() -> ReorderPriority {
    ReorderPriority::Medium
}

#[derive(Debug, Deserialize)]
pub struct ApproveReorderRequest {
    pub approved_by: String,
}

#[derive(Debug, Deserialize)]
pub struct FulfillReorderRequest {
    pub destination_box_id: String,
}

#[derive(Debug, Deserialize)]
pub struct CancelReorderRequest {
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ReorderListQuery {
    pub kit_id: Option<String>,
    pub status: Option<ReorderStatus>,
}

#[derive(Debug, Deserialize)]
pub struct RegisterToolRequest {
    pub name: String,
    pub serial_number: String,
    pub calibration_due: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
pub struct CheckOutToolRequest {
    pub tool_id: String,
    pub user_id: String,
    pub expected_return_date: Option<DateTime<Utc>>,
    pub condition_at_checkout: String,
    pub work_order: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CheckInToolRequest {
    pub condition_at_return: Option<String>,
    #[serde(default)]
    pub damage_reported: bool,
    pub damage_severity: Option<DamageSeverity>,
    pub return_notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ExtendCheckoutRequest {
    pub new_expected_return_date: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct ReceiveWarehouseStockRequest {
    pub warehouse_id: String,
    pub part_number: String,
    pub quantity: Decimal,
}

pub fn kit_item_json(item: &KitItem) -> serde_json::Value {
    json!({
        "id": item.id_typed().to_string(),
        "kit_id": item.kit_id().map(|v| v.to_string()),
        "box_id": item.box_id().map(|v| v.to_string()),
        "part_number": item.part_number(),
        "description": item.description(),
        "item_type": item.item_type(),
        "quantity": item.quantity(),
        "minimum_stock_level": item.minimum_stock_level(),
        "stock_status": item.stock_status(),
        "removed": item.is_removed(),
    })
}

pub fn reorder_json(request: &ReorderRequest) -> serde_json::Value {
    json!({
        "id": request.id_typed().to_string(),
        "kit_id": request.kit_id().map(|v| v.to_string()),
        "item_id": request.item_id().map(|v| v.to_string()),
        "part_number": request.part_number(),
        "description": request.description(),
        "item_type": request.item_type(),
        "quantity_requested": request.quantity_requested(),
        "priority": request.priority(),
        "status": request.status(),
        "is_automatic": request.is_automatic(),
        "requested_by": request.requested_by().map(|v| v.to_string()),
        "approved_by": request.approved_by().map(|v| v.to_string()),
        "notes": request.notes(),
        "requested_at": request.requested_at(),
        "approved_at": request.approved_at(),
        "ordered_at": request.ordered_at(),
        "fulfilled_at": request.fulfilled_at(),
        "cancelled_at": request.cancelled_at(),
        "cancel_reason": request.cancel_reason(),
        "destination_box_id": request.destination_box_id().map(|v| v.to_string()),
    })
}

pub fn tool_json(tool: &Tool) -> serde_json::Value {
    json!({
        "id": tool.id_typed().to_string(),
        "name": tool.name(),
        "serial_number": tool.serial_number(),
        "status": tool.status(),
        "calibration_due": tool.calibration_due(),
        "checkouts": tool.checkouts(),
        "open_checkout": tool.open_checkout(),
    })
}

pub fn warehouse_stock_json(stock: &WarehouseStock) -> serde_json::Value {
    json!({
        "id": stock.id_typed().to_string(),
        "warehouse_id": stock.warehouse_id().map(|v| v.to_string()),
        "part_number": stock.part_number(),
        "quantity": stock.quantity(),
    })
}
