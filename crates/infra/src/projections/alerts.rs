use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use fieldkit_checkouts::{days_overdue, is_overdue, CheckoutId, CheckoutRecord, ToolId, ToolStatus};
use fieldkit_core::{AggregateId, TenantId};
use fieldkit_inventory::{KitItemId, StockStatus};
use fieldkit_reorders::{ReorderRequestId, ReorderStatus};

use crate::read_model::TenantStore;

use super::{
    KitItemReadModel, KitStockProjection, ReorderQueueProjection, ReorderReadModel,
    ToolDirectoryProjection, ToolReadModel,
};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    LowStock,
    OutOfStock,
    PendingReorder,
    OverdueCheckout,
    ToolInMaintenance,
}

/// One "needs attention" entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Alert {
    pub kind: AlertKind,
    /// Aggregate the alert points at (kit item, reorder request, or tool).
    pub reference_id: AggregateId,
    pub message: String,
}

/// Read-time alert feed over the other projections. Stores nothing; every
/// call recomputes against current read models and the supplied clock.
pub struct AlertFeed<KS, RS, TS, TI>
where
    KS: TenantStore<KitItemId, KitItemReadModel>,
    RS: TenantStore<ReorderRequestId, ReorderReadModel>,
    TS: TenantStore<ToolId, ToolReadModel>,
    TI: TenantStore<CheckoutId, ToolId>,
{
    kit_stock: Arc<KitStockProjection<KS>>,
    reorders: Arc<ReorderQueueProjection<RS>>,
    tools: Arc<ToolDirectoryProjection<TS, TI>>,
}

impl<KS, RS, TS, TI> AlertFeed<KS, RS, TS, TI>
where
    KS: TenantStore<KitItemId, KitItemReadModel>,
    RS: TenantStore<ReorderRequestId, ReorderReadModel>,
    TS: TenantStore<ToolId, ToolReadModel>,
    TI: TenantStore<CheckoutId, ToolId>,
{
    pub fn new(
        kit_stock: Arc<KitStockProjection<KS>>,
        reorders: Arc<ReorderQueueProjection<RS>>,
        tools: Arc<ToolDirectoryProjection<TS, TI>>,
    ) -> Self {
        Self {
            kit_stock,
            reorders,
            tools,
        }
    }

    pub fn alerts(&self, tenant_id: TenantId, now: DateTime<Utc>) -> Vec<Alert> {
        let mut alerts = Vec::new();

        for item in self.kit_stock.list(tenant_id) {
            match item.stock_status {
                StockStatus::OutOfStock => alerts.push(Alert {
                    kind: AlertKind::OutOfStock,
                    reference_id: item.item_id.0,
                    message: format!("part {} is out of stock", item.part_number),
                }),
                StockStatus::LowStock => alerts.push(Alert {
                    kind: AlertKind::LowStock,
                    reference_id: item.item_id.0,
                    message: format!(
                        "part {} is low ({} on hand)",
                        item.part_number, item.quantity
                    ),
                }),
                StockStatus::Available => {}
            }
        }

        for request in self.reorders.list(tenant_id) {
            if request.status == ReorderStatus::Pending {
                alerts.push(Alert {
                    kind: AlertKind::PendingReorder,
                    reference_id: request.request_id.0,
                    message: format!(
                        "reorder for part {} awaiting approval",
                        request.part_number
                    ),
                });
            }
        }

        for tool in self.tools.list(tenant_id) {
            if tool.status == ToolStatus::Maintenance {
                alerts.push(Alert {
                    kind: AlertKind::ToolInMaintenance,
                    reference_id: tool.tool_id.0,
                    message: format!("tool {} is in maintenance", tool.name),
                });
            }
            if let Some(open) = tool.open_checkout() {
                if is_overdue(open, now) {
                    alerts.push(Alert {
                        kind: AlertKind::OverdueCheckout,
                        reference_id: tool.tool_id.0,
                        message: overdue_message(&tool, open, now),
                    });
                }
            }
        }

        alerts
    }
}

fn overdue_message(tool: &ToolReadModel, record: &CheckoutRecord, now: DateTime<Utc>) -> String {
    format!(
        "tool {} is {} day(s) overdue",
        tool.name,
        days_overdue(record, now)
    )
}
