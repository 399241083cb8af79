use serde::Serialize;
use serde_json::Value as JsonValue;

use fieldkit_core::TenantId;
use fieldkit_events::EventEnvelope;
use fieldkit_inventory::{WarehouseId, WarehouseStockEvent, WarehouseStockId};
use rust_decimal::Decimal;

use crate::aggregate_types;
use crate::read_model::TenantStore;

use super::{CursorCheck, ProjectionError, StreamCursors};

/// Queryable warehouse stock row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WarehouseStockReadModel {
    pub stock_id: WarehouseStockId,
    pub warehouse_id: WarehouseId,
    pub part_number: String,
    pub quantity: Decimal,
}

/// Warehouse chemical stock projection, the source pool lookup for
/// chemical reorder fulfillment.
#[derive(Debug)]
pub struct WarehouseStockProjection<S>
where
    S: TenantStore<WarehouseStockId, WarehouseStockReadModel>,
{
    store: S,
    cursors: StreamCursors,
}

impl<S> WarehouseStockProjection<S>
where
    S: TenantStore<WarehouseStockId, WarehouseStockReadModel>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            cursors: StreamCursors::new(),
        }
    }

    pub fn get(
        &self,
        tenant_id: TenantId,
        stock_id: &WarehouseStockId,
    ) -> Option<WarehouseStockReadModel> {
        self.store.get(tenant_id, stock_id)
    }

    pub fn list(&self, tenant_id: TenantId) -> Vec<WarehouseStockReadModel> {
        let mut rows = self.store.list(tenant_id);
        rows.sort_by(|a, b| a.part_number.cmp(&b.part_number));
        rows
    }

    /// First warehouse record carrying the part, regardless of warehouse.
    pub fn find_by_part(
        &self,
        tenant_id: TenantId,
        part_number: &str,
    ) -> Option<WarehouseStockReadModel> {
        self.store
            .list(tenant_id)
            .into_iter()
            .find(|r| r.part_number == part_number)
    }

    pub fn apply_envelope(
        &self,
        envelope: &EventEnvelope<JsonValue>,
    ) -> Result<(), ProjectionError> {
        if envelope.aggregate_type() != aggregate_types::WAREHOUSE_STOCK {
            return Ok(());
        }

        let tenant_id = envelope.tenant_id();
        let aggregate_id = envelope.aggregate_id();
        let seq = envelope.sequence_number();

        match self.cursors.check(tenant_id, aggregate_id, seq)? {
            CursorCheck::Duplicate => return Ok(()),
            CursorCheck::Apply => {}
        }

        let event: WarehouseStockEvent = serde_json::from_value(envelope.payload().clone())
            .map_err(|e| ProjectionError::Deserialize(e.to_string()))?;

        let (event_tenant, stock_id) = match &event {
            WarehouseStockEvent::Received(e) => (e.tenant_id, e.stock_id),
            WarehouseStockEvent::Withdrawn(e) => (e.tenant_id, e.stock_id),
        };

        if event_tenant != tenant_id {
            return Err(ProjectionError::TenantIsolation(
                "event tenant_id does not match envelope tenant_id".to_string(),
            ));
        }
        if stock_id.0 != aggregate_id {
            return Err(ProjectionError::TenantIsolation(
                "event stock_id does not match envelope aggregate_id".to_string(),
            ));
        }

        match event {
            WarehouseStockEvent::Received(e) => {
                self.store.upsert(
                    tenant_id,
                    e.stock_id,
                    WarehouseStockReadModel {
                        stock_id: e.stock_id,
                        warehouse_id: e.warehouse_id,
                        part_number: e.part_number,
                        quantity: e.quantity_after,
                    },
                );
            }
            WarehouseStockEvent::Withdrawn(e) => {
                if let Some(mut rm) = self.store.get(tenant_id, &e.stock_id) {
                    rm.quantity = e.quantity_after;
                    self.store.upsert(tenant_id, e.stock_id, rm);
                }
            }
        }

        self.cursors.advance(tenant_id, aggregate_id, seq);
        Ok(())
    }

    pub fn rebuild_from_scratch(
        &self,
        tenant_id: TenantId,
        envelopes: impl IntoIterator<Item = EventEnvelope<JsonValue>>,
    ) -> Result<(), ProjectionError> {
        self.store.clear_tenant(tenant_id);
        self.cursors.clear();
        for envelope in envelopes {
            self.apply_envelope(&envelope)?;
        }
        Ok(())
    }
}
