use serde::Serialize;
use serde_json::Value as JsonValue;

use fieldkit_core::TenantId;
use fieldkit_events::EventEnvelope;
use fieldkit_inventory::{
    stock_status, BoxId, ItemType, KitId, KitItemEvent, KitItemId, StockStatus,
};
use rust_decimal::Decimal;

use crate::aggregate_types;
use crate::read_model::TenantStore;

use super::{CursorCheck, ProjectionError, StreamCursors};

/// Queryable kit item row: current quantity plus derived stock status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KitItemReadModel {
    pub item_id: KitItemId,
    pub kit_id: KitId,
    pub box_id: BoxId,
    pub part_number: String,
    pub description: String,
    pub item_type: ItemType,
    pub quantity: Decimal,
    pub minimum_stock_level: Option<Decimal>,
    pub stock_status: StockStatus,
}

/// Kit stock projection: one row per active kit item.
///
/// Removed items are dropped from the read model (their history stays in
/// the store).
#[derive(Debug)]
pub struct KitStockProjection<S>
where
    S: TenantStore<KitItemId, KitItemReadModel>,
{
    store: S,
    cursors: StreamCursors,
}

impl<S> KitStockProjection<S>
where
    S: TenantStore<KitItemId, KitItemReadModel>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            cursors: StreamCursors::new(),
        }
    }

    pub fn get(&self, tenant_id: TenantId, item_id: &KitItemId) -> Option<KitItemReadModel> {
        self.store.get(tenant_id, item_id)
    }

    pub fn list(&self, tenant_id: TenantId) -> Vec<KitItemReadModel> {
        self.store.list(tenant_id)
    }

    pub fn list_for_kit(&self, tenant_id: TenantId, kit_id: KitId) -> Vec<KitItemReadModel> {
        let mut rows: Vec<_> = self
            .store
            .list(tenant_id)
            .into_iter()
            .filter(|r| r.kit_id == kit_id)
            .collect();
        rows.sort_by(|a, b| a.part_number.cmp(&b.part_number));
        rows
    }

    /// Active item with the same part identity in the same (kit, box).
    /// Backs the duplicate-part guard at the service boundary.
    pub fn find_active(
        &self,
        tenant_id: TenantId,
        kit_id: KitId,
        box_id: BoxId,
        part_number: &str,
    ) -> Option<KitItemReadModel> {
        self.store
            .list(tenant_id)
            .into_iter()
            .find(|r| r.kit_id == kit_id && r.box_id == box_id && r.part_number == part_number)
    }

    pub fn apply_envelope(
        &self,
        envelope: &EventEnvelope<JsonValue>,
    ) -> Result<(), ProjectionError> {
        if envelope.aggregate_type() != aggregate_types::KIT_ITEM {
            return Ok(());
        }

        let tenant_id = envelope.tenant_id();
        let aggregate_id = envelope.aggregate_id();
        let seq = envelope.sequence_number();

        match self.cursors.check(tenant_id, aggregate_id, seq)? {
            CursorCheck::Duplicate => return Ok(()),
            CursorCheck::Apply => {}
        }

        let event: KitItemEvent = serde_json::from_value(envelope.payload().clone())
            .map_err(|e| ProjectionError::Deserialize(e.to_string()))?;

        let (event_tenant, item_id) = match &event {
            KitItemEvent::ItemStocked(e) => (e.tenant_id, e.item_id),
            KitItemEvent::StockIssued(e) => (e.tenant_id, e.item_id),
            KitItemEvent::LowStockFlagged(e) => (e.tenant_id, e.item_id),
            KitItemEvent::StockReceived(e) => (e.tenant_id, e.item_id),
            KitItemEvent::ItemRemoved(e) => (e.tenant_id, e.item_id),
        };

        if event_tenant != tenant_id {
            return Err(ProjectionError::TenantIsolation(
                "event tenant_id does not match envelope tenant_id".to_string(),
            ));
        }
        if item_id.0 != aggregate_id {
            return Err(ProjectionError::TenantIsolation(
                "event item_id does not match envelope aggregate_id".to_string(),
            ));
        }

        match event {
            KitItemEvent::ItemStocked(e) => {
                self.store.upsert(
                    tenant_id,
                    e.item_id,
                    KitItemReadModel {
                        item_id: e.item_id,
                        kit_id: e.kit_id,
                        box_id: e.box_id,
                        part_number: e.part_number,
                        description: e.description,
                        item_type: e.item_type,
                        quantity: e.quantity,
                        minimum_stock_level: e.minimum_stock_level,
                        stock_status: stock_status(e.quantity, e.minimum_stock_level),
                    },
                );
            }
            KitItemEvent::StockIssued(e) => {
                if let Some(mut rm) = self.store.get(tenant_id, &e.item_id) {
                    rm.quantity = e.quantity_after;
                    rm.stock_status = stock_status(rm.quantity, rm.minimum_stock_level);
                    self.store.upsert(tenant_id, e.item_id, rm);
                }
            }
            KitItemEvent::StockReceived(e) => {
                if let Some(mut rm) = self.store.get(tenant_id, &e.item_id) {
                    rm.quantity = e.quantity_after;
                    rm.stock_status = stock_status(rm.quantity, rm.minimum_stock_level);
                    self.store.upsert(tenant_id, e.item_id, rm);
                }
            }
            KitItemEvent::LowStockFlagged(_) => {
                // Quantity already reflected by the paired StockIssued.
            }
            KitItemEvent::ItemRemoved(e) => {
                self.store.remove(tenant_id, &e.item_id);
            }
        }

        self.cursors.advance(tenant_id, aggregate_id, seq);
        Ok(())
    }

    /// Rebuild from scratch by replaying envelopes in store order.
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
