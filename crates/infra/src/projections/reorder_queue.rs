use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value as JsonValue;

use fieldkit_core::{TenantId, UserId};
use fieldkit_events::EventEnvelope;
use fieldkit_inventory::{BoxId, ItemType, KitId, KitItemId};
use fieldkit_reorders::{ReorderEvent, ReorderPriority, ReorderRequestId, ReorderStatus};
use rust_decimal::Decimal;

use crate::aggregate_types;
use crate::read_model::TenantStore;

use super::{CursorCheck, ProjectionError, StreamCursors};

/// Queryable reorder request row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReorderReadModel {
    pub request_id: ReorderRequestId,
    pub kit_id: KitId,
    pub item_id: Option<KitItemId>,
    pub part_number: String,
    pub description: String,
    pub item_type: ItemType,
    pub quantity_requested: Decimal,
    pub priority: ReorderPriority,
    pub status: ReorderStatus,
    pub is_automatic: bool,
    pub requested_by: Option<UserId>,
    pub approved_by: Option<UserId>,
    pub notes: Option<String>,
    pub requested_at: DateTime<Utc>,
    pub approved_at: Option<DateTime<Utc>>,
    pub ordered_at: Option<DateTime<Utc>>,
    pub fulfilled_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub cancel_reason: Option<String>,
    pub destination_box_id: Option<BoxId>,
}

/// Reorder queue projection. Backs the queue listing, per-kit filtering,
/// and the monitor's open-automatic-request lookup.
#[derive(Debug)]
pub struct ReorderQueueProjection<S>
where
    S: TenantStore<ReorderRequestId, ReorderReadModel>,
{
    store: S,
    cursors: StreamCursors,
}

impl<S> ReorderQueueProjection<S>
where
    S: TenantStore<ReorderRequestId, ReorderReadModel>,
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
        request_id: &ReorderRequestId,
    ) -> Option<ReorderReadModel> {
        self.store.get(tenant_id, request_id)
    }

    pub fn list(&self, tenant_id: TenantId) -> Vec<ReorderReadModel> {
        let mut rows = self.store.list(tenant_id);
        rows.sort_by_key(|r| r.requested_at);
        rows
    }

    pub fn list_filtered(
        &self,
        tenant_id: TenantId,
        kit_id: Option<KitId>,
        status: Option<ReorderStatus>,
    ) -> Vec<ReorderReadModel> {
        self.list(tenant_id)
            .into_iter()
            .filter(|r| kit_id.is_none_or(|k| r.kit_id == k))
            .filter(|r| status.is_none_or(|s| r.status == s))
            .collect()
    }

    /// The open (pending/approved/ordered) automatic request for an item,
    /// if one exists.
    pub fn open_automatic_for_item(
        &self,
        tenant_id: TenantId,
        item_id: KitItemId,
    ) -> Option<ReorderReadModel> {
        self.store
            .list(tenant_id)
            .into_iter()
            .find(|r| r.is_automatic && r.item_id == Some(item_id) && r.status.is_open())
    }

    pub fn apply_envelope(
        &self,
        envelope: &EventEnvelope<JsonValue>,
    ) -> Result<(), ProjectionError> {
        if envelope.aggregate_type() != aggregate_types::REORDER_REQUEST {
            return Ok(());
        }

        let tenant_id = envelope.tenant_id();
        let aggregate_id = envelope.aggregate_id();
        let seq = envelope.sequence_number();

        match self.cursors.check(tenant_id, aggregate_id, seq)? {
            CursorCheck::Duplicate => return Ok(()),
            CursorCheck::Apply => {}
        }

        let event: ReorderEvent = serde_json::from_value(envelope.payload().clone())
            .map_err(|e| ProjectionError::Deserialize(e.to_string()))?;

        let (event_tenant, request_id) = match &event {
            ReorderEvent::Opened(e) => (e.tenant_id, e.request_id),
            ReorderEvent::Approved(e) => (e.tenant_id, e.request_id),
            ReorderEvent::Ordered(e) => (e.tenant_id, e.request_id),
            ReorderEvent::Fulfilled(e) => (e.tenant_id, e.request_id),
            ReorderEvent::Cancelled(e) => (e.tenant_id, e.request_id),
        };

        if event_tenant != tenant_id {
            return Err(ProjectionError::TenantIsolation(
                "event tenant_id does not match envelope tenant_id".to_string(),
            ));
        }
        if request_id.0 != aggregate_id {
            return Err(ProjectionError::TenantIsolation(
                "event request_id does not match envelope aggregate_id".to_string(),
            ));
        }

        match event {
            ReorderEvent::Opened(e) => {
                self.store.upsert(
                    tenant_id,
                    e.request_id,
                    ReorderReadModel {
                        request_id: e.request_id,
                        kit_id: e.kit_id,
                        item_id: e.item_id,
                        part_number: e.part_number,
                        description: e.description,
                        item_type: e.item_type,
                        quantity_requested: e.quantity_requested,
                        priority: e.priority,
                        status: ReorderStatus::Pending,
                        is_automatic: e.is_automatic,
                        requested_by: e.requested_by,
                        approved_by: None,
                        notes: e.notes,
                        requested_at: e.occurred_at,
                        approved_at: None,
                        ordered_at: None,
                        fulfilled_at: None,
                        cancelled_at: None,
                        cancel_reason: None,
                        destination_box_id: None,
                    },
                );
            }
            ReorderEvent::Approved(e) => {
                if let Some(mut rm) = self.store.get(tenant_id, &e.request_id) {
                    rm.status = ReorderStatus::Approved;
                    rm.approved_by = Some(e.approved_by);
                    rm.approved_at = Some(e.occurred_at);
                    self.store.upsert(tenant_id, e.request_id, rm);
                }
            }
            ReorderEvent::Ordered(e) => {
                if let Some(mut rm) = self.store.get(tenant_id, &e.request_id) {
                    rm.status = ReorderStatus::Ordered;
                    rm.ordered_at = Some(e.occurred_at);
                    self.store.upsert(tenant_id, e.request_id, rm);
                }
            }
            ReorderEvent::Fulfilled(e) => {
                if let Some(mut rm) = self.store.get(tenant_id, &e.request_id) {
                    rm.status = ReorderStatus::Fulfilled;
                    rm.fulfilled_at = Some(e.occurred_at);
                    rm.destination_box_id = Some(e.destination_box_id);
                    rm.item_id = Some(e.fulfilled_item_id);
                    self.store.upsert(tenant_id, e.request_id, rm);
                }
            }
            ReorderEvent::Cancelled(e) => {
                if let Some(mut rm) = self.store.get(tenant_id, &e.request_id) {
                    rm.status = ReorderStatus::Cancelled;
                    rm.cancelled_at = Some(e.occurred_at);
                    rm.cancel_reason = e.reason;
                    self.store.upsert(tenant_id, e.request_id, rm);
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
