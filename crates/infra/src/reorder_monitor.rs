//! Automatic reorder trigger.
//!
//! Consumes published envelopes and opens an automatic reorder request the
//! moment a kit item crosses its minimum stock level downward. One open
//! automatic request per item: while a pending/approved/ordered automatic
//! request exists for an item, further flags for that item are no-ops.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use rust_decimal::Decimal;
use serde_json::Value as JsonValue;
use tracing::{debug, info};

use fieldkit_core::{AggregateId, TenantId};
use fieldkit_events::{EventBus, EventEnvelope};
use fieldkit_inventory::{KitItemEvent, KitItemId, LowStockFlagged};
use fieldkit_reorders::{
    derive_priority, OpenReorder, ReorderCommand, ReorderEvent, ReorderRequest, ReorderRequestId,
};

use crate::aggregate_types;
use crate::command_dispatcher::{CommandDispatcher, DispatchError};
use crate::event_store::EventStore;
use crate::projections::{CursorCheck, ProjectionError, StreamCursors};

#[derive(Debug)]
pub enum MonitorError {
    Projection(ProjectionError),
    Dispatch(DispatchError),
}

impl From<ProjectionError> for MonitorError {
    fn from(value: ProjectionError) -> Self {
        MonitorError::Projection(value)
    }
}

impl From<DispatchError> for MonitorError {
    fn from(value: DispatchError) -> Self {
        MonitorError::Dispatch(value)
    }
}

/// Bus consumer that opens automatic reorder requests.
///
/// Maintains its own open-request index from reorder events (opened ->
/// tracked, fulfilled/cancelled -> cleared) so idempotency holds without a
/// read-model lookup, including across replays.
pub struct ReorderMonitor<S, B> {
    dispatcher: Arc<CommandDispatcher<S, B>>,
    buffer_quantity: Decimal,
    open_requests: RwLock<HashMap<(TenantId, KitItemId), ReorderRequestId>>,
    cursors: StreamCursors,
}

impl<S, B> ReorderMonitor<S, B>
where
    S: EventStore,
    B: EventBus<EventEnvelope<JsonValue>>,
{
    pub fn new(dispatcher: Arc<CommandDispatcher<S, B>>, buffer_quantity: Decimal) -> Self {
        Self {
            dispatcher,
            buffer_quantity,
            open_requests: RwLock::new(HashMap::new()),
            cursors: StreamCursors::new(),
        }
    }

    pub fn handle_envelope(
        &self,
        envelope: &EventEnvelope<JsonValue>,
    ) -> Result<(), MonitorError> {
        match envelope.aggregate_type() {
            t if t == aggregate_types::KIT_ITEM => self.handle_kit_item(envelope),
            t if t == aggregate_types::REORDER_REQUEST => self.handle_reorder(envelope),
            _ => Ok(()),
        }
    }

    fn handle_kit_item(&self, envelope: &EventEnvelope<JsonValue>) -> Result<(), MonitorError> {
        let tenant_id = envelope.tenant_id();
        let aggregate_id = envelope.aggregate_id();
        let seq = envelope.sequence_number();

        match self.cursors.check(tenant_id, aggregate_id, seq)? {
            CursorCheck::Duplicate => return Ok(()),
            CursorCheck::Apply => {}
        }

        let event: KitItemEvent = serde_json::from_value(envelope.payload().clone())
            .map_err(|e| MonitorError::Projection(ProjectionError::Deserialize(e.to_string())))?;

        if let KitItemEvent::LowStockFlagged(flag) = event {
            self.on_low_stock(tenant_id, &flag)?;
        }

        self.cursors.advance(tenant_id, aggregate_id, seq);
        Ok(())
    }

    fn on_low_stock(&self, tenant_id: TenantId, flag: &LowStockFlagged) -> Result<(), MonitorError> {
        let key = (tenant_id, flag.item_id);
        {
            let index = self
                .open_requests
                .read()
                .map_err(|_| MonitorError::Projection(ProjectionError::TenantIsolation(
                    "monitor index lock poisoned".to_string(),
                )))?;
            if let Some(existing) = index.get(&key) {
                debug!(item_id = %flag.item_id, request_id = %existing, "open automatic reorder exists, skipping flag");
                return Ok(());
            }
        }

        let mut quantity = flag.minimum_stock_level - flag.quantity_after + self.buffer_quantity;
        if quantity <= Decimal::ZERO {
            quantity = Decimal::ONE;
        }

        let request_id = ReorderRequestId::new(AggregateId::new());
        let command = ReorderCommand::Open(OpenReorder {
            tenant_id,
            request_id,
            kit_id: flag.kit_id,
            item_id: Some(flag.item_id),
            part_number: flag.part_number.clone(),
            description: flag.description.clone(),
            item_type: flag.item_type,
            quantity_requested: quantity,
            priority: derive_priority(flag.quantity_after, flag.minimum_stock_level),
            is_automatic: true,
            requested_by: None,
            notes: None,
            occurred_at: flag.occurred_at,
        });

        self.dispatcher.dispatch::<ReorderRequest>(
            tenant_id,
            request_id.0,
            aggregate_types::REORDER_REQUEST,
            command,
            |_, id| ReorderRequest::empty(ReorderRequestId::new(id)),
        )?;

        info!(item_id = %flag.item_id, request_id = %request_id, %quantity, "opened automatic reorder");

        // Track immediately; waiting for our own Opened event to come back
        // around would leave a window for a duplicate.
        if let Ok(mut index) = self.open_requests.write() {
            index.insert(key, request_id);
        }

        Ok(())
    }

    fn handle_reorder(&self, envelope: &EventEnvelope<JsonValue>) -> Result<(), MonitorError> {
        let event: ReorderEvent = serde_json::from_value(envelope.payload().clone())
            .map_err(|e| MonitorError::Projection(ProjectionError::Deserialize(e.to_string())))?;
        let tenant_id = envelope.tenant_id();

        let mut index = match self.open_requests.write() {
            Ok(index) => index,
            Err(_) => return Ok(()),
        };

        match event {
            ReorderEvent::Opened(e) if e.is_automatic => {
                if let Some(item_id) = e.item_id {
                    index.entry((tenant_id, item_id)).or_insert(e.request_id);
                }
            }
            ReorderEvent::Fulfilled(e) => {
                if let Some(item_id) = e.item_id {
                    clear_if_tracked(&mut index, tenant_id, item_id, e.request_id);
                }
            }
            ReorderEvent::Cancelled(e) => {
                if let Some(item_id) = e.item_id {
                    clear_if_tracked(&mut index, tenant_id, item_id, e.request_id);
                }
            }
            _ => {}
        }

        Ok(())
    }
}

fn clear_if_tracked(
    index: &mut HashMap<(TenantId, KitItemId), ReorderRequestId>,
    tenant_id: TenantId,
    item_id: KitItemId,
    request_id: ReorderRequestId,
) {
    if index.get(&(tenant_id, item_id)) == Some(&request_id) {
        index.remove(&(tenant_id, item_id));
    }
}
