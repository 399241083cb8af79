use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value as JsonValue;

use fieldkit_checkouts::{CheckoutId, CheckoutRecord, ToolEvent, ToolId, ToolStatus};
use fieldkit_core::TenantId;
use fieldkit_events::EventEnvelope;

use crate::aggregate_types;
use crate::read_model::TenantStore;

use super::{CursorCheck, ProjectionError, StreamCursors};

/// Queryable tool row: status, calibration, and the full custody history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ToolReadModel {
    pub tool_id: ToolId,
    pub name: String,
    pub serial_number: String,
    pub status: ToolStatus,
    pub calibration_due: Option<DateTime<Utc>>,
    pub checkouts: Vec<CheckoutRecord>,
}

impl ToolReadModel {
    pub fn open_checkout(&self) -> Option<&CheckoutRecord> {
        self.checkouts.iter().find(|c| c.is_open())
    }
}

/// Tool directory projection.
///
/// Besides the per-tool read model it maintains a checkout-id index, since
/// the checkin/extend routes address a checkout without naming its tool.
#[derive(Debug)]
pub struct ToolDirectoryProjection<S, I>
where
    S: TenantStore<ToolId, ToolReadModel>,
    I: TenantStore<CheckoutId, ToolId>,
{
    store: S,
    checkout_index: I,
    cursors: StreamCursors,
}

impl<S, I> ToolDirectoryProjection<S, I>
where
    S: TenantStore<ToolId, ToolReadModel>,
    I: TenantStore<CheckoutId, ToolId>,
{
    pub fn new(store: S, checkout_index: I) -> Self {
        Self {
            store,
            checkout_index,
            cursors: StreamCursors::new(),
        }
    }

    pub fn get(&self, tenant_id: TenantId, tool_id: &ToolId) -> Option<ToolReadModel> {
        self.store.get(tenant_id, tool_id)
    }

    pub fn list(&self, tenant_id: TenantId) -> Vec<ToolReadModel> {
        let mut rows = self.store.list(tenant_id);
        rows.sort_by(|a, b| a.name.cmp(&b.name));
        rows
    }

    pub fn tool_for_checkout(&self, tenant_id: TenantId, checkout_id: CheckoutId) -> Option<ToolId> {
        self.checkout_index.get(tenant_id, &checkout_id)
    }

    pub fn apply_envelope(
        &self,
        envelope: &EventEnvelope<JsonValue>,
    ) -> Result<(), ProjectionError> {
        if envelope.aggregate_type() != aggregate_types::TOOL {
            return Ok(());
        }

        let tenant_id = envelope.tenant_id();
        let aggregate_id = envelope.aggregate_id();
        let seq = envelope.sequence_number();

        match self.cursors.check(tenant_id, aggregate_id, seq)? {
            CursorCheck::Duplicate => return Ok(()),
            CursorCheck::Apply => {}
        }

        let event: ToolEvent = serde_json::from_value(envelope.payload().clone())
            .map_err(|e| ProjectionError::Deserialize(e.to_string()))?;

        let (event_tenant, tool_id) = match &event {
            ToolEvent::Registered(e) => (e.tenant_id, e.tool_id),
            ToolEvent::CheckedOut(e) => (e.tenant_id, e.tool_id),
            ToolEvent::CheckedIn(e) => (e.tenant_id, e.tool_id),
            ToolEvent::Extended(e) => (e.tenant_id, e.tool_id),
            ToolEvent::SentToMaintenance(e) => (e.tenant_id, e.tool_id),
            ToolEvent::ReturnedToService(e) => (e.tenant_id, e.tool_id),
        };

        if event_tenant != tenant_id {
            return Err(ProjectionError::TenantIsolation(
                "event tenant_id does not match envelope tenant_id".to_string(),
            ));
        }
        if tool_id.0 != aggregate_id {
            return Err(ProjectionError::TenantIsolation(
                "event tool_id does not match envelope aggregate_id".to_string(),
            ));
        }

        match event {
            ToolEvent::Registered(e) => {
                self.store.upsert(
                    tenant_id,
                    e.tool_id,
                    ToolReadModel {
                        tool_id: e.tool_id,
                        name: e.name,
                        serial_number: e.serial_number,
                        status: ToolStatus::Available,
                        calibration_due: e.calibration_due,
                        checkouts: Vec::new(),
                    },
                );
            }
            ToolEvent::CheckedOut(e) => {
                if let Some(mut rm) = self.store.get(tenant_id, &e.tool_id) {
                    rm.checkouts.push(CheckoutRecord {
                        checkout_id: e.checkout_id,
                        user_id: e.user_id,
                        checkout_date: e.occurred_at,
                        expected_return_date: e.expected_return_date,
                        return_date: None,
                        condition_at_checkout: e.condition_at_checkout,
                        condition_at_return: None,
                        damage_reported: false,
                        damage_severity: None,
                        work_order: e.work_order,
                        return_notes: None,
                    });
                    rm.status = ToolStatus::CheckedOut;
                    self.store.upsert(tenant_id, e.tool_id, rm);
                    self.checkout_index.upsert(tenant_id, e.checkout_id, e.tool_id);
                }
            }
            ToolEvent::CheckedIn(e) => {
                if let Some(mut rm) = self.store.get(tenant_id, &e.tool_id) {
                    if let Some(record) = rm
                        .checkouts
                        .iter_mut()
                        .find(|c| c.checkout_id == e.checkout_id)
                    {
                        record.return_date = Some(e.occurred_at);
                        record.condition_at_return = e.condition_at_return;
                        record.damage_reported = e.damage_reported;
                        record.damage_severity = e.damage_severity;
                        record.return_notes = e.return_notes;
                    }
                    if rm.status == ToolStatus::CheckedOut {
                        rm.status = ToolStatus::Available;
                    }
                    self.store.upsert(tenant_id, e.tool_id, rm);
                }
            }
            ToolEvent::Extended(e) => {
                if let Some(mut rm) = self.store.get(tenant_id, &e.tool_id) {
                    if let Some(record) = rm
                        .checkouts
                        .iter_mut()
                        .find(|c| c.checkout_id == e.checkout_id)
                    {
                        record.expected_return_date = Some(e.new_expected_return_date);
                    }
                    self.store.upsert(tenant_id, e.tool_id, rm);
                }
            }
            ToolEvent::SentToMaintenance(e) => {
                if let Some(mut rm) = self.store.get(tenant_id, &e.tool_id) {
                    rm.status = ToolStatus::Maintenance;
                    self.store.upsert(tenant_id, e.tool_id, rm);
                }
            }
            ToolEvent::ReturnedToService(e) => {
                if let Some(mut rm) = self.store.get(tenant_id, &e.tool_id) {
                    rm.status = ToolStatus::Available;
                    self.store.upsert(tenant_id, e.tool_id, rm);
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
        self.checkout_index.clear_tenant(tenant_id);
        self.cursors.clear();
        for envelope in envelopes {
            self.apply_envelope(&envelope)?;
        }
        Ok(())
    }
}
