//! Reorder fulfillment.
//!
//! Fulfillment mutates the inventory ledger and then commits the request's
//! status transition. The steps span multiple aggregate streams, so the
//! service compensates on failure: either everything takes effect or the
//! ledger is put back the way it was.

use std::sync::Arc;

use chrono::Utc;
use serde_json::Value as JsonValue;
use tracing::{error, info, warn};

use fieldkit_core::{AggregateId, DomainError, TenantId};
use fieldkit_events::{EventBus, EventEnvelope};
use fieldkit_inventory::{
    BoxId, IssueStock, ItemType, KitItem, KitItemCommand, KitItemId, ReceiveStock,
    ReceiveWarehouseStock, RemoveItem, StockItem, WarehouseStock, WarehouseStockCommand,
    WarehouseStockId, WithdrawWarehouseStock,
};
use fieldkit_reorders::{FulfillReorder, ReorderCommand, ReorderRequest, ReorderRequestId, ReorderStatus};
use rust_decimal::Decimal;

use crate::aggregate_types;
use crate::command_dispatcher::{rehydrate, CommandDispatcher, DispatchError};
use crate::event_store::EventStore;
use crate::projections::{KitStockProjection, WarehouseStockProjection};
use crate::read_model::TenantStore;

/// What the ledger side of a fulfillment did, for compensation.
enum LedgerMutation {
    CreditedExisting { item_id: KitItemId, quantity: Decimal },
    CreatedItem { item_id: KitItemId, quantity: Decimal },
}

/// Orchestrates the `ordered -> fulfilled` transition together with its
/// ledger effects (see module docs for the compensation rules).
pub struct FulfillmentService<S, B, KS, WS>
where
    S: EventStore,
    B: EventBus<EventEnvelope<JsonValue>>,
    KS: TenantStore<KitItemId, crate::projections::KitItemReadModel>,
    WS: TenantStore<WarehouseStockId, crate::projections::WarehouseStockReadModel>,
{
    dispatcher: Arc<CommandDispatcher<S, B>>,
    kit_stock: Arc<KitStockProjection<KS>>,
    warehouse_stock: Arc<WarehouseStockProjection<WS>>,
}

impl<S, B, KS, WS> FulfillmentService<S, B, KS, WS>
where
    S: EventStore,
    B: EventBus<EventEnvelope<JsonValue>>,
    KS: TenantStore<KitItemId, crate::projections::KitItemReadModel>,
    WS: TenantStore<WarehouseStockId, crate::projections::WarehouseStockReadModel>,
{
    pub fn new(
        dispatcher: Arc<CommandDispatcher<S, B>>,
        kit_stock: Arc<KitStockProjection<KS>>,
        warehouse_stock: Arc<WarehouseStockProjection<WS>>,
    ) -> Self {
        Self {
            dispatcher,
            kit_stock,
            warehouse_stock,
        }
    }

    /// Fulfill an ordered reorder request into `destination_box_id`.
    ///
    /// 1. Reject unless the request is currently `ordered`.
    /// 2. Mutate the ledger: credit the existing item, or create one in the
    ///    destination box; chemicals are transferred out of warehouse stock
    ///    first.
    /// 3. Commit `FulfillReorder`; if a concurrent fulfill won the race, the
    ///    ledger mutation from step 2 is compensated.
    pub fn fulfill(
        &self,
        tenant_id: TenantId,
        request_id: ReorderRequestId,
        destination_box_id: BoxId,
    ) -> Result<(), DispatchError> {
        let request = rehydrate::<ReorderRequest, _>(
            self.dispatcher.store(),
            tenant_id,
            request_id.0,
            |_, id| ReorderRequest::empty(ReorderRequestId::new(id)),
        )?;

        if !request.exists() {
            return Err(DomainError::not_found().into());
        }
        if request.status() != ReorderStatus::Ordered {
            return Err(DomainError::invalid_transition(format!(
                "cannot fulfill a {:?} request",
                request.status()
            ))
            .into());
        }
        let quantity = request.quantity_requested();

        // Chemicals come out of warehouse stock; everything else is an
        // external delivery straight into the kit.
        let warehouse_source = if request.item_type() == ItemType::Chemical {
            let source = self
                .warehouse_stock
                .find_by_part(tenant_id, request.part_number())
                .ok_or_else(|| {
                    DispatchError::from(DomainError::insufficient_warehouse_stock(format!(
                        "no warehouse stock for part {}",
                        request.part_number()
                    )))
                })?;

            self.dispatcher.dispatch::<WarehouseStock>(
                tenant_id,
                source.stock_id.0,
                aggregate_types::WAREHOUSE_STOCK,
                WarehouseStockCommand::Withdraw(WithdrawWarehouseStock {
                    tenant_id,
                    stock_id: source.stock_id,
                    quantity,
                    occurred_at: Utc::now(),
                }),
                |_, id| WarehouseStock::empty(WarehouseStockId::new(id)),
            )?;

            Some(source)
        } else {
            None
        };

        let mutation = match self.credit_kit(tenant_id, &request, destination_box_id) {
            Ok(mutation) => mutation,
            Err(err) => {
                if let Some(source) = &warehouse_source {
                    self.redeposit_warehouse(tenant_id, source, quantity);
                }
                return Err(err);
            }
        };

        let fulfilled_item_id = match &mutation {
            LedgerMutation::CreditedExisting { item_id, .. } => *item_id,
            LedgerMutation::CreatedItem { item_id, .. } => *item_id,
        };

        let fulfill = ReorderCommand::Fulfill(FulfillReorder {
            tenant_id,
            request_id,
            destination_box_id,
            fulfilled_item_id,
            occurred_at: Utc::now(),
        });
        let result = self.dispatcher.dispatch::<ReorderRequest>(
            tenant_id,
            request_id.0,
            aggregate_types::REORDER_REQUEST,
            fulfill,
            |_, id| ReorderRequest::empty(ReorderRequestId::new(id)),
        );

        if let Err(err) = result {
            warn!(%request_id, "fulfill transition failed after ledger mutation, compensating");
            self.compensate_ledger(tenant_id, &mutation);
            if let Some(source) = &warehouse_source {
                self.redeposit_warehouse(tenant_id, source, quantity);
            }
            return Err(err);
        }

        info!(%request_id, item_id = %fulfilled_item_id, %quantity, "reorder fulfilled");
        Ok(())
    }

    fn credit_kit(
        &self,
        tenant_id: TenantId,
        request: &ReorderRequest,
        destination_box_id: BoxId,
    ) -> Result<LedgerMutation, DispatchError> {
        let quantity = request.quantity_requested();

        if let Some(item_id) = request.item_id() {
            self.dispatcher.dispatch::<KitItem>(
                tenant_id,
                item_id.0,
                aggregate_types::KIT_ITEM,
                KitItemCommand::ReceiveStock(ReceiveStock {
                    tenant_id,
                    item_id,
                    quantity,
                    occurred_at: Utc::now(),
                }),
                |_, id| KitItem::empty(KitItemId::new(id)),
            )?;
            return Ok(LedgerMutation::CreditedExisting { item_id, quantity });
        }

        let kit_id = request
            .kit_id()
            .ok_or_else(|| DispatchError::from(DomainError::invariant("request has no kit_id")))?;

        if self
            .kit_stock
            .find_active(tenant_id, kit_id, destination_box_id, request.part_number())
            .is_some()
        {
            return Err(DomainError::duplicate_part(format!(
                "part {} already active in the destination box",
                request.part_number()
            ))
            .into());
        }

        let item_id = KitItemId::new(AggregateId::new());
        self.dispatcher.dispatch::<KitItem>(
            tenant_id,
            item_id.0,
            aggregate_types::KIT_ITEM,
            KitItemCommand::StockItem(StockItem {
                tenant_id,
                item_id,
                kit_id,
                box_id: destination_box_id,
                part_number: request.part_number().to_string(),
                description: request.description().to_string(),
                item_type: request.item_type(),
                quantity,
                minimum_stock_level: None,
                occurred_at: Utc::now(),
            }),
            |_, id| KitItem::empty(KitItemId::new(id)),
        )?;
        Ok(LedgerMutation::CreatedItem { item_id, quantity })
    }

    fn compensate_ledger(&self, tenant_id: TenantId, mutation: &LedgerMutation) {
        let (item_id, quantity, remove_after) = match mutation {
            LedgerMutation::CreditedExisting { item_id, quantity } => (*item_id, *quantity, false),
            LedgerMutation::CreatedItem { item_id, quantity } => (*item_id, *quantity, true),
        };

        let issue = self.dispatcher.dispatch::<KitItem>(
            tenant_id,
            item_id.0,
            aggregate_types::KIT_ITEM,
            KitItemCommand::IssueStock(IssueStock {
                tenant_id,
                item_id,
                quantity,
                issued_to: None,
                occurred_at: Utc::now(),
            }),
            |_, id| KitItem::empty(KitItemId::new(id)),
        );
        if let Err(err) = issue {
            error!(%item_id, ?err, "ledger compensation failed");
            return;
        }

        if remove_after {
            let removed = self.dispatcher.dispatch::<KitItem>(
                tenant_id,
                item_id.0,
                aggregate_types::KIT_ITEM,
                KitItemCommand::RemoveItem(RemoveItem {
                    tenant_id,
                    item_id,
                    occurred_at: Utc::now(),
                }),
                |_, id| KitItem::empty(KitItemId::new(id)),
            );
            if let Err(err) = removed {
                error!(%item_id, ?err, "failed to remove compensated item");
            }
        }
    }

    fn redeposit_warehouse(
        &self,
        tenant_id: TenantId,
        source: &crate::projections::WarehouseStockReadModel,
        quantity: Decimal,
    ) {
        let result = self.dispatcher.dispatch::<WarehouseStock>(
            tenant_id,
            source.stock_id.0,
            aggregate_types::WAREHOUSE_STOCK,
            WarehouseStockCommand::Receive(ReceiveWarehouseStock {
                tenant_id,
                stock_id: source.stock_id,
                warehouse_id: source.warehouse_id,
                part_number: source.part_number.clone(),
                quantity,
                occurred_at: Utc::now(),
            }),
            |_, id| WarehouseStock::empty(WarehouseStockId::new(id)),
        );
        if let Err(err) = result {
            error!(stock_id = %source.stock_id, ?err, "warehouse compensation failed");
        }
    }
}
