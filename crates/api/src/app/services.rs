use std::{convert::Infallible, sync::Arc, time::Duration};

use axum::response::sse::{Event as SseEvent, KeepAlive, Sse};
use tokio::sync::broadcast;
use tokio_stream::{wrappers::BroadcastStream, StreamExt};

use fieldkit_checkouts::{CheckoutId, ToolId};
use fieldkit_core::{AggregateId, DomainError, TenantId};
use fieldkit_events::{EventBus, EventEnvelope, InMemoryEventBus};
use fieldkit_infra::{
    aggregate_types,
    command_dispatcher::{CommandDispatcher, DispatchError},
    event_store::{InMemoryEventStore, StoredEvent},
    fulfillment::FulfillmentService,
    projections::{
        AlertFeed, KitItemReadModel, KitStockProjection, ReorderQueueProjection, ReorderReadModel,
        ToolDirectoryProjection, ToolReadModel, WarehouseStockProjection, WarehouseStockReadModel,
    },
    read_model::InMemoryTenantStore,
    reorder_monitor::ReorderMonitor,
};
use fieldkit_inventory::{KitItemId, WarehouseStockId};
use fieldkit_reorders::ReorderRequestId;

use crate::config::ApiConfig;

/// Realtime message broadcast via SSE.
#[derive(Debug, Clone, serde::Serialize)]
pub struct RealtimeMessage {
    pub tenant_id: TenantId,
    pub topic: String,
    pub payload: serde_json::Value,
}

pub type JsonEnvelope = EventEnvelope<serde_json::Value>;
pub type Store = Arc<InMemoryEventStore>;
pub type Bus = Arc<InMemoryEventBus<JsonEnvelope>>;
pub type Dispatcher = CommandDispatcher<Store, Bus>;

pub type KitStore = Arc<InMemoryTenantStore<KitItemId, KitItemReadModel>>;
pub type WarehouseStore = Arc<InMemoryTenantStore<WarehouseStockId, WarehouseStockReadModel>>;
pub type ReorderStore = Arc<InMemoryTenantStore<ReorderRequestId, ReorderReadModel>>;
pub type ToolStore = Arc<InMemoryTenantStore<ToolId, ToolReadModel>>;
pub type CheckoutIndex = Arc<InMemoryTenantStore<CheckoutId, ToolId>>;

pub type KitStock = KitStockProjection<KitStore>;
pub type WarehouseStock = WarehouseStockProjection<WarehouseStore>;
pub type ReorderQueue = ReorderQueueProjection<ReorderStore>;
pub type ToolDirectory = ToolDirectoryProjection<ToolStore, CheckoutIndex>;
pub type Alerts = AlertFeed<KitStore, ReorderStore, ToolStore, CheckoutIndex>;
pub type Fulfillment = FulfillmentService<Store, Bus, KitStore, WarehouseStore>;

/// Shared application services: dispatcher, projections, and the reorder
/// machinery, wired over the in-memory store and bus.
pub struct AppServices {
    dispatcher: Arc<Dispatcher>,
    kit_stock: Arc<KitStock>,
    warehouse_stock: Arc<WarehouseStock>,
    reorders: Arc<ReorderQueue>,
    tools: Arc<ToolDirectory>,
    alerts: Alerts,
    fulfillment: Fulfillment,
    enforce_calibration: bool,
    realtime_tx: broadcast::Sender<RealtimeMessage>,
}

impl AppServices {
    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }

    pub fn kit_stock(&self) -> &KitStock {
        &self.kit_stock
    }

    pub fn warehouse_stock(&self) -> &WarehouseStock {
        &self.warehouse_stock
    }

    pub fn reorders(&self) -> &ReorderQueue {
        &self.reorders
    }

    pub fn tools(&self) -> &ToolDirectory {
        &self.tools
    }

    pub fn alerts(&self) -> &Alerts {
        &self.alerts
    }

    pub fn fulfillment(&self) -> &Fulfillment {
        &self.fulfillment
    }

    pub fn enforce_calibration(&self) -> bool {
        self.enforce_calibration
    }

    pub fn realtime_tx(&self) -> &broadcast::Sender<RealtimeMessage> {
        &self.realtime_tx
    }

    pub fn dispatch<A>(
        &self,
        tenant_id: TenantId,
        aggregate_id: AggregateId,
        aggregate_type: &str,
        command: A::Command,
        make_aggregate: impl FnOnce(TenantId, AggregateId) -> A,
    ) -> Result<Vec<StoredEvent>, DispatchError>
    where
        A: fieldkit_core::Aggregate<Error = DomainError>,
        A::Event: fieldkit_events::Event + serde::Serialize + serde::de::DeserializeOwned,
    {
        self.dispatcher
            .dispatch::<A>(tenant_id, aggregate_id, aggregate_type, command, make_aggregate)
    }
}

/// Wire the in-memory infrastructure: store + bus + projections + monitor.
pub fn build_services(config: &ApiConfig) -> AppServices {
    let store: Store = Arc::new(InMemoryEventStore::new());
    let bus: Bus = Arc::new(InMemoryEventBus::new());

    let kit_store: KitStore = Arc::new(InMemoryTenantStore::new());
    let kit_stock: Arc<KitStock> = Arc::new(KitStockProjection::new(kit_store));

    let warehouse_store: WarehouseStore = Arc::new(InMemoryTenantStore::new());
    let warehouse_stock: Arc<WarehouseStock> =
        Arc::new(WarehouseStockProjection::new(warehouse_store));

    let reorder_store: ReorderStore = Arc::new(InMemoryTenantStore::new());
    let reorders: Arc<ReorderQueue> = Arc::new(ReorderQueueProjection::new(reorder_store));

    let tool_store: ToolStore = Arc::new(InMemoryTenantStore::new());
    let checkout_index: CheckoutIndex = Arc::new(InMemoryTenantStore::new());
    let tools: Arc<ToolDirectory> =
        Arc::new(ToolDirectoryProjection::new(tool_store, checkout_index));

    let dispatcher: Arc<Dispatcher> = Arc::new(CommandDispatcher::new(store.clone(), bus.clone()));

    let alerts = AlertFeed::new(kit_stock.clone(), reorders.clone(), tools.clone());
    let fulfillment =
        FulfillmentService::new(dispatcher.clone(), kit_stock.clone(), warehouse_stock.clone());
    let monitor = ReorderMonitor::new(dispatcher.clone(), config.reorder_buffer_quantity);

    // Realtime channel (SSE): lossy broadcast, tenant-filtered in handlers.
    let (realtime_tx, _realtime_rx) = broadcast::channel::<RealtimeMessage>(256);

    // Background subscriber: bus -> projections -> reorder monitor.
    {
        let sub = bus.subscribe();
        let kit_stock = kit_stock.clone();
        let warehouse_stock = warehouse_stock.clone();
        let reorders = reorders.clone();
        let tools = tools.clone();
        let realtime_tx = realtime_tx.clone();
        // Detached OS thread rather than `spawn_blocking`: the closure holds
        // the monitor (and through it the bus), so its subscription never
        // disconnects and the loop never exits; the runtime must not join it
        // on shutdown.
        std::thread::spawn(move || loop {
            match sub.recv() {
                Ok(env) => {
                    let at = env.aggregate_type().to_string();

                    let apply_ok = match at.as_str() {
                        aggregate_types::KIT_ITEM => {
                            kit_stock.apply_envelope(&env).map_err(|e| e.to_string())
                        }
                        aggregate_types::WAREHOUSE_STOCK => {
                            warehouse_stock.apply_envelope(&env).map_err(|e| e.to_string())
                        }
                        aggregate_types::REORDER_REQUEST => {
                            reorders.apply_envelope(&env).map_err(|e| e.to_string())
                        }
                        aggregate_types::TOOL => {
                            tools.apply_envelope(&env).map_err(|e| e.to_string())
                        }
                        _ => Ok(()),
                    };

                    if let Err(e) = apply_ok {
                        tracing::warn!("projection apply failed: {e}");
                        continue;
                    }

                    // The monitor filters aggregate types internally.
                    if let Err(e) = monitor.handle_envelope(&env) {
                        tracing::warn!("reorder monitor failed: {e:?}");
                    }

                    // Broadcast projection update (lossy; no backpressure on core).
                    let _ = realtime_tx.send(RealtimeMessage {
                        tenant_id: env.tenant_id(),
                        topic: format!("{at}.projection_updated"),
                        payload: serde_json::json!({
                            "kind": "projection_update",
                            "aggregate_type": at,
                            "aggregate_id": env.aggregate_id().to_string(),
                            "sequence_number": env.sequence_number(),
                        }),
                    });
                }
                Err(_) => break,
            }
        });
    }

    AppServices {
        dispatcher,
        kit_stock,
        warehouse_stock,
        reorders,
        tools,
        alerts,
        fulfillment,
        enforce_calibration: config.enforce_calibration,
        realtime_tx,
    }
}

/// Build an SSE stream for a tenant (used by `/stream`).
pub fn tenant_sse_stream(
    services: Arc<AppServices>,
    tenant_id: TenantId,
) -> Sse<impl tokio_stream::Stream<Item = Result<SseEvent, Infallible>>> {
    let rx = services.realtime_tx().subscribe();
    let stream = BroadcastStream::new(rx).filter_map(move |msg| match msg {
        Ok(m) if m.tenant_id == tenant_id => {
            let data = serde_json::to_string(&m.payload).unwrap_or_else(|_| "{}".to_string());
            Some(Ok(SseEvent::default().event(m.topic).data(data)))
        }
        _ => None,
    });

    Sse::new(stream).keep_alive(KeepAlive::new().interval(Duration::from_secs(15)))
}
