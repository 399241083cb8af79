use std::sync::Arc;

use chrono::Utc;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use rust_decimal::Decimal;
use serde_json::Value as JsonValue;

use fieldkit_core::{AggregateId, TenantId};
use fieldkit_events::{EventEnvelope, InMemoryEventBus};
use fieldkit_infra::aggregate_types;
use fieldkit_infra::command_dispatcher::CommandDispatcher;
use fieldkit_infra::event_store::InMemoryEventStore;
use fieldkit_infra::projections::{KitStockProjection, KitItemReadModel};
use fieldkit_infra::read_model::InMemoryTenantStore;
use fieldkit_inventory::{
    BoxId, IssueStock, ItemType, KitId, KitItem, KitItemCommand, KitItemId, ReceiveStock,
    StockItem,
};

type Bus = Arc<InMemoryEventBus<EventEnvelope<JsonValue>>>;
type Dispatcher = CommandDispatcher<Arc<InMemoryEventStore>, Bus>;

fn setup(history_len: usize) -> (Dispatcher, TenantId, KitItemId) {
    let store = Arc::new(InMemoryEventStore::new());
    let bus: Bus = Arc::new(InMemoryEventBus::new());
    let dispatcher = CommandDispatcher::new(store, bus);
    let tenant_id = TenantId::new();
    let item_id = KitItemId::new(AggregateId::new());

    dispatcher
        .dispatch::<KitItem>(
            tenant_id,
            item_id.0,
            aggregate_types::KIT_ITEM,
            KitItemCommand::StockItem(StockItem {
                tenant_id,
                item_id,
                kit_id: KitId::new(AggregateId::new()),
                box_id: BoxId::new(AggregateId::new()),
                part_number: "PN-BENCH".to_string(),
                description: "bench part".to_string(),
                item_type: ItemType::Expendable,
                quantity: Decimal::from(1_000_000_000u64),
                minimum_stock_level: None,
                occurred_at: Utc::now(),
            }),
            |_, id| KitItem::empty(KitItemId::new(id)),
        )
        .unwrap();

    // Grow the stream so rehydration cost is part of the measurement.
    for _ in 0..history_len {
        dispatcher
            .dispatch::<KitItem>(
                tenant_id,
                item_id.0,
                aggregate_types::KIT_ITEM,
                KitItemCommand::ReceiveStock(ReceiveStock {
                    tenant_id,
                    item_id,
                    quantity: Decimal::ONE,
                    occurred_at: Utc::now(),
                }),
                |_, id| KitItem::empty(KitItemId::new(id)),
            )
            .unwrap();
    }

    (dispatcher, tenant_id, item_id)
}

fn bench_dispatch_latency(c: &mut Criterion) {
    let mut group = c.benchmark_group("dispatch_issue_stock");
    for history_len in [0usize, 100, 1_000] {
        group.bench_with_input(
            BenchmarkId::from_parameter(history_len),
            &history_len,
            |b, &len| {
                let (dispatcher, tenant_id, item_id) = setup(len);
                b.iter(|| {
                    dispatcher
                        .dispatch::<KitItem>(
                            tenant_id,
                            item_id.0,
                            aggregate_types::KIT_ITEM,
                            KitItemCommand::IssueStock(IssueStock {
                                tenant_id,
                                item_id,
                                quantity: Decimal::ONE,
                                issued_to: None,
                                occurred_at: Utc::now(),
                            }),
                            |_, id| KitItem::empty(KitItemId::new(id)),
                        )
                        .unwrap()
                });
            },
        );
    }
    group.finish();
}

fn bench_projection_throughput(c: &mut Criterion) {
    let events_per_iter = 1_000u64;
    let mut group = c.benchmark_group("kit_stock_projection");
    group.throughput(Throughput::Elements(events_per_iter));

    group.bench_function("apply_envelopes", |b| {
        let store = Arc::new(InMemoryEventStore::new());
        let bus: Bus = Arc::new(InMemoryEventBus::new());
        let subscription = bus.subscribe();
        let dispatcher = CommandDispatcher::new(store, bus);
        let tenant_id = TenantId::new();
        let item_id = KitItemId::new(AggregateId::new());

        dispatcher
            .dispatch::<KitItem>(
                tenant_id,
                item_id.0,
                aggregate_types::KIT_ITEM,
                KitItemCommand::StockItem(StockItem {
                    tenant_id,
                    item_id,
                    kit_id: KitId::new(AggregateId::new()),
                    box_id: BoxId::new(AggregateId::new()),
                    part_number: "PN-PROJ".to_string(),
                    description: "bench part".to_string(),
                    item_type: ItemType::Expendable,
                    quantity: Decimal::ZERO,
                    minimum_stock_level: None,
                    occurred_at: Utc::now(),
                }),
                |_, id| KitItem::empty(KitItemId::new(id)),
            )
            .unwrap();

        for _ in 0..events_per_iter {
            dispatcher
                .dispatch::<KitItem>(
                    tenant_id,
                    item_id.0,
                    aggregate_types::KIT_ITEM,
                    KitItemCommand::ReceiveStock(ReceiveStock {
                        tenant_id,
                        item_id,
                        quantity: Decimal::ONE,
                        occurred_at: Utc::now(),
                    }),
                    |_, id| KitItem::empty(KitItemId::new(id)),
                )
                .unwrap();
        }

        let mut envelopes = Vec::new();
        while let Ok(envelope) = subscription.try_recv() {
            envelopes.push(envelope);
        }

        b.iter(|| {
            let projection: KitStockProjection<
                Arc<InMemoryTenantStore<KitItemId, KitItemReadModel>>,
            > = KitStockProjection::new(Arc::new(InMemoryTenantStore::new()));
            for envelope in &envelopes {
                projection.apply_envelope(black_box(envelope)).unwrap();
            }
        });
    });

    group.finish();
}

criterion_group!(benches, bench_dispatch_latency, bench_projection_throughput);
criterion_main!(benches);
