//! Command execution pipeline.
//!
//! One consistent path for every state mutation:
//!
//! ```text
//! command -> load stream -> rehydrate -> handle (pure) -> append -> publish
//! ```
//!
//! The append uses the exact stream version observed during load, so two
//! concurrent commands against the same aggregate cannot both commit. That
//! per-stream serializability is what the domain invariants (single open
//! checkout per tool, one open automatic reorder per item) lean on.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value as JsonValue;
use uuid::Uuid;

use fieldkit_core::{Aggregate, AggregateId, DomainError, ExpectedVersion, TenantId};
use fieldkit_events::{EventBus, EventEnvelope};

use crate::event_store::{EventStore, EventStoreError, StoredEvent, UncommittedEvent};

#[derive(Debug)]
pub enum DispatchError {
    /// Optimistic concurrency failure (stale stream version).
    Concurrency(String),
    /// Tenant isolation violation (cross-tenant or cross-aggregate stream mixing).
    TenantIsolation(String),
    /// Deterministic domain rejection, passed through unchanged for the API
    /// layer to map to a status code.
    Domain(DomainError),
    /// Historical payload failed to deserialize into the aggregate event type.
    Deserialize(String),
    /// Persisting to the event store failed.
    Store(EventStoreError),
    /// Publication failed after a successful append. The events are durable;
    /// retrying publication gives at-least-once delivery.
    Publish(String),
}

impl From<EventStoreError> for DispatchError {
    fn from(value: EventStoreError) -> Self {
        match &value {
            EventStoreError::Concurrency(msg) => DispatchError::Concurrency(msg.clone()),
            EventStoreError::TenantIsolation(msg) => DispatchError::TenantIsolation(msg.clone()),
            _ => DispatchError::Store(value),
        }
    }
}

impl From<DomainError> for DispatchError {
    fn from(value: DomainError) -> Self {
        DispatchError::Domain(value)
    }
}

/// Command execution engine composed from an `EventStore` and an `EventBus`.
///
/// Events are persisted before publication; if the append fails nothing is
/// published. If publication fails the events are already durable, so the
/// error surfaces as `DispatchError::Publish` and downstream consumers catch
/// up on the next publish (subscribers must be idempotent either way).
#[derive(Debug)]
pub struct CommandDispatcher<S, B> {
    store: S,
    bus: B,
}

impl<S, B> CommandDispatcher<S, B> {
    pub fn new(store: S, bus: B) -> Self {
        Self { store, bus }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn bus(&self) -> &B {
        &self.bus
    }
}

impl<S, B> CommandDispatcher<S, B>
where
    S: EventStore,
    B: EventBus<EventEnvelope<JsonValue>>,
{
    /// Dispatch a command against one aggregate stream.
    ///
    /// The `make_aggregate` closure produces the empty instance the history
    /// is replayed into (e.g. `|_, id| KitItem::empty(KitItemId::new(id))`).
    /// Returns the committed events with their assigned sequence numbers.
    pub fn dispatch<A>(
        &self,
        tenant_id: TenantId,
        aggregate_id: AggregateId,
        aggregate_type: impl Into<String>,
        command: A::Command,
        make_aggregate: impl FnOnce(TenantId, AggregateId) -> A,
    ) -> Result<Vec<StoredEvent>, DispatchError>
    where
        A: Aggregate<Error = DomainError>,
        A::Event: fieldkit_events::Event + Serialize + DeserializeOwned,
    {
        let history = self.store.load_stream(tenant_id, aggregate_id)?;
        validate_loaded_stream(tenant_id, aggregate_id, &history)?;
        let expected = ExpectedVersion::Exact(stream_version(&history));

        let mut aggregate = make_aggregate(tenant_id, aggregate_id);
        apply_history::<A>(&mut aggregate, &history)?;

        let decided = aggregate.handle(&command).map_err(DispatchError::from)?;
        if decided.is_empty() {
            return Ok(vec![]);
        }

        let aggregate_type = aggregate_type.into();
        let uncommitted = decided
            .iter()
            .map(|ev| {
                UncommittedEvent::from_typed(
                    tenant_id,
                    aggregate_id,
                    aggregate_type.clone(),
                    Uuid::now_v7(),
                    ev,
                )
            })
            .collect::<Result<Vec<_>, _>>()?;

        let committed = self.store.append(uncommitted, expected)?;

        for stored in &committed {
            self.bus
                .publish(stored.to_envelope())
                .map_err(|e| DispatchError::Publish(format!("{e:?}")))?;
        }

        Ok(committed)
    }
}

/// Rehydrate an aggregate from its stored history without dispatching
/// anything. Used for read-after-write responses and precondition checks.
pub fn rehydrate<A, S>(
    store: &S,
    tenant_id: TenantId,
    aggregate_id: AggregateId,
    make_aggregate: impl FnOnce(TenantId, AggregateId) -> A,
) -> Result<A, DispatchError>
where
    A: Aggregate,
    A::Event: DeserializeOwned,
    S: EventStore,
{
    let history = store.load_stream(tenant_id, aggregate_id)?;
    validate_loaded_stream(tenant_id, aggregate_id, &history)?;
    let mut aggregate = make_aggregate(tenant_id, aggregate_id);
    apply_history::<A>(&mut aggregate, &history)?;
    Ok(aggregate)
}

fn stream_version(stream: &[StoredEvent]) -> u64 {
    stream.last().map(|e| e.sequence_number).unwrap_or(0)
}

fn validate_loaded_stream(
    tenant_id: TenantId,
    aggregate_id: AggregateId,
    stream: &[StoredEvent],
) -> Result<(), DispatchError> {
    // Re-check tenant and ordering even though the store should already
    // guarantee both.
    let mut last = 0u64;
    for (idx, e) in stream.iter().enumerate() {
        if e.tenant_id != tenant_id {
            return Err(DispatchError::TenantIsolation(format!(
                "loaded stream contains wrong tenant_id at index {idx}"
            )));
        }
        if e.aggregate_id != aggregate_id {
            return Err(DispatchError::TenantIsolation(format!(
                "loaded stream contains wrong aggregate_id at index {idx}"
            )));
        }
        if e.sequence_number <= last {
            return Err(DispatchError::Store(EventStoreError::InvalidAppend(
                format!(
                    "non-monotonic sequence_number in loaded stream (last={last}, found={})",
                    e.sequence_number
                ),
            )));
        }
        last = e.sequence_number;
    }
    Ok(())
}

fn apply_history<A>(aggregate: &mut A, history: &[StoredEvent]) -> Result<(), DispatchError>
where
    A: Aggregate,
    A::Event: DeserializeOwned,
{
    let mut sorted = history.to_vec();
    sorted.sort_by_key(|e| e.sequence_number);

    for stored in sorted {
        let ev: A::Event = serde_json::from_value(stored.payload)
            .map_err(|e| DispatchError::Deserialize(e.to_string()))?;
        aggregate.apply(&ev);
    }

    Ok(())
}
