//! Read model builders.
//!
//! Every projection consumes published JSON envelopes, keeps a per-stream
//! cursor so at-least-once delivery stays idempotent, enforces tenant
//! isolation at the event level, and can be rebuilt from scratch by
//! replaying the store.

mod alerts;
mod cursors;
mod kit_stock;
mod reorder_queue;
mod tool_directory;
mod warehouse_stock;

pub use alerts::{Alert, AlertFeed, AlertKind};
pub use kit_stock::{KitItemReadModel, KitStockProjection};
pub use reorder_queue::{ReorderQueueProjection, ReorderReadModel};
pub use tool_directory::{ToolDirectoryProjection, ToolReadModel};
pub use warehouse_stock::{WarehouseStockProjection, WarehouseStockReadModel};

pub(crate) use cursors::{CursorCheck, StreamCursors};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProjectionError {
    #[error("failed to deserialize event payload: {0}")]
    Deserialize(String),

    #[error("tenant isolation violation: {0}")]
    TenantIsolation(String),

    #[error("non-monotonic sequence number (last={last}, found={found})")]
    NonMonotonicSequence { last: u64, found: u64 },
}
