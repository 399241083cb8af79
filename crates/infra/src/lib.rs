//! Infrastructure layer: event store, command dispatch, projections,
//! reactors (reorder monitor, fulfillment).

pub mod command_dispatcher;
pub mod event_store;
pub mod fulfillment;
pub mod projections;
pub mod read_model;
pub mod reorder_monitor;


/// Aggregate type identifiers for event streams and envelope routing.
pub mod aggregate_types {
    pub const KIT_ITEM: &str = "inventory.kit_item";
    pub const WAREHOUSE_STOCK: &str = "inventory.warehouse_stock";
    pub const REORDER_REQUEST: &str = "reorders.request";
    pub const TOOL: &str = "checkouts.tool";
}
