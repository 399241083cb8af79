//! Inventory ledger domain module (event-sourced).
//!
//! Authoritative quantities for kit items (tools, chemicals, expendables)
//! keyed by (kit, box), and warehouse-tracked chemical stock. Pure domain
//! logic: no IO, no HTTP, no storage.

pub mod item;
pub mod types;
pub mod warehouse;

pub use item::{
    IssueStock, ItemRemoved, ItemStocked, KitItem, KitItemCommand, KitItemEvent, KitItemId,
    LowStockFlagged, ReceiveStock, RemoveItem, StockIssued, StockItem, StockReceived,
};
pub use types::{stock_status, BoxId, ItemType, KitId, StockStatus, WarehouseId};
pub use warehouse::{
    ReceiveWarehouseStock, WarehouseStock, WarehouseStockCommand, WarehouseStockEvent,
    WarehouseStockId, WarehouseStockReceived, WarehouseStockWithdrawn, WithdrawWarehouseStock,
};
