//! Shared inventory vocabulary: location identifiers, item classification,
//! and the derived stock status function.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use fieldkit_core::AggregateId;

macro_rules! impl_ref_id {
    ($t:ident) => {
        /// Reference identifier (the referenced entity lives outside this crate).
        #[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $t(pub AggregateId);

        impl $t {
            pub fn new(id: AggregateId) -> Self {
                Self(id)
            }
        }

        impl core::fmt::Display for $t {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                core::fmt::Display::fmt(&self.0, f)
            }
        }
    };
}

impl_ref_id!(KitId);
impl_ref_id!(BoxId);
impl_ref_id!(WarehouseId);

/// Classification of a kit item; drives fulfillment behavior.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemType {
    Tool,
    Chemical,
    Expendable,
}

/// Derived stock status of a kit item.
///
/// Always computed from quantity vs minimum stock level, never stored.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StockStatus {
    Available,
    LowStock,
    OutOfStock,
}

/// Pure status function: quantity vs minimum stock level.
pub fn stock_status(quantity: Decimal, minimum_stock_level: Option<Decimal>) -> StockStatus {
    if quantity <= Decimal::ZERO {
        return StockStatus::OutOfStock;
    }
    match minimum_stock_level {
        Some(min) if quantity <= min => StockStatus::LowStock,
        _ => StockStatus::Available,
    }
}
