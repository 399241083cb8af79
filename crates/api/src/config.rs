//! Environment-driven API configuration.

use rust_decimal::Decimal;

/// Runtime configuration for the API process.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Listen address (`FIELDKIT_BIND_ADDR`).
    pub bind_addr: String,
    /// Extra quantity added on top of the shortfall when an automatic
    /// reorder opens (`REORDER_BUFFER_QUANTITY`).
    pub reorder_buffer_quantity: Decimal,
    /// Whether lapsed calibration blocks tool checkout
    /// (`ENFORCE_CALIBRATION`).
    pub enforce_calibration: bool,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8080".to_string(),
            reorder_buffer_quantity: Decimal::ZERO,
            enforce_calibration: false,
        }
    }
}

impl ApiConfig {
    /// Read configuration from the environment, falling back to defaults on
    /// missing or unparseable values.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let bind_addr =
            std::env::var("FIELDKIT_BIND_ADDR").unwrap_or_else(|_| defaults.bind_addr.clone());

        let reorder_buffer_quantity = std::env::var("REORDER_BUFFER_QUANTITY")
            .ok()
            .and_then(|v| v.parse::<Decimal>().ok())
            .unwrap_or(defaults.reorder_buffer_quantity);

        let enforce_calibration = std::env::var("ENFORCE_CALIBRATION")
            .ok()
            .and_then(|v| v.parse::<bool>().ok())
            .unwrap_or(defaults.enforce_calibration);

        Self {
            bind_addr,
            reorder_buffer_quantity,
            enforce_calibration,
        }
    }
}
