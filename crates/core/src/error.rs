//! Domain error model.

use thiserror::Error;

/// Result type used across the domain layer.
pub type DomainResult<T> = Result<T, DomainError>;

/// Domain-level error.
///
/// Deterministic business failures only; infrastructure concerns (storage,
/// transport) belong elsewhere. Each variant maps 1:1 to a machine-readable
/// reason string surfaced to API clients.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// A value failed validation (e.g. malformed input).
    #[error("validation failed: {0}")]
    Validation(String),

    /// A domain invariant was violated.
    #[error("invariant violated: {0}")]
    InvariantViolation(String),

    /// A state change was attempted that the current status does not permit.
    #[error("invalid transition: {0}")]
    InvalidTransition(String),

    /// A requested quantity was zero or negative.
    #[error("invalid quantity: {0}")]
    InvalidQuantity(String),

    /// An issuance would drive a kit item's quantity below zero.
    #[error("insufficient stock: {0}")]
    InsufficientStock(String),

    /// A warehouse transfer would drive warehouse stock below zero.
    #[error("insufficient warehouse stock: {0}")]
    InsufficientWarehouseStock(String),

    /// An active item with the same part identity already exists in the box.
    #[error("duplicate part: {0}")]
    DuplicatePart(String),

    /// A tool cannot be checked out (already out, in maintenance, or
    /// calibration lapsed).
    #[error("tool unavailable: {0}")]
    ToolUnavailable(String),

    /// A checkin/extend referenced a checkout that is already closed.
    #[error("already returned: {0}")]
    AlreadyReturned(String),

    /// Damage was reported without a severity.
    #[error("damage severity required: {0}")]
    DamageSeverityRequired(String),

    /// An identifier was invalid (e.g. parse failure).
    #[error("invalid identifier: {0}")]
    InvalidId(String),

    /// A requested resource was not found (domain-level).
    #[error("not found")]
    NotFound,

    /// A conflict occurred (e.g. stale version / optimistic concurrency).
    #[error("conflict: {0}")]
    Conflict(String),
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn invariant(msg: impl Into<String>) -> Self {
        Self::InvariantViolation(msg.into())
    }

    pub fn invalid_transition(msg: impl Into<String>) -> Self {
        Self::InvalidTransition(msg.into())
    }

    pub fn invalid_quantity(msg: impl Into<String>) -> Self {
        Self::InvalidQuantity(msg.into())
    }

    pub fn insufficient_stock(msg: impl Into<String>) -> Self {
        Self::InsufficientStock(msg.into())
    }

    pub fn insufficient_warehouse_stock(msg: impl Into<String>) -> Self {
        Self::InsufficientWarehouseStock(msg.into())
    }

    pub fn duplicate_part(msg: impl Into<String>) -> Self {
        Self::DuplicatePart(msg.into())
    }

    pub fn tool_unavailable(msg: impl Into<String>) -> Self {
        Self::ToolUnavailable(msg.into())
    }

    pub fn already_returned(msg: impl Into<String>) -> Self {
        Self::AlreadyReturned(msg.into())
    }

    pub fn damage_severity_required(msg: impl Into<String>) -> Self {
        Self::DamageSeverityRequired(msg.into())
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn not_found() -> Self {
        Self::NotFound
    }

    /// Stable machine-readable code for API error payloads.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation_error",
            Self::InvariantViolation(_) => "invariant_violation",
            Self::InvalidTransition(_) => "invalid_transition",
            Self::InvalidQuantity(_) => "invalid_quantity",
            Self::InsufficientStock(_) => "insufficient_stock",
            Self::InsufficientWarehouseStock(_) => "insufficient_warehouse_stock",
            Self::DuplicatePart(_) => "duplicate_part",
            Self::ToolUnavailable(_) => "tool_unavailable",
            Self::AlreadyReturned(_) => "already_returned",
            Self::DamageSeverityRequired(_) => "damage_severity_required",
            Self::InvalidId(_) => "invalid_id",
            Self::NotFound => "not_found",
            Self::Conflict(_) => "conflict",
        }
    }
}
