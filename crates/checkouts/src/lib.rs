//! Tool custody domain module (event-sourced).
//!
//! The `Tool` aggregate owns its append-only checkout history, so "at most
//! one open checkout per tool" is a single-aggregate decision. Overdue is
//! computed against a caller-supplied clock at read time and never stored.

pub mod overdue;
pub mod tool;

pub use overdue::{days_overdue, is_overdue};
pub use tool::{
    CheckInTool, CheckOutTool, CheckoutExtended, CheckoutId, CheckoutRecord, DamageSeverity,
    ExtendCheckout, RegisterTool, ReturnToService, Tool, ToolCheckedIn, ToolCheckedOut,
    ToolCommand, ToolEvent, ToolId, ToolRegistered, ToolReturnedToService,
    ToolSentToMaintenance, ToolStatus,
};
