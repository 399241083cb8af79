//! Reorder request domain module (event-sourced).
//!
//! A reorder request moves through a fixed state graph
//! (pending -> approved -> ordered -> fulfilled, cancellable from any
//! non-terminal state). Requests are opened manually by a user or
//! automatically when a kit item crosses its minimum stock level.

pub mod request;

pub use request::{
    derive_priority, ApproveReorder, CancelReorder, FulfillReorder, MarkReorderOrdered,
    OpenReorder, ReorderApproved, ReorderCancelled, ReorderCommand, ReorderEvent,
    ReorderFulfilled, ReorderOpened, ReorderOrdered, ReorderPriority, ReorderRequest,
    ReorderRequestId, ReorderStatus,
};
