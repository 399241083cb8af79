use std::collections::HashMap;
use std::sync::RwLock;

use fieldkit_core::{AggregateId, TenantId};

use super::ProjectionError;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
struct CursorKey {
    tenant_id: TenantId,
    aggregate_id: AggregateId,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub(crate) enum CursorCheck {
    /// The envelope is the next one for its stream; apply it.
    Apply,
    /// Replay or duplicate at or below the cursor; skip silently.
    Duplicate,
}

/// Per-(tenant, aggregate) stream cursors.
///
/// Tracks the last applied sequence number so consumers stay idempotent
/// under at-least-once delivery. The first event of a stream may carry any
/// positive sequence; after that, increments must be strictly +1.
#[derive(Debug, Default)]
pub(crate) struct StreamCursors {
    inner: RwLock<HashMap<CursorKey, u64>>,
}

impl StreamCursors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn check(
        &self,
        tenant_id: TenantId,
        aggregate_id: AggregateId,
        sequence_number: u64,
    ) -> Result<CursorCheck, ProjectionError> {
        let key = CursorKey {
            tenant_id,
            aggregate_id,
        };
        let cursors = self
            .inner
            .read()
            .map_err(|_| ProjectionError::TenantIsolation("cursor lock poisoned".to_string()))?;
        let last = *cursors.get(&key).unwrap_or(&0);

        if sequence_number == 0 {
            return Err(ProjectionError::NonMonotonicSequence {
                last,
                found: sequence_number,
            });
        }
        if sequence_number <= last {
            return Ok(CursorCheck::Duplicate);
        }
        if last != 0 && sequence_number != last + 1 {
            return Err(ProjectionError::NonMonotonicSequence {
                last,
                found: sequence_number,
            });
        }
        Ok(CursorCheck::Apply)
    }

    pub fn advance(&self, tenant_id: TenantId, aggregate_id: AggregateId, sequence_number: u64) {
        let key = CursorKey {
            tenant_id,
            aggregate_id,
        };
        if let Ok(mut cursors) = self.inner.write() {
            cursors.insert(key, sequence_number);
        }
    }

    pub fn clear(&self) {
        if let Ok(mut cursors) = self.inner.write() {
            cursors.clear();
        }
    }
}
