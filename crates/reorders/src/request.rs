use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use fieldkit_core::{Aggregate, AggregateId, AggregateRoot, DomainError, TenantId, UserId};
use fieldkit_events::Event;
use fieldkit_inventory::{BoxId, ItemType, KitId, KitItemId};

/// Reorder request identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReorderRequestId(pub AggregateId);

impl ReorderRequestId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for ReorderRequestId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReorderPriority {
    Low,
    Medium,
    High,
    Urgent,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReorderStatus {
    Pending,
    Approved,
    Ordered,
    Fulfilled,
    Cancelled,
}

impl ReorderStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, ReorderStatus::Fulfilled | ReorderStatus::Cancelled)
    }

    /// Open means the request still occupies the per-item automatic-reorder
    /// slot: pending, approved, or ordered.
    pub fn is_open(self) -> bool {
        !self.is_terminal()
    }
}

/// Priority for an automatically opened request, derived from the shortfall
/// at the moment the threshold was crossed.
pub fn derive_priority(quantity_after: Decimal, minimum_stock_level: Decimal) -> ReorderPriority {
    if quantity_after <= Decimal::ZERO {
        ReorderPriority::Urgent
    } else if quantity_after + quantity_after <= minimum_stock_level {
        ReorderPriority::High
    } else {
        ReorderPriority::Medium
    }
}

/// Aggregate root: ReorderRequest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReorderRequest {
    id: ReorderRequestId,
    tenant_id: Option<TenantId>,
    kit_id: Option<KitId>,
    item_id: Option<KitItemId>,
    part_number: String,
    description: String,
    item_type: ItemType,
    quantity_requested: Decimal,
    priority: ReorderPriority,
    status: ReorderStatus,
    is_automatic: bool,
    requested_by: Option<UserId>,
    approved_by: Option<UserId>,
    notes: Option<String>,
    requested_at: Option<DateTime<Utc>>,
    approved_at: Option<DateTime<Utc>>,
    ordered_at: Option<DateTime<Utc>>,
    fulfilled_at: Option<DateTime<Utc>>,
    cancelled_at: Option<DateTime<Utc>>,
    cancel_reason: Option<String>,
    destination_box_id: Option<BoxId>,
    version: u64,
    created: bool,
}

impl ReorderRequest {
    pub fn empty(id: ReorderRequestId) -> Self {
        Self {
            id,
            tenant_id: None,
            kit_id: None,
            item_id: None,
            part_number: String::new(),
            description: String::new(),
            item_type: ItemType::Expendable,
            quantity_requested: Decimal::ZERO,
            priority: ReorderPriority::Medium,
            status: ReorderStatus::Pending,
            is_automatic: false,
            requested_by: None,
            approved_by: None,
            notes: None,
            requested_at: None,
            approved_at: None,
            ordered_at: None,
            fulfilled_at: None,
            cancelled_at: None,
            cancel_reason: None,
            destination_box_id: None,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> ReorderRequestId {
        self.id
    }

    pub fn tenant_id(&self) -> Option<TenantId> {
        self.tenant_id
    }

    pub fn kit_id(&self) -> Option<KitId> {
        self.kit_id
    }

    pub fn item_id(&self) -> Option<KitItemId> {
        self.item_id
    }

    pub fn part_number(&self) -> &str {
        &self.part_number
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn item_type(&self) -> ItemType {
        self.item_type
    }

    pub fn quantity_requested(&self) -> Decimal {
        self.quantity_requested
    }

    pub fn priority(&self) -> ReorderPriority {
        self.priority
    }

    pub fn status(&self) -> ReorderStatus {
        self.status
    }

    pub fn is_automatic(&self) -> bool {
        self.is_automatic
    }

    pub fn requested_by(&self) -> Option<UserId> {
        self.requested_by
    }

    pub fn approved_by(&self) -> Option<UserId> {
        self.approved_by
    }

    pub fn notes(&self) -> Option<&str> {
        self.notes.as_deref()
    }

    pub fn requested_at(&self) -> Option<DateTime<Utc>> {
        self.requested_at
    }

    pub fn approved_at(&self) -> Option<DateTime<Utc>> {
        self.approved_at
    }

    pub fn ordered_at(&self) -> Option<DateTime<Utc>> {
        self.ordered_at
    }

    pub fn fulfilled_at(&self) -> Option<DateTime<Utc>> {
        self.fulfilled_at
    }

    pub fn cancelled_at(&self) -> Option<DateTime<Utc>> {
        self.cancelled_at
    }

    pub fn cancel_reason(&self) -> Option<&str> {
        self.cancel_reason.as_deref()
    }

    pub fn destination_box_id(&self) -> Option<BoxId> {
        self.destination_box_id
    }

    pub fn exists(&self) -> bool {
        self.created
    }
}

impl AggregateRoot for ReorderRequest {
    type Id = ReorderRequestId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: OpenReorder (manual when `requested_by` is set, automatic when
/// the monitor opens it with `is_automatic = true` and no requester).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenReorder {
    pub tenant_id: TenantId,
    pub request_id: ReorderRequestId,
    pub kit_id: KitId,
    pub item_id: Option<KitItemId>,
    pub part_number: String,
    pub description: String,
    pub item_type: ItemType,
    pub quantity_requested: Decimal,
    pub priority: ReorderPriority,
    pub is_automatic: bool,
    pub requested_by: Option<UserId>,
    pub notes: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ApproveReorder (pending -> approved).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApproveReorder {
    pub tenant_id: TenantId,
    pub request_id: ReorderRequestId,
    pub approved_by: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: MarkReorderOrdered (approved -> ordered).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkReorderOrdered {
    pub tenant_id: TenantId,
    pub request_id: ReorderRequestId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: FulfillReorder (ordered -> fulfilled).
///
/// Dispatched by the fulfillment service after the ledger mutation landed;
/// the aggregate only validates the transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FulfillReorder {
    pub tenant_id: TenantId,
    pub request_id: ReorderRequestId,
    pub destination_box_id: BoxId,
    /// Kit item credited or created by the fulfillment.
    pub fulfilled_item_id: KitItemId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: CancelReorder (any non-terminal state -> cancelled).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancelReorder {
    pub tenant_id: TenantId,
    pub request_id: ReorderRequestId,
    pub reason: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReorderCommand {
    Open(OpenReorder),
    Approve(ApproveReorder),
    MarkOrdered(MarkReorderOrdered),
    Fulfill(FulfillReorder),
    Cancel(CancelReorder),
}

/// Event: ReorderOpened.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReorderOpened {
    pub tenant_id: TenantId,
    pub request_id: ReorderRequestId,
    pub kit_id: KitId,
    pub item_id: Option<KitItemId>,
    pub part_number: String,
    pub description: String,
    pub item_type: ItemType,
    pub quantity_requested: Decimal,
    pub priority: ReorderPriority,
    pub is_automatic: bool,
    pub requested_by: Option<UserId>,
    pub notes: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: ReorderApproved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReorderApproved {
    pub tenant_id: TenantId,
    pub request_id: ReorderRequestId,
    pub approved_by: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: ReorderOrdered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReorderOrdered {
    pub tenant_id: TenantId,
    pub request_id: ReorderRequestId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: ReorderFulfilled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReorderFulfilled {
    pub tenant_id: TenantId,
    pub request_id: ReorderRequestId,
    pub item_id: Option<KitItemId>,
    pub fulfilled_item_id: KitItemId,
    pub destination_box_id: BoxId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: ReorderCancelled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReorderCancelled {
    pub tenant_id: TenantId,
    pub request_id: ReorderRequestId,
    pub item_id: Option<KitItemId>,
    pub reason: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReorderEvent {
    Opened(ReorderOpened),
    Approved(ReorderApproved),
    Ordered(ReorderOrdered),
    Fulfilled(ReorderFulfilled),
    Cancelled(ReorderCancelled),
}

impl Event for ReorderEvent {
    fn event_type(&self) -> &'static str {
        match self {
            ReorderEvent::Opened(_) => "reorders.request.opened",
            ReorderEvent::Approved(_) => "reorders.request.approved",
            ReorderEvent::Ordered(_) => "reorders.request.ordered",
            ReorderEvent::Fulfilled(_) => "reorders.request.fulfilled",
            ReorderEvent::Cancelled(_) => "reorders.request.cancelled",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            ReorderEvent::Opened(e) => e.occurred_at,
            ReorderEvent::Approved(e) => e.occurred_at,
            ReorderEvent::Ordered(e) => e.occurred_at,
            ReorderEvent::Fulfilled(e) => e.occurred_at,
            ReorderEvent::Cancelled(e) => e.occurred_at,
        }
    }
}

impl Aggregate for ReorderRequest {
    type Command = ReorderCommand;
    type Event = ReorderEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            ReorderEvent::Opened(e) => {
                self.id = e.request_id;
                self.tenant_id = Some(e.tenant_id);
                self.kit_id = Some(e.kit_id);
                self.item_id = e.item_id;
                self.part_number = e.part_number.clone();
                self.description = e.description.clone();
                self.item_type = e.item_type;
                self.quantity_requested = e.quantity_requested;
                self.priority = e.priority;
                self.status = ReorderStatus::Pending;
                self.is_automatic = e.is_automatic;
                self.requested_by = e.requested_by;
                self.notes = e.notes.clone();
                self.requested_at = Some(e.occurred_at);
                self.created = true;
            }
            ReorderEvent::Approved(e) => {
                self.status = ReorderStatus::Approved;
                self.approved_by = Some(e.approved_by);
                self.approved_at = Some(e.occurred_at);
            }
            ReorderEvent::Ordered(e) => {
                self.status = ReorderStatus::Ordered;
                self.ordered_at = Some(e.occurred_at);
            }
            ReorderEvent::Fulfilled(e) => {
                self.status = ReorderStatus::Fulfilled;
                self.fulfilled_at = Some(e.occurred_at);
                self.destination_box_id = Some(e.destination_box_id);
                self.item_id = Some(e.fulfilled_item_id);
            }
            ReorderEvent::Cancelled(e) => {
                self.status = ReorderStatus::Cancelled;
                self.cancelled_at = Some(e.occurred_at);
                self.cancel_reason = e.reason.clone();
            }
        }
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            ReorderCommand::Open(cmd) => self.handle_open(cmd),
            ReorderCommand::Approve(cmd) => self.handle_approve(cmd),
            ReorderCommand::MarkOrdered(cmd) => self.handle_mark_ordered(cmd),
            ReorderCommand::Fulfill(cmd) => self.handle_fulfill(cmd),
            ReorderCommand::Cancel(cmd) => self.handle_cancel(cmd),
        }
    }
}

impl ReorderRequest {
    fn ensure_loaded(&self, tenant_id: TenantId, request_id: ReorderRequestId) -> Result<(), DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        if self.tenant_id != Some(tenant_id) {
            return Err(DomainError::invariant("tenant mismatch"));
        }
        if self.id != request_id {
            return Err(DomainError::invariant("request_id mismatch"));
        }
        Ok(())
    }

    fn require_status(&self, expected: ReorderStatus, action: &str) -> Result<(), DomainError> {
        if self.status != expected {
            return Err(DomainError::invalid_transition(format!(
                "cannot {action} a {:?} request",
                self.status
            )));
        }
        Ok(())
    }

    fn handle_open(&self, cmd: &OpenReorder) -> Result<Vec<ReorderEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("reorder request already exists"));
        }
        if cmd.part_number.trim().is_empty() {
            return Err(DomainError::validation("part_number cannot be empty"));
        }
        if cmd.quantity_requested <= Decimal::ZERO {
            return Err(DomainError::invalid_quantity(
                "requested quantity must be positive",
            ));
        }

        Ok(vec![ReorderEvent::Opened(ReorderOpened {
            tenant_id: cmd.tenant_id,
            request_id: cmd.request_id,
            kit_id: cmd.kit_id,
            item_id: cmd.item_id,
            part_number: cmd.part_number.clone(),
            description: cmd.description.clone(),
            item_type: cmd.item_type,
            quantity_requested: cmd.quantity_requested,
            priority: cmd.priority,
            is_automatic: cmd.is_automatic,
            requested_by: cmd.requested_by,
            notes: cmd.notes.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_approve(&self, cmd: &ApproveReorder) -> Result<Vec<ReorderEvent>, DomainError> {
        self.ensure_loaded(cmd.tenant_id, cmd.request_id)?;
        self.require_status(ReorderStatus::Pending, "approve")?;

        Ok(vec![ReorderEvent::Approved(ReorderApproved {
            tenant_id: cmd.tenant_id,
            request_id: cmd.request_id,
            approved_by: cmd.approved_by,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_mark_ordered(&self, cmd: &MarkReorderOrdered) -> Result<Vec<ReorderEvent>, DomainError> {
        self.ensure_loaded(cmd.tenant_id, cmd.request_id)?;
        self.require_status(ReorderStatus::Approved, "order")?;

        Ok(vec![ReorderEvent::Ordered(ReorderOrdered {
            tenant_id: cmd.tenant_id,
            request_id: cmd.request_id,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_fulfill(&self, cmd: &FulfillReorder) -> Result<Vec<ReorderEvent>, DomainError> {
        self.ensure_loaded(cmd.tenant_id, cmd.request_id)?;
        self.require_status(ReorderStatus::Ordered, "fulfill")?;

        Ok(vec![ReorderEvent::Fulfilled(ReorderFulfilled {
            tenant_id: cmd.tenant_id,
            request_id: cmd.request_id,
            item_id: self.item_id,
            fulfilled_item_id: cmd.fulfilled_item_id,
            destination_box_id: cmd.destination_box_id,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_cancel(&self, cmd: &CancelReorder) -> Result<Vec<ReorderEvent>, DomainError> {
        self.ensure_loaded(cmd.tenant_id, cmd.request_id)?;
        if self.status.is_terminal() {
            return Err(DomainError::invalid_transition(format!(
                "cannot cancel a {:?} request",
                self.status
            )));
        }

        Ok(vec![ReorderEvent::Cancelled(ReorderCancelled {
            tenant_id: cmd.tenant_id,
            request_id: cmd.request_id,
            item_id: self.item_id,
            reason: cmd.reason.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rust_decimal_macros::dec;

    fn open_cmd(tenant_id: TenantId, request_id: ReorderRequestId) -> OpenReorder {
        OpenReorder {
            tenant_id,
            request_id,
            kit_id: KitId::new(AggregateId::new()),
            item_id: Some(KitItemId::new(AggregateId::new())),
            part_number: "PN-42".to_string(),
            description: "safety wire".to_string(),
            item_type: ItemType::Expendable,
            quantity_requested: dec!(10),
            priority: ReorderPriority::Medium,
            is_automatic: false,
            requested_by: Some(UserId::new()),
            notes: None,
            occurred_at: Utc::now(),
        }
    }

    fn opened(tenant_id: TenantId) -> ReorderRequest {
        let request_id = ReorderRequestId::new(AggregateId::new());
        let mut request = ReorderRequest::empty(request_id);
        let events = request
            .handle(&ReorderCommand::Open(open_cmd(tenant_id, request_id)))
            .unwrap();
        for e in &events {
            request.apply(e);
        }
        request
    }

    fn advance(request: &mut ReorderRequest, tenant_id: TenantId, to: ReorderStatus) {
        let cmds: Vec<ReorderCommand> = match to {
            ReorderStatus::Pending => vec![],
            ReorderStatus::Approved => vec![approve(request, tenant_id)],
            ReorderStatus::Ordered => {
                vec![approve(request, tenant_id), order(request, tenant_id)]
            }
            ReorderStatus::Fulfilled => vec![
                approve(request, tenant_id),
                order(request, tenant_id),
                fulfill(request, tenant_id),
            ],
            ReorderStatus::Cancelled => vec![cancel(request, tenant_id)],
        };
        for cmd in &cmds {
            let events = request.handle(cmd).unwrap();
            for e in &events {
                request.apply(e);
            }
        }
    }

    fn approve(request: &ReorderRequest, tenant_id: TenantId) -> ReorderCommand {
        ReorderCommand::Approve(ApproveReorder {
            tenant_id,
            request_id: request.id_typed(),
            approved_by: UserId::new(),
            occurred_at: Utc::now(),
        })
    }

    fn order(request: &ReorderRequest, tenant_id: TenantId) -> ReorderCommand {
        ReorderCommand::MarkOrdered(MarkReorderOrdered {
            tenant_id,
            request_id: request.id_typed(),
            occurred_at: Utc::now(),
        })
    }

    fn fulfill(request: &ReorderRequest, tenant_id: TenantId) -> ReorderCommand {
        ReorderCommand::Fulfill(FulfillReorder {
            tenant_id,
            request_id: request.id_typed(),
            destination_box_id: BoxId::new(AggregateId::new()),
            fulfilled_item_id: KitItemId::new(AggregateId::new()),
            occurred_at: Utc::now(),
        })
    }

    fn cancel(request: &ReorderRequest, tenant_id: TenantId) -> ReorderCommand {
        ReorderCommand::Cancel(CancelReorder {
            tenant_id,
            request_id: request.id_typed(),
            reason: Some("not needed".to_string()),
            occurred_at: Utc::now(),
        })
    }

    #[test]
    fn open_rejects_non_positive_quantity() {
        let tenant_id = TenantId::new();
        let request_id = ReorderRequestId::new(AggregateId::new());
        let request = ReorderRequest::empty(request_id);
        let mut cmd = open_cmd(tenant_id, request_id);
        cmd.quantity_requested = dec!(0);
        let err = request.handle(&ReorderCommand::Open(cmd)).unwrap_err();
        assert!(matches!(err, DomainError::InvalidQuantity(_)));
    }

    #[test]
    fn happy_path_runs_pending_to_fulfilled() {
        let tenant_id = TenantId::new();
        let mut request = opened(tenant_id);
        assert_eq!(request.status(), ReorderStatus::Pending);
        assert!(request.requested_at().is_some());

        advance(&mut request, tenant_id, ReorderStatus::Fulfilled);
        assert_eq!(request.status(), ReorderStatus::Fulfilled);
        assert!(request.approved_at().is_some());
        assert!(request.ordered_at().is_some());
        assert!(request.fulfilled_at().is_some());
        assert!(request.destination_box_id().is_some());
    }

    #[test]
    fn cancel_is_allowed_from_every_open_state() {
        let tenant_id = TenantId::new();
        for from in [
            ReorderStatus::Pending,
            ReorderStatus::Approved,
            ReorderStatus::Ordered,
        ] {
            let mut request = opened(tenant_id);
            advance(&mut request, tenant_id, from);
            let events = request.handle(&cancel(&request, tenant_id)).unwrap();
            assert!(matches!(events[0], ReorderEvent::Cancelled(_)));
        }
    }

    #[test]
    fn every_illegal_transition_is_rejected() {
        let tenant_id = TenantId::new();
        let states = [
            ReorderStatus::Pending,
            ReorderStatus::Approved,
            ReorderStatus::Ordered,
            ReorderStatus::Fulfilled,
            ReorderStatus::Cancelled,
        ];

        for from in states {
            let mut request = opened(tenant_id);
            advance(&mut request, tenant_id, from);

            let attempts: Vec<(ReorderCommand, bool)> = vec![
                (approve(&request, tenant_id), from == ReorderStatus::Pending),
                (order(&request, tenant_id), from == ReorderStatus::Approved),
                (fulfill(&request, tenant_id), from == ReorderStatus::Ordered),
                (cancel(&request, tenant_id), !from.is_terminal()),
            ];

            for (cmd, legal) in attempts {
                let result = request.handle(&cmd);
                if legal {
                    assert!(result.is_ok(), "expected legal transition from {from:?}");
                } else {
                    assert!(
                        matches!(result, Err(DomainError::InvalidTransition(_))),
                        "expected rejection from {from:?}"
                    );
                }
            }
        }
    }

    #[test]
    fn terminal_states_reject_all_further_transitions() {
        let tenant_id = TenantId::new();
        for terminal in [ReorderStatus::Fulfilled, ReorderStatus::Cancelled] {
            let mut request = opened(tenant_id);
            advance(&mut request, tenant_id, terminal);
            for cmd in [
                approve(&request, tenant_id),
                order(&request, tenant_id),
                fulfill(&request, tenant_id),
                cancel(&request, tenant_id),
            ] {
                assert!(matches!(
                    request.handle(&cmd),
                    Err(DomainError::InvalidTransition(_))
                ));
            }
        }
    }

    #[test]
    fn foreign_tenant_commands_are_rejected() {
        let tenant_id = TenantId::new();
        let request = opened(tenant_id);
        let err = request
            .handle(&approve(&request, TenantId::new()))
            .unwrap_err();
        assert!(matches!(err, DomainError::InvariantViolation(_)));
    }

    #[test]
    fn derived_priority_tracks_shortfall() {
        assert_eq!(derive_priority(dec!(0), dec!(10)), ReorderPriority::Urgent);
        assert_eq!(derive_priority(dec!(-2), dec!(10)), ReorderPriority::Urgent);
        assert_eq!(derive_priority(dec!(5), dec!(10)), ReorderPriority::High);
        assert_eq!(derive_priority(dec!(6), dec!(10)), ReorderPriority::Medium);
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 256,
            ..ProptestConfig::default()
        })]

        /// Property: under any accepted command sequence the status only
        /// ever moves forward along the state graph and never leaves a
        /// terminal state.
        #[test]
        fn status_is_monotone_under_random_operations(
            ops in prop::collection::vec(0u8..4, 1..30)
        ) {
            fn rank(s: ReorderStatus) -> u8 {
                match s {
                    ReorderStatus::Pending => 0,
                    ReorderStatus::Approved => 1,
                    ReorderStatus::Ordered => 2,
                    ReorderStatus::Fulfilled | ReorderStatus::Cancelled => 3,
                }
            }

            let tenant_id = TenantId::new();
            let mut request = opened(tenant_id);

            for op in ops {
                let cmd = match op {
                    0 => approve(&request, tenant_id),
                    1 => order(&request, tenant_id),
                    2 => fulfill(&request, tenant_id),
                    _ => cancel(&request, tenant_id),
                };
                let before = request.status();
                if let Ok(events) = request.handle(&cmd) {
                    for e in &events {
                        request.apply(e);
                    }
                }
                prop_assert!(rank(request.status()) >= rank(before));
                if before.is_terminal() {
                    prop_assert_eq!(request.status(), before);
                }
            }
        }
    }
}
