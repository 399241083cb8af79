use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use fieldkit_core::{Aggregate, AggregateId, AggregateRoot, DomainError, TenantId, UserId};
use fieldkit_events::Event;

use crate::types::{stock_status, BoxId, ItemType, KitId, StockStatus};

/// Kit item identifier (tenant-scoped via `tenant_id` fields in events/commands).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KitItemId(pub AggregateId);

impl KitItemId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for KitItemId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Aggregate root: KitItem.
///
/// A quantity of one part located in a specific (kit, box). Issuance
/// decrements, fulfillment increments; the quantity never goes negative.
/// Removal is soft and only permitted at zero quantity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KitItem {
    id: KitItemId,
    tenant_id: Option<TenantId>,
    kit_id: Option<KitId>,
    box_id: Option<BoxId>,
    part_number: String,
    description: String,
    item_type: ItemType,
    quantity: Decimal,
    minimum_stock_level: Option<Decimal>,
    removed: bool,
    version: u64,
    created: bool,
}

impl KitItem {
    /// Create an empty, not-yet-created aggregate instance for rehydration.
    pub fn empty(id: KitItemId) -> Self {
        Self {
            id,
            tenant_id: None,
            kit_id: None,
            box_id: None,
            part_number: String::new(),
            description: String::new(),
            item_type: ItemType::Expendable,
            quantity: Decimal::ZERO,
            minimum_stock_level: None,
            removed: false,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> KitItemId {
        self.id
    }

    pub fn tenant_id(&self) -> Option<TenantId> {
        self.tenant_id
    }

    pub fn kit_id(&self) -> Option<KitId> {
        self.kit_id
    }

    pub fn box_id(&self) -> Option<BoxId> {
        self.box_id
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

    pub fn quantity(&self) -> Decimal {
        self.quantity
    }

    pub fn minimum_stock_level(&self) -> Option<Decimal> {
        self.minimum_stock_level
    }

    pub fn is_removed(&self) -> bool {
        self.removed
    }

    pub fn exists(&self) -> bool {
        self.created
    }

    /// Derived status; never stored independently of quantity.
    pub fn stock_status(&self) -> StockStatus {
        stock_status(self.quantity, self.minimum_stock_level)
    }
}

impl AggregateRoot for KitItem {
    type Id = KitItemId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: StockItem (create a kit item with an initial quantity).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockItem {
    pub tenant_id: TenantId,
    pub item_id: KitItemId,
    pub kit_id: KitId,
    pub box_id: BoxId,
    pub part_number: String,
    pub description: String,
    pub item_type: ItemType,
    pub quantity: Decimal,
    pub minimum_stock_level: Option<Decimal>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: IssueStock (decrement on issuance to a technician/job).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueStock {
    pub tenant_id: TenantId,
    pub item_id: KitItemId,
    pub quantity: Decimal,
    pub issued_to: Option<UserId>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ReceiveStock (increment on reorder fulfillment or restock).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiveStock {
    pub tenant_id: TenantId,
    pub item_id: KitItemId,
    pub quantity: Decimal,
    pub occurred_at: DateTime<Utc>,
}

/// Command: RemoveItem (soft delete; only at zero quantity, never implicit).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoveItem {
    pub tenant_id: TenantId,
    pub item_id: KitItemId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum KitItemCommand {
    StockItem(StockItem),
    IssueStock(IssueStock),
    ReceiveStock(ReceiveStock),
    RemoveItem(RemoveItem),
}

/// Event: ItemStocked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemStocked {
    pub tenant_id: TenantId,
    pub item_id: KitItemId,
    pub kit_id: KitId,
    pub box_id: BoxId,
    pub part_number: String,
    pub description: String,
    pub item_type: ItemType,
    pub quantity: Decimal,
    pub minimum_stock_level: Option<Decimal>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: StockIssued.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockIssued {
    pub tenant_id: TenantId,
    pub item_id: KitItemId,
    pub quantity: Decimal,
    pub quantity_after: Decimal,
    pub issued_to: Option<UserId>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: LowStockFlagged.
///
/// Emitted alongside `StockIssued` exactly when an issuance crosses the
/// minimum stock level downward (`before > min && after <= min`). This is
/// the single trigger the reorder monitor consumes; issuances that merely
/// hold the quantity below the threshold do not re-flag.
///
/// Carries enough item context for the consumer to open a reorder request
/// without a read-model lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LowStockFlagged {
    pub tenant_id: TenantId,
    pub item_id: KitItemId,
    pub kit_id: KitId,
    pub part_number: String,
    pub description: String,
    pub item_type: ItemType,
    pub quantity_before: Decimal,
    pub quantity_after: Decimal,
    pub minimum_stock_level: Decimal,
    pub occurred_at: DateTime<Utc>,
}

/// Event: StockReceived.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockReceived {
    pub tenant_id: TenantId,
    pub item_id: KitItemId,
    pub quantity: Decimal,
    pub quantity_after: Decimal,
    pub occurred_at: DateTime<Utc>,
}

/// Event: ItemRemoved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemRemoved {
    pub tenant_id: TenantId,
    pub item_id: KitItemId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum KitItemEvent {
    ItemStocked(ItemStocked),
    StockIssued(StockIssued),
    LowStockFlagged(LowStockFlagged),
    StockReceived(StockReceived),
    ItemRemoved(ItemRemoved),
}

impl Event for KitItemEvent {
    fn event_type(&self) -> &'static str {
        match self {
            KitItemEvent::ItemStocked(_) => "inventory.kit_item.stocked",
            KitItemEvent::StockIssued(_) => "inventory.kit_item.stock_issued",
            KitItemEvent::LowStockFlagged(_) => "inventory.kit_item.low_stock_flagged",
            KitItemEvent::StockReceived(_) => "inventory.kit_item.stock_received",
            KitItemEvent::ItemRemoved(_) => "inventory.kit_item.removed",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            KitItemEvent::ItemStocked(e) => e.occurred_at,
            KitItemEvent::StockIssued(e) => e.occurred_at,
            KitItemEvent::LowStockFlagged(e) => e.occurred_at,
            KitItemEvent::StockReceived(e) => e.occurred_at,
            KitItemEvent::ItemRemoved(e) => e.occurred_at,
        }
    }
}

impl Aggregate for KitItem {
    type Command = KitItemCommand;
    type Event = KitItemEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            KitItemEvent::ItemStocked(e) => {
                self.id = e.item_id;
                self.tenant_id = Some(e.tenant_id);
                self.kit_id = Some(e.kit_id);
                self.box_id = Some(e.box_id);
                self.part_number = e.part_number.clone();
                self.description = e.description.clone();
                self.item_type = e.item_type;
                self.quantity = e.quantity;
                self.minimum_stock_level = e.minimum_stock_level;
                self.removed = false;
                self.created = true;
            }
            KitItemEvent::StockIssued(e) => {
                self.quantity = e.quantity_after;
            }
            KitItemEvent::LowStockFlagged(_) => {
                // Marker for the reorder monitor; quantity already moved by
                // the preceding StockIssued.
            }
            KitItemEvent::StockReceived(e) => {
                self.quantity = e.quantity_after;
            }
            KitItemEvent::ItemRemoved(_) => {
                self.removed = true;
            }
        }

        // Deterministic version tracking: +1 per applied event.
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            KitItemCommand::StockItem(cmd) => self.handle_stock(cmd),
            KitItemCommand::IssueStock(cmd) => self.handle_issue(cmd),
            KitItemCommand::ReceiveStock(cmd) => self.handle_receive(cmd),
            KitItemCommand::RemoveItem(cmd) => self.handle_remove(cmd),
        }
    }
}

impl KitItem {
    fn ensure_tenant(&self, tenant_id: TenantId) -> Result<(), DomainError> {
        if !self.created {
            return Ok(());
        }
        if self.tenant_id != Some(tenant_id) {
            return Err(DomainError::invariant("tenant mismatch"));
        }
        Ok(())
    }

    fn ensure_item_id(&self, item_id: KitItemId) -> Result<(), DomainError> {
        if self.id != item_id {
            return Err(DomainError::invariant("item_id mismatch"));
        }
        Ok(())
    }

    fn ensure_active(&self) -> Result<(), DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        if self.removed {
            return Err(DomainError::invalid_transition("item has been removed"));
        }
        Ok(())
    }

    fn handle_stock(&self, cmd: &StockItem) -> Result<Vec<KitItemEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("item already exists"));
        }
        if cmd.part_number.trim().is_empty() {
            return Err(DomainError::validation("part_number cannot be empty"));
        }
        if cmd.quantity < Decimal::ZERO {
            return Err(DomainError::invalid_quantity(
                "initial quantity cannot be negative",
            ));
        }
        if let Some(min) = cmd.minimum_stock_level {
            if min < Decimal::ZERO {
                return Err(DomainError::invalid_quantity(
                    "minimum stock level cannot be negative",
                ));
            }
        }

        Ok(vec![KitItemEvent::ItemStocked(ItemStocked {
            tenant_id: cmd.tenant_id,
            item_id: cmd.item_id,
            kit_id: cmd.kit_id,
            box_id: cmd.box_id,
            part_number: cmd.part_number.clone(),
            description: cmd.description.clone(),
            item_type: cmd.item_type,
            quantity: cmd.quantity,
            minimum_stock_level: cmd.minimum_stock_level,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_issue(&self, cmd: &IssueStock) -> Result<Vec<KitItemEvent>, DomainError> {
        self.ensure_active()?;
        self.ensure_tenant(cmd.tenant_id)?;
        self.ensure_item_id(cmd.item_id)?;

        if cmd.quantity <= Decimal::ZERO {
            return Err(DomainError::invalid_quantity(
                "issued quantity must be positive",
            ));
        }

        let after = self.quantity - cmd.quantity;
        if after < Decimal::ZERO {
            return Err(DomainError::insufficient_stock(format!(
                "cannot issue {} of part {} (on hand: {})",
                cmd.quantity, self.part_number, self.quantity
            )));
        }

        let mut events = vec![KitItemEvent::StockIssued(StockIssued {
            tenant_id: cmd.tenant_id,
            item_id: cmd.item_id,
            quantity: cmd.quantity,
            quantity_after: after,
            issued_to: cmd.issued_to,
            occurred_at: cmd.occurred_at,
        })];

        // Flag low stock only on the downward crossing, not while holding
        // below the threshold; the reorder monitor relies on this to stay
        // idempotent.
        if let (Some(min), Some(kit_id)) = (self.minimum_stock_level, self.kit_id) {
            if self.quantity > min && after <= min {
                events.push(KitItemEvent::LowStockFlagged(LowStockFlagged {
                    tenant_id: cmd.tenant_id,
                    item_id: cmd.item_id,
                    kit_id,
                    part_number: self.part_number.clone(),
                    description: self.description.clone(),
                    item_type: self.item_type,
                    quantity_before: self.quantity,
                    quantity_after: after,
                    minimum_stock_level: min,
                    occurred_at: cmd.occurred_at,
                }));
            }
        }

        Ok(events)
    }

    fn handle_receive(&self, cmd: &ReceiveStock) -> Result<Vec<KitItemEvent>, DomainError> {
        self.ensure_active()?;
        self.ensure_tenant(cmd.tenant_id)?;
        self.ensure_item_id(cmd.item_id)?;

        if cmd.quantity <= Decimal::ZERO {
            return Err(DomainError::invalid_quantity(
                "received quantity must be positive",
            ));
        }

        Ok(vec![KitItemEvent::StockReceived(StockReceived {
            tenant_id: cmd.tenant_id,
            item_id: cmd.item_id,
            quantity: cmd.quantity,
            quantity_after: self.quantity + cmd.quantity,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_remove(&self, cmd: &RemoveItem) -> Result<Vec<KitItemEvent>, DomainError> {
        self.ensure_active()?;
        self.ensure_tenant(cmd.tenant_id)?;
        self.ensure_item_id(cmd.item_id)?;

        if self.quantity != Decimal::ZERO {
            return Err(DomainError::invalid_transition(
                "cannot remove an item with remaining stock",
            ));
        }

        Ok(vec![KitItemEvent::ItemRemoved(ItemRemoved {
            tenant_id: cmd.tenant_id,
            item_id: cmd.item_id,
            occurred_at: cmd.occurred_at,
        })])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fieldkit_core::AggregateId;
    use proptest::prelude::*;
    use rust_decimal_macros::dec;

    fn test_tenant_id() -> TenantId {
        TenantId::new()
    }

    fn test_item_id() -> KitItemId {
        KitItemId::new(AggregateId::new())
    }

    fn test_time() -> DateTime<Utc> {
        Utc::now()
    }

    fn stocked_item(
        tenant_id: TenantId,
        item_id: KitItemId,
        quantity: Decimal,
        minimum: Option<Decimal>,
    ) -> KitItem {
        let mut item = KitItem::empty(item_id);
        let cmd = StockItem {
            tenant_id,
            item_id,
            kit_id: KitId::new(AggregateId::new()),
            box_id: BoxId::new(AggregateId::new()),
            part_number: "PN-100".to_string(),
            description: "hex bolt".to_string(),
            item_type: ItemType::Expendable,
            quantity,
            minimum_stock_level: minimum,
            occurred_at: test_time(),
        };
        let events = item.handle(&KitItemCommand::StockItem(cmd)).unwrap();
        for e in &events {
            item.apply(e);
        }
        item
    }

    fn issue(item: &mut KitItem, tenant_id: TenantId, quantity: Decimal) -> Vec<KitItemEvent> {
        let cmd = IssueStock {
            tenant_id,
            item_id: item.id_typed(),
            quantity,
            issued_to: None,
            occurred_at: test_time(),
        };
        let events = item.handle(&KitItemCommand::IssueStock(cmd)).unwrap();
        for e in &events {
            item.apply(e);
        }
        events
    }

    #[test]
    fn stock_item_emits_item_stocked() {
        let item = KitItem::empty(test_item_id());
        let tenant_id = test_tenant_id();
        let item_id = test_item_id();

        let cmd = StockItem {
            tenant_id,
            item_id,
            kit_id: KitId::new(AggregateId::new()),
            box_id: BoxId::new(AggregateId::new()),
            part_number: "PN-7".to_string(),
            description: "torque wrench".to_string(),
            item_type: ItemType::Tool,
            quantity: dec!(2),
            minimum_stock_level: None,
            occurred_at: test_time(),
        };

        let events = item.handle(&KitItemCommand::StockItem(cmd)).unwrap();
        assert_eq!(events.len(), 1);
        match &events[0] {
            KitItemEvent::ItemStocked(e) => {
                assert_eq!(e.tenant_id, tenant_id);
                assert_eq!(e.item_id, item_id);
                assert_eq!(e.quantity, dec!(2));
            }
            _ => panic!("Expected ItemStocked event"),
        }
    }

    #[test]
    fn issue_decrements_quantity_and_recomputes_status() {
        let tenant_id = test_tenant_id();
        let mut item = stocked_item(tenant_id, test_item_id(), dec!(10), Some(dec!(3)));
        assert_eq!(item.stock_status(), StockStatus::Available);

        issue(&mut item, tenant_id, dec!(4));
        assert_eq!(item.quantity(), dec!(6));
        assert_eq!(item.stock_status(), StockStatus::Available);

        issue(&mut item, tenant_id, dec!(6));
        assert_eq!(item.quantity(), dec!(0));
        assert_eq!(item.stock_status(), StockStatus::OutOfStock);
    }

    #[test]
    fn issue_fails_when_stock_would_go_negative() {
        let tenant_id = test_tenant_id();
        let item = stocked_item(tenant_id, test_item_id(), dec!(2), None);

        let cmd = IssueStock {
            tenant_id,
            item_id: item.id_typed(),
            quantity: dec!(3),
            issued_to: None,
            occurred_at: test_time(),
        };
        let err = item.handle(&KitItemCommand::IssueStock(cmd)).unwrap_err();
        assert!(matches!(err, DomainError::InsufficientStock(_)));
    }

    #[test]
    fn issue_rejects_non_positive_quantity() {
        let tenant_id = test_tenant_id();
        let item = stocked_item(tenant_id, test_item_id(), dec!(2), None);

        let cmd = IssueStock {
            tenant_id,
            item_id: item.id_typed(),
            quantity: dec!(0),
            issued_to: None,
            occurred_at: test_time(),
        };
        let err = item.handle(&KitItemCommand::IssueStock(cmd)).unwrap_err();
        assert!(matches!(err, DomainError::InvalidQuantity(_)));
    }

    #[test]
    fn downward_threshold_crossing_flags_low_stock_exactly_once() {
        let tenant_id = test_tenant_id();
        let mut item = stocked_item(tenant_id, test_item_id(), dec!(5), Some(dec!(5)));

        // 5 -> 4 crosses the threshold (before > min is false here: before == min).
        // Quantity equal to the minimum is already at the threshold, so the
        // first issuance from 5 with min 5 does NOT cross downward.
        let events = issue(&mut item, tenant_id, dec!(1));
        let flagged = events
            .iter()
            .filter(|e| matches!(e, KitItemEvent::LowStockFlagged(_)))
            .count();
        assert_eq!(flagged, 0);

        // Restock above the minimum, then cross it.
        let cmd = ReceiveStock {
            tenant_id,
            item_id: item.id_typed(),
            quantity: dec!(3),
            occurred_at: test_time(),
        };
        let events = item.handle(&KitItemCommand::ReceiveStock(cmd)).unwrap();
        for e in &events {
            item.apply(e);
        }
        assert_eq!(item.quantity(), dec!(7));

        let events = issue(&mut item, tenant_id, dec!(3));
        let flags: Vec<_> = events
            .iter()
            .filter_map(|e| match e {
                KitItemEvent::LowStockFlagged(f) => Some(f),
                _ => None,
            })
            .collect();
        assert_eq!(flags.len(), 1);
        assert_eq!(flags[0].quantity_before, dec!(7));
        assert_eq!(flags[0].quantity_after, dec!(4));
        assert_eq!(flags[0].minimum_stock_level, dec!(5));

        // Further issuances while already below the threshold do not re-flag.
        let events = issue(&mut item, tenant_id, dec!(1));
        assert!(events
            .iter()
            .all(|e| !matches!(e, KitItemEvent::LowStockFlagged(_))));
    }

    #[test]
    fn remove_requires_zero_quantity() {
        let tenant_id = test_tenant_id();
        let mut item = stocked_item(tenant_id, test_item_id(), dec!(1), None);

        let cmd = RemoveItem {
            tenant_id,
            item_id: item.id_typed(),
            occurred_at: test_time(),
        };
        let err = item
            .handle(&KitItemCommand::RemoveItem(cmd.clone()))
            .unwrap_err();
        assert!(matches!(err, DomainError::InvalidTransition(_)));

        issue(&mut item, tenant_id, dec!(1));
        let events = item.handle(&KitItemCommand::RemoveItem(cmd)).unwrap();
        for e in &events {
            item.apply(e);
        }
        assert!(item.is_removed());

        // Removed items reject further mutation.
        let cmd = ReceiveStock {
            tenant_id,
            item_id: item.id_typed(),
            quantity: dec!(1),
            occurred_at: test_time(),
        };
        let err = item.handle(&KitItemCommand::ReceiveStock(cmd)).unwrap_err();
        assert!(matches!(err, DomainError::InvalidTransition(_)));
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 256,
            ..ProptestConfig::default()
        })]

        /// Property: no accepted sequence of issue/receive operations can
        /// drive the quantity negative.
        #[test]
        fn quantity_never_negative_under_random_operations(
            initial in 0i64..100,
            ops in prop::collection::vec((any::<bool>(), 1i64..50), 1..40)
        ) {
            let tenant_id = test_tenant_id();
            let mut item = stocked_item(
                tenant_id,
                test_item_id(),
                Decimal::from(initial),
                Some(dec!(5)),
            );

            for (is_issue, qty) in ops {
                let qty = Decimal::from(qty);
                let cmd = if is_issue {
                    KitItemCommand::IssueStock(IssueStock {
                        tenant_id,
                        item_id: item.id_typed(),
                        quantity: qty,
                        issued_to: None,
                        occurred_at: test_time(),
                    })
                } else {
                    KitItemCommand::ReceiveStock(ReceiveStock {
                        tenant_id,
                        item_id: item.id_typed(),
                        quantity: qty,
                        occurred_at: test_time(),
                    })
                };

                if let Ok(events) = item.handle(&cmd) {
                    for e in &events {
                        item.apply(e);
                    }
                }
                prop_assert!(item.quantity() >= Decimal::ZERO);
            }
        }
    }
}
