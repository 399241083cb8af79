use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use fieldkit_core::{Aggregate, AggregateId, AggregateRoot, DomainError, TenantId};
use fieldkit_events::Event;

use crate::types::WarehouseId;

/// Warehouse stock record identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WarehouseStockId(pub AggregateId);

impl WarehouseStockId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for WarehouseStockId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Aggregate root: WarehouseStock.
///
/// Bulk chemical stock held at a warehouse, the source pool for chemical
/// reorder fulfillment. The first receive creates the record; withdrawals
/// may never overdraw it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WarehouseStock {
    id: WarehouseStockId,
    tenant_id: Option<TenantId>,
    warehouse_id: Option<WarehouseId>,
    part_number: String,
    quantity: Decimal,
    version: u64,
    created: bool,
}

impl WarehouseStock {
    pub fn empty(id: WarehouseStockId) -> Self {
        Self {
            id,
            tenant_id: None,
            warehouse_id: None,
            part_number: String::new(),
            quantity: Decimal::ZERO,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> WarehouseStockId {
        self.id
    }

    pub fn tenant_id(&self) -> Option<TenantId> {
        self.tenant_id
    }

    pub fn warehouse_id(&self) -> Option<WarehouseId> {
        self.warehouse_id
    }

    pub fn part_number(&self) -> &str {
        &self.part_number
    }

    pub fn quantity(&self) -> Decimal {
        self.quantity
    }

    pub fn exists(&self) -> bool {
        self.created
    }
}

impl AggregateRoot for WarehouseStock {
    type Id = WarehouseStockId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: ReceiveWarehouseStock (creates the record on first receive).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiveWarehouseStock {
    pub tenant_id: TenantId,
    pub stock_id: WarehouseStockId,
    pub warehouse_id: WarehouseId,
    pub part_number: String,
    pub quantity: Decimal,
    pub occurred_at: DateTime<Utc>,
}

/// Command: WithdrawWarehouseStock (e.g. to fulfill a chemical reorder).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WithdrawWarehouseStock {
    pub tenant_id: TenantId,
    pub stock_id: WarehouseStockId,
    pub quantity: Decimal,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum WarehouseStockCommand {
    Receive(ReceiveWarehouseStock),
    Withdraw(WithdrawWarehouseStock),
}

/// Event: WarehouseStockReceived.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WarehouseStockReceived {
    pub tenant_id: TenantId,
    pub stock_id: WarehouseStockId,
    pub warehouse_id: WarehouseId,
    pub part_number: String,
    pub quantity: Decimal,
    pub quantity_after: Decimal,
    pub occurred_at: DateTime<Utc>,
}

/// Event: WarehouseStockWithdrawn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WarehouseStockWithdrawn {
    pub tenant_id: TenantId,
    pub stock_id: WarehouseStockId,
    pub quantity: Decimal,
    pub quantity_after: Decimal,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum WarehouseStockEvent {
    Received(WarehouseStockReceived),
    Withdrawn(WarehouseStockWithdrawn),
}

impl Event for WarehouseStockEvent {
    fn event_type(&self) -> &'static str {
        match self {
            WarehouseStockEvent::Received(_) => "inventory.warehouse_stock.received",
            WarehouseStockEvent::Withdrawn(_) => "inventory.warehouse_stock.withdrawn",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            WarehouseStockEvent::Received(e) => e.occurred_at,
            WarehouseStockEvent::Withdrawn(e) => e.occurred_at,
        }
    }
}

impl Aggregate for WarehouseStock {
    type Command = WarehouseStockCommand;
    type Event = WarehouseStockEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            WarehouseStockEvent::Received(e) => {
                self.id = e.stock_id;
                self.tenant_id = Some(e.tenant_id);
                self.warehouse_id = Some(e.warehouse_id);
                self.part_number = e.part_number.clone();
                self.quantity = e.quantity_after;
                self.created = true;
            }
            WarehouseStockEvent::Withdrawn(e) => {
                self.quantity = e.quantity_after;
            }
        }
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            WarehouseStockCommand::Receive(cmd) => self.handle_receive(cmd),
            WarehouseStockCommand::Withdraw(cmd) => self.handle_withdraw(cmd),
        }
    }
}

impl WarehouseStock {
    fn ensure_tenant(&self, tenant_id: TenantId) -> Result<(), DomainError> {
        if self.created && self.tenant_id != Some(tenant_id) {
            return Err(DomainError::invariant("tenant mismatch"));
        }
        Ok(())
    }

    fn handle_receive(&self, cmd: &ReceiveWarehouseStock) -> Result<Vec<WarehouseStockEvent>, DomainError> {
        self.ensure_tenant(cmd.tenant_id)?;
        if self.id != cmd.stock_id {
            return Err(DomainError::invariant("stock_id mismatch"));
        }
        if cmd.part_number.trim().is_empty() {
            return Err(DomainError::validation("part_number cannot be empty"));
        }
        if cmd.quantity <= Decimal::ZERO {
            return Err(DomainError::invalid_quantity(
                "received quantity must be positive",
            ));
        }
        if self.created && self.part_number != cmd.part_number {
            return Err(DomainError::invariant(
                "part_number does not match existing warehouse record",
            ));
        }

        Ok(vec![WarehouseStockEvent::Received(WarehouseStockReceived {
            tenant_id: cmd.tenant_id,
            stock_id: cmd.stock_id,
            warehouse_id: cmd.warehouse_id,
            part_number: cmd.part_number.clone(),
            quantity: cmd.quantity,
            quantity_after: self.quantity + cmd.quantity,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_withdraw(&self, cmd: &WithdrawWarehouseStock) -> Result<Vec<WarehouseStockEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        self.ensure_tenant(cmd.tenant_id)?;
        if self.id != cmd.stock_id {
            return Err(DomainError::invariant("stock_id mismatch"));
        }
        if cmd.quantity <= Decimal::ZERO {
            return Err(DomainError::invalid_quantity(
                "withdrawn quantity must be positive",
            ));
        }

        let after = self.quantity - cmd.quantity;
        if after < Decimal::ZERO {
            return Err(DomainError::insufficient_warehouse_stock(format!(
                "cannot withdraw {} of part {} (warehouse holds {})",
                cmd.quantity, self.part_number, self.quantity
            )));
        }

        Ok(vec![WarehouseStockEvent::Withdrawn(WarehouseStockWithdrawn {
            tenant_id: cmd.tenant_id,
            stock_id: cmd.stock_id,
            quantity: cmd.quantity,
            quantity_after: after,
            occurred_at: cmd.occurred_at,
        })])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn received_stock(tenant_id: TenantId, quantity: Decimal) -> WarehouseStock {
        let id = WarehouseStockId::new(AggregateId::new());
        let mut stock = WarehouseStock::empty(id);
        let cmd = ReceiveWarehouseStock {
            tenant_id,
            stock_id: id,
            warehouse_id: WarehouseId::new(AggregateId::new()),
            part_number: "CHEM-9".to_string(),
            quantity,
            occurred_at: Utc::now(),
        };
        let events = stock.handle(&WarehouseStockCommand::Receive(cmd)).unwrap();
        for e in &events {
            stock.apply(e);
        }
        stock
    }

    #[test]
    fn first_receive_creates_the_record() {
        let stock = received_stock(TenantId::new(), dec!(40));
        assert!(stock.exists());
        assert_eq!(stock.quantity(), dec!(40));
        assert_eq!(stock.part_number(), "CHEM-9");
    }

    #[test]
    fn receive_accumulates_quantity() {
        let tenant_id = TenantId::new();
        let mut stock = received_stock(tenant_id, dec!(40));
        let cmd = ReceiveWarehouseStock {
            tenant_id,
            stock_id: stock.id_typed(),
            warehouse_id: stock.warehouse_id().unwrap(),
            part_number: "CHEM-9".to_string(),
            quantity: dec!(10),
            occurred_at: Utc::now(),
        };
        let events = stock.handle(&WarehouseStockCommand::Receive(cmd)).unwrap();
        for e in &events {
            stock.apply(e);
        }
        assert_eq!(stock.quantity(), dec!(50));
    }

    #[test]
    fn withdraw_never_overdraws() {
        let tenant_id = TenantId::new();
        let mut stock = received_stock(tenant_id, dec!(5));

        let cmd = WithdrawWarehouseStock {
            tenant_id,
            stock_id: stock.id_typed(),
            quantity: dec!(6),
            occurred_at: Utc::now(),
        };
        let err = stock
            .handle(&WarehouseStockCommand::Withdraw(cmd))
            .unwrap_err();
        assert!(matches!(err, DomainError::InsufficientWarehouseStock(_)));

        let cmd = WithdrawWarehouseStock {
            tenant_id,
            stock_id: stock.id_typed(),
            quantity: dec!(5),
            occurred_at: Utc::now(),
        };
        let events = stock.handle(&WarehouseStockCommand::Withdraw(cmd)).unwrap();
        for e in &events {
            stock.apply(e);
        }
        assert_eq!(stock.quantity(), Decimal::ZERO);
    }

    #[test]
    fn withdraw_from_missing_record_is_not_found() {
        let stock = WarehouseStock::empty(WarehouseStockId::new(AggregateId::new()));
        let cmd = WithdrawWarehouseStock {
            tenant_id: TenantId::new(),
            stock_id: stock.id_typed(),
            quantity: dec!(1),
            occurred_at: Utc::now(),
        };
        let err = stock
            .handle(&WarehouseStockCommand::Withdraw(cmd))
            .unwrap_err();
        assert_eq!(err, DomainError::NotFound);
    }
}
