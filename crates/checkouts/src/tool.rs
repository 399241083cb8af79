use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use fieldkit_core::{Aggregate, AggregateId, AggregateRoot, DomainError, TenantId, UserId};
use fieldkit_events::Event;

/// Tool identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ToolId(pub AggregateId);

impl ToolId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for ToolId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Checkout record identifier (unique within the tenant, issued at checkout).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CheckoutId(pub AggregateId);

impl CheckoutId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for CheckoutId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolStatus {
    Available,
    CheckedOut,
    Maintenance,
    Retired,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DamageSeverity {
    Minor,
    Moderate,
    Severe,
    Unusable,
}

impl DamageSeverity {
    /// Severe and unusable damage force the tool into maintenance.
    pub fn forces_maintenance(self) -> bool {
        matches!(self, DamageSeverity::Severe | DamageSeverity::Unusable)
    }
}

/// One custody period. Append-only; closed by setting `return_date`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutRecord {
    pub checkout_id: CheckoutId,
    pub user_id: UserId,
    pub checkout_date: DateTime<Utc>,
    pub expected_return_date: Option<DateTime<Utc>>,
    pub return_date: Option<DateTime<Utc>>,
    pub condition_at_checkout: String,
    pub condition_at_return: Option<String>,
    pub damage_reported: bool,
    pub damage_severity: Option<DamageSeverity>,
    pub work_order: Option<String>,
    pub return_notes: Option<String>,
}

impl CheckoutRecord {
    pub fn is_open(&self) -> bool {
        self.return_date.is_none()
    }
}

/// Aggregate root: Tool.
///
/// Owns the custody state machine and the full checkout history, making
/// "at most one open checkout" a local invariant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tool {
    id: ToolId,
    tenant_id: Option<TenantId>,
    name: String,
    serial_number: String,
    status: ToolStatus,
    calibration_due: Option<DateTime<Utc>>,
    checkouts: Vec<CheckoutRecord>,
    version: u64,
    created: bool,
}

impl Tool {
    pub fn empty(id: ToolId) -> Self {
        Self {
            id,
            tenant_id: None,
            name: String::new(),
            serial_number: String::new(),
            status: ToolStatus::Available,
            calibration_due: None,
            checkouts: Vec::new(),
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> ToolId {
        self.id
    }

    pub fn tenant_id(&self) -> Option<TenantId> {
        self.tenant_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn serial_number(&self) -> &str {
        &self.serial_number
    }

    pub fn status(&self) -> ToolStatus {
        self.status
    }

    pub fn calibration_due(&self) -> Option<DateTime<Utc>> {
        self.calibration_due
    }

    pub fn checkouts(&self) -> &[CheckoutRecord] {
        &self.checkouts
    }

    pub fn open_checkout(&self) -> Option<&CheckoutRecord> {
        self.checkouts.iter().find(|c| c.is_open())
    }

    pub fn checkout(&self, checkout_id: CheckoutId) -> Option<&CheckoutRecord> {
        self.checkouts.iter().find(|c| c.checkout_id == checkout_id)
    }

    pub fn exists(&self) -> bool {
        self.created
    }

    pub fn calibration_lapsed(&self, now: DateTime<Utc>) -> bool {
        matches!(self.calibration_due, Some(due) if now > due)
    }
}

impl AggregateRoot for Tool {
    type Id = ToolId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: RegisterTool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterTool {
    pub tenant_id: TenantId,
    pub tool_id: ToolId,
    pub name: String,
    pub serial_number: String,
    pub calibration_due: Option<DateTime<Utc>>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: CheckOutTool.
///
/// `enforce_calibration` mirrors the service configuration flag; the
/// aggregate stays pure by receiving the decision input instead of reading
/// configuration itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckOutTool {
    pub tenant_id: TenantId,
    pub tool_id: ToolId,
    pub checkout_id: CheckoutId,
    pub user_id: UserId,
    pub expected_return_date: Option<DateTime<Utc>>,
    pub condition_at_checkout: String,
    pub work_order: Option<String>,
    pub enforce_calibration: bool,
    pub occurred_at: DateTime<Utc>,
}

/// Command: CheckInTool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckInTool {
    pub tenant_id: TenantId,
    pub tool_id: ToolId,
    pub checkout_id: CheckoutId,
    pub condition_at_return: Option<String>,
    pub damage_reported: bool,
    pub damage_severity: Option<DamageSeverity>,
    pub return_notes: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ExtendCheckout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtendCheckout {
    pub tenant_id: TenantId,
    pub tool_id: ToolId,
    pub checkout_id: CheckoutId,
    pub new_expected_return_date: DateTime<Utc>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ReturnToService (maintenance -> available).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReturnToService {
    pub tenant_id: TenantId,
    pub tool_id: ToolId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ToolCommand {
    Register(RegisterTool),
    CheckOut(CheckOutTool),
    CheckIn(CheckInTool),
    Extend(ExtendCheckout),
    ReturnToService(ReturnToService),
}

/// Event: ToolRegistered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolRegistered {
    pub tenant_id: TenantId,
    pub tool_id: ToolId,
    pub name: String,
    pub serial_number: String,
    pub calibration_due: Option<DateTime<Utc>>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: ToolCheckedOut.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCheckedOut {
    pub tenant_id: TenantId,
    pub tool_id: ToolId,
    pub checkout_id: CheckoutId,
    pub user_id: UserId,
    pub expected_return_date: Option<DateTime<Utc>>,
    pub condition_at_checkout: String,
    pub work_order: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: ToolCheckedIn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCheckedIn {
    pub tenant_id: TenantId,
    pub tool_id: ToolId,
    pub checkout_id: CheckoutId,
    pub condition_at_return: Option<String>,
    pub damage_reported: bool,
    pub damage_severity: Option<DamageSeverity>,
    pub return_notes: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: CheckoutExtended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutExtended {
    pub tenant_id: TenantId,
    pub tool_id: ToolId,
    pub checkout_id: CheckoutId,
    pub new_expected_return_date: DateTime<Utc>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: ToolSentToMaintenance.
///
/// Emitted after `ToolCheckedIn` when severe or unusable damage was
/// reported; a later checkin cannot reverse it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolSentToMaintenance {
    pub tenant_id: TenantId,
    pub tool_id: ToolId,
    pub checkout_id: CheckoutId,
    pub damage_severity: DamageSeverity,
    pub occurred_at: DateTime<Utc>,
}

/// Event: ToolReturnedToService.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolReturnedToService {
    pub tenant_id: TenantId,
    pub tool_id: ToolId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ToolEvent {
    Registered(ToolRegistered),
    CheckedOut(ToolCheckedOut),
    CheckedIn(ToolCheckedIn),
    Extended(CheckoutExtended),
    SentToMaintenance(ToolSentToMaintenance),
    ReturnedToService(ToolReturnedToService),
}

impl Event for ToolEvent {
    fn event_type(&self) -> &'static str {
        match self {
            ToolEvent::Registered(_) => "checkouts.tool.registered",
            ToolEvent::CheckedOut(_) => "checkouts.tool.checked_out",
            ToolEvent::CheckedIn(_) => "checkouts.tool.checked_in",
            ToolEvent::Extended(_) => "checkouts.tool.checkout_extended",
            ToolEvent::SentToMaintenance(_) => "checkouts.tool.sent_to_maintenance",
            ToolEvent::ReturnedToService(_) => "checkouts.tool.returned_to_service",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            ToolEvent::Registered(e) => e.occurred_at,
            ToolEvent::CheckedOut(e) => e.occurred_at,
            ToolEvent::CheckedIn(e) => e.occurred_at,
            ToolEvent::Extended(e) => e.occurred_at,
            ToolEvent::SentToMaintenance(e) => e.occurred_at,
            ToolEvent::ReturnedToService(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Tool {
    type Command = ToolCommand;
    type Event = ToolEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            ToolEvent::Registered(e) => {
                self.id = e.tool_id;
                self.tenant_id = Some(e.tenant_id);
                self.name = e.name.clone();
                self.serial_number = e.serial_number.clone();
                self.status = ToolStatus::Available;
                self.calibration_due = e.calibration_due;
                self.created = true;
            }
            ToolEvent::CheckedOut(e) => {
                self.checkouts.push(CheckoutRecord {
                    checkout_id: e.checkout_id,
                    user_id: e.user_id,
                    checkout_date: e.occurred_at,
                    expected_return_date: e.expected_return_date,
                    return_date: None,
                    condition_at_checkout: e.condition_at_checkout.clone(),
                    condition_at_return: None,
                    damage_reported: false,
                    damage_severity: None,
                    work_order: e.work_order.clone(),
                    return_notes: None,
                });
                self.status = ToolStatus::CheckedOut;
            }
            ToolEvent::CheckedIn(e) => {
                if let Some(record) = self
                    .checkouts
                    .iter_mut()
                    .find(|c| c.checkout_id == e.checkout_id)
                {
                    record.return_date = Some(e.occurred_at);
                    record.condition_at_return = e.condition_at_return.clone();
                    record.damage_reported = e.damage_reported;
                    record.damage_severity = e.damage_severity;
                    record.return_notes = e.return_notes.clone();
                }
                // Maintenance, if forced, arrives as a follow-up event.
                if self.status == ToolStatus::CheckedOut {
                    self.status = ToolStatus::Available;
                }
            }
            ToolEvent::Extended(e) => {
                if let Some(record) = self
                    .checkouts
                    .iter_mut()
                    .find(|c| c.checkout_id == e.checkout_id)
                {
                    record.expected_return_date = Some(e.new_expected_return_date);
                }
            }
            ToolEvent::SentToMaintenance(_) => {
                self.status = ToolStatus::Maintenance;
            }
            ToolEvent::ReturnedToService(_) => {
                self.status = ToolStatus::Available;
            }
        }
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            ToolCommand::Register(cmd) => self.handle_register(cmd),
            ToolCommand::CheckOut(cmd) => self.handle_check_out(cmd),
            ToolCommand::CheckIn(cmd) => self.handle_check_in(cmd),
            ToolCommand::Extend(cmd) => self.handle_extend(cmd),
            ToolCommand::ReturnToService(cmd) => self.handle_return_to_service(cmd),
        }
    }
}

impl Tool {
    fn ensure_loaded(&self, tenant_id: TenantId, tool_id: ToolId) -> Result<(), DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        if self.tenant_id != Some(tenant_id) {
            return Err(DomainError::invariant("tenant mismatch"));
        }
        if self.id != tool_id {
            return Err(DomainError::invariant("tool_id mismatch"));
        }
        Ok(())
    }

    fn handle_register(&self, cmd: &RegisterTool) -> Result<Vec<ToolEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("tool already exists"));
        }
        if cmd.name.trim().is_empty() {
            return Err(DomainError::validation("tool name cannot be empty"));
        }
        if cmd.serial_number.trim().is_empty() {
            return Err(DomainError::validation("serial_number cannot be empty"));
        }

        Ok(vec![ToolEvent::Registered(ToolRegistered {
            tenant_id: cmd.tenant_id,
            tool_id: cmd.tool_id,
            name: cmd.name.clone(),
            serial_number: cmd.serial_number.clone(),
            calibration_due: cmd.calibration_due,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_check_out(&self, cmd: &CheckOutTool) -> Result<Vec<ToolEvent>, DomainError> {
        self.ensure_loaded(cmd.tenant_id, cmd.tool_id)?;

        if let Some(open) = self.open_checkout() {
            return Err(DomainError::tool_unavailable(format!(
                "tool {} already checked out (checkout {})",
                self.name, open.checkout_id
            )));
        }
        if self.status != ToolStatus::Available {
            return Err(DomainError::tool_unavailable(format!(
                "tool {} is {:?}",
                self.name, self.status
            )));
        }
        if cmd.enforce_calibration && self.calibration_lapsed(cmd.occurred_at) {
            return Err(DomainError::tool_unavailable(format!(
                "tool {} calibration lapsed",
                self.name
            )));
        }

        Ok(vec![ToolEvent::CheckedOut(ToolCheckedOut {
            tenant_id: cmd.tenant_id,
            tool_id: cmd.tool_id,
            checkout_id: cmd.checkout_id,
            user_id: cmd.user_id,
            expected_return_date: cmd.expected_return_date,
            condition_at_checkout: cmd.condition_at_checkout.clone(),
            work_order: cmd.work_order.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn open_record(&self, checkout_id: CheckoutId) -> Result<&CheckoutRecord, DomainError> {
        match self.checkout(checkout_id) {
            Some(record) if record.is_open() => Ok(record),
            Some(_) => Err(DomainError::already_returned(format!(
                "checkout {checkout_id} is closed"
            ))),
            None => Err(DomainError::already_returned(format!(
                "checkout {checkout_id} is unknown for this tool"
            ))),
        }
    }

    fn handle_check_in(&self, cmd: &CheckInTool) -> Result<Vec<ToolEvent>, DomainError> {
        self.ensure_loaded(cmd.tenant_id, cmd.tool_id)?;
        self.open_record(cmd.checkout_id)?;

        if cmd.damage_reported && cmd.damage_severity.is_none() {
            return Err(DomainError::damage_severity_required(
                "damage reported without a severity",
            ));
        }
        if !cmd.damage_reported && cmd.damage_severity.is_some() {
            return Err(DomainError::validation(
                "damage_severity given without damage_reported",
            ));
        }

        let mut events = vec![ToolEvent::CheckedIn(ToolCheckedIn {
            tenant_id: cmd.tenant_id,
            tool_id: cmd.tool_id,
            checkout_id: cmd.checkout_id,
            condition_at_return: cmd.condition_at_return.clone(),
            damage_reported: cmd.damage_reported,
            damage_severity: cmd.damage_severity,
            return_notes: cmd.return_notes.clone(),
            occurred_at: cmd.occurred_at,
        })];

        if let Some(severity) = cmd.damage_severity {
            if severity.forces_maintenance() {
                events.push(ToolEvent::SentToMaintenance(ToolSentToMaintenance {
                    tenant_id: cmd.tenant_id,
                    tool_id: cmd.tool_id,
                    checkout_id: cmd.checkout_id,
                    damage_severity: severity,
                    occurred_at: cmd.occurred_at,
                }));
            }
        }

        Ok(events)
    }

    fn handle_extend(&self, cmd: &ExtendCheckout) -> Result<Vec<ToolEvent>, DomainError> {
        self.ensure_loaded(cmd.tenant_id, cmd.tool_id)?;
        self.open_record(cmd.checkout_id)?;

        Ok(vec![ToolEvent::Extended(CheckoutExtended {
            tenant_id: cmd.tenant_id,
            tool_id: cmd.tool_id,
            checkout_id: cmd.checkout_id,
            new_expected_return_date: cmd.new_expected_return_date,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_return_to_service(&self, cmd: &ReturnToService) -> Result<Vec<ToolEvent>, DomainError> {
        self.ensure_loaded(cmd.tenant_id, cmd.tool_id)?;
        if self.status != ToolStatus::Maintenance {
            return Err(DomainError::invalid_transition(format!(
                "cannot return a {:?} tool to service",
                self.status
            )));
        }

        Ok(vec![ToolEvent::ReturnedToService(ToolReturnedToService {
            tenant_id: cmd.tenant_id,
            tool_id: cmd.tool_id,
            occurred_at: cmd.occurred_at,
        })])
    }
}
