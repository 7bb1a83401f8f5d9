use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use procureflow_core::{
    Actor, Aggregate, AggregateRoot, DomainError, StatusChange, document_id, require_text,
};
use procureflow_events::{AuditRecord, Audited, Event};

document_id!(
    /// Supplier identifier.
    SupplierId
);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SupplierStatus {
    Active,
    Inactive,
}

impl SupplierStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SupplierStatus::Active => "active",
            SupplierStatus::Inactive => "inactive",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactInfo {
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
}

/// Aggregate root: Supplier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Supplier {
    id: SupplierId,
    code: String,
    name: String,
    contact: ContactInfo,
    categories: Vec<String>,
    status: SupplierStatus,
    history: Vec<StatusChange<SupplierStatus>>,
    version: u64,
    #[serde(skip)]
    created: bool,
}

impl Supplier {
    /// Create an empty, not-yet-registered aggregate instance for rehydration.
    pub fn empty(id: SupplierId) -> Self {
        Self {
            id,
            code: String::new(),
            name: String::new(),
            contact: ContactInfo::default(),
            categories: Vec::new(),
            status: SupplierStatus::Active,
            history: Vec::new(),
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> SupplierId {
        self.id
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn contact(&self) -> &ContactInfo {
        &self.contact
    }

    pub fn categories(&self) -> &[String] {
        &self.categories
    }

    pub fn status(&self) -> SupplierStatus {
        self.status
    }

    pub fn history(&self) -> &[StatusChange<SupplierStatus>] {
        &self.history
    }

    /// Only active suppliers can be invited, quote or receive orders.
    pub fn can_transact(&self) -> bool {
        self.created && self.status == SupplierStatus::Active
    }
}

impl AggregateRoot for Supplier {
    type Id = SupplierId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Normalize a supplier code for storage and uniqueness checks.
pub fn normalize_code(code: &str) -> String {
    code.trim().to_ascii_uppercase()
}

/// Command: RegisterSupplier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterSupplier {
    pub supplier_id: SupplierId,
    pub code: String,
    pub name: String,
    pub contact: Option<ContactInfo>,
    pub categories: Vec<String>,
    pub actor: Actor,
    pub occurred_at: DateTime<Utc>,
}

/// Command: UpdateDetails (fields left `None` keep their value).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateDetails {
    pub supplier_id: SupplierId,
    pub name: Option<String>,
    pub contact: Option<ContactInfo>,
    pub categories: Option<Vec<String>>,
    pub actor: Actor,
    pub occurred_at: DateTime<Utc>,
}

/// Command: Deactivate (soft delete).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deactivate {
    pub supplier_id: SupplierId,
    pub reason: Option<String>,
    pub actor: Actor,
    pub occurred_at: DateTime<Utc>,
}

/// Command: Reactivate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reactivate {
    pub supplier_id: SupplierId,
    pub actor: Actor,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SupplierCommand {
    RegisterSupplier(RegisterSupplier),
    UpdateDetails(UpdateDetails),
    Deactivate(Deactivate),
    Reactivate(Reactivate),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupplierRegistered {
    pub supplier_id: SupplierId,
    pub code: String,
    pub name: String,
    pub contact: ContactInfo,
    pub categories: Vec<String>,
    pub actor: Actor,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupplierUpdated {
    pub supplier_id: SupplierId,
    pub name: String,
    pub contact: ContactInfo,
    pub categories: Vec<String>,
    pub actor: Actor,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupplierDeactivated {
    pub supplier_id: SupplierId,
    pub reason: Option<String>,
    pub actor: Actor,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupplierReactivated {
    pub supplier_id: SupplierId,
    pub actor: Actor,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SupplierEvent {
    SupplierRegistered(SupplierRegistered),
    SupplierUpdated(SupplierUpdated),
    SupplierDeactivated(SupplierDeactivated),
    SupplierReactivated(SupplierReactivated),
}

impl Event for SupplierEvent {
    fn event_type(&self) -> &'static str {
        match self {
            SupplierEvent::SupplierRegistered(_) => "suppliers.supplier.registered",
            SupplierEvent::SupplierUpdated(_) => "suppliers.supplier.updated",
            SupplierEvent::SupplierDeactivated(_) => "suppliers.supplier.deactivated",
            SupplierEvent::SupplierReactivated(_) => "suppliers.supplier.reactivated",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            SupplierEvent::SupplierRegistered(e) => e.occurred_at,
            SupplierEvent::SupplierUpdated(e) => e.occurred_at,
            SupplierEvent::SupplierDeactivated(e) => e.occurred_at,
            SupplierEvent::SupplierReactivated(e) => e.occurred_at,
        }
    }
}

impl Audited for SupplierEvent {
    fn audit_record(&self) -> Option<AuditRecord> {
        let (status, actor, note) = match self {
            SupplierEvent::SupplierRegistered(e) => (SupplierStatus::Active, &e.actor, None),
            SupplierEvent::SupplierUpdated(_) => return None,
            SupplierEvent::SupplierDeactivated(e) => {
                (SupplierStatus::Inactive, &e.actor, e.reason.clone())
            }
            SupplierEvent::SupplierReactivated(e) => (SupplierStatus::Active, &e.actor, None),
        };
        Some(AuditRecord {
            status: status.as_str(),
            actor: actor.clone(),
            note,
        })
    }
}

impl Aggregate for Supplier {
    type Command = SupplierCommand;
    type Event = SupplierEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            SupplierEvent::SupplierRegistered(e) => {
                self.id = e.supplier_id;
                self.code = e.code.clone();
                self.name = e.name.clone();
                self.contact = e.contact.clone();
                self.categories = e.categories.clone();
                self.status = SupplierStatus::Active;
                self.history
                    .push(StatusChange::initial(SupplierStatus::Active, e.occurred_at, &e.actor));
                self.created = true;
            }
            SupplierEvent::SupplierUpdated(e) => {
                self.name = e.name.clone();
                self.contact = e.contact.clone();
                self.categories = e.categories.clone();
            }
            SupplierEvent::SupplierDeactivated(e) => {
                self.history.push(StatusChange::transition(
                    self.status,
                    SupplierStatus::Inactive,
                    e.occurred_at,
                    &e.actor,
                    e.reason.clone(),
                ));
                self.status = SupplierStatus::Inactive;
            }
            SupplierEvent::SupplierReactivated(e) => {
                self.history.push(StatusChange::transition(
                    self.status,
                    SupplierStatus::Active,
                    e.occurred_at,
                    &e.actor,
                    None,
                ));
                self.status = SupplierStatus::Active;
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            SupplierCommand::RegisterSupplier(cmd) => self.handle_register(cmd),
            SupplierCommand::UpdateDetails(cmd) => self.handle_update(cmd),
            SupplierCommand::Deactivate(cmd) => self.handle_deactivate(cmd),
            SupplierCommand::Reactivate(cmd) => self.handle_reactivate(cmd),
        }
    }
}

fn clean_categories(categories: &[String]) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for c in categories.iter().map(|c| c.trim()).filter(|c| !c.is_empty()) {
        if !out.iter().any(|existing| existing.eq_ignore_ascii_case(c)) {
            out.push(c.to_string());
        }
    }
    out
}

impl Supplier {
    fn ensure_exists(&self, supplier_id: SupplierId) -> Result<(), DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        if self.id != supplier_id {
            return Err(DomainError::invariant("supplier_id mismatch"));
        }
        Ok(())
    }

    fn handle_register(&self, cmd: &RegisterSupplier) -> Result<Vec<SupplierEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("supplier already exists"));
        }
        require_text("code", &cmd.code)?;
        require_text("name", &cmd.name)?;

        Ok(vec![SupplierEvent::SupplierRegistered(SupplierRegistered {
            supplier_id: cmd.supplier_id,
            code: normalize_code(&cmd.code),
            name: cmd.name.trim().to_string(),
            contact: cmd.contact.clone().unwrap_or_default(),
            categories: clean_categories(&cmd.categories),
            actor: cmd.actor.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_update(&self, cmd: &UpdateDetails) -> Result<Vec<SupplierEvent>, DomainError> {
        self.ensure_exists(cmd.supplier_id)?;
        if self.status == SupplierStatus::Inactive {
            return Err(DomainError::invariant("inactive suppliers cannot be updated"));
        }

        let name = cmd.name.clone().unwrap_or_else(|| self.name.clone());
        require_text("name", &name)?;

        Ok(vec![SupplierEvent::SupplierUpdated(SupplierUpdated {
            supplier_id: cmd.supplier_id,
            name: name.trim().to_string(),
            contact: cmd.contact.clone().unwrap_or_else(|| self.contact.clone()),
            categories: cmd
                .categories
                .as_deref()
                .map(clean_categories)
                .unwrap_or_else(|| self.categories.clone()),
            actor: cmd.actor.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_deactivate(&self, cmd: &Deactivate) -> Result<Vec<SupplierEvent>, DomainError> {
        self.ensure_exists(cmd.supplier_id)?;
        if self.status == SupplierStatus::Inactive {
            return Err(DomainError::invariant("supplier is already inactive"));
        }

        Ok(vec![SupplierEvent::SupplierDeactivated(SupplierDeactivated {
            supplier_id: cmd.supplier_id,
            reason: cmd.reason.clone(),
            actor: cmd.actor.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_reactivate(&self, cmd: &Reactivate) -> Result<Vec<SupplierEvent>, DomainError> {
        self.ensure_exists(cmd.supplier_id)?;
        if self.status == SupplierStatus::Active {
            return Err(DomainError::invariant("supplier is already active"));
        }

        Ok(vec![SupplierEvent::SupplierReactivated(SupplierReactivated {
            supplier_id: cmd.supplier_id,
            actor: cmd.actor.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use procureflow_core::AggregateId;
    use procureflow_events::execute;

    fn test_supplier_id() -> SupplierId {
        SupplierId::new(AggregateId::new())
    }

    fn register(supplier: &mut Supplier, id: SupplierId) {
        let cmd = RegisterSupplier {
            supplier_id: id,
            code: " acme-01 ".to_string(),
            name: "Acme Industrial".to_string(),
            contact: None,
            categories: vec!["valves".to_string(), "Valves".to_string(), " ".to_string()],
            actor: Actor::system(),
            occurred_at: Utc::now(),
        };
        execute(supplier, &SupplierCommand::RegisterSupplier(cmd)).unwrap();
    }

    #[test]
    fn register_normalizes_code_and_categories() {
        let id = test_supplier_id();
        let mut supplier = Supplier::empty(id);
        register(&mut supplier, id);

        assert_eq!(supplier.code(), "ACME-01");
        assert_eq!(supplier.categories(), ["valves".to_string()]);
        assert!(supplier.can_transact());
        assert_eq!(supplier.history().len(), 1);
        assert_eq!(supplier.version(), 1);
    }

    #[test]
    fn register_requires_name() {
        let id = test_supplier_id();
        let supplier = Supplier::empty(id);
        let cmd = RegisterSupplier {
            supplier_id: id,
            code: "X".to_string(),
            name: "  ".to_string(),
            contact: None,
            categories: vec![],
            actor: Actor::system(),
            occurred_at: Utc::now(),
        };
        let err = supplier.handle(&SupplierCommand::RegisterSupplier(cmd)).unwrap_err();
        assert_eq!(err, DomainError::validation("name is required"));
    }

    #[test]
    fn deactivate_is_soft_and_recorded() {
        let id = test_supplier_id();
        let mut supplier = Supplier::empty(id);
        register(&mut supplier, id);

        let cmd = Deactivate {
            supplier_id: id,
            reason: Some("failed audit".to_string()),
            actor: Actor::system(),
            occurred_at: Utc::now(),
        };
        execute(&mut supplier, &SupplierCommand::Deactivate(cmd.clone())).unwrap();

        assert_eq!(supplier.status(), SupplierStatus::Inactive);
        assert!(!supplier.can_transact());
        let last = supplier.history().last().unwrap();
        assert_eq!(last.from, Some(SupplierStatus::Active));
        assert_eq!(last.note.as_deref(), Some("failed audit"));

        let err = supplier.handle(&SupplierCommand::Deactivate(cmd)).unwrap_err();
        assert!(matches!(err, DomainError::InvariantViolation(_)));

        let update = UpdateDetails {
            supplier_id: id,
            name: Some("New".to_string()),
            contact: None,
            categories: None,
            actor: Actor::system(),
            occurred_at: Utc::now(),
        };
        assert!(supplier.handle(&SupplierCommand::UpdateDetails(update)).is_err());
    }

    #[test]
    fn update_keeps_unset_fields() {
        let id = test_supplier_id();
        let mut supplier = Supplier::empty(id);
        register(&mut supplier, id);

        let cmd = UpdateDetails {
            supplier_id: id,
            name: Some(" Acme Industrial GmbH ".to_string()),
            contact: Some(ContactInfo {
                email: Some("orders@acme.example".to_string()),
                ..ContactInfo::default()
            }),
            categories: None,
            actor: Actor::system(),
            occurred_at: Utc::now(),
        };
        execute(&mut supplier, &SupplierCommand::UpdateDetails(cmd)).unwrap();

        assert_eq!(supplier.name(), "Acme Industrial GmbH");
        assert_eq!(supplier.contact().email.as_deref(), Some("orders@acme.example"));
        assert_eq!(supplier.categories(), ["valves".to_string()]);
        assert_eq!(supplier.code(), "ACME-01");
        // Details are not a status change.
        assert_eq!(supplier.history().len(), 1);
        assert_eq!(supplier.version(), 2);
    }

    #[test]
    fn reactivate_restores_transacting() {
        let id = test_supplier_id();
        let mut supplier = Supplier::empty(id);
        register(&mut supplier, id);

        let reactivate = SupplierCommand::Reactivate(Reactivate {
            supplier_id: id,
            actor: Actor::system(),
            occurred_at: Utc::now(),
        });
        assert!(matches!(
            supplier.handle(&reactivate),
            Err(DomainError::InvariantViolation(_))
        ));

        let deactivate = Deactivate {
            supplier_id: id,
            reason: None,
            actor: Actor::system(),
            occurred_at: Utc::now(),
        };
        execute(&mut supplier, &SupplierCommand::Deactivate(deactivate)).unwrap();
        execute(&mut supplier, &reactivate).unwrap();

        assert_eq!(supplier.status(), SupplierStatus::Active);
        assert!(supplier.can_transact());
        let last = supplier.history().last().unwrap();
        assert_eq!(last.from, Some(SupplierStatus::Inactive));
        assert_eq!(last.to, SupplierStatus::Active);
    }

    #[test]
    fn commands_on_unknown_supplier_are_not_found() {
        let id = test_supplier_id();
        let supplier = Supplier::empty(id);
        let cmd = Reactivate {
            supplier_id: id,
            actor: Actor::system(),
            occurred_at: Utc::now(),
        };
        assert_eq!(
            supplier.handle(&SupplierCommand::Reactivate(cmd)).unwrap_err(),
            DomainError::NotFound
        );
    }
}
