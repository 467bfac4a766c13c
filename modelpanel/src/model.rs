use crate::field::FieldDescriptor;
use crate::AppError;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fmt;
use utoipa::ToSchema;

pub const ADMIN_ROLE: &str = "Admin";

/// Reserved for the generated record identifier.
pub const ID_FIELD: &str = "id";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Create,
    Read,
    Update,
    Delete,
}

impl Operation {
    pub const ALL: [Operation; 4] = [Operation::Create, Operation::Read, Operation::Update, Operation::Delete];

    /// Update and delete target a single existing record.
    pub fn is_mutating_single(&self) -> bool {
        matches!(self, Operation::Update | Operation::Delete)
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::Create => write!(f, "create"),
            Operation::Read => write!(f, "read"),
            Operation::Update => write!(f, "update"),
            Operation::Delete => write!(f, "delete"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Permission {
    Create,
    Read,
    Update,
    Delete,
    All,
}

impl Permission {
    pub fn grants(&self, op: Operation) -> bool {
        match (self, op) {
            (Permission::All, _) => true,
            (Permission::Create, Operation::Create) => true,
            (Permission::Read, Operation::Read) => true,
            (Permission::Update, Operation::Update) => true,
            (Permission::Delete, Operation::Delete) => true,
            _ => false,
        }
    }

    pub fn parse(raw: &str) -> Result<Self, AppError> {
        serde_json::from_value(serde_json::Value::String(raw.trim().to_lowercase()))
            .map_err(|_| AppError::Validation(format!("unknown permission '{}'", raw)))
    }
}

pub type Rbac = BTreeMap<String, BTreeSet<Permission>>;

pub fn default_rbac() -> Rbac {
    use Permission::*;
    BTreeMap::from([
        (ADMIN_ROLE.to_string(), BTreeSet::from([All])),
        ("Manager".to_string(), BTreeSet::from([Create, Read, Update])),
        ("Viewer".to_string(), BTreeSet::from([Read])),
    ])
}

pub fn default_table_name(name: &str) -> String {
    format!("{}s", name.to_lowercase())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ModelDefinition {
    pub name: String,
    pub table_name: String,
    #[serde(default)]
    pub fields: Vec<FieldDescriptor>,
    #[serde(default)]
    pub owner_field: Option<String>,
    #[serde(default = "default_rbac")]
    #[schema(value_type = Object)]
    pub rbac: Rbac,
}

impl ModelDefinition {
    pub fn new(name: impl Into<String>, fields: Vec<FieldDescriptor>) -> Self {
        let name = name.into();
        Self { table_name: default_table_name(&name), name, fields, owner_field: None, rbac: default_rbac() }
    }

    pub fn with_owner_field(mut self, owner_field: impl Into<String>) -> Self {
        self.owner_field = Some(owner_field.into());
        self
    }

    pub fn with_rbac(mut self, rbac: Rbac) -> Self {
        self.rbac = rbac;
        self
    }

    pub fn permissions_of(&self, role: &str) -> Option<&BTreeSet<Permission>> {
        self.rbac.get(role)
    }

    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Rejects definitions that would produce unsafe file names, colliding
    /// routes, or records with an ambiguous `id`.
    pub fn validate(&self) -> Result<(), AppError> {
        ensure_identifier("model name", &self.name)?;
        ensure_identifier("table name", &self.table_name)?;
        let mut seen = HashSet::new();
        for field in &self.fields {
            if field.name.trim().is_empty() {
                return Err(AppError::Validation("field name must not be empty".to_string()));
            }
            if field.name == ID_FIELD {
                return Err(AppError::Validation("field name 'id' is reserved".to_string()));
            }
            if !seen.insert(field.name.as_str()) {
                return Err(AppError::Validation(format!("duplicate field '{}'", field.name)));
            }
        }
        if let Some(owner) = &self.owner_field {
            if owner == ID_FIELD {
                return Err(AppError::Validation("ownerField cannot be 'id'".to_string()));
            }
        }
        Ok(())
    }
}

fn ensure_identifier(what: &str, value: &str) -> Result<(), AppError> {
    let valid = !value.is_empty() && value.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if valid {
        Ok(())
    } else {
        Err(AppError::Validation(format!("{} '{}' must match [A-Za-z0-9_-]+", what, value)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::FieldKind;
    use serde_json::json;

    #[test]
    fn table_name_defaults_to_lowercase_plural() {
        assert_eq!(default_table_name("Product"), "products");
        assert_eq!(ModelDefinition::new("Order", vec![]).table_name, "orders");
    }

    #[test]
    fn all_grants_every_operation() {
        for op in Operation::ALL {
            assert!(Permission::All.grants(op));
        }
        assert!(Permission::Read.grants(Operation::Read));
        assert!(!Permission::Read.grants(Operation::Update));
    }

    #[test]
    fn default_rbac_matches_roles() {
        let rbac = default_rbac();
        assert_eq!(rbac["Admin"], BTreeSet::from([Permission::All]));
        assert!(rbac["Manager"].contains(&Permission::Update));
        assert!(!rbac["Manager"].contains(&Permission::Delete));
        assert_eq!(rbac["Viewer"], BTreeSet::from([Permission::Read]));
    }

    #[test]
    fn definition_reads_camel_case_json() {
        let model: ModelDefinition = serde_json::from_value(json!({
            "name": "Product",
            "tableName": "products",
            "ownerField": "ownerId",
            "fields": [{"name": "price", "type": "number"}],
            "rbac": {"Admin": ["all"], "Viewer": ["read"]}
        }))
        .unwrap();
        assert_eq!(model.owner_field.as_deref(), Some("ownerId"));
        assert_eq!(model.fields[0].kind, FieldKind::Number);
        assert_eq!(model.rbac.len(), 2);
    }

    #[test]
    fn validation_rejects_reserved_and_unsafe_names() {
        let reserved = ModelDefinition::new("Item", vec![FieldDescriptor::new("id", FieldKind::String)]);
        assert!(reserved.validate().is_err());

        let traversal = ModelDefinition::new("../etc", vec![]);
        assert!(traversal.validate().is_err());

        let dup = ModelDefinition::new(
            "Item",
            vec![FieldDescriptor::new("a", FieldKind::String), FieldDescriptor::new("a", FieldKind::Number)],
        );
        assert!(dup.validate().is_err());

        assert!(ModelDefinition::new("Item", vec![FieldDescriptor::new("a", FieldKind::String)]).validate().is_ok());
    }

    #[test]
    fn permission_parse_is_case_insensitive() {
        assert_eq!(Permission::parse("ALL").unwrap(), Permission::All);
        assert!(Permission::parse("publish").is_err());
    }
}
