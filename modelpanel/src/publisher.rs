use crate::catalog::ModelCatalog;
use crate::field::{FieldDescriptor, FieldKind};
use crate::model::{default_rbac, default_table_name, ModelDefinition, Permission, Rbac};
use crate::registry::ModelRegistry;
use crate::store::RecordStore;
use crate::AppError;
use serde::Deserialize;
use serde_json::{Map, Value};
use serde_with::{serde_as, OneOrMany};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};
use utoipa::ToSchema;

/// A raw model description as submitted by the admin form or a JSON client.
///
/// Form submissions carry the fields as parallel `field_*[]` arrays; a single
/// row arrives as a scalar and is read as a one-element sequence.
#[serde_as]
#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ModelSubmission {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub table_name: Option<String>,
    #[serde(default)]
    pub owner_field: Option<String>,
    #[serde(default)]
    pub fields: Option<Vec<FieldDescriptor>>,
    #[serde_as(as = "Option<BTreeMap<_, OneOrMany<_>>>")]
    #[serde(default)]
    #[schema(value_type = Option<Object>)]
    pub rbac: Option<BTreeMap<String, Vec<String>>>,
    #[serde_as(as = "OneOrMany<_>")]
    #[serde(rename = "field_name[]", default)]
    pub field_names: Vec<String>,
    #[serde_as(as = "OneOrMany<_>")]
    #[serde(rename = "field_type[]", default)]
    pub field_types: Vec<String>,
    #[serde_as(as = "OneOrMany<_>")]
    #[serde(rename = "field_required[]", default)]
    pub field_required: Vec<String>,
    #[serde_as(as = "OneOrMany<_>")]
    #[serde(rename = "field_default[]", default)]
    pub field_defaults: Vec<String>,
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

impl ModelSubmission {
    /// Parses an urlencoded body. Repeated keys collect into arrays and
    /// `rbac[<Role>][]=<perm>` pairs build the permission map.
    pub fn from_form(body: &[u8]) -> Result<Self, AppError> {
        let pairs: Vec<(String, String)> = serde_urlencoded::from_bytes(body)?;
        let mut map = Map::new();
        let mut rbac = Map::new();
        for (key, value) in pairs {
            if let Some(role) = rbac_role(&key) {
                let perms = rbac.entry(role.to_string()).or_insert_with(|| Value::Array(Vec::new()));
                if let Value::Array(perms) = perms {
                    perms.push(Value::String(value));
                }
                continue;
            }
            match map.get_mut(&key) {
                Some(Value::Array(values)) => values.push(Value::String(value)),
                Some(existing) => {
                    let first = existing.take();
                    *existing = Value::Array(vec![first, Value::String(value)]);
                }
                None => {
                    map.insert(key, Value::String(value));
                }
            }
        }
        if !rbac.is_empty() {
            map.insert("rbac".to_string(), Value::Object(rbac));
        }
        // a form cannot carry structured field descriptors
        map.remove("fields");
        Ok(serde_json::from_value(Value::Object(map))?)
    }

    pub fn from_json(body: &[u8]) -> Result<Self, AppError> {
        Ok(serde_json::from_slice(body)?)
    }

    fn form_fields(&self) -> Result<Vec<FieldDescriptor>, AppError> {
        let mut fields = Vec::with_capacity(self.field_names.len());
        for (i, name) in self.field_names.iter().enumerate() {
            if name.trim().is_empty() {
                continue;
            }
            let kind = FieldKind::parse(self.field_types.get(i).map(String::as_str).unwrap_or(""))?;
            let required = matches!(self.field_required.get(i).map(String::as_str), Some("on") | Some("true"));
            let default = self.field_defaults.get(i).filter(|d| !d.is_empty()).map(|d| Value::String(d.clone()));
            fields.push(FieldDescriptor { name: name.trim().to_string(), kind, required, default, unique: false });
        }
        Ok(fields)
    }

    /// Fills defaults and coerces declared defaults into their field types.
    pub fn into_definition(self) -> Result<ModelDefinition, AppError> {
        let name = self.name.trim().to_string();
        if name.is_empty() {
            return Err(AppError::Validation("model name is required".to_string()));
        }
        let mut fields = if self.field_names.is_empty() {
            self.fields.clone().unwrap_or_default()
        } else {
            self.form_fields()?
        };
        for field in &mut fields {
            field.normalize_default()?;
        }
        let rbac = match self.rbac {
            Some(raw) => parse_rbac(raw)?,
            None => default_rbac(),
        };
        let model = ModelDefinition {
            table_name: non_blank(self.table_name).unwrap_or_else(|| default_table_name(&name)),
            name,
            fields,
            owner_field: non_blank(self.owner_field),
            rbac,
        };
        model.validate()?;
        Ok(model)
    }
}

fn rbac_role(key: &str) -> Option<&str> {
    let rest = key.strip_prefix("rbac[")?;
    let rest = rest.strip_suffix("[]").unwrap_or(rest);
    rest.strip_suffix(']').filter(|role| !role.is_empty())
}

fn parse_rbac(raw: BTreeMap<String, Vec<String>>) -> Result<Rbac, AppError> {
    raw.into_iter()
        .map(|(role, perms)| {
            let perms = perms.iter().map(|p| Permission::parse(p)).collect::<Result<_, _>>()?;
            Ok((role, perms))
        })
        .collect()
}

#[derive(Debug, Clone)]
pub enum PublishOutcome {
    Registered(Arc<ModelDefinition>),
    AlreadyRegistered(Arc<ModelDefinition>),
}

impl PublishOutcome {
    pub fn model(&self) -> &Arc<ModelDefinition> {
        match self {
            PublishOutcome::Registered(m) | PublishOutcome::AlreadyRegistered(m) => m,
        }
    }

    pub fn is_new(&self) -> bool {
        matches!(self, PublishOutcome::Registered(_))
    }
}

/// Normalizes, persists and registers model descriptions.
///
/// Check, save and register run under one publish lock, so the catalog on
/// disk never holds a description the registry refused.
pub struct ModelPublisher {
    catalog: ModelCatalog,
    store: Arc<dyn RecordStore>,
    registry: Arc<ModelRegistry>,
    publishing: Mutex<()>,
}

impl ModelPublisher {
    pub fn new(catalog: ModelCatalog, store: Arc<dyn RecordStore>, registry: Arc<ModelRegistry>) -> Self {
        Self { catalog, store, registry, publishing: Mutex::new(()) }
    }

    pub async fn publish(&self, submission: ModelSubmission) -> Result<PublishOutcome, AppError> {
        let model = submission.into_definition()?;
        let _publishing = self.publishing.lock().await;
        if let Some(existing) = self.registry.get(&model.name) {
            info!("Model {} already registered; publish ignored", model.name);
            return Ok(PublishOutcome::AlreadyRegistered(existing));
        }
        if let Some(owner) = self.registry.all().into_iter().find(|m| m.table_name == model.table_name) {
            return Err(table_taken(&model, &owner.name));
        }
        self.catalog.save(&model).await?;
        self.activate(model).await
    }

    /// Registers every persisted description; used at startup. A description
    /// whose table is already served by an earlier one is skipped.
    pub async fn load_persisted(&self) -> Result<usize, AppError> {
        let _publishing = self.publishing.lock().await;
        let mut registered = 0;
        for model in self.catalog.load_all().await? {
            let name = model.name.clone();
            match self.activate(model).await {
                Ok(outcome) if outcome.is_new() => registered += 1,
                Ok(_) => {}
                Err(AppError::Conflict(reason)) => warn!("Skipping persisted model {}: {}", name, reason),
                Err(e) => return Err(e),
            }
        }
        Ok(registered)
    }

    async fn activate(&self, model: ModelDefinition) -> Result<PublishOutcome, AppError> {
        {
            let _lock = self.store.lock(&model.table_name).await;
            self.store.ensure(&model.table_name).await?;
        }
        let name = model.name.clone();
        if self.registry.register(model.clone()) {
            let registered = self.registry.get(&name).ok_or_else(|| AppError::Internal(format!("model {} vanished after registration", name)))?;
            return Ok(PublishOutcome::Registered(registered));
        }
        match self.registry.get(&name) {
            Some(existing) => Ok(PublishOutcome::AlreadyRegistered(existing)),
            None => {
                let owner = self
                    .registry
                    .all()
                    .into_iter()
                    .find(|m| m.table_name == model.table_name)
                    .map(|m| m.name.clone())
                    .unwrap_or_default();
                Err(table_taken(&model, &owner))
            }
        }
    }
}

fn table_taken(model: &ModelDefinition, owner: &str) -> AppError {
    AppError::Conflict(format!("table '{}' is already used by model {}", model.table_name, owner))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ADMIN_ROLE;
    use crate::store::MemoryStore;
    use serde_json::json;
    use std::collections::BTreeSet;

    #[test]
    fn single_form_row_is_read_as_sequence() {
        let submission = ModelSubmission::from_form(
            b"name=Product&field_name%5B%5D=price&field_type%5B%5D=number&field_required%5B%5D=on&field_default%5B%5D=5",
        )
        .unwrap();
        let model = submission.into_definition().unwrap();
        assert_eq!(model.table_name, "products");
        assert_eq!(model.fields.len(), 1);
        let price = &model.fields[0];
        assert_eq!(price.kind, FieldKind::Number);
        assert!(price.required);
        assert_eq!(price.default, Some(json!(5)));
        assert_eq!(model.rbac, default_rbac());
    }

    #[test]
    fn repeated_form_rows_align_by_index() {
        let body = "name=Listing&tableName=&ownerField=ownerId\
            &field_name[]=title&field_type[]=string&field_default[]=\
            &field_name[]=active&field_type[]=boolean&field_default[]=true\
            &field_name[]=&field_type[]=string&field_default[]=";
        let model = ModelSubmission::from_form(body.as_bytes()).unwrap().into_definition().unwrap();
        assert_eq!(model.table_name, "listings");
        assert_eq!(model.owner_field.as_deref(), Some("ownerId"));
        let names: Vec<_> = model.fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["title", "active"]);
        assert_eq!(model.fields[0].default, None);
        assert_eq!(model.fields[1].default, Some(json!(true)));
        assert!(!model.fields[1].required);
    }

    #[test]
    fn form_rbac_builds_permission_map() {
        let body = "name=Doc&rbac[Admin][]=all&rbac[Editor][]=read&rbac[Editor][]=update";
        let model = ModelSubmission::from_form(body.as_bytes()).unwrap().into_definition().unwrap();
        assert_eq!(model.rbac.len(), 2);
        assert_eq!(model.rbac[ADMIN_ROLE], BTreeSet::from([Permission::All]));
        assert_eq!(model.rbac["Editor"], BTreeSet::from([Permission::Read, Permission::Update]));
    }

    #[test]
    fn json_submission_keeps_structured_fields() {
        let body = json!({
            "name": "Product",
            "fields": [{"name": "price", "type": "number", "default": "1.5", "unique": true}],
            "rbac": {"Admin": ["all"], "Viewer": "read"}
        });
        let model = ModelSubmission::from_json(body.to_string().as_bytes()).unwrap().into_definition().unwrap();
        assert_eq!(model.fields[0].default, Some(json!(1.5)));
        assert!(model.fields[0].unique);
        assert_eq!(model.rbac["Viewer"], BTreeSet::from([Permission::Read]));
        assert_eq!(model.owner_field, None);
    }

    #[test]
    fn invalid_submissions_are_rejected() {
        assert!(ModelSubmission::default().into_definition().is_err());
        let bad_perm = json!({"name": "X", "rbac": {"Admin": ["publish"]}});
        assert!(ModelSubmission::from_json(bad_perm.to_string().as_bytes()).unwrap().into_definition().is_err());
        let bad_default = json!({"name": "X", "fields": [{"name": "n", "type": "number", "default": "abc"}]});
        assert!(ModelSubmission::from_json(bad_default.to_string().as_bytes()).unwrap().into_definition().is_err());
    }

    #[tokio::test]
    async fn publish_persists_ensures_and_registers_once() {
        let dir = std::env::temp_dir().join("modelpanel").join(format!("publish_{}", rand::random::<u64>()));
        let catalog = ModelCatalog::open(&dir).await.unwrap();
        let store: Arc<dyn RecordStore> = Arc::new(MemoryStore::default());
        let registry = Arc::new(ModelRegistry::new());
        let publisher = ModelPublisher::new(catalog.clone(), Arc::clone(&store), Arc::clone(&registry));

        let first = ModelSubmission { name: "Product".into(), ..Default::default() };
        let outcome = publisher.publish(first).await.unwrap();
        assert!(outcome.is_new());
        assert!(catalog.model_path("Product").exists());
        assert!(store.read_all("products").await.unwrap().is_empty());

        let again = ModelSubmission { name: "Product".into(), table_name: Some("goods".into()), ..Default::default() };
        let outcome = publisher.publish(again).await.unwrap();
        assert!(!outcome.is_new());
        assert_eq!(outcome.model().table_name, "products");
        assert_eq!(registry.all().len(), 1);

        let clash = ModelSubmission { name: "Stock".into(), table_name: Some("products".into()), ..Default::default() };
        assert!(matches!(publisher.publish(clash).await, Err(AppError::Conflict(_))));
    }

    async fn temp_publisher(name: &str) -> (Arc<ModelPublisher>, ModelCatalog, Arc<ModelRegistry>) {
        let dir = std::env::temp_dir().join("modelpanel").join(format!("{}_{}", name, rand::random::<u64>()));
        let catalog = ModelCatalog::open(&dir).await.unwrap();
        let registry = Arc::new(ModelRegistry::new());
        let publisher = ModelPublisher::new(catalog.clone(), Arc::new(MemoryStore::default()), Arc::clone(&registry));
        (Arc::new(publisher), catalog, registry)
    }

    fn submission(name: &str, table: &str) -> ModelSubmission {
        ModelSubmission { name: name.into(), table_name: Some(table.into()), ..Default::default() }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_publishes_on_one_table_persist_only_the_winner() {
        for _ in 0..20 {
            let (publisher, catalog, registry) = temp_publisher("same_table").await;
            let (a, b) = tokio::join!(
                tokio::spawn({
                    let publisher = Arc::clone(&publisher);
                    async move { publisher.publish(submission("Alpha", "shared")).await }
                }),
                tokio::spawn({
                    let publisher = Arc::clone(&publisher);
                    async move { publisher.publish(submission("Beta", "shared")).await }
                }),
            );
            let results = [a.unwrap(), b.unwrap()];
            assert_eq!(results.iter().filter(|r| matches!(r, Ok(o) if o.is_new())).count(), 1);
            assert_eq!(results.iter().filter(|r| matches!(r, Err(AppError::Conflict(_)))).count(), 1);

            let persisted = catalog.load_all().await.unwrap();
            assert_eq!(persisted.len(), 1);
            assert_eq!(registry.get(&persisted[0].name).as_deref(), Some(&persisted[0]));
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_publishes_of_one_name_persist_the_registered_definition() {
        for _ in 0..20 {
            let (publisher, catalog, registry) = temp_publisher("same_name").await;
            let (a, b) = tokio::join!(
                tokio::spawn({
                    let publisher = Arc::clone(&publisher);
                    async move { publisher.publish(submission("Alpha", "one")).await }
                }),
                tokio::spawn({
                    let publisher = Arc::clone(&publisher);
                    async move { publisher.publish(submission("Alpha", "two")).await }
                }),
            );
            let outcomes = [a.unwrap().unwrap(), b.unwrap().unwrap()];
            assert_eq!(outcomes.iter().filter(|o| o.is_new()).count(), 1);

            let persisted = catalog.load_all().await.unwrap();
            let registered: Vec<ModelDefinition> = registry.all().iter().map(|m| ModelDefinition::clone(m)).collect();
            assert_eq!(persisted, registered);
        }
    }

    #[tokio::test]
    async fn startup_skips_persisted_models_sharing_a_table() {
        let (publisher, catalog, registry) = temp_publisher("startup_clash").await;
        let mut alpha = ModelDefinition::new("Alpha", vec![]);
        alpha.table_name = "shared".into();
        let mut beta = ModelDefinition::new("Beta", vec![]);
        beta.table_name = "shared".into();
        catalog.save(&alpha).await.unwrap();
        catalog.save(&beta).await.unwrap();

        assert_eq!(publisher.load_persisted().await.unwrap(), 1);
        assert_eq!(registry.all().len(), 1);
        assert_eq!(*registry.get("Alpha").unwrap(), alpha);
        assert!(registry.get("Beta").is_none());
    }
}
