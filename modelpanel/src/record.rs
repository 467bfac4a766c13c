use crate::access::Requester;
use crate::field::is_blank;
use crate::model::{ModelDefinition, ID_FIELD};
use crate::AppError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use utoipa::ToSchema;

/// Raw field input of a create/update request, keyed by field name.
pub type Input = Map<String, Value>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Record {
    pub id: String,
    #[serde(flatten)]
    #[schema(value_type = Object)]
    pub values: Map<String, Value>,
}

impl Record {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into(), values: Map::new() }
    }

    pub fn generate() -> Self {
        Self::new(uuid::Uuid::new_v4().to_string())
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.values.get(field)
    }

    pub fn is_owned_by(&self, owner_field: &str, owner_id: &str) -> bool {
        matches!(self.values.get(owner_field), Some(Value::String(s)) if s == owner_id)
    }

    /// Builds a new record from input, walking the declared fields in order.
    pub fn create(model: &ModelDefinition, input: &Input, requester: &Requester) -> Result<Self, AppError> {
        let mut record = Record::generate();
        for field in &model.fields {
            let raw = input.get(&field.name);
            let value = if is_blank(raw) {
                match &field.default {
                    Some(default) => default.clone(),
                    None if field.required => {
                        return Err(AppError::Validation(format!("field '{}' is required", field.name)));
                    }
                    None => Value::Null,
                }
            } else {
                field.kind.coerce(&field.name, raw.unwrap_or(&Value::Null))?
            };
            record.values.insert(field.name.clone(), value);
        }
        if let Some(owner_field) = &model.owner_field {
            if !is_truthy(record.values.get(owner_field)) {
                record.values.insert(owner_field.clone(), Value::String(requester.id.clone()));
            }
        }
        Ok(record)
    }

    /// Applies input to an existing record; blank input leaves values untouched.
    pub fn update(&mut self, model: &ModelDefinition, input: &Input) -> Result<(), AppError> {
        for field in &model.fields {
            let raw = input.get(&field.name);
            if is_blank(raw) {
                if !self.values.contains_key(&field.name) {
                    if let Some(default) = &field.default {
                        self.values.insert(field.name.clone(), default.clone());
                    }
                }
            } else {
                let value = field.kind.coerce(&field.name, raw.unwrap_or(&Value::Null))?;
                self.values.insert(field.name.clone(), value);
            }
        }
        Ok(())
    }
}

fn is_truthy(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) | Some(Value::Bool(false)) => false,
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Number(n)) => n.as_f64().is_some_and(|f| f != 0.0),
        Some(_) => true,
    }
}

/// Turns form pairs into an input map; the first occurrence of a key wins.
pub fn input_from_pairs(pairs: Vec<(String, String)>) -> Input {
    let mut input = Input::new();
    for (key, value) in pairs {
        if key == ID_FIELD || key.starts_with('_') {
            continue;
        }
        input.entry(key).or_insert(Value::String(value));
    }
    input
}
