//! Typed field descriptors and the coercion applied to every incoming value.
//!
//! A field's declared type is a tagged [`FieldKind`]; all conversion from raw
//! request input (form strings or JSON values) dispatches over that tag.

use crate::AppError;
use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};
use utoipa::ToSchema;

/// Strings that a boolean field accepts as `true`.
const TRUTHY: [&str; 2] = ["on", "true"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    String,
    Number,
    Boolean,
}

impl FieldKind {
    pub fn parse(raw: &str) -> Result<Self, AppError> {
        match raw.trim().to_lowercase().as_str() {
            "" | "string" => Ok(FieldKind::String),
            "number" => Ok(FieldKind::Number),
            "boolean" => Ok(FieldKind::Boolean),
            other => Err(AppError::Validation(format!("unknown field type '{}'", other))),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FieldKind::String => "string",
            FieldKind::Number => "number",
            FieldKind::Boolean => "boolean",
        }
    }

    /// Converts a present, non-empty input into the declared type.
    pub fn coerce(&self, field: &str, raw: &Value) -> Result<Value, AppError> {
        match self {
            FieldKind::String => Ok(match raw {
                Value::String(s) => Value::String(s.clone()),
                other => Value::String(other.to_string()),
            }),
            FieldKind::Number => coerce_number(field, raw),
            FieldKind::Boolean => Ok(Value::Bool(match raw {
                Value::Bool(b) => *b,
                Value::String(s) => TRUTHY.contains(&s.as_str()),
                _ => false,
            })),
        }
    }
}

fn coerce_number(field: &str, raw: &Value) -> Result<Value, AppError> {
    let parsed = match raw {
        Value::Number(n) => return Ok(Value::Number(n.clone())),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        _ => None,
    };
    parsed
        .and_then(number_value)
        .ok_or_else(|| AppError::Validation(format!("field '{}' expects a number, got {}", field, raw)))
}

/// Integral values are stored as integers so `"5"` persists as `5`, not `5.0`.
fn number_value(n: f64) -> Option<Value> {
    if !n.is_finite() {
        return None;
    }
    if n.fract() == 0.0 && n.abs() < i64::MAX as f64 {
        Some(Value::Number(Number::from(n as i64)))
    } else {
        Number::from_f64(n).map(Value::Number)
    }
}

/// Input counts as missing when absent, null, or an empty string.
pub fn is_blank(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.is_empty(),
        Some(_) => false,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct FieldDescriptor {
    pub name: String,
    #[serde(rename = "type", default = "default_kind")]
    pub kind: FieldKind,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<Object>)]
    pub default: Option<Value>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub unique: bool,
}

fn default_kind() -> FieldKind {
    FieldKind::String
}

impl FieldDescriptor {
    pub fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        Self { name: name.into(), kind, required: false, default: None, unique: false }
    }

    pub fn with_default(mut self, default: Value) -> Self {
        self.default = Some(default);
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Brings a declared default into the field's type; blank defaults are dropped.
    pub fn normalize_default(&mut self) -> Result<(), AppError> {
        self.default = match self.default.take() {
            d if is_blank(d.as_ref()) => None,
            Some(d) => Some(self.kind.coerce(&self.name, &d)?),
            None => None,
        };
        Ok(())
    }
}
