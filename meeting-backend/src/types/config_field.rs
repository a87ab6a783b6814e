//! Declarative schema for provider-specific session options.
//!
//! Each adapter publishes an ordered list of [`ConfigField`]s. A settings UI renders
//! them; the save path validates the stored JSON blob against them.

use serde::Serialize;
use serde_json::{Map, Value};

use crate::Error;

/// Input type of a session option.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FieldKind {
    Text,
    Textarea,
    Checkbox,
    Number,
    /// Dropdown; `options` are `(value, label)` pairs.
    Select { options: Vec<(String, String)> },
    Radio { options: Vec<(String, String)> },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConfigField {
    pub name: String,
    pub kind: FieldKind,
    pub label: String,
    pub hint: Option<String>,
    pub default: Option<Value>,
}

impl ConfigField {
    pub fn new(name: &str, kind: FieldKind, label: &str) -> Self {
        Self {
            name: name.to_string(),
            kind,
            label: label.to_string(),
            hint: None,
            default: None,
        }
    }

    pub fn text(name: &str, label: &str) -> Self {
        Self::new(name, FieldKind::Text, label)
    }

    pub fn textarea(name: &str, label: &str) -> Self {
        Self::new(name, FieldKind::Textarea, label)
    }

    pub fn checkbox(name: &str, label: &str) -> Self {
        Self::new(name, FieldKind::Checkbox, label)
    }

    pub fn number(name: &str, label: &str) -> Self {
        Self::new(name, FieldKind::Number, label)
    }

    pub fn select(name: &str, label: &str, options: &[(&str, &str)]) -> Self {
        Self::new(
            name,
            FieldKind::Select {
                options: owned_options(options),
            },
            label,
        )
    }

    pub fn radio(name: &str, label: &str, options: &[(&str, &str)]) -> Self {
        Self::new(
            name,
            FieldKind::Radio {
                options: owned_options(options),
            },
            label,
        )
    }

    pub fn with_hint(mut self, hint: &str) -> Self {
        self.hint = Some(hint.to_string());
        self
    }

    pub fn with_default(mut self, default: impl Into<Value>) -> Self {
        self.default = Some(default.into());
        self
    }

    /// Whether `value` has the JSON shape this field expects. `null` means unset
    /// and is always accepted.
    pub fn accepts(&self, value: &Value) -> bool {
        if value.is_null() {
            return true;
        }

        match &self.kind {
            FieldKind::Text | FieldKind::Textarea => value.is_string(),
            FieldKind::Checkbox => value.is_boolean(),
            FieldKind::Number => value.is_number(),
            FieldKind::Select { options } | FieldKind::Radio { options } => value
                .as_str()
                .map(|selected| options.iter().any(|(option, _)| option == selected))
                .unwrap_or(false),
        }
    }
}

fn owned_options(options: &[(&str, &str)]) -> Vec<(String, String)> {
    options
        .iter()
        .map(|(value, label)| (value.to_string(), label.to_string()))
        .collect()
}

/// Checks a stored option blob against `fields`.
///
/// The blob must be a JSON object (or null, meaning empty). Keys that no field
/// declares are rejected, as are values of the wrong type for their field.
pub fn validate_config(fields: &[ConfigField], blob: &Value) -> Result<(), Error> {
    let map = match blob {
        Value::Null => return Ok(()),
        Value::Object(map) => map,
        other => {
            return Err(Error::Configuration(format!(
                "Session options must be an object, got {other}"
            )))
        }
    };

    for (key, value) in map {
        let field = fields
            .iter()
            .find(|field| &field.name == key)
            .ok_or_else(|| Error::Configuration(format!("Unknown session option: {key}")))?;

        if !field.accepts(value) {
            return Err(Error::Configuration(format!(
                "Invalid value for session option {key}: {value}"
            )));
        }
    }

    Ok(())
}

/// Returns `blob` with every missing or null field filled from its default.
pub fn with_defaults(fields: &[ConfigField], blob: &Value) -> Value {
    let mut map = blob.as_object().cloned().unwrap_or_else(Map::new);

    for field in fields {
        let missing = map.get(&field.name).map(Value::is_null).unwrap_or(true);
        if missing {
            if let Some(default) = &field.default {
                map.insert(field.name.clone(), default.clone());
            }
        }
    }

    Value::Object(map)
}
