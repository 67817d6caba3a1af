//! Recursive parameter schemas for tool arguments.
//!
//! Schemas are a tagged-variant tree built once at startup. Arrays always
//! carry an item schema by construction, and [`assert_complete`] re-checks
//! the emitted JSON form so an array node without `items` can never be
//! advertised to callers.

use serde_json::{json, Map, Value};

/// A node in a parameter schema tree.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamSchema {
    String { description: Option<String> },
    Integer { description: Option<String> },
    Number { description: Option<String> },
    Boolean { description: Option<String> },
    Null,
    Array {
        items: Box<ParamSchema>,
        description: Option<String>,
    },
    Object {
        properties: Vec<(String, ParamSchema)>,
        required: Vec<String>,
        description: Option<String>,
    },
    /// Object with caller-defined keys (e.g. record values).
    OpenObject { description: Option<String> },
    AnyOf(Vec<ParamSchema>),
}

impl ParamSchema {
    pub fn string() -> Self {
        ParamSchema::String { description: None }
    }

    pub fn string_with(description: impl Into<String>) -> Self {
        ParamSchema::String {
            description: Some(description.into()),
        }
    }

    pub fn integer() -> Self {
        ParamSchema::Integer { description: None }
    }

    pub fn integer_with(description: impl Into<String>) -> Self {
        ParamSchema::Integer {
            description: Some(description.into()),
        }
    }

    pub fn number() -> Self {
        ParamSchema::Number { description: None }
    }

    pub fn boolean() -> Self {
        ParamSchema::Boolean { description: None }
    }

    pub fn array(items: ParamSchema) -> Self {
        ParamSchema::Array {
            items: Box::new(items),
            description: None,
        }
    }

    pub fn array_with(items: ParamSchema, description: impl Into<String>) -> Self {
        ParamSchema::Array {
            items: Box::new(items),
            description: Some(description.into()),
        }
    }

    pub fn object(properties: Vec<(String, ParamSchema)>, required: &[&str]) -> Self {
        ParamSchema::Object {
            properties,
            required: required.iter().map(|s| s.to_string()).collect(),
            description: None,
        }
    }

    pub fn open_object(description: impl Into<String>) -> Self {
        ParamSchema::OpenObject {
            description: Some(description.into()),
        }
    }

    pub fn any_of(options: Vec<ParamSchema>) -> Self {
        ParamSchema::AnyOf(options)
    }

    /// Renders the schema as JSON Schema for the wire.
    pub fn to_json(&self) -> Value {
        fn with_description(mut node: Map<String, Value>, description: &Option<String>) -> Value {
            if let Some(text) = description {
                node.insert("description".into(), json!(text));
            }
            Value::Object(node)
        }

        match self {
            ParamSchema::String { description } => {
                let mut node = Map::new();
                node.insert("type".into(), json!("string"));
                with_description(node, description)
            }
            ParamSchema::Integer { description } => {
                let mut node = Map::new();
                node.insert("type".into(), json!("integer"));
                with_description(node, description)
            }
            ParamSchema::Number { description } => {
                let mut node = Map::new();
                node.insert("type".into(), json!("number"));
                with_description(node, description)
            }
            ParamSchema::Boolean { description } => {
                let mut node = Map::new();
                node.insert("type".into(), json!("boolean"));
                with_description(node, description)
            }
            ParamSchema::Null => json!({ "type": "null" }),
            ParamSchema::Array { items, description } => {
                let mut node = Map::new();
                node.insert("type".into(), json!("array"));
                node.insert("items".into(), items.to_json());
                with_description(node, description)
            }
            ParamSchema::Object {
                properties,
                required,
                description,
            } => {
                let mut props = Map::new();
                for (name, schema) in properties {
                    props.insert(name.clone(), schema.to_json());
                }
                let mut node = Map::new();
                node.insert("type".into(), json!("object"));
                node.insert("properties".into(), Value::Object(props));
                if !required.is_empty() {
                    node.insert("required".into(), json!(required));
                }
                node.insert("additionalProperties".into(), json!(false));
                with_description(node, description)
            }
            ParamSchema::OpenObject { description } => {
                let mut node = Map::new();
                node.insert("type".into(), json!("object"));
                node.insert("additionalProperties".into(), json!(true));
                with_description(node, description)
            }
            ParamSchema::AnyOf(options) => {
                json!({ "anyOf": options.iter().map(|s| s.to_json()).collect::<Vec<_>>() })
            }
        }
    }

    /// Validates `value` against this schema. Strict: no cross-type
    /// coercion, so a string-typed numeric identifier is a violation
    /// rather than something to quietly fix up.
    pub fn validate(&self, value: &Value, path: &str) -> Result<(), SchemaViolation> {
        match self {
            ParamSchema::String { .. } => {
                if value.is_string() {
                    Ok(())
                } else {
                    Err(SchemaViolation::expected(path, "string", value))
                }
            }
            ParamSchema::Integer { .. } => {
                if value.is_i64() || value.is_u64() {
                    Ok(())
                } else {
                    Err(SchemaViolation::expected(path, "integer", value))
                }
            }
            ParamSchema::Number { .. } => {
                if value.is_number() {
                    Ok(())
                } else {
                    Err(SchemaViolation::expected(path, "number", value))
                }
            }
            ParamSchema::Boolean { .. } => {
                if value.is_boolean() {
                    Ok(())
                } else {
                    Err(SchemaViolation::expected(path, "boolean", value))
                }
            }
            ParamSchema::Null => {
                if value.is_null() {
                    Ok(())
                } else {
                    Err(SchemaViolation::expected(path, "null", value))
                }
            }
            ParamSchema::Array { items, .. } => {
                let Some(elements) = value.as_array() else {
                    return Err(SchemaViolation::expected(path, "array", value));
                };
                for (index, element) in elements.iter().enumerate() {
                    items.validate(element, &format!("{path}[{index}]"))?;
                }
                Ok(())
            }
            ParamSchema::Object {
                properties,
                required,
                ..
            } => {
                let Some(map) = value.as_object() else {
                    return Err(SchemaViolation::expected(path, "object", value));
                };
                for name in required {
                    if !map.contains_key(name) {
                        return Err(SchemaViolation::missing(path, name));
                    }
                }
                for (name, entry) in map {
                    let child_path = if path.is_empty() {
                        name.clone()
                    } else {
                        format!("{path}.{name}")
                    };
                    match properties.iter().find(|(n, _)| n == name) {
                        Some((_, schema)) => schema.validate(entry, &child_path)?,
                        None => return Err(SchemaViolation::unknown(&child_path)),
                    }
                }
                Ok(())
            }
            ParamSchema::OpenObject { .. } => {
                if value.is_object() {
                    Ok(())
                } else {
                    Err(SchemaViolation::expected(path, "object", value))
                }
            }
            ParamSchema::AnyOf(options) => {
                for option in options {
                    if option.validate(value, path).is_ok() {
                        return Ok(());
                    }
                }
                Err(SchemaViolation::expected(path, "one of the allowed forms", value))
            }
        }
    }
}

/// A single schema violation with the path that failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaViolation(String);

impl SchemaViolation {
    fn expected(path: &str, wanted: &str, got: &Value) -> Self {
        let got = match got {
            Value::Null => "null".to_string(),
            Value::Bool(_) => "boolean".to_string(),
            Value::Number(_) => "number".to_string(),
            Value::String(_) => "string".to_string(),
            Value::Array(_) => "array".to_string(),
            Value::Object(_) => "object".to_string(),
        };
        let path = if path.is_empty() { "arguments" } else { path };
        Self(format!("'{path}' must be {wanted}, got {got}"))
    }

    fn missing(path: &str, name: &str) -> Self {
        if path.is_empty() {
            Self(format!("missing required argument '{name}'"))
        } else {
            Self(format!("'{path}' is missing required key '{name}'"))
        }
    }

    fn unknown(path: &str) -> Self {
        Self(format!("unexpected argument '{path}'"))
    }
}

impl std::fmt::Display for SchemaViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Walks an emitted JSON Schema and rejects any array node without an
/// explicit `items` schema.
pub fn assert_complete(schema: &Value) -> Result<(), String> {
    fn walk(node: &Value, path: &str) -> Result<(), String> {
        let Some(map) = node.as_object() else {
            return Ok(());
        };

        if map.get("type").and_then(Value::as_str) == Some("array") {
            match map.get("items") {
                Some(items) => walk(items, &format!("{path}.items"))?,
                None => return Err(format!("array node at '{path}' declares no item schema")),
            }
        }

        if let Some(props) = map.get("properties").and_then(Value::as_object) {
            for (name, child) in props {
                walk(child, &format!("{path}.{name}"))?;
            }
        }
        if let Some(options) = map.get("anyOf").and_then(Value::as_array) {
            for (index, option) in options.iter().enumerate() {
                walk(option, &format!("{path}.anyOf[{index}]"))?;
            }
        }
        Ok(())
    }

    walk(schema, "$")
}
