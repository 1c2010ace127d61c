//! JSON Schema generation and validation.
//!
//! A [`ShapeDescriptor`] is a type-erased handle on a Rust type that
//! derives [`schemars::JsonSchema`]. A [`SchemaGenerator`] turns it into a
//! [`JsonSchema`], either **strict** (every object schema forbids
//! additional properties) or **lenient** (left as generated). Tool
//! declarations use strict schemas; structured output uses lenient ones.
//!
//! Validation compiles a schema once into a [`SchemaValidator`] and
//! reports every [`Violation`] found in an instance, each tagged with the
//! dotted path of the offending field.
//!
//! ```rust
//! use chatloop::schema::{SchemaGenerator, SchemarsGenerator, ShapeDescriptor};
//!
//! #[derive(schemars::JsonSchema, serde::Deserialize)]
//! struct Person {
//!     name: String,
//!     age: u32,
//! }
//!
//! let schema = SchemarsGenerator
//!     .generate(&ShapeDescriptor::of::<Person>(), true)
//!     .unwrap();
//! assert_eq!(schema.as_value()["additionalProperties"], false);
//!
//! let violations = schema
//!     .validator()
//!     .unwrap()
//!     .violations(&serde_json::json!({"name": "Ana"}));
//! assert_eq!(violations[0].field, "age");
//! ```

use std::borrow::Cow;
use std::fmt;

use jsonschema::error::ValidationErrorKind;
use schemars::generate::SchemaSettings;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::LlmError;

/// A JSON Schema document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JsonSchema(Value);

impl JsonSchema {
    /// Wraps a raw JSON value.
    pub fn new(schema: Value) -> Self {
        Self(schema)
    }

    /// Returns the underlying JSON value.
    pub fn as_value(&self) -> &Value {
        &self.0
    }

    /// Consumes the schema, returning the JSON value.
    pub fn into_value(self) -> Value {
        self.0
    }

    /// Lenient schema for `T` from the default generator.
    pub fn from_type<T: schemars::JsonSchema>() -> Result<Self, LlmError> {
        SchemarsGenerator.generate(&ShapeDescriptor::of::<T>(), false)
    }

    /// Compiles the schema for repeated validation.
    ///
    /// Returns [`LlmError::InvalidRequest`] if the schema is malformed.
    pub fn validator(&self) -> Result<SchemaValidator, LlmError> {
        let inner = jsonschema::validator_for(&self.0)
            .map_err(|e| LlmError::InvalidRequest(format!("invalid JSON schema: {e}")))?;
        Ok(SchemaValidator { inner })
    }
}

/// A compiled [`JsonSchema`].
pub struct SchemaValidator {
    inner: jsonschema::Validator,
}

impl SchemaValidator {
    /// Returns every constraint `instance` breaks. Empty means valid.
    pub fn violations(&self, instance: &Value) -> Vec<Violation> {
        self.inner
            .iter_errors(instance)
            .map(|err| {
                let mut path: Vec<String> = err
                    .instance_path
                    .to_string()
                    .split('/')
                    .filter(|segment| !segment.is_empty())
                    .map(|segment| segment.replace("~1", "/").replace("~0", "~"))
                    .collect();
                if let ValidationErrorKind::Required { property } = &err.kind {
                    path.push(
                        property
                            .as_str()
                            .map_or_else(|| property.to_string(), str::to_owned),
                    );
                }
                Violation {
                    field: if path.is_empty() {
                        ROOT_FIELD.to_owned()
                    } else {
                        path.join(".")
                    },
                    message: err.to_string(),
                }
            })
            .collect()
    }

    /// `true` when `instance` satisfies the schema.
    pub fn is_valid(&self, instance: &Value) -> bool {
        self.inner.is_valid(instance)
    }
}

impl fmt::Debug for SchemaValidator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SchemaValidator").finish_non_exhaustive()
    }
}

/// Field label used when a violation concerns the whole instance.
pub const ROOT_FIELD: &str = "(root)";

/// One schema constraint broken by an instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    /// Dotted path of the offending field, or [`ROOT_FIELD`].
    pub field: String,
    /// The validator's description of the broken constraint.
    pub message: String,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// A type-erased handle on a data shape that can describe itself as a
/// JSON Schema.
#[derive(Clone, Copy)]
pub struct ShapeDescriptor {
    name: fn() -> Cow<'static, str>,
    root_schema: fn(SchemaSettings) -> schemars::Schema,
}

impl ShapeDescriptor {
    /// Describes `T`.
    pub fn of<T: schemars::JsonSchema>() -> Self {
        Self {
            name: T::schema_name,
            root_schema: root_schema_for::<T>,
        }
    }

    /// The shape's own name (the Rust type name unless renamed through
    /// `#[schemars(rename = "...")]`).
    pub fn name(&self) -> Cow<'static, str> {
        (self.name)()
    }

    /// Generates the raw schemars root schema with `settings`.
    pub fn root_schema(&self, settings: SchemaSettings) -> schemars::Schema {
        (self.root_schema)(settings)
    }
}

impl fmt::Debug for ShapeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ShapeDescriptor").field(&self.name()).finish()
    }
}

fn root_schema_for<T: schemars::JsonSchema>(settings: SchemaSettings) -> schemars::Schema {
    settings.into_generator().into_root_schema_for::<T>()
}

/// Produces JSON Schemas for data shapes.
///
/// Implementations must be pure: the same shape and mode always yield the
/// same schema.
pub trait SchemaGenerator: Send + Sync {
    /// Generates the schema of `shape`. In `strict` mode every object
    /// schema forbids additional properties.
    fn generate(&self, shape: &ShapeDescriptor, strict: bool) -> Result<JsonSchema, LlmError>;
}

/// The default [`SchemaGenerator`], backed by `schemars` (draft 2020-12).
#[derive(Debug, Clone, Copy, Default)]
pub struct SchemarsGenerator;

impl SchemaGenerator for SchemarsGenerator {
    fn generate(&self, shape: &ShapeDescriptor, strict: bool) -> Result<JsonSchema, LlmError> {
        let schema = shape.root_schema(SchemaSettings::draft2020_12());
        let mut value = serde_json::to_value(schema).map_err(|e| {
            LlmError::InvalidRequest(format!("cannot serialize schema for {}: {e}", shape.name()))
        })?;
        if let Some(root) = value.as_object_mut() {
            root.remove("$schema");
        }
        if strict {
            forbid_additional_properties(&mut value);
        }
        Ok(JsonSchema(value))
    }
}

/// Keywords whose value is a map from names to subschemas.
const SCHEMA_MAPS: &[&str] = &["properties", "patternProperties", "$defs", "definitions"];

/// Keywords whose value is a subschema or an array of subschemas.
const SCHEMA_SLOTS: &[&str] = &[
    "items",
    "prefixItems",
    "anyOf",
    "oneOf",
    "allOf",
    "not",
    "additionalProperties",
];

/// Sets `additionalProperties: false` on every object schema that does
/// not already say something about additional properties.
///
/// Only descends through schema positions, so property names and
/// annotation values (`default`, `examples`, `const`, `enum`) are left
/// untouched.
fn forbid_additional_properties(schema: &mut Value) {
    let Value::Object(map) = schema else {
        return;
    };
    let is_object_schema =
        map.get("type").and_then(Value::as_str) == Some("object") || map.contains_key("properties");
    if is_object_schema && !map.contains_key("additionalProperties") {
        map.insert("additionalProperties".into(), Value::Bool(false));
    }

    for keyword in SCHEMA_MAPS {
        if let Some(Value::Object(children)) = map.get_mut(*keyword) {
            children.values_mut().for_each(forbid_additional_properties);
        }
    }
    for keyword in SCHEMA_SLOTS {
        match map.get_mut(*keyword) {
            Some(Value::Array(children)) => children.iter_mut().for_each(forbid_additional_properties),
            Some(child @ Value::Object(_)) => forbid_additional_properties(child),
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use serde_json::json;

    #[derive(schemars::JsonSchema)]
    #[allow(dead_code)]
    struct Address {
        city: String,
        zip: Option<String>,
    }

    #[derive(schemars::JsonSchema)]
    #[allow(dead_code)]
    struct Customer {
        name: String,
        #[schemars(range(min = 18))]
        age: u32,
        address: Address,
        tags: HashMap<String, String>,
    }

    #[test]
    fn test_shape_name() {
        assert_eq!(ShapeDescriptor::of::<Customer>().name(), "Customer");
    }

    #[test]
    fn test_lenient_leaves_additional_properties_open() {
        let schema = SchemarsGenerator
            .generate(&ShapeDescriptor::of::<Address>(), false)
            .unwrap();
        let value = schema.as_value();
        assert!(value.get("additionalProperties").is_none());
        assert!(value.get("$schema").is_none());
        assert_eq!(value["required"], json!(["city"]));
    }

    #[test]
    fn test_strict_closes_nested_objects_but_not_maps() {
        let schema = SchemarsGenerator
            .generate(&ShapeDescriptor::of::<Customer>(), true)
            .unwrap();
        let value = schema.as_value();
        assert_eq!(value["additionalProperties"], false);
        assert_eq!(value["$defs"]["Address"]["additionalProperties"], false);
        // Maps describe their values through additionalProperties already.
        assert_eq!(
            value["properties"]["tags"]["additionalProperties"]["type"],
            "string"
        );
    }

    #[test]
    fn test_violations_name_missing_field() {
        let validator = JsonSchema::from_type::<Customer>().unwrap().validator().unwrap();
        let violations = validator.violations(&json!({
            "name": "Ana",
            "age": 30,
            "tags": {}
        }));
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].field, "address");
        assert!(violations[0].message.contains("address"));
    }

    #[test]
    fn test_violations_carry_nested_path_and_range() {
        let validator = JsonSchema::from_type::<Customer>().unwrap().validator().unwrap();
        let violations = validator.violations(&json!({
            "name": "Ana",
            "age": 12,
            "address": {"city": 7},
            "tags": {}
        }));
        let fields: Vec<&str> = violations.iter().map(|v| v.field.as_str()).collect();
        assert!(fields.contains(&"age"), "{fields:?}");
        assert!(fields.contains(&"address.city"), "{fields:?}");
    }

    #[test]
    fn test_root_violation() {
        let validator = JsonSchema::new(json!({"type": "object"})).validator().unwrap();
        let violations = validator.violations(&json!([1, 2]));
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].field, ROOT_FIELD);
        assert!(!validator.is_valid(&json!(3)));
        assert!(validator.is_valid(&json!({})));
    }

    #[test]
    fn test_malformed_schema_is_invalid_request() {
        let err = JsonSchema::new(json!({"type": "not-a-type"}))
            .validator()
            .unwrap_err();
        assert!(matches!(err, LlmError::InvalidRequest(_)));
    }

    #[test]
    fn test_violation_display() {
        let v = Violation {
            field: "age".into(),
            message: "\"age\" is a required property".into(),
        };
        assert_eq!(v.to_string(), "age: \"age\" is a required property");
    }

    #[test]
    fn test_schema_serializes_transparently() {
        let schema = JsonSchema::new(json!({"type": "string"}));
        assert_eq!(serde_json::to_value(&schema).unwrap(), json!({"type": "string"}));
    }

    #[derive(schemars::JsonSchema)]
    #[allow(dead_code)]
    struct Query {
        properties: Vec<String>,
        filter: Address,
    }

    #[test]
    fn test_strict_leaves_property_names_alone() {
        let schema = SchemarsGenerator
            .generate(&ShapeDescriptor::of::<Query>(), true)
            .unwrap();
        let value = schema.as_value();

        assert_eq!(value["additionalProperties"], false);
        let props = value["properties"].as_object().unwrap();
        let mut names: Vec<&str> = props.keys().map(String::as_str).collect();
        names.sort_unstable();
        assert_eq!(names, vec!["filter", "properties"]);
        assert_eq!(props["properties"]["type"], "array");

        let address = &value["$defs"]["Address"];
        assert_eq!(address["additionalProperties"], false);
        let address_props = address["properties"].as_object().unwrap();
        assert!(!address_props.contains_key("additionalProperties"));
    }

    #[test]
    fn test_strict_skips_annotation_values() {
        let mut value = json!({
            "type": "object",
            "properties": {
                "opts": {
                    "type": "object",
                    "properties": {"level": {"type": "integer"}},
                    "default": {"properties": {"level": 1}},
                    "examples": [{"type": "object"}]
                },
                "mode": {"const": {"type": "object"}},
                "choice": {"anyOf": [{"type": "object"}, {"type": "null"}]}
            }
        });
        forbid_additional_properties(&mut value);

        assert_eq!(value["additionalProperties"], false);
        let opts = &value["properties"]["opts"];
        assert_eq!(opts["additionalProperties"], false);
        assert_eq!(opts["default"], json!({"properties": {"level": 1}}));
        assert_eq!(opts["examples"], json!([{"type": "object"}]));
        assert_eq!(value["properties"]["mode"]["const"], json!({"type": "object"}));
        assert_eq!(
            value["properties"]["choice"]["anyOf"][0]["additionalProperties"],
            false
        );
    }
}
