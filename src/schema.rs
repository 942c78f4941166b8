//! Field specifications, compiled schemas, and driver validation

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::driver::{Driver, FieldValue};
use crate::error::{RegistryError, Result};

/// Declared type of a schema field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    /// Non-empty string
    Str,
    Bool,
    Number,
    Object,
    Array,
    /// Callable field, sync or async
    Function,
    /// Accepts any value
    Any,
}

/// Presence requirement for a schema field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Presence {
    Optional,
    Required,
    Forbidden,
}

/// Tag marking a function field as asynchronous
pub const ASYNC_TAG: &str = "async";

/// Specification for a single driver field
#[derive(Clone, Debug)]
pub struct FieldSpec {
    ty: FieldType,
    presence: Presence,
    default: Option<FieldValue>,
    tags: Vec<String>,
}

impl FieldSpec {
    fn new(ty: FieldType) -> Self {
        Self {
            ty,
            presence: Presence::Optional,
            default: None,
            tags: Vec::new(),
        }
    }

    /// A non-empty string field
    pub fn string() -> Self {
        Self::new(FieldType::Str)
    }

    /// A boolean field
    pub fn boolean() -> Self {
        Self::new(FieldType::Bool)
    }

    /// A numeric field
    pub fn number() -> Self {
        Self::new(FieldType::Number)
    }

    /// A JSON object field
    pub fn object() -> Self {
        Self::new(FieldType::Object)
    }

    /// A JSON array field
    pub fn array() -> Self {
        Self::new(FieldType::Array)
    }

    /// A callable field
    pub fn function() -> Self {
        Self::new(FieldType::Function)
    }

    /// A field accepting any value
    pub fn any() -> Self {
        Self::new(FieldType::Any)
    }

    /// Mark the field required
    pub fn required(mut self) -> Self {
        self.presence = Presence::Required;
        self
    }

    /// Mark the field forbidden
    pub fn forbidden(mut self) -> Self {
        self.presence = Presence::Forbidden;
        self
    }

    /// Attach a default applied when the field is absent
    pub fn default_value(mut self, value: impl Into<FieldValue>) -> Self {
        self.default = Some(value.into());
        self
    }

    /// Attach a tag
    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    /// Declared type
    pub fn field_type(&self) -> FieldType {
        self.ty
    }

    /// Presence requirement
    pub fn presence(&self) -> Presence {
        self.presence
    }

    pub fn is_function_type(&self) -> bool {
        self.ty == FieldType::Function
    }

    pub fn is_required(&self) -> bool {
        self.presence == Presence::Required
    }

    pub fn is_forbidden(&self) -> bool {
        self.presence == Presence::Forbidden
    }

    pub fn has_default(&self) -> bool {
        self.default.is_some()
    }

    /// The default value, if any
    pub fn default(&self) -> Option<&FieldValue> {
        self.default.as_ref()
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }

    /// True when the field's calling convention is asynchronous: either the
    /// default is an async function or the field carries the `async` tag.
    pub fn is_async(&self) -> bool {
        matches!(self.default, Some(FieldValue::Async(_))) || self.has_tag(ASYNC_TAG)
    }

    fn check(&self, value: &FieldValue) -> std::result::Result<(), &'static str> {
        match self.ty {
            FieldType::Any => Ok(()),
            FieldType::Function => {
                if value.is_function() {
                    Ok(())
                } else {
                    Err("must be a function")
                }
            }
            FieldType::Str => match value.as_data() {
                Some(Value::String(s)) if s.is_empty() => Err("is not allowed to be empty"),
                Some(Value::String(_)) => Ok(()),
                _ => Err("must be a string"),
            },
            FieldType::Bool => match value.as_data() {
                Some(Value::Bool(_)) => Ok(()),
                _ => Err("must be a boolean"),
            },
            FieldType::Number => match value.as_data() {
                Some(Value::Number(_)) => Ok(()),
                _ => Err("must be a number"),
            },
            FieldType::Object => match value.as_data() {
                Some(Value::Object(_)) => Ok(()),
                _ => Err("must be an object"),
            },
            FieldType::Array => match value.as_data() {
                Some(Value::Array(_)) => Ok(()),
                _ => Err("must be an array"),
            },
        }
    }
}

/// Validation options passed through to the validation pipeline
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct ValidationOptions {
    /// Keep fields the schema does not declare instead of rejecting them
    #[serde(default)]
    pub allow_unknown: bool,

    /// Drop undeclared fields from the validated driver
    #[serde(default)]
    pub strip_unknown: bool,
}

/// A schema under construction: an ordered set of named field specs.
#[derive(Clone, Debug, Default)]
pub struct DriverSchema {
    fields: IndexMap<String, FieldSpec>,
}

impl DriverSchema {
    /// Create an empty schema
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a field, chaining
    pub fn field(mut self, name: impl Into<String>, spec: FieldSpec) -> Self {
        self.fields.insert(name.into(), spec);
        self
    }

    /// Compile the schema.
    ///
    /// Every compiled schema requires a string `id`; one is injected at the
    /// front of the field table when the declared schema lacks it.
    pub fn compile(mut self) -> CompiledSchema {
        if !self.fields.contains_key("id") {
            self.fields
                .shift_insert(0, "id".to_string(), FieldSpec::string().required());
        }
        CompiledSchema {
            fields: self.fields,
        }
    }
}

/// A compiled, introspectable schema. Immutable once built.
#[derive(Clone, Debug)]
pub struct CompiledSchema {
    fields: IndexMap<String, FieldSpec>,
}

impl CompiledSchema {
    /// Describe the schema: iterate field specs in declaration order
    pub fn fields(&self) -> impl Iterator<Item = (&str, &FieldSpec)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Look up a field spec by name
    pub fn get(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.get(name)
    }

    /// Validate a driver against this schema.
    ///
    /// Returns the validated driver: declared fields in schema order with
    /// defaults applied, followed by any retained unknown fields. The error
    /// names the first offending field and the reason.
    pub fn validate(&self, driver: Driver, options: &ValidationOptions) -> Result<Driver> {
        let mut validated = Driver::new();

        for (name, spec) in &self.fields {
            match driver.get(name) {
                Some(_) if spec.is_forbidden() => {
                    return Err(RegistryError::validation(name, "is not allowed"));
                }
                Some(value) => {
                    spec.check(value)
                        .map_err(|reason| RegistryError::validation(name, reason))?;
                    validated.set(name.clone(), value.clone());
                }
                None if spec.is_forbidden() => {}
                None => {
                    if let Some(default) = spec.default() {
                        validated.set(name.clone(), default.clone());
                    } else if spec.is_required() {
                        return Err(RegistryError::validation(name, "is required"));
                    }
                }
            }
        }

        for (name, value) in driver.fields() {
            if self.fields.contains_key(name) {
                continue;
            }
            if options.allow_unknown {
                validated.set(name.to_string(), value.clone());
            } else if !options.strip_unknown {
                return Err(RegistryError::validation(name, "is not allowed"));
            }
        }

        Ok(validated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_compile_injects_id() {
        let schema = DriverSchema::new()
            .field("name", FieldSpec::string())
            .compile();

        let id = schema.get("id").unwrap();
        assert_eq!(id.field_type(), FieldType::Str);
        assert!(id.is_required());

        // Injected id leads the field table
        let first = schema.fields().next().unwrap().0;
        assert_eq!(first, "id");
    }

    #[test]
    fn test_declared_id_is_kept() {
        let schema = DriverSchema::new()
            .field("name", FieldSpec::string())
            .field("id", FieldSpec::string().required().tag("primary"))
            .compile();

        assert!(schema.get("id").unwrap().has_tag("primary"));
        assert_eq!(schema.fields().count(), 2);
    }

    #[test]
    fn test_missing_required_field() {
        let schema = DriverSchema::new().compile();
        let err = schema
            .validate(Driver::new(), &ValidationOptions::default())
            .unwrap_err();
        assert_eq!(err.to_string(), "\"id\" is required");
    }

    #[test]
    fn test_empty_id_rejected() {
        let schema = DriverSchema::new().compile();
        let err = schema
            .validate(Driver::with_id(""), &ValidationOptions::default())
            .unwrap_err();
        assert_eq!(err.to_string(), "\"id\" is not allowed to be empty");
    }

    #[test]
    fn test_defaults_applied() {
        let schema = DriverSchema::new()
            .field("pooled", FieldSpec::boolean().default_value(json!(true)))
            .compile();

        let driver = schema
            .validate(Driver::with_id("pg"), &ValidationOptions::default())
            .unwrap();
        assert_eq!(driver.get("pooled").unwrap().as_data(), Some(&json!(true)));
    }

    #[test]
    fn test_forbidden_field_rejected() {
        let schema = DriverSchema::new()
            .field("internal", FieldSpec::any().default_value(json!(0)).forbidden())
            .compile();

        let err = schema
            .validate(
                Driver::with_id("pg").with("internal", json!(1)),
                &ValidationOptions::default(),
            )
            .unwrap_err();
        assert_eq!(err.to_string(), "\"internal\" is not allowed");

        // A forbidden field is never filled from its default either
        let clean = schema
            .validate(Driver::with_id("pg"), &ValidationOptions::default())
            .unwrap();
        assert!(!clean.contains("internal"));
    }

    #[test]
    fn test_type_mismatch_reason() {
        let schema = DriverSchema::new()
            .field("connect", FieldSpec::function())
            .compile();

        let err = schema
            .validate(
                Driver::with_id("pg").with("connect", json!("nope")),
                &ValidationOptions::default(),
            )
            .unwrap_err();
        assert_eq!(err.to_string(), "\"connect\" must be a function");
    }

    #[test]
    fn test_unknown_field_handling() {
        let schema = DriverSchema::new().compile();
        let driver = Driver::with_id("pg").with("extra", json!(1));

        let err = schema
            .validate(driver.clone(), &ValidationOptions::default())
            .unwrap_err();
        assert_eq!(err.to_string(), "\"extra\" is not allowed");

        let allowed = schema
            .validate(
                driver.clone(),
                &ValidationOptions {
                    allow_unknown: true,
                    ..Default::default()
                },
            )
            .unwrap();
        assert!(allowed.contains("extra"));

        let stripped = schema
            .validate(
                driver,
                &ValidationOptions {
                    strip_unknown: true,
                    ..Default::default()
                },
            )
            .unwrap();
        assert!(!stripped.contains("extra"));
    }

    #[test]
    fn test_async_detection() {
        assert!(FieldSpec::function().tag(ASYNC_TAG).is_async());
        assert!(!FieldSpec::function().is_async());

        let spec = FieldSpec::function()
            .default_value(FieldValue::async_fn(|_| async { Ok(json!(null)) }));
        assert!(spec.is_async());
    }
}
