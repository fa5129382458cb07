//! Schema - Define type schemas for resources
//!
//! Providers define a schema for each resource type and data source,
//! enabling validation of configuration before any remote call is made and
//! driving the differ (force-new, computed, case-insensitive attributes).

use std::collections::HashMap;
use std::fmt;

use regex::Regex;

use crate::resource::Value;

/// Attribute type
#[derive(Debug, Clone)]
pub enum AttributeType {
    /// String
    String,
    /// Integer
    Int,
    /// Boolean
    Bool,
    /// Enum (list of allowed values, exact match)
    Enum(Vec<String>),
    /// String restricted to a set of values, optionally ignoring case
    StringIn {
        values: Vec<String>,
        ignore_case: bool,
    },
    /// String that must match a regular expression
    StringMatch {
        pattern: String,
        message: String,
    },
    /// Custom type (with validation function)
    Custom {
        name: String,
        base: Box<AttributeType>,
        validate: fn(&Value) -> Result<(), String>,
    },
    /// List
    List(Box<AttributeType>),
    /// Map
    Map(Box<AttributeType>),
    /// Nested block: a list of maps, each validated against the inner attributes
    Block(HashMap<String, AttributeSchema>),
}

impl AttributeType {
    /// Check if a value conforms to this type
    pub fn validate(&self, value: &Value) -> Result<(), TypeError> {
        // References resolve at apply time; their targets are validated then
        if let Value::ResourceRef(_, _) = value {
            return Ok(());
        }

        match (self, value) {
            (AttributeType::String, Value::String(_)) => Ok(()),
            (AttributeType::Int, Value::Int(_)) => Ok(()),
            (AttributeType::Bool, Value::Bool(_)) => Ok(()),

            (AttributeType::Enum(variants), Value::String(s)) => {
                if variants.iter().any(|v| v == s) {
                    Ok(())
                } else {
                    Err(TypeError::InvalidEnumVariant {
                        value: s.clone(),
                        expected: variants.clone(),
                    })
                }
            }

            (
                AttributeType::StringIn {
                    values,
                    ignore_case,
                },
                Value::String(s),
            ) => {
                let found = values.iter().any(|v| {
                    if *ignore_case {
                        v.eq_ignore_ascii_case(s)
                    } else {
                        v == s
                    }
                });
                if found {
                    Ok(())
                } else {
                    Err(TypeError::InvalidEnumVariant {
                        value: s.clone(),
                        expected: values.clone(),
                    })
                }
            }

            (AttributeType::StringMatch { pattern, message }, Value::String(s)) => {
                let re = Regex::new(pattern).map_err(|e| TypeError::ValidationFailed {
                    message: format!("invalid pattern {:?}: {}", pattern, e),
                })?;
                if re.is_match(s) {
                    Ok(())
                } else {
                    Err(TypeError::ValidationFailed {
                        message: message.clone(),
                    })
                }
            }

            (AttributeType::Custom { validate, base, .. }, v) => {
                base.validate(v)?;
                validate(v).map_err(|msg| TypeError::ValidationFailed { message: msg })
            }

            (AttributeType::List(inner), Value::List(items)) => {
                for (i, item) in items.iter().enumerate() {
                    inner.validate(item).map_err(|e| TypeError::ListItemError {
                        index: i,
                        inner: Box::new(e),
                    })?;
                }
                Ok(())
            }

            (AttributeType::Map(inner), Value::Map(map)) => {
                for (k, v) in map {
                    inner.validate(v).map_err(|e| TypeError::MapValueError {
                        key: k.clone(),
                        inner: Box::new(e),
                    })?;
                }
                Ok(())
            }

            (AttributeType::Block(attributes), Value::List(items)) => {
                for (i, item) in items.iter().enumerate() {
                    let Value::Map(fields) = item else {
                        return Err(TypeError::ListItemError {
                            index: i,
                            inner: Box::new(TypeError::TypeMismatch {
                                expected: "Map".to_string(),
                                got: item.type_name(),
                            }),
                        });
                    };
                    if let Err(mut errors) = validate_attributes(attributes, fields) {
                        return Err(TypeError::ListItemError {
                            index: i,
                            inner: Box::new(errors.remove(0)),
                        });
                    }
                }
                Ok(())
            }

            _ => Err(TypeError::TypeMismatch {
                expected: self.type_name(),
                got: value.type_name(),
            }),
        }
    }

    fn type_name(&self) -> String {
        match self {
            AttributeType::String => "String".to_string(),
            AttributeType::Int => "Int".to_string(),
            AttributeType::Bool => "Bool".to_string(),
            AttributeType::Enum(variants) => format!("Enum({})", variants.join(" | ")),
            AttributeType::StringIn { values, .. } => format!("Enum({})", values.join(" | ")),
            AttributeType::StringMatch { .. } => "String".to_string(),
            AttributeType::Custom { name, .. } => name.clone(),
            AttributeType::List(inner) => format!("List<{}>", inner.type_name()),
            AttributeType::Map(inner) => format!("Map<{}>", inner.type_name()),
            AttributeType::Block(_) => "Block".to_string(),
        }
    }
}

impl fmt::Display for AttributeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.type_name())
    }
}

/// Type error
#[derive(Debug, Clone, thiserror::Error)]
pub enum TypeError {
    #[error("Type mismatch: expected {expected}, got {got}")]
    TypeMismatch { expected: String, got: String },

    #[error("Invalid value '{value}', expected one of: {}", expected.join(", "))]
    InvalidEnumVariant {
        value: String,
        expected: Vec<String>,
    },

    #[error("Validation failed: {message}")]
    ValidationFailed { message: String },

    #[error("Required attribute '{name}' is missing")]
    MissingRequired { name: String },

    #[error("Unknown attribute '{name}'")]
    UnknownAttribute { name: String },

    #[error("Attribute '{name}' is computed and cannot be set")]
    ComputedAttribute { name: String },

    #[error("Attribute '{name}' allows at most {max} item(s), got {got}")]
    TooManyItems { name: String, max: usize, got: usize },

    #[error("'{name}': {inner}")]
    AttributeError { name: String, inner: Box<TypeError> },

    #[error("List item at index {index}: {inner}")]
    ListItemError { index: usize, inner: Box<TypeError> },

    #[error("Map value for key '{key}': {inner}")]
    MapValueError { key: String, inner: Box<TypeError> },
}

impl Value {
    fn type_name(&self) -> String {
        match self {
            Value::String(_) => "String".to_string(),
            Value::Int(_) => "Int".to_string(),
            Value::Bool(_) => "Bool".to_string(),
            Value::List(_) => "List".to_string(),
            Value::Map(_) => "Map".to_string(),
            Value::ResourceRef(binding, attr) => format!("ResourceRef({}.{})", binding, attr),
        }
    }
}

/// Attribute schema
#[derive(Debug, Clone)]
pub struct AttributeSchema {
    pub name: String,
    pub attr_type: AttributeType,
    pub required: bool,
    /// Set by the remote API; configuration may not supply it unless also optional
    pub computed: bool,
    /// Changing this attribute requires replacing the resource
    pub force_new: bool,
    /// Value is a secret and is masked in plan output
    pub sensitive: bool,
    /// Compare configured and observed values ignoring ASCII case
    pub case_insensitive: bool,
    /// Upper bound on the number of items in a list or block
    pub max_items: Option<usize>,
    /// Normalisation applied to string values before they are compared or stored
    pub state_func: Option<fn(&str) -> String>,
    pub default: Option<Value>,
    pub description: Option<String>,
    optional: bool,
}

impl AttributeSchema {
    pub fn new(name: impl Into<String>, attr_type: AttributeType) -> Self {
        Self {
            name: name.into(),
            attr_type,
            required: false,
            computed: false,
            force_new: false,
            sensitive: false,
            case_insensitive: false,
            max_items: None,
            state_func: None,
            default: None,
            description: None,
            optional: true,
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self.optional = false;
        self
    }

    /// Computed only: the configuration can never set it
    pub fn computed(mut self) -> Self {
        self.computed = true;
        self.optional = false;
        self
    }

    /// Optional and computed: the remote API fills it in when absent
    pub fn optional_computed(mut self) -> Self {
        self.computed = true;
        self.optional = true;
        self
    }

    pub fn force_new(mut self) -> Self {
        self.force_new = true;
        self
    }

    pub fn sensitive(mut self) -> Self {
        self.sensitive = true;
        self
    }

    pub fn case_insensitive(mut self) -> Self {
        self.case_insensitive = true;
        self
    }

    pub fn max_items(mut self, max: usize) -> Self {
        self.max_items = Some(max);
        self
    }

    pub fn with_state_func(mut self, f: fn(&str) -> String) -> Self {
        self.state_func = Some(f);
        self
    }

    pub fn with_default(mut self, value: Value) -> Self {
        self.default = Some(value);
        self
    }

    pub fn with_description(mut self, desc: impl Into<String>) -> Self {
        self.description = Some(desc.into());
        self
    }

    /// Whether the configuration may set this attribute
    pub fn is_settable(&self) -> bool {
        self.required || self.optional
    }

    /// Apply the state function to a value (recursing into lists)
    pub fn normalize(&self, value: &Value) -> Value {
        match (self.state_func, value) {
            (Some(f), Value::String(s)) => Value::String(f(s)),
            (Some(_), Value::List(items)) => {
                Value::List(items.iter().map(|v| self.normalize(v)).collect())
            }
            _ => value.clone(),
        }
    }

    /// Whether two values are equal under this attribute's comparison rules
    pub fn values_equal(&self, desired: &Value, current: &Value) -> bool {
        let desired = self.normalize(desired);
        let current = self.normalize(current);
        match (&desired, &current) {
            (Value::String(a), Value::String(b)) if self.case_insensitive => {
                a.eq_ignore_ascii_case(b)
            }
            (Value::List(a), Value::List(b)) => {
                if let AttributeType::Block(fields) = &self.attr_type {
                    a.len() == b.len()
                        && a.iter().zip(b).all(|(x, y)| block_items_equal(fields, x, y))
                } else {
                    a == b
                }
            }
            _ => desired == current,
        }
    }
}

/// Compare two block items, only looking at fields present in the desired item
fn block_items_equal(
    fields: &HashMap<String, AttributeSchema>,
    desired: &Value,
    current: &Value,
) -> bool {
    match (desired, current) {
        (Value::Map(d), Value::Map(c)) => {
            d.iter()
                .all(|(key, dv)| match (fields.get(key), c.get(key)) {
                    (Some(schema), Some(cv)) => schema.values_equal(dv, cv),
                    (None, Some(cv)) => dv == cv,
                    (_, None) => false,
                })
        }
        _ => desired == current,
    }
}

fn apply_attribute_defaults(
    schemas: &HashMap<String, AttributeSchema>,
    attributes: &mut HashMap<String, Value>,
) {
    for (name, schema) in schemas {
        match attributes.get_mut(name) {
            None => {
                if let Some(default) = &schema.default {
                    attributes.insert(name.clone(), default.clone());
                }
            }
            Some(value) => {
                let AttributeType::Block(inner) = &schema.attr_type else {
                    continue;
                };
                match value {
                    Value::List(items) => {
                        for item in items {
                            if let Value::Map(fields) = item {
                                apply_attribute_defaults(inner, fields);
                            }
                        }
                    }
                    Value::Map(fields) => apply_attribute_defaults(inner, fields),
                    _ => {}
                }
            }
        }
    }
}

/// Validate a set of attributes against attribute schemas
fn validate_attributes(
    schemas: &HashMap<String, AttributeSchema>,
    attributes: &HashMap<String, Value>,
) -> Result<(), Vec<TypeError>> {
    let mut errors = Vec::new();

    // Check required attributes
    let mut names: Vec<&String> = schemas.keys().collect();
    names.sort();
    for name in names {
        let schema = &schemas[name];
        if schema.required && !attributes.contains_key(name) && schema.default.is_none() {
            errors.push(TypeError::MissingRequired { name: name.clone() });
        }
    }

    // Type check each attribute
    let mut keys: Vec<&String> = attributes.keys().collect();
    keys.sort();
    for name in keys {
        let value = &attributes[name];
        let Some(schema) = schemas.get(name) else {
            errors.push(TypeError::UnknownAttribute { name: name.clone() });
            continue;
        };

        if !schema.is_settable() {
            errors.push(TypeError::ComputedAttribute { name: name.clone() });
            continue;
        }

        if let (Some(max), Value::List(items)) = (schema.max_items, value)
            && items.len() > max
        {
            errors.push(TypeError::TooManyItems {
                name: name.clone(),
                max,
                got: items.len(),
            });
            continue;
        }

        if let Err(e) = schema.attr_type.validate(value) {
            errors.push(TypeError::AttributeError {
                name: name.clone(),
                inner: Box::new(e),
            });
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Resource schema
#[derive(Debug, Clone)]
pub struct ResourceSchema {
    pub resource_type: String,
    pub attributes: HashMap<String, AttributeSchema>,
    pub description: Option<String>,
    pub deprecation_message: Option<String>,
}

impl ResourceSchema {
    pub fn new(resource_type: impl Into<String>) -> Self {
        Self {
            resource_type: resource_type.into(),
            attributes: HashMap::new(),
            description: None,
            deprecation_message: None,
        }
    }

    pub fn attribute(mut self, schema: AttributeSchema) -> Self {
        self.attributes.insert(schema.name.clone(), schema);
        self
    }

    /// Add several attributes at once (e.g., a shared base schema)
    pub fn attributes(mut self, schemas: impl IntoIterator<Item = AttributeSchema>) -> Self {
        for schema in schemas {
            self.attributes.insert(schema.name.clone(), schema);
        }
        self
    }

    pub fn with_description(mut self, desc: impl Into<String>) -> Self {
        self.description = Some(desc.into());
        self
    }

    pub fn with_deprecation(mut self, message: impl Into<String>) -> Self {
        self.deprecation_message = Some(message.into());
        self
    }

    /// Validate resource attributes
    pub fn validate(&self, attributes: &HashMap<String, Value>) -> Result<(), Vec<TypeError>> {
        validate_attributes(&self.attributes, attributes)
    }

    /// Fill in default values for attributes not present in the configuration,
    /// including attributes of nested blocks
    pub fn apply_defaults(&self, attributes: &mut HashMap<String, Value>) {
        apply_attribute_defaults(&self.attributes, attributes);
    }

    pub fn is_force_new(&self, name: &str) -> bool {
        self.attributes.get(name).is_some_and(|a| a.force_new)
    }

    pub fn is_sensitive(&self, name: &str) -> bool {
        self.attributes.get(name).is_some_and(|a| a.sensitive)
    }
}

/// Helper functions for common types
pub mod types {
    use super::*;

    /// Positive integer type
    pub fn positive_int() -> AttributeType {
        AttributeType::Custom {
            name: "PositiveInt".to_string(),
            base: Box::new(AttributeType::Int),
            validate: |value| {
                if let Value::Int(n) = value {
                    if *n > 0 {
                        Ok(())
                    } else {
                        Err("Value must be positive".to_string())
                    }
                } else {
                    Err("Expected integer".to_string())
                }
            },
        }
    }

    /// CIDR block type (e.g., "10.0.0.0/16")
    pub fn cidr() -> AttributeType {
        AttributeType::Custom {
            name: "Cidr".to_string(),
            base: Box::new(AttributeType::String),
            validate: |value| {
                if let Value::String(s) = value {
                    validate_cidr(s)
                } else {
                    Err("Expected string".to_string())
                }
            },
        }
    }

    /// String restricted to the given values
    pub fn string_in(values: &[&str], ignore_case: bool) -> AttributeType {
        AttributeType::StringIn {
            values: values.iter().map(|v| v.to_string()).collect(),
            ignore_case,
        }
    }

    /// String matching a regular expression
    pub fn string_match(pattern: &str, message: &str) -> AttributeType {
        AttributeType::StringMatch {
            pattern: pattern.to_string(),
            message: message.to_string(),
        }
    }

    pub fn string_list() -> AttributeType {
        AttributeType::List(Box::new(AttributeType::String))
    }

    pub fn string_map() -> AttributeType {
        AttributeType::Map(Box::new(AttributeType::String))
    }

    /// Nested block type from its field schemas
    pub fn block(fields: impl IntoIterator<Item = AttributeSchema>) -> AttributeType {
        AttributeType::Block(
            fields
                .into_iter()
                .map(|schema| (schema.name.clone(), schema))
                .collect(),
        )
    }
}

/// Validate CIDR block format (e.g., "10.0.0.0/16")
pub fn validate_cidr(cidr: &str) -> Result<(), String> {
    let parts: Vec<&str> = cidr.split('/').collect();
    if parts.len() != 2 {
        return Err(format!(
            "Invalid CIDR format '{}': expected IP/prefix",
            cidr
        ));
    }

    let ip = parts[0];
    let prefix = parts[1];

    let octets: Vec<&str> = ip.split('.').collect();
    if octets.len() != 4 {
        return Err(format!("Invalid IP address '{}': expected 4 octets", ip));
    }

    for octet in &octets {
        if octet.parse::<u8>().is_err() {
            return Err(format!(
                "Invalid octet '{}' in IP address: must be 0-255",
                octet
            ));
        }
    }

    match prefix.parse::<u8>() {
        Ok(p) if p <= 32 => Ok(()),
        Ok(p) => Err(format!("Invalid prefix length '{}': must be 0-32", p)),
        Err(_) => Err(format!(
            "Invalid prefix length '{}': must be a number",
            prefix
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lowercase(s: &str) -> String {
        s.to_lowercase()
    }

    #[test]
    fn validate_string_type() {
        let t = AttributeType::String;
        assert!(t.validate(&Value::String("hello".to_string())).is_ok());
        assert!(t.validate(&Value::Int(42)).is_err());
        assert!(
            t.validate(&Value::ResourceRef("a.b".to_string(), "id".to_string()))
                .is_ok()
        );
    }

    #[test]
    fn validate_string_in_ignoring_case() {
        let t = types::string_in(&["private", "public"], true);
        assert!(t.validate(&Value::string("PRIVATE")).is_ok());
        assert!(t.validate(&Value::string("Public")).is_ok());
        assert!(t.validate(&Value::string("shared")).is_err());

        let strict = types::string_in(&["Basic", "Free"], false);
        assert!(strict.validate(&Value::string("basic")).is_err());
    }

    #[test]
    fn validate_string_match() {
        let t = types::string_match("^[a-z]+$", "lowercase letters only");
        assert!(t.validate(&Value::string("abc")).is_ok());
        match t.validate(&Value::string("Abc")) {
            Err(TypeError::ValidationFailed { message }) => {
                assert_eq!(message, "lowercase letters only")
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn validate_positive_int() {
        let t = types::positive_int();
        assert!(t.validate(&Value::Int(1)).is_ok());
        assert!(t.validate(&Value::Int(0)).is_err());
        assert!(t.validate(&Value::string("1")).is_err());
    }

    #[test]
    fn validate_resource_schema() {
        let schema = ResourceSchema::new("resource")
            .attribute(AttributeSchema::new("name", AttributeType::String).required())
            .attribute(AttributeSchema::new("count", types::positive_int()))
            .attribute(AttributeSchema::new("enabled", AttributeType::Bool));

        let mut attrs = HashMap::new();
        attrs.insert("name".to_string(), Value::String("my-resource".to_string()));
        attrs.insert("count".to_string(), Value::Int(5));
        attrs.insert("enabled".to_string(), Value::Bool(true));

        assert!(schema.validate(&attrs).is_ok());
    }

    #[test]
    fn missing_required_and_unknown_attributes() {
        let schema = ResourceSchema::new("plan")
            .attribute(AttributeSchema::new("name", AttributeType::String).required());

        let mut attrs = HashMap::new();
        attrs.insert("colour".to_string(), Value::string("blue"));
        let errors = schema.validate(&attrs).unwrap_err();
        assert_eq!(errors.len(), 2);
        assert!(matches!(errors[0], TypeError::MissingRequired { .. }));
        assert!(matches!(errors[1], TypeError::UnknownAttribute { .. }));
    }

    #[test]
    fn computed_attributes_cannot_be_configured() {
        let schema = ResourceSchema::new("plan").attribute(
            AttributeSchema::new("virtual_network_ids", types::string_list()).computed(),
        );
        let mut attrs = HashMap::new();
        attrs.insert("virtual_network_ids".to_string(), Value::List(vec![]));
        let errors = schema.validate(&attrs).unwrap_err();
        assert!(matches!(errors[0], TypeError::ComputedAttribute { .. }));
    }

    #[test]
    fn block_validation_checks_max_items_and_fields() {
        let schema = ResourceSchema::new("account").attribute(
            AttributeSchema::new(
                "sku",
                types::block([AttributeSchema::new(
                    "name",
                    types::string_in(&["Basic", "Free"], true),
                )
                .required()]),
            )
            .required()
            .max_items(1),
        );

        let mut attrs = HashMap::new();
        attrs.insert("sku".to_string(), Value::block([("name", Value::string("free"))]));
        assert!(schema.validate(&attrs).is_ok());

        attrs.insert(
            "sku".to_string(),
            Value::block([("name", Value::string("Premium"))]),
        );
        assert!(schema.validate(&attrs).is_err());

        let two = Value::List(vec![
            Value::Map(HashMap::from([("name".to_string(), Value::string("Basic"))])),
            Value::Map(HashMap::from([("name".to_string(), Value::string("Free"))])),
        ]);
        attrs.insert("sku".to_string(), two);
        let errors = schema.validate(&attrs).unwrap_err();
        assert!(matches!(errors[0], TypeError::TooManyItems { max: 1, got: 2, .. }));
    }

    #[test]
    fn defaults_fill_missing_attributes() {
        let schema = ResourceSchema::new("connection").attribute(
            AttributeSchema::new("peering", AttributeType::String)
                .with_default(Value::string("PRIVATE")),
        );
        let mut attrs = HashMap::new();
        schema.apply_defaults(&mut attrs);
        assert_eq!(attrs["peering"], Value::string("PRIVATE"));

        attrs.insert("peering".to_string(), Value::string("public"));
        schema.apply_defaults(&mut attrs);
        assert_eq!(attrs["peering"], Value::string("public"));
    }

    #[test]
    fn defaults_fill_block_items() {
        let schema = ResourceSchema::new("account").attribute(AttributeSchema::new(
            "sku",
            types::block([AttributeSchema::new("name", AttributeType::String)
                .with_default(Value::string("Basic"))]),
        ));
        let mut attrs = HashMap::from([(
            "sku".to_string(),
            Value::List(vec![
                Value::Map(HashMap::new()),
                Value::Map(HashMap::from([("name".to_string(), Value::string("Free"))])),
            ]),
        )]);
        schema.apply_defaults(&mut attrs);

        let Value::List(items) = &attrs["sku"] else {
            panic!("sku should stay a list");
        };
        assert_eq!(items[0].as_map().unwrap()["name"], Value::string("Basic"));
        assert_eq!(items[1].as_map().unwrap()["name"], Value::string("Free"));
    }

    #[test]
    fn values_equal_respects_case_and_state_func() {
        let peering = AttributeSchema::new("peering", AttributeType::String).case_insensitive();
        assert!(peering.values_equal(&Value::string("private"), &Value::string("PRIVATE")));

        let location =
            AttributeSchema::new("location", AttributeType::String).with_state_func(lowercase);
        assert!(location.values_equal(&Value::string("WestEurope"), &Value::string("westeurope")));
        assert!(!location.values_equal(&Value::string("westus"), &Value::string("westeurope")));
    }

    #[test]
    fn block_comparison_uses_nested_rules() {
        let sku = AttributeSchema::new(
            "sku",
            types::block([AttributeSchema::new("name", AttributeType::String).case_insensitive()]),
        );
        assert!(sku.values_equal(
            &Value::block([("name", Value::string("basic"))]),
            &Value::block([("name", Value::string("Basic"))]),
        ));
    }

    #[test]
    fn validate_cidr_type() {
        let t = types::cidr();

        assert!(t.validate(&Value::String("10.0.0.0/16".to_string())).is_ok());
        assert!(t.validate(&Value::String("0.0.0.0/0".to_string())).is_ok());

        assert!(t.validate(&Value::String("10.0.0.0".to_string())).is_err());
        assert!(t.validate(&Value::String("10.0.0.0/33".to_string())).is_err());
        assert!(t.validate(&Value::String("10.0.0.256/16".to_string())).is_err());
        assert!(t.validate(&Value::Int(42)).is_err());
    }
}
