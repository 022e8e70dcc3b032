//! Schema - Define type schemas for resources
//!
//! Providers describe the attributes each resource type accepts so that a
//! caller's declared attributes can be checked before any API call is made.

use std::collections::HashMap;
use std::fmt;

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
    /// Enum (list of allowed values)
    Enum(Vec<String>),
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
}

impl AttributeType {
    /// Check if a value conforms to this type
    pub fn validate(&self, value: &Value) -> Result<(), TypeError> {
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
            AttributeType::Custom { name, .. } => name.clone(),
            AttributeType::List(inner) => format!("List<{}>", inner.type_name()),
            AttributeType::Map(inner) => format!("Map<{}>", inner.type_name()),
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

    #[error("Invalid enum variant '{value}', expected one of: {}", expected.join(", "))]
    InvalidEnumVariant {
        value: String,
        expected: Vec<String>,
    },

    #[error("Validation failed: {message}")]
    ValidationFailed { message: String },

    #[error("Required attribute '{name}' is missing")]
    MissingRequired { name: String },

    #[error("Attribute '{name}' is computed and cannot be set")]
    ComputedAttribute { name: String },

    #[error("List item at index {index}: {inner}")]
    ListItemError { index: usize, inner: Box<TypeError> },

    #[error("Map value for key '{key}': {inner}")]
    MapValueError { key: String, inner: Box<TypeError> },
}

impl TypeError {
    /// Attach the attribute name to an error produced by a type check
    fn at(self, attribute: &str) -> Self {
        match self {
            TypeError::ValidationFailed { message } => TypeError::ValidationFailed {
                message: format!("{}: {}", attribute, message),
            },
            TypeError::TypeMismatch { expected, got } => TypeError::TypeMismatch {
                expected: format!("{} for '{}'", expected, attribute),
                got,
            },
            other => other,
        }
    }
}

impl Value {
    fn type_name(&self) -> String {
        match self {
            Value::String(_) => "String".to_string(),
            Value::Int(_) => "Int".to_string(),
            Value::Bool(_) => "Bool".to_string(),
            Value::List(_) => "List".to_string(),
            Value::Map(_) => "Map".to_string(),
        }
    }
}

/// Attribute schema
#[derive(Debug, Clone)]
pub struct AttributeSchema {
    pub name: String,
    pub attr_type: AttributeType,
    pub required: bool,
    /// Set by the provider only; callers may not supply it
    pub computed: bool,
    /// Changing the value requires replacing the resource
    pub force_new: bool,
    pub description: Option<String>,
    /// Provider-side property name (e.g., "vlan" -> "Vlan")
    pub provider_name: Option<String>,
}

impl AttributeSchema {
    pub fn new(name: impl Into<String>, attr_type: AttributeType) -> Self {
        Self {
            name: name.into(),
            attr_type,
            required: false,
            computed: false,
            force_new: false,
            description: None,
            provider_name: None,
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn computed(mut self) -> Self {
        self.computed = true;
        self
    }

    pub fn force_new(mut self) -> Self {
        self.force_new = true;
        self
    }

    pub fn with_description(mut self, desc: impl Into<String>) -> Self {
        self.description = Some(desc.into());
        self
    }

    pub fn with_provider_name(mut self, name: impl Into<String>) -> Self {
        self.provider_name = Some(name.into());
        self
    }
}

/// Resource schema
#[derive(Debug, Clone)]
pub struct ResourceSchema {
    pub resource_type: String,
    pub attributes: HashMap<String, AttributeSchema>,
    pub description: Option<String>,
}

impl ResourceSchema {
    pub fn new(resource_type: impl Into<String>) -> Self {
        Self {
            resource_type: resource_type.into(),
            attributes: HashMap::new(),
            description: None,
        }
    }

    pub fn attribute(mut self, schema: AttributeSchema) -> Self {
        self.attributes.insert(schema.name.clone(), schema);
        self
    }

    pub fn with_description(mut self, desc: impl Into<String>) -> Self {
        self.description = Some(desc.into());
        self
    }

    /// Names of attributes whose change forces replacement
    pub fn force_new_attributes(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self
            .attributes
            .values()
            .filter(|a| a.force_new)
            .map(|a| a.name.as_str())
            .collect();
        names.sort_unstable();
        names
    }

    /// Validate resource attributes
    pub fn validate(&self, attributes: &HashMap<String, Value>) -> Result<(), Vec<TypeError>> {
        let mut errors = Vec::new();

        // Check required attributes
        let mut required: Vec<&AttributeSchema> =
            self.attributes.values().filter(|s| s.required).collect();
        required.sort_by(|a, b| a.name.cmp(&b.name));
        for schema in required {
            if !attributes.contains_key(&schema.name) {
                errors.push(TypeError::MissingRequired {
                    name: schema.name.clone(),
                });
            }
        }

        // Type check each attribute
        let mut names: Vec<&String> = attributes.keys().collect();
        names.sort();
        for name in names {
            let Some(schema) = self.attributes.get(name) else {
                // Unknown attributes are allowed (for flexibility)
                continue;
            };
            if schema.computed {
                errors.push(TypeError::ComputedAttribute { name: name.clone() });
                continue;
            }
            if let Err(e) = schema.attr_type.validate(&attributes[name]) {
                errors.push(e.at(name));
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// Helper functions for common types
pub mod types {
    use super::*;

    /// Integer checked by a custom validator (ranges, allowed values)
    pub fn int_with(name: &str, validate: fn(&Value) -> Result<(), String>) -> AttributeType {
        AttributeType::Custom {
            name: name.to_string(),
            base: Box::new(AttributeType::Int),
            validate,
        }
    }

    /// CIDR block type (e.g., "10.0.0.0/16" or "2001:db8::/32")
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
}

/// Validate CIDR block format for either address family
pub fn validate_cidr(cidr: &str) -> Result<(), String> {
    let Some((ip, prefix)) = cidr.split_once('/') else {
        return Err(format!("Invalid CIDR format '{}': expected IP/prefix", cidr));
    };

    let max_prefix = match ip.parse::<std::net::IpAddr>() {
        Ok(std::net::IpAddr::V4(_)) => 32,
        Ok(std::net::IpAddr::V6(_)) => 128,
        Err(_) => return Err(format!("Invalid IP address '{}' in CIDR '{}'", ip, cidr)),
    };

    match prefix.parse::<u8>() {
        Ok(p) if p <= max_prefix => Ok(()),
        Ok(p) => Err(format!(
            "Invalid prefix length '{}': must be 0-{}",
            p, max_prefix
        )),
        Err(_) => Err(format!(
            "Invalid prefix length '{}': must be a number",
            prefix
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_string_type() {
        let t = AttributeType::String;
        assert!(t.validate(&Value::String("hello".to_string())).is_ok());
        assert!(t.validate(&Value::Int(42)).is_err());
    }

    #[test]
    fn validate_enum_type() {
        let t = AttributeType::Enum(vec!["ipv4".to_string(), "ipv6".to_string()]);
        assert!(t.validate(&Value::String("ipv4".to_string())).is_ok());
        let err = t.validate(&Value::String("ipx".to_string())).unwrap_err();
        assert!(err.to_string().contains("ipv4, ipv6"));
    }

    #[test]
    fn custom_type_checks_base_first() {
        let t = types::int_with("Small", |v| match v {
            Value::Int(n) if *n < 10 => Ok(()),
            _ => Err("too big".to_string()),
        });
        assert!(t.validate(&Value::Int(3)).is_ok());
        assert!(matches!(
            t.validate(&Value::String("3".to_string())),
            Err(TypeError::TypeMismatch { .. })
        ));
        assert!(matches!(
            t.validate(&Value::Int(30)),
            Err(TypeError::ValidationFailed { .. })
        ));
    }

    #[test]
    fn missing_required_and_computed_attributes() {
        let schema = ResourceSchema::new("vif")
            .attribute(AttributeSchema::new("name", AttributeType::String).required())
            .attribute(AttributeSchema::new("arn", AttributeType::String).computed());

        let mut attrs = HashMap::new();
        attrs.insert("arn".to_string(), Value::String("arn:aws:x".to_string()));

        let errors = schema.validate(&attrs).unwrap_err();
        assert_eq!(errors.len(), 2);
        assert!(matches!(&errors[0], TypeError::MissingRequired { name } if name == "name"));
        assert!(matches!(&errors[1], TypeError::ComputedAttribute { name } if name == "arn"));
    }

    #[test]
    fn map_errors_name_the_key() {
        let t = AttributeType::Map(Box::new(AttributeType::String));
        let mut map = HashMap::new();
        map.insert("env".to_string(), Value::Int(1));
        let err = t.validate(&Value::Map(map)).unwrap_err();
        assert!(err.to_string().starts_with("Map value for key 'env'"));
    }

    #[test]
    fn force_new_attributes_are_sorted() {
        let schema = ResourceSchema::new("vif")
            .attribute(AttributeSchema::new("vlan", AttributeType::Int).force_new())
            .attribute(AttributeSchema::new("name", AttributeType::String).force_new())
            .attribute(AttributeSchema::new("tags", AttributeType::String));
        assert_eq!(schema.force_new_attributes(), vec!["name", "vlan"]);
    }

    #[test]
    fn validate_cidr_type() {
        let t = types::cidr();

        assert!(t.validate(&Value::String("10.0.0.0/16".to_string())).is_ok());
        assert!(t.validate(&Value::String("0.0.0.0/0".to_string())).is_ok());
        assert!(t.validate(&Value::String("2001:db8::/32".to_string())).is_ok());

        assert!(t.validate(&Value::String("10.0.0.0".to_string())).is_err()); // no prefix
        assert!(t.validate(&Value::String("10.0.0.0/33".to_string())).is_err());
        assert!(t.validate(&Value::String("10.0.0.256/16".to_string())).is_err());
        assert!(t.validate(&Value::String("2001:db8::/129".to_string())).is_err());
        assert!(t.validate(&Value::Int(42)).is_err());
    }
}
