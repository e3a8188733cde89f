//! Schema types and builders for tfplug
//!
//! Providers describe their configuration and every resource type with a
//! [`Schema`]. The host uses it to check configuration before any provider
//! code runs and to decide which attributes are computed during planning.

use crate::error::{Result, TfplugError};
use crate::plan_modifier::PlanModifier;
use crate::types::{AttributePath, Diagnostic, Dynamic, DynamicValue};
use regex::Regex;
use std::collections::HashSet;
use std::sync::{Arc, OnceLock};

#[derive(Debug, Clone, PartialEq)]
pub enum AttributeType {
    String,
}

impl AttributeType {
    fn accepts(&self, value: &Dynamic) -> bool {
        match (self, value) {
            (_, Dynamic::Null | Dynamic::Unknown) => true,
            (AttributeType::String, Dynamic::String(_)) => true,
            _ => false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Schema {
    /// Increment when stored state needs migrating
    pub version: i64,
    pub block: Block,
}

#[derive(Debug, Clone)]
pub struct Block {
    pub attributes: Vec<Attribute>,
    pub description: String,
}

#[derive(Clone)]
pub struct Attribute {
    pub name: String,
    pub r#type: AttributeType,
    pub description: String,
    pub required: bool,
    pub optional: bool,
    pub computed: bool,
    pub sensitive: bool,
    pub plan_modifiers: Vec<Arc<dyn PlanModifier>>,
}

impl Attribute {
    /// Set only by the provider, never by configuration
    pub fn is_computed_only(&self) -> bool {
        self.computed && !self.required && !self.optional
    }
}

impl std::fmt::Debug for Attribute {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Attribute")
            .field("name", &self.name)
            .field("type", &self.r#type)
            .field("required", &self.required)
            .field("optional", &self.optional)
            .field("computed", &self.computed)
            .field("sensitive", &self.sensitive)
            .field(
                "plan_modifiers",
                &format!("{} plan modifiers", self.plan_modifiers.len()),
            )
            .finish()
    }
}

fn attribute_name_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[a-z_][a-z0-9_]*$").expect("static pattern"))
}

impl Schema {
    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.block.attributes.iter().find(|a| a.name == name)
    }

    /// Check that the schema itself is well formed
    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();

        for attr in &self.block.attributes {
            if !attribute_name_pattern().is_match(&attr.name) {
                return Err(TfplugError::InvalidSchema(format!(
                    "attribute name '{}' must match {}",
                    attr.name,
                    attribute_name_pattern().as_str()
                )));
            }
            if !seen.insert(attr.name.as_str()) {
                return Err(TfplugError::InvalidSchema(format!(
                    "attribute '{}' declared twice",
                    attr.name
                )));
            }
            if attr.required && (attr.optional || attr.computed) {
                return Err(TfplugError::InvalidSchema(format!(
                    "attribute '{}' cannot be required and optional or computed",
                    attr.name
                )));
            }
            if !attr.required && !attr.optional && !attr.computed {
                return Err(TfplugError::InvalidSchema(format!(
                    "attribute '{}' must be required, optional or computed",
                    attr.name
                )));
            }
        }

        Ok(())
    }

    /// Check configuration against the schema
    pub fn validate_config(&self, config: &DynamicValue) -> Vec<Diagnostic> {
        let mut diagnostics = vec![];

        for attr in &self.block.attributes {
            let path = AttributePath::new(&attr.name);
            let value = config.get(&path).unwrap_or(&Dynamic::Null);

            if attr.required && matches!(value, Dynamic::Null) {
                diagnostics.push(
                    Diagnostic::error(
                        "Missing required argument",
                        format!("The argument \"{}\" is required", attr.name),
                    )
                    .with_attribute(path),
                );
            } else if attr.is_computed_only() && !matches!(value, Dynamic::Null) {
                diagnostics.push(
                    Diagnostic::error(
                        "Invalid configuration for read-only attribute",
                        format!(
                            "\"{}\" is set by the provider and cannot be configured",
                            attr.name
                        ),
                    )
                    .with_attribute(path),
                );
            } else if !attr.r#type.accepts(value) {
                diagnostics.push(
                    Diagnostic::error(
                        "Incorrect attribute value type",
                        format!(
                            "\"{}\" expects {:?}, got {}",
                            attr.name,
                            attr.r#type,
                            value.type_name()
                        ),
                    )
                    .with_attribute(path),
                );
            }
        }

        if let Dynamic::Map(values) = &config.value {
            let mut unknown: Vec<&String> = values
                .keys()
                .filter(|key| self.attribute(key).is_none())
                .collect();
            unknown.sort();
            for key in unknown {
                diagnostics.push(
                    Diagnostic::error(
                        "Unsupported argument",
                        format!("An argument named \"{}\" is not expected here", key),
                    )
                    .with_attribute(AttributePath::new(key)),
                );
            }
        }

        diagnostics
    }
}

/// Fluent builder for attributes
pub struct AttributeBuilder {
    attribute: Attribute,
}

impl AttributeBuilder {
    pub fn new(name: &str, type_: AttributeType) -> Self {
        Self {
            attribute: Attribute {
                name: name.to_string(),
                r#type: type_,
                description: String::new(),
                required: false,
                optional: false,
                computed: false,
                sensitive: false,
                plan_modifiers: Vec::new(),
            },
        }
    }

    pub fn description(mut self, desc: &str) -> Self {
        self.attribute.description = desc.to_string();
        self
    }

    pub fn required(mut self) -> Self {
        self.attribute.required = true;
        self.attribute.optional = false;
        self
    }

    pub fn optional(mut self) -> Self {
        self.attribute.optional = true;
        self.attribute.required = false;
        self
    }

    pub fn computed(mut self) -> Self {
        self.attribute.computed = true;
        self
    }

    pub fn sensitive(mut self) -> Self {
        self.attribute.sensitive = true;
        self
    }

    pub fn plan_modifier(mut self, modifier: impl PlanModifier + 'static) -> Self {
        self.attribute.plan_modifiers.push(Arc::new(modifier));
        self
    }

    pub fn build(self) -> Attribute {
        self.attribute
    }
}

/// Fluent builder for schemas
pub struct SchemaBuilder {
    schema: Schema,
}

impl SchemaBuilder {
    pub fn new() -> Self {
        Self {
            schema: Schema {
                version: 0,
                block: Block {
                    attributes: Vec::new(),
                    description: String::new(),
                },
            },
        }
    }

    pub fn version(mut self, version: i64) -> Self {
        self.schema.version = version;
        self
    }

    pub fn attribute(mut self, attr: Attribute) -> Self {
        self.schema.block.attributes.push(attr);
        self
    }

    pub fn description(mut self, desc: &str) -> Self {
        self.schema.block.description = desc.to_string();
        self
    }

    pub fn build(self) -> Schema {
        self.schema
    }
}

impl Default for SchemaBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan_modifier::RequiresReplace;

    fn server_like_schema() -> Schema {
        SchemaBuilder::new()
            .description("Test resource schema")
            .attribute(
                AttributeBuilder::new("id", AttributeType::String)
                    .computed()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("name", AttributeType::String)
                    .required()
                    .plan_modifier(RequiresReplace)
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("comment", AttributeType::String)
                    .optional()
                    .build(),
            )
            .build()
    }

    #[test]
    fn builder_sets_flags() {
        let schema = server_like_schema();

        let id = schema.attribute("id").unwrap();
        assert!(id.is_computed_only());

        let name = schema.attribute("name").unwrap();
        assert!(name.required);
        assert!(!name.optional);
        assert_eq!(name.plan_modifiers.len(), 1);
        assert_eq!(schema.block.description, "Test resource schema");
    }

    #[test]
    fn well_formed_schema_validates() {
        assert!(server_like_schema().validate().is_ok());
    }

    #[test]
    fn invalid_attribute_names_are_rejected() {
        let schema = SchemaBuilder::new()
            .attribute(
                AttributeBuilder::new("Bad-Name", AttributeType::String)
                    .required()
                    .build(),
            )
            .build();

        assert!(matches!(
            schema.validate(),
            Err(TfplugError::InvalidSchema(msg)) if msg.contains("Bad-Name")
        ));
    }

    #[test]
    fn duplicate_and_flagless_attributes_are_rejected() {
        let duplicate = SchemaBuilder::new()
            .attribute(AttributeBuilder::new("a", AttributeType::String).required().build())
            .attribute(AttributeBuilder::new("a", AttributeType::String).optional().build())
            .build();
        assert!(duplicate.validate().is_err());

        let flagless = SchemaBuilder::new()
            .attribute(AttributeBuilder::new("a", AttributeType::String).build())
            .build();
        assert!(flagless.validate().is_err());
    }

    #[test]
    fn config_missing_required_argument() {
        let config = DynamicValue::object([("comment", Dynamic::from("hi"))]);
        let diags = server_like_schema().validate_config(&config);

        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].summary, "Missing required argument");
        assert_eq!(diags[0].attribute, Some(AttributePath::new("name")));
    }

    #[test]
    fn config_cannot_set_computed_only_attribute() {
        let config = DynamicValue::object([
            ("id", Dynamic::from("42")),
            ("name", Dynamic::from("web1")),
        ]);
        let diags = server_like_schema().validate_config(&config);

        assert_eq!(diags.len(), 1);
        assert!(diags[0].summary.contains("read-only"));
    }

    #[test]
    fn config_with_wrong_type_or_unknown_key() {
        let config = DynamicValue::object([
            ("name", Dynamic::Bool(true)),
            ("colour", Dynamic::from("blue")),
        ]);
        let diags = server_like_schema().validate_config(&config);

        assert_eq!(diags.len(), 2);
        assert_eq!(diags[0].summary, "Incorrect attribute value type");
        assert_eq!(diags[1].summary, "Unsupported argument");
    }

    #[test]
    fn valid_config_has_no_diagnostics() {
        let config = DynamicValue::object([
            ("id", Dynamic::Null),
            ("name", Dynamic::from("web1")),
        ]);
        assert!(server_like_schema().validate_config(&config).is_empty());
    }
}
