//! Schema types and builders for tfplug
//!
//! A [`Schema`] describes the attributes of a provider, resource or data
//! source. Besides being announced to Terraform it drives configuration
//! validation, static defaults and replacement detection.

use crate::plan_modifier::RequiresReplace;
use crate::types::{AttributePath, Diagnostic, Dynamic, DynamicValue};
use std::collections::HashMap;
use std::sync::Arc;

/// AttributeType defines the type system for Terraform attributes
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeType {
    String,
    Number, // Always f64
    Bool,
    List(Box<AttributeType>),               // Ordered, allows duplicates
    Set(Box<AttributeType>),                // Unordered, no duplicates
    Map(Box<AttributeType>),                // String keys only
    Object(HashMap<String, AttributeType>), // Fixed structure
}

impl AttributeType {
    pub fn string_set() -> Self {
        AttributeType::Set(Box::new(AttributeType::String))
    }

    pub fn string_list() -> Self {
        AttributeType::List(Box::new(AttributeType::String))
    }

    pub fn string_map() -> Self {
        AttributeType::Map(Box::new(AttributeType::String))
    }

    /// List of objects built from `(name, type)` pairs
    pub fn object_list(fields: &[(&str, AttributeType)]) -> Self {
        AttributeType::List(Box::new(AttributeType::Object(
            fields
                .iter()
                .map(|(name, ty)| (name.to_string(), ty.clone()))
                .collect(),
        )))
    }
}

/// Schema is returned by providers, resources and data sources.
/// Version is used for state migration.
#[derive(Debug, Clone)]
pub struct Schema {
    pub version: i64,
    pub block: Block,
}

#[derive(Debug, Clone)]
pub struct Block {
    pub version: i64,
    pub attributes: Vec<Attribute>,
    pub description: String,
    pub deprecated: bool,
}

/// Attribute represents a single configuration attribute
#[derive(Clone)]
pub struct Attribute {
    pub name: String,
    pub r#type: AttributeType,
    pub description: String,
    pub required: bool,
    pub optional: bool,
    pub computed: bool,
    pub sensitive: bool,
    pub deprecated: bool,
    pub validators: Vec<Arc<dyn Validator>>,
    pub plan_modifiers: Vec<Arc<dyn PlanModifier>>,
    pub default: Option<Arc<dyn AttributeDefault>>,
    /// Attributes that must not be set together with this one
    pub conflicts_with: Vec<String>,
    /// Attributes that must be set whenever this one is
    pub required_with: Vec<String>,
}

// validators and modifiers are trait objects without Debug
impl std::fmt::Debug for Attribute {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Attribute")
            .field("name", &self.name)
            .field("type", &self.r#type)
            .field("required", &self.required)
            .field("optional", &self.optional)
            .field("computed", &self.computed)
            .field("sensitive", &self.sensitive)
            .field("deprecated", &self.deprecated)
            .field("validators", &self.validators.len())
            .field("plan_modifiers", &self.plan_modifiers.len())
            .field("default", &self.default.is_some())
            .field("conflicts_with", &self.conflicts_with)
            .field("required_with", &self.required_with)
            .finish()
    }
}

impl Attribute {
    pub fn path(&self) -> AttributePath {
        AttributePath::new(&self.name)
    }

    /// True when any plan modifier forces replacement on change
    pub fn forces_replacement(&self) -> bool {
        self.plan_modifiers.iter().any(|m| m.forces_replacement())
    }
}

/// Validator performs validation on attribute values during planning
pub trait Validator: Send + Sync {
    fn description(&self) -> String;
    fn validate(&self, request: ValidatorRequest) -> ValidatorResponse;
}

pub struct ValidatorRequest {
    /// The attribute value alone, never null or unknown
    pub config_value: DynamicValue,
    pub path: AttributePath,
}

pub struct ValidatorResponse {
    pub diagnostics: Vec<Diagnostic>,
}

/// PlanModifier adjusts planned values and flags replacements
pub trait PlanModifier: Send + Sync {
    fn description(&self) -> String;
    fn modify(&self, request: PlanModifierRequest) -> PlanModifierResponse;

    /// Whether this modifier may request replacement at all
    fn forces_replacement(&self) -> bool {
        false
    }
}

pub struct PlanModifierRequest {
    pub config_value: DynamicValue,
    pub state_value: DynamicValue,
    pub plan_value: DynamicValue,
    pub path: AttributePath,
}

pub struct PlanModifierResponse {
    pub plan_value: DynamicValue,
    pub requires_replace: bool,
    pub diagnostics: Vec<Diagnostic>,
}

/// Provides a value for an optional attribute absent from configuration
pub trait AttributeDefault: Send + Sync {
    fn description(&self) -> String;
    fn default_value(&self, request: DefaultRequest) -> DefaultResponse;
}

pub struct DefaultRequest {
    pub path: AttributePath,
}

pub struct DefaultResponse {
    pub value: DynamicValue,
}

/// Result of [`Schema::plan`]
#[derive(Debug)]
pub struct PlanResult {
    pub planned_state: DynamicValue,
    pub requires_replace: Vec<AttributePath>,
    pub diagnostics: Vec<Diagnostic>,
}

impl Schema {
    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.block.attributes.iter().find(|a| a.name == name)
    }

    /// Checks required attributes, validators, conflicts and required-with
    /// pairs. Unknown values are skipped since they are only known at apply.
    pub fn validate_config(&self, config: &DynamicValue) -> Vec<Diagnostic> {
        let mut diagnostics = Vec::new();

        for attr in &self.block.attributes {
            let path = attr.path();
            let value = value_at(config, &path);

            if matches!(value, Dynamic::Unknown) {
                continue;
            }

            if matches!(value, Dynamic::Null) {
                if attr.required {
                    diagnostics.push(
                        Diagnostic::error(
                            "Missing required argument",
                            format!(
                                "The argument \"{}\" is required, but no definition was found.",
                                attr.name
                            ),
                        )
                        .with_attribute(path),
                    );
                }
                continue;
            }

            for validator in &attr.validators {
                let response = validator.validate(ValidatorRequest {
                    config_value: DynamicValue::new(value.clone()),
                    path: path.clone(),
                });
                diagnostics.extend(response.diagnostics);
            }

            for other in &attr.conflicts_with {
                if is_set(config, other) {
                    diagnostics.push(
                        Diagnostic::error(
                            "Conflicting configuration arguments",
                            format!("\"{}\": conflicts with {}", attr.name, other),
                        )
                        .with_attribute(path.clone()),
                    );
                }
            }

            for other in &attr.required_with {
                if !is_set(config, other) && !is_unknown(config, other) {
                    diagnostics.push(
                        Diagnostic::error(
                            "Missing required argument",
                            format!(
                                "\"{}\": all of `{},{}` must be specified",
                                attr.name, attr.name, other
                            ),
                        )
                        .with_attribute(path.clone()),
                    );
                }
            }
        }

        diagnostics
    }

    /// Fills absent optional attributes from their static defaults
    pub fn apply_defaults(&self, value: &mut DynamicValue) {
        for attr in &self.block.attributes {
            let Some(default) = &attr.default else {
                continue;
            };
            let path = attr.path();
            if matches!(value_at(value, &path), Dynamic::Null) {
                let response = default.default_value(DefaultRequest { path: path.clone() });
                let _ = value.set(&path, response.value.value);
            }
        }
    }

    /// Attributes whose change between `prior` and `planned` forces the
    /// resource to be replaced
    pub fn requires_replace(
        &self,
        prior: &DynamicValue,
        planned: &DynamicValue,
    ) -> Vec<AttributePath> {
        self.block
            .attributes
            .iter()
            .filter(|attr| attr.forces_replacement())
            .map(Attribute::path)
            .filter(|path| prior.differs_at(planned, path))
            .filter(|path| !matches!(value_at(planned, path), Dynamic::Unknown))
            .collect()
    }

    /// Builds the planned state from configuration and prior state: defaults
    /// first, then every attribute's plan modifiers. A null prior state
    /// means the resource is being created and never needs replacement.
    pub fn plan(&self, config: &DynamicValue, prior: &DynamicValue) -> PlanResult {
        let mut planned = config.clone();
        if planned.is_null() {
            planned = DynamicValue::object();
        }
        self.apply_defaults(&mut planned);

        let mut requires_replace = Vec::new();
        let mut diagnostics = Vec::new();

        for attr in &self.block.attributes {
            let path = attr.path();
            for modifier in &attr.plan_modifiers {
                let response = modifier.modify(PlanModifierRequest {
                    config_value: DynamicValue::new(value_at(config, &path).clone()),
                    state_value: DynamicValue::new(value_at(prior, &path).clone()),
                    plan_value: DynamicValue::new(value_at(&planned, &path).clone()),
                    path: path.clone(),
                });
                diagnostics.extend(response.diagnostics);
                let _ = planned.set(&path, response.plan_value.value);
                if response.requires_replace
                    && !prior.is_null()
                    && !requires_replace.contains(&path)
                {
                    requires_replace.push(path.clone());
                }
            }
        }

        PlanResult {
            planned_state: planned,
            requires_replace,
            diagnostics,
        }
    }
}

fn value_at<'a>(value: &'a DynamicValue, path: &AttributePath) -> &'a Dynamic {
    value.get(path).unwrap_or(&Dynamic::Null)
}

fn is_set(config: &DynamicValue, name: &str) -> bool {
    !matches!(
        value_at(config, &AttributePath::new(name)),
        Dynamic::Null | Dynamic::Unknown
    )
}

fn is_unknown(config: &DynamicValue, name: &str) -> bool {
    matches!(value_at(config, &AttributePath::new(name)), Dynamic::Unknown)
}

/// AttributeBuilder provides a fluent API for building attributes
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
                deprecated: false,
                validators: Vec::new(),
                plan_modifiers: Vec::new(),
                default: None,
                conflicts_with: Vec::new(),
                required_with: Vec::new(),
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

    pub fn deprecated(mut self) -> Self {
        self.attribute.deprecated = true;
        self
    }

    pub fn validator(mut self, validator: Arc<dyn Validator>) -> Self {
        self.attribute.validators.push(validator);
        self
    }

    pub fn plan_modifier(mut self, modifier: Arc<dyn PlanModifier>) -> Self {
        self.attribute.plan_modifiers.push(modifier);
        self
    }

    /// Any change to this attribute replaces the resource
    pub fn force_new(self) -> Self {
        self.plan_modifier(Arc::new(RequiresReplace))
    }

    pub fn default(mut self, default: Arc<dyn AttributeDefault>) -> Self {
        self.attribute.default = Some(default);
        self
    }

    pub fn conflicts_with(mut self, names: &[&str]) -> Self {
        self.attribute
            .conflicts_with
            .extend(names.iter().map(|n| n.to_string()));
        self
    }

    pub fn required_with(mut self, names: &[&str]) -> Self {
        self.attribute
            .required_with
            .extend(names.iter().map(|n| n.to_string()));
        self
    }

    pub fn build(self) -> Attribute {
        self.attribute
    }
}

/// SchemaBuilder provides a fluent API for building schemas
pub struct SchemaBuilder {
    schema: Schema,
}

impl SchemaBuilder {
    pub fn new() -> Self {
        Self {
            schema: Schema {
                version: 0,
                block: Block {
                    version: 0,
                    attributes: Vec::new(),
                    description: String::new(),
                    deprecated: false,
                },
            },
        }
    }

    pub fn version(mut self, version: i64) -> Self {
        self.schema.version = version;
        self.schema.block.version = version;
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

    pub fn deprecated(mut self) -> Self {
        self.schema.block.deprecated = true;
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
    use crate::defaults::StaticDefault;
    use crate::validator::StringOneOf;

    fn volume_schema() -> Schema {
        SchemaBuilder::new()
            .version(1)
            .description("Test volume schema")
            .attribute(
                AttributeBuilder::new("id", AttributeType::String)
                    .computed()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("cloud", AttributeType::String)
                    .required()
                    .force_new()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("type", AttributeType::String)
                    .optional()
                    .computed()
                    .validator(StringOneOf::create(&["ssd", "standard"]))
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("affinity_volume", AttributeType::String)
                    .optional()
                    .conflicts_with(&["affinity_instance"])
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("affinity_instance", AttributeType::String)
                    .optional()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("access_key", AttributeType::String)
                    .optional()
                    .sensitive()
                    .required_with(&["secret_key"])
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("secret_key", AttributeType::String)
                    .optional()
                    .sensitive()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("shareable", AttributeType::Bool)
                    .optional()
                    .default(StaticDefault::bool(false))
                    .build(),
            )
            .build()
    }

    fn config(pairs: &[(&str, Dynamic)]) -> DynamicValue {
        let mut value = DynamicValue::object();
        for (name, v) in pairs {
            value.set(&AttributePath::new(name), v.clone()).unwrap();
        }
        value
    }

    #[test]
    fn attribute_builder_creates_required_string() {
        let attr = AttributeBuilder::new("name", AttributeType::String)
            .description("The name of the resource")
            .required()
            .build();

        assert_eq!(attr.name, "name");
        assert!(matches!(attr.r#type, AttributeType::String));
        assert!(attr.required);
        assert!(!attr.optional);
        assert_eq!(attr.description, "The name of the resource");
    }

    #[test]
    fn cloned_attribute_keeps_validators() {
        let schema = volume_schema();
        let cloned = schema.clone();

        assert_eq!(cloned.attribute("type").unwrap().validators.len(), 1);
        assert!(cloned.attribute("cloud").unwrap().forces_replacement());
    }

    #[test]
    fn missing_required_attribute_is_reported() {
        let diags = volume_schema().validate_config(&config(&[]));

        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].summary, "Missing required argument");
        assert_eq!(diags[0].attribute, Some(AttributePath::new("cloud")));
    }

    #[test]
    fn unknown_required_attribute_is_accepted() {
        let diags = volume_schema().validate_config(&config(&[("cloud", Dynamic::Unknown)]));
        assert!(diags.is_empty());
    }

    #[test]
    fn validators_run_on_set_values() {
        let diags = volume_schema().validate_config(&config(&[
            ("cloud", "c1".into()),
            ("type", "tier0".into()),
        ]));

        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].attribute, Some(AttributePath::new("type")));
    }

    #[test]
    fn conflicting_attributes_are_reported() {
        let diags = volume_schema().validate_config(&config(&[
            ("cloud", "c1".into()),
            ("affinity_volume", "v1".into()),
            ("affinity_instance", "i1".into()),
        ]));

        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].summary, "Conflicting configuration arguments");
    }

    #[test]
    fn required_with_is_enforced() {
        let diags = volume_schema().validate_config(&config(&[
            ("cloud", "c1".into()),
            ("access_key", "ak".into()),
        ]));

        assert_eq!(diags.len(), 1);
        assert!(diags[0].detail.contains("access_key,secret_key"));
    }

    #[test]
    fn defaults_fill_absent_values_only() {
        let schema = volume_schema();

        let mut absent = config(&[("cloud", "c1".into())]);
        schema.apply_defaults(&mut absent);
        assert!(!absent.get_bool(&AttributePath::new("shareable")).unwrap());

        let mut set = config(&[("cloud", "c1".into()), ("shareable", true.into())]);
        schema.apply_defaults(&mut set);
        assert!(set.get_bool(&AttributePath::new("shareable")).unwrap());
    }

    #[test]
    fn requires_replace_only_for_force_new_changes() {
        let schema = volume_schema();
        let prior = config(&[("cloud", "c1".into()), ("type", "ssd".into())]);
        let planned = config(&[("cloud", "c2".into()), ("type", "standard".into())]);

        assert_eq!(
            schema.requires_replace(&prior, &planned),
            vec![AttributePath::new("cloud")]
        );
        assert!(schema.requires_replace(&prior, &prior).is_empty());
    }

    #[test]
    fn plan_on_create_never_replaces() {
        let schema = volume_schema();
        let result = schema.plan(&config(&[("cloud", "c1".into())]), &DynamicValue::null());

        assert!(result.requires_replace.is_empty());
        assert!(!result
            .planned_state
            .get_bool(&AttributePath::new("shareable"))
            .unwrap());
    }

    #[test]
    fn plan_flags_replacement_on_update() {
        let schema = volume_schema();
        let prior = config(&[("cloud", "c1".into()), ("shareable", false.into())]);
        let result = schema.plan(&config(&[("cloud", "c2".into())]), &prior);

        assert_eq!(result.requires_replace, vec![AttributePath::new("cloud")]);
    }
}
