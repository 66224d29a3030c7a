//! Resource implementations
//!
//! Every resource keeps its remote id as a composite `id` attribute (see
//! [`crate::ids`]) and shares the helpers below for timeouts, storage
//! affinity and turning errors into diagnostics.

pub(crate) mod job;
pub mod resource_capture;
pub mod resource_image;
pub mod resource_image_export;
pub mod resource_instance;
pub mod resource_key;
pub mod resource_network;
pub mod resource_network_port;
pub mod resource_network_port_attach;
pub mod resource_placement_group;
pub mod resource_snapshot;
pub mod resource_volume;
pub mod resource_volume_attach;
pub mod resource_volume_group;

#[cfg(test)]
pub(crate) mod test_support;

pub use resource_capture::CaptureResource;
pub use resource_image::ImageResource;
pub use resource_image_export::ImageExportResource;
pub use resource_instance::InstanceResource;
pub use resource_key::KeyResource;
pub use resource_network::NetworkResource;
pub use resource_network_port::NetworkPortResource;
pub use resource_network_port_attach::NetworkPortAttachResource;
pub use resource_placement_group::PlacementGroupResource;
pub use resource_snapshot::SnapshotResource;
pub use resource_volume::VolumeResource;
pub use resource_volume_attach::VolumeAttachResource;
pub use resource_volume_group::VolumeGroupResource;

use crate::api::common::StorageAffinity;
use crate::ids::IdError;
use crate::provider_data::PpcProviderData;
use crate::waiter::WaitError;
use base64::Engine;
use std::any::Any;
use std::collections::HashMap;
use std::fmt::Display;
use std::sync::Arc;
use std::time::Duration;
use tfplug::resource::{ConfigureResourceResponse, ImportResourceStateResponse, ImportedResource};
use tfplug::schema::{
    Attribute, AttributeBuilder, AttributeType, Schema, Validator, ValidatorRequest,
    ValidatorResponse,
};
use tfplug::types::{AttributePath, Diagnostic, Dynamic, DynamicValue};

pub const CLOUD_INSTANCE_ID: &str = "ppc_cloud_instance_id";

pub const AFFINITY_POLICY: &str = "ppc_affinity_policy";
pub const AFFINITY_VOLUME: &str = "ppc_affinity_volume";
pub const AFFINITY_INSTANCE: &str = "ppc_affinity_instance";
pub const ANTI_AFFINITY_VOLUMES: &str = "ppc_anti_affinity_volumes";
pub const ANTI_AFFINITY_INSTANCES: &str = "ppc_anti_affinity_instances";

pub(crate) fn attr(name: &str) -> AttributePath {
    AttributePath::new(name)
}

/// Writes `value` (null for `None`) into the state. A state that cannot
/// hold the attribute keeps its old contents and the failure is logged.
pub(crate) fn put(state: &mut DynamicValue, name: &str, value: impl Into<Dynamic>) {
    if let Err(e) = state.set(&AttributePath::new(name), value) {
        tracing::warn!("Dropping attribute {} from state: {}", name, e);
    }
}

pub(crate) fn put_strings(state: &mut DynamicValue, name: &str, values: &[String]) {
    put(state, name, Dynamic::string_list(values.iter().cloned()));
}

pub(crate) fn not_configured() -> Diagnostic {
    Diagnostic::error(
        "Provider not configured",
        "Provider data was not properly configured",
    )
}

pub(crate) fn api_error(summary: &str, err: impl Display) -> Diagnostic {
    Diagnostic::error(summary, format!("API error: {}", err))
}

pub(crate) fn wait_error(summary: &str, err: WaitError) -> Diagnostic {
    Diagnostic::error(summary, err.to_string())
}

pub(crate) fn invalid_id(err: IdError) -> Diagnostic {
    Diagnostic::error("Invalid resource ID", err.to_string()).with_attribute(attr("id"))
}

pub(crate) fn invalid_import_id(err: IdError, format: &str) -> Diagnostic {
    Diagnostic::error(
        "Invalid import ID",
        format!("{}. Import ID must be in the format '{}'", err, format),
    )
}

pub(crate) fn required_string(value: &DynamicValue, name: &str) -> Result<String, Diagnostic> {
    value.get_optional_string(&attr(name)).ok_or_else(|| {
        Diagnostic::error(
            format!("Missing {}", name),
            format!("The '{}' attribute is required", name),
        )
        .with_attribute(attr(name))
    })
}

pub(crate) fn required_number(value: &DynamicValue, name: &str) -> Result<f64, Diagnostic> {
    value.get_number(&attr(name)).map_err(|_| {
        Diagnostic::error(
            format!("Missing {}", name),
            format!("The '{}' attribute is required", name),
        )
        .with_attribute(attr(name))
    })
}

/// The id stored in state
pub(crate) fn state_id(state: &DynamicValue) -> Result<String, Diagnostic> {
    state.get_optional_string(&attr("id")).ok_or_else(|| {
        Diagnostic::error("Missing resource ID", "The state carries no 'id' attribute")
            .with_attribute(attr("id"))
    })
}

/// Schema checks plus the `timeouts` block
pub(crate) fn validate_config(
    schema: &Schema,
    config: &DynamicValue,
    timeouts: Timeouts,
) -> Vec<Diagnostic> {
    let mut diagnostics = schema.validate_config(config);
    if let Err(diag) = timeouts.resolve(config) {
        diagnostics.push(diag);
    }
    diagnostics
}

pub(crate) fn configure_response(
    slot: &mut Option<PpcProviderData>,
    provider_data: Option<Arc<dyn Any + Send + Sync>>,
) -> ConfigureResourceResponse {
    let mut diagnostics = vec![];
    match PpcProviderData::from_configure(provider_data, "resource") {
        Ok(data) => *slot = Some(data),
        Err(diag) => diagnostics.push(diag),
    }
    ConfigureResourceResponse { diagnostics }
}

/// Wraps the outcome of an import read
pub(crate) fn import_response(
    type_name: &str,
    result: Result<DynamicValue, Diagnostic>,
) -> ImportResourceStateResponse {
    match result {
        Ok(state) => ImportResourceStateResponse {
            imported_resources: vec![ImportedResource {
                type_name: type_name.to_string(),
                state,
                private: vec![],
                identity: None,
            }],
            diagnostics: vec![],
            deferred: None,
        },
        Err(diag) => ImportResourceStateResponse {
            imported_resources: vec![],
            diagnostics: vec![diag],
            deferred: None,
        },
    }
}

/// State holding only `id`, the starting point of an import read
pub(crate) fn import_seed(id: &str) -> DynamicValue {
    let mut state = DynamicValue::object();
    put(&mut state, "id", id);
    state
}

pub(crate) fn missing_on_import(kind: &str, id: &str) -> Diagnostic {
    Diagnostic::error(
        "Cannot import non-existent remote object",
        format!("{} '{}' was not found", kind, id),
    )
}

/// Per-operation deadlines, overridable through the `timeouts` block
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Timeouts {
    pub create: Duration,
    pub update: Duration,
    pub delete: Duration,
}

impl Timeouts {
    pub const fn minutes(create: u64, update: u64, delete: u64) -> Self {
        Self {
            create: Duration::from_secs(create * 60),
            update: Duration::from_secs(update * 60),
            delete: Duration::from_secs(delete * 60),
        }
    }

    /// Applies `timeouts.create|update|delete` from `value` over `self`
    pub fn resolve(self, value: &DynamicValue) -> Result<Self, Diagnostic> {
        let read = |op: &str, fallback: Duration| -> Result<Duration, Diagnostic> {
            let path = attr("timeouts").attribute(op);
            match value.get_optional_string(&path) {
                None => Ok(fallback),
                Some(raw) => parse_duration(&raw).ok_or_else(|| {
                    Diagnostic::error(
                        "Invalid timeout",
                        format!(
                            "'{}' is not a valid duration, use values such as \"45m\", \"2h\" or \"90s\"",
                            raw
                        ),
                    )
                    .with_attribute(path)
                }),
            }
        };

        Ok(Self {
            create: read("create", self.create)?,
            update: read("update", self.update)?,
            delete: read("delete", self.delete)?,
        })
    }
}

/// Parses durations written as a sequence of `<number><unit>` pairs with
/// units `h`, `m` and `s`, e.g. "2h", "1h30m", "90s"
pub fn parse_duration(raw: &str) -> Option<Duration> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    let mut total = 0u64;
    let mut digits = String::new();

    for c in raw.chars() {
        if c.is_ascii_digit() {
            digits.push(c);
            continue;
        }

        let amount: u64 = digits.parse().ok()?;
        digits.clear();
        let unit = match c {
            'h' => 3600,
            'm' => 60,
            's' => 1,
            _ => return None,
        };
        total = total.checked_add(amount.checked_mul(unit)?)?;
    }

    if !digits.is_empty() {
        return None;
    }

    Some(Duration::from_secs(total))
}

pub(crate) fn timeouts_attribute() -> Attribute {
    AttributeBuilder::new(
        "timeouts",
        AttributeType::Object(HashMap::from([
            ("create".to_string(), AttributeType::String),
            ("update".to_string(), AttributeType::String),
            ("delete".to_string(), AttributeType::String),
        ])),
    )
    .description("Overrides for the create, update and delete timeouts, e.g. \"45m\"")
    .optional()
    .build()
}

/// The affinity attribute group shared by instances, volumes and images
pub(crate) fn affinity_attributes(force_new: bool) -> Vec<Attribute> {
    let with_replace = |builder: AttributeBuilder| {
        if force_new {
            builder.force_new().build()
        } else {
            builder.build()
        }
    };

    vec![
        with_replace(
            AttributeBuilder::new(AFFINITY_POLICY, AttributeType::String)
                .description("Affinity policy for storage placement, one of affinity or anti-affinity")
                .optional()
                .validator(tfplug::validator::StringOneOf::create(&[
                    "affinity",
                    "anti-affinity",
                ])),
        ),
        with_replace(
            AttributeBuilder::new(AFFINITY_VOLUME, AttributeType::String)
                .description("Volume whose storage pool the new storage follows")
                .optional()
                .conflicts_with(&[AFFINITY_INSTANCE, ANTI_AFFINITY_VOLUMES, ANTI_AFFINITY_INSTANCES]),
        ),
        with_replace(
            AttributeBuilder::new(AFFINITY_INSTANCE, AttributeType::String)
                .description("Instance whose storage pool the new storage follows")
                .optional()
                .conflicts_with(&[AFFINITY_VOLUME, ANTI_AFFINITY_VOLUMES, ANTI_AFFINITY_INSTANCES]),
        ),
        with_replace(
            AttributeBuilder::new(ANTI_AFFINITY_VOLUMES, AttributeType::string_list())
                .description("Volumes whose storage pools the new storage avoids")
                .optional()
                .conflicts_with(&[AFFINITY_VOLUME, AFFINITY_INSTANCE, ANTI_AFFINITY_INSTANCES]),
        ),
        with_replace(
            AttributeBuilder::new(ANTI_AFFINITY_INSTANCES, AttributeType::string_list())
                .description("Instances whose storage pools the new storage avoids")
                .optional()
                .conflicts_with(&[AFFINITY_VOLUME, AFFINITY_INSTANCE, ANTI_AFFINITY_VOLUMES]),
        ),
    ]
}

/// Storage affinity from configuration, `None` without a policy. The
/// `affinity` policy carries the volume or instance to follow, any other
/// policy carries the anti-affinity lists.
pub(crate) fn storage_affinity(config: &DynamicValue) -> Option<StorageAffinity> {
    let policy = config.get_optional_string(&attr(AFFINITY_POLICY))?;

    let mut affinity = StorageAffinity {
        affinity_policy: Some(policy.clone()),
        ..Default::default()
    };

    if policy == "affinity" {
        affinity.affinity_volume = config.get_optional_string(&attr(AFFINITY_VOLUME));
        affinity.affinity_pvm_instance = config.get_optional_string(&attr(AFFINITY_INSTANCE));
    } else {
        affinity.anti_affinity_volumes = config
            .get_string_list(&attr(ANTI_AFFINITY_VOLUMES))
            .unwrap_or_default();
        affinity.anti_affinity_pvm_instances = config
            .get_string_list(&attr(ANTI_AFFINITY_INSTANCES))
            .unwrap_or_default();
    }

    Some(affinity)
}

/// Rejects strings that are not standard base64
pub struct Base64Validator;

impl Validator for Base64Validator {
    fn description(&self) -> String {
        "value must be base64 encoded".to_string()
    }

    fn validate(&self, request: ValidatorRequest) -> ValidatorResponse {
        let mut diagnostics = vec![];

        if let Some(value) = request.config_value.value.as_str() {
            if let Err(e) = base64::engine::general_purpose::STANDARD.decode(value) {
                diagnostics.push(
                    Diagnostic::error(
                        "Invalid base64 value",
                        format!("{} must be base64 encoded: {}", request.path, e),
                    )
                    .with_attribute(request.path),
                );
            }
        }

        ValidatorResponse { diagnostics }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(pairs: &[(&str, Dynamic)]) -> DynamicValue {
        let mut value = DynamicValue::object();
        for (name, v) in pairs {
            value.set(&attr(name), v.clone()).unwrap();
        }
        value
    }

    #[test]
    fn put_writes_values_and_nulls() {
        let mut state = DynamicValue::new(Dynamic::String("flat".to_string()));
        put(&mut state, "name", "data");
        put(&mut state, "wwn", None::<String>);
        put_strings(&mut state, "dns", &["10.0.0.1".to_string()]);

        assert_eq!(state.get_string(&attr("name")).unwrap(), "data");
        assert!(state.get_optional_string(&attr("wwn")).is_none());
        assert_eq!(state.get_string_list(&attr("dns")).unwrap(), vec!["10.0.0.1"]);
    }

    #[test]
    fn parses_compound_durations() {
        assert_eq!(parse_duration("45m"), Some(Duration::from_secs(45 * 60)));
        assert_eq!(parse_duration("2h"), Some(Duration::from_secs(7200)));
        assert_eq!(parse_duration("90s"), Some(Duration::from_secs(90)));
        assert_eq!(parse_duration("1h30m"), Some(Duration::from_secs(5400)));
        assert_eq!(parse_duration(""), None);
        assert_eq!(parse_duration("10"), None);
        assert_eq!(parse_duration("5d"), None);
        assert_eq!(parse_duration("m"), None);
    }

    #[test]
    fn timeouts_block_overrides_defaults() {
        let defaults = Timeouts::minutes(120, 60, 60);
        let mut value = DynamicValue::object();
        value
            .set_string(&attr("timeouts").attribute("create"), "3h".to_string())
            .unwrap();

        let resolved = defaults.resolve(&value).unwrap();
        assert_eq!(resolved.create, Duration::from_secs(3 * 3600));
        assert_eq!(resolved.update, defaults.update);

        assert_eq!(defaults.resolve(&DynamicValue::object()).unwrap(), defaults);
    }

    #[test]
    fn invalid_timeout_is_reported_on_its_path() {
        let mut value = DynamicValue::object();
        value
            .set_string(&attr("timeouts").attribute("delete"), "soon".to_string())
            .unwrap();

        let diag = Timeouts::minutes(1, 1, 1).resolve(&value).unwrap_err();
        assert_eq!(diag.summary, "Invalid timeout");
        assert_eq!(diag.attribute, Some(attr("timeouts").attribute("delete")));
    }

    #[test]
    fn affinity_policy_selects_fields() {
        let affinity = storage_affinity(&config(&[
            (AFFINITY_POLICY, "affinity".into()),
            (AFFINITY_VOLUME, "vol-1".into()),
            (ANTI_AFFINITY_VOLUMES, Dynamic::string_list(["vol-2"])),
        ]))
        .unwrap();
        assert_eq!(affinity.affinity_volume.as_deref(), Some("vol-1"));
        assert!(affinity.anti_affinity_volumes.is_empty());

        let anti = storage_affinity(&config(&[
            (AFFINITY_POLICY, "anti-affinity".into()),
            (ANTI_AFFINITY_INSTANCES, Dynamic::string_list(["ins-1", "ins-2"])),
        ]))
        .unwrap();
        assert_eq!(anti.anti_affinity_pvm_instances, vec!["ins-1", "ins-2"]);
        assert!(anti.affinity_volume.is_none());

        assert!(storage_affinity(&config(&[(AFFINITY_VOLUME, "vol-1".into())])).is_none());
    }

    #[test]
    fn base64_validator() {
        let validate = |value: &str| {
            Base64Validator
                .validate(ValidatorRequest {
                    config_value: DynamicValue::new(Dynamic::String(value.to_string())),
                    path: attr("ppc_user_data"),
                })
                .diagnostics
        };

        assert!(validate("I2Nsb3VkLWNvbmZpZwo=").is_empty());
        assert_eq!(validate("not base64!").len(), 1);
    }
}
