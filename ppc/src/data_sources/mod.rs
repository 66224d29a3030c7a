//! Data source implementations
//!
//! Data sources only read. Lookups keyed by a remote object use its natural
//! id, collections get a fresh random id on every read.

pub mod data_source_instance_ip;
pub mod data_source_key;
pub mod data_source_keys;
pub mod data_source_placement_group;
pub mod data_source_placement_groups;
pub mod data_source_sap_profile;
pub mod data_source_sap_profiles;
pub mod data_source_snapshots;
pub mod data_source_storage_pool_capacity;
pub mod data_source_storage_type_capacity;
pub mod data_source_volume_flash_copy_mappings;
pub mod data_source_volume_group_details;
pub mod data_source_volume_groups_details;

pub use data_source_instance_ip::InstanceIpDataSource;
pub use data_source_key::KeyDataSource;
pub use data_source_keys::KeysDataSource;
pub use data_source_placement_group::PlacementGroupDataSource;
pub use data_source_placement_groups::PlacementGroupsDataSource;
pub use data_source_sap_profile::SapProfileDataSource;
pub use data_source_sap_profiles::SapProfilesDataSource;
pub use data_source_snapshots::SnapshotsDataSource;
pub use data_source_storage_pool_capacity::StoragePoolCapacityDataSource;
pub use data_source_storage_type_capacity::StorageTypeCapacityDataSource;
pub use data_source_volume_flash_copy_mappings::VolumeFlashCopyMappingsDataSource;
pub use data_source_volume_group_details::VolumeGroupDetailsDataSource;
pub use data_source_volume_groups_details::VolumeGroupsDetailsDataSource;

use crate::provider_data::PpcProviderData;
use crate::resources::CLOUD_INSTANCE_ID;
use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;
use tfplug::data_source::{ConfigureDataSourceResponse, ReadDataSourceResponse};
use tfplug::schema::{Attribute, AttributeBuilder, AttributeType};
use tfplug::types::{Diagnostic, Dynamic, DynamicValue};

pub(crate) fn configure_response(
    slot: &mut Option<PpcProviderData>,
    provider_data: Option<Arc<dyn Any + Send + Sync>>,
) -> ConfigureDataSourceResponse {
    let mut diagnostics = vec![];
    match PpcProviderData::from_configure(provider_data, "data source") {
        Ok(data) => *slot = Some(data),
        Err(diag) => diagnostics.push(diag),
    }
    ConfigureDataSourceResponse { diagnostics }
}

/// On failure the config is echoed back as state next to the error
pub(crate) fn read_response(
    config: DynamicValue,
    result: Result<DynamicValue, Diagnostic>,
) -> ReadDataSourceResponse {
    match result {
        Ok(state) => ReadDataSourceResponse {
            state,
            diagnostics: vec![],
            deferred: None,
        },
        Err(diag) => ReadDataSourceResponse {
            state: config,
            diagnostics: vec![diag],
            deferred: None,
        },
    }
}

pub(crate) fn id_attribute() -> Attribute {
    AttributeBuilder::new("id", AttributeType::String)
        .description("The data source ID")
        .computed()
        .build()
}

pub(crate) fn cloud_attribute() -> Attribute {
    AttributeBuilder::new(CLOUD_INSTANCE_ID, AttributeType::String)
        .description("The cloud instance to read from")
        .required()
        .build()
}

pub(crate) fn required_input(name: &str, description: &str) -> Attribute {
    AttributeBuilder::new(name, AttributeType::String)
        .description(description)
        .required()
        .build()
}

pub(crate) fn collection_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// One element of an object list
pub(crate) fn record<const N: usize>(fields: [(&str, Dynamic); N]) -> Dynamic {
    Dynamic::Map(
        fields
            .into_iter()
            .map(|(name, value)| (name.to_string(), value))
            .collect::<HashMap<_, _>>(),
    )
}
