//! azurerm_managed_disk data source schema

use strata_core::schema::{AttributeSchema, AttributeType, ResourceSchema};

use crate::resources::MANAGED_DISK;

pub fn data_source_schema() -> ResourceSchema {
    let computed_string = |name: &str| AttributeSchema::new(name, AttributeType::String).computed();

    ResourceSchema::new(MANAGED_DISK)
        .with_description("Existing Azure Managed Disk")
        .attribute(AttributeSchema::new("name", AttributeType::String).required())
        .attribute(super::resource_group_name_for_data_source())
        .attribute(super::zones_computed())
        .attributes([
            computed_string("storage_account_type"),
            computed_string("source_uri"),
            computed_string("source_resource_id"),
            computed_string("os_type"),
            computed_string("create_option"),
        ])
        .attribute(AttributeSchema::new("disk_size_gb", AttributeType::Int).computed())
        .attribute(super::tags())
}
