//! AzureRM resource schema definitions
//!
//! Attributes shared by several resources live here; each resource module
//! builds its full schema on top of them.

pub mod automation_account;
pub mod ddos_protection_plan;
pub mod managed_disk;

use strata_core::schema::{AttributeSchema, AttributeType, ResourceSchema, types};

use crate::utils::{normalize_location, tags_type};
use crate::validators::resource_group_name_type;

/// Returns all AzureRM schemas
pub fn all_schemas() -> Vec<ResourceSchema> {
    vec![
        ddos_protection_plan::schema(),
        automation_account::schema(),
        managed_disk::data_source_schema(),
    ]
}

/// Azure region; stored and compared in normalized form
pub fn location() -> AttributeSchema {
    AttributeSchema::new("location", AttributeType::String)
        .required()
        .force_new()
        .with_state_func(normalize_location)
        .with_description("Azure region, e.g. \"West Europe\" or \"westeurope\"")
}

pub fn resource_group_name() -> AttributeSchema {
    AttributeSchema::new("resource_group_name", resource_group_name_type())
        .required()
        .force_new()
        .case_insensitive()
}

/// Data sources look resource groups up by name without validating the format
pub fn resource_group_name_for_data_source() -> AttributeSchema {
    AttributeSchema::new("resource_group_name", AttributeType::String).required()
}

pub fn tags() -> AttributeSchema {
    AttributeSchema::new("tags", tags_type()).optional_computed()
}

pub fn zones_computed() -> AttributeSchema {
    AttributeSchema::new("zones", types::string_list()).computed()
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use strata_core::resource::Value;

    use super::*;

    #[test]
    fn location_compares_normalized() {
        let location = location();
        assert!(location.values_equal(&Value::string("West Europe"), &Value::string("westeurope")));
        assert!(!location.values_equal(&Value::string("West US"), &Value::string("westeurope")));
    }

    #[test]
    fn resource_group_name_is_validated() {
        let schema = ResourceSchema::new("test").attribute(resource_group_name());
        let bad = HashMap::from([("resource_group_name".to_string(), Value::string("rg."))]);
        assert!(schema.validate(&bad).is_err());
        let ok = HashMap::from([("resource_group_name".to_string(), Value::string("my-rg"))]);
        assert!(schema.validate(&ok).is_ok());
    }

    #[test]
    fn every_schema_has_a_resource_group() {
        for schema in all_schemas() {
            assert!(
                schema.attributes.contains_key("resource_group_name"),
                "{} has no resource_group_name",
                schema.resource_type
            );
        }
    }
}
