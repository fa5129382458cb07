//! Data source schemas: locations, cloud regions and cloud services
//!
//! Each data source takes an optional `name_regex` filter and exposes the
//! matching objects, sorted by id, under one computed list attribute.

use strata_core::schema::{AttributeSchema, AttributeType, ResourceSchema, types as core_types};

use super::types as pureport_types;
use crate::resources::{CLOUD_REGIONS, CLOUD_SERVICES, LOCATIONS};

pub fn schemas() -> Vec<ResourceSchema> {
    vec![locations_schema(), cloud_regions_schema(), cloud_services_schema()]
}

fn name_regex() -> AttributeSchema {
    AttributeSchema::new("name_regex", pureport_types::name_regex())
}

fn computed(name: &str, attr_type: AttributeType) -> AttributeSchema {
    AttributeSchema::new(name, attr_type).computed()
}

pub fn locations_schema() -> ResourceSchema {
    ResourceSchema::new(LOCATIONS)
        .with_description("Pureport locations")
        .attribute(name_regex())
        .attribute(computed(
            "locations",
            core_types::block([
                computed("id", AttributeType::String),
                computed("href", AttributeType::String),
                computed("name", AttributeType::String),
            ]),
        ))
}

pub fn cloud_regions_schema() -> ResourceSchema {
    ResourceSchema::new(CLOUD_REGIONS)
        .with_description("Cloud provider regions reachable through Pureport")
        .attribute(name_regex())
        .attribute(computed(
            "regions",
            core_types::block([
                computed("id", AttributeType::String),
                computed("name", AttributeType::String),
                computed("provider", AttributeType::String),
                computed("identifier", AttributeType::String),
            ]),
        ))
}

pub fn cloud_services_schema() -> ResourceSchema {
    ResourceSchema::new(CLOUD_SERVICES)
        .with_description("Cloud provider services reachable through Pureport")
        .attribute(name_regex())
        .attribute(computed(
            "services",
            core_types::block([
                computed("id", AttributeType::String),
                computed("href", AttributeType::String),
                computed("name", AttributeType::String),
                computed("provider", AttributeType::String),
                computed("service", AttributeType::String),
                computed("ipv4_prefix_count", AttributeType::Int),
                computed("ipv6_prefix_count", AttributeType::Int),
                computed("cloud_region_id", AttributeType::String),
            ]),
        ))
}
