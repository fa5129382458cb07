//! Pureport resource schema definitions
//!
//! Every connection type shares the base connection attributes defined
//! here; the per-type modules add their own on top.

pub mod connection;
pub mod data_sources;
pub mod network;
pub mod types;

use strata_core::resource::Value;
use strata_core::schema::{AttributeSchema, AttributeType, ResourceSchema, types as core_types};

use self::types as pureport_types;

/// Returns all Pureport schemas
pub fn all_schemas() -> Vec<ResourceSchema> {
    let mut schemas = connection::schemas();
    schemas.push(network::schema());
    schemas.extend(data_sources::schemas());
    schemas
}

/// `{id, href}` reference to another Pureport object, at most one
pub fn link(name: &str) -> AttributeSchema {
    AttributeSchema::new(
        name,
        core_types::block([
            AttributeSchema::new("id", AttributeType::String).required(),
            AttributeSchema::new("href", AttributeType::String).required(),
        ]),
    )
    .required()
    .force_new()
    .max_items(1)
}

/// Attributes shared by every connection type
pub fn base_connection_attributes() -> Vec<AttributeSchema> {
    vec![
        AttributeSchema::new("name", AttributeType::String).required(),
        AttributeSchema::new("description", AttributeType::String),
        AttributeSchema::new("speed", pureport_types::connection_speed())
            .required()
            .with_description("Connection speed in Mbps"),
        AttributeSchema::new("high_availability", AttributeType::Bool)
            .with_default(Value::Bool(false)),
        AttributeSchema::new("billing_term", pureport_types::billing_term()).required(),
        link("location"),
        link("network"),
        AttributeSchema::new(
            "customer_networks",
            core_types::block([
                AttributeSchema::new("name", AttributeType::String).required(),
                AttributeSchema::new("address", core_types::cidr()).required(),
            ]),
        ),
        AttributeSchema::new(
            "nat_config",
            core_types::block([
                AttributeSchema::new("enabled", AttributeType::Bool).required(),
                AttributeSchema::new(
                    "mappings",
                    core_types::block([
                        AttributeSchema::new("native_cidr", core_types::cidr()).required()
                    ]),
                ),
            ]),
        )
        .max_items(1),
        AttributeSchema::new("href", AttributeType::String).computed(),
        AttributeSchema::new("state", AttributeType::String).computed(),
    ]
}

/// Peering type of a connection, stored upper-case
pub fn peering() -> AttributeSchema {
    AttributeSchema::new("peering", pureport_types::peering_type())
        .case_insensitive()
        .with_state_func(str::to_uppercase)
        .with_default(Value::string(pureport_types::PEERING_PRIVATE))
        .with_description("The peering configuration to use for this connection Public/Private")
}
