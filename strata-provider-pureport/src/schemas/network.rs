//! pureport_network schema

use strata_core::schema::{AttributeSchema, AttributeType, ResourceSchema, types};

use crate::resources::NETWORK;

/// `/accounts/{id}`, the owning account of a network
const ACCOUNT_HREF_PATTERN: &str = r"^/accounts/[^/]+$";

pub fn schema() -> ResourceSchema {
    ResourceSchema::new(NETWORK)
        .with_description("Pureport network, the container connections attach to")
        .attribute(AttributeSchema::new("name", AttributeType::String).required())
        .attribute(AttributeSchema::new("description", AttributeType::String))
        .attribute(
            AttributeSchema::new(
                "account_href",
                types::string_match(ACCOUNT_HREF_PATTERN, "account_href must look like /accounts/{id}"),
            )
            .required()
            .force_new(),
        )
        .attribute(AttributeSchema::new("href", AttributeType::String).computed())
}

/// Account id from an `account_href`
pub fn account_id(account_href: &str) -> Option<&str> {
    account_href
        .strip_prefix("/accounts/")
        .filter(|id| !id.is_empty() && !id.contains('/'))
}
