//! azurerm_automation_account schema

use strata_core::resource::Value;
use strata_core::schema::{AttributeSchema, AttributeType, ResourceSchema, types};

use crate::resources::AUTOMATION_ACCOUNT;

pub const SKU_BASIC: &str = "Basic";
pub const SKU_FREE: &str = "Free";

const NAME_PATTERN: &str = r"^[0-9a-zA-Z]([-0-9a-zA-Z]{0,48}[0-9a-zA-Z])?$";
const NAME_MESSAGE: &str = "The account name must not be empty, and must not exceed 50 \
characters in length. The account name must start with a letter or number. The account name \
can contain letters, numbers, and dashes. The final character must be a letter or a number.";

pub fn schema() -> ResourceSchema {
    ResourceSchema::new(AUTOMATION_ACCOUNT)
        .with_description("Azure Automation Account")
        .attribute(
            AttributeSchema::new("name", types::string_match(NAME_PATTERN, NAME_MESSAGE))
                .required()
                .force_new(),
        )
        .attribute(super::location())
        .attribute(super::resource_group_name())
        .attribute(
            AttributeSchema::new(
                "sku",
                types::block([AttributeSchema::new(
                    "name",
                    types::string_in(&[SKU_BASIC, SKU_FREE], true),
                )
                .case_insensitive()
                .with_default(Value::string(SKU_BASIC))]),
            )
            .required()
            .max_items(1),
        )
        .attribute(super::tags())
        .attribute(AttributeSchema::new("dsc_server_endpoint", AttributeType::String).computed())
        .attribute(
            AttributeSchema::new("dsc_primary_access_key", AttributeType::String)
                .computed()
                .sensitive(),
        )
        .attribute(
            AttributeSchema::new("dsc_secondary_access_key", AttributeType::String)
                .computed()
                .sensitive(),
        )
}
