//! azurerm_ddos_protection_plan schema

use strata_core::schema::{AttributeSchema, AttributeType, ResourceSchema, types};

use crate::resources::DDOS_PROTECTION_PLAN;

const DEPRECATION: &str = "The 'azurerm_ddos_protection_plan' resource is deprecated in favour \
of the renamed version 'azurerm_network_ddos_protection_plan' and will be removed in the next \
major version of the provider.";

pub fn schema() -> ResourceSchema {
    ResourceSchema::new(DDOS_PROTECTION_PLAN)
        .with_description("Azure DDoS Protection Plan")
        .with_deprecation(DEPRECATION)
        .attribute(
            AttributeSchema::new("name", AttributeType::String)
                .required()
                .force_new(),
        )
        .attribute(super::location())
        .attribute(super::resource_group_name())
        .attribute(
            AttributeSchema::new("virtual_network_ids", types::string_list())
                .computed()
                .with_description("IDs of the Virtual Networks associated with the plan"),
        )
        .attribute(super::tags())
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use strata_core::resource::Value;

    use super::*;

    #[test]
    fn virtual_network_ids_cannot_be_configured() {
        let attrs = HashMap::from([
            ("name".to_string(), Value::string("plan1")),
            ("location".to_string(), Value::string("westeurope")),
            ("resource_group_name".to_string(), Value::string("rg")),
            (
                "virtual_network_ids".to_string(),
                Value::List(vec![Value::string("/subscriptions/x")]),
            ),
        ]);
        let errors = schema().validate(&attrs).unwrap_err();
        assert_eq!(errors.len(), 1);
    }

    #[test]
    fn name_and_group_force_replacement() {
        let schema = schema();
        assert!(schema.is_force_new("name"));
        assert!(schema.is_force_new("resource_group_name"));
        assert!(!schema.is_force_new("tags"));
        assert!(schema.deprecation_message.is_some());
    }
}
