//! Connection resource schemas

use strata_core::schema::{AttributeSchema, AttributeType, ResourceSchema, types as core_types};

use super::types as pureport_types;
use crate::resources::{AWS_CONNECTION, AZURE_CONNECTION, DUMMY_CONNECTION, GOOGLE_CLOUD_CONNECTION};

pub fn schemas() -> Vec<ResourceSchema> {
    vec![
        aws_schema(),
        azure_schema(),
        google_cloud_schema(),
        dummy_schema(),
    ]
}

fn base(resource_type: &str) -> ResourceSchema {
    ResourceSchema::new(resource_type).attributes(super::base_connection_attributes())
}

pub fn aws_schema() -> ResourceSchema {
    base(AWS_CONNECTION)
        .with_description("Pureport connection to AWS Direct Connect")
        .attribute(
            AttributeSchema::new("aws_account_id", pureport_types::aws_account_id())
                .required()
                .force_new(),
        )
        .attribute(
            AttributeSchema::new("aws_region", pureport_types::aws_region())
                .required()
                .force_new(),
        )
        .attribute(super::peering())
        .attribute(AttributeSchema::new(
            "cloud_service_hrefs",
            core_types::string_list(),
        ))
}

pub fn azure_schema() -> ResourceSchema {
    base(AZURE_CONNECTION)
        .with_description("Pureport connection to Azure ExpressRoute")
        .attribute(
            AttributeSchema::new("service_key", AttributeType::String)
                .required()
                .sensitive(),
        )
        .attribute(super::peering())
}

pub fn google_cloud_schema() -> ResourceSchema {
    base(GOOGLE_CLOUD_CONNECTION)
        .with_description("Pureport connection to Google Cloud Interconnect")
        .attribute(
            AttributeSchema::new("primary_pairing_key", AttributeType::String)
                .required()
                .force_new(),
        )
        .attribute(
            AttributeSchema::new("secondary_pairing_key", AttributeType::String).force_new(),
        )
}

pub fn dummy_schema() -> ResourceSchema {
    base(DUMMY_CONNECTION)
        .with_description("Pureport test connection with no cloud side")
        .attribute(super::peering())
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use strata_core::resource::Value;

    use super::*;

    fn link(id: &str) -> Value {
        Value::block([
            ("id", Value::string(id)),
            ("href", Value::string(format!("/x/{}", id))),
        ])
    }

    fn base_attrs() -> HashMap<String, Value> {
        HashMap::from([
            ("name".to_string(), Value::string("conn")),
            ("speed".to_string(), Value::Int(100)),
            ("billing_term".to_string(), Value::string("HOURLY")),
            ("location".to_string(), link("us-sea")),
            ("network".to_string(), link("net-1")),
        ])
    }

    #[test]
    fn azure_requires_service_key() {
        let mut attrs = base_attrs();
        let errors = azure_schema().validate(&attrs).unwrap_err();
        assert!(errors.iter().any(|e| e.to_string().contains("service_key")));

        attrs.insert("service_key".to_string(), Value::string("sk"));
        attrs.insert("peering".to_string(), Value::string("public"));
        assert!(azure_schema().validate(&attrs).is_ok());
    }

    #[test]
    fn rejects_unsupported_speed() {
        let mut attrs = base_attrs();
        attrs.insert("speed".to_string(), Value::Int(250));
        assert!(dummy_schema().validate(&attrs).is_err());
    }

    #[test]
    fn location_allows_one_block() {
        let mut attrs = base_attrs();
        let entry = |id: &str| {
            Value::Map(HashMap::from([
                ("id".to_string(), Value::string(id)),
                ("href".to_string(), Value::string(format!("/locations/{}", id))),
            ]))
        };
        attrs.insert(
            "location".to_string(),
            Value::List(vec![entry("a"), entry("b")]),
        );
        let errors = dummy_schema().validate(&attrs).unwrap_err();
        assert!(errors[0].to_string().contains("at most 1"));
    }

    #[test]
    fn customer_network_address_must_be_cidr() {
        let mut attrs = base_attrs();
        attrs.insert(
            "customer_networks".to_string(),
            Value::List(vec![Value::Map(HashMap::from([
                ("name".to_string(), Value::string("office")),
                ("address".to_string(), Value::string("10.0.0.0")),
            ]))]),
        );
        assert!(dummy_schema().validate(&attrs).is_err());
    }

    #[test]
    fn computed_state_cannot_be_set() {
        let mut attrs = base_attrs();
        attrs.insert("state".to_string(), Value::string("ACTIVE"));
        assert!(dummy_schema().validate(&attrs).is_err());
    }

    #[test]
    fn aws_validates_account_and_region() {
        let mut attrs = base_attrs();
        attrs.insert("aws_account_id".to_string(), Value::string("123456789012"));
        attrs.insert("aws_region".to_string(), Value::string("us-west-2"));
        assert!(aws_schema().validate(&attrs).is_ok());
        assert!(aws_schema().is_force_new("aws_region"));

        attrs.insert("aws_region".to_string(), Value::string("mars-1"));
        assert!(aws_schema().validate(&attrs).is_err());
    }

    #[test]
    fn google_cloud_requires_primary_key() {
        let mut attrs = base_attrs();
        assert!(google_cloud_schema().validate(&attrs).is_err());
        attrs.insert("primary_pairing_key".to_string(), Value::string("pk/us-west2/1"));
        assert!(google_cloud_schema().validate(&attrs).is_ok());
    }
}
