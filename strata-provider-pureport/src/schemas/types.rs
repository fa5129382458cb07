//! Pureport-specific type definitions

use strata_core::resource::Value;
use strata_core::schema::{AttributeType, types};

/// Connection speeds in Mbps offered by Pureport
pub const CONNECTION_SPEEDS: &[i64] = &[50, 100, 200, 300, 400, 500, 1000, 10000];

pub const BILLING_TERMS: &[&str] = &["HOURLY", "MONTHLY"];

pub const PEERING_PRIVATE: &str = "PRIVATE";
pub const PEERING_PUBLIC: &str = "PUBLIC";

/// AWS regions a Direct Connect connection can terminate in
const VALID_AWS_REGIONS: &[&str] = &[
    "ap-northeast-1",
    "ap-northeast-2",
    "ap-northeast-3",
    "ap-southeast-1",
    "ap-southeast-2",
    "ap-south-1",
    "us-east-1",
    "us-east-2",
    "us-west-1",
    "us-west-2",
    "eu-west-1",
    "eu-west-2",
    "eu-west-3",
    "eu-central-1",
    "eu-north-1",
    "ca-central-1",
    "sa-east-1",
];

/// Connection speed in Mbps
pub fn connection_speed() -> AttributeType {
    AttributeType::Custom {
        name: "ConnectionSpeed".to_string(),
        base: Box::new(AttributeType::Int),
        validate: |value| match value {
            Value::Int(n) if CONNECTION_SPEEDS.contains(n) => Ok(()),
            Value::Int(n) => Err(format!(
                "Invalid speed {}, expected one of: {}",
                n,
                CONNECTION_SPEEDS
                    .iter()
                    .map(|s| s.to_string())
                    .collect::<Vec<_>>()
                    .join(", ")
            )),
            _ => Err("Expected integer".to_string()),
        },
    }
}

pub fn billing_term() -> AttributeType {
    types::string_in(BILLING_TERMS, false)
}

/// Peering type; configuration may use either case
pub fn peering_type() -> AttributeType {
    types::string_in(&[PEERING_PRIVATE, PEERING_PUBLIC], true)
}

/// AWS region, e.g. "us-west-2"
pub fn aws_region() -> AttributeType {
    AttributeType::Custom {
        name: "AwsRegion".to_string(),
        base: Box::new(AttributeType::String),
        validate: |value| {
            if let Value::String(s) = value {
                if VALID_AWS_REGIONS.contains(&s.as_str()) {
                    Ok(())
                } else {
                    Err(format!(
                        "Invalid region '{}', expected one of: {}",
                        s,
                        VALID_AWS_REGIONS.join(", ")
                    ))
                }
            } else {
                Err("Expected string".to_string())
            }
        },
    }
}

/// Twelve-digit AWS account id
pub fn aws_account_id() -> AttributeType {
    types::string_match(r"^[0-9]{12}$", "AWS account id must be 12 digits")
}

/// Regular expression used to filter data source results
pub fn name_regex() -> AttributeType {
    AttributeType::Custom {
        name: "NameRegex".to_string(),
        base: Box::new(AttributeType::String),
        validate: |value| {
            if let Value::String(s) = value {
                regex::Regex::new(s)
                    .map(|_| ())
                    .map_err(|e| format!("Invalid regular expression '{}': {}", s, e))
            } else {
                Err("Expected string".to_string())
            }
        },
    }
}
