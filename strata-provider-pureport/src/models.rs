//! Pureport API wire models

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub href: String,
}

impl Link {
    pub fn new(id: impl Into<String>, href: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            href: href.into(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerNetwork {
    pub name: String,
    pub address: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NatMapping {
    pub native_cidr: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nat_cidr: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NatConfig {
    pub enabled: bool,
    #[serde(default)]
    pub mappings: Vec<NatMapping>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeeringConfiguration {
    #[serde(rename = "type")]
    pub peering_type: String,
}

/// Fields shared by every connection type
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionBase {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub href: Option<String>,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub speed: i32,
    #[serde(default)]
    pub high_availability: bool,
    pub billing_term: String,
    pub location: Link,
    pub network: Link,
    #[serde(default)]
    pub customer_networks: Vec<CustomerNetwork>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nat: Option<NatConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AwsConnection {
    #[serde(flatten)]
    pub base: ConnectionBase,
    pub aws_account_id: String,
    pub aws_region: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub peering: Option<PeeringConfiguration>,
    #[serde(default)]
    pub cloud_services: Vec<Link>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AzureExpressRouteConnection {
    #[serde(flatten)]
    pub base: ConnectionBase,
    pub service_key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub peering: Option<PeeringConfiguration>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoogleCloudInterconnectConnection {
    #[serde(flatten)]
    pub base: ConnectionBase,
    pub primary_pairing_key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secondary_pairing_key: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DummyConnection {
    #[serde(flatten)]
    pub base: ConnectionBase,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub peering: Option<PeeringConfiguration>,
}

/// A connection, discriminated by its `type` field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Connection {
    #[serde(rename = "AWS_DIRECT_CONNECT")]
    Aws(AwsConnection),
    #[serde(rename = "AZURE_EXPRESS_ROUTE")]
    Azure(AzureExpressRouteConnection),
    #[serde(rename = "GOOGLE_CLOUD_INTERCONNECT")]
    GoogleCloud(GoogleCloudInterconnectConnection),
    #[serde(rename = "DUMMY")]
    Dummy(DummyConnection),
}

impl Connection {
    pub fn base(&self) -> &ConnectionBase {
        match self {
            Connection::Aws(c) => &c.base,
            Connection::Azure(c) => &c.base,
            Connection::GoogleCloud(c) => &c.base,
            Connection::Dummy(c) => &c.base,
        }
    }

    /// Wire name of the connection type
    pub fn type_name(&self) -> &'static str {
        match self {
            Connection::Aws(_) => "AWS_DIRECT_CONNECT",
            Connection::Azure(_) => "AZURE_EXPRESS_ROUTE",
            Connection::GoogleCloud(_) => "GOOGLE_CLOUD_INTERCONNECT",
            Connection::Dummy(_) => "DUMMY",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Network {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub href: Option<String>,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account: Option<Link>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub id: String,
    #[serde(default)]
    pub href: String,
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CloudRegion {
    pub id: String,
    #[serde(default)]
    pub href: String,
    #[serde(default, rename = "displayName", alias = "name")]
    pub name: String,
    #[serde(default)]
    pub provider: String,
    #[serde(default)]
    pub identifier: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CloudService {
    pub id: String,
    #[serde(default)]
    pub href: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub provider: String,
    #[serde(default)]
    pub service: String,
    #[serde(default)]
    pub ipv4_prefix_count: i64,
    #[serde(default)]
    pub ipv6_prefix_count: i64,
    #[serde(default)]
    pub cloud_region: Option<Link>,
}

#[derive(Debug, Clone, Serialize)]
pub struct LoginRequest<'a> {
    pub key: &'a str,
    pub secret: &'a str,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginResponse {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
}
