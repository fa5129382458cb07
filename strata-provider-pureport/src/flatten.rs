//! Expand configuration attributes into wire models and flatten API
//! objects back into state attributes

use std::collections::HashMap;

use strata_core::provider::{ProviderError, ProviderResult};
use strata_core::resource::{Resource, Value};

use crate::models::{
    AwsConnection, AzureExpressRouteConnection, CloudRegion, CloudService, Connection,
    ConnectionBase, CustomerNetwork, DummyConnection, GoogleCloudInterconnectConnection, Link,
    Location, NatConfig, NatMapping, Network, PeeringConfiguration,
};
use crate::resources::ConnectionKind;
use crate::schemas::network::account_id;

pub fn required_str<'a>(resource: &'a Resource, key: &str) -> ProviderResult<&'a str> {
    resource.get_str(key).ok_or_else(|| {
        ProviderError::new(format!("{:?} is required", key)).for_resource(resource.id.clone())
    })
}

fn optional_string(resource: &Resource, key: &str) -> Option<String> {
    resource
        .get_str(key)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn block_str<'a>(block: &'a HashMap<String, Value>, key: &str) -> Option<&'a str> {
    block.get(key).and_then(|v| v.as_str())
}

fn expand_link(resource: &Resource, key: &str) -> ProviderResult<Link> {
    let block = resource.get_block(key).ok_or_else(|| {
        ProviderError::new(format!("{:?} block is required", key)).for_resource(resource.id.clone())
    })?;
    Ok(Link::new(
        block_str(block, "id").unwrap_or_default(),
        block_str(block, "href").unwrap_or_default(),
    ))
}

fn expand_customer_networks(resource: &Resource) -> Vec<CustomerNetwork> {
    resource
        .attributes
        .get("customer_networks")
        .and_then(|v| v.as_list())
        .map(|items| {
            items
                .iter()
                .filter_map(|item| item.as_map())
                .map(|item| CustomerNetwork {
                    name: block_str(item, "name").unwrap_or_default().to_string(),
                    address: block_str(item, "address").unwrap_or_default().to_string(),
                })
                .collect()
        })
        .unwrap_or_default()
}

fn expand_nat_config(resource: &Resource) -> Option<NatConfig> {
    let block = resource.get_block("nat_config")?;
    let mappings = block
        .get("mappings")
        .and_then(|v| v.as_list())
        .map(|items| {
            items
                .iter()
                .filter_map(|item| item.as_map())
                .filter_map(|item| block_str(item, "native_cidr"))
                .map(|cidr| NatMapping {
                    native_cidr: cidr.to_string(),
                    nat_cidr: None,
                })
                .collect()
        })
        .unwrap_or_default();
    Some(NatConfig {
        enabled: block.get("enabled").and_then(|v| v.as_bool()).unwrap_or(false),
        mappings,
    })
}

fn expand_peering(resource: &Resource) -> Option<PeeringConfiguration> {
    resource.get_str("peering").map(|peering| PeeringConfiguration {
        peering_type: peering.to_uppercase(),
    })
}

fn expand_connection_base(resource: &Resource) -> ProviderResult<ConnectionBase> {
    let speed = resource.get_int("speed").ok_or_else(|| {
        ProviderError::new("\"speed\" is required").for_resource(resource.id.clone())
    })?;
    Ok(ConnectionBase {
        id: None,
        href: None,
        name: required_str(resource, "name")?.to_string(),
        description: optional_string(resource, "description"),
        speed: i32::try_from(speed).map_err(|_| {
            ProviderError::new(format!("speed {} is out of range", speed))
                .for_resource(resource.id.clone())
        })?,
        high_availability: resource.get_bool("high_availability").unwrap_or(false),
        billing_term: required_str(resource, "billing_term")?.to_string(),
        location: expand_link(resource, "location")?,
        network: expand_link(resource, "network")?,
        customer_networks: expand_customer_networks(resource),
        nat: expand_nat_config(resource),
        state: None,
    })
}

/// Request body for creating or updating a connection
pub fn expand_connection(kind: ConnectionKind, resource: &Resource) -> ProviderResult<Connection> {
    let base = expand_connection_base(resource)?;
    let connection = match kind {
        ConnectionKind::Aws => Connection::Aws(AwsConnection {
            base,
            aws_account_id: required_str(resource, "aws_account_id")?.to_string(),
            aws_region: required_str(resource, "aws_region")?.to_string(),
            peering: expand_peering(resource),
            cloud_services: resource
                .attributes
                .get("cloud_service_hrefs")
                .and_then(|v| v.as_list())
                .map(|hrefs| {
                    hrefs
                        .iter()
                        .filter_map(|v| v.as_str())
                        .map(|href| {
                            let id = href.rsplit('/').next().unwrap_or(href);
                            Link::new(id, href)
                        })
                        .collect()
                })
                .unwrap_or_default(),
        }),
        ConnectionKind::Azure => Connection::Azure(AzureExpressRouteConnection {
            base,
            service_key: required_str(resource, "service_key")?.to_string(),
            peering: expand_peering(resource),
        }),
        ConnectionKind::GoogleCloud => {
            Connection::GoogleCloud(GoogleCloudInterconnectConnection {
                base,
                primary_pairing_key: required_str(resource, "primary_pairing_key")?.to_string(),
                secondary_pairing_key: optional_string(resource, "secondary_pairing_key"),
            })
        }
        ConnectionKind::Dummy => Connection::Dummy(DummyConnection {
            base,
            peering: expand_peering(resource),
        }),
    };
    Ok(connection)
}

fn link_block(link: &Link) -> Value {
    Value::block([
        ("id", Value::string(&link.id)),
        ("href", Value::string(&link.href)),
    ])
}

fn peering_value(peering: Option<&PeeringConfiguration>) -> Option<Value> {
    peering.map(|p| Value::string(p.peering_type.to_uppercase()))
}

/// State attributes of a connection
pub fn flatten_connection(connection: &Connection) -> HashMap<String, Value> {
    let base = connection.base();
    let mut attributes = HashMap::new();
    attributes.insert("name".to_string(), Value::string(&base.name));
    if let Some(description) = base.description.as_ref().filter(|d| !d.is_empty()) {
        attributes.insert("description".to_string(), Value::string(description));
    }
    attributes.insert("speed".to_string(), Value::Int(i64::from(base.speed)));
    attributes.insert(
        "high_availability".to_string(),
        Value::Bool(base.high_availability),
    );
    attributes.insert("billing_term".to_string(), Value::string(&base.billing_term));
    attributes.insert("location".to_string(), link_block(&base.location));
    attributes.insert("network".to_string(), link_block(&base.network));
    attributes.insert(
        "customer_networks".to_string(),
        Value::List(
            base.customer_networks
                .iter()
                .map(|cn| {
                    Value::Map(HashMap::from([
                        ("name".to_string(), Value::string(&cn.name)),
                        ("address".to_string(), Value::string(&cn.address)),
                    ]))
                })
                .collect(),
        ),
    );
    if let Some(nat) = &base.nat {
        let mappings = nat
            .mappings
            .iter()
            .map(|m| {
                Value::Map(HashMap::from([(
                    "native_cidr".to_string(),
                    Value::string(&m.native_cidr),
                )]))
            })
            .collect();
        attributes.insert(
            "nat_config".to_string(),
            Value::block([
                ("enabled", Value::Bool(nat.enabled)),
                ("mappings", Value::List(mappings)),
            ]),
        );
    }
    if let Some(href) = &base.href {
        attributes.insert("href".to_string(), Value::string(href));
    }
    if let Some(state) = &base.state {
        attributes.insert("state".to_string(), Value::string(state));
    }

    let peering = match connection {
        Connection::Aws(aws) => {
            attributes.insert(
                "aws_account_id".to_string(),
                Value::string(&aws.aws_account_id),
            );
            attributes.insert("aws_region".to_string(), Value::string(&aws.aws_region));
            attributes.insert(
                "cloud_service_hrefs".to_string(),
                Value::List(
                    aws.cloud_services
                        .iter()
                        .map(|s| Value::string(&s.href))
                        .collect(),
                ),
            );
            peering_value(aws.peering.as_ref())
        }
        Connection::Azure(azure) => {
            attributes.insert(
                "service_key".to_string(),
                Value::string(&azure.service_key),
            );
            peering_value(azure.peering.as_ref())
        }
        Connection::GoogleCloud(google) => {
            attributes.insert(
                "primary_pairing_key".to_string(),
                Value::string(&google.primary_pairing_key),
            );
            if let Some(key) = &google.secondary_pairing_key {
                attributes.insert("secondary_pairing_key".to_string(), Value::string(key));
            }
            None
        }
        Connection::Dummy(dummy) => peering_value(dummy.peering.as_ref()),
    };
    if let Some(peering) = peering {
        attributes.insert("peering".to_string(), peering);
    }
    attributes
}

/// Request body for a network, and the account it belongs to
pub fn expand_network(resource: &Resource) -> ProviderResult<(String, Network)> {
    let account_href = required_str(resource, "account_href")?;
    let account = account_id(account_href).ok_or_else(|| {
        ProviderError::new(format!("invalid account_href {:?}", account_href))
            .for_resource(resource.id.clone())
    })?;
    let network = Network {
        id: None,
        href: None,
        name: required_str(resource, "name")?.to_string(),
        description: optional_string(resource, "description"),
        account: Some(Link::new(account, account_href)),
    };
    Ok((account.to_string(), network))
}

pub fn flatten_network(network: &Network) -> HashMap<String, Value> {
    let mut attributes = HashMap::new();
    attributes.insert("name".to_string(), Value::string(&network.name));
    if let Some(description) = network.description.as_ref().filter(|d| !d.is_empty()) {
        attributes.insert("description".to_string(), Value::string(description));
    }
    if let Some(account) = &network.account {
        attributes.insert("account_href".to_string(), Value::string(&account.href));
    }
    if let Some(href) = &network.href {
        attributes.insert("href".to_string(), Value::string(href));
    }
    attributes
}

fn entry<const N: usize>(fields: [(&str, Value); N]) -> Value {
    Value::Map(
        fields
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect(),
    )
}

pub fn flatten_location(location: &Location) -> Value {
    entry([
        ("id", Value::string(&location.id)),
        ("href", Value::string(&location.href)),
        ("name", Value::string(&location.name)),
    ])
}

pub fn flatten_cloud_region(region: &CloudRegion) -> Value {
    entry([
        ("id", Value::string(&region.id)),
        ("name", Value::string(&region.name)),
        ("provider", Value::string(&region.provider)),
        ("identifier", Value::string(&region.identifier)),
    ])
}

pub fn flatten_cloud_service(service: &CloudService) -> Value {
    entry([
        ("id", Value::string(&service.id)),
        ("href", Value::string(&service.href)),
        ("name", Value::string(&service.name)),
        ("provider", Value::string(&service.provider)),
        ("service", Value::string(&service.service)),
        ("ipv4_prefix_count", Value::Int(service.ipv4_prefix_count)),
        ("ipv6_prefix_count", Value::Int(service.ipv6_prefix_count)),
        (
            "cloud_region_id",
            Value::string(
                service
                    .cloud_region
                    .as_ref()
                    .map(|r| r.id.as_str())
                    .unwrap_or_default(),
            ),
        ),
    ])
}

#[cfg(test)]
mod tests {
    use strata_core::resource::Resource;

    use super::*;
    use crate::resources::{AWS_CONNECTION, AZURE_CONNECTION, NETWORK};

    fn link(id: &str, href: &str) -> Value {
        Value::block([("id", Value::string(id)), ("href", Value::string(href))])
    }

    fn azure_resource() -> Resource {
        Resource::new(AZURE_CONNECTION, "er")
            .with_attribute("name", Value::string("er"))
            .with_attribute("speed", Value::Int(100))
            .with_attribute("billing_term", Value::string("HOURLY"))
            .with_attribute("location", link("us-sea", "/locations/us-sea"))
            .with_attribute("network", link("net-1", "/networks/net-1"))
            .with_attribute("service_key", Value::string("sk-1"))
            .with_attribute("peering", Value::string("public"))
            .with_attribute(
                "nat_config",
                Value::block([
                    ("enabled", Value::Bool(true)),
                    (
                        "mappings",
                        Value::List(vec![Value::Map(HashMap::from([(
                            "native_cidr".to_string(),
                            Value::string("10.0.0.0/24"),
                        )]))]),
                    ),
                ]),
            )
    }

    #[test]
    fn expands_azure_connection() {
        let connection = expand_connection(ConnectionKind::Azure, &azure_resource()).unwrap();
        let Connection::Azure(azure) = &connection else {
            panic!("expected azure connection");
        };
        assert_eq!(azure.service_key, "sk-1");
        assert_eq!(azure.peering.as_ref().unwrap().peering_type, "PUBLIC");
        assert_eq!(azure.base.location, Link::new("us-sea", "/locations/us-sea"));
        assert!(!azure.base.high_availability);
        let nat = azure.base.nat.as_ref().unwrap();
        assert!(nat.enabled);
        assert_eq!(nat.mappings[0].native_cidr, "10.0.0.0/24");
    }

    #[test]
    fn missing_location_is_an_error() {
        let mut resource = azure_resource();
        resource.attributes.remove("location");
        let err = expand_connection(ConnectionKind::Azure, &resource).unwrap_err();
        assert!(err.to_string().contains("location"));
    }

    #[test]
    fn flatten_restores_configured_attributes() {
        let mut connection = expand_connection(ConnectionKind::Azure, &azure_resource()).unwrap();
        if let Connection::Azure(azure) = &mut connection {
            azure.base.state = Some("ACTIVE".to_string());
        }
        let attributes = flatten_connection(&connection);
        assert_eq!(attributes["peering"], Value::string("PUBLIC"));
        assert_eq!(attributes["speed"], Value::Int(100));
        assert_eq!(attributes["location"], link("us-sea", "/locations/us-sea"));
        assert_eq!(attributes["state"], Value::string("ACTIVE"));
        assert_eq!(attributes["customer_networks"], Value::List(Vec::new()));
        assert!(!attributes.contains_key("description"));
    }

    #[test]
    fn aws_cloud_services_round_trip_through_hrefs() {
        let mut resource = azure_resource()
            .with_attribute("aws_account_id", Value::string("123456789012"))
            .with_attribute("aws_region", Value::string("us-west-2"))
            .with_attribute(
                "cloud_service_hrefs",
                Value::List(vec![Value::string("/cloudServices/aws-s3-us-west-2")]),
            );
        resource.id = strata_core::resource::ResourceId::new(AWS_CONNECTION, "dx");

        let connection = expand_connection(ConnectionKind::Aws, &resource).unwrap();
        let Connection::Aws(aws) = &connection else {
            panic!("expected aws connection");
        };
        assert_eq!(aws.cloud_services[0].id, "aws-s3-us-west-2");

        let attributes = flatten_connection(&connection);
        assert_eq!(
            attributes["cloud_service_hrefs"],
            Value::List(vec![Value::string("/cloudServices/aws-s3-us-west-2")])
        );
    }

    #[test]
    fn expands_network_with_account() {
        let resource = Resource::new(NETWORK, "net")
            .with_attribute("name", Value::string("net"))
            .with_attribute("account_href", Value::string("/accounts/ac-1"));
        let (account, network) = expand_network(&resource).unwrap();
        assert_eq!(account, "ac-1");
        assert_eq!(network.account.unwrap().href, "/accounts/ac-1");
    }
}
