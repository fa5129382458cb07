//! Resource type definitions for the Pureport provider

use strata_core::provider::ResourceType;
use strata_core::schema::ResourceSchema;

use crate::schemas;

macro_rules! define_resource_type {
    ($name:ident, $type_name:expr, $schema:path) => {
        define_resource_type!($name, $type_name, $schema, false);
    };
    ($name:ident, $type_name:expr, $schema:path, $data_source:expr) => {
        pub struct $name;
        impl ResourceType for $name {
            fn name(&self) -> &'static str {
                $type_name
            }
            fn schema(&self) -> ResourceSchema {
                $schema()
            }
            fn is_data_source(&self) -> bool {
                $data_source
            }
        }
    };
}

pub const AWS_CONNECTION: &str = "pureport_aws_connection";
pub const AZURE_CONNECTION: &str = "pureport_azure_connection";
pub const GOOGLE_CLOUD_CONNECTION: &str = "pureport_google_cloud_connection";
pub const DUMMY_CONNECTION: &str = "pureport_dummy_connection";
pub const NETWORK: &str = "pureport_network";
pub const LOCATIONS: &str = "pureport_locations";
pub const CLOUD_REGIONS: &str = "pureport_cloud_regions";
pub const CLOUD_SERVICES: &str = "pureport_cloud_services";

define_resource_type!(AwsConnectionType, AWS_CONNECTION, schemas::connection::aws_schema);
define_resource_type!(AzureConnectionType, AZURE_CONNECTION, schemas::connection::azure_schema);
define_resource_type!(
    GoogleCloudConnectionType,
    GOOGLE_CLOUD_CONNECTION,
    schemas::connection::google_cloud_schema
);
define_resource_type!(DummyConnectionType, DUMMY_CONNECTION, schemas::connection::dummy_schema);
define_resource_type!(NetworkType, NETWORK, schemas::network::schema);
define_resource_type!(
    LocationsDataSource,
    LOCATIONS,
    schemas::data_sources::locations_schema,
    true
);
define_resource_type!(
    CloudRegionsDataSource,
    CLOUD_REGIONS,
    schemas::data_sources::cloud_regions_schema,
    true
);
define_resource_type!(
    CloudServicesDataSource,
    CLOUD_SERVICES,
    schemas::data_sources::cloud_services_schema,
    true
);

/// Returns all resource types and data sources supported by this provider
pub fn resource_types() -> Vec<Box<dyn ResourceType>> {
    vec![
        Box::new(AwsConnectionType),
        Box::new(AzureConnectionType),
        Box::new(GoogleCloudConnectionType),
        Box::new(DummyConnectionType),
        Box::new(NetworkType),
        Box::new(LocationsDataSource),
        Box::new(CloudRegionsDataSource),
        Box::new(CloudServicesDataSource),
    ]
}

/// The connection flavours, one per connection resource type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionKind {
    Aws,
    Azure,
    GoogleCloud,
    Dummy,
}

impl ConnectionKind {
    pub fn from_resource_type(resource_type: &str) -> Option<Self> {
        match resource_type {
            AWS_CONNECTION => Some(ConnectionKind::Aws),
            AZURE_CONNECTION => Some(ConnectionKind::Azure),
            GOOGLE_CLOUD_CONNECTION => Some(ConnectionKind::GoogleCloud),
            DUMMY_CONNECTION => Some(ConnectionKind::Dummy),
            _ => None,
        }
    }

    /// Wire name of the connection type
    pub fn type_name(self) -> &'static str {
        match self {
            ConnectionKind::Aws => "AWS_DIRECT_CONNECT",
            ConnectionKind::Azure => "AZURE_EXPRESS_ROUTE",
            ConnectionKind::GoogleCloud => "GOOGLE_CLOUD_INTERCONNECT",
            ConnectionKind::Dummy => "DUMMY",
        }
    }

    /// Human-readable name used in log lines and errors
    pub fn display_name(self) -> &'static str {
        match self {
            ConnectionKind::Aws => "AWS Connection",
            ConnectionKind::Azure => "Azure Connection",
            ConnectionKind::GoogleCloud => "Google Cloud Connection",
            ConnectionKind::Dummy => "Dummy Connection",
        }
    }
}
