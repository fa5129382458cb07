//! Pureport Provider implementation
//!
//! Maps connection, network and listing resources onto the Pureport REST
//! API through a shared [`Session`].

use std::time::Instant;

use log::{debug, info};
use regex::Regex;
use serde::de::DeserializeOwned;
use strata_core::provider::{ProviderError, ProviderResult};
use strata_core::resource::{Resource, ResourceId, State, Value};

use crate::client::{PureportError, Session};
use crate::config::{PureportConfig, Settings};
use crate::flatten::{
    expand_connection, expand_network, flatten_cloud_region, flatten_cloud_service,
    flatten_connection, flatten_location, flatten_network,
};
use crate::models::{CloudRegion, CloudService, Connection, Location, Network};
use crate::resources::{CLOUD_REGIONS, CLOUD_SERVICES, ConnectionKind, LOCATIONS, NETWORK};

/// Connection state reported once a delete has gone through
const STATE_DELETED: &str = "DELETED";

/// Pureport Provider
pub struct PureportProvider {
    session: Session,
}

impl PureportProvider {
    pub fn new(settings: Settings) -> Result<Self, PureportError> {
        Ok(Self {
            session: Session::new(settings)?,
        })
    }

    /// Build from a `pureport` provider block, filling gaps from the environment
    pub fn from_block(block: &serde_json::Value) -> Result<Self, PureportError> {
        Self::new(PureportConfig::from_block(block)?.resolve()?)
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    // =========================================================================
    // CRUD Dispatch
    // =========================================================================

    pub async fn read_resource(
        &self,
        id: &ResourceId,
        identifier: Option<&str>,
    ) -> ProviderResult<State> {
        let Some(identifier) = identifier else {
            return Ok(State::not_found(id.clone()));
        };
        if let Some(kind) = ConnectionKind::from_resource_type(&id.resource_type) {
            return self.read_connection(kind, id, identifier).await;
        }
        match id.resource_type.as_str() {
            NETWORK => self.read_network(id, identifier).await,
            other => Err(unsupported(other, id)),
        }
    }

    pub async fn read_data_source_resource(&self, resource: &Resource) -> ProviderResult<State> {
        let filter = name_filter(resource)?;
        let (path, key, items): (&str, &str, Vec<Value>) = match resource.id.resource_type.as_str() {
            LOCATIONS => {
                let mut items: Vec<Location> = self.list("/locations").await?;
                items.retain(|l| matches_filter(&filter, &l.name));
                items.sort_by(|a, b| a.id.cmp(&b.id));
                ("/locations", "locations", items.iter().map(flatten_location).collect())
            }
            CLOUD_REGIONS => {
                let mut items: Vec<CloudRegion> = self.list("/cloudRegions").await?;
                items.retain(|r| matches_filter(&filter, &r.name));
                items.sort_by(|a, b| a.id.cmp(&b.id));
                ("/cloudRegions", "regions", items.iter().map(flatten_cloud_region).collect())
            }
            CLOUD_SERVICES => {
                let mut items: Vec<CloudService> = self.list("/cloudServices").await?;
                items.retain(|s| matches_filter(&filter, &s.name));
                items.sort_by(|a, b| a.id.cmp(&b.id));
                ("/cloudServices", "services", items.iter().map(flatten_cloud_service).collect())
            }
            other => return Err(unsupported(other, &resource.id)),
        };
        debug!("{} returned {} item(s)", path, items.len());

        let mut attributes = resource.attributes.clone();
        attributes.insert(key.to_string(), Value::List(items));
        Ok(State::existing(resource.id.clone(), attributes).with_identifier(path))
    }

    pub async fn create_resource(&self, resource: Resource) -> ProviderResult<State> {
        if let Some(kind) = ConnectionKind::from_resource_type(&resource.id.resource_type) {
            return self.create_connection(kind, &resource).await;
        }
        match resource.id.resource_type.as_str() {
            NETWORK => self.create_network(&resource).await,
            other => Err(unsupported(other, &resource.id)),
        }
    }

    pub async fn update_resource(
        &self,
        id: &ResourceId,
        identifier: &str,
        to: Resource,
    ) -> ProviderResult<State> {
        if let Some(kind) = ConnectionKind::from_resource_type(&id.resource_type) {
            return self.update_connection(kind, identifier, &to).await;
        }
        match id.resource_type.as_str() {
            NETWORK => self.update_network(identifier, &to).await,
            other => Err(unsupported(other, id)),
        }
    }

    pub async fn delete_resource(&self, id: &ResourceId, identifier: &str) -> ProviderResult<()> {
        if let Some(kind) = ConnectionKind::from_resource_type(&id.resource_type) {
            return self.delete_connection(kind, identifier).await;
        }
        match id.resource_type.as_str() {
            NETWORK => self.delete_network(identifier).await,
            other => Err(unsupported(other, id)),
        }
    }

    async fn list<T: DeserializeOwned>(&self, path: &str) -> ProviderResult<Vec<T>> {
        let items: Option<Vec<T>> = self
            .session
            .get(path)
            .await
            .map_err(|e| error(format!("Error listing {}", path), e))?;
        Ok(items.unwrap_or_default())
    }

    // =========================================================================
    // Connections
    // =========================================================================

    async fn create_connection(
        &self,
        kind: ConnectionKind,
        resource: &Resource,
    ) -> ProviderResult<State> {
        let connection = expand_connection(kind, resource)?;
        let network_id = connection.base().network.id.clone();
        info!(
            "Creating new {} {:?} in network {}",
            kind.display_name(),
            connection.base().name,
            network_id
        );

        let response = self
            .session
            .post(&format!("/networks/{}/connections", network_id), &connection)
            .await
            .map_err(|e| error(format!("Error Creating new {}", kind.display_name()), e))?;
        let connection_id = response.location_id().map_err(|e| {
            error(
                format!("Error when decoding {} ID", kind.display_name()),
                e,
            )
        })?;
        debug!("Created {} {}", kind.display_name(), connection_id);

        let state = self
            .read_connection(kind, &resource.id, &connection_id)
            .await?;
        if !state.exists {
            return Err(ProviderError::new(format!(
                "{} {} disappeared after creation",
                kind.display_name(),
                connection_id
            ))
            .for_resource(resource.id.clone()));
        }
        Ok(state)
    }

    async fn read_connection(
        &self,
        kind: ConnectionKind,
        id: &ResourceId,
        connection_id: &str,
    ) -> ProviderResult<State> {
        let connection: Option<Connection> = self
            .session
            .get(&format!("/connections/{}", connection_id))
            .await
            .map_err(|e| {
                error(
                    format!("Error reading data for {}", kind.display_name()),
                    e,
                )
            })?;

        let Some(connection) = connection else {
            debug!(
                "{} {} was not found - removing from state!",
                kind.display_name(),
                connection_id
            );
            return Ok(State::not_found(id.clone()));
        };

        if is_deleted(&connection) {
            debug!(
                "{} {} is deleted - removing from state!",
                kind.display_name(),
                connection_id
            );
            return Ok(State::not_found(id.clone()));
        }

        if connection.type_name() != kind.type_name() {
            return Err(ProviderError::new(format!(
                "Connection {} is of type {}, expected {}",
                connection_id,
                connection.type_name(),
                kind.type_name()
            ))
            .for_resource(id.clone()));
        }

        Ok(State::existing(id.clone(), flatten_connection(&connection))
            .with_identifier(connection_id))
    }

    async fn update_connection(
        &self,
        kind: ConnectionKind,
        connection_id: &str,
        resource: &Resource,
    ) -> ProviderResult<State> {
        let mut connection = expand_connection(kind, resource)?;
        set_connection_id(&mut connection, connection_id);
        info!("Updating {} {}", kind.display_name(), connection_id);

        self.session
            .put(&format!("/connections/{}", connection_id), &connection)
            .await
            .map_err(|e| error(format!("Error updating {}", kind.display_name()), e))?;
        self.read_connection(kind, &resource.id, connection_id).await
    }

    async fn delete_connection(&self, kind: ConnectionKind, connection_id: &str) -> ProviderResult<()> {
        let path = format!("/connections/{}", connection_id);
        info!("Deleting {} {}", kind.display_name(), connection_id);

        let deleted = self
            .session
            .delete(&path)
            .await
            .map_err(|e| error(format!("Error deleting {}", kind.display_name()), e))?;
        if !deleted {
            debug!(
                "{} {} was already gone",
                kind.display_name(),
                connection_id
            );
            return Ok(());
        }

        // Deletion is asynchronous; wait until the connection is gone
        let settings = self.session.settings();
        let deadline = Instant::now() + settings.delete_timeout;
        loop {
            let connection: Option<Connection> = self.session.get(&path).await.map_err(|e| {
                error(
                    format!("Error waiting for {} deletion", kind.display_name()),
                    e,
                )
            })?;
            match connection.as_ref() {
                None => return Ok(()),
                Some(c) if is_deleted(c) => return Ok(()),
                Some(c) => debug!(
                    "{} {} still {}",
                    kind.display_name(),
                    connection_id,
                    c.base().state.as_deref().unwrap_or("present")
                ),
            }

            if Instant::now() + settings.polling_interval > deadline {
                return Err(error(
                    format!("Error waiting for {} deletion", kind.display_name()),
                    PureportError::Timeout(settings.delete_timeout),
                ));
            }
            tokio::time::sleep(settings.polling_interval).await;
        }
    }

    // =========================================================================
    // pureport_network
    // =========================================================================

    async fn create_network(&self, resource: &Resource) -> ProviderResult<State> {
        let (account_id, network) = expand_network(resource)?;
        info!("Creating network {:?} in account {}", network.name, account_id);

        let response = self
            .session
            .post(&format!("/accounts/{}/networks", account_id), &network)
            .await
            .map_err(|e| error("Error creating Network", e))?;
        let network_id = response
            .location_id()
            .map_err(|e| error("Error when decoding Network ID", e))?;

        let state = self.read_network(&resource.id, &network_id).await?;
        if !state.exists {
            return Err(ProviderError::new(format!(
                "Network {} disappeared after creation",
                network_id
            ))
            .for_resource(resource.id.clone()));
        }
        Ok(state)
    }

    async fn read_network(&self, id: &ResourceId, network_id: &str) -> ProviderResult<State> {
        let network: Option<Network> = self
            .session
            .get(&format!("/networks/{}", network_id))
            .await
            .map_err(|e| error("Error reading data for Network", e))?;
        let Some(network) = network else {
            debug!("Network {} was not found - removing from state!", network_id);
            return Ok(State::not_found(id.clone()));
        };
        Ok(State::existing(id.clone(), flatten_network(&network)).with_identifier(network_id))
    }

    async fn update_network(&self, network_id: &str, resource: &Resource) -> ProviderResult<State> {
        let (_, mut network) = expand_network(resource)?;
        network.id = Some(network_id.to_string());
        info!("Updating network {}", network_id);

        self.session
            .put(&format!("/networks/{}", network_id), &network)
            .await
            .map_err(|e| error("Error updating Network", e))?;
        self.read_network(&resource.id, network_id).await
    }

    async fn delete_network(&self, network_id: &str) -> ProviderResult<()> {
        info!("Deleting network {}", network_id);
        let deleted = self
            .session
            .delete(&format!("/networks/{}", network_id))
            .await
            .map_err(|e| error("Error deleting Network", e))?;
        if !deleted {
            debug!("Network {} was already gone", network_id);
        }
        Ok(())
    }
}

fn is_deleted(connection: &Connection) -> bool {
    connection
        .base()
        .state
        .as_deref()
        .is_some_and(|state| state.eq_ignore_ascii_case(STATE_DELETED))
}

fn set_connection_id(connection: &mut Connection, connection_id: &str) {
    let base = match connection {
        Connection::Aws(c) => &mut c.base,
        Connection::Azure(c) => &mut c.base,
        Connection::GoogleCloud(c) => &mut c.base,
        Connection::Dummy(c) => &mut c.base,
    };
    base.id = Some(connection_id.to_string());
}

fn name_filter(resource: &Resource) -> ProviderResult<Option<Regex>> {
    resource
        .get_str("name_regex")
        .map(|pattern| {
            Regex::new(pattern).map_err(|e| {
                ProviderError::new(format!("invalid name_regex {:?}: {}", pattern, e))
                    .for_resource(resource.id.clone())
            })
        })
        .transpose()
}

fn matches_filter(filter: &Option<Regex>, name: &str) -> bool {
    filter.as_ref().is_none_or(|re| re.is_match(name))
}

fn error(context: impl std::fmt::Display, e: PureportError) -> ProviderError {
    ProviderError::new(format!("{}: {}", context, e)).with_cause(e)
}

fn unsupported(resource_type: &str, id: &ResourceId) -> ProviderError {
    let message = match resource_type {
        LOCATIONS | CLOUD_REGIONS | CLOUD_SERVICES => {
            format!("{} is a data source and can only be read", resource_type)
        }
        _ => format!("Unsupported resource type: {}", resource_type),
    };
    ProviderError::new(message).for_resource(id.clone())
}
