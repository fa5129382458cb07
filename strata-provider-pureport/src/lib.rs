//! Strata Pureport Provider
//!
//! Pureport provider implementation
//!
//! ## Module Structure
//!
//! - `client` - API session: login, retries, JSON requests
//! - `config` - Provider block, environment and credentials file
//! - `flatten` - Mapping between attributes and wire models
//! - `models` - Pureport API wire models
//! - `provider` - PureportProvider CRUD implementation
//! - `resources` - Resource type definitions
//! - `schemas` - Resource and data source schemas

pub mod client;
pub mod config;
pub mod flatten;
pub mod models;
pub mod provider;
pub mod resources;
pub mod schemas;

pub use client::{PureportError, Session};
pub use config::{PureportConfig, Settings};
pub use provider::PureportProvider;

use strata_core::provider::{BoxFuture, Provider, ProviderResult, ResourceType};
use strata_core::resource::{Resource, ResourceId, State};

impl Provider for PureportProvider {
    fn name(&self) -> &'static str {
        "pureport"
    }

    fn resource_types(&self) -> Vec<Box<dyn ResourceType>> {
        resources::resource_types()
    }

    fn read(
        &self,
        id: &ResourceId,
        identifier: Option<&str>,
    ) -> BoxFuture<'_, ProviderResult<State>> {
        let id = id.clone();
        let identifier = identifier.map(|s| s.to_string());
        Box::pin(async move {
            self.read_resource(&id, identifier.as_deref())
                .await
                .map_err(|e| e.for_resource(id.clone()))
        })
    }

    fn read_data_source(&self, resource: &Resource) -> BoxFuture<'_, ProviderResult<State>> {
        let resource = resource.clone();
        Box::pin(async move {
            self.read_data_source_resource(&resource)
                .await
                .map_err(|e| e.for_resource(resource.id.clone()))
        })
    }

    fn create(&self, resource: &Resource) -> BoxFuture<'_, ProviderResult<State>> {
        let resource = resource.clone();
        let id = resource.id.clone();
        Box::pin(async move {
            self.create_resource(resource)
                .await
                .map_err(|e| e.for_resource(id))
        })
    }

    fn update(
        &self,
        id: &ResourceId,
        identifier: &str,
        _from: &State,
        to: &Resource,
    ) -> BoxFuture<'_, ProviderResult<State>> {
        let id = id.clone();
        let identifier = identifier.to_string();
        let to = to.clone();
        Box::pin(async move {
            self.update_resource(&id, &identifier, to)
                .await
                .map_err(|e| e.for_resource(id.clone()))
        })
    }

    fn delete(
        &self,
        id: &ResourceId,
        identifier: &str,
        _from: &State,
    ) -> BoxFuture<'_, ProviderResult<()>> {
        let id = id.clone();
        let identifier = identifier.to_string();
        Box::pin(async move {
            self.delete_resource(&id, &identifier)
                .await
                .map_err(|e| e.for_resource(id.clone()))
        })
    }
}
