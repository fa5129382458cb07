//! Strata AzureRM Provider
//!
//! Azure Resource Manager provider implementation.
//!
//! ## Module Structure
//!
//! - `client` - ARM HTTP client: auth, user agent, long-running operations
//! - `config` - Provider block, environment fallbacks and cloud environments
//! - `locks` - Named locks held across mutations of shared resources
//! - `provider` - AzureRmProvider CRUD implementation
//! - `resources` - Resource type definitions and ARM configurations
//! - `schemas` - Resource and data source schemas
//! - `storage` - Storage account key cache
//! - `utils` / `validators` / `resource_id` - Helpers shared by resources

pub mod client;
pub mod config;
pub mod locks;
pub mod provider;
pub mod resource_id;
pub mod resources;
pub mod schemas;
pub mod storage;
pub mod utils;
pub mod validators;

// Re-export main types
pub use client::{ArmClient, ClientError};
pub use config::{AzureRmConfig, Environment, Settings};
pub use provider::AzureRmProvider;
pub use resource_id::{AzureResourceId, parse_azure_resource_id};
pub use utils::normalize_location;

use strata_core::provider::{BoxFuture, Provider, ProviderResult, ResourceType};
use strata_core::resource::{Resource, ResourceId, State};

use resources::resource_types;

// =============================================================================
// Provider Trait Implementation
// =============================================================================

impl Provider for AzureRmProvider {
    fn name(&self) -> &'static str {
        "azurerm"
    }

    fn resource_types(&self) -> Vec<Box<dyn ResourceType>> {
        resource_types()
    }

    fn read(
        &self,
        id: &ResourceId,
        identifier: Option<&str>,
    ) -> BoxFuture<'_, ProviderResult<State>> {
        let id = id.clone();
        let identifier = identifier.map(|s| s.to_string());
        Box::pin(async move { self.read_resource(&id, identifier.as_deref()).await })
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
        Box::pin(async move { self.create_resource(resource).await })
    }

    fn update(
        &self,
        id: &ResourceId,
        _identifier: &str,
        from: &State,
        to: &Resource,
    ) -> BoxFuture<'_, ProviderResult<State>> {
        let id = id.clone();
        let from = from.clone();
        let to = to.clone();
        Box::pin(async move { self.update_resource(&id, &from, to).await })
    }

    fn delete(
        &self,
        id: &ResourceId,
        identifier: &str,
        from: &State,
    ) -> BoxFuture<'_, ProviderResult<()>> {
        let id = id.clone();
        let identifier = identifier.to_string();
        let from = from.clone();
        Box::pin(async move { self.delete_resource(&id, &identifier, &from).await })
    }
}
