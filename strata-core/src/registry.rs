//! Registry - Route resource operations to the owning provider
//!
//! Resource type names carry their provider as a prefix
//! (`azurerm_ddos_protection_plan`, `pureport_network`). The registry holds
//! every configured provider and itself implements `Provider`, so the
//! interpreter can drive a mixed configuration through a single value.

use crate::provider::{BoxFuture, Provider, ProviderError, ProviderResult, ResourceType};
use crate::resource::{Resource, ResourceId, State};
use crate::schema::ResourceSchema;

#[derive(Default)]
pub struct ProviderRegistry {
    providers: Vec<Box<dyn Provider>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, provider: Box<dyn Provider>) {
        self.providers.push(provider);
    }

    pub fn with_provider(mut self, provider: Box<dyn Provider>) -> Self {
        self.register(provider);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    /// Provider owning the given resource type
    pub fn provider_for(&self, resource_type: &str) -> ProviderResult<&dyn Provider> {
        self.providers
            .iter()
            .find(|p| {
                resource_type
                    .strip_prefix(p.name())
                    .is_some_and(|rest| rest.starts_with('_'))
            })
            .map(|p| p.as_ref())
            .ok_or_else(|| {
                ProviderError::new(format!(
                    "No configured provider handles resource type '{}'",
                    resource_type
                ))
            })
    }

    /// Schema for a resource type, if any provider declares it
    pub fn schema_for(&self, resource_type: &str) -> Option<ResourceSchema> {
        self.providers
            .iter()
            .flat_map(|p| p.resource_types())
            .find(|t| t.name() == resource_type)
            .map(|t| t.schema())
    }

    /// Schemas of every resource type across all providers
    pub fn all_schemas(&self) -> Vec<ResourceSchema> {
        self.providers
            .iter()
            .flat_map(|p| p.resource_types())
            .map(|t| t.schema())
            .collect()
    }
}

impl Provider for ProviderRegistry {
    fn name(&self) -> &'static str {
        "registry"
    }

    fn resource_types(&self) -> Vec<Box<dyn ResourceType>> {
        self.providers
            .iter()
            .flat_map(|p| p.resource_types())
            .collect()
    }

    fn read(
        &self,
        id: &ResourceId,
        identifier: Option<&str>,
    ) -> BoxFuture<'_, ProviderResult<State>> {
        match self.provider_for(&id.resource_type) {
            Ok(provider) => provider.read(id, identifier),
            Err(e) => {
                let e = e.for_resource(id.clone());
                Box::pin(async move { Err(e) })
            }
        }
    }

    fn read_data_source(&self, resource: &Resource) -> BoxFuture<'_, ProviderResult<State>> {
        match self.provider_for(&resource.id.resource_type) {
            Ok(provider) => provider.read_data_source(resource),
            Err(e) => {
                let e = e.for_resource(resource.id.clone());
                Box::pin(async move { Err(e) })
            }
        }
    }

    fn create(&self, resource: &Resource) -> BoxFuture<'_, ProviderResult<State>> {
        match self.provider_for(&resource.id.resource_type) {
            Ok(provider) => provider.create(resource),
            Err(e) => {
                let e = e.for_resource(resource.id.clone());
                Box::pin(async move { Err(e) })
            }
        }
    }

    fn update(
        &self,
        id: &ResourceId,
        identifier: &str,
        from: &State,
        to: &Resource,
    ) -> BoxFuture<'_, ProviderResult<State>> {
        match self.provider_for(&id.resource_type) {
            Ok(provider) => provider.update(id, identifier, from, to),
            Err(e) => {
                let e = e.for_resource(id.clone());
                Box::pin(async move { Err(e) })
            }
        }
    }

    fn delete(
        &self,
        id: &ResourceId,
        identifier: &str,
        from: &State,
    ) -> BoxFuture<'_, ProviderResult<()>> {
        match self.provider_for(&id.resource_type) {
            Ok(provider) => provider.delete(id, identifier, from),
            Err(e) => {
                let e = e.for_resource(id.clone());
                Box::pin(async move { Err(e) })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::ResourceSchema;

    struct Named(&'static str);

    struct PlanType;

    impl ResourceType for PlanType {
        fn name(&self) -> &'static str {
            "azurerm_ddos_protection_plan"
        }

        fn schema(&self) -> ResourceSchema {
            ResourceSchema::new("azurerm_ddos_protection_plan")
        }
    }

    impl Provider for Named {
        fn name(&self) -> &'static str {
            self.0
        }

        fn resource_types(&self) -> Vec<Box<dyn ResourceType>> {
            if self.0 == "azurerm" {
                vec![Box::new(PlanType)]
            } else {
                vec![]
            }
        }

        fn read(
            &self,
            id: &ResourceId,
            _identifier: Option<&str>,
        ) -> BoxFuture<'_, ProviderResult<State>> {
            let id = id.clone();
            let owner = self.0;
            Box::pin(async move { Ok(State::not_found(id).with_identifier(owner)) })
        }

        fn read_data_source(&self, resource: &Resource) -> BoxFuture<'_, ProviderResult<State>> {
            let id = resource.id.clone();
            Box::pin(async move { Ok(State::not_found(id)) })
        }

        fn create(&self, resource: &Resource) -> BoxFuture<'_, ProviderResult<State>> {
            let id = resource.id.clone();
            Box::pin(async move { Ok(State::not_found(id)) })
        }

        fn update(
            &self,
            id: &ResourceId,
            _identifier: &str,
            _from: &State,
            _to: &Resource,
        ) -> BoxFuture<'_, ProviderResult<State>> {
            let id = id.clone();
            Box::pin(async move { Ok(State::not_found(id)) })
        }

        fn delete(
            &self,
            _id: &ResourceId,
            _identifier: &str,
            _from: &State,
        ) -> BoxFuture<'_, ProviderResult<()>> {
            Box::pin(async { Ok(()) })
        }
    }

    fn registry() -> ProviderRegistry {
        ProviderRegistry::new()
            .with_provider(Box::new(Named("pureport")))
            .with_provider(Box::new(Named("azurerm")))
    }

    #[tokio::test]
    async fn routes_by_type_prefix() {
        let registry = registry();
        let state = registry
            .read(&ResourceId::new("azurerm_automation_account", "a"), None)
            .await
            .unwrap();
        assert_eq!(state.identifier.as_deref(), Some("azurerm"));

        let state = registry
            .read(&ResourceId::new("pureport_network", "n"), None)
            .await
            .unwrap();
        assert_eq!(state.identifier.as_deref(), Some("pureport"));
    }

    #[tokio::test]
    async fn unknown_prefix_is_an_error() {
        let registry = registry();
        let err = registry
            .read(&ResourceId::new("aws_vpc", "v"), None)
            .await
            .unwrap_err();
        assert!(err.message.contains("aws_vpc"));
        // prefix must be followed by an underscore
        assert!(registry.provider_for("azurermx_plan").is_err());
    }

    #[test]
    fn schema_lookup_spans_providers() {
        let registry = registry();
        assert!(registry.schema_for("azurerm_ddos_protection_plan").is_some());
        assert!(registry.schema_for("pureport_network").is_none());
        assert_eq!(registry.all_schemas().len(), 1);
    }
}
