//! AzureRM Provider implementation
//!
//! This module contains the main provider implementation that talks to
//! Azure Resource Manager and maps ARM objects to and from `State`.

use std::collections::{BTreeSet, HashMap};

use log::{debug, info};
use serde_json::json;
use strata_core::provider::{ProviderError, ProviderResult};
use strata_core::resource::{Resource, ResourceId, State, Value};

use crate::client::{ArmClient, ClientError};
use crate::config::{AzureRmConfig, Settings};
use crate::locks::ArmLocks;
use crate::resource_id::parse_azure_resource_id;
use crate::resources::{
    AUTOMATION_ACCOUNT, AUTOMATION_ACCOUNT_CONFIG, DDOS_PROTECTION_PLAN,
    DDOS_PROTECTION_PLAN_CONFIG, MANAGED_DISK, MANAGED_DISK_CONFIG, ResourceConfig,
    VIRTUAL_NETWORK, get_resource_config,
};
use crate::storage::{StorageEndpoint, StorageKeyCache, StorageService};
use crate::utils::{expand_tags, flatten_tags, json_str, normalize_location};

/// AzureRM Provider
pub struct AzureRmProvider {
    client: ArmClient,
    locks: ArmLocks,
    storage_keys: StorageKeyCache,
}

/// Name and resource group of one ARM resource, for messages
struct Target<'a> {
    config: &'static ResourceConfig,
    name: &'a str,
    resource_group: &'a str,
}

impl Target<'_> {
    fn error(&self, action: &str, e: ClientError) -> ProviderError {
        ProviderError::new(format!(
            "Error {} {} {:?} (Resource Group {:?}): {}",
            action, self.config.display_name, self.name, self.resource_group, e
        ))
        .with_cause(e)
    }

    fn path(&self, subscription_id: &str) -> String {
        self.config
            .resource_id(subscription_id, self.resource_group, self.name)
    }
}

impl AzureRmProvider {
    pub fn new(settings: Settings) -> Result<Self, ClientError> {
        Ok(Self {
            client: ArmClient::new(settings)?,
            locks: ArmLocks::new(),
            storage_keys: StorageKeyCache::new(),
        })
    }

    /// Build from an `azurerm` provider block, filling gaps from the environment
    pub fn from_block(block: &serde_json::Value) -> Result<Self, ClientError> {
        Self::new(AzureRmConfig::from_block(block)?.resolve()?)
    }

    pub fn client(&self) -> &ArmClient {
        &self.client
    }

    pub fn locks(&self) -> &ArmLocks {
        &self.locks
    }

    /// Access key of a storage account; `None` if the account does not exist
    pub async fn storage_account_key(
        &self,
        resource_group: &str,
        account_name: &str,
    ) -> ProviderResult<Option<String>> {
        self.storage_keys
            .get_key(&self.client, resource_group, account_name)
            .await
            .map_err(|e| {
                ProviderError::new(format!(
                    "Error retrieving keys for Storage Account {:?} (Resource Group {:?}): {}",
                    account_name, resource_group, e
                ))
                .with_cause(e)
            })
    }

    pub async fn storage_endpoint(
        &self,
        resource_group: &str,
        account_name: &str,
        service: StorageService,
    ) -> ProviderResult<Option<StorageEndpoint>> {
        Ok(self
            .storage_keys
            .endpoint(&self.client, resource_group, account_name, service)
            .await?)
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
        match id.resource_type.as_str() {
            DDOS_PROTECTION_PLAN => self.read_ddos_protection_plan(id, identifier).await,
            AUTOMATION_ACCOUNT => self.read_automation_account(id, identifier).await,
            other => Err(unsupported(other, id)),
        }
    }

    pub async fn read_data_source_resource(&self, resource: &Resource) -> ProviderResult<State> {
        match resource.id.resource_type.as_str() {
            MANAGED_DISK => self.read_managed_disk(resource).await,
            other => Err(unsupported(other, &resource.id)),
        }
    }

    pub async fn create_resource(&self, resource: Resource) -> ProviderResult<State> {
        match resource.id.resource_type.as_str() {
            DDOS_PROTECTION_PLAN => {
                self.create_or_update_ddos_protection_plan(&resource, &[], true)
                    .await
            }
            AUTOMATION_ACCOUNT => self.create_or_update_automation_account(&resource, true).await,
            other => Err(unsupported(other, &resource.id)),
        }
    }

    pub async fn update_resource(
        &self,
        id: &ResourceId,
        from: &State,
        to: Resource,
    ) -> ProviderResult<State> {
        match id.resource_type.as_str() {
            DDOS_PROTECTION_PLAN => {
                let vnet_ids = string_list(from.attributes.get("virtual_network_ids"));
                self.create_or_update_ddos_protection_plan(&to, &vnet_ids, false)
                    .await
            }
            AUTOMATION_ACCOUNT => self.create_or_update_automation_account(&to, false).await,
            other => Err(unsupported(other, id)),
        }
    }

    pub async fn delete_resource(
        &self,
        id: &ResourceId,
        identifier: &str,
        from: &State,
    ) -> ProviderResult<()> {
        match id.resource_type.as_str() {
            DDOS_PROTECTION_PLAN => self.delete_ddos_protection_plan(identifier, from).await,
            AUTOMATION_ACCOUNT => self.delete_automation_account(identifier).await,
            other => Err(unsupported(other, id)),
        }
    }

    /// Fail if a resource about to be created already exists
    async fn ensure_not_existing(
        &self,
        target: &Target<'_>,
        resource_type: &str,
    ) -> ProviderResult<()> {
        if !self.client.settings().require_resources_to_be_imported {
            return Ok(());
        }
        let existing = self
            .client
            .get(&target.path(self.client.subscription_id()), target.config.api_version)
            .await
            .map_err(|e| target.error("checking for presence of existing", e))?;

        if let Some(id) = existing.as_ref().and_then(|body| json_str(body, "/id"))
            && !id.is_empty()
        {
            return Err(ProviderError::new(format!(
                "A resource with the ID {:?} already exists - to be managed by strata this \
                 resource needs to be imported into the state. Please see the documentation \
                 for {:?} for more information.",
                id, resource_type
            )));
        }
        Ok(())
    }

    /// GET after a PUT, requiring the object and its ID
    async fn read_back(&self, target: &Target<'_>) -> ProviderResult<(String, serde_json::Value)> {
        let body = self
            .client
            .get(&target.path(self.client.subscription_id()), target.config.api_version)
            .await
            .map_err(|e| target.error("retrieving", e))?;
        let id = body.as_ref().and_then(|b| json_str(b, "/id"));
        match (id, body) {
            (Some(id), Some(body)) => Ok((id, body)),
            _ => Err(ProviderError::new(format!(
                "Cannot read {} {:?} (Resource Group {:?}) ID",
                target.config.display_name, target.name, target.resource_group
            ))),
        }
    }

    // =========================================================================
    // azurerm_ddos_protection_plan
    // =========================================================================

    async fn create_or_update_ddos_protection_plan(
        &self,
        resource: &Resource,
        vnet_ids: &[String],
        is_new: bool,
    ) -> ProviderResult<State> {
        info!("preparing arguments for DDoS protection plan creation");

        let name = required_str(resource, "name")?;
        let resource_group = required_str(resource, "resource_group_name")?;
        let target = Target {
            config: &DDOS_PROTECTION_PLAN_CONFIG,
            name,
            resource_group,
        };

        if is_new {
            self.ensure_not_existing(&target, DDOS_PROTECTION_PLAN).await?;
        }

        let location = normalize_location(required_str(resource, "location")?);
        let parameters = json!({
            "location": location,
            "tags": expand_tags(resource.attributes.get("tags")),
        });

        let vnet_names = extract_vnet_names(vnet_ids)?;
        let _locks = self
            .locks
            .lock_with_references(
                DDOS_PROTECTION_PLAN,
                name,
                vnet_names
                    .iter()
                    .map(|n| (VIRTUAL_NETWORK, n.as_str()))
                    .collect::<Vec<_>>(),
            )
            .await;

        self.client
            .put(
                &target.path(self.client.subscription_id()),
                DDOS_PROTECTION_PLAN_CONFIG.api_version,
                &parameters,
            )
            .await
            .map_err(|e| target.error("creating/updating", e))?;

        let (id, plan) = self.read_back(&target).await?;
        let state = flatten_ddos_protection_plan(resource.id.clone(), resource_group, &plan);
        Ok(state.with_identifier(id))
    }

    async fn read_ddos_protection_plan(
        &self,
        id: &ResourceId,
        identifier: &str,
    ) -> ProviderResult<State> {
        let parsed = parse_azure_resource_id(identifier).map_err(provider_error)?;
        let name = parsed
            .segment(DDOS_PROTECTION_PLAN_CONFIG.type_segment)
            .map_err(provider_error)?;
        let target = Target {
            config: &DDOS_PROTECTION_PLAN_CONFIG,
            name,
            resource_group: &parsed.resource_group,
        };

        let plan = self
            .client
            .get(identifier, DDOS_PROTECTION_PLAN_CONFIG.api_version)
            .await
            .map_err(|e| target.error("making Read request on", e))?;

        let Some(plan) = plan else {
            debug!(
                "DDoS Protection Plan {:?} was not found in Resource Group {:?} - removing from state!",
                name, parsed.resource_group
            );
            return Ok(State::not_found(id.clone()));
        };

        Ok(flatten_ddos_protection_plan(id.clone(), &parsed.resource_group, &plan)
            .with_identifier(identifier))
    }

    async fn delete_ddos_protection_plan(
        &self,
        identifier: &str,
        from: &State,
    ) -> ProviderResult<()> {
        let parsed = parse_azure_resource_id(identifier).map_err(provider_error)?;
        let name = parsed
            .segment(DDOS_PROTECTION_PLAN_CONFIG.type_segment)
            .map_err(provider_error)?;
        let target = Target {
            config: &DDOS_PROTECTION_PLAN_CONFIG,
            name,
            resource_group: &parsed.resource_group,
        };

        let existing = self
            .client
            .get(identifier, DDOS_PROTECTION_PLAN_CONFIG.api_version)
            .await
            .map_err(|e| target.error("retrieving", e))?;
        let Some(existing) = existing else {
            // deleted out of band
            debug!(
                "DDoS Protection Plan {:?} was not found in Resource Group {:?} - assuming removed!",
                name, parsed.resource_group
            );
            return Ok(());
        };

        // Lock every VNet the plan is known to reference, in state or remotely
        let mut vnet_ids = string_list(from.attributes.get("virtual_network_ids"));
        vnet_ids.extend(virtual_network_ids(&existing));
        let vnet_names = extract_vnet_names(&vnet_ids)?;

        let _locks = self
            .locks
            .lock_with_references(
                DDOS_PROTECTION_PLAN,
                name,
                vnet_names
                    .iter()
                    .map(|n| (VIRTUAL_NETWORK, n.as_str()))
                    .collect::<Vec<_>>(),
            )
            .await;

        self.client
            .delete(identifier, DDOS_PROTECTION_PLAN_CONFIG.api_version)
            .await
            .map_err(|e| target.error("deleting", e))?;
        Ok(())
    }

    // =========================================================================
    // azurerm_automation_account
    // =========================================================================

    async fn create_or_update_automation_account(
        &self,
        resource: &Resource,
        is_new: bool,
    ) -> ProviderResult<State> {
        info!("preparing arguments for Automation Account create/update.");

        let name = required_str(resource, "name")?;
        let resource_group = required_str(resource, "resource_group_name")?;
        let target = Target {
            config: &AUTOMATION_ACCOUNT_CONFIG,
            name,
            resource_group,
        };

        if is_new {
            self.ensure_not_existing(&target, AUTOMATION_ACCOUNT).await?;
        }

        let location = normalize_location(required_str(resource, "location")?);
        let sku = resource
            .get_block("sku")
            .and_then(|sku| sku.get("name"))
            .and_then(|v| v.as_str())
            .ok_or_else(|| {
                ProviderError::new("\"sku.name\" is required").for_resource(resource.id.clone())
            })?;
        let parameters = json!({
            "properties": { "sku": { "name": sku } },
            "location": location,
            "tags": expand_tags(resource.attributes.get("tags")),
        });

        self.client
            .put(
                &target.path(self.client.subscription_id()),
                AUTOMATION_ACCOUNT_CONFIG.api_version,
                &parameters,
            )
            .await
            .map_err(|e| target.error("creating/updating", e))?;

        let (id, _) = self.read_back(&target).await?;
        let state = self.read_automation_account(&resource.id, &id).await?;
        if !state.exists {
            return Err(ProviderError::new(format!(
                "Automation Account {:?} (Resource Group {:?}) disappeared after creation",
                name, resource_group
            )));
        }
        Ok(state)
    }

    async fn read_automation_account(
        &self,
        id: &ResourceId,
        identifier: &str,
    ) -> ProviderResult<State> {
        let parsed = parse_azure_resource_id(identifier).map_err(provider_error)?;
        let name = parsed
            .segment(AUTOMATION_ACCOUNT_CONFIG.type_segment)
            .map_err(provider_error)?;
        let target = Target {
            config: &AUTOMATION_ACCOUNT_CONFIG,
            name,
            resource_group: &parsed.resource_group,
        };

        let account = self
            .client
            .get(identifier, AUTOMATION_ACCOUNT_CONFIG.api_version)
            .await
            .map_err(|e| target.error("making Read request on", e))?;
        let Some(account) = account else {
            debug!(
                "Automation Account {:?} was not found in Resource Group {:?} - removing from state!",
                name, parsed.resource_group
            );
            return Ok(State::not_found(id.clone()));
        };

        let registration = self
            .client
            .get(
                &format!("{}/agentRegistrationInformation", parsed.as_str()),
                AUTOMATION_ACCOUNT_CONFIG.api_version,
            )
            .await
            .map_err(|e| target.error("making Read request for Agent Registration Info for", e))?;
        let Some(registration) = registration else {
            debug!(
                "Agent Registration Info for Automation Account {:?} was not found in Resource Group {:?} - removing from state!",
                name, parsed.resource_group
            );
            return Ok(State::not_found(id.clone()));
        };

        let mut attributes = HashMap::new();
        insert_str(&mut attributes, "name", json_str(&account, "/name"));
        attributes.insert(
            "resource_group_name".to_string(),
            Value::string(&parsed.resource_group),
        );
        insert_str(
            &mut attributes,
            "location",
            json_str(&account, "/location").map(|l| normalize_location(&l)),
        );
        let sku = json_str(&account, "/properties/sku/name")
            .or_else(|| json_str(&account, "/sku/name"))
            .map(|name| Value::block([("name", Value::string(name))]))
            .unwrap_or(Value::List(Vec::new()));
        attributes.insert("sku".to_string(), sku);
        insert_str(
            &mut attributes,
            "dsc_server_endpoint",
            json_str(&registration, "/endpoint"),
        );
        insert_str(
            &mut attributes,
            "dsc_primary_access_key",
            json_str(&registration, "/keys/primary"),
        );
        insert_str(
            &mut attributes,
            "dsc_secondary_access_key",
            json_str(&registration, "/keys/secondary"),
        );
        attributes.insert("tags".to_string(), flatten_tags(account.get("tags")));

        Ok(State::existing(id.clone(), attributes).with_identifier(identifier))
    }

    async fn delete_automation_account(&self, identifier: &str) -> ProviderResult<()> {
        let parsed = parse_azure_resource_id(identifier).map_err(provider_error)?;
        let name = parsed
            .segment(AUTOMATION_ACCOUNT_CONFIG.type_segment)
            .map_err(provider_error)?;

        self.client
            .delete(identifier, AUTOMATION_ACCOUNT_CONFIG.api_version)
            .await
            .map_err(|e| {
                ProviderError::new(format!(
                    "Error issuing AzureRM delete request for Automation Account {:?}: {}",
                    name, e
                ))
                .with_cause(e)
            })?;
        Ok(())
    }

    // =========================================================================
    // azurerm_managed_disk (data source)
    // =========================================================================

    async fn read_managed_disk(&self, resource: &Resource) -> ProviderResult<State> {
        let name = required_str(resource, "name")?;
        let resource_group = required_str(resource, "resource_group_name")?;
        let target = Target {
            config: &MANAGED_DISK_CONFIG,
            name,
            resource_group,
        };

        let disk = self
            .client
            .get(&target.path(self.client.subscription_id()), MANAGED_DISK_CONFIG.api_version)
            .await
            .map_err(|e| target.error("making Read request on", e))?
            .ok_or_else(|| {
                ProviderError::new(format!(
                    "Managed Disk {:?} (Resource Group {:?}) was not found",
                    name, resource_group
                ))
            })?;

        let id = json_str(&disk, "/id").ok_or_else(|| {
            ProviderError::new(format!(
                "Cannot read Managed Disk {:?} (Resource Group {:?}) ID",
                name, resource_group
            ))
        })?;

        let mut attributes = HashMap::new();
        attributes.insert("name".to_string(), Value::string(name));
        attributes.insert(
            "resource_group_name".to_string(),
            Value::string(resource_group),
        );
        insert_str(
            &mut attributes,
            "storage_account_type",
            json_str(&disk, "/sku/name"),
        );
        if let Some(size) = disk.pointer("/properties/diskSizeGB").and_then(|v| v.as_i64()) {
            attributes.insert("disk_size_gb".to_string(), Value::Int(size));
        }
        insert_str(
            &mut attributes,
            "os_type",
            json_str(&disk, "/properties/osType").filter(|s| !s.is_empty()),
        );
        insert_str(
            &mut attributes,
            "create_option",
            json_str(&disk, "/properties/creationData/createOption"),
        );
        insert_str(
            &mut attributes,
            "source_uri",
            json_str(&disk, "/properties/creationData/sourceUri"),
        );
        insert_str(
            &mut attributes,
            "source_resource_id",
            json_str(&disk, "/properties/creationData/sourceResourceId"),
        );
        let zones = disk
            .get("zones")
            .and_then(|z| z.as_array())
            .map(|z| z.iter().filter_map(|v| v.as_str()).map(Value::string).collect())
            .unwrap_or_default();
        attributes.insert("zones".to_string(), Value::List(zones));
        attributes.insert("tags".to_string(), flatten_tags(disk.get("tags")));

        Ok(State::existing(resource.id.clone(), attributes).with_identifier(id))
    }
}

fn flatten_ddos_protection_plan(
    id: ResourceId,
    resource_group: &str,
    plan: &serde_json::Value,
) -> State {
    let mut attributes = HashMap::new();
    insert_str(&mut attributes, "name", json_str(plan, "/name"));
    attributes.insert(
        "resource_group_name".to_string(),
        Value::string(resource_group),
    );
    insert_str(
        &mut attributes,
        "location",
        json_str(plan, "/location").map(|l| normalize_location(&l)),
    );
    attributes.insert(
        "virtual_network_ids".to_string(),
        Value::List(virtual_network_ids(plan).into_iter().map(Value::String).collect()),
    );
    attributes.insert("tags".to_string(), flatten_tags(plan.get("tags")));
    State::existing(id, attributes)
}

/// IDs of the VNets listed under `properties.virtualNetworks`
fn virtual_network_ids(plan: &serde_json::Value) -> Vec<String> {
    plan.pointer("/properties/virtualNetworks")
        .and_then(|v| v.as_array())
        .map(|vnets| {
            vnets
                .iter()
                .filter_map(|v| v.get("id").and_then(|id| id.as_str()))
                .map(|s| s.to_string())
                .collect()
        })
        .unwrap_or_default()
}

/// Distinct VNet names of a list of VNet resource IDs
fn extract_vnet_names(vnet_ids: &[String]) -> ProviderResult<BTreeSet<String>> {
    let mut names = BTreeSet::new();
    for vnet_id in vnet_ids {
        let parsed = parse_azure_resource_id(vnet_id).map_err(|e| {
            ProviderError::new(format!("Error extracting names of Virtual Network: {}", e))
                .with_cause(e)
        })?;
        let name = parsed.segment("virtualNetworks").map_err(|e| {
            ProviderError::new(format!("Error extracting names of Virtual Network: {}", e))
                .with_cause(e)
        })?;
        names.insert(name.to_string());
    }
    Ok(names)
}

fn required_str<'a>(resource: &'a Resource, key: &str) -> ProviderResult<&'a str> {
    resource.get_str(key).ok_or_else(|| {
        ProviderError::new(format!("{:?} is required", key)).for_resource(resource.id.clone())
    })
}

fn string_list(value: Option<&Value>) -> Vec<String> {
    value
        .and_then(|v| v.as_list())
        .map(|items| {
            items
                .iter()
                .filter_map(|v| v.as_str())
                .map(|s| s.to_string())
                .collect()
        })
        .unwrap_or_default()
}

fn insert_str(attributes: &mut HashMap<String, Value>, key: &str, value: Option<String>) {
    if let Some(value) = value {
        attributes.insert(key.to_string(), Value::String(value));
    }
}

fn provider_error(e: impl std::error::Error + Send + Sync + 'static) -> ProviderError {
    ProviderError::new(e.to_string()).with_cause(e)
}

fn unsupported(resource_type: &str, id: &ResourceId) -> ProviderError {
    let message = match get_resource_config(resource_type) {
        Some(_) if resource_type == MANAGED_DISK => {
            format!("{} is a data source and can only be read", resource_type)
        }
        Some(config) => format!("{} is not managed by this provider", config.display_name),
        None => format!("Unsupported resource type: {}", resource_type),
    };
    ProviderError::new(message).for_resource(id.clone())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_distinct_vnet_names() {
        let ids = vec![
            "/subscriptions/s/resourceGroups/rg/providers/Microsoft.Network/virtualNetworks/b"
                .to_string(),
            "/subscriptions/s/resourceGroups/rg/providers/Microsoft.Network/virtualNetworks/a"
                .to_string(),
            "/subscriptions/s/resourceGroups/other/providers/Microsoft.Network/virtualNetworks/b"
                .to_string(),
        ];
        let names: Vec<String> = extract_vnet_names(&ids).unwrap().into_iter().collect();
        assert_eq!(names, vec!["a", "b"]);
    }

    #[test]
    fn bad_vnet_id_is_an_error() {
        let ids = vec!["/subscriptions/s/resourceGroups".to_string()];
        let err = extract_vnet_names(&ids).unwrap_err();
        assert!(err.to_string().contains("Virtual Network"));
    }

    #[test]
    fn flattens_plan() {
        let plan = json!({
            "id": "/subscriptions/s/resourceGroups/rg/providers/Microsoft.Network/ddosProtectionPlans/p",
            "name": "p",
            "location": "West Europe",
            "properties": {
                "virtualNetworks": [
                    {"id": "/subscriptions/s/resourceGroups/rg/providers/Microsoft.Network/virtualNetworks/v1"}
                ]
            },
            "tags": {"env": "prod"}
        });
        let state = flatten_ddos_protection_plan(
            ResourceId::new(DDOS_PROTECTION_PLAN, "p"),
            "rg",
            &plan,
        );
        assert_eq!(state.get_str("location"), Some("westeurope"));
        assert_eq!(
            string_list(state.attributes.get("virtual_network_ids")).len(),
            1
        );
        assert_eq!(
            state.attributes["tags"].as_map().unwrap()["env"],
            Value::string("prod")
        );
    }

    #[test]
    fn flattens_plan_without_properties() {
        let state = flatten_ddos_protection_plan(
            ResourceId::new(DDOS_PROTECTION_PLAN, "p"),
            "rg",
            &json!({"name": "p"}),
        );
        assert_eq!(state.attributes["virtual_network_ids"], Value::List(vec![]));
        assert_eq!(state.attributes["tags"], Value::Map(HashMap::new()));
    }
}
