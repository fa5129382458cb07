#![allow(dead_code)]

use std::time::Duration;

use httpmock::MockServer;
use strata_provider_azurerm::config::{Credentials, Environment, Settings};
use strata_provider_azurerm::AzureRmProvider;

pub const RG_PREFIX: &str = "/subscriptions/sub-1/resourceGroups/rg/providers";

pub fn settings(server: &MockServer) -> Settings {
    let mut environment = Environment::public();
    environment.resource_manager_endpoint = server.base_url();
    environment.active_directory_endpoint = server.base_url();
    Settings {
        subscription_id: "sub-1".to_string(),
        credentials: Credentials::AccessToken("test-token".to_string()),
        environment,
        partner_id: None,
        skip_provider_registration: true,
        require_resources_to_be_imported: false,
        extra_user_agent: None,
        polling_interval: Duration::from_millis(10),
        polling_duration: Duration::from_secs(5),
    }
}

pub fn provider(server: &MockServer) -> AzureRmProvider {
    AzureRmProvider::new(settings(server)).unwrap()
}

pub fn plan_path(name: &str) -> String {
    format!("{}/Microsoft.Network/ddosProtectionPlans/{}", RG_PREFIX, name)
}

pub fn vnet_id(name: &str) -> String {
    format!("{}/Microsoft.Network/virtualNetworks/{}", RG_PREFIX, name)
}
