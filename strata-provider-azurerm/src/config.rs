//! Provider configuration and cloud environments

use std::time::Duration;

use serde::Deserialize;

use crate::client::ClientError;
use crate::validators;

/// Default upper bound on waiting for a long-running operation
pub const DEFAULT_POLLING_DURATION: Duration = Duration::from_secs(180 * 60);

/// Default delay between long-running operation polls, when the service
/// does not send `Retry-After`
pub const DEFAULT_POLLING_INTERVAL: Duration = Duration::from_secs(10);

/// Endpoints of one Azure cloud
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Environment {
    pub name: &'static str,
    pub resource_manager_endpoint: String,
    pub active_directory_endpoint: String,
    pub storage_endpoint_suffix: String,
}

impl Environment {
    pub fn public() -> Self {
        Self::new(
            "public",
            "https://management.azure.com",
            "https://login.microsoftonline.com",
            "core.windows.net",
        )
    }

    pub fn china() -> Self {
        Self::new(
            "china",
            "https://management.chinacloudapi.cn",
            "https://login.chinacloudapi.cn",
            "core.chinacloudapi.cn",
        )
    }

    pub fn german() -> Self {
        Self::new(
            "german",
            "https://management.microsoftazure.de",
            "https://login.microsoftonline.de",
            "core.cloudapi.de",
        )
    }

    pub fn us_government() -> Self {
        Self::new(
            "usgovernment",
            "https://management.usgovcloudapi.net",
            "https://login.microsoftonline.us",
            "core.usgovcloudapi.net",
        )
    }

    fn new(name: &'static str, rm: &str, aad: &str, storage: &str) -> Self {
        Self {
            name,
            resource_manager_endpoint: rm.to_string(),
            active_directory_endpoint: aad.to_string(),
            storage_endpoint_suffix: storage.to_string(),
        }
    }

    /// Look up an environment by name; `AzurePublicCloud`-style names are accepted
    pub fn from_name(name: &str) -> Option<Self> {
        let name = name.to_lowercase();
        let name = name
            .strip_prefix("azure")
            .unwrap_or(&name)
            .trim_end_matches("cloud");
        match name {
            "" | "public" => Some(Self::public()),
            "china" => Some(Self::china()),
            "german" => Some(Self::german()),
            "usgovernment" => Some(Self::us_government()),
            _ => None,
        }
    }
}

/// The `azurerm` provider block as written in configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AzureRmConfig {
    pub subscription_id: Option<String>,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub tenant_id: Option<String>,
    pub environment: Option<String>,
    pub partner_id: Option<String>,
    pub skip_provider_registration: Option<bool>,
    /// Pre-issued bearer token; skips the client credentials flow
    pub access_token: Option<String>,
    pub resource_manager_endpoint: Option<String>,
    pub active_directory_endpoint: Option<String>,
    pub require_resources_to_be_imported: Option<bool>,
    pub polling_interval_secs: Option<u64>,
}

/// How the provider authenticates against Resource Manager
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Credentials {
    AccessToken(String),
    ClientSecret {
        tenant_id: String,
        client_id: String,
        client_secret: String,
    },
}

/// Fully resolved provider settings
#[derive(Debug, Clone)]
pub struct Settings {
    pub subscription_id: String,
    pub credentials: Credentials,
    pub environment: Environment,
    pub partner_id: Option<String>,
    pub skip_provider_registration: bool,
    pub require_resources_to_be_imported: bool,
    /// Extra user agent fragment from `AZURE_HTTP_USER_AGENT`
    pub extra_user_agent: Option<String>,
    pub polling_interval: Duration,
    pub polling_duration: Duration,
}

impl AzureRmConfig {
    pub fn from_block(block: &serde_json::Value) -> Result<Self, ClientError> {
        serde_json::from_value(block.clone())
            .map_err(|e| ClientError::Config(format!("invalid azurerm provider block: {}", e)))
    }

    /// Resolve against the process environment
    pub fn resolve(self) -> Result<Settings, ClientError> {
        self.resolve_with(|key| std::env::var(key).ok())
    }

    /// Resolve using the given environment lookup; explicit fields win
    pub fn resolve_with<F>(self, env: F) -> Result<Settings, ClientError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |field: Option<String>, key: &str| -> Option<String> {
            field.or_else(|| env(key)).filter(|v| !v.is_empty())
        };
        let flag = |field: Option<bool>, key: &str| -> bool {
            field.unwrap_or_else(|| {
                env(key).is_some_and(|v| v.eq_ignore_ascii_case("true") || v == "1")
            })
        };

        let subscription_id = lookup(self.subscription_id, "ARM_SUBSCRIPTION_ID")
            .ok_or_else(|| ClientError::Config("subscription_id is required".to_string()))?;

        let environment_name =
            lookup(self.environment, "ARM_ENVIRONMENT").unwrap_or_else(|| "public".to_string());
        let mut environment = Environment::from_name(&environment_name).ok_or_else(|| {
            ClientError::Config(format!("unknown environment '{}'", environment_name))
        })?;
        if let Some(endpoint) = self.resource_manager_endpoint {
            environment.resource_manager_endpoint = endpoint;
        }
        if let Some(endpoint) = self.active_directory_endpoint {
            environment.active_directory_endpoint = endpoint;
        }

        let credentials = match lookup(self.access_token, "ARM_ACCESS_TOKEN") {
            Some(token) => Credentials::AccessToken(token),
            None => {
                let tenant_id = lookup(self.tenant_id, "ARM_TENANT_ID");
                let client_id = lookup(self.client_id, "ARM_CLIENT_ID");
                let client_secret = lookup(self.client_secret, "ARM_CLIENT_SECRET");
                match (tenant_id, client_id, client_secret) {
                    (Some(tenant_id), Some(client_id), Some(client_secret)) => {
                        Credentials::ClientSecret {
                            tenant_id,
                            client_id,
                            client_secret,
                        }
                    }
                    _ => {
                        return Err(ClientError::Config(
                            "either access_token or tenant_id, client_id and client_secret \
                             must be set"
                                .to_string(),
                        ));
                    }
                }
            }
        };

        let partner_id = lookup(self.partner_id, "ARM_PARTNER_ID");
        if let Some(partner_id) = &partner_id {
            validators::validate_uuid(partner_id)
                .map_err(|e| ClientError::Config(format!("partner_id: {}", e)))?;
        }

        Ok(Settings {
            subscription_id,
            credentials,
            environment,
            partner_id,
            skip_provider_registration: flag(
                self.skip_provider_registration,
                "ARM_SKIP_PROVIDER_REGISTRATION",
            ),
            require_resources_to_be_imported: flag(
                self.require_resources_to_be_imported,
                "ARM_PROVIDER_STRICT",
            ),
            extra_user_agent: env("AZURE_HTTP_USER_AGENT").filter(|v| !v.is_empty()),
            polling_interval: self
                .polling_interval_secs
                .map(Duration::from_secs)
                .unwrap_or(DEFAULT_POLLING_INTERVAL),
            polling_duration: DEFAULT_POLLING_DURATION,
        })
    }
}
