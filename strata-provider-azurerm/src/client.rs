//! Azure Resource Manager HTTP client
//!
//! Thin JSON client over the ARM REST API: bearer authentication, the
//! provider user agent, a per-process correlation request ID, long-running
//! operation polling, and registration of the resource providers the
//! supported resources live in.

use std::sync::OnceLock;
use std::time::{Duration, Instant};

use log::{debug, info};
use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::{Method, StatusCode};
use serde_json::json;
use strata_core::provider::ProviderError;
use thiserror::Error;
use tokio::sync::{Mutex, OnceCell};
use url::Url;

use crate::config::{Credentials, Settings};

pub const PROVIDER_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Resource provider namespaces used by the supported resources
pub const REQUIRED_RESOURCE_PROVIDERS: &[&str] = &[
    "Microsoft.Automation",
    "Microsoft.Compute",
    "Microsoft.Network",
    "Microsoft.Storage",
];

const PROVIDERS_API_VERSION: &str = "2016-02-01";

/// Tokens are refreshed this long before they expire
const TOKEN_REFRESH_MARGIN: Duration = Duration::from_secs(300);

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("Azure returned status {status}: {code}: {message}")]
    Api {
        status: u16,
        code: String,
        message: String,
    },

    #[error("Long-running operation failed: {0}")]
    Operation(String),

    #[error("Timed out after {0:?} waiting for a long-running operation")]
    Timeout(Duration),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl ClientError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, ClientError::Api { status: 404, .. })
    }
}

impl From<ClientError> for ProviderError {
    fn from(e: ClientError) -> Self {
        ProviderError::new(e.to_string()).with_cause(e)
    }
}

/// Correlation request ID shared by every request this process makes
pub fn correlation_request_id() -> &'static str {
    static ID: OnceLock<String> = OnceLock::new();
    ID.get_or_init(|| uuid::Uuid::new_v4().to_string())
}

/// User agent sent with every request
pub fn user_agent(settings: &Settings) -> String {
    let mut agent = format!("strata-provider-azurerm/{}", PROVIDER_VERSION);
    if let Some(extra) = &settings.extra_user_agent {
        agent = format!("{} {}", agent, extra);
    }
    if let Some(partner_id) = &settings.partner_id {
        agent = format!("{} pid-{}", agent, partner_id);
    }
    agent
}

struct CachedToken {
    token: String,
    expires_at: Instant,
}

enum TokenSource {
    Static(String),
    ClientSecret {
        token_url: String,
        client_id: String,
        client_secret: String,
        resource: String,
        cached: Mutex<Option<CachedToken>>,
    },
}

impl TokenSource {
    fn from_settings(settings: &Settings) -> Self {
        match &settings.credentials {
            Credentials::AccessToken(token) => TokenSource::Static(token.clone()),
            Credentials::ClientSecret {
                tenant_id,
                client_id,
                client_secret,
            } => TokenSource::ClientSecret {
                token_url: format!(
                    "{}/{}/oauth2/token",
                    settings.environment.active_directory_endpoint.trim_end_matches('/'),
                    tenant_id
                ),
                client_id: client_id.clone(),
                client_secret: client_secret.clone(),
                resource: format!(
                    "{}/",
                    settings.environment.resource_manager_endpoint.trim_end_matches('/')
                ),
                cached: Mutex::new(None),
            },
        }
    }

    async fn token(&self, http: &reqwest::Client) -> Result<String, ClientError> {
        let (token_url, client_id, client_secret, resource, cached) = match self {
            TokenSource::Static(token) => return Ok(token.clone()),
            TokenSource::ClientSecret {
                token_url,
                client_id,
                client_secret,
                resource,
                cached,
            } => (token_url, client_id, client_secret, resource, cached),
        };

        let mut cached = cached.lock().await;
        if let Some(token) = cached.as_ref()
            && token.expires_at > Instant::now() + TOKEN_REFRESH_MARGIN
        {
            return Ok(token.token.clone());
        }

        debug!("Requesting a new Azure AD token from {}", token_url);
        let response = http
            .post(token_url.as_str())
            .form(&[
                ("grant_type", "client_credentials"),
                ("client_id", client_id.as_str()),
                ("client_secret", client_secret.as_str()),
                ("resource", resource.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();
        let body: serde_json::Value = response.json().await.unwrap_or_default();
        if !status.is_success() {
            let message = body
                .get("error_description")
                .or_else(|| body.get("error"))
                .and_then(|v| v.as_str())
                .unwrap_or("token request rejected");
            return Err(ClientError::Auth(format!("{}: {}", status, message)));
        }

        let token = body
            .get("access_token")
            .and_then(|v| v.as_str())
            .ok_or_else(|| ClientError::Auth("token response has no access_token".to_string()))?
            .to_string();
        // v1 endpoints send expires_in as a string
        let expires_in = body
            .get("expires_in")
            .and_then(|v| v.as_u64().or_else(|| v.as_str().and_then(|s| s.parse().ok())))
            .unwrap_or(3600);

        *cached = Some(CachedToken {
            token: token.clone(),
            expires_at: Instant::now() + Duration::from_secs(expires_in),
        });
        Ok(token)
    }
}

/// Raw ARM response
#[derive(Debug)]
pub struct ArmResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: serde_json::Value,
}

impl ArmResponse {
    fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    fn retry_after(&self) -> Option<Duration> {
        self.headers
            .get(RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok())
            .map(Duration::from_secs)
    }
}

pub struct ArmClient {
    http: reqwest::Client,
    settings: Settings,
    base_url: Url,
    tokens: TokenSource,
    user_agent: String,
    registration: OnceCell<()>,
}

impl ArmClient {
    pub fn new(settings: Settings) -> Result<Self, ClientError> {
        let base_url = Url::parse(&settings.environment.resource_manager_endpoint)?;
        let user_agent = user_agent(&settings);
        debug!("AzureRM Client User Agent: {}", user_agent);

        let http = reqwest::Client::builder()
            .user_agent(user_agent.clone())
            .build()?;

        Ok(Self {
            http,
            tokens: TokenSource::from_settings(&settings),
            settings,
            base_url,
            user_agent,
            registration: OnceCell::new(),
        })
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn subscription_id(&self) -> &str {
        &self.settings.subscription_id
    }

    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    fn url(&self, path: &str, api_version: &str) -> Result<Url, ClientError> {
        let mut url = self.base_url.join(path)?;
        url.query_pairs_mut().append_pair("api-version", api_version);
        Ok(url)
    }

    /// Send one request; non-2xx statuses become `ClientError::Api`
    async fn send(
        &self,
        method: Method,
        url: Url,
        body: Option<&serde_json::Value>,
    ) -> Result<ArmResponse, ClientError> {
        let token = self.tokens.token(&self.http).await?;
        debug!("{} {}", method, url);

        let mut request = self
            .http
            .request(method, url)
            .bearer_auth(token)
            .header("x-ms-correlation-request-id", correlation_request_id());
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await?;
        let status = response.status();
        let headers = response.headers().clone();
        let text = response.text().await?;
        let body = if text.trim().is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::from_str(&text).unwrap_or(serde_json::Value::String(text))
        };

        if !status.is_success() {
            let error = body.get("error").unwrap_or(&body);
            return Err(ClientError::Api {
                status: status.as_u16(),
                code: error
                    .get("code")
                    .and_then(|v| v.as_str())
                    .unwrap_or("Unknown")
                    .to_string(),
                message: error
                    .get("message")
                    .and_then(|v| v.as_str())
                    .unwrap_or_else(|| status.canonical_reason().unwrap_or("request failed"))
                    .to_string(),
            });
        }

        Ok(ArmResponse {
            status,
            headers,
            body,
        })
    }

    /// GET a resource; `None` when it does not exist
    pub async fn get(
        &self,
        path: &str,
        api_version: &str,
    ) -> Result<Option<serde_json::Value>, ClientError> {
        self.ensure_providers_registered().await?;
        match self.send(Method::GET, self.url(path, api_version)?, None).await {
            Ok(response) => Ok(Some(response.body)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// PUT a resource and wait for the operation to complete
    pub async fn put(
        &self,
        path: &str,
        api_version: &str,
        body: &serde_json::Value,
    ) -> Result<serde_json::Value, ClientError> {
        self.ensure_providers_registered().await?;
        let response = self
            .send(Method::PUT, self.url(path, api_version)?, Some(body))
            .await?;
        self.wait_for_completion(&response, false).await?;
        Ok(response.body)
    }

    /// DELETE a resource and wait; returns false if it was already gone
    pub async fn delete(&self, path: &str, api_version: &str) -> Result<bool, ClientError> {
        self.ensure_providers_registered().await?;
        let response = match self
            .send(Method::DELETE, self.url(path, api_version)?, None)
            .await
        {
            Ok(response) => response,
            Err(e) if e.is_not_found() => return Ok(false),
            Err(e) => return Err(e),
        };
        if response.status == StatusCode::NO_CONTENT {
            return Ok(false);
        }
        self.wait_for_completion(&response, true).await?;
        Ok(true)
    }

    /// POST an action (e.g. `listKeys`); `None` when the target does not exist
    pub async fn post(
        &self,
        path: &str,
        api_version: &str,
        body: Option<&serde_json::Value>,
    ) -> Result<Option<serde_json::Value>, ClientError> {
        self.ensure_providers_registered().await?;
        match self
            .send(Method::POST, self.url(path, api_version)?, body)
            .await
        {
            Ok(response) => Ok(Some(response.body)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Poll a long-running operation until it finishes
    async fn wait_for_completion(
        &self,
        initial: &ArmResponse,
        deleting: bool,
    ) -> Result<(), ClientError> {
        let async_operation = initial.header("azure-asyncoperation").map(str::to_string);
        let location = initial.header("location").map(str::to_string);
        let accepted = matches!(initial.status, StatusCode::CREATED | StatusCode::ACCEPTED);

        let (poll_url, via_async_operation) = match (async_operation, location) {
            (Some(url), _) => (url, true),
            (None, Some(url)) if accepted => (url, false),
            _ => return Ok(()),
        };
        let poll_url = Url::parse(&poll_url)?;

        let deadline = Instant::now() + self.settings.polling_duration;
        let mut delay = initial.retry_after().unwrap_or(self.settings.polling_interval);

        loop {
            if Instant::now() + delay > deadline {
                return Err(ClientError::Timeout(self.settings.polling_duration));
            }
            tokio::time::sleep(delay).await;

            let response = match self.send(Method::GET, poll_url.clone(), None).await {
                Ok(response) => response,
                Err(e) if deleting && e.is_not_found() => return Ok(()),
                Err(e) => return Err(e),
            };
            delay = response
                .retry_after()
                .unwrap_or(self.settings.polling_interval);

            if via_async_operation {
                let status = response
                    .body
                    .get("status")
                    .and_then(|v| v.as_str())
                    .unwrap_or("InProgress");
                match status.to_ascii_lowercase().as_str() {
                    "succeeded" => return Ok(()),
                    "failed" | "canceled" | "cancelled" => {
                        let message = response
                            .body
                            .pointer("/error/message")
                            .and_then(|v| v.as_str())
                            .unwrap_or(status);
                        return Err(ClientError::Operation(message.to_string()));
                    }
                    _ => debug!("Operation still {}", status),
                }
            } else if response.status != StatusCode::ACCEPTED {
                return Ok(());
            }
        }
    }

    /// Register the resource providers the supported resources need, once
    pub async fn ensure_providers_registered(&self) -> Result<(), ClientError> {
        if self.settings.skip_provider_registration {
            return Ok(());
        }
        self.registration
            .get_or_try_init(|| self.register_providers())
            .await
            .map(|_| ())
    }

    async fn register_providers(&self) -> Result<(), ClientError> {
        let subscription = format!("/subscriptions/{}", self.settings.subscription_id);
        let listed = self
            .send(
                Method::GET,
                self.url(&format!("{}/providers", subscription), PROVIDERS_API_VERSION)?,
                None,
            )
            .await?;

        let registered: Vec<String> = listed
            .body
            .get("value")
            .and_then(|v| v.as_array())
            .map(|providers| {
                providers
                    .iter()
                    .filter(|p| {
                        p.get("registrationState")
                            .and_then(|s| s.as_str())
                            .is_some_and(|s| s.eq_ignore_ascii_case("Registered"))
                    })
                    .filter_map(|p| p.get("namespace").and_then(|n| n.as_str()))
                    .map(|n| n.to_lowercase())
                    .collect()
            })
            .unwrap_or_default();

        for namespace in REQUIRED_RESOURCE_PROVIDERS {
            if registered.contains(&namespace.to_lowercase()) {
                continue;
            }
            info!("Registering resource provider {}", namespace);
            self.send(
                Method::POST,
                self.url(
                    &format!("{}/providers/{}/register", subscription, namespace),
                    PROVIDERS_API_VERSION,
                )?,
                Some(&json!({})),
            )
            .await?;
        }
        Ok(())
    }
}
