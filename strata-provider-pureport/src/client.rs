//! Pureport API session
//!
//! JSON client over the Pureport REST API. Authenticates with a pre-issued
//! token or by exchanging an API key for an access token, and retries
//! throttled or failed requests with exponential backoff.

use std::time::Duration;

use log::{debug, warn};
use reqwest::header::{HeaderMap, LOCATION, RETRY_AFTER};
use reqwest::{Method, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use strata_core::provider::ProviderError;
use thiserror::Error;
use tokio::sync::Mutex;
use url::Url;

use crate::config::{Credentials, Settings};
use crate::models::{LoginRequest, LoginResponse};

/// Upper bound on a single backoff delay
const MAX_RETRY_DELAY: Duration = Duration::from_secs(30);

#[derive(Debug, Error)]
pub enum PureportError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("Pureport returned status {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Timed out after {0:?}")]
    Timeout(Duration),
}

impl PureportError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, PureportError::Api { status: 404, .. })
    }

    fn is_unauthorized(&self) -> bool {
        matches!(self, PureportError::Api { status: 401, .. })
    }
}

impl From<PureportError> for ProviderError {
    fn from(e: PureportError) -> Self {
        ProviderError::new(e.to_string()).with_cause(e)
    }
}

/// Raw API response
#[derive(Debug)]
pub struct PureportResponse {
    /// URL the request was sent to; relative `Location` headers resolve against it
    pub url: Url,
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: serde_json::Value,
}

impl PureportResponse {
    /// Last path segment of the `Location` header, the id of a created object
    pub fn location_id(&self) -> Result<String, PureportError> {
        let location = self
            .headers
            .get(LOCATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| {
                PureportError::InvalidResponse("response has no Location header".to_string())
            })?;
        let parsed = self.url.join(location).map_err(|e| {
            PureportError::InvalidResponse(format!("malformed Location header '{}': {}", location, e))
        })?;
        parsed
            .path_segments()
            .and_then(|segments| segments.filter(|s| !s.is_empty()).next_back())
            .map(str::to_string)
            .ok_or_else(|| {
                PureportError::InvalidResponse(format!("malformed Location header '{}'", location))
            })
    }

    pub fn json<T: DeserializeOwned>(self) -> Result<T, PureportError> {
        serde_json::from_value(self.body)
            .map_err(|e| PureportError::InvalidResponse(format!("unexpected body: {}", e)))
    }
}

pub struct Session {
    http: reqwest::Client,
    settings: Settings,
    base_url: Url,
    token: Mutex<Option<String>>,
}

impl Session {
    pub fn new(settings: Settings) -> Result<Self, PureportError> {
        // A trailing slash keeps `join` from dropping the last base segment
        let base_url = Url::parse(&format!("{}/", settings.endpoint.trim_end_matches('/')))?;
        let http = reqwest::Client::builder()
            .user_agent(format!("strata-provider-pureport/{}", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            http,
            settings,
            base_url,
            token: Mutex::new(None),
        })
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    fn url(&self, path: &str) -> Result<Url, PureportError> {
        Ok(self.base_url.join(path.trim_start_matches('/'))?)
    }

    async fn access_token(&self) -> Result<String, PureportError> {
        let (key, secret) = match &self.settings.credentials {
            Credentials::Token(token) => return Ok(token.clone()),
            Credentials::ApiKey { key, secret } => (key, secret),
        };

        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref() {
            return Ok(token.clone());
        }

        debug!("Logging in to {} with API key {}", self.settings.endpoint, key);
        let response = self
            .send_with_retries(
                Method::POST,
                self.url("/login")?,
                None,
                Some(&LoginRequest { key, secret }),
            )
            .await
            .map_err(|e| match e {
                PureportError::Api { status, message } => {
                    PureportError::Auth(format!("{}: {}", status, message))
                }
                other => other,
            })?;
        let login: LoginResponse = response.json()?;
        *cached = Some(login.access_token.clone());
        Ok(login.access_token)
    }

    async fn invalidate_token(&self) {
        *self.token.lock().await = None;
    }

    /// Send one request; a rejected cached token triggers a fresh login
    async fn request<B: Serialize + ?Sized>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> Result<PureportResponse, PureportError> {
        let url = self.url(path)?;
        let token = self.access_token().await?;
        let can_login = matches!(self.settings.credentials, Credentials::ApiKey { .. });
        match self
            .send_with_retries(method.clone(), url.clone(), Some(&token), body)
            .await
        {
            Err(e) if can_login && e.is_unauthorized() => {
                debug!("Access token rejected, logging in again");
                self.invalidate_token().await;
                let token = self.access_token().await?;
                self.send_with_retries(method, url, Some(&token), body).await
            }
            result => result,
        }
    }

    async fn send_with_retries<B: Serialize + ?Sized>(
        &self,
        method: Method,
        url: Url,
        token: Option<&str>,
        body: Option<&B>,
    ) -> Result<PureportResponse, PureportError> {
        let mut attempt = 0;
        loop {
            debug!("{} {}", method, url);
            let mut request = self.http.request(method.clone(), url.clone());
            if let Some(token) = token {
                request = request.bearer_auth(token);
            }
            if let Some(body) = body {
                request = request.json(body);
            }

            let server_delay = match request.send().await {
                Ok(response) => {
                    let status = response.status();
                    if !is_retryable(&method, status) || attempt >= self.settings.max_retries {
                        return into_response(url, response).await;
                    }
                    retry_after(response.headers())
                }
                Err(e)
                    if (e.is_connect() || (e.is_timeout() && is_idempotent(&method)))
                        && attempt < self.settings.max_retries =>
                {
                    warn!("{} {} failed: {}", method, url, e);
                    None
                }
                Err(e) => return Err(e.into()),
            };

            let delay = server_delay.unwrap_or_else(|| self.backoff(attempt));
            attempt += 1;
            debug!(
                "Retrying {} {} in {:?} (attempt {}/{})",
                method, url, delay, attempt, self.settings.max_retries
            );
            tokio::time::sleep(delay).await;
        }
    }

    fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.min(16));
        self.settings
            .retry_base_delay
            .saturating_mul(factor)
            .min(MAX_RETRY_DELAY)
    }

    /// GET a JSON document; `None` on 404
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<Option<T>, PureportError> {
        match self.request::<()>(Method::GET, path, None).await {
            Ok(response) => response.json().map(Some),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub async fn post<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<PureportResponse, PureportError> {
        self.request(Method::POST, path, Some(body)).await
    }

    pub async fn put<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<PureportResponse, PureportError> {
        self.request(Method::PUT, path, Some(body)).await
    }

    /// DELETE an object; returns false if it was already gone
    pub async fn delete(&self, path: &str) -> Result<bool, PureportError> {
        match self.request::<()>(Method::DELETE, path, None).await {
            Ok(_) => Ok(true),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }
}

fn is_idempotent(method: &Method) -> bool {
    matches!(*method, Method::GET | Method::PUT | Method::DELETE)
}

/// A server error may have followed a completed POST, so only throttling
/// is retried for it
fn is_retryable(method: &Method, status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || (status.is_server_error() && is_idempotent(method))
}

fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
        .map(|d| d.min(MAX_RETRY_DELAY))
}

async fn into_response(
    url: Url,
    response: reqwest::Response,
) -> Result<PureportResponse, PureportError> {
    let status = response.status();
    let headers = response.headers().clone();
    let text = response.text().await?;
    let body = if text.trim().is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_str(&text).unwrap_or(serde_json::Value::String(text))
    };

    if !status.is_success() {
        let message = body
            .get("message")
            .or_else(|| body.get("error"))
            .and_then(|v| v.as_str())
            .or_else(|| body.as_str())
            .unwrap_or_else(|| status.canonical_reason().unwrap_or("request failed"))
            .to_string();
        return Err(PureportError::Api {
            status: status.as_u16(),
            message,
        });
    }

    Ok(PureportResponse {
        url,
        status,
        headers,
        body,
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use httpmock::prelude::*;
    use reqwest::header::HeaderValue;
    use serde_json::json;

    use super::*;

    pub(crate) fn test_settings(server: &MockServer) -> Settings {
        Settings {
            endpoint: server.base_url(),
            credentials: Credentials::Token("test-token".to_string()),
            max_retries: 2,
            retry_base_delay: Duration::from_millis(5),
            polling_interval: Duration::from_millis(10),
            delete_timeout: Duration::from_secs(5),
        }
    }

    fn api_key_settings(server: &MockServer) -> Settings {
        Settings {
            credentials: Credentials::ApiKey {
                key: "key-1".to_string(),
                secret: "secret-1".to_string(),
            },
            ..test_settings(server)
        }
    }

    #[tokio::test]
    async fn get_sends_bearer_token() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET)
                .path("/networks/net-1")
                .header("authorization", "Bearer test-token");
            then.status(200).json_body(json!({"id": "net-1", "name": "n"}));
        });

        let session = Session::new(test_settings(&server)).unwrap();
        let body: Option<serde_json::Value> = session.get("/networks/net-1").await.unwrap();
        mock.assert();
        assert_eq!(body.unwrap()["name"], "n");
    }

    #[tokio::test]
    async fn get_maps_404_to_none() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/connections/gone");
            then.status(404).json_body(json!({"message": "not found"}));
        });
        server.mock(|when, then| {
            when.method(GET).path("/connections/bad");
            then.status(400).json_body(json!({"message": "bad id"}));
        });

        let session = Session::new(test_settings(&server)).unwrap();
        let gone: Option<serde_json::Value> = session.get("/connections/gone").await.unwrap();
        assert!(gone.is_none());

        let err = session
            .get::<serde_json::Value>("/connections/bad")
            .await
            .unwrap_err();
        assert!(matches!(err, PureportError::Api { status: 400, ref message } if message == "bad id"));
    }

    #[tokio::test]
    async fn logs_in_once_with_api_key() {
        let server = MockServer::start();
        let login = server.mock(|when, then| {
            when.method(POST)
                .path("/login")
                .json_body(json!({"key": "key-1", "secret": "secret-1"}));
            then.status(200).json_body(json!({"access_token": "issued", "refresh_token": "r"}));
        });
        let get = server.mock(|when, then| {
            when.method(GET)
                .path("/locations")
                .header("authorization", "Bearer issued");
            then.status(200).json_body(json!([]));
        });

        let session = Session::new(api_key_settings(&server)).unwrap();
        for _ in 0..3 {
            let _: Option<serde_json::Value> = session.get("/locations").await.unwrap();
        }
        login.assert_hits(1);
        get.assert_hits(3);
    }

    #[tokio::test]
    async fn rejected_login_is_an_auth_error() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/login");
            then.status(401).json_body(json!({"message": "invalid key"}));
        });

        let session = Session::new(api_key_settings(&server)).unwrap();
        let err = session
            .get::<serde_json::Value>("/locations")
            .await
            .unwrap_err();
        assert!(matches!(err, PureportError::Auth(_)));
        assert!(err.to_string().contains("invalid key"));
    }

    #[tokio::test]
    async fn retries_server_errors_up_to_max_retries() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET).path("/locations");
            then.status(503);
        });

        let session = Session::new(test_settings(&server)).unwrap();
        let err = session
            .get::<serde_json::Value>("/locations")
            .await
            .unwrap_err();
        mock.assert_hits(3);
        assert!(matches!(err, PureportError::Api { status: 503, .. }));
    }

    #[tokio::test]
    async fn client_errors_are_not_retried() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(PUT).path("/networks/net-1");
            then.status(409).json_body(json!({"message": "conflict"}));
        });

        let session = Session::new(test_settings(&server)).unwrap();
        assert!(session.put("/networks/net-1", &json!({})).await.is_err());
        mock.assert_hits(1);
    }

    #[tokio::test]
    async fn location_header_gives_created_id() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/networks/net-1/connections");
            then.status(201)
                .header("Location", "/connections/conn-42");
        });

        let session = Session::new(test_settings(&server)).unwrap();
        let response = session
            .post("/networks/net-1/connections", &json!({"name": "c"}))
            .await
            .unwrap();
        assert_eq!(response.location_id().unwrap(), "conn-42");
    }

    #[test]
    fn location_id_ignores_query_and_fragment() {
        let response = |location: &str| {
            let mut headers = HeaderMap::new();
            headers.insert(LOCATION, HeaderValue::from_str(location).unwrap());
            PureportResponse {
                url: Url::parse("https://api.pureport.com/networks/net-1/connections").unwrap(),
                status: StatusCode::CREATED,
                headers,
                body: serde_json::Value::Null,
            }
        };

        for location in [
            "https://api.pureport.com/connections/conn-123?expand=state",
            "https://api.pureport.com/connections/conn-123/#top",
            "/connections/conn-123?expand=state",
        ] {
            assert_eq!(response(location).location_id().unwrap(), "conn-123", "{}", location);
        }
        assert!(response("https://api.pureport.com/").location_id().is_err());
    }

    #[tokio::test]
    async fn post_is_not_retried_on_server_error() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST).path("/networks/net-1/connections");
            then.status(502);
        });

        let session = Session::new(test_settings(&server)).unwrap();
        let err = session
            .post("/networks/net-1/connections", &json!({"name": "c"}))
            .await
            .unwrap_err();
        mock.assert_hits(1);
        assert!(matches!(err, PureportError::Api { status: 502, .. }));
    }

    #[tokio::test]
    async fn post_is_retried_when_throttled() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST).path("/networks/net-1/connections");
            then.status(429).header("Retry-After", "0");
        });

        let session = Session::new(test_settings(&server)).unwrap();
        assert!(session
            .post("/networks/net-1/connections", &json!({"name": "c"}))
            .await
            .is_err());
        mock.assert_hits(3);
    }

    #[test]
    fn backoff_doubles_and_is_capped() {
        let server = MockServer::start();
        let mut settings = test_settings(&server);
        settings.retry_base_delay = Duration::from_secs(1);
        let session = Session::new(settings).unwrap();
        assert_eq!(session.backoff(0), Duration::from_secs(1));
        assert_eq!(session.backoff(3), Duration::from_secs(8));
        assert_eq!(session.backoff(10), MAX_RETRY_DELAY);
    }

    #[tokio::test]
    async fn delete_of_missing_object_returns_false() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(DELETE).path("/networks/gone");
            then.status(404);
        });
        let session = Session::new(test_settings(&server)).unwrap();
        assert!(!session.delete("/networks/gone").await.unwrap());
    }
}
