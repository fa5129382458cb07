#![allow(dead_code)]

use std::time::Duration;

use httpmock::MockServer;
use serde_json::json;
use strata_core::resource::Value;
use strata_provider_pureport::PureportProvider;
use strata_provider_pureport::config::{Credentials, Settings};

pub fn settings(server: &MockServer) -> Settings {
    Settings {
        endpoint: server.base_url(),
        credentials: Credentials::Token("test-token".to_string()),
        max_retries: 2,
        retry_base_delay: Duration::from_millis(5),
        polling_interval: Duration::from_millis(10),
        delete_timeout: Duration::from_secs(5),
    }
}

pub fn provider(server: &MockServer) -> PureportProvider {
    PureportProvider::new(settings(server)).unwrap()
}

pub fn link(id: &str, href: &str) -> Value {
    Value::block([("id", Value::string(id)), ("href", Value::string(href))])
}

/// Connection body as returned by `GET /connections/{id}`
pub fn connection_body(id: &str, connection_type: &str, state: &str) -> serde_json::Value {
    json!({
        "id": id,
        "href": format!("/connections/{}", id),
        "type": connection_type,
        "name": "conn",
        "speed": 100,
        "highAvailability": true,
        "billingTerm": "HOURLY",
        "location": {"id": "us-sea", "href": "/locations/us-sea"},
        "network": {"id": "net-1", "href": "/networks/net-1"},
        "customerNetworks": [{"name": "office", "address": "192.168.0.0/24"}],
        "serviceKey": "sk-1",
        "peering": {"type": "PRIVATE"},
        "state": state
    })
}
