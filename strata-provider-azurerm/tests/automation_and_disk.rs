mod common;

use std::collections::HashMap;

use httpmock::prelude::*;
use serde_json::json;
use strata_core::differ::create_plan;
use strata_core::effect::Effect;
use strata_core::interpreter::{EffectOutcome, Interpreter};
use strata_core::plan::Plan;
use strata_core::provider::{Provider, find_schema};
use strata_core::resolver::Bindings;
use strata_core::resource::{Resource, ResourceId, Value};

use common::{RG_PREFIX, provider};

const ACCOUNT: &str = "azurerm_automation_account";
const DISK: &str = "azurerm_managed_disk";

fn account_path() -> String {
    format!("{}/Microsoft.Automation/automationAccounts/acct", RG_PREFIX)
}

fn disk_path(name: &str) -> String {
    format!("{}/Microsoft.Compute/disks/{}", RG_PREFIX, name)
}

fn account_resource(sku: Option<&str>) -> Resource {
    let sku_block = match sku {
        Some(name) => Value::block([("name", Value::string(name))]),
        None => Value::List(vec![Value::Map(HashMap::new())]),
    };
    Resource::new(ACCOUNT, "acct")
        .with_attribute("name", Value::string("acct"))
        .with_attribute("location", Value::string("East US"))
        .with_attribute("resource_group_name", Value::string("rg"))
        .with_attribute("sku", sku_block)
}

fn mock_account_reads(server: &MockServer) {
    server.mock(|when, then| {
        when.method(GET).path(account_path());
        then.status(200).json_body(json!({
            "id": account_path(),
            "name": "acct",
            "location": "eastus",
            "properties": {"sku": {"name": "Basic"}},
            "tags": {}
        }));
    });
    server.mock(|when, then| {
        when.method(GET)
            .path(format!("{}/agentRegistrationInformation", account_path()));
        then.status(200).json_body(json!({
            "endpoint": "https://we-agentservice-prod-1.azure-automation.net/accounts/abc",
            "keys": {"primary": "primary-key", "secondary": "secondary-key"}
        }));
    });
}

#[tokio::test]
async fn automation_account_sku_defaults_to_basic() {
    let server = MockServer::start();
    let put = server.mock(|when, then| {
        when.method(PUT)
            .path(account_path())
            .query_param("api-version", "2015-10-31")
            .json_body(json!({
                "properties": {"sku": {"name": "Basic"}},
                "location": "eastus",
                "tags": {}
            }));
        then.status(201).json_body(json!({"id": account_path()}));
    });
    mock_account_reads(&server);

    let provider = provider(&server);
    let schemas = HashMap::from([(ACCOUNT.to_string(), find_schema(&provider, ACCOUNT).unwrap())]);
    let plan = create_plan(&[account_resource(None)], &HashMap::new(), &[], &schemas);

    let interpreter = Interpreter::new(provider);
    let result = interpreter.apply(&plan, &mut Bindings::new()).await;
    assert!(result.is_success(), "{:?}", result.outcomes);
    let Ok(EffectOutcome::Created { state }) = &result.outcomes[0] else {
        panic!("expected created account, got {:?}", result.outcomes[0]);
    };

    put.assert();
    assert_eq!(state.identifier.as_deref(), Some(account_path().as_str()));
    assert_eq!(state.get_str("dsc_primary_access_key"), Some("primary-key"));
    assert_eq!(state.get_str("dsc_secondary_access_key"), Some("secondary-key"));
    assert!(state.get_str("dsc_server_endpoint").unwrap().starts_with("https://"));
    assert_eq!(
        state.attributes["sku"],
        Value::block([("name", Value::string("Basic"))])
    );
}

#[tokio::test]
async fn automation_account_missing_registration_info_is_not_found() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path(account_path());
        then.status(200).json_body(json!({"id": account_path(), "name": "acct"}));
    });
    server.mock(|when, then| {
        when.method(GET)
            .path(format!("{}/agentRegistrationInformation", account_path()));
        then.status(404);
    });

    let provider = provider(&server);
    let id = ResourceId::new(ACCOUNT, "acct");
    let state = provider.read(&id, Some(&account_path())).await.unwrap();
    assert!(!state.exists);
}

#[tokio::test]
async fn automation_account_delete_tolerates_missing_account() {
    let server = MockServer::start();
    let delete = server.mock(|when, then| {
        when.method(DELETE).path(account_path());
        then.status(404);
    });

    let provider = provider(&server);
    let id = ResourceId::new(ACCOUNT, "acct");
    let from = strata_core::resource::State::not_found(id.clone());
    provider.delete(&id, &account_path(), &from).await.unwrap();
    delete.assert();
}

#[tokio::test]
async fn managed_disk_data_source_flattens_disk() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET)
            .path(disk_path("osdisk"))
            .query_param("api-version", "2018-06-01");
        then.status(200).json_body(json!({
            "id": disk_path("osdisk"),
            "name": "osdisk",
            "sku": {"name": "Premium_LRS"},
            "zones": ["1"],
            "properties": {
                "diskSizeGB": 128,
                "osType": "Linux",
                "creationData": {"createOption": "Empty"}
            },
            "tags": {"team": "infra"}
        }));
    });

    let provider = provider(&server);
    let resource = Resource::new(DISK, "osdisk")
        .with_attribute("name", Value::string("osdisk"))
        .with_attribute("resource_group_name", Value::string("rg"))
        .with_read_only(true);
    let state = provider.read_data_source(&resource).await.unwrap();

    assert_eq!(state.identifier.as_deref(), Some(disk_path("osdisk").as_str()));
    assert_eq!(state.get_str("storage_account_type"), Some("Premium_LRS"));
    assert_eq!(state.attributes["disk_size_gb"], Value::Int(128));
    assert_eq!(state.get_str("os_type"), Some("Linux"));
    assert_eq!(state.get_str("create_option"), Some("Empty"));
    assert!(!state.attributes.contains_key("source_uri"));
    assert_eq!(state.attributes["zones"], Value::List(vec![Value::string("1")]));
}

#[tokio::test]
async fn managed_disk_not_found_is_an_error() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path(disk_path("missing"));
        then.status(404);
    });

    let provider = provider(&server);
    let resource = Resource::new(DISK, "missing")
        .with_attribute("name", Value::string("missing"))
        .with_attribute("resource_group_name", Value::string("rg"))
        .with_read_only(true);
    let err = provider.read_data_source(&resource).await.unwrap_err();
    assert!(err.to_string().contains("was not found"));
    assert!(err.to_string().starts_with("[azurerm_managed_disk.missing]"));
}

#[tokio::test]
async fn interpreter_reads_disk_and_creates_account() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path(disk_path("osdisk"));
        then.status(200).json_body(json!({"id": disk_path("osdisk"), "name": "osdisk"}));
    });
    server.mock(|when, then| {
        when.method(PUT).path(account_path());
        then.status(200).json_body(json!({"id": account_path()}));
    });
    mock_account_reads(&server);

    let disk = Resource::new(DISK, "osdisk")
        .with_attribute("name", Value::string("osdisk"))
        .with_attribute("resource_group_name", Value::string("rg"))
        .with_read_only(true);
    // The account takes its resource group from the disk data source
    let account = account_resource(Some("Free")).with_attribute(
        "resource_group_name",
        Value::ResourceRef(
            "azurerm_managed_disk.osdisk".to_string(),
            "resource_group_name".to_string(),
        ),
    );

    let mut plan = Plan::new();
    plan.add(Effect::Read(disk));
    plan.add(Effect::Create(account));

    let interpreter = Interpreter::new(provider(&server));
    let mut bindings = Bindings::new();
    let result = interpreter.apply(&plan, &mut bindings).await;

    assert!(result.is_success(), "{:?}", result.outcomes);
    assert!(matches!(
        result.outcomes[1].as_ref().unwrap(),
        EffectOutcome::Created { .. }
    ));
}
