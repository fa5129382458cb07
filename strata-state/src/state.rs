//! State file structures for persisting resource state

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use strata_core::resource::{ResourceId, State, Value};

/// The state file as persisted by a backend
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateFile {
    /// State file format version
    pub version: u32,
    /// Incremented on every write
    pub serial: u64,
    /// Identifies one state history; a write with another lineage is refused
    pub lineage: String,
    /// Version of strata that last wrote this state
    pub strata_version: String,
    pub resources: Vec<ResourceState>,
}

impl StateFile {
    pub const CURRENT_VERSION: u32 = 1;

    pub fn new() -> Self {
        Self::with_lineage(uuid::Uuid::new_v4().to_string())
    }

    pub fn with_lineage(lineage: String) -> Self {
        Self {
            version: Self::CURRENT_VERSION,
            serial: 0,
            lineage,
            strata_version: env!("CARGO_PKG_VERSION").to_string(),
            resources: Vec::new(),
        }
    }

    pub fn increment_serial(&mut self) {
        self.serial += 1;
        self.strata_version = env!("CARGO_PKG_VERSION").to_string();
    }

    /// Add or replace the entry for a resource, keeping its position
    pub fn upsert_resource(&mut self, resource: ResourceState) {
        match self
            .resources
            .iter_mut()
            .find(|r| r.resource_type == resource.resource_type && r.name == resource.name)
        {
            Some(existing) => *existing = resource,
            None => self.resources.push(resource),
        }
    }

    pub fn remove_resource(&mut self, id: &ResourceId) -> Option<ResourceState> {
        let pos = self
            .resources
            .iter()
            .position(|r| r.resource_type == id.resource_type && r.name == id.name)?;
        Some(self.resources.remove(pos))
    }

    /// Record a state returned by a provider; a state that no longer exists
    /// is removed instead
    pub fn record(&mut self, state: &State, provider: &str) {
        if state.exists {
            self.upsert_resource(ResourceState::from_state(state, provider));
        } else {
            self.remove_resource(&state.id);
        }
    }

    /// Recorded states keyed by resource id
    pub fn states(&self) -> HashMap<ResourceId, State> {
        self.resources
            .iter()
            .map(|r| (r.id(), r.to_state()))
            .collect()
    }
}

impl Default for StateFile {
    fn default() -> Self {
        Self::new()
    }
}

/// State of a single managed resource
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceState {
    /// Resource type (e.g., "pureport_network")
    pub resource_type: String,
    /// Binding name from the configuration
    pub name: String,
    /// Provider name (e.g., "pureport")
    pub provider: String,
    /// Identifier assigned by the remote API
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identifier: Option<String>,
    pub attributes: HashMap<String, serde_json::Value>,
}

impl ResourceState {
    pub fn new(
        resource_type: impl Into<String>,
        name: impl Into<String>,
        provider: impl Into<String>,
    ) -> Self {
        Self {
            resource_type: resource_type.into(),
            name: name.into(),
            provider: provider.into(),
            identifier: None,
            attributes: HashMap::new(),
        }
    }

    pub fn with_identifier(mut self, identifier: impl Into<String>) -> Self {
        self.identifier = Some(identifier.into());
        self
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.attributes.insert(key.into(), value);
        self
    }

    pub fn from_state(state: &State, provider: &str) -> Self {
        Self {
            resource_type: state.id.resource_type.clone(),
            name: state.id.name.clone(),
            provider: provider.to_string(),
            identifier: state.identifier.clone(),
            attributes: state
                .attributes
                .iter()
                .map(|(k, v)| (k.clone(), v.to_json()))
                .collect(),
        }
    }

    pub fn id(&self) -> ResourceId {
        ResourceId::new(&self.resource_type, &self.name)
    }

    /// Convert back into an existing `State`; JSON nulls are dropped
    pub fn to_state(&self) -> State {
        let attributes = self
            .attributes
            .iter()
            .filter_map(|(k, v)| Value::from_json(v).map(|v| (k.clone(), v)))
            .collect();
        let state = State::existing(self.id(), attributes);
        match &self.identifier {
            Some(identifier) => state.with_identifier(identifier.clone()),
            None => state,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn network_state() -> State {
        State::existing(
            ResourceId::new("pureport_network", "main"),
            [
                ("name".to_string(), Value::string("main")),
                ("href".to_string(), Value::string("/networks/net-1")),
            ]
            .into_iter()
            .collect(),
        )
        .with_identifier("net-1")
    }

    #[test]
    fn test_state_file_new() {
        let state = StateFile::new();
        assert_eq!(state.version, StateFile::CURRENT_VERSION);
        assert_eq!(state.serial, 0);
        assert!(!state.lineage.is_empty());
        assert!(state.resources.is_empty());
    }

    #[test]
    fn test_state_file_increment_serial() {
        let mut state = StateFile::new();
        state.increment_serial();
        state.increment_serial();
        assert_eq!(state.serial, 2);
    }

    #[test]
    fn test_upsert_keeps_position() {
        let mut state = StateFile::new();
        state.upsert_resource(ResourceState::new("pureport_network", "a", "pureport"));
        state.upsert_resource(ResourceState::new("pureport_network", "b", "pureport"));
        state.upsert_resource(
            ResourceState::new("pureport_network", "a", "pureport").with_identifier("net-a"),
        );

        assert_eq!(state.resources.len(), 2);
        assert_eq!(state.resources[0].name, "a");
        assert_eq!(state.resources[0].identifier.as_deref(), Some("net-a"));
    }

    #[test]
    fn test_record_and_remove() {
        let mut state = StateFile::new();
        let created = network_state();
        state.record(&created, "pureport");
        assert_eq!(state.resources.len(), 1);
        assert_eq!(state.resources[0].provider, "pureport");

        state.record(&State::not_found(created.id.clone()), "pureport");
        assert!(state.resources.is_empty());
    }

    #[test]
    fn test_states_restore_identifier_and_attributes() {
        let mut state = StateFile::new();
        state.record(&network_state(), "pureport");

        let states = state.states();
        let restored = &states[&ResourceId::new("pureport_network", "main")];
        assert!(restored.exists);
        assert_eq!(restored.identifier.as_deref(), Some("net-1"));
        assert_eq!(restored.get_str("href"), Some("/networks/net-1"));
    }

    #[test]
    fn test_identifier_is_omitted_when_unknown() {
        let resource = ResourceState::new("pureport_locations", "all", "pureport");
        let json = serde_json::to_value(&resource).unwrap();
        assert!(json.get("identifier").is_none());
    }

    #[test]
    fn test_state_file_serialization() {
        let mut state = StateFile::new();
        state.record(&network_state(), "pureport");

        let json = serde_json::to_string_pretty(&state).unwrap();
        assert!(json.contains("\"strata_version\""));
        let deserialized: StateFile = serde_json::from_str(&json).unwrap();

        assert_eq!(deserialized.lineage, state.lineage);
        assert_eq!(deserialized.resources.len(), 1);
        assert_eq!(
            deserialized.resources[0].attributes["href"],
            serde_json::json!("/networks/net-1")
        );
    }
}
