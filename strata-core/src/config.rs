//! Config - Workspace configuration file
//!
//! A workspace is described by one JSON document:
//!
//! ```json
//! {
//!   "backend": { "type": "local", "path": "strata.state.json" },
//!   "providers": { "azurerm": { "subscription_id": "..." } },
//!   "resources": [
//!     { "type": "azurerm_ddos_protection_plan", "name": "main",
//!       "attributes": { "name": "plan1", "location": "West Europe" } }
//!   ],
//!   "data": [
//!     { "type": "pureport_locations", "name": "all", "attributes": {} }
//!   ]
//! }
//! ```

use std::collections::{HashMap, HashSet};
use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

use crate::resource::{Resource, Value};

pub const DEFAULT_CONFIG_FILE: &str = "main.strata.json";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid configuration: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Duplicate declaration of {0}")]
    DuplicateBinding(String),

    #[error("Block '{0}' must be a JSON object")]
    NotAnObject(String),

    #[error("Invalid name '{0}': names may not be empty or contain '.'")]
    InvalidName(String),
}

#[derive(Debug, Clone, Deserialize)]
struct RawDeclaration {
    #[serde(rename = "type")]
    resource_type: String,
    name: String,
    #[serde(default)]
    attributes: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct RawConfig {
    #[serde(default)]
    backend: Option<serde_json::Value>,
    #[serde(default)]
    providers: HashMap<String, serde_json::Value>,
    #[serde(default)]
    resources: Vec<RawDeclaration>,
    #[serde(default)]
    data: Vec<RawDeclaration>,
}

/// Backend settings as written in the configuration
#[derive(Debug, Clone, PartialEq)]
pub struct BackendSettings {
    pub backend_type: String,
    pub attributes: HashMap<String, Value>,
}

/// Parsed workspace configuration
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub backend: Option<BackendSettings>,
    /// Raw provider blocks, keyed by provider name
    pub providers: HashMap<String, serde_json::Value>,
    /// Managed resources and data sources, in declaration order
    pub resources: Vec<Resource>,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let raw: RawConfig = serde_json::from_str(content)?;

        let backend = match raw.backend {
            None => None,
            Some(serde_json::Value::Object(map)) => {
                let backend_type = map
                    .get("type")
                    .and_then(|v| v.as_str())
                    .unwrap_or("local")
                    .to_string();
                let attributes = map
                    .iter()
                    .filter(|(k, _)| k.as_str() != "type")
                    .filter_map(|(k, v)| Value::from_json(v).map(|v| (k.clone(), v)))
                    .collect();
                Some(BackendSettings {
                    backend_type,
                    attributes,
                })
            }
            Some(_) => return Err(ConfigError::NotAnObject("backend".to_string())),
        };

        for (name, block) in &raw.providers {
            if !block.is_object() {
                return Err(ConfigError::NotAnObject(format!("providers.{}", name)));
            }
        }

        let mut seen = HashSet::new();
        let mut resources = Vec::new();
        let declarations = raw
            .resources
            .iter()
            .map(|d| (d, false))
            .chain(raw.data.iter().map(|d| (d, true)));
        for (decl, read_only) in declarations {
            if decl.name.is_empty() || decl.name.contains('.') {
                return Err(ConfigError::InvalidName(decl.name.clone()));
            }
            let mut resource = Resource::new(decl.resource_type.clone(), decl.name.clone())
                .with_read_only(read_only);
            if !seen.insert(resource.id.binding()) {
                return Err(ConfigError::DuplicateBinding(resource.id.binding()));
            }
            for (key, value) in &decl.attributes {
                if let Some(value) = Value::from_json(value) {
                    resource.attributes.insert(key.clone(), value);
                }
            }
            resources.push(resource);
        }

        Ok(Self {
            backend,
            providers: raw.providers,
            resources,
        })
    }

    /// Raw configuration block of a provider, or an empty object
    pub fn provider_block(&self, name: &str) -> serde_json::Value {
        self.providers
            .get(name)
            .cloned()
            .unwrap_or_else(|| serde_json::Value::Object(Default::default()))
    }

    /// Names of providers needed by the declared resources or configured explicitly
    pub fn required_providers(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .resources
            .iter()
            .filter_map(|r| r.id.resource_type.split_once('_').map(|(p, _)| p.to_string()))
            .chain(self.providers.keys().cloned())
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        names.sort();
        names
    }
}
