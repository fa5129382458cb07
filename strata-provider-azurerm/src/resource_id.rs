//! Parsing of Azure Resource Manager IDs
//!
//! `/subscriptions/{sub}/resourceGroups/{rg}/providers/{ns}/{type}/{name}`

use std::collections::HashMap;

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ResourceIdError {
    #[error("Cannot parse Azure ID {0:?}: the number of path segments is not divisible by 2")]
    OddSegments(String),

    #[error("No subscription ID found in {0:?}")]
    MissingSubscription(String),

    #[error("Empty value for key {key:?} in {id:?}")]
    EmptyValue { id: String, key: String },

    #[error("No {key:?} segment found in {id:?}")]
    MissingSegment { id: String, key: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AzureResourceId {
    pub subscription_id: String,
    pub resource_group: String,
    pub provider: String,
    /// Remaining key/value pairs, e.g. `ddosProtectionPlans -> plan1`
    pub path: HashMap<String, String>,
    raw: String,
}

impl AzureResourceId {
    /// Value of a path key, erroring if absent
    pub fn segment(&self, key: &str) -> Result<&str, ResourceIdError> {
        self.path
            .get(key)
            .map(|s| s.as_str())
            .ok_or_else(|| ResourceIdError::MissingSegment {
                id: self.raw.clone(),
                key: key.to_string(),
            })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

pub fn parse_azure_resource_id(id: &str) -> Result<AzureResourceId, ResourceIdError> {
    // Drop any query string before splitting the path
    let path = id.split('?').next().unwrap_or(id);
    let path = path.trim_start_matches('/').trim_end_matches('/');
    let components: Vec<&str> = path.split('/').collect();

    if components.len() % 2 != 0 {
        return Err(ResourceIdError::OddSegments(id.to_string()));
    }

    let mut subscription_id = None;
    let mut resource_group = String::new();
    let mut provider = String::new();
    let mut rest = HashMap::new();

    for pair in components.chunks(2) {
        let (key, value) = (pair[0], pair[1]);
        if value.is_empty() {
            return Err(ResourceIdError::EmptyValue {
                id: id.to_string(),
                key: key.to_string(),
            });
        }
        match key {
            "subscriptions" if subscription_id.is_none() => {
                subscription_id = Some(value.to_string());
            }
            "resourceGroups" if resource_group.is_empty() => resource_group = value.to_string(),
            "providers" if provider.is_empty() => provider = value.to_string(),
            _ => {
                rest.insert(key.to_string(), value.to_string());
            }
        }
    }

    let subscription_id =
        subscription_id.ok_or_else(|| ResourceIdError::MissingSubscription(id.to_string()))?;

    Ok(AzureResourceId {
        subscription_id,
        resource_group,
        provider,
        path: rest,
        raw: id.to_string(),
    })
}

/// Build the ID of a resource inside a resource group
pub fn resource_group_scoped_id(
    subscription_id: &str,
    resource_group: &str,
    provider: &str,
    resource_type: &str,
    name: &str,
) -> String {
    format!(
        "/subscriptions/{}/resourceGroups/{}/providers/{}/{}/{}",
        subscription_id, resource_group, provider, resource_type, name
    )
}
