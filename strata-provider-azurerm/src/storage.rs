//! Storage account access keys
//!
//! Keys are fetched through `listKeys` once per account and kept for the
//! life of the process behind a single reader/writer lock.

use std::collections::HashMap;
use std::fmt;

use log::debug;
use tokio::sync::RwLock;
use url::Url;

use crate::client::{ArmClient, ClientError};

pub const STORAGE_API_VERSION: &str = "2019-04-01";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageService {
    Blob,
    File,
    Table,
    Queue,
}

impl StorageService {
    pub fn as_str(&self) -> &'static str {
        match self {
            StorageService::Blob => "blob",
            StorageService::File => "file",
            StorageService::Table => "table",
            StorageService::Queue => "queue",
        }
    }
}

impl fmt::Display for StorageService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Data-plane endpoint of one storage service, with the key to sign for it
#[derive(Clone, PartialEq, Eq)]
pub struct StorageEndpoint {
    pub account_name: String,
    pub account_key: String,
    pub service: StorageService,
    pub url: Url,
}

impl fmt::Debug for StorageEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StorageEndpoint")
            .field("account_name", &self.account_name)
            .field("service", &self.service)
            .field("url", &self.url.as_str())
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Default)]
pub struct StorageKeyCache {
    keys: RwLock<HashMap<String, String>>,
}

impl StorageKeyCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Access key of a storage account
    ///
    /// Returns `Ok(None)` when the account does not exist. Any other failure
    /// is an error and the account is assumed to exist.
    pub async fn get_key(
        &self,
        client: &ArmClient,
        resource_group: &str,
        account_name: &str,
    ) -> Result<Option<String>, ClientError> {
        let cache_key = format!("{}/{}", resource_group, account_name);

        if let Some(key) = self.keys.read().await.get(&cache_key) {
            return Ok(Some(key.clone()));
        }

        let mut keys = self.keys.write().await;
        // Another task may have filled it while we waited for the write lock
        if let Some(key) = keys.get(&cache_key) {
            return Ok(Some(key.clone()));
        }

        debug!("Fetching access keys for storage account {}", cache_key);
        let path = format!(
            "/subscriptions/{}/resourceGroups/{}/providers/Microsoft.Storage/storageAccounts/{}/listKeys",
            client.subscription_id(),
            resource_group,
            account_name
        );
        let Some(response) = client.post(&path, STORAGE_API_VERSION, None).await? else {
            return Ok(None);
        };

        let key = response
            .get("keys")
            .and_then(|k| k.as_array())
            .and_then(|k| k.first())
            .ok_or_else(|| {
                ClientError::InvalidResponse(format!(
                    "no keys returned for storage account {:?}",
                    account_name
                ))
            })?
            .get("value")
            .and_then(|v| v.as_str())
            .filter(|v| !v.is_empty())
            .ok_or_else(|| {
                ClientError::InvalidResponse(format!(
                    "first key of storage account {:?} has no value",
                    account_name
                ))
            })?
            .to_string();

        keys.insert(cache_key, key.clone());
        Ok(Some(key))
    }

    /// Endpoint for a storage service of an account; `None` if the account is gone
    pub async fn endpoint(
        &self,
        client: &ArmClient,
        resource_group: &str,
        account_name: &str,
        service: StorageService,
    ) -> Result<Option<StorageEndpoint>, ClientError> {
        let Some(account_key) = self.get_key(client, resource_group, account_name).await? else {
            return Ok(None);
        };
        let url = service_url(
            account_name,
            service,
            &client.settings().environment.storage_endpoint_suffix,
        )?;
        Ok(Some(StorageEndpoint {
            account_name: account_name.to_string(),
            account_key,
            service,
            url,
        }))
    }

    pub async fn len(&self) -> usize {
        self.keys.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.keys.read().await.is_empty()
    }
}

/// `https://{account}.{service}.{suffix}`
pub fn service_url(
    account_name: &str,
    service: StorageService,
    endpoint_suffix: &str,
) -> Result<Url, ClientError> {
    Ok(Url::parse(&format!(
        "https://{}.{}.{}",
        account_name, service, endpoint_suffix
    ))?)
}
