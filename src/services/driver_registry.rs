use std::{collections::HashMap, sync::Arc};
use tracing::{debug, warn};

use crate::{
    adapters::outbound::storage::{ApacheObjectStoreAdapter, GcsConfig, GcsDriver},
    domain::errors::{StorageError, StorageResult},
    ports::storage::ObjectStorage,
};

/// Builds a driver from `(endpoint, access_key, secret_key)`
pub type DriverConstructor =
    Arc<dyn Fn(&str, &str, &str) -> StorageResult<Arc<dyn ObjectStorage>> + Send + Sync>;

/// Maps URI schemes to driver constructors.
///
/// Built once at start-up and handed to whoever needs to open storage.
#[derive(Clone, Default)]
pub struct DriverRegistry {
    constructors: HashMap<String, DriverConstructor>,
}

impl DriverRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the drivers shipped with this crate
    pub fn with_builtin_drivers() -> Self {
        let mut registry = Self::new();
        registry.register("gs", new_gcs_driver);
        registry.register("mem", new_memory_driver);
        registry.register("file", new_file_driver);
        registry
    }

    /// Register `constructor` for `scheme`. A second registration replaces
    /// the first.
    pub fn register<F>(&mut self, scheme: &str, constructor: F)
    where
        F: Fn(&str, &str, &str) -> StorageResult<Arc<dyn ObjectStorage>> + Send + Sync + 'static,
    {
        let scheme = scheme.to_ascii_lowercase();
        if self
            .constructors
            .insert(scheme.clone(), Arc::new(constructor))
            .is_some()
        {
            warn!(%scheme, "storage driver registered twice, keeping the last one");
        }
    }

    /// Registered schemes in sorted order
    pub fn schemes(&self) -> Vec<&str> {
        let mut schemes: Vec<&str> = self.constructors.keys().map(String::as_str).collect();
        schemes.sort_unstable();
        schemes
    }

    /// Construct the driver for `uri`
    pub fn resolve(
        &self,
        uri: &str,
        access_key: &str,
        secret_key: &str,
    ) -> StorageResult<Arc<dyn ObjectStorage>> {
        let scheme = scheme_of(uri)?;
        let constructor = self
            .constructors
            .get(&scheme)
            .ok_or(StorageError::UnsupportedScheme { scheme })?;

        let storage = constructor(uri, access_key, secret_key)?;
        debug!(storage = %storage.identity(), "resolved storage");
        Ok(storage)
    }
}

impl std::fmt::Debug for DriverRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DriverRegistry")
            .field("schemes", &self.schemes())
            .finish()
    }
}

fn scheme_of(uri: &str) -> StorageResult<String> {
    match uri.split_once("://") {
        Some((scheme, _)) if !scheme.is_empty() => Ok(scheme.to_ascii_lowercase()),
        _ => Err(StorageError::configuration(format!(
            "storage URI has no scheme: {}",
            uri
        ))),
    }
}

fn new_gcs_driver(
    endpoint: &str,
    _access_key: &str,
    _secret_key: &str,
) -> StorageResult<Arc<dyn ObjectStorage>> {
    let config = GcsConfig::from_env(endpoint)?;
    Ok(Arc::new(GcsDriver::new(config)?))
}

fn new_memory_driver(
    endpoint: &str,
    _access_key: &str,
    _secret_key: &str,
) -> StorageResult<Arc<dyn ObjectStorage>> {
    let name = endpoint
        .split_once("://")
        .map(|(_, rest)| rest.trim_end_matches('/'))
        .unwrap_or_default();
    Ok(Arc::new(ApacheObjectStoreAdapter::memory(name)))
}

fn new_file_driver(
    endpoint: &str,
    _access_key: &str,
    _secret_key: &str,
) -> StorageResult<Arc<dyn ObjectStorage>> {
    let uri = url::Url::parse(endpoint)?;
    let root = uri.to_file_path().map_err(|_| {
        StorageError::configuration(format!("Not a local directory: {}", endpoint))
    })?;
    Ok(Arc::new(ApacheObjectStoreAdapter::local(root)?))
}
