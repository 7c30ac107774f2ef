use std::sync::Arc;

use crate::{
    domain::errors::StorageError, ports::storage::ObjectStorage, services::DriverRegistry,
};

/// Environment variable holding the storage URI
pub const URI_ENV: &str = "OBJECT_STORAGE_URI";
/// Environment variable holding the access key handed to the driver
pub const ACCESS_KEY_ENV: &str = "OBJECT_STORAGE_ACCESS_KEY";
/// Environment variable holding the secret key handed to the driver
pub const SECRET_KEY_ENV: &str = "OBJECT_STORAGE_SECRET_KEY";

/// Configuration for opening one storage container
#[derive(Debug, Clone, Default)]
pub struct StorageConfig {
    pub uri: String,
    pub access_key: String,
    pub secret_key: String,
}

impl StorageConfig {
    pub fn new(uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            ..Default::default()
        }
    }

    pub fn with_credentials(
        mut self,
        access_key: impl Into<String>,
        secret_key: impl Into<String>,
    ) -> Self {
        self.access_key = access_key.into();
        self.secret_key = secret_key.into();
        self
    }

    /// Read the configuration from environment variables
    pub fn from_env() -> Result<Self, AppError> {
        let uri = std::env::var(URI_ENV).map_err(|_| AppError::Configuration {
            message: format!("{} environment variable required", URI_ENV),
        })?;

        Ok(Self {
            uri,
            access_key: std::env::var(ACCESS_KEY_ENV).unwrap_or_default(),
            secret_key: std::env::var(SECRET_KEY_ENV).unwrap_or_default(),
        })
    }
}

/// Application-level errors
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Storage initialization error: {0}")]
    StorageInit(StorageError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Resolve `config` through `registry` into a live driver
pub fn open_storage(
    registry: &DriverRegistry,
    config: &StorageConfig,
) -> Result<Arc<dyn ObjectStorage>, AppError> {
    registry
        .resolve(&config.uri, &config.access_key, &config.secret_key)
        .map_err(|err| match err {
            StorageError::Configuration { message } => AppError::Configuration { message },
            other => AppError::StorageInit(other),
        })
}

/// Open the storage described by the environment with the built-in drivers
pub fn open_storage_from_env() -> Result<Arc<dyn ObjectStorage>, AppError> {
    let config = StorageConfig::from_env()?;
    open_storage(&DriverRegistry::with_builtin_drivers(), &config)
}
