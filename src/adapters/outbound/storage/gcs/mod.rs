//! Google Cloud Storage driver (`gs://bucket.region`)
//!
//! Talks to the Cloud Storage JSON API directly so that native page tokens,
//! `Range` requests and bucket creation stay under the driver's control.
//! Credentials come from the ambient chain provided by `object_store`.

pub mod client;
pub mod gcs_driver;

pub use client::{Authorization, GcsClient};
pub use gcs_driver::GcsDriver;

use object_store::gcp::GoogleCloudStorageBuilder;
use std::path::PathBuf;
use tracing::debug;

use crate::domain::{
    errors::{StorageError, StorageResult},
    value_objects::BucketName,
};

/// Environment variable naming the project buckets are created in
pub const PROJECT_ENV: &str = "GOOGLE_CLOUD_PROJECT";
/// Environment variable pointing the driver at a JSON API emulator
pub const EMULATOR_ENV: &str = "STORAGE_EMULATOR_HOST";

/// Where the driver gets its credentials from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialSource {
    /// Service account, application default credentials or metadata server
    Ambient,
    /// Unauthenticated requests
    Anonymous,
}

/// Configuration for the Cloud Storage driver
#[derive(Debug, Clone)]
pub struct GcsConfig {
    pub bucket: BucketName,
    /// Location hint, only used when the bucket has to be created
    pub region: Option<String>,
    pub project_id: String,
    pub base_url: String,
    pub credentials: CredentialSource,
}

impl GcsConfig {
    /// Configuration for an explicit bucket, without consulting the environment
    pub fn new(bucket: BucketName, project_id: impl Into<String>) -> Self {
        Self {
            bucket,
            region: None,
            project_id: project_id.into(),
            base_url: client::DEFAULT_BASE_URL.to_string(),
            credentials: CredentialSource::Ambient,
        }
    }

    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    /// Send requests to `base_url` without credentials
    pub fn with_emulator(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = normalize_host(&base_url.into());
        self.credentials = CredentialSource::Anonymous;
        self
    }

    /// Build the configuration for `gs://bucket.region/...`, resolving the
    /// project id and emulator endpoint from the environment.
    pub fn from_env(endpoint: &str) -> StorageResult<Self> {
        let (bucket, region) = parse_endpoint(endpoint)?;
        let project_id = discover_project_id().ok_or_else(|| {
            StorageError::configuration(format!(
                "{} environment variable must be set",
                PROJECT_ENV
            ))
        })?;

        let mut config = Self::new(bucket, project_id);
        config.region = region;
        if let Some(host) = std::env::var(EMULATOR_ENV).ok().filter(|h| !h.is_empty()) {
            debug!(%host, "using storage emulator");
            config = config.with_emulator(host);
        }
        Ok(config)
    }

    /// Resolve the configured credential source into request authorization
    pub fn authorization(&self) -> StorageResult<Authorization> {
        match self.credentials {
            CredentialSource::Anonymous => Ok(Authorization::Anonymous),
            CredentialSource::Ambient => {
                let store = GoogleCloudStorageBuilder::from_env()
                    .with_bucket_name(self.bucket.as_str())
                    .build()
                    .map_err(|e| {
                        StorageError::configuration(format!(
                            "no usable Google Cloud credentials: {}",
                            e
                        ))
                    })?;
                Ok(Authorization::Bearer(store.credentials().clone()))
            }
        }
    }
}

/// Split `gs://bucket.region/...` into the bucket and the optional region
pub fn parse_endpoint(endpoint: &str) -> StorageResult<(BucketName, Option<String>)> {
    let uri = url::Url::parse(endpoint).map_err(|e| {
        StorageError::configuration(format!("Invalid endpoint: {}, error: {}", endpoint, e))
    })?;
    let host = uri
        .host_str()
        .filter(|h| !h.is_empty())
        .ok_or_else(|| StorageError::configuration(format!("Invalid endpoint: {}", endpoint)))?;

    let mut labels = host.splitn(2, '.');
    let bucket = labels.next().unwrap_or_default().to_string();
    let region = labels.next().filter(|r| !r.is_empty()).map(str::to_string);

    let bucket = BucketName::new(bucket).map_err(|e| {
        StorageError::configuration(format!("Invalid bucket in {}: {}", endpoint, e))
    })?;
    Ok((bucket, region))
}

/// Project id from the environment or the ambient credentials file
pub fn discover_project_id() -> Option<String> {
    if let Some(project) = std::env::var(PROJECT_ENV).ok().filter(|p| !p.is_empty()) {
        return Some(project);
    }
    let path = credentials_file()?;
    let contents = std::fs::read_to_string(&path).ok()?;
    project_id_from_credentials(&contents)
}

fn credentials_file() -> Option<PathBuf> {
    if let Ok(path) = std::env::var("GOOGLE_APPLICATION_CREDENTIALS") {
        return Some(PathBuf::from(path));
    }
    let home = std::env::var_os("HOME")?;
    Some(PathBuf::from(home).join(".config/gcloud/application_default_credentials.json"))
}

/// Service account keys carry `project_id`, user credentials only a quota project
pub fn project_id_from_credentials(json: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(json).ok()?;
    ["project_id", "quota_project_id"]
        .iter()
        .filter_map(|field| value.get(*field).and_then(|v| v.as_str()))
        .find(|p| !p.is_empty())
        .map(str::to_string)
}

fn normalize_host(host: &str) -> String {
    if host.contains("://") {
        host.to_string()
    } else {
        format!("http://{}", host)
    }
}
