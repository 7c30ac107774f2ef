use async_trait::async_trait;
use tracing::{debug, info, instrument, warn};

use super::{
    client::{BucketResource, GcsClient},
    GcsConfig,
};
use crate::{
    adapters::outbound::storage::error::StoreError,
    domain::{
        errors::{StorageError, StorageResult},
        models::{Object, ObjectPage},
        value_objects::{BucketName, ByteRange, ObjectKey},
    },
    ports::storage::{ObjectReader, ObjectStorage, PageCursor},
};

/// Storage class requested when a location is given, as the legacy API expects
const REGIONAL_STORAGE_CLASS: &str = "REGIONAL";

/// Driver for one Cloud Storage bucket
pub struct GcsDriver {
    client: GcsClient,
    bucket: BucketName,
    region: Option<String>,
    project_id: String,
    cursor: PageCursor,
}

impl GcsDriver {
    /// Create a driver, resolving credentials up front
    pub fn new(config: GcsConfig) -> StorageResult<Self> {
        let auth = config.authorization()?;
        let client = GcsClient::new(config.base_url.clone(), auth);
        Ok(Self::with_client(client, config))
    }

    pub fn with_client(client: GcsClient, config: GcsConfig) -> Self {
        Self {
            client,
            bucket: config.bucket,
            region: config.region,
            project_id: config.project_id,
            cursor: PageCursor::new(),
        }
    }

    pub fn bucket(&self) -> &BucketName {
        &self.bucket
    }

    fn to_object(item: super::client::ObjectResource) -> Object {
        Object::from_rfc3339(
            item.name,
            item.size,
            item.time_created.as_deref(),
            item.updated.as_deref(),
        )
    }
}

/// Bucket creation conflicts are only benign when the caller owns the bucket
fn is_owned_by_caller(err: &StoreError) -> bool {
    match err {
        StoreError::Http { status, message } => {
            *status == http::StatusCode::CONFLICT
                && message.to_lowercase().contains("you already own")
        }
        _ => false,
    }
}

#[async_trait]
impl ObjectStorage for GcsDriver {
    fn identity(&self) -> String {
        format!("gs://{}", self.bucket)
    }

    #[instrument(skip(self), fields(bucket = %self.bucket))]
    async fn create(&self) -> StorageResult<()> {
        match self.list_page("", None, 1).await {
            Ok(_) => return Ok(()),
            Err(err) => debug!(error = %err, "bucket probe failed, creating bucket"),
        }

        let resource = BucketResource {
            name: self.bucket.to_string(),
            location: self.region.clone(),
            storage_class: self
                .region
                .as_ref()
                .map(|_| REGIONAL_STORAGE_CLASS.to_string()),
        };
        match self.client.insert_bucket(&self.project_id, &resource).await {
            Ok(()) => {
                info!(project = %self.project_id, "created bucket");
                Ok(())
            }
            Err(err) if is_owned_by_caller(&err) => {
                let suppressed = StorageError::AlreadyExists {
                    name: self.bucket.to_string(),
                };
                warn!(%suppressed, "bucket exists and is owned by caller");
                Ok(())
            }
            Err(err) => Err(err.for_subject(self.bucket.as_str())),
        }
    }

    #[instrument(skip(self), fields(bucket = %self.bucket))]
    async fn get(&self, key: &ObjectKey, range: ByteRange) -> StorageResult<ObjectReader> {
        self.client
            .download(self.bucket.as_str(), key.as_str(), range.header_value())
            .await
            .map_err(|err| match err.status() {
                Some(http::StatusCode::RANGE_NOT_SATISFIABLE) => {
                    StorageError::RangeNotSatisfiable {
                        key: key.to_string(),
                        range,
                    }
                }
                _ => err.for_subject(key.as_str()),
            })
    }

    #[instrument(skip(self, data), fields(bucket = %self.bucket))]
    async fn put(&self, key: &ObjectKey, data: ObjectReader) -> StorageResult<()> {
        let stored = self
            .client
            .insert(self.bucket.as_str(), key.as_str(), data)
            .await
            .map_err(|err| err.for_subject(self.bucket.as_str()))?;
        debug!(size = stored.size, "stored object");
        Ok(())
    }

    async fn copy(&self, dst: &ObjectKey, src: &ObjectKey) -> StorageResult<()> {
        self.client
            .copy(self.bucket.as_str(), src.as_str(), dst.as_str())
            .await
            .map(|_| ())
            .map_err(|err| err.for_subject(src.as_str()))
    }

    async fn exists(&self, key: &ObjectKey) -> StorageResult<()> {
        self.client
            .get_metadata(self.bucket.as_str(), key.as_str())
            .await
            .map(|_| ())
            .map_err(|err| err.for_subject(key.as_str()))
    }

    #[instrument(skip(self), fields(bucket = %self.bucket))]
    async fn delete(&self, key: &ObjectKey) -> StorageResult<()> {
        self.exists(key).await?;
        self.client
            .delete(self.bucket.as_str(), key.as_str())
            .await
            .map_err(|err| err.for_subject(key.as_str()))
    }

    async fn list_page(
        &self,
        prefix: &str,
        page_token: Option<&str>,
        limit: usize,
    ) -> StorageResult<ObjectPage> {
        let list = self
            .client
            .list_objects(
                self.bucket.as_str(),
                prefix,
                page_token,
                (limit > 0).then_some(limit),
            )
            .await
            .map_err(|err| err.for_subject(self.bucket.as_str()))?;

        let objects = list.items.into_iter().map(Self::to_object).collect();
        Ok(ObjectPage::new(objects, list.next_page_token))
    }

    async fn list(&self, prefix: &str, marker: &str, limit: usize) -> StorageResult<Vec<Object>> {
        self.cursor
            .advance(marker, |token| async move {
                self.list_page(prefix, token.as_deref(), limit).await
            })
            .await
    }
}

impl std::fmt::Display for GcsDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.identity())
    }
}
