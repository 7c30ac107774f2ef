use async_trait::async_trait;
use tokio::io::AsyncRead;

use crate::domain::{
    errors::StorageResult,
    models::{Object, ObjectPage},
    value_objects::{ByteRange, ObjectKey},
};

/// Readable byte stream handed out by `get` and consumed by `put`.
/// Dropping it closes the underlying connection or file.
pub type ObjectReader = Box<dyn AsyncRead + Send + Unpin>;

/// Port every storage backend implements.
///
/// One instance is bound to one container. All operations except `list` are
/// stateless and may be called concurrently; `list` advances a cursor private
/// to the instance, see [`PageCursor`](super::PageCursor).
#[async_trait]
pub trait ObjectStorage: Send + Sync + 'static {
    /// Canonical `scheme://container` identity
    fn identity(&self) -> String;

    /// Make sure the container exists. Succeeds if it already does.
    async fn create(&self) -> StorageResult<()>;

    /// Read `range` of the object named `key`
    async fn get(&self, key: &ObjectKey, range: ByteRange) -> StorageResult<ObjectReader>;

    /// Store `data` under `key`, replacing any previous object
    async fn put(&self, key: &ObjectKey, data: ObjectReader) -> StorageResult<()>;

    /// Copy `src` to `dst` inside the container.
    ///
    /// Falls back to streaming the source through `get` and `put`; drivers
    /// with a server-side copy override this.
    async fn copy(&self, dst: &ObjectKey, src: &ObjectKey) -> StorageResult<()> {
        let reader = self.get(src, ByteRange::full()).await?;
        self.put(dst, reader).await
    }

    /// `Ok` if `key` is present, `NotFound` otherwise
    async fn exists(&self, key: &ObjectKey) -> StorageResult<()> {
        self.get(key, ByteRange::full()).await.map(|_| ())
    }

    /// Remove `key`. A missing key yields `NotFound`.
    async fn delete(&self, key: &ObjectKey) -> StorageResult<()>;

    /// Fetch a single page from the backend without touching any cursor
    async fn list_page(
        &self,
        prefix: &str,
        page_token: Option<&str>,
        limit: usize,
    ) -> StorageResult<ObjectPage>;

    /// List objects under `prefix`.
    ///
    /// An empty `marker` starts a new listing; any other value continues the
    /// listing this instance issued last and returns an empty page once it is
    /// exhausted.
    async fn list(&self, prefix: &str, marker: &str, limit: usize) -> StorageResult<Vec<Object>>;
}
