use async_trait::async_trait;
use futures::{StreamExt, TryStreamExt};
use object_store::{
    buffered::BufWriter,
    local::LocalFileSystem,
    memory::InMemory,
    path::{Path as ObjectPath, PathPart},
    GetOptions, GetRange, ObjectMeta, ObjectStore as ApacheObjectStore,
};
use std::{path::PathBuf, sync::Arc};
use tokio::io::AsyncWriteExt;
use tokio_util::io::StreamReader;
use tracing::{debug, instrument};

use super::error::StoreError;
use crate::{
    domain::{
        errors::{StorageError, StorageResult},
        models::{Object, ObjectPage},
        value_objects::{ByteRange, ObjectKey},
    },
    ports::storage::{ObjectReader, ObjectStorage, PageCursor},
};

/// Page size used when a caller passes a limit of 0
const DEFAULT_PAGE_SIZE: usize = 1000;

/// What backs the container
#[derive(Debug, Clone)]
enum Container {
    /// Process-local memory, exists as long as the adapter
    Memory { name: String },
    /// Directory tree on the local disk
    Directory { root: PathBuf },
}

/// Driver that implements the storage contract on top of an Apache
/// `object_store` backend (`mem://` and `file://`).
///
/// `object_store` has no page tokens, so the continuation token handed out by
/// `list_page` is the stored (percent-encoded) location of the last key of the
/// previous page. Pages follow location order.
pub struct ApacheObjectStoreAdapter {
    inner: Arc<dyn ApacheObjectStore>,
    container: Container,
    /// Location of the container inside `inner`
    root: ObjectPath,
    cursor: PageCursor,
}

impl ApacheObjectStoreAdapter {
    /// Ephemeral in-memory container
    pub fn memory(name: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(InMemory::new()),
            container: Container::Memory { name: name.into() },
            root: ObjectPath::default(),
            cursor: PageCursor::new(),
        }
    }

    /// Container rooted at an absolute directory on the local disk
    pub fn local(root: impl Into<PathBuf>) -> StorageResult<Self> {
        let root = root.into();
        if !root.is_absolute() {
            return Err(StorageError::configuration(format!(
                "local storage root must be absolute: {}",
                root.display()
            )));
        }
        let prefix = ObjectPath::from(root.to_string_lossy().as_ref());

        Ok(Self {
            inner: Arc::new(LocalFileSystem::new()),
            container: Container::Directory { root },
            root: prefix,
            cursor: PageCursor::new(),
        })
    }

    /// Location of `key`. Empty segments would collapse into their
    /// neighbours, so such keys are refused.
    fn object_path(&self, key: &ObjectKey) -> StorageResult<ObjectPath> {
        key.require_nonempty_segments()?;
        Ok(self.location(key.as_str()))
    }

    /// `PathPart` percent-encodes each segment; empty segments are dropped
    fn location(&self, key: &str) -> ObjectPath {
        ObjectPath::from_iter(self.root.parts().chain(key.split('/').map(PathPart::from)))
    }

    /// Location a page resumes after, from a token handed out earlier
    fn resume_after(&self, token: &str) -> StorageResult<ObjectPath> {
        let raw = if self.root.parts().next().is_none() {
            token.to_string()
        } else {
            format!("{}/{}", self.root, token)
        };
        ObjectPath::parse(raw).map_err(|e| StorageError::from(object_store::Error::from(e)))
    }

    /// Path of `location` below the container root, as stored and decoded
    fn relative_key(&self, location: &ObjectPath) -> Option<(String, String)> {
        let parts: Vec<PathPart<'_>> = location.prefix_match(&self.root)?.collect();
        let stored = parts
            .iter()
            .map(|part| part.as_ref())
            .collect::<Vec<&str>>()
            .join("/");
        let key = parts
            .iter()
            .map(|part| match urlencoding::decode(part.as_ref()) {
                Ok(decoded) => decoded.into_owned(),
                Err(_) => part.as_ref().to_string(),
            })
            .collect::<Vec<_>>()
            .join("/");
        Some((stored, key))
    }

    async fn head(&self, key: &ObjectKey) -> StorageResult<ObjectMeta> {
        self.inner
            .head(&self.object_path(key)?)
            .await
            .map_err(|e| StoreError::from(e).for_subject(key.as_str()))
    }
}

#[async_trait]
impl ObjectStorage for ApacheObjectStoreAdapter {
    fn identity(&self) -> String {
        match &self.container {
            Container::Memory { name } => format!("mem://{}", name),
            Container::Directory { root } => format!("file://{}", root.display()),
        }
    }

    async fn create(&self) -> StorageResult<()> {
        match &self.container {
            Container::Memory { .. } => Ok(()),
            Container::Directory { root } => {
                tokio::fs::create_dir_all(root).await?;
                Ok(())
            }
        }
    }

    #[instrument(skip(self), fields(store = %self.identity()))]
    async fn get(&self, key: &ObjectKey, range: ByteRange) -> StorageResult<ObjectReader> {
        let meta = self.head(key).await?;
        let span = range
            .resolve(meta.size)
            .ok_or_else(|| StorageError::RangeNotSatisfiable {
                key: key.to_string(),
                range,
            })?;

        let options = GetOptions {
            range: (!range.is_full()).then_some(GetRange::Bounded(span)),
            ..Default::default()
        };
        let result = self
            .inner
            .get_opts(&meta.location, options)
            .await
            .map_err(|e| StoreError::from(e).for_subject(key.as_str()))?;

        let stream = result
            .into_stream()
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e));
        Ok(Box::new(StreamReader::new(stream)))
    }

    #[instrument(skip(self, data), fields(store = %self.identity()))]
    async fn put(&self, key: &ObjectKey, mut data: ObjectReader) -> StorageResult<()> {
        let path = self.object_path(key)?;
        let mut writer = BufWriter::new(self.inner.clone(), path);

        let written = match tokio::io::copy(&mut data, &mut writer).await {
            Ok(n) => n,
            Err(err) => {
                // Nothing becomes visible when the upload is aborted
                if let Err(abort_err) = writer.abort().await {
                    debug!(error = %abort_err, "failed to abort upload");
                }
                return Err(err.into());
            }
        };
        writer.shutdown().await?;
        debug!(bytes = written, "stored object");
        Ok(())
    }

    async fn copy(&self, dst: &ObjectKey, src: &ObjectKey) -> StorageResult<()> {
        self.inner
            .copy(&self.object_path(src)?, &self.object_path(dst)?)
            .await
            .map_err(|e| StoreError::from(e).for_subject(src.as_str()))
    }

    async fn exists(&self, key: &ObjectKey) -> StorageResult<()> {
        self.head(key).await.map(|_| ())
    }

    #[instrument(skip(self), fields(store = %self.identity()))]
    async fn delete(&self, key: &ObjectKey) -> StorageResult<()> {
        // Most object_store backends report success for a missing path
        self.exists(key).await?;
        self.inner
            .delete(&self.object_path(key)?)
            .await
            .map_err(|e| StoreError::from(e).for_subject(key.as_str()))
    }

    async fn list_page(
        &self,
        prefix: &str,
        page_token: Option<&str>,
        limit: usize,
    ) -> StorageResult<ObjectPage> {
        let limit = if limit == 0 { DEFAULT_PAGE_SIZE } else { limit };

        // object_store prefixes match whole path segments, so list the
        // enclosing directory and filter on the string prefix here.
        let dir = match prefix.rfind('/') {
            Some(idx) => self.location(&prefix[..idx]),
            None => self.root.clone(),
        };
        let offset = page_token.map(|token| self.resume_after(token)).transpose()?;
        let mut listing = match &offset {
            Some(offset) => self.inner.list_with_offset(Some(&dir), offset),
            None => self.inner.list(Some(&dir)),
        };
        // In-memory listings come back in location order, directory walks do not
        let ordered = matches!(self.container, Container::Memory { .. });

        let mut entries: Vec<(String, Object)> = Vec::new();
        while let Some(meta) = listing.next().await {
            let meta = meta.map_err(StoreError::from)?;
            let Some((stored, key)) = self.relative_key(&meta.location) else {
                continue;
            };
            if !key.starts_with(prefix) {
                continue;
            }
            entries.push((stored, Object::with_modified(key, meta.size, meta.last_modified)));
            if ordered && entries.len() > limit {
                break;
            }
        }

        if !ordered {
            entries.sort_by(|a, b| a.0.cmp(&b.0));
        }
        let next_page_token = if entries.len() > limit {
            entries.truncate(limit);
            entries.last().map(|(stored, _)| stored.clone())
        } else {
            None
        };
        let objects = entries.into_iter().map(|(_, object)| object).collect();
        Ok(ObjectPage::new(objects, next_page_token))
    }

    async fn list(&self, prefix: &str, marker: &str, limit: usize) -> StorageResult<Vec<Object>> {
        self.cursor
            .advance(marker, |token| async move {
                self.list_page(prefix, token.as_deref(), limit).await
            })
            .await
    }
}

impl std::fmt::Display for ApacheObjectStoreAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.identity())
    }
}
