use std::future::Future;

use futures::{stream, Stream, TryStreamExt};
use tokio::sync::Mutex;
use tracing::debug;

use crate::domain::{
    errors::{StorageError, StorageResult},
    models::{Object, ObjectPage},
};

use super::ObjectStorage;

/// Where a listing sequence stands
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum CursorState {
    /// No listing issued yet, or the last one failed
    #[default]
    Fresh,
    /// A continuation token is held for the next page
    HasMore(String),
    /// The backend reported the last page
    Exhausted,
}

impl CursorState {
    fn after(page: &ObjectPage) -> Self {
        match &page.next_page_token {
            Some(token) => CursorState::HasMore(token.clone()),
            None => CursorState::Exhausted,
        }
    }
}

/// Continuation cursor owned by a driver instance, backing
/// [`ObjectStorage::list`].
///
/// The lock is never held across the native call, so two interleaved listing
/// sequences on one instance see each other's tokens. Use one instance, or a
/// [`Listing`], per concurrent sequence.
#[derive(Debug, Default)]
pub struct PageCursor {
    state: Mutex<CursorState>,
}

impl PageCursor {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn state(&self) -> CursorState {
        self.state.lock().await.clone()
    }

    /// Run one step of the listing protocol.
    ///
    /// `fetch` receives the continuation token to send (`None` for a first
    /// page) and performs the native list call.
    pub async fn advance<F, Fut>(&self, marker: &str, fetch: F) -> StorageResult<Vec<Object>>
    where
        F: FnOnce(Option<String>) -> Fut + Send,
        Fut: Future<Output = StorageResult<ObjectPage>> + Send,
    {
        let token = if marker.is_empty() {
            None
        } else {
            match &*self.state.lock().await {
                CursorState::HasMore(token) => Some(token.clone()),
                state => {
                    debug!(?state, "no continuation token held, listing is over");
                    return Ok(Vec::new());
                }
            }
        };

        match fetch(token).await {
            Ok(page) => {
                let next = CursorState::after(&page);
                debug!(objects = page.objects.len(), next = ?next, "listed page");
                *self.state.lock().await = next;
                Ok(page.objects)
            }
            Err(err) => {
                *self.state.lock().await = CursorState::Fresh;
                Err(err)
            }
        }
    }
}

/// A listing sequence with its own cursor, independent of the driver
/// instance it reads from. Any number of these can run concurrently against
/// one driver.
pub struct Listing<'a> {
    storage: &'a dyn ObjectStorage,
    prefix: String,
    page_size: usize,
    state: CursorState,
}

impl<'a> Listing<'a> {
    pub fn new(storage: &'a dyn ObjectStorage, prefix: impl Into<String>, page_size: usize) -> Self {
        Self {
            storage,
            prefix: prefix.into(),
            page_size,
            state: CursorState::Fresh,
        }
    }

    pub fn state(&self) -> &CursorState {
        &self.state
    }

    /// Fetch the next page; `Ok(None)` once the listing is exhausted.
    /// After an error the next call starts over from the first page.
    pub async fn next_page(&mut self) -> StorageResult<Option<Vec<Object>>> {
        let token = match &self.state {
            CursorState::Fresh => None,
            CursorState::HasMore(token) => Some(token.clone()),
            CursorState::Exhausted => return Ok(None),
        };

        match self
            .storage
            .list_page(&self.prefix, token.as_deref(), self.page_size)
            .await
        {
            Ok(page) => {
                self.state = CursorState::after(&page);
                Ok(Some(page.objects))
            }
            Err(err) => {
                self.state = CursorState::Fresh;
                Err(err)
            }
        }
    }

    /// Drain every remaining page
    pub async fn collect_all(mut self) -> StorageResult<Vec<Object>> {
        let mut objects = Vec::new();
        while let Some(page) = self.next_page().await? {
            objects.extend(page);
        }
        Ok(objects)
    }

    /// Flatten the remaining pages into a stream of objects
    pub fn into_stream(self) -> impl Stream<Item = StorageResult<Object>> + Send + 'a {
        stream::try_unfold(self, |mut listing| async move {
            let page = listing.next_page().await?;
            Ok::<_, StorageError>(page.map(|objects| {
                let items = stream::iter(objects.into_iter().map(Ok::<Object, StorageError>));
                (items, listing)
            }))
        })
        .try_flatten()
    }
}

impl dyn ObjectStorage {
    /// Start an independent listing of `prefix`, `page_size` objects per page
    pub fn start_listing(&self, prefix: &str, page_size: usize) -> Listing<'_> {
        Listing::new(self, prefix, page_size)
    }
}
