use chrono::{DateTime, Utc};

/// One stored blob as reported by a listing.
///
/// Objects are snapshots: a fresh listing replaces them, nothing mutates them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Object {
    pub key: String,
    pub size: u64,
    /// Creation time, seconds since the epoch
    pub ctime: i64,
    /// Modification time, seconds since the epoch
    pub mtime: i64,
}

impl Object {
    pub fn new(key: impl Into<String>, size: u64, ctime: i64, mtime: i64) -> Self {
        Self {
            key: key.into(),
            size,
            ctime,
            mtime,
        }
    }

    /// Build an object from RFC 3339 timestamps; unparsable values become 0.
    pub fn from_rfc3339(
        key: impl Into<String>,
        size: u64,
        created: Option<&str>,
        updated: Option<&str>,
    ) -> Self {
        Self::new(key, size, parse_timestamp(created), parse_timestamp(updated))
    }

    /// Build an object for backends that only track one timestamp.
    pub fn with_modified(key: impl Into<String>, size: u64, modified: DateTime<Utc>) -> Self {
        let secs = modified.timestamp();
        Self::new(key, size, secs, secs)
    }
}

fn parse_timestamp(value: Option<&str>) -> i64 {
    value
        .and_then(|v| DateTime::parse_from_rfc3339(v).ok())
        .map(|t| t.timestamp())
        .unwrap_or(0)
}

/// One page of a native listing call
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObjectPage {
    pub objects: Vec<Object>,
    /// Continuation token for the next page, `None` on the last page
    pub next_page_token: Option<String>,
}

impl ObjectPage {
    pub fn new(objects: Vec<Object>, next_page_token: Option<String>) -> Self {
        Self {
            objects,
            // Backends signal the last page with an empty token as often as with none
            next_page_token: next_page_token.filter(|t| !t.is_empty()),
        }
    }

    pub fn is_last(&self) -> bool {
        self.next_page_token.is_none()
    }
}
