use crate::domain::errors::StorageError;
use std::io;
use thiserror::Error as ThisError;

/// Failures raised by the native clients before they are normalized into
/// [`StorageError`].
#[derive(ThisError, Debug)]
pub enum StoreError {
    #[error("Object store error: {0}")]
    ObjectStore(#[from] object_store::Error),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Request error: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("HTTP error: {status} - {message}")]
    Http {
        status: http::StatusCode,
        message: String,
    },

    #[error("{0}")]
    Other(String),
}

impl StoreError {
    pub fn status(&self) -> Option<http::StatusCode> {
        match self {
            StoreError::Http { status, .. } => Some(*status),
            StoreError::Request(err) => err.status(),
            _ => None,
        }
    }

    /// Normalize into a domain error; `subject` names the key or bucket the
    /// call was about and is reported on a miss.
    pub fn for_subject(self, subject: &str) -> StorageError {
        match self {
            StoreError::ObjectStore(object_store::Error::NotFound { .. }) => {
                StorageError::not_found(subject)
            }
            StoreError::ObjectStore(object_store::Error::AlreadyExists { .. }) => {
                StorageError::AlreadyExists {
                    name: subject.to_string(),
                }
            }
            StoreError::Io(err) if err.kind() == io::ErrorKind::NotFound => {
                StorageError::not_found(subject)
            }
            err if err.status() == Some(http::StatusCode::NOT_FOUND) => {
                StorageError::not_found(subject)
            }
            err => err.into(),
        }
    }
}

/// Convert infrastructure StoreError to domain StorageError, keeping the
/// backend-provided detail.
impl From<StoreError> for StorageError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::ObjectStore(object_store::Error::NotFound { path, .. }) => {
                StorageError::NotFound { key: path }
            }
            StoreError::ObjectStore(object_store::Error::AlreadyExists { path, .. }) => {
                StorageError::AlreadyExists { name: path }
            }
            StoreError::ObjectStore(object_err) => StorageError::Transport {
                message: format!("Object store operation failed: {}", object_err),
                status: None,
                source: Some(format!("{:?}", object_err)),
            },
            StoreError::Http { status, message } => StorageError::Transport {
                message,
                status: Some(status.as_u16()),
                source: Some(status.to_string()),
            },
            StoreError::Request(req_err) => StorageError::Transport {
                message: format!("Request failed: {}", req_err),
                status: req_err.status().map(|s| s.as_u16()),
                source: Some(format!("{:?}", req_err)),
            },
            StoreError::Serialization(serde_err) => StorageError::Transport {
                message: format!("Malformed backend response: {}", serde_err),
                status: None,
                source: Some(serde_err.to_string()),
            },
            StoreError::Io(io_err) => StorageError::Transport {
                message: format!("IO operation failed: {}", io_err),
                status: None,
                source: Some(format!("{:?}", io_err.kind())),
            },
            StoreError::Other(message) => StorageError::transport(message),
        }
    }
}

impl From<object_store::Error> for StorageError {
    fn from(err: object_store::Error) -> Self {
        StoreError::from(err).into()
    }
}

impl From<io::Error> for StorageError {
    fn from(err: io::Error) -> Self {
        StoreError::from(err).into()
    }
}

impl From<reqwest::Error> for StorageError {
    fn from(err: reqwest::Error) -> Self {
        StoreError::from(err).into()
    }
}

impl From<url::ParseError> for StorageError {
    fn from(err: url::ParseError) -> Self {
        StorageError::configuration(format!("Invalid endpoint: {}", err))
    }
}
