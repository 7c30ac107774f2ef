use crate::domain::{errors::ValidationError, value_objects::ByteRange};

/// Errors that can occur during storage operations.
///
/// Every driver normalizes its native failures into one of these kinds, so
/// callers can branch on the kind without knowing which backend is behind a
/// URI.
#[derive(Debug, Clone, PartialEq)]
pub enum StorageError {
    /// Object or container not found
    NotFound { key: String },

    /// Container already exists and is owned by the caller.
    /// `create` suppresses this kind; it never reaches a caller from there.
    AlreadyExists { name: String },

    /// Requested byte range starts past the end of the object
    RangeNotSatisfiable { key: String, range: ByteRange },

    /// No driver registered for the URI scheme
    UnsupportedScheme { scheme: String },

    /// Malformed endpoint or unusable credentials, detected at construction
    Configuration { message: String },

    /// Key or bucket name rejected before any native call was made
    Validation { message: String },

    /// Network or backend-internal failure
    Transport {
        message: String,
        status: Option<u16>,
        source: Option<String>, // Store error as string to allow Clone
    },
}

impl StorageError {
    pub fn not_found(key: impl Into<String>) -> Self {
        StorageError::NotFound { key: key.into() }
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        StorageError::Configuration {
            message: message.into(),
        }
    }

    pub fn transport(message: impl Into<String>) -> Self {
        StorageError::Transport {
            message: message.into(),
            status: None,
            source: None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, StorageError::NotFound { .. })
    }
}

impl std::fmt::Display for StorageError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageError::NotFound { key } => {
                write!(f, "Not found: {}", key)
            }
            StorageError::AlreadyExists { name } => {
                write!(f, "Already exists: {}", name)
            }
            StorageError::RangeNotSatisfiable { key, range } => {
                write!(f, "Range {} not satisfiable for object: {}", range, key)
            }
            StorageError::UnsupportedScheme { scheme } => {
                write!(f, "Unsupported storage scheme: {}", scheme)
            }
            StorageError::Configuration { message } => {
                write!(f, "Configuration error: {}", message)
            }
            StorageError::Validation { message } => {
                write!(f, "Validation error: {}", message)
            }
            StorageError::Transport {
                message, status, ..
            } => match status {
                Some(status) => write!(f, "Transport error (status {}): {}", status, message),
                None => write!(f, "Transport error: {}", message),
            },
        }
    }
}

impl std::error::Error for StorageError {}

impl From<ValidationError> for StorageError {
    fn from(err: ValidationError) -> Self {
        StorageError::Validation {
            message: err.to_string(),
        }
    }
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;
