pub mod adapters;
pub mod app;
pub mod domain;
pub mod ports;
pub mod services;

// Re-export key types for convenience

// Domain types - records, value objects and errors
pub use domain::{
    BucketName, ByteRange, DomainValidationError, Object, ObjectKey, ObjectPage, StorageError,
    StorageResult,
};

// Port types - the driver contract
pub use ports::{CursorState, Listing, ObjectReader, ObjectStorage, PageCursor};

// Driver registry
pub use services::{DriverConstructor, DriverRegistry};

// Application configuration
pub use app::{open_storage, open_storage_from_env, AppError, StorageConfig};

// Adapter types - backend drivers
pub use adapters::outbound::storage::{ApacheObjectStoreAdapter, GcsConfig, GcsDriver};

// Public facade for easy construction
pub mod prelude {
    pub use crate::{
        ByteRange, DriverRegistry, Listing, Object, ObjectKey, ObjectReader, ObjectStorage,
        StorageConfig, StorageError, StorageResult,
    };
}
