// Infrastructure error types
pub mod error;

// Storage implementations
pub mod apache_object_store_adapter;

// Provider-specific implementations
pub mod gcs;

// Re-export key types
pub use apache_object_store_adapter::ApacheObjectStoreAdapter;
pub use error::StoreError;
pub use gcs::{GcsConfig, GcsDriver};
