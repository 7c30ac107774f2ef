pub mod storage;

// Re-export the driver contract for convenience
pub use storage::{CursorState, Listing, ObjectReader, ObjectStorage, PageCursor};
