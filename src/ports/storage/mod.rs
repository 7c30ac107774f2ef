mod object_storage;
mod pagination;

pub use object_storage::{ObjectReader, ObjectStorage};
pub use pagination::{CursorState, Listing, PageCursor};
