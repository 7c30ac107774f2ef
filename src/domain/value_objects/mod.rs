mod bucket_name;
mod byte_range;
mod object_key;

pub use bucket_name::BucketName;
pub use byte_range::ByteRange;
pub use object_key::ObjectKey;
