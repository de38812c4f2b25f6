pub mod error;
#[cfg(test)]
pub mod fake;
pub mod real_s3;
pub mod storage;

pub use error::StorageError;
#[cfg(test)]
pub use fake::FakeStorage;
pub use real_s3::S3Storage;
pub use storage::{BucketObject, Storage};
