//! Storage backends and path conventions for stored media objects.
//!
//! Keys follow the owner-directory convention: originals live at
//! `{owner_dir}/{filename}`, derived variants at `{owner_dir}/{size}/{filename}`.
//! Variant lookup is a pure path join; no database lookup is required.

pub mod factory;
#[cfg(feature = "storage-local")]
pub mod local;
pub mod paths;
#[cfg(feature = "storage-s3")]
pub mod s3;
pub mod traits;

pub use factory::create_storage;
#[cfg(feature = "storage-local")]
pub use local::LocalStorage;
#[cfg(feature = "storage-s3")]
pub use s3::S3Storage;
pub use traits::{Storage, StorageError, StorageResult};
