//! # File Storage Module
//!
//! S3-compatible object storage: the admin controller used for provisioning,
//! the tenant-scoped executor, and the file/folder operations built on it.

pub mod admin;
pub mod backend;
pub mod errors;
pub mod executor;
pub mod file;
pub mod memory;

pub use admin::{StorageAdminController, READWRITE_POLICY};
pub use backend::{
    AdminClient, ConnectionFactory, ListOptions, ObjectClient, ObjectInfo, ObjectListing,
    ObjectReader, UploadInfo,
};
pub use errors::{ExecutorError, ExecutorResult, StorageError, StorageResult};
pub use executor::ScopedFileOperationExecutor;
pub use file::{FileService, DEFAULT_CONTENT_TYPE, DEFAULT_MAX_UPLOAD_BYTES};
pub use memory::{FaultPoint, MemoryBackend};
