//! # Object-Storage Backend Traits
//!
//! The admin plane (principals, policies, buckets) and the data plane
//! (objects) are separate traits. Data-plane clients are only ever obtained
//! through a [`ConnectionFactory`] from one tenant's credentials.

use std::fmt;
use std::io::Read;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::errors::StorageResult;
use crate::auth::account::StorageCredential;

/// Key delimiter used for folder semantics
pub const DELIMITER: char = '/';

/// Metadata of one listed or fetched object
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ObjectInfo {
    pub key: String,
    pub size: u64,
    pub etag: String,
    pub content_type: String,
    pub last_modified: DateTime<Utc>,
}

impl ObjectInfo {
    /// Zero-byte, delimiter-terminated keys stand for folders
    pub fn is_folder_marker(&self) -> bool {
        self.size == 0 && self.key.ends_with(DELIMITER)
    }
}

/// Listing parameters
#[derive(Debug, Clone, Default)]
pub struct ListOptions {
    pub prefix: String,
    /// When false, keys below the next delimiter collapse into one
    /// zero-byte `prefix/` entry
    pub recursive: bool,
}

impl ListOptions {
    pub fn new(prefix: impl Into<String>, recursive: bool) -> Self {
        Self {
            prefix: prefix.into(),
            recursive,
        }
    }
}

/// Lazy, finite listing; drain it before the connection is dropped
pub type ObjectListing<'a> = Box<dyn Iterator<Item = StorageResult<ObjectInfo>> + Send + 'a>;

/// Streamed object body plus its metadata
///
/// The consumer decides how much to read and drops it when done.
pub struct ObjectReader {
    pub info: ObjectInfo,
    body: Box<dyn Read + Send>,
}

impl ObjectReader {
    pub fn new(info: ObjectInfo, body: Box<dyn Read + Send>) -> Self {
        Self { info, body }
    }

    pub fn size(&self) -> u64 {
        self.info.size
    }

    pub fn content_type(&self) -> &str {
        &self.info.content_type
    }
}

impl Read for ObjectReader {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.body.read(buf)
    }
}

impl fmt::Debug for ObjectReader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectReader").field("info", &self.info).finish()
    }
}

/// Result of a completed upload
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UploadInfo {
    pub bucket: String,
    pub key: String,
    pub etag: String,
    pub size: u64,
}

/// Tenant data-plane operations
pub trait ObjectClient: Send + Sync {
    fn list_objects(&self, bucket: &str, options: &ListOptions) -> ObjectListing<'_>;

    fn get_object(&self, bucket: &str, key: &str) -> StorageResult<ObjectReader>;

    /// Store exactly `size` bytes read from `body`
    fn put_object(
        &self,
        bucket: &str,
        key: &str,
        body: &mut dyn Read,
        size: u64,
        content_type: &str,
    ) -> StorageResult<UploadInfo>;

    /// Removing a missing key is not an error
    fn remove_object(&self, bucket: &str, key: &str) -> StorageResult<()>;
}

/// Administrative operations, performed as the backend's admin identity
pub trait AdminClient: Send + Sync {
    fn add_principal(&self, access_key: &str, secret_key: &str) -> StorageResult<()>;

    fn attach_policy(&self, policies: &[&str], principal: &str) -> StorageResult<()>;

    fn remove_principal(&self, access_key: &str) -> StorageResult<()>;

    fn make_bucket(&self, name: &str) -> StorageResult<()>;
}

/// Builds data-plane clients authenticated as one tenant
pub trait ConnectionFactory: Send + Sync {
    fn connect(&self, credential: &StorageCredential) -> StorageResult<Box<dyn ObjectClient>>;
}
