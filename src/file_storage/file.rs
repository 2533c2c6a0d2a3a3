//! # File Operations
//!
//! File and folder operations for one account, each run through the
//! [`ScopedFileOperationExecutor`]. Folders are zero-byte marker objects whose
//! key ends with `/`.

use std::io::Read;

use super::backend::{ListOptions, ObjectInfo, ObjectReader, UploadInfo, DELIMITER};
use super::errors::{ExecutorResult, StorageError, StorageResult};
use super::executor::ScopedFileOperationExecutor;

/// Content type used when the uploader gives none
pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// Default upload bound (100 MiB)
pub const DEFAULT_MAX_UPLOAD_BYTES: u64 = 100 * 1024 * 1024;

/// File service for CRUD operations
#[derive(Clone)]
pub struct FileService {
    executor: ScopedFileOperationExecutor,
    max_upload_bytes: u64,
}

impl FileService {
    pub fn new(executor: ScopedFileOperationExecutor, max_upload_bytes: u64) -> Self {
        Self {
            executor,
            max_upload_bytes,
        }
    }

    pub fn max_upload_bytes(&self) -> u64 {
        self.max_upload_bytes
    }

    /// List files under `prefix`; folder markers are left out
    pub fn list_files(
        &self,
        account_id: i64,
        prefix: &str,
        recursive: bool,
    ) -> ExecutorResult<Vec<ObjectInfo>> {
        let options = ListOptions::new(prefix, recursive);
        self.executor.execute(account_id, |client, bucket| {
            let mut files = Vec::new();
            for object in client.list_objects(bucket, &options) {
                let object = object?;
                if !object.is_folder_marker() {
                    files.push(object);
                }
            }
            Ok(files)
        })
    }

    /// Open a file for reading; the caller owns and closes the reader
    pub fn get_file(&self, account_id: i64, key: &str) -> ExecutorResult<ObjectReader> {
        let key = validate_key(key)?;
        self.executor
            .execute(account_id, |client, bucket| client.get_object(bucket, key))
    }

    pub fn upload_file(
        &self,
        account_id: i64,
        key: &str,
        body: &mut dyn Read,
        size: u64,
        content_type: Option<&str>,
    ) -> ExecutorResult<UploadInfo> {
        let key = validate_key(key)?;
        if size > self.max_upload_bytes {
            return Err(StorageError::FileTooLarge(size, self.max_upload_bytes).into());
        }
        let content_type = content_type
            .filter(|ct| !ct.is_empty())
            .unwrap_or(DEFAULT_CONTENT_TYPE);

        self.executor.execute(account_id, |client, bucket| {
            client.put_object(bucket, key, body, size, content_type)
        })
    }

    /// Remove one file; a missing key is not an error
    pub fn delete_file(&self, account_id: i64, key: &str) -> ExecutorResult<()> {
        let key = validate_key(key)?;
        self.executor
            .execute(account_id, |client, bucket| client.remove_object(bucket, key))
    }

    pub fn create_folder(&self, account_id: i64, name: &str) -> ExecutorResult<()> {
        let marker = folder_marker(name)?;
        self.executor.execute(account_id, |client, bucket| {
            client
                .put_object(bucket, &marker, &mut std::io::empty(), 0, DEFAULT_CONTENT_TYPE)
                .map(|_| ())
        })
    }

    /// Remove a folder, everything under it, then its marker
    ///
    /// Stops at the first failure. Keys removed before it stay removed.
    pub fn delete_folder(&self, account_id: i64, name: &str) -> ExecutorResult<()> {
        let marker = folder_marker(name)?;
        let options = ListOptions::new(marker.as_str(), true);
        self.executor.execute(account_id, |client, bucket| {
            for object in client.list_objects(bucket, &options) {
                client.remove_object(bucket, &object?.key)?;
            }
            client.remove_object(bucket, &marker)
        })
    }

    /// Names of the folders directly under `prefix`
    pub fn list_folders(&self, account_id: i64, prefix: &str) -> ExecutorResult<Vec<String>> {
        let options = ListOptions::new(prefix, false);
        self.executor.execute(account_id, |client, bucket| {
            let mut folders = Vec::new();
            for object in client.list_objects(bucket, &options) {
                let object = object?;
                if !object.is_folder_marker() {
                    continue;
                }
                // The queried folder's own marker reduces to an empty name
                let name = object
                    .key
                    .strip_prefix(prefix)
                    .unwrap_or(object.key.as_str())
                    .trim_matches(DELIMITER);
                if !name.is_empty() {
                    folders.push(name.to_string());
                }
            }
            Ok(folders)
        })
    }
}

fn validate_key(key: &str) -> StorageResult<&str> {
    if key.is_empty() || key.ends_with(DELIMITER) {
        return Err(StorageError::InvalidPath(key.to_string()));
    }
    Ok(key)
}

/// Marker key for a folder: `docs` and `docs/` both become `docs/`
fn folder_marker(name: &str) -> StorageResult<String> {
    let trimmed = name.trim_end_matches(DELIMITER);
    if trimmed.is_empty() {
        return Err(StorageError::InvalidPath(name.to_string()));
    }
    Ok(format!("{}{}", trimmed, DELIMITER))
}
