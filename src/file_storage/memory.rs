//! # In-Memory Object Storage Backend
//!
//! S3/MinIO semantics held in process: principals with attached policies,
//! admin-owned buckets, and objects with etags. Listings are paged lazily the
//! way the real backend pages them. Fault points let tests make any admin or
//! data-plane call fail.

use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};
use std::fmt;
use std::io::{Cursor, Read};
use std::ops::Bound;
use std::sync::{Arc, Mutex, RwLock};

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};

use super::backend::{
    AdminClient, ConnectionFactory, ListOptions, ObjectClient, ObjectInfo, ObjectListing,
    ObjectReader, UploadInfo, DELIMITER,
};
use super::errors::{StorageError, StorageResult};
use crate::auth::account::StorageCredential;
use crate::auth::crypto::constant_time_str_eq;

/// Canned policies the backend knows about
pub const KNOWN_POLICIES: [&str; 3] = ["readwrite", "readonly", "writeonly"];

const DEFAULT_PAGE_SIZE: usize = 1000;

/// Calls that can be made to fail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FaultPoint {
    AddPrincipal,
    AttachPolicy,
    RemovePrincipal,
    MakeBucket,
    Connect,
    ListObjects,
    GetObject,
    PutObject,
    RemoveObject,
}

#[derive(Debug)]
struct Principal {
    secret_key: String,
    policies: BTreeSet<String>,
}

#[derive(Debug, Clone)]
struct StoredObject {
    data: Vec<u8>,
    content_type: String,
    etag: String,
    last_modified: DateTime<Utc>,
}

impl StoredObject {
    fn info(&self, key: &str) -> ObjectInfo {
        ObjectInfo {
            key: key.to_string(),
            size: self.data.len() as u64,
            etag: self.etag.clone(),
            content_type: self.content_type.clone(),
            last_modified: self.last_modified,
        }
    }
}

#[derive(Debug)]
struct BucketEntry {
    owner: String,
    objects: BTreeMap<String, StoredObject>,
}

#[derive(Debug, Default)]
struct BackendState {
    principals: HashMap<String, Principal>,
    buckets: BTreeMap<String, BucketEntry>,
}

/// Shared in-memory backend; clones share state
#[derive(Clone)]
pub struct MemoryBackend {
    admin_identity: String,
    state: Arc<RwLock<BackendState>>,
    faults: Arc<Mutex<HashMap<FaultPoint, u32>>>,
    page_size: usize,
}

impl MemoryBackend {
    pub fn new(admin_identity: impl Into<String>) -> Self {
        Self {
            admin_identity: admin_identity.into(),
            state: Arc::new(RwLock::new(BackendState::default())),
            faults: Arc::new(Mutex::new(HashMap::new())),
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    /// Number of keys fetched per listing page
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Make every call at `point` fail
    pub fn fail_on(&self, point: FaultPoint) {
        self.fail_after(point, 0);
    }

    /// Let `successes` calls at `point` through, then fail the rest
    pub fn fail_after(&self, point: FaultPoint, successes: u32) {
        if let Ok(mut faults) = self.faults.lock() {
            faults.insert(point, successes);
        }
    }

    pub fn clear_faults(&self) {
        if let Ok(mut faults) = self.faults.lock() {
            faults.clear();
        }
    }

    /// Register a bucket owned by another identity
    pub fn seed_foreign_bucket(&self, name: &str, owner: &str) -> StorageResult<()> {
        let mut state = self.write()?;
        state.buckets.insert(
            name.to_string(),
            BucketEntry {
                owner: owner.to_string(),
                objects: BTreeMap::new(),
            },
        );
        Ok(())
    }

    pub fn has_principal(&self, access_key: &str) -> bool {
        self.read()
            .map(|s| s.principals.contains_key(access_key))
            .unwrap_or(false)
    }

    pub fn principal_policies(&self, access_key: &str) -> Vec<String> {
        self.read()
            .ok()
            .and_then(|s| {
                s.principals
                    .get(access_key)
                    .map(|p| p.policies.iter().cloned().collect())
            })
            .unwrap_or_default()
    }

    pub fn bucket_exists(&self, name: &str) -> bool {
        self.read()
            .map(|s| s.buckets.contains_key(name))
            .unwrap_or(false)
    }

    /// All keys in a bucket, sorted
    pub fn object_keys(&self, bucket: &str) -> Vec<String> {
        self.read()
            .ok()
            .and_then(|s| s.buckets.get(bucket).map(|b| b.objects.keys().cloned().collect()))
            .unwrap_or_default()
    }

    fn read(&self) -> StorageResult<std::sync::RwLockReadGuard<'_, BackendState>> {
        self.state
            .read()
            .map_err(|_| StorageError::Unavailable("Lock poisoned".into()))
    }

    fn write(&self) -> StorageResult<std::sync::RwLockWriteGuard<'_, BackendState>> {
        self.state
            .write()
            .map_err(|_| StorageError::Unavailable("Lock poisoned".into()))
    }

    fn check_fault(&self, point: FaultPoint) -> StorageResult<()> {
        let mut faults = self
            .faults
            .lock()
            .map_err(|_| StorageError::Unavailable("Lock poisoned".into()))?;
        match faults.get_mut(&point) {
            Some(0) => Err(StorageError::Unavailable(format!("injected failure at {:?}", point))),
            Some(remaining) => {
                *remaining -= 1;
                Ok(())
            }
            None => Ok(()),
        }
    }
}

impl fmt::Debug for MemoryBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryBackend")
            .field("admin_identity", &self.admin_identity)
            .field("page_size", &self.page_size)
            .finish()
    }
}

/// S3 bucket naming rules: 3-63 chars of `a-z0-9.-`, alphanumeric at both ends
fn validate_bucket_name(name: &str) -> StorageResult<()> {
    let valid_len = (3..=63).contains(&name.len());
    let valid_chars = name
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '.');
    let alnum = |c: Option<char>| c.map_or(false, |c| c.is_ascii_lowercase() || c.is_ascii_digit());
    let valid_ends = alnum(name.chars().next()) && alnum(name.chars().last());

    if valid_len && valid_chars && valid_ends && !name.contains("..") {
        Ok(())
    } else {
        Err(StorageError::InvalidBucketName(name.to_string()))
    }
}

impl AdminClient for MemoryBackend {
    /// Creates the principal, or replaces its secret if it already exists
    fn add_principal(&self, access_key: &str, secret_key: &str) -> StorageResult<()> {
        self.check_fault(FaultPoint::AddPrincipal)?;
        if access_key.is_empty() || secret_key.is_empty() || access_key == self.admin_identity {
            return Err(StorageError::AccessDenied(format!(
                "cannot create principal '{}'",
                access_key
            )));
        }

        let mut state = self.write()?;
        state
            .principals
            .entry(access_key.to_string())
            .and_modify(|p| p.secret_key = secret_key.to_string())
            .or_insert_with(|| Principal {
                secret_key: secret_key.to_string(),
                policies: BTreeSet::new(),
            });
        Ok(())
    }

    fn attach_policy(&self, policies: &[&str], principal: &str) -> StorageResult<()> {
        self.check_fault(FaultPoint::AttachPolicy)?;
        if let Some(unknown) = policies.iter().find(|p| !KNOWN_POLICIES.contains(p)) {
            return Err(StorageError::PolicyNotFound(unknown.to_string()));
        }

        let mut state = self.write()?;
        let entry = state
            .principals
            .get_mut(principal)
            .ok_or_else(|| StorageError::PrincipalNotFound(principal.to_string()))?;
        entry.policies.extend(policies.iter().map(|p| p.to_string()));
        Ok(())
    }

    fn remove_principal(&self, access_key: &str) -> StorageResult<()> {
        self.check_fault(FaultPoint::RemovePrincipal)?;
        let mut state = self.write()?;
        state
            .principals
            .remove(access_key)
            .map(|_| ())
            .ok_or_else(|| StorageError::PrincipalNotFound(access_key.to_string()))
    }

    fn make_bucket(&self, name: &str) -> StorageResult<()> {
        self.check_fault(FaultPoint::MakeBucket)?;
        validate_bucket_name(name)?;

        let mut state = self.write()?;
        if let Some(existing) = state.buckets.get(name) {
            return Err(if existing.owner == self.admin_identity {
                StorageError::BucketAlreadyOwnedByYou(name.to_string())
            } else {
                StorageError::BucketAlreadyExists(name.to_string())
            });
        }
        state.buckets.insert(
            name.to_string(),
            BucketEntry {
                owner: self.admin_identity.clone(),
                objects: BTreeMap::new(),
            },
        );
        Ok(())
    }
}

impl ConnectionFactory for MemoryBackend {
    fn connect(&self, credential: &StorageCredential) -> StorageResult<Box<dyn ObjectClient>> {
        self.check_fault(FaultPoint::Connect)?;
        {
            let state = self.read()?;
            let principal = state
                .principals
                .get(&credential.access_key)
                .ok_or_else(|| StorageError::InvalidAccessKeyId(credential.access_key.clone()))?;
            if !constant_time_str_eq(&principal.secret_key, &credential.secret_key) {
                return Err(StorageError::AccessDenied("signature does not match".into()));
            }
        }

        Ok(Box::new(MemoryConnection {
            principal: credential.access_key.clone(),
            backend: self.clone(),
        }))
    }
}

/// A data-plane connection authenticated as one principal
struct MemoryConnection {
    principal: String,
    backend: MemoryBackend,
}

#[derive(Clone, Copy)]
enum Access {
    Read,
    Write,
}

impl MemoryConnection {
    /// Policies are evaluated per call, so detaching one takes effect immediately
    fn authorize(&self, access: Access) -> StorageResult<()> {
        let state = self.backend.read()?;
        let principal = state
            .principals
            .get(&self.principal)
            .ok_or_else(|| StorageError::InvalidAccessKeyId(self.principal.clone()))?;

        let allowed = principal.policies.iter().any(|p| {
            matches!(
                (p.as_str(), access),
                ("readwrite", _) | ("readonly", Access::Read) | ("writeonly", Access::Write)
            )
        });
        if allowed {
            Ok(())
        } else {
            Err(StorageError::AccessDenied(self.principal.clone()))
        }
    }
}

impl ObjectClient for MemoryConnection {
    fn list_objects(&self, bucket: &str, options: &ListOptions) -> ObjectListing<'_> {
        if let Err(e) = self.authorize(Access::Read) {
            return Box::new(std::iter::once(Err(e)));
        }
        Box::new(MemoryListing {
            backend: self.backend.clone(),
            bucket: bucket.to_string(),
            options: options.clone(),
            after: None,
            last_prefix: None,
            buffer: VecDeque::new(),
            done: false,
        })
    }

    fn get_object(&self, bucket: &str, key: &str) -> StorageResult<ObjectReader> {
        self.backend.check_fault(FaultPoint::GetObject)?;
        self.authorize(Access::Read)?;

        let state = self.backend.read()?;
        let entry = state
            .buckets
            .get(bucket)
            .ok_or_else(|| StorageError::NoSuchBucket(bucket.to_string()))?;
        let object = entry
            .objects
            .get(key)
            .ok_or_else(|| StorageError::NoSuchKey(key.to_string()))?;

        Ok(ObjectReader::new(
            object.info(key),
            Box::new(Cursor::new(object.data.clone())),
        ))
    }

    fn put_object(
        &self,
        bucket: &str,
        key: &str,
        body: &mut dyn Read,
        size: u64,
        content_type: &str,
    ) -> StorageResult<UploadInfo> {
        self.backend.check_fault(FaultPoint::PutObject)?;
        self.authorize(Access::Write)?;
        if key.is_empty() {
            return Err(StorageError::InvalidPath("empty object key".into()));
        }

        let mut data = Vec::new();
        body.take(size)
            .read_to_end(&mut data)
            .map_err(|e| StorageError::Io(e.to_string()))?;
        if data.len() as u64 != size {
            return Err(StorageError::Io(format!(
                "expected {} bytes, received {}",
                size,
                data.len()
            )));
        }

        let etag = format!("{:x}", Sha256::digest(&data));
        let mut state = self.backend.write()?;
        let entry = state
            .buckets
            .get_mut(bucket)
            .ok_or_else(|| StorageError::NoSuchBucket(bucket.to_string()))?;
        entry.objects.insert(
            key.to_string(),
            StoredObject {
                data,
                content_type: content_type.to_string(),
                etag: etag.clone(),
                last_modified: Utc::now(),
            },
        );

        Ok(UploadInfo {
            bucket: bucket.to_string(),
            key: key.to_string(),
            etag,
            size,
        })
    }

    fn remove_object(&self, bucket: &str, key: &str) -> StorageResult<()> {
        self.backend.check_fault(FaultPoint::RemoveObject)?;
        self.authorize(Access::Write)?;

        let mut state = self.backend.write()?;
        let entry = state
            .buckets
            .get_mut(bucket)
            .ok_or_else(|| StorageError::NoSuchBucket(bucket.to_string()))?;
        entry.objects.remove(key);
        Ok(())
    }
}

/// Paged listing; each page re-reads the bucket after the last seen key
struct MemoryListing {
    backend: MemoryBackend,
    bucket: String,
    options: ListOptions,
    after: Option<String>,
    last_prefix: Option<String>,
    buffer: VecDeque<ObjectInfo>,
    done: bool,
}

impl MemoryListing {
    fn fetch_page(&mut self) -> StorageResult<()> {
        self.backend.check_fault(FaultPoint::ListObjects)?;
        let state = self.backend.read()?;
        let entry = state
            .buckets
            .get(&self.bucket)
            .ok_or_else(|| StorageError::NoSuchBucket(self.bucket.clone()))?;

        let prefix = self.options.prefix.as_str();
        let after = self.after.clone();
        let lower = match after.as_deref() {
            Some(after) => Bound::Excluded(after),
            None => Bound::Included(prefix),
        };

        let mut scanned = 0;
        for (key, object) in entry
            .objects
            .range::<str, _>((lower, Bound::Unbounded))
            .take_while(|(k, _)| k.starts_with(prefix))
            .take(self.backend.page_size)
        {
            scanned += 1;
            self.after = Some(key.clone());

            if self.options.recursive {
                self.buffer.push_back(object.info(key));
                continue;
            }

            match key[prefix.len()..].find(DELIMITER) {
                Some(idx) => {
                    let common = &key[..prefix.len() + idx + 1];
                    if self.last_prefix.as_deref() != Some(common) {
                        self.last_prefix = Some(common.to_string());
                        self.buffer.push_back(ObjectInfo {
                            key: common.to_string(),
                            size: 0,
                            etag: String::new(),
                            content_type: String::new(),
                            last_modified: object.last_modified,
                        });
                    }
                }
                None => self.buffer.push_back(object.info(key)),
            }
        }

        if scanned < self.backend.page_size {
            self.done = true;
        }
        Ok(())
    }
}

impl Iterator for MemoryListing {
    type Item = StorageResult<ObjectInfo>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(info) = self.buffer.pop_front() {
                return Some(Ok(info));
            }
            if self.done {
                return None;
            }
            if let Err(e) = self.fetch_page() {
                self.done = true;
                return Some(Err(e));
            }
        }
    }
}
