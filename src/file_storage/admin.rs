//! Administrative access to the object-storage backend
//!
//! Used by the provisioning saga for principals, policies, and buckets, and by
//! the executor to build tenant-scoped connections.

use std::sync::Arc;

use super::backend::{AdminClient, ConnectionFactory, ObjectClient};
use super::errors::{StorageError, StorageResult};
use crate::auth::account::StorageCredential;

/// Policy granting full access to a tenant's own bucket
pub const READWRITE_POLICY: &str = "readwrite";

#[derive(Clone)]
pub struct StorageAdminController {
    admin: Arc<dyn AdminClient>,
    connections: Arc<dyn ConnectionFactory>,
}

impl StorageAdminController {
    pub fn new(admin: Arc<dyn AdminClient>, connections: Arc<dyn ConnectionFactory>) -> Self {
        Self { admin, connections }
    }

    pub fn create_principal(&self, access_key: &str, secret_key: &str) -> StorageResult<()> {
        self.admin.add_principal(access_key, secret_key)
    }

    pub fn attach_policy(&self, policies: &[&str], principal: &str) -> StorageResult<()> {
        self.admin.attach_policy(policies, principal)
    }

    pub fn remove_principal(&self, access_key: &str) -> StorageResult<()> {
        self.admin.remove_principal(access_key)
    }

    /// Create a bucket; a bucket we already own counts as created
    pub fn create_bucket(&self, name: &str) -> StorageResult<()> {
        match self.admin.make_bucket(name) {
            Ok(()) | Err(StorageError::BucketAlreadyOwnedByYou(_)) => Ok(()),
            Err(e) => Err(e),
        }
    }

    /// Open a data-plane connection as the given tenant
    pub fn connect(&self, credential: &StorageCredential) -> StorageResult<Box<dyn ObjectClient>> {
        self.connections.connect(credential)
    }
}

/// The executor connects through the controller, never around it
impl ConnectionFactory for StorageAdminController {
    fn connect(&self, credential: &StorageCredential) -> StorageResult<Box<dyn ObjectClient>> {
        StorageAdminController::connect(self, credential)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::file_storage::memory::{FaultPoint, MemoryBackend};

    fn controller() -> (StorageAdminController, MemoryBackend) {
        let backend = MemoryBackend::new("minioadmin");
        let controller =
            StorageAdminController::new(Arc::new(backend.clone()), Arc::new(backend.clone()));
        (controller, backend)
    }

    #[test]
    fn test_create_bucket_is_idempotent() {
        let (controller, backend) = controller();
        controller.create_bucket("user-alice").unwrap();
        controller.create_bucket("user-alice").unwrap();
        assert!(backend.bucket_exists("user-alice"));
    }

    #[test]
    fn test_create_bucket_surfaces_other_failures() {
        let (controller, backend) = controller();
        backend.fail_on(FaultPoint::MakeBucket);
        assert!(matches!(
            controller.create_bucket("user-alice"),
            Err(StorageError::Unavailable(_))
        ));

        backend.clear_faults();
        assert!(matches!(
            controller.create_bucket("No"),
            Err(StorageError::InvalidBucketName(_))
        ));
    }

    #[test]
    fn test_principal_lifecycle() {
        let (controller, backend) = controller();
        controller.create_principal("user-alice", "secret").unwrap();
        controller.attach_policy(&[READWRITE_POLICY], "user-alice").unwrap();
        assert_eq!(backend.principal_policies("user-alice"), vec!["readwrite"]);

        controller.remove_principal("user-alice").unwrap();
        assert!(!backend.has_principal("user-alice"));
    }

    #[test]
    fn test_connect_as_tenant() {
        let (controller, _) = controller();
        controller.create_principal("user-alice", "secret").unwrap();
        controller.attach_policy(&[READWRITE_POLICY], "user-alice").unwrap();
        controller.create_bucket("user-alice").unwrap();

        let credential = StorageCredential {
            bucket_name: "user-alice".into(),
            access_key: "user-alice".into(),
            secret_key: "secret".into(),
        };
        let factory: &dyn ConnectionFactory = &controller;
        let client = factory.connect(&credential).unwrap();
        client
            .put_object("user-alice", "a.txt", &mut &b"hi"[..], 2, "text/plain")
            .unwrap();

        let wrong = StorageCredential {
            secret_key: "guess".into(),
            ..credential
        };
        assert!(matches!(
            controller.connect(&wrong),
            Err(StorageError::AccessDenied(_))
        ));
    }
}
