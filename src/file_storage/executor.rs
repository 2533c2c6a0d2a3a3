//! # Scoped File Operation Executor
//!
//! Every file operation runs on a fresh connection authenticated with the
//! calling account's own storage credentials. The operation receives that
//! connection and the single bucket name it may use; it never sees the admin
//! identity or any other tenant's bucket.

use std::sync::Arc;

use super::backend::{ConnectionFactory, ObjectClient};
use super::errors::{ExecutorError, ExecutorResult, StorageResult};
use crate::auth::account::CredentialStore;
use crate::observability::Event;

#[derive(Clone)]
pub struct ScopedFileOperationExecutor {
    store: Arc<dyn CredentialStore>,
    connections: Arc<dyn ConnectionFactory>,
}

impl ScopedFileOperationExecutor {
    pub fn new(store: Arc<dyn CredentialStore>, connections: Arc<dyn ConnectionFactory>) -> Self {
        Self { store, connections }
    }

    /// Run `op` against a connection scoped to `account_id`'s bucket
    ///
    /// The connection lives for the duration of the call only.
    pub fn execute<T, F>(&self, account_id: i64, op: F) -> ExecutorResult<T>
    where
        F: FnOnce(&dyn ObjectClient, &str) -> StorageResult<T>,
    {
        let account = account_id.to_string();

        let credential = match self.store.storage_credentials(account_id) {
            Ok(Some(credential)) if credential.is_complete() => credential,
            Ok(_) => {
                Event::CredentialsUnresolved.emit(&[("account_id", &account)]);
                return Err(ExecutorError::CredentialResolution(format!(
                    "account {} has no storage credentials",
                    account_id
                )));
            }
            Err(e) => {
                let reason = e.to_string();
                Event::CredentialsUnresolved
                    .emit(&[("account_id", &account), ("reason", &reason)]);
                return Err(ExecutorError::CredentialResolution(reason));
            }
        };

        let client = self.connections.connect(&credential).map_err(|e| {
            let reason = e.to_string();
            Event::ScopedConnectionFailed.emit(&[
                ("account_id", &account),
                ("bucket", &credential.bucket_name),
                ("reason", &reason),
            ]);
            ExecutorError::StorageConnection(reason)
        })?;

        Event::ScopedConnectionOpened
            .emit(&[("account_id", &account), ("bucket", &credential.bucket_name)]);

        Ok(op(client.as_ref(), &credential.bucket_name)?)
    }
}
