//! # Provisioning Saga
//!
//! Registration spans the credential store and the storage backend, which
//! share no transaction. Forward steps run in order:
//!
//! 1. Hash the password
//! 2. Derive bucket and access key (`user-<username>`)
//! 3. Generate a random secret key
//! 4. Insert the account row with all storage fields set
//! 5. Create the storage principal
//! 6. Attach the read-write policy
//! 7. Create the bucket (already owned by us counts as success)
//! 8. Write the credential triple onto the row again
//! 9. Re-read the row and issue a token pair
//!
//! A failure in 5-7 undoes the completed steps in reverse order. Undo actions
//! are best effort: their failures are logged and never replace the error that
//! triggered them. A failure in 8 deletes the row only; the principal and bucket
//! stay live and are reported for reconciliation.

use std::sync::Arc;

use super::errors::{ProvisioningError, ProvisioningResult};
use crate::auth::account::{Account, CredentialStore, NewAccount, StorageCredential};
use crate::auth::crypto::{generate_secret_key, hash_password, SECRET_KEY_BYTES};
use crate::auth::errors::AuthError;
use crate::auth::jwt::{TokenPair, TokenService};
use crate::file_storage::admin::{StorageAdminController, READWRITE_POLICY};
use crate::file_storage::errors::StorageError;
use crate::observability::{Event, ObservationScope};

/// Prefix shared by derived bucket names and access keys
pub const TENANT_PREFIX: &str = "user-";

/// Forward steps that have completed and would need undoing
#[derive(Debug, Default)]
struct Completed {
    account_id: Option<i64>,
    principal: Option<String>,
}

impl Completed {
    /// Run compensations for completed steps, newest first
    fn compensate(&self, saga: &ProvisioningSaga, step: &str) {
        if let Some(access_key) = &self.principal {
            let result = saga.admin.remove_principal(access_key);
            report("remove_principal", step, result.map_err(|e| e.to_string()));
        }
        if let Some(id) = self.account_id {
            let result = saga.store.delete_account(id);
            report("delete_account", step, result.map_err(|e| e.to_string()));
        }
    }
}

fn report(action: &str, step: &str, result: Result<(), String>) {
    match result {
        Ok(()) => Event::CompensationRan.emit(&[("action", action), ("failed_step", step)]),
        Err(reason) => Event::CompensationFailed.emit(&[
            ("action", action),
            ("failed_step", step),
            ("reason", &reason),
        ]),
    }
}

/// Bucket name and access key derived from a username
pub fn tenant_identity(username: &str) -> String {
    format!("{}{}", TENANT_PREFIX, username)
}

/// Registers accounts and provisions their storage
#[derive(Clone)]
pub struct ProvisioningSaga {
    store: Arc<dyn CredentialStore>,
    admin: StorageAdminController,
    tokens: TokenService,
}

impl ProvisioningSaga {
    pub fn new(
        store: Arc<dyn CredentialStore>,
        admin: StorageAdminController,
        tokens: TokenService,
    ) -> Self {
        Self {
            store,
            admin,
            tokens,
        }
    }

    /// Create an account with its own storage principal and bucket
    pub fn register(
        &self,
        username: &str,
        password: &str,
        email: &str,
    ) -> ProvisioningResult<(Account, TokenPair)> {
        let scope =
            ObservationScope::with_fields("PROVISIONING", vec![("username", username.to_string())]);

        match self.run(username, password, email) {
            Ok((account, tokens)) => {
                let id = account.id.to_string();
                Event::AccountProvisioned
                    .emit(&[("account_id", &id), ("bucket", &account.bucket_name)]);
                scope.complete(&[("account_id", &id)]);
                Ok((account, tokens))
            }
            Err(err) => {
                if matches!(err, ProvisioningError::DuplicateAccount) {
                    Event::ProvisioningRejected.emit(&[("username", username)]);
                }
                scope.fail(&err.to_string());
                Err(err)
            }
        }
    }

    fn run(
        &self,
        username: &str,
        password: &str,
        email: &str,
    ) -> ProvisioningResult<(Account, TokenPair)> {
        let password_hash =
            hash_password(password).map_err(|_| ProvisioningError::PasswordHashing)?;

        let identity = tenant_identity(username);
        let credential = StorageCredential {
            bucket_name: identity.clone(),
            access_key: identity,
            secret_key: generate_secret_key(SECRET_KEY_BYTES),
        };

        let mut completed = Completed::default();

        let account_id = self
            .store
            .create_account(&NewAccount {
                username: username.to_string(),
                password_hash,
                email: email.to_string(),
                credential: credential.clone(),
            })
            .map_err(|e| match e {
                AuthError::DuplicateAccount => ProvisioningError::DuplicateAccount,
                other => ProvisioningError::CredentialPersistence(other.to_string()),
            })?;
        completed.account_id = Some(account_id);

        self.storage_step(&completed, "create_principal", || {
            self.admin
                .create_principal(&credential.access_key, &credential.secret_key)
        })?;
        completed.principal = Some(credential.access_key.clone());

        self.storage_step(&completed, "attach_policy", || {
            self.admin
                .attach_policy(&[READWRITE_POLICY], &credential.access_key)
        })?;

        self.storage_step(&completed, "create_bucket", || {
            self.admin.create_bucket(&credential.bucket_name)
        })?;

        if let Err(e) = self.store.set_storage_credentials(account_id, &credential) {
            // Storage-side resources are not undone here
            Completed {
                account_id: Some(account_id),
                principal: None,
            }
            .compensate(self, "persist_credentials");
            Event::CredentialsLeftLive.emit(&[
                ("access_key", &credential.access_key),
                ("bucket", &credential.bucket_name),
            ]);
            return Err(ProvisioningError::CredentialPersistence(e.to_string()));
        }

        let account = self
            .store
            .account_by_id(account_id)
            .and_then(|found| found.ok_or(AuthError::AccountNotFound))
            .map_err(|e| ProvisioningError::CredentialPersistence(e.to_string()))?;
        let tokens = self
            .tokens
            .issue_token_pair(&account)
            .map_err(ProvisioningError::TokenIssuance)?;

        Ok((account, tokens))
    }

    fn storage_step<F>(&self, completed: &Completed, step: &str, action: F) -> ProvisioningResult<()>
    where
        F: FnOnce() -> Result<(), StorageError>,
    {
        action().map_err(|e| {
            completed.compensate(self, step);
            ProvisioningError::StorageProvisioning(e)
        })
    }
}
