//! # Accounts
//!
//! Account model and the credential store it lives in. An account links a
//! login identity to exactly one storage principal and bucket.

use std::collections::BTreeMap;
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::errors::{AuthError, AuthResult};

/// Account record
#[derive(Clone, Serialize)]
pub struct Account {
    /// Store-assigned identifier
    pub id: i64,

    /// Unique login name
    pub username: String,

    /// Argon2id password hash (never plaintext)
    #[serde(skip_serializing)]
    pub password_hash: String,

    /// Unique email address
    pub email: String,

    /// Unique bucket name; empty while unprovisioned
    pub bucket_name: String,

    /// Storage principal access key; empty while unprovisioned
    pub access_key: String,

    /// Storage principal secret key; empty while unprovisioned
    #[serde(skip_serializing)]
    pub secret_key: String,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Account {
    /// The storage triple, if this account is provisioned
    pub fn storage_credential(&self) -> Option<StorageCredential> {
        let credential = StorageCredential {
            bucket_name: self.bucket_name.clone(),
            access_key: self.access_key.clone(),
            secret_key: self.secret_key.clone(),
        };
        credential.is_complete().then_some(credential)
    }

    pub fn is_provisioned(&self) -> bool {
        self.storage_credential().is_some()
    }
}

/// Bucket, access key, and secret key of one tenant
#[derive(Clone, Default, PartialEq, Eq)]
pub struct StorageCredential {
    pub bucket_name: String,
    pub access_key: String,
    pub secret_key: String,
}

impl StorageCredential {
    pub fn is_complete(&self) -> bool {
        !self.bucket_name.is_empty() && !self.access_key.is_empty() && !self.secret_key.is_empty()
    }

    pub fn is_empty(&self) -> bool {
        self.bucket_name.is_empty() && self.access_key.is_empty() && self.secret_key.is_empty()
    }

    /// Either every field is set or none is
    fn is_consistent(&self) -> bool {
        self.is_complete() || self.is_empty()
    }
}

impl std::fmt::Debug for Account {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Account")
            .field("id", &self.id)
            .field("username", &self.username)
            .field("password_hash", &"<redacted>")
            .field("email", &self.email)
            .field("bucket_name", &self.bucket_name)
            .field("access_key", &self.access_key)
            .field("secret_key", &"<redacted>")
            .field("created_at", &self.created_at)
            .field("updated_at", &self.updated_at)
            .finish()
    }
}

impl std::fmt::Debug for StorageCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageCredential")
            .field("bucket_name", &self.bucket_name)
            .field("access_key", &self.access_key)
            .field("secret_key", &"<redacted>")
            .finish()
    }
}

/// Fields written when an account row is first created
#[derive(Debug, Clone)]
pub struct NewAccount {
    pub username: String,
    pub password_hash: String,
    pub email: String,
    pub credential: StorageCredential,
}

/// Durable account storage
///
/// Implementations must enforce uniqueness of username, email, and bucket name
/// atomically; concurrent registrations rely on it.
pub trait CredentialStore: Send + Sync {
    /// Insert a new account, returning its assigned ID
    fn create_account(&self, account: &NewAccount) -> AuthResult<i64>;

    fn account_by_id(&self, id: i64) -> AuthResult<Option<Account>>;

    fn account_by_username(&self, username: &str) -> AuthResult<Option<Account>>;

    fn delete_account(&self, id: i64) -> AuthResult<()>;

    /// Write the storage triple onto an existing account
    fn set_storage_credentials(&self, id: i64, credential: &StorageCredential) -> AuthResult<()>;

    /// The storage triple, or `None` when the account is missing or unprovisioned
    fn storage_credentials(&self, id: i64) -> AuthResult<Option<StorageCredential>>;
}

#[derive(Debug, Default)]
struct StoreInner {
    next_id: i64,
    accounts: BTreeMap<i64, Account>,
}

impl StoreInner {
    /// Whether any row already holds this username, email, or bucket
    fn conflicts(&self, username: &str, email: &str, bucket: &str) -> bool {
        self.accounts.values().any(|a| {
            a.username == username
                || a.email == email
                || (!bucket.is_empty() && a.bucket_name == bucket)
        })
    }
}

/// In-memory credential store with the same uniqueness rules as the `users` table
#[derive(Debug, Default)]
pub struct InMemoryCredentialStore {
    inner: RwLock<StoreInner>,
}

impl InMemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.inner.read().map(|i| i.accounts.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn poisoned<T>(_: T) -> AuthError {
    AuthError::StorageError("Lock poisoned".to_string())
}

fn partial_triple() -> AuthError {
    AuthError::StorageError("storage credentials must be all set or all empty".to_string())
}

impl CredentialStore for InMemoryCredentialStore {
    fn create_account(&self, account: &NewAccount) -> AuthResult<i64> {
        if !account.credential.is_consistent() {
            return Err(partial_triple());
        }

        let mut inner = self.inner.write().map_err(poisoned)?;
        if inner.conflicts(
            &account.username,
            &account.email,
            &account.credential.bucket_name,
        ) {
            return Err(AuthError::DuplicateAccount);
        }

        inner.next_id += 1;
        let id = inner.next_id;
        let now = Utc::now();
        inner.accounts.insert(
            id,
            Account {
                id,
                username: account.username.clone(),
                password_hash: account.password_hash.clone(),
                email: account.email.clone(),
                bucket_name: account.credential.bucket_name.clone(),
                access_key: account.credential.access_key.clone(),
                secret_key: account.credential.secret_key.clone(),
                created_at: now,
                updated_at: now,
            },
        );
        Ok(id)
    }

    fn account_by_id(&self, id: i64) -> AuthResult<Option<Account>> {
        let inner = self.inner.read().map_err(poisoned)?;
        Ok(inner.accounts.get(&id).cloned())
    }

    fn account_by_username(&self, username: &str) -> AuthResult<Option<Account>> {
        let inner = self.inner.read().map_err(poisoned)?;
        Ok(inner
            .accounts
            .values()
            .find(|a| a.username == username)
            .cloned())
    }

    fn delete_account(&self, id: i64) -> AuthResult<()> {
        let mut inner = self.inner.write().map_err(poisoned)?;
        inner
            .accounts
            .remove(&id)
            .map(|_| ())
            .ok_or(AuthError::AccountNotFound)
    }

    fn set_storage_credentials(&self, id: i64, credential: &StorageCredential) -> AuthResult<()> {
        if !credential.is_consistent() {
            return Err(partial_triple());
        }

        let mut inner = self.inner.write().map_err(poisoned)?;
        let clash = inner
            .accounts
            .values()
            .any(|a| a.id != id && !credential.bucket_name.is_empty() && a.bucket_name == credential.bucket_name);
        if clash {
            return Err(AuthError::DuplicateAccount);
        }

        let existing = inner
            .accounts
            .get_mut(&id)
            .ok_or(AuthError::AccountNotFound)?;
        existing.bucket_name = credential.bucket_name.clone();
        existing.access_key = credential.access_key.clone();
        existing.secret_key = credential.secret_key.clone();
        existing.updated_at = Utc::now();
        Ok(())
    }

    fn storage_credentials(&self, id: i64) -> AuthResult<Option<StorageCredential>> {
        let inner = self.inner.read().map_err(poisoned)?;
        Ok(inner.accounts.get(&id).and_then(Account::storage_credential))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_account(username: &str, email: &str) -> NewAccount {
        NewAccount {
            username: username.to_string(),
            password_hash: "$argon2id$fake".to_string(),
            email: email.to_string(),
            credential: StorageCredential {
                bucket_name: format!("user-{}", username),
                access_key: format!("user-{}", username),
                secret_key: "s3cr3t".to_string(),
            },
        }
    }

    #[test]
    fn test_create_and_lookup() {
        let store = InMemoryCredentialStore::new();
        let id = store.create_account(&new_account("alice", "a@example.com")).unwrap();

        let by_id = store.account_by_id(id).unwrap().unwrap();
        assert_eq!(by_id.username, "alice");
        assert!(by_id.is_provisioned());

        let by_name = store.account_by_username("alice").unwrap().unwrap();
        assert_eq!(by_name.id, id);
        assert!(store.account_by_username("bob").unwrap().is_none());
    }

    #[test]
    fn test_ids_are_assigned_sequentially() {
        let store = InMemoryCredentialStore::new();
        let a = store.create_account(&new_account("a", "a@x")).unwrap();
        let b = store.create_account(&new_account("b", "b@x")).unwrap();
        assert!(b > a);
    }

    #[test]
    fn test_username_email_and_bucket_are_unique() {
        let store = InMemoryCredentialStore::new();
        store.create_account(&new_account("alice", "a@example.com")).unwrap();

        let same_name = new_account("alice", "other@example.com");
        assert!(matches!(store.create_account(&same_name), Err(AuthError::DuplicateAccount)));

        let same_email = new_account("carol", "a@example.com");
        assert!(matches!(store.create_account(&same_email), Err(AuthError::DuplicateAccount)));

        let mut same_bucket = new_account("dave", "d@example.com");
        same_bucket.credential.bucket_name = "user-alice".to_string();
        assert!(matches!(store.create_account(&same_bucket), Err(AuthError::DuplicateAccount)));
    }

    #[test]
    fn test_partial_triple_rejected() {
        let store = InMemoryCredentialStore::new();
        let mut account = new_account("alice", "a@example.com");
        account.credential.secret_key.clear();
        assert!(matches!(store.create_account(&account), Err(AuthError::StorageError(_))));

        let id = store.create_account(&new_account("bob", "b@example.com")).unwrap();
        let partial = StorageCredential {
            bucket_name: "user-bob".into(),
            access_key: String::new(),
            secret_key: "x".into(),
        };
        assert!(store.set_storage_credentials(id, &partial).is_err());
    }

    #[test]
    fn test_unprovisioned_account_has_no_credentials() {
        let store = InMemoryCredentialStore::new();
        let mut account = new_account("alice", "a@example.com");
        account.credential = StorageCredential {
            bucket_name: String::new(),
            access_key: String::new(),
            secret_key: String::new(),
        };
        let id = store.create_account(&account).unwrap();
        assert!(store.storage_credentials(id).unwrap().is_none());
        assert!(store.storage_credentials(id + 100).unwrap().is_none());
    }

    #[test]
    fn test_delete() {
        let store = InMemoryCredentialStore::new();
        let id = store.create_account(&new_account("alice", "a@example.com")).unwrap();
        store.delete_account(id).unwrap();
        assert!(store.account_by_id(id).unwrap().is_none());
        assert!(matches!(store.delete_account(id), Err(AuthError::AccountNotFound)));
        assert!(store.is_empty());
    }

    #[test]
    fn test_secret_is_redacted() {
        let store = InMemoryCredentialStore::new();
        let id = store.create_account(&new_account("alice", "a@example.com")).unwrap();
        let account = store.account_by_id(id).unwrap().unwrap();

        let json = serde_json::to_string(&account).unwrap();
        assert!(!json.contains("s3cr3t"));
        assert!(!json.contains("password_hash"));

        let debug = format!("{:?}", account.storage_credential().unwrap());
        assert!(!debug.contains("s3cr3t"));

        let debug = format!("{:?}", account);
        assert!(debug.contains("alice"));
        assert!(!debug.contains("s3cr3t"));
        assert!(!debug.contains("$argon2id$fake"));
    }
}
