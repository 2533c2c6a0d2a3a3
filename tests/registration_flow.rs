//! Registration Flow Tests
//!
//! End-to-end behavior across the provisioning saga, the token service, and
//! the scoped file operations:
//! - Registration provisions the account, principal, and bucket
//! - Failed provisioning leaves no account behind
//! - Tokens issued at registration gate file access
//! - Tenants only ever see their own bucket

use std::io::Read;
use std::sync::Arc;

use chrono::Duration;
use homevault::auth::{
    AccountService, AuthError, CredentialStore, InMemoryCredentialStore, ManualClock, TokenConfig,
    TokenService,
};
use homevault::file_storage::{
    ExecutorError, FaultPoint, FileService, MemoryBackend, ScopedFileOperationExecutor,
    StorageAdminController,
};
use homevault::provisioning::{ProvisioningError, ProvisioningSaga};

// =============================================================================
// Helper Functions
// =============================================================================

const T0: i64 = 1_700_000_000;

struct World {
    store: Arc<InMemoryCredentialStore>,
    backend: MemoryBackend,
    clock: Arc<ManualClock>,
    tokens: TokenService,
    saga: ProvisioningSaga,
    files: FileService,
}

fn world() -> World {
    let store = Arc::new(InMemoryCredentialStore::new());
    let backend = MemoryBackend::new("minioadmin");
    let clock = Arc::new(ManualClock::at_unix(T0));
    let tokens = TokenService::with_clock(
        TokenConfig {
            access_secret: "access-secret-for-tests".into(),
            refresh_secret: "refresh-secret-for-tests".into(),
            access_ttl: Duration::seconds(900),
            refresh_ttl: Duration::seconds(604_800),
        },
        store.clone(),
        clock.clone(),
    )
    .unwrap();
    let admin = StorageAdminController::new(Arc::new(backend.clone()), Arc::new(backend.clone()));
    let saga = ProvisioningSaga::new(store.clone(), admin.clone(), tokens.clone());
    let executor = ScopedFileOperationExecutor::new(store.clone(), Arc::new(admin.clone()));
    let files = FileService::new(executor, 1024 * 1024);

    World {
        store,
        backend,
        clock,
        tokens,
        saga,
        files,
    }
}

fn upload(w: &World, account_id: i64, key: &str, data: &[u8]) {
    w.files
        .upload_file(account_id, key, &mut &data[..], data.len() as u64, Some("text/plain"))
        .unwrap();
}

// =============================================================================
// Provisioning
// =============================================================================

#[test]
fn test_registration_provisions_all_four_fields() {
    let w = world();
    let (account, tokens) = w.saga.register("alice", "s3cret!", "alice@example.com").unwrap();

    let stored = w.store.account_by_id(account.id).unwrap().unwrap();
    assert!(!stored.password_hash.is_empty());
    assert!(!stored.bucket_name.is_empty());
    assert!(!stored.access_key.is_empty());
    assert!(!stored.secret_key.is_empty());
    assert_ne!(stored.password_hash, "s3cret!");

    let claims = w.tokens.verify_access_token(&tokens.access_token).unwrap();
    assert_eq!(claims.user_id, account.id);
    assert_eq!(tokens.expires_in, 900);
    assert_eq!(tokens.refresh_ttl, 604_800);
}

#[test]
fn test_principal_failure_leaves_no_account() {
    let w = world();
    w.backend.fail_on(FaultPoint::AddPrincipal);

    let err = w.saga.register("alice", "pw", "alice@example.com").unwrap_err();
    assert!(matches!(err, ProvisioningError::StorageProvisioning(_)));
    assert!(w.store.account_by_username("alice").unwrap().is_none());

    // Once the backend recovers the same username can register
    w.backend.clear_faults();
    w.saga.register("alice", "pw", "alice@example.com").unwrap();
}

#[test]
fn test_bucket_failure_unwinds_principal() {
    let w = world();
    w.backend.fail_on(FaultPoint::MakeBucket);

    let err = w.saga.register("alice", "pw", "alice@example.com").unwrap_err();
    assert!(matches!(err, ProvisioningError::StorageProvisioning(_)));
    assert!(w.store.is_empty());
    assert!(!w.backend.has_principal("user-alice"));
    assert!(!w.backend.bucket_exists("user-alice"));
}

#[test]
fn test_concurrent_duplicate_registrations() {
    let w = Arc::new(world());
    let handles: Vec<_> = (0..8)
        .map(|i| {
            let w = Arc::clone(&w);
            std::thread::spawn(move || {
                w.saga
                    .register("alice", "pw", &format!("alice{}@example.com", i))
                    .is_ok()
            })
        })
        .collect();

    let successes = handles
        .into_iter()
        .map(|h| h.join().unwrap())
        .filter(|ok| *ok)
        .count();
    assert_eq!(successes, 1);
    assert_eq!(w.store.len(), 1);
}

// =============================================================================
// Tokens and File Access
// =============================================================================

#[test]
fn test_registered_account_can_use_files() {
    let w = world();
    let (account, tokens) = w.saga.register("alice", "pw", "alice@example.com").unwrap();
    let claims = w.tokens.verify_access_token(&tokens.access_token).unwrap();

    upload(&w, claims.user_id, "notes.txt", b"remember the milk");
    let mut reader = w.files.get_file(account.id, "notes.txt").unwrap();
    let mut body = String::new();
    reader.read_to_string(&mut body).unwrap();
    assert_eq!(body, "remember the milk");
}

#[test]
fn test_tenants_are_isolated() {
    let w = world();
    let (alice, _) = w.saga.register("alice", "pw", "alice@example.com").unwrap();
    let (bob, _) = w.saga.register("bob", "pw", "bob@example.com").unwrap();

    upload(&w, alice.id, "private.txt", b"alice only");

    assert!(w.files.list_files(bob.id, "", true).unwrap().is_empty());
    let err = w.files.get_file(bob.id, "private.txt").unwrap_err();
    assert!(matches!(err, ExecutorError::Storage(_)));
    assert_eq!(w.backend.object_keys("user-alice"), vec!["private.txt"]);
    assert!(w.backend.object_keys("user-bob").is_empty());
}

#[test]
fn test_expiry_and_rotation() {
    let w = world();
    let (account, tokens) = w.saga.register("alice", "pw", "alice@example.com").unwrap();

    w.clock.advance(Duration::seconds(899));
    assert!(w.tokens.verify_access_token(&tokens.access_token).is_ok());

    w.clock.advance(Duration::seconds(2));
    assert!(matches!(
        w.tokens.verify_access_token(&tokens.access_token),
        Err(AuthError::TokenExpired)
    ));

    let rotated = w.tokens.refresh_token_pair(&tokens.refresh_token).unwrap();
    assert_ne!(rotated.refresh_token, tokens.refresh_token);
    let claims = w.tokens.verify_access_token(&rotated.access_token).unwrap();
    assert_eq!(claims.user_id, account.id);
}

#[test]
fn test_refresh_after_account_deleted() {
    let w = world();
    let (account, tokens) = w.saga.register("alice", "pw", "alice@example.com").unwrap();
    w.store.delete_account(account.id).unwrap();

    assert!(matches!(
        w.tokens.refresh_token_pair(&tokens.refresh_token),
        Err(AuthError::AccountNotFound)
    ));
    assert!(matches!(
        w.files.list_files(account.id, "", true),
        Err(ExecutorError::CredentialResolution(_))
    ));
}

#[test]
fn test_login_after_registration() {
    let w = world();
    let (account, _) = w.saga.register("alice", "pw", "alice@example.com").unwrap();
    let service = AccountService::new(w.store.clone(), w.tokens.clone());

    let (logged_in, tokens) = service.login("alice", "pw").unwrap();
    assert_eq!(logged_in.id, account.id);
    assert!(w.tokens.verify_access_token(&tokens.access_token).is_ok());
    assert!(matches!(
        service.login("alice", "wrong"),
        Err(AuthError::InvalidCredentials)
    ));
}

// =============================================================================
// Folders
// =============================================================================

#[test]
fn test_folder_lifecycle() {
    let w = world();
    let (account, _) = w.saga.register("alice", "pw", "alice@example.com").unwrap();

    w.files.create_folder(account.id, "a").unwrap();
    upload(&w, account.id, "a/file.txt", b"twelve bytes");
    assert_eq!(w.files.list_folders(account.id, "").unwrap(), vec!["a"]);

    w.files.create_folder(account.id, "docs").unwrap();
    upload(&w, account.id, "docs/x.txt", b"x");
    upload(&w, account.id, "docs/y.txt", b"y");
    w.files.delete_folder(account.id, "docs").unwrap();

    assert!(w.files.list_files(account.id, "docs/", true).unwrap().is_empty());
    assert_eq!(w.files.list_folders(account.id, "").unwrap(), vec!["a"]);
}
