//! # Auth Module
//!
//! Accounts, password hashing, and the dual-secret token lifecycle.

pub mod account;
pub mod clock;
pub mod crypto;
pub mod errors;
pub mod jwt;
pub mod service;

pub use account::{Account, CredentialStore, InMemoryCredentialStore, NewAccount, StorageCredential};
pub use clock::{Clock, ManualClock, SystemClock};
pub use errors::{AuthError, AuthResult};
pub use jwt::{Claims, TokenConfig, TokenPair, TokenService};
pub use service::AccountService;
