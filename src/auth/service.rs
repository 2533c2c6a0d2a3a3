//! # Account Service
//!
//! Login and account lookup on top of the credential store and token service.

use std::sync::Arc;

use super::account::{Account, CredentialStore};
use super::crypto::verify_password;
use super::errors::{AuthError, AuthResult};
use super::jwt::{TokenPair, TokenService};
use crate::observability::Event;

#[derive(Clone)]
pub struct AccountService {
    store: Arc<dyn CredentialStore>,
    tokens: TokenService,
}

impl AccountService {
    pub fn new(store: Arc<dyn CredentialStore>, tokens: TokenService) -> Self {
        Self { store, tokens }
    }

    /// Authenticate by username and password and issue a token pair
    pub fn login(&self, username: &str, password: &str) -> AuthResult<(Account, TokenPair)> {
        let account = match self.store.account_by_username(username)? {
            Some(account) if verify_password(password, &account.password_hash) => account,
            _ => {
                Event::LoginRejected.emit(&[("username", username)]);
                return Err(AuthError::InvalidCredentials);
            }
        };

        let tokens = self.tokens.issue_token_pair(&account)?;
        Ok((account, tokens))
    }

    pub fn account(&self, id: i64) -> AuthResult<Account> {
        self.store.account_by_id(id)?.ok_or(AuthError::AccountNotFound)
    }

    pub fn tokens(&self) -> &TokenService {
        &self.tokens
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::account::{InMemoryCredentialStore, NewAccount, StorageCredential};
    use crate::auth::crypto::hash_password;
    use crate::auth::jwt::TokenConfig;

    fn setup() -> (AccountService, i64) {
        let store = Arc::new(InMemoryCredentialStore::new());
        let id = store
            .create_account(&NewAccount {
                username: "alice".into(),
                password_hash: hash_password("correct horse").unwrap(),
                email: "alice@example.com".into(),
                credential: StorageCredential {
                    bucket_name: "user-alice".into(),
                    access_key: "user-alice".into(),
                    secret_key: "k".into(),
                },
            })
            .unwrap();
        let tokens = TokenService::new(TokenConfig::default(), store.clone()).unwrap();
        (AccountService::new(store, tokens), id)
    }

    #[test]
    fn test_login() {
        let (service, id) = setup();
        let (account, tokens) = service.login("alice", "correct horse").unwrap();
        assert_eq!(account.id, id);

        let claims = service.tokens().verify_access_token(&tokens.access_token).unwrap();
        assert_eq!(claims.user_id, id);
    }

    #[test]
    fn test_login_failures_are_indistinguishable() {
        let (service, _) = setup();
        let wrong_password = service.login("alice", "battery staple").unwrap_err();
        let unknown_user = service.login("mallory", "correct horse").unwrap_err();

        assert!(matches!(wrong_password, AuthError::InvalidCredentials));
        assert_eq!(wrong_password.to_string(), unknown_user.to_string());
    }

    #[test]
    fn test_account_lookup() {
        let (service, id) = setup();
        assert_eq!(service.account(id).unwrap().username, "alice");
        assert!(matches!(service.account(id + 1), Err(AuthError::AccountNotFound)));
    }
}
