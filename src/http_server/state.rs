//! Shared handler state

use std::sync::Arc;

use axum::http::HeaderMap;

use super::errors::ApiError;
use crate::auth::{AccountService, Claims, CredentialStore, TokenService};
use crate::file_storage::{FileService, ScopedFileOperationExecutor, StorageAdminController};
use crate::provisioning::ProvisioningSaga;

/// Services every handler can reach
#[derive(Clone)]
pub struct AppState {
    pub saga: ProvisioningSaga,
    pub accounts: AccountService,
    pub files: FileService,
}

impl AppState {
    /// Wire all services over one credential store and storage backend
    pub fn new(
        store: Arc<dyn CredentialStore>,
        admin: StorageAdminController,
        tokens: TokenService,
        max_upload_bytes: u64,
    ) -> Self {
        let executor = ScopedFileOperationExecutor::new(store.clone(), Arc::new(admin.clone()));
        Self {
            saga: ProvisioningSaga::new(store.clone(), admin, tokens.clone()),
            accounts: AccountService::new(store, tokens),
            files: FileService::new(executor, max_upload_bytes),
        }
    }

    /// Verify the bearer token on a request
    ///
    /// Missing, malformed, expired, and forged tokens all yield the same 401.
    pub fn authenticate(&self, headers: &HeaderMap) -> Result<Claims, ApiError> {
        let token = headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or_else(ApiError::unauthorized)?;

        self.accounts
            .tokens()
            .verify_access_token(token)
            .map_err(|_| ApiError::unauthorized())
    }
}

/// Run blocking service work off the async executor
pub async fn blocking<T, F>(work: F) -> Result<T, ApiError>
where
    F: FnOnce() -> Result<T, ApiError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|_| ApiError::internal())?
}
