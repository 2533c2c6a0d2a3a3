//! # Provisioning Errors

use thiserror::Error;

use crate::auth::AuthError;
use crate::file_storage::StorageError;

/// Result type for registration
pub type ProvisioningResult<T> = Result<T, ProvisioningError>;

/// Registration failures
///
/// Compensation failures never appear here; they are logged and the error
/// that triggered them is returned.
#[derive(Debug, Clone, Error)]
pub enum ProvisioningError {
    /// Username, email, or bucket already taken; nothing was created
    #[error("Account already exists")]
    DuplicateAccount,

    /// An admin step on the storage backend failed; completed steps were undone
    #[error("Storage provisioning failed: {0}")]
    StorageProvisioning(#[source] StorageError),

    /// The account row could not be written
    #[error("Could not persist account credentials: {0}")]
    CredentialPersistence(String),

    /// The account exists and is provisioned, but no token pair could be issued
    #[error("Token issuance failed: {0}")]
    TokenIssuance(#[source] AuthError),

    #[error("Internal error: password hashing failed")]
    PasswordHashing,
}

impl ProvisioningError {
    /// Get HTTP status code
    pub fn status_code(&self) -> u16 {
        match self {
            ProvisioningError::DuplicateAccount => 409,
            ProvisioningError::StorageProvisioning(_) => 502,
            ProvisioningError::CredentialPersistence(_) => 500,
            ProvisioningError::TokenIssuance(_) => 500,
            ProvisioningError::PasswordHashing => 500,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(ProvisioningError::DuplicateAccount.status_code(), 409);
        assert_eq!(
            ProvisioningError::StorageProvisioning(StorageError::Unavailable("down".into()))
                .status_code(),
            502
        );
        assert_eq!(
            ProvisioningError::TokenIssuance(AuthError::TokenIssuance).status_code(),
            500
        );
    }

    #[test]
    fn test_source_is_kept() {
        use std::error::Error as _;
        let err = ProvisioningError::StorageProvisioning(StorageError::NoSuchBucket("b".into()));
        assert!(err.source().is_some());
    }
}
