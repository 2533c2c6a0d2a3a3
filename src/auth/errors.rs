//! # Auth Errors
//!
//! Error types for accounts, login, and token lifecycle.

use thiserror::Error;

/// Result type for auth operations
pub type AuthResult<T> = Result<T, AuthError>;

/// Authentication and account errors
#[derive(Debug, Clone, Error)]
pub enum AuthError {
    // ==================
    // Account Errors
    // ==================
    /// Username, email, or bucket name already taken
    #[error("Account already exists")]
    DuplicateAccount,

    /// Account was deleted or never existed
    #[error("Account not found")]
    AccountNotFound,

    /// Unknown username or wrong password (deliberately indistinguishable)
    #[error("Invalid credentials")]
    InvalidCredentials,

    // ==================
    // Token Errors
    // ==================
    /// Malformed token, unexpected algorithm, or bad signature
    #[error("Invalid token")]
    TokenInvalid,

    /// Token is at or past its embedded expiry
    #[error("Token expired")]
    TokenExpired,

    /// Signing failed (key misconfiguration)
    #[error("Internal error: token issuance failed")]
    TokenIssuance,

    /// Token secrets are missing or shared between access and refresh
    #[error("Invalid token configuration: {0}")]
    InvalidConfig(String),

    // ==================
    // Internal Errors
    // ==================
    /// Password hashing failed
    #[error("Internal error: password hashing failed")]
    HashingFailed,

    /// Credential store failure
    #[error("Storage error: {0}")]
    StorageError(String),
}

impl AuthError {
    /// Returns the HTTP status code for this error
    pub fn status_code(&self) -> u16 {
        match self {
            AuthError::InvalidCredentials => 401,
            AuthError::TokenInvalid => 401,
            AuthError::TokenExpired => 401,

            AuthError::AccountNotFound => 404,

            AuthError::DuplicateAccount => 409,

            AuthError::TokenIssuance => 500,
            AuthError::InvalidConfig(_) => 500,
            AuthError::HashingFailed => 500,
            AuthError::StorageError(_) => 500,
        }
    }

    /// Token verification failures are reported identically to clients
    pub fn is_token_failure(&self) -> bool {
        matches!(self, AuthError::TokenInvalid | AuthError::TokenExpired)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_status_codes() {
        assert_eq!(AuthError::InvalidCredentials.status_code(), 401);
        assert_eq!(AuthError::TokenExpired.status_code(), 401);
        assert_eq!(AuthError::DuplicateAccount.status_code(), 409);
        assert_eq!(AuthError::HashingFailed.status_code(), 500);
    }

    #[test]
    fn test_invalid_credentials_is_generic() {
        let msg = AuthError::InvalidCredentials.to_string();
        assert!(!msg.contains("password"));
        assert!(!msg.contains("username"));
    }
}
