//! # File Storage Errors

use thiserror::Error;

/// Result type for object-storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Result type for credential-scoped operations
pub type ExecutorResult<T> = Result<T, ExecutorError>;

/// Object-storage backend errors
///
/// Variants mirror the S3 error codes the backend reports; `code()` returns
/// the wire code.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StorageError {
    // Bucket errors
    #[error("Bucket already owned by you: {0}")]
    BucketAlreadyOwnedByYou(String),

    #[error("Bucket already exists: {0}")]
    BucketAlreadyExists(String),

    #[error("Bucket not found: {0}")]
    NoSuchBucket(String),

    #[error("Invalid bucket name: {0}")]
    InvalidBucketName(String),

    // Object errors
    #[error("Object not found: {0}")]
    NoSuchKey(String),

    // Identity errors
    #[error("Access denied: {0}")]
    AccessDenied(String),

    #[error("Invalid access key: {0}")]
    InvalidAccessKeyId(String),

    #[error("Principal not found: {0}")]
    PrincipalNotFound(String),

    #[error("Policy not found: {0}")]
    PolicyNotFound(String),

    // Validation errors
    #[error("File too large: {0} bytes (max: {1})")]
    FileTooLarge(u64, u64),

    #[error("Invalid path: {0}")]
    InvalidPath(String),

    // Transport
    #[error("I/O error: {0}")]
    Io(String),

    #[error("Backend unavailable: {0}")]
    Unavailable(String),
}

impl StorageError {
    /// S3-style error code
    pub fn code(&self) -> &'static str {
        match self {
            StorageError::BucketAlreadyOwnedByYou(_) => "BucketAlreadyOwnedByYou",
            StorageError::BucketAlreadyExists(_) => "BucketAlreadyExists",
            StorageError::NoSuchBucket(_) => "NoSuchBucket",
            StorageError::InvalidBucketName(_) => "InvalidBucketName",
            StorageError::NoSuchKey(_) => "NoSuchKey",
            StorageError::AccessDenied(_) => "AccessDenied",
            StorageError::InvalidAccessKeyId(_) => "InvalidAccessKeyId",
            StorageError::PrincipalNotFound(_) => "XMinioAdminNoSuchUser",
            StorageError::PolicyNotFound(_) => "XMinioAdminNoSuchPolicy",
            StorageError::FileTooLarge(_, _) => "EntityTooLarge",
            StorageError::InvalidPath(_) => "InvalidObjectName",
            StorageError::Io(_) => "IncompleteBody",
            StorageError::Unavailable(_) => "ServiceUnavailable",
        }
    }

    /// Get HTTP status code
    pub fn status_code(&self) -> u16 {
        match self {
            StorageError::InvalidBucketName(_) => 400,
            StorageError::InvalidPath(_) => 400,
            StorageError::AccessDenied(_) => 403,
            StorageError::InvalidAccessKeyId(_) => 403,
            StorageError::NoSuchBucket(_) => 404,
            StorageError::NoSuchKey(_) => 404,
            StorageError::PrincipalNotFound(_) => 404,
            StorageError::PolicyNotFound(_) => 404,
            StorageError::BucketAlreadyOwnedByYou(_) => 409,
            StorageError::BucketAlreadyExists(_) => 409,
            StorageError::FileTooLarge(_, _) => 413,
            StorageError::Io(_) => 500,
            StorageError::Unavailable(_) => 503,
        }
    }
}

/// Errors from running an operation on a tenant-scoped connection
#[derive(Debug, Clone, Error)]
pub enum ExecutorError {
    /// The account has no (complete) storage credentials, or they could not be read
    #[error("Could not resolve storage credentials: {0}")]
    CredentialResolution(String),

    /// A connection with the tenant's credentials could not be established
    #[error("Could not open storage connection: {0}")]
    StorageConnection(String),

    /// The operation itself failed on the backend
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl ExecutorError {
    /// Get HTTP status code
    ///
    /// Resolution and connection failures are generic 500s to the client.
    pub fn status_code(&self) -> u16 {
        match self {
            ExecutorError::CredentialResolution(_) => 500,
            ExecutorError::StorageConnection(_) => 500,
            ExecutorError::Storage(e) => match e {
                StorageError::InvalidPath(_)
                | StorageError::NoSuchKey(_)
                | StorageError::FileTooLarge(_, _) => e.status_code(),
                _ => 500,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(StorageError::NoSuchKey("a".into()).status_code(), 404);
        assert_eq!(StorageError::FileTooLarge(100, 50).status_code(), 413);
        assert_eq!(StorageError::AccessDenied("x".into()).status_code(), 403);
    }

    #[test]
    fn test_wire_codes() {
        assert_eq!(
            StorageError::BucketAlreadyOwnedByYou("b".into()).code(),
            "BucketAlreadyOwnedByYou"
        );
        assert_eq!(StorageError::NoSuchBucket("b".into()).code(), "NoSuchBucket");
    }

    #[test]
    fn test_executor_errors_are_generic() {
        assert_eq!(ExecutorError::CredentialResolution("x".into()).status_code(), 500);
        assert_eq!(ExecutorError::StorageConnection("x".into()).status_code(), 500);
        assert_eq!(
            ExecutorError::from(StorageError::AccessDenied("x".into())).status_code(),
            500
        );
        assert_eq!(
            ExecutorError::from(StorageError::NoSuchKey("x".into())).status_code(),
            404
        );
    }
}
