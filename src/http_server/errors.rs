//! HTTP error responses
//!
//! Every failure leaves the API as `{"error": ..., "code": ...}`.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::auth::AuthError;
use crate::file_storage::ExecutorError;
use crate::provisioning::ProvisioningError;

/// Body shared by bad, expired, and missing tokens
pub const UNAUTHORIZED_MESSAGE: &str = "Unauthorized";

const STORAGE_FAILURE_MESSAGE: &str = "Storage operation failed";

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: u16,
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn unauthorized() -> Self {
        Self::new(StatusCode::UNAUTHORIZED, UNAUTHORIZED_MESSAGE)
    }

    pub fn internal() -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

fn status_from(code: u16) -> StatusCode {
    StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        if err.is_token_failure() {
            return Self::unauthorized();
        }
        Self::new(status_from(err.status_code()), err.to_string())
    }
}

impl From<ProvisioningError> for ApiError {
    fn from(err: ProvisioningError) -> Self {
        Self::new(status_from(err.status_code()), err.to_string())
    }
}

impl From<ExecutorError> for ApiError {
    fn from(err: ExecutorError) -> Self {
        let status = status_from(err.status_code());
        if status.is_server_error() {
            Self::new(status, STORAGE_FAILURE_MESSAGE)
        } else {
            Self::new(status, err.to_string())
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorResponse {
            error: self.message,
            code: self.status.as_u16(),
        };
        (self.status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::file_storage::StorageError;

    #[test]
    fn test_token_failures_look_identical() {
        let invalid = ApiError::from(AuthError::TokenInvalid);
        let expired = ApiError::from(AuthError::TokenExpired);
        assert_eq!(invalid.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(invalid.message, expired.message);
    }

    #[test]
    fn test_executor_failures_are_generic() {
        let err = ApiError::from(ExecutorError::CredentialResolution("account 7".into()));
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.message, STORAGE_FAILURE_MESSAGE);

        let err = ApiError::from(ExecutorError::from(StorageError::NoSuchKey("a.txt".into())));
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_duplicate_registration_conflicts() {
        let err = ApiError::from(ProvisioningError::DuplicateAccount);
        assert_eq!(err.status(), StatusCode::CONFLICT);
    }
}
