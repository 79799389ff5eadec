// crates/backend-lib/src/error.rs

//! Central error type + Axum integration.
use crate::auth::password::HashingError;
use crate::auth::token::TokenError;
use crate::storage::StorageError;
use crate::store::StoreError;
use crate::validation::ValidationError;
use authgate_common::ErrorBody;
use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;
use tracing::{error, warn};

/// Application error types with error codes and context
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Email already exists")]
    EmailExists,

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Login blocked for another {remaining_secs}s")]
    BackoffBlocked { remaining_secs: u64 },

    #[error("Invalid token: {0}")]
    InvalidToken(TokenError),

    #[error("Token version mismatch")]
    TokenRevoked,

    #[error("Identity not found")]
    IdentityNotFound,

    #[error("Missing bearer token")]
    MissingToken,

    #[error("Rate limit exceeded, retry after {retry_after_secs}s")]
    RateLimitExceeded { retry_after_secs: u64 },

    #[error("Unable to determine client address")]
    UnknownClient,

    #[error("Dependency failure: {0}")]
    Dependency(String),

    #[error("State inconsistency: {0}")]
    Inconsistency(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::InvalidInput(_) | AppError::EmailExists => StatusCode::BAD_REQUEST,
            AppError::InvalidCredentials
            | AppError::InvalidToken(_)
            | AppError::TokenRevoked
            | AppError::IdentityNotFound
            | AppError::MissingToken => StatusCode::UNAUTHORIZED,
            AppError::BackoffBlocked { .. } | AppError::RateLimitExceeded { .. } => {
                StatusCode::TOO_MANY_REQUESTS
            },
            AppError::UnknownClient => StatusCode::FORBIDDEN,
            AppError::Dependency(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Inconsistency(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            },
        }
    }

    /// Get the error code for this error
    pub fn error_code(&self) -> &'static str {
        match self {
            AppError::InvalidInput(_) => "VAL_001",
            AppError::EmailExists => "VAL_002",
            AppError::InvalidToken(_) => "AUTH_001",
            AppError::InvalidCredentials => "AUTH_002",
            AppError::BackoffBlocked { .. } => "AUTH_003",
            AppError::TokenRevoked => "AUTH_004",
            AppError::IdentityNotFound => "AUTH_005",
            AppError::MissingToken => "AUTH_006",
            AppError::RateLimitExceeded { .. } => "RATE_001",
            AppError::UnknownClient => "RATE_002",
            AppError::Dependency(_) => "DEP_001",
            AppError::Inconsistency(_) => "INT_002",
            AppError::Internal(_) => "INT_001",
        }
    }

    /// Get a sanitized message suitable for clients
    pub fn sanitized_message(&self) -> String {
        match self {
            // validation messages name the offending field, nothing more
            AppError::InvalidInput(msg) => msg.clone(),
            AppError::EmailExists => "Email already exists".to_string(),
            AppError::InvalidCredentials => "Invalid email or password".to_string(),
            AppError::BackoffBlocked { .. } => {
                "Too many failed login attempts, please try again later".to_string()
            },
            AppError::InvalidToken(_) => "Invalid token".to_string(),
            AppError::TokenRevoked => "Token has been revoked".to_string(),
            AppError::IdentityNotFound => "User not found".to_string(),
            AppError::MissingToken => "Missing bearer token".to_string(),
            AppError::RateLimitExceeded { .. } => "Rate limit exceeded".to_string(),
            AppError::UnknownClient => "Unable to get IP".to_string(),
            AppError::Dependency(_) => "Service temporarily unavailable".to_string(),
            AppError::Inconsistency(_) => "Failed to update token version".to_string(),
            AppError::Internal(_) => "An internal server error occurred".to_string(),
        }
    }

    /// Seconds a client should wait before retrying, for 429 responses
    pub fn retry_after(&self) -> Option<u64> {
        match self {
            AppError::BackoffBlocked { remaining_secs } => Some(*remaining_secs),
            AppError::RateLimitExceeded { retry_after_secs } => Some(*retry_after_secs),
            _ => None,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let code = self.error_code();

        if status.is_server_error() {
            error!(code, error = %self, "request failed");
        } else {
            warn!(code, error = %self, "request rejected");
        }

        let retry_after = self.retry_after();
        let body = ErrorBody {
            error: self.sanitized_message(),
            code: code.to_string(),
            retry_after,
        };

        let mut response = (status, Json(body)).into_response();
        if let Some(secs) = retry_after {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(secs));
        }
        response
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        AppError::Dependency(err.to_string())
    }
}

impl From<StorageError> for AppError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::Duplicate => AppError::EmailExists,
            other => AppError::Dependency(other.to_string()),
        }
    }
}

impl From<TokenError> for AppError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::Key(_) | TokenError::Signing(_) => AppError::Internal(err.to_string()),
            other => AppError::InvalidToken(other),
        }
    }
}

impl From<HashingError> for AppError {
    fn from(err: HashingError) -> Self {
        AppError::Internal(err.to_string())
    }
}

impl From<ValidationError> for AppError {
    fn from(err: ValidationError) -> Self {
        AppError::InvalidInput(err.to_string())
    }
}
