// ================
// common/src/lib.rs
// ================
//! Common types and structures
//! used for communication between `authgate` clients and the server.
//! This module defines the JSON request and response bodies of the `/auth` routes.

use serde::{Deserialize, Serialize};

/// Body of `POST /auth/register`
///
/// Missing fields deserialize to empty strings so the server can answer
/// with a field-specific validation message instead of a parse error.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct RegisterRequest {
    /// Display name
    #[serde(default)]
    pub name: String,
    /// Login email, must be syntactically valid
    #[serde(default)]
    pub email: String,
    /// Plaintext password
    #[serde(default)]
    pub password: String,
    /// Role stored on the identity and copied into access tokens
    #[serde(default)]
    pub role: String,
}

/// Body of `POST /auth/login`
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

/// Body of `POST /auth/refresh`
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    #[serde(default)]
    pub refresh_token: String,
}

/// Identity as exposed to clients (never includes the password digest)
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct PublicIdentity {
    pub id: String,
    pub name: String,
    pub email: String,
    pub role: String,
    /// Creation time, epoch seconds
    pub created_at: i64,
    /// Current refresh-token generation
    pub token_version: i64,
}

/// Response of a successful register or login
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    pub message: String,
    pub user: PublicIdentity,
    pub access_token: String,
    pub refresh_token: String,
}

/// Response of a successful refresh
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct TokenPairResponse {
    pub access_token: String,
    pub refresh_token: String,
}

/// Response of `GET /auth/me`
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct MeResponse {
    pub user: PublicIdentity,
}

/// Plain acknowledgement
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct MessageResponse {
    pub message: String,
}

/// Body of every error response
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    /// Human readable, sanitized message
    pub error: String,
    /// Stable machine readable code, e.g. `RATE_001`
    pub code: String,
    /// Seconds to wait before retrying, set on 429 responses
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_after: Option<u64>,
}
