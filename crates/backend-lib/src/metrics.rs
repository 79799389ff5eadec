// ==============
// crates/backend-lib/src/metrics.rs

//! Central place for metric keys
pub const RATE_LIMIT_ADMITTED: &str = "rate_limit.admitted";
pub const RATE_LIMIT_REJECTED: &str = "rate_limit.rejected";
pub const CLIENT_UNKNOWN: &str = "rate_limit.unknown_client";
pub const REGISTERED: &str = "auth.registered";
pub const LOGIN_SUCCEEDED: &str = "auth.login.succeeded";
pub const LOGIN_FAILED: &str = "auth.login.failed";
pub const BACKOFF_BLOCKED: &str = "auth.backoff.blocked";
pub const REFRESH_ROTATED: &str = "auth.refresh.rotated";
pub const REFRESH_REJECTED: &str = "auth.refresh.rejected";
pub const LOGOUT_EVERYWHERE: &str = "auth.logout";
pub const STORE_PURGED: &str = "store.purged";
