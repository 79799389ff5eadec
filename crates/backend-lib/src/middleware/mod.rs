// crates/backend-lib/src/middleware/mod.rs

//! Middleware for the `authgate` HTTP server.

pub mod client_ip;
pub mod rate_limit;

pub use client_ip::client_ip;
pub use rate_limit::{rate_limit, Admission, RateLimiter};
