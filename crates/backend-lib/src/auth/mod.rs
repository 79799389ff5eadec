// ============================
// crates/backend-lib/src/auth/mod.rs
// ============================
//! Authentication module.

pub mod backoff;
pub mod password;
pub mod session;
pub mod token;

pub use backoff::{BackoffGate, BackoffRecord, BackoffStatus};
pub use password::{Argon2Hasher, CredentialHasher, HashingError};
pub use session::{AuthSession, SessionManager};
pub use token::{TokenClaims, TokenCodec, TokenError, TokenKind, TokenPair, TokenVerifier};
