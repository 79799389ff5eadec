// ============================
// crates/backend-lib/src/auth/session.rs
// ============================
//! Session lifecycle: register, login, refresh rotation and revocation.
//!
//! A refresh token is bound to the identity's `token_version` at issue
//! time. Redeeming it atomically bumps the version, so every token is
//! single use and any older token is rejected as revoked.
use crate::auth::backoff::{BackoffGate, BackoffStatus};
use crate::auth::password::{CredentialHasher, HashingError};
use crate::auth::token::{TokenCodec, TokenKind, TokenPair};
use crate::clock::Clock;
use crate::error::AppError;
use crate::metrics::{
    LOGIN_FAILED, LOGIN_SUCCEEDED, LOGOUT_EVERYWHERE, REFRESH_REJECTED, REFRESH_ROTATED,
    REGISTERED,
};
use crate::storage::{Identity, IdentityStore};
use crate::validation::{validate_login, validate_registration};
use authgate_common::{LoginRequest, RegisterRequest};
use metrics::counter;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;
use zeroize::Zeroizing;

/// Hashed once per manager so unknown emails cost one real verification
const DECOY_PASSWORD: &str = "authgate-decoy-password";

/// Identity plus a freshly issued token pair
#[derive(Debug, Clone)]
pub struct AuthSession {
    pub identity: Identity,
    pub tokens: TokenPair,
}

/// Session manager for registering identities and rotating their tokens
#[derive(Clone)]
pub struct SessionManager {
    identities: Arc<dyn IdentityStore>,
    hasher: Arc<dyn CredentialHasher>,
    tokens: Arc<TokenCodec>,
    backoff: BackoffGate,
    clock: Arc<dyn Clock>,
    min_password_length: usize,
    decoy_digest: String,
}

impl SessionManager {
    pub fn new(
        identities: Arc<dyn IdentityStore>,
        hasher: Arc<dyn CredentialHasher>,
        tokens: Arc<TokenCodec>,
        backoff: BackoffGate,
        clock: Arc<dyn Clock>,
        min_password_length: usize,
    ) -> Result<Self, HashingError> {
        let decoy_digest = hasher.hash(DECOY_PASSWORD)?;
        Ok(Self {
            identities,
            hasher,
            tokens,
            backoff,
            clock,
            min_password_length,
            decoy_digest,
        })
    }

    pub fn tokens(&self) -> &TokenCodec {
        &self.tokens
    }

    /// Create an identity with `token_version = 1` and sign it in
    pub async fn register(&self, req: RegisterRequest) -> Result<AuthSession, AppError> {
        let registration = validate_registration(&req, self.min_password_length)?;
        let password = Zeroizing::new(req.password);

        // cheap early answer; the store's email index decides races
        if self
            .identities
            .find_by_email(&registration.email)
            .await?
            .is_some()
        {
            return Err(AppError::EmailExists);
        }

        let hasher = self.hasher.clone();
        let password_hash = tokio::task::spawn_blocking(move || hasher.hash(&password))
            .await
            .map_err(|e| AppError::Internal(format!("hashing task failed: {e}")))??;

        let identity = Identity {
            id: Uuid::new_v4().to_string(),
            name: registration.name,
            email: registration.email,
            password_hash,
            role: registration.role,
            created_at: self.clock.now(),
            token_version: 1,
        };
        self.identities.insert(&identity).await?;

        let tokens = self.tokens.issue_pair(&identity)?;
        counter!(REGISTERED).increment(1);
        info!(user_id = %identity.id, role = %identity.role, "identity registered");

        Ok(AuthSession { identity, tokens })
    }

    /// Check credentials behind the backoff gate
    pub async fn login(&self, req: LoginRequest) -> Result<AuthSession, AppError> {
        let email = validate_login(&req)?;
        let password = Zeroizing::new(req.password);

        if let BackoffStatus::Blocked { remaining_secs } = self.backoff.check(&email).await? {
            return Err(AppError::BackoffBlocked { remaining_secs });
        }

        let Some(identity) = self.identities.find_by_email(&email).await? else {
            self.verify_password(password, self.decoy_digest.clone()).await?;
            return self.reject_login(&email, "unknown email").await;
        };

        if !self
            .verify_password(password, identity.password_hash.clone())
            .await?
        {
            return self.reject_login(&email, "wrong password").await;
        }

        self.backoff.reset(&email).await?;
        let tokens = self.tokens.issue_pair(&identity)?;
        counter!(LOGIN_SUCCEEDED).increment(1);
        info!(user_id = %identity.id, "login succeeded");

        Ok(AuthSession { identity, tokens })
    }

    async fn verify_password(
        &self,
        password: Zeroizing<String>,
        digest: String,
    ) -> Result<bool, AppError> {
        let hasher = self.hasher.clone();
        tokio::task::spawn_blocking(move || hasher.verify(&password, &digest))
            .await
            .map_err(|e| AppError::Internal(format!("verification task failed: {e}")))
    }

    async fn reject_login(&self, email: &str, reason: &str) -> Result<AuthSession, AppError> {
        let record = self.backoff.record_failure(email).await?;
        counter!(LOGIN_FAILED).increment(1);
        warn!(reason, fail_count = record.fail_count, "login failed");
        Err(AppError::InvalidCredentials)
    }

    /// Redeem a refresh token for a new pair, superseding it
    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenPair, AppError> {
        let claims = self
            .tokens
            .verify(refresh_token, TokenKind::Refresh)
            .inspect_err(|e| {
                counter!(REFRESH_REJECTED).increment(1);
                debug!(reason = %e, "refresh token rejected");
            })?;

        let Some(mut identity) = self.identities.find_by_id(&claims.sub).await? else {
            counter!(REFRESH_REJECTED).increment(1);
            return Err(AppError::IdentityNotFound);
        };

        if identity.token_version != claims.token_version {
            counter!(REFRESH_REJECTED).increment(1);
            warn!(
                user_id = %identity.id,
                presented = claims.token_version,
                current = identity.token_version,
                "superseded refresh token presented"
            );
            return Err(AppError::TokenRevoked);
        }

        let bumped = self
            .identities
            .compare_and_increment_version(&identity.id, claims.token_version)
            .await
            .map_err(|e| AppError::Inconsistency(e.to_string()))?;

        let Some(version) = bumped else {
            // another redeem of the same token won the race
            counter!(REFRESH_REJECTED).increment(1);
            return Err(AppError::TokenRevoked);
        };

        identity.token_version = version;
        let pair = self.tokens.issue_pair(&identity)?;
        counter!(REFRESH_ROTATED).increment(1);
        debug!(user_id = %identity.id, token_version = version, "refresh token rotated");

        Ok(pair)
    }

    /// Resolve an access token to its current identity
    pub async fn authenticate(&self, access_token: &str) -> Result<Identity, AppError> {
        let claims = self
            .tokens
            .verify(access_token, TokenKind::Access)
            .inspect_err(|e| debug!(reason = %e, "access token rejected"))?;

        let identity = self
            .identities
            .find_by_id(&claims.sub)
            .await?
            .ok_or(AppError::IdentityNotFound)?;

        if identity.token_version != claims.token_version {
            return Err(AppError::TokenRevoked);
        }
        Ok(identity)
    }

    /// Revoke every outstanding token of the caller's identity
    pub async fn logout_everywhere(&self, access_token: &str) -> Result<i64, AppError> {
        let identity = self.authenticate(access_token).await?;

        let version = self
            .identities
            .increment_version(&identity.id)
            .await
            .map_err(|e| AppError::Inconsistency(e.to_string()))?
            .ok_or(AppError::IdentityNotFound)?;

        counter!(LOGOUT_EVERYWHERE).increment(1);
        info!(user_id = %identity.id, token_version = version, "all sessions revoked");
        Ok(version)
    }
}
