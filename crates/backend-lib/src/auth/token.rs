// ============================
// crates/backend-lib/src/auth/token.rs
// ============================
//! Signed access and refresh tokens.
//!
//! Tokens are RS256 JWTs: the private key signs, the public key verifies, so
//! any component holding only a [`TokenVerifier`] can validate them.

use crate::clock::Clock;
use crate::config::TokenSettings;
use crate::storage::Identity;
use anyhow::Context;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;
use zeroize::Zeroize;

/// Why a token could not be issued or accepted
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TokenError {
    #[error("token signature is invalid")]
    InvalidSignature,

    #[error("token has expired")]
    Expired,

    #[error("token claims are malformed: {0}")]
    MalformedClaims(String),

    #[error("invalid key material: {0}")]
    Key(String),

    #[error("failed to sign token: {0}")]
    Signing(String),
}

/// Which half of a session a token belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenKind::Access => f.write_str("access"),
            TokenKind::Refresh => f.write_str("refresh"),
        }
    }
}

/// Claims carried by every token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Identity id
    pub sub: String,
    /// Issued at, epoch seconds
    pub iat: i64,
    /// Expires at, epoch seconds
    pub exp: i64,
    /// Identity token version at issuance
    #[serde(rename = "tokenVersion")]
    pub token_version: i64,
    /// Access tokens only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    /// Access tokens only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub typ: TokenKind,
}

/// A freshly minted access/refresh pair
#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

/// Public-key-only token verification
#[derive(Clone)]
pub struct TokenVerifier {
    decoding: DecodingKey,
    clock: Arc<dyn Clock>,
}

impl TokenVerifier {
    pub fn from_pem(public_pem: &[u8], clock: Arc<dyn Clock>) -> Result<Self, TokenError> {
        let decoding =
            DecodingKey::from_rsa_pem(public_pem).map_err(|e| TokenError::Key(e.to_string()))?;
        Ok(Self { decoding, clock })
    }

    /// Verify signature, then claim structure, then kind, then expiry.
    pub fn verify(&self, token: &str, kind: TokenKind) -> Result<TokenClaims, TokenError> {
        let mut validation = Validation::new(Algorithm::RS256);
        // expiry is checked below against the injected clock
        validation.validate_exp = false;
        validation.validate_aud = false;
        validation.required_spec_claims.clear();

        let claims = decode::<TokenClaims>(token, &self.decoding, &validation)
            .map_err(classify)?
            .claims;

        if claims.typ != kind {
            return Err(TokenError::MalformedClaims(format!(
                "expected a {kind} token, got a {} token",
                claims.typ
            )));
        }
        if self.clock.now() >= claims.exp {
            return Err(TokenError::Expired);
        }
        Ok(claims)
    }
}

fn classify(err: jsonwebtoken::errors::Error) -> TokenError {
    use jsonwebtoken::errors::ErrorKind;
    match err.kind() {
        ErrorKind::InvalidSignature | ErrorKind::InvalidAlgorithm | ErrorKind::InvalidAlgorithmName => {
            TokenError::InvalidSignature
        }
        ErrorKind::ExpiredSignature => TokenError::Expired,
        _ => TokenError::MalformedClaims(err.to_string()),
    }
}

fn lifetime_secs(ttl: Duration) -> Result<i64, TokenError> {
    i64::try_from(ttl.as_secs())
        .map_err(|_| TokenError::Key(format!("token lifetime of {}s is out of range", ttl.as_secs())))
}

/// Issues and verifies session tokens
#[derive(Clone)]
pub struct TokenCodec {
    encoding: EncodingKey,
    verifier: TokenVerifier,
    access_ttl: i64,
    refresh_ttl: i64,
    clock: Arc<dyn Clock>,
}

impl TokenCodec {
    pub fn from_pem(
        private_pem: &[u8],
        public_pem: &[u8],
        access_ttl: Duration,
        refresh_ttl: Duration,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, TokenError> {
        let encoding =
            EncodingKey::from_rsa_pem(private_pem).map_err(|e| TokenError::Key(e.to_string()))?;
        let verifier = TokenVerifier::from_pem(public_pem, clock.clone())?;
        Ok(Self {
            encoding,
            verifier,
            access_ttl: lifetime_secs(access_ttl)?,
            refresh_ttl: lifetime_secs(refresh_ttl)?,
            clock,
        })
    }

    /// Read the PEM files named in `settings`; the private key bytes are
    /// wiped once parsed.
    pub fn load(settings: &TokenSettings, clock: Arc<dyn Clock>) -> anyhow::Result<Self> {
        let mut private_pem = std::fs::read(&settings.private_key_path).with_context(|| {
            format!("cannot read private key {}", settings.private_key_path.display())
        })?;
        let public_pem = std::fs::read(&settings.public_key_path).with_context(|| {
            format!("cannot read public key {}", settings.public_key_path.display())
        })?;

        let codec = Self::from_pem(
            &private_pem,
            &public_pem,
            Duration::from_secs(settings.access_ttl_secs),
            Duration::from_secs(settings.refresh_ttl_secs),
            clock,
        );
        private_pem.zeroize();
        Ok(codec?)
    }

    pub fn issue(&self, claims: &TokenClaims) -> Result<String, TokenError> {
        encode(&Header::new(Algorithm::RS256), claims, &self.encoding)
            .map_err(|e| TokenError::Signing(e.to_string()))
    }

    pub fn access_claims(&self, identity: &Identity) -> TokenClaims {
        let now = self.clock.now();
        TokenClaims {
            sub: identity.id.clone(),
            iat: now,
            exp: now.saturating_add(self.access_ttl),
            token_version: identity.token_version,
            role: Some(identity.role.clone()),
            email: Some(identity.email.clone()),
            typ: TokenKind::Access,
        }
    }

    pub fn refresh_claims(&self, subject: &str, token_version: i64) -> TokenClaims {
        let now = self.clock.now();
        TokenClaims {
            sub: subject.to_string(),
            iat: now,
            exp: now.saturating_add(self.refresh_ttl),
            token_version,
            role: None,
            email: None,
            typ: TokenKind::Refresh,
        }
    }

    /// Mint an access/refresh pair bound to the identity's current version
    pub fn issue_pair(&self, identity: &Identity) -> Result<TokenPair, TokenError> {
        let access_token = self.issue(&self.access_claims(identity))?;
        let refresh_token =
            self.issue(&self.refresh_claims(&identity.id, identity.token_version))?;
        debug!(
            subject = %identity.id,
            token_version = identity.token_version,
            "issued token pair"
        );
        Ok(TokenPair {
            access_token,
            refresh_token,
        })
    }

    pub fn verify(&self, token: &str, kind: TokenKind) -> Result<TokenClaims, TokenError> {
        self.verifier.verify(token, kind)
    }
}
