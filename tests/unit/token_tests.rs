// ==============================
// tests/unit/token_tests.rs
// ==============================
//! This test suite validates token signing and verification with real key files
use backend_lib::auth::{TokenCodec, TokenError, TokenKind, TokenVerifier};
use backend_lib::clock::ManualClock;
use backend_lib::config::TokenSettings;
use std::sync::Arc;

use crate::test_utils::{keys_dir, T0};

fn settings(private: &str, public: &str) -> TokenSettings {
    TokenSettings {
        private_key_path: keys_dir().join(private),
        public_key_path: keys_dir().join(public),
        ..TokenSettings::default()
    }
}

#[test]
fn test_unknown_signing_key_is_invalid_signature() {
    let clock = Arc::new(ManualClock::new(T0));
    let ours = TokenCodec::load(&settings("private.pem", "public.pem"), clock.clone()).unwrap();
    let theirs = TokenCodec::load(
        &settings("foreign_private.pem", "foreign_public.pem"),
        clock,
    )
    .unwrap();

    let forged = theirs.issue(&theirs.refresh_claims("victim", 1)).unwrap();
    assert_eq!(
        ours.verify(&forged, TokenKind::Refresh).unwrap_err(),
        TokenError::InvalidSignature
    );
}

#[test]
fn test_public_key_alone_verifies() {
    let clock = Arc::new(ManualClock::new(T0));
    let codec = TokenCodec::load(&settings("private.pem", "public.pem"), clock.clone()).unwrap();
    let token = codec.issue(&codec.refresh_claims("someone", 4)).unwrap();

    let public = std::fs::read(keys_dir().join("public.pem")).unwrap();
    let verifier = TokenVerifier::from_pem(&public, clock).unwrap();
    let claims = verifier.verify(&token, TokenKind::Refresh).unwrap();
    assert_eq!(claims.sub, "someone");
    assert_eq!(claims.token_version, 4);
}

#[test]
fn test_lifetimes_follow_settings() {
    let clock = Arc::new(ManualClock::new(T0));
    let mut settings = settings("private.pem", "public.pem");
    settings.access_ttl_secs = 60;
    settings.refresh_ttl_secs = 120;
    let codec = TokenCodec::load(&settings, clock.clone()).unwrap();
    let token = codec.issue(&codec.refresh_claims("someone", 1)).unwrap();

    clock.advance(119);
    assert!(codec.verify(&token, TokenKind::Refresh).is_ok());
    clock.advance(1);
    assert_eq!(
        codec.verify(&token, TokenKind::Refresh).unwrap_err(),
        TokenError::Expired
    );
}

#[test]
fn test_missing_key_file_fails_to_load() {
    let clock = Arc::new(ManualClock::new(T0));
    assert!(TokenCodec::load(&settings("absent.pem", "public.pem"), clock).is_err());
}
