// ==============================
// tests/integration/server_tests.rs
// ==============================
//! Start-up wiring: settings file to running router
use crate::test_utils::{keys_dir, request, send, test_settings};
use axum::{
    body::Body,
    extract::ConnectInfo,
    http::{Method, Request, StatusCode},
};
use backend_lib::{config::Settings, router::create_router, AppState};
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use tempfile::TempDir;

#[tokio::test]
async fn test_state_from_settings_serves_requests() {
    let dir = TempDir::new().unwrap();
    let state = AppState::new(test_settings(dir.path().join("data")))
        .await
        .unwrap();
    assert!(state.memory_store.is_some());
    let app = create_router(Arc::new(state));

    let peer: SocketAddr = "127.0.0.1:50000".parse().unwrap();
    let health = Request::builder()
        .uri("/health")
        .extension(ConnectInfo(peer))
        .body(Body::empty())
        .unwrap();
    let response = send(&app, health).await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body, json!({ "status": "ok" }));

    let register = request(
        Method::POST,
        "/auth/register",
        "127.0.0.1",
        Some(json!({ "name": "A", "email": "a@x.com", "password": "secret1", "role": "user" })),
        None,
    );
    let response = send(&app, register).await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["user"]["token_version"], 1);

    // the identity landed in the configured data directory
    let documents = std::fs::read_dir(dir.path().join("data/identities"))
        .unwrap()
        .count();
    assert_eq!(documents, 1);
}

#[tokio::test]
async fn test_missing_key_material_fails_startup() {
    let dir = TempDir::new().unwrap();
    let mut settings = test_settings(dir.path().to_path_buf());
    settings.tokens.private_key_path = dir.path().join("missing.pem");

    let err = AppState::new(settings).await.err().unwrap();
    assert!(err.to_string().contains("missing.pem"));
}

#[tokio::test]
async fn test_settings_file_configures_rate_limit() {
    let dir = TempDir::new().unwrap();
    let config = dir.path().join("authgate.toml");
    std::fs::write(
        &config,
        format!(
            r#"
                data_dir = "{data}"

                [rate_limit]
                capacity = 2

                [tokens]
                private_key_path = "{private}"
                public_key_path = "{public}"

                [password]
                argon2_memory_kib = 1024
                argon2_parallelism = 1
            "#,
            data = dir.path().join("data").display(),
            private = keys_dir().join("private.pem").display(),
            public = keys_dir().join("public.pem").display(),
        ),
    )
    .unwrap();

    let settings = Settings::load_from(&config).unwrap();
    assert_eq!(settings.rate_limit.capacity, 2);
    let app = create_router(Arc::new(AppState::new(settings).await.unwrap()));

    let statuses = [
        send(&app, request(Method::GET, "/health", "10.9.8.7", None, None)).await.status,
        send(&app, request(Method::GET, "/health", "10.9.8.7", None, None)).await.status,
        send(&app, request(Method::GET, "/health", "10.9.8.7", None, None)).await.status,
    ];
    assert_eq!(
        statuses,
        [StatusCode::OK, StatusCode::OK, StatusCode::TOO_MANY_REQUESTS]
    );
}
