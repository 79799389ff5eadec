// ==============================
// tests/integration/auth_flow_tests.rs
// ==============================
//! End-to-end flows through the router
use crate::test_utils::{request, send, setup_test_env_with, TestEnv};
use axum::http::{header, Method, StatusCode};
use futures_util::future::join_all;
use serde_json::{json, Value};

const IP: &str = "203.0.113.20";

/// Environment with a roomy bucket so flows are not throttled
fn env() -> TestEnv {
    setup_test_env_with(|settings| settings.rate_limit.capacity = 1_000)
}

fn alice() -> Value {
    json!({ "name": "A", "email": "a@x.com", "password": "secret1", "role": "user" })
}

async fn post(env: &TestEnv, uri: &str, body: Value) -> crate::test_utils::TestResponse {
    send(&env.app, request(Method::POST, uri, IP, Some(body), None)).await
}

async fn register_alice(env: &TestEnv) -> Value {
    let response = post(env, "/auth/register", alice()).await;
    assert_eq!(response.status, StatusCode::OK);
    response.body
}

#[tokio::test]
async fn test_register_returns_identity_and_tokens() {
    let env = env();
    let body = register_alice(&env).await;

    assert_eq!(body["message"], "Signed up successfully");
    assert_eq!(body["user"]["name"], "A");
    assert_eq!(body["user"]["email"], "a@x.com");
    assert_eq!(body["user"]["role"], "user");
    assert_eq!(body["user"]["token_version"], 1);
    assert!(body["user"].get("password_hash").is_none());
    assert!(body["accessToken"].as_str().is_some_and(|t| !t.is_empty()));
    assert!(body["refreshToken"].as_str().is_some_and(|t| !t.is_empty()));
}

#[tokio::test]
async fn test_register_validation_errors() {
    let env = env();

    let cases = [
        json!({ "email": "a@x.com", "password": "secret1", "role": "user" }),
        json!({ "name": "A", "email": "not-an-email", "password": "secret1", "role": "user" }),
        json!({ "name": "A", "email": "a@x.com", "password": "12345", "role": "user" }),
        json!({ "name": "A", "email": "a@x.com", "password": "secret1" }),
    ];
    for body in cases {
        let response = post(&env, "/auth/register", body).await;
        assert_eq!(response.status, StatusCode::BAD_REQUEST);
        assert_eq!(response.body["code"], "VAL_001");
    }

    let malformed = request(Method::POST, "/auth/register", IP, None, None);
    let response = send(&env.app, malformed).await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.body["error"], "Invalid request body");
}

#[tokio::test]
async fn test_duplicate_registration() {
    let env = env();
    register_alice(&env).await;

    let mut again = alice();
    again["email"] = json!("A@X.COM");
    let response = post(&env, "/auth/register", again).await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.body["error"], "Email already exists");
}

#[tokio::test]
async fn test_login_backoff_schedule() {
    let env = env();
    register_alice(&env).await;
    let wrong = json!({ "email": "a@x.com", "password": "wrong-password" });
    let right = json!({ "email": "a@x.com", "password": "secret1" });

    for window in [1u64, 2, 4] {
        let response = post(&env, "/auth/login", wrong.clone()).await;
        assert_eq!(response.status, StatusCode::UNAUTHORIZED);
        assert_eq!(response.body["error"], "Invalid email or password");

        let response = post(&env, "/auth/login", right.clone()).await;
        assert_eq!(response.status, StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.body["code"], "AUTH_003");
        assert_eq!(response.body["retryAfter"], window);
        assert_eq!(response.headers[header::RETRY_AFTER], window.to_string().as_str());

        env.clock.advance(window as i64);
    }

    let response = post(&env, "/auth/login", right).await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["message"], "Logged in successfully");
    assert_eq!(response.body["user"]["token_version"], 1);
}

#[tokio::test]
async fn test_unknown_email_looks_like_wrong_password() {
    let env = env();
    let response = post(
        &env,
        "/auth/login",
        json!({ "email": "ghost@x.com", "password": "secret1" }),
    )
    .await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
    assert_eq!(response.body["error"], "Invalid email or password");
    assert_eq!(response.body["code"], "AUTH_002");
}

#[tokio::test]
async fn test_refresh_rotation_and_replay() {
    let env = env();
    let registered = register_alice(&env).await;
    let first = registered["refreshToken"].clone();

    let response = post(&env, "/auth/refresh", json!({ "refreshToken": first })).await;
    assert_eq!(response.status, StatusCode::OK);
    let second = response.body["refreshToken"].clone();
    assert!(response.body["accessToken"].is_string());

    let response = post(&env, "/auth/refresh", json!({ "refreshToken": second })).await;
    assert_eq!(response.status, StatusCode::OK);

    for replay in [first, second] {
        let response = post(&env, "/auth/refresh", json!({ "refreshToken": replay })).await;
        assert_eq!(response.status, StatusCode::UNAUTHORIZED);
        assert_eq!(response.body["code"], "AUTH_004");
    }
}

#[tokio::test]
async fn test_refresh_input_errors() {
    let env = env();

    for body in [json!({}), json!({ "refreshToken": "" })] {
        let response = post(&env, "/auth/refresh", body).await;
        assert_eq!(response.status, StatusCode::BAD_REQUEST);
        assert_eq!(response.body["error"], "refreshToken required in body");
    }

    let response = post(&env, "/auth/refresh", json!({ "refreshToken": "a.b.c" })).await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
    assert_eq!(response.body["error"], "Invalid token");
}

#[tokio::test]
async fn test_expired_refresh_token() {
    let env = env();
    let registered = register_alice(&env).await;

    env.clock.advance(7 * 24 * 60 * 60);
    let response = post(
        &env,
        "/auth/refresh",
        json!({ "refreshToken": registered["refreshToken"] }),
    )
    .await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
    assert_eq!(response.body["error"], "Invalid token");
}

#[tokio::test]
async fn test_concurrent_redeem_has_one_winner() {
    let env = env();
    let registered = register_alice(&env).await;
    let token = registered["refreshToken"].clone();

    let responses = join_all((0..2).map(|_| {
        send(
            &env.app,
            request(
                Method::POST,
                "/auth/refresh",
                IP,
                Some(json!({ "refreshToken": token })),
                None,
            ),
        )
    }))
    .await;

    let ok = responses.iter().filter(|r| r.status == StatusCode::OK).count();
    let revoked = responses
        .iter()
        .filter(|r| r.status == StatusCode::UNAUTHORIZED)
        .count();
    assert_eq!((ok, revoked), (1, 1));
}

#[tokio::test]
async fn test_me_and_logout_everywhere() {
    let env = env();
    let registered = register_alice(&env).await;
    let access = registered["accessToken"].as_str().unwrap().to_string();

    let response = send(&env.app, request(Method::GET, "/auth/me", IP, None, Some(&access))).await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["user"]["email"], "a@x.com");

    let response = send(&env.app, request(Method::GET, "/auth/me", IP, None, None)).await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
    assert_eq!(response.body["code"], "AUTH_006");

    let response = send(
        &env.app,
        request(Method::POST, "/auth/logout", IP, None, Some(&access)),
    )
    .await;
    assert_eq!(response.status, StatusCode::OK);

    let response = send(&env.app, request(Method::GET, "/auth/me", IP, None, Some(&access))).await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
    assert_eq!(response.body["code"], "AUTH_004");

    let response = post(
        &env,
        "/auth/refresh",
        json!({ "refreshToken": registered["refreshToken"] }),
    )
    .await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_rate_limit_covers_auth_routes() {
    let env = crate::test_utils::setup_test_env();

    for _ in 0..10 {
        let response = post(&env, "/auth/login", json!({})).await;
        assert_eq!(response.status, StatusCode::BAD_REQUEST);
    }
    let response = post(&env, "/auth/login", json!({})).await;
    assert_eq!(response.status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(response.body["error"], "Rate limit exceeded");
    assert_eq!(response.body["code"], "RATE_001");
}
