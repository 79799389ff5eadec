// ============================
// crates/backend-lib/src/handlers/auth.rs
// ============================
//! `/auth` route handlers.
use crate::auth::AuthSession;
use crate::error::AppError;
use crate::AppState;
use authgate_common::{
    AuthResponse, LoginRequest, MeResponse, MessageResponse, RefreshRequest, RegisterRequest,
    TokenPairResponse,
};
use axum::{
    extract::{rejection::JsonRejection, State},
    http::{header::AUTHORIZATION, HeaderMap},
    Json,
};
use std::sync::Arc;
use tracing::debug;

fn body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, AppError> {
    payload.map(|Json(inner)| inner).map_err(|rejection| {
        debug!(reason = %rejection.body_text(), "unreadable request body");
        AppError::InvalidInput("Invalid request body".to_string())
    })
}

/// Token from an `Authorization: Bearer <token>` header
pub fn bearer_token(headers: &HeaderMap) -> Result<&str, AppError> {
    let value = headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .ok_or(AppError::MissingToken)?;

    let (scheme, token) = value.split_once(' ').ok_or(AppError::MissingToken)?;
    let token = token.trim();
    if !scheme.eq_ignore_ascii_case("bearer") || token.is_empty() {
        return Err(AppError::MissingToken);
    }
    Ok(token)
}

fn auth_response(message: &str, session: AuthSession) -> Json<AuthResponse> {
    Json(AuthResponse {
        message: message.to_string(),
        user: session.identity.public(),
        access_token: session.tokens.access_token,
        refresh_token: session.tokens.refresh_token,
    })
}

/// `POST /auth/register`
pub async fn register(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<Json<AuthResponse>, AppError> {
    let session = state.sessions.register(body(payload)?).await?;
    Ok(auth_response("Signed up successfully", session))
}

/// `POST /auth/login`
pub async fn login(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<AuthResponse>, AppError> {
    let session = state.sessions.login(body(payload)?).await?;
    Ok(auth_response("Logged in successfully", session))
}

/// `POST /auth/refresh`
pub async fn refresh(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<RefreshRequest>, JsonRejection>,
) -> Result<Json<TokenPairResponse>, AppError> {
    let missing = || AppError::InvalidInput("refreshToken required in body".to_string());
    let RefreshRequest { refresh_token } = body(payload).map_err(|_| missing())?;
    if refresh_token.trim().is_empty() {
        return Err(missing());
    }

    let pair = state.sessions.refresh(refresh_token.trim()).await?;
    Ok(Json(TokenPairResponse {
        access_token: pair.access_token,
        refresh_token: pair.refresh_token,
    }))
}

/// `GET /auth/me`
pub async fn me(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<MeResponse>, AppError> {
    let identity = state.sessions.authenticate(bearer_token(&headers)?).await?;
    Ok(Json(MeResponse {
        user: identity.public(),
    }))
}

/// `POST /auth/logout`, revoking every session of the caller
pub async fn logout(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<MessageResponse>, AppError> {
    state
        .sessions
        .logout_everywhere(bearer_token(&headers)?)
        .await?;
    Ok(Json(MessageResponse {
        message: "Logged out from all sessions".to_string(),
    }))
}
