//! Account HTTP Routes
//!
//! Registration, login, token refresh, and the current-account endpoint.
//! Refresh tokens travel only in an HTTP-only cookie.

use axum::{
    extract::{Json, State},
    http::{header, HeaderMap, HeaderValue},
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};

use super::errors::ApiError;
use super::state::{blocking, AppState};
use crate::auth::TokenPair;

/// Cookie carrying the refresh token
pub const REFRESH_COOKIE: &str = "refresh_token";

pub fn auth_routes(state: AppState) -> Router {
    Router::new()
        .route("/users/register", post(register_handler))
        .route("/users/login", post(login_handler))
        .route("/users/refresh", post(refresh_handler))
        .route("/users/me", get(me_handler))
        .route("/ping", get(ping_handler))
        .with_state(state)
}

// ==================
// Request/Response Types
// ==================

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub message: String,
    pub user_id: i64,
    pub access_token: String,
    pub expires_in: i64,
}

#[derive(Debug, Serialize)]
pub struct RefreshResponse {
    pub access_token: String,
    pub expires_in: i64,
}

#[derive(Debug, Serialize)]
pub struct AccountResponse {
    pub id: i64,
    pub username: String,
    pub email: String,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

impl RegisterRequest {
    fn validate(&self) -> Result<(), ApiError> {
        if self.username.trim().is_empty() || self.password.is_empty() {
            return Err(ApiError::bad_request("username and password are required"));
        }
        let valid_email = self
            .email
            .split_once('@')
            .map_or(false, |(local, domain)| !local.is_empty() && domain.contains('.'));
        if !valid_email {
            return Err(ApiError::bad_request("a valid email is required"));
        }
        Ok(())
    }
}

/// `Set-Cookie` value for a refresh token
pub fn refresh_cookie(tokens: &TokenPair) -> String {
    format!(
        "{}={}; HttpOnly; Secure; Path=/; Max-Age={}",
        REFRESH_COOKIE, tokens.refresh_token, tokens.refresh_ttl
    )
}

/// Find the refresh token in a `Cookie` header
fn refresh_token_from(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == REFRESH_COOKIE)
        .map(|(_, value)| value.to_string())
        .filter(|value| !value.is_empty())
}

fn with_cookie(tokens: &TokenPair, body: impl IntoResponse) -> Result<Response, ApiError> {
    let cookie = HeaderValue::from_str(&refresh_cookie(tokens)).map_err(|_| ApiError::internal())?;
    Ok(([(header::SET_COOKIE, cookie)], body).into_response())
}

// ==================
// Handlers
// ==================

async fn register_handler(
    State(state): State<AppState>,
    Json(request): Json<RegisterRequest>,
) -> Result<Response, ApiError> {
    request.validate()?;

    let (account, tokens) = blocking(move || {
        state
            .saga
            .register(request.username.trim(), &request.password, &request.email)
            .map_err(ApiError::from)
    })
    .await?;

    let body = Json(SessionResponse {
        message: "Account registered".to_string(),
        user_id: account.id,
        access_token: tokens.access_token.clone(),
        expires_in: tokens.expires_in,
    });
    with_cookie(&tokens, body)
}

async fn login_handler(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> Result<Response, ApiError> {
    if request.username.trim().is_empty() || request.password.is_empty() {
        return Err(ApiError::bad_request("username and password are required"));
    }

    let (account, tokens) = blocking(move || {
        state
            .accounts
            .login(request.username.trim(), &request.password)
            .map_err(ApiError::from)
    })
    .await?;

    let body = Json(SessionResponse {
        message: "Logged in".to_string(),
        user_id: account.id,
        access_token: tokens.access_token.clone(),
        expires_in: tokens.expires_in,
    });
    with_cookie(&tokens, body)
}

async fn refresh_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let refresh_token = refresh_token_from(&headers).ok_or_else(ApiError::unauthorized)?;

    // A refresh for a deleted account is as unauthorized as a bad token
    let tokens = blocking(move || {
        state
            .accounts
            .tokens()
            .refresh_token_pair(&refresh_token)
            .map_err(|_| ApiError::unauthorized())
    })
    .await?;

    let body = Json(RefreshResponse {
        access_token: tokens.access_token.clone(),
        expires_in: tokens.expires_in,
    });
    with_cookie(&tokens, body)
}

async fn me_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<AccountResponse>, ApiError> {
    let claims = state.authenticate(&headers)?;
    let account =
        blocking(move || state.accounts.account(claims.user_id).map_err(ApiError::from)).await?;

    Ok(Json(AccountResponse {
        id: account.id,
        username: account.username,
        email: account.email,
    }))
}

async fn ping_handler() -> Json<MessageResponse> {
    Json(MessageResponse {
        message: "pong".to_string(),
    })
}
