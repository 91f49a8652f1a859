//! Auth gateway: registration, login, token validation
//!
//! Passwords are hashed client-side before transmission; the server never
//! sees plaintext and treats the received hash as an opaque credential.
//! Tokens are bearer JWTs; logout is a client-side discard, nothing is
//! revoked server-side.

pub mod jwt;

use crate::db;
use crate::errors::{AppError, Result};
use crate::server::AppState;
use crate::types::{Token, UserProfile};
use async_trait::async_trait;
use axum::extract::{FromRequestParts, State};
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use jwt::Claims;
use serde::Deserialize;
use sqlx::MySqlPool;
use tracing::info;

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    /// Client-side hash, not a plaintext password
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Routes mounted under `/api`
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/token", post(login))
        .route("/validate-token", get(validate_token))
        .route("/users/me", get(me))
}

fn pool(state: &AppState) -> Result<&MySqlPool> {
    state
        .pool
        .as_ref()
        .ok_or_else(|| AppError::Config("database is disabled or not configured".to_string()))
}

fn issue_token(state: &AppState, email: &str) -> Result<Token> {
    let access_token = jwt::create_token(
        email,
        &state.settings.secret_key,
        state.settings.access_token_expire_minutes,
    )?;
    Ok(Token::bearer(access_token))
}

async fn register(
    State(state): State<AppState>,
    Json(request): Json<RegisterRequest>,
) -> Result<Json<Token>> {
    let pool = pool(&state)?;
    let user = db::insert_user(pool, &request.username, &request.email, &request.password).await?;
    info!(username = %user.username, "registered new user");
    Ok(Json(issue_token(&state, &user.email)?))
}

async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<Token>> {
    let pool = pool(&state)?;
    let user = db::find_by_email(pool, &request.email)
        .await?
        .ok_or(AppError::InvalidCredentials)?;
    if user.hashed_password != request.password {
        return Err(AppError::InvalidCredentials);
    }
    info!(username = %user.username, "user logged in");
    Ok(Json(issue_token(&state, &user.email)?))
}

async fn validate_token(_claims: AuthClaims) -> StatusCode {
    StatusCode::OK
}

async fn me(State(state): State<AppState>, claims: AuthClaims) -> Result<Json<UserProfile>> {
    let pool = pool(&state)?;
    let user = db::find_by_email(pool, &claims.0.sub)
        .await?
        .ok_or(AppError::Unauthorized)?;
    Ok(Json(user.profile()))
}

/// Extractor rejecting requests without a valid bearer token
pub struct AuthClaims(pub Claims);

#[async_trait]
impl FromRequestParts<AppState> for AuthClaims {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or(AppError::Unauthorized)?;
        let token = header
            .strip_prefix("Bearer ")
            .or_else(|| header.strip_prefix("bearer "))
            .ok_or(AppError::Unauthorized)?;
        let claims = jwt::decode_token(token, &state.settings.secret_key)?;
        Ok(AuthClaims(claims))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_request_parsing() {
        let json = r#"{"username":"ada","email":"ada@example.com","password":"a9f0e61a"}"#;
        let request: RegisterRequest = serde_json::from_str(json).unwrap();
        assert_eq!(request.username, "ada");
        assert_eq!(request.password, "a9f0e61a");
    }

    #[test]
    fn test_login_request_parsing() {
        let json = r#"{"email":"ada@example.com","password":"a9f0e61a"}"#;
        let request: LoginRequest = serde_json::from_str(json).unwrap();
        assert_eq!(request.email, "ada@example.com");
    }
}
