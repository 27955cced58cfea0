use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use serde_json::{Value, json};
use tracing::info;

use crate::auth::{Role, password};
use crate::error::{AppError, AppResult};
use crate::models::{LoginRequest, LoginResponse, NewUser, RegisterRequest};

use super::{ApiJson, AppState};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
}

pub(crate) fn require_credentials(username: &str, password: &str) -> AppResult<()> {
    if username.trim().is_empty() || password.is_empty() {
        return Err(AppError::validation("Username and password are required"));
    }
    Ok(())
}

async fn register(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<RegisterRequest>,
) -> AppResult<(StatusCode, Json<Value>)> {
    require_credentials(&req.username, &req.password)?;

    if state.db.username_exists(&req.username).await? {
        return Err(AppError::conflict("Username already exists"));
    }

    let role = Role::for_self_registration(req.role.as_deref());
    let password_hash = password::hash(req.password, state.config.bcrypt_cost).await?;
    let user_id = state
        .db
        .create_user(&NewUser {
            username: req.username,
            password_hash,
            full_name: req.full_name,
            email: req.email,
            role,
        })
        .await?;

    info!(user_id, %role, "user registered");

    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": "User created successfully", "userId": user_id })),
    ))
}

async fn login(State(state): State<AppState>, ApiJson(req): ApiJson<LoginRequest>) -> AppResult<Json<LoginResponse>> {
    let invalid = || AppError::unauthorized("Invalid credentials");

    let Some(credentials) = state.db.find_credentials(&req.username).await? else {
        return Err(invalid());
    };
    if !password::verify(req.password, credentials.password_hash.clone()).await? {
        return Err(invalid());
    }

    let role: Role = credentials
        .role
        .parse()
        .map_err(|err| AppError::Internal(anyhow::Error::new(err)))?;
    let token = state
        .tokens
        .issue(credentials.id, &credentials.username, role)
        .map_err(|err| AppError::Internal(err.into()))?;

    info!(user_id = credentials.id, "login succeeded");

    Ok(Json(LoginResponse {
        token,
        user: credentials.into_user(),
    }))
}
