//! Registration and login.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use domain::RegisterUser;
use serde::{Deserialize, Serialize};
use store::Store;
use utoipa::ToSchema;

use super::users::UserResponse;
use crate::AppState;
use crate::error::{ApiError, ApiJson, ErrorBody};

#[derive(Deserialize, ToSchema)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
}

#[derive(Deserialize, ToSchema)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Serialize, ToSchema)]
pub struct LoginResponse {
    pub token: String,
    pub token_type: &'static str,
    pub expires_at: DateTime<Utc>,
    pub user: UserResponse,
}

/// POST /auth/register: create an account with the `user` role.
#[utoipa::path(
    post,
    path = "/auth/register",
    tag = "auth",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Account created", body = UserResponse),
        (status = 400, description = "Invalid email or weak password", body = ErrorBody),
        (status = 409, description = "Email already registered", body = ErrorBody),
    )
)]
#[tracing::instrument(skip(state, req), fields(email = %req.email))]
pub async fn register<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    ApiJson(req): ApiJson<RegisterRequest>,
) -> Result<(StatusCode, Json<UserResponse>), ApiError> {
    let user = state
        .services
        .users
        .register(RegisterUser {
            email: req.email,
            password: req.password,
            first_name: req.first_name,
            last_name: req.last_name,
        })
        .await?;
    Ok((StatusCode::CREATED, Json(UserResponse::from(user))))
}

/// POST /auth/login: exchange credentials for a bearer token.
#[utoipa::path(
    post,
    path = "/auth/login",
    tag = "auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Bearer token issued", body = LoginResponse),
        (status = 401, description = "Bad credentials", body = ErrorBody),
    )
)]
#[tracing::instrument(skip(state, req), fields(email = %req.email))]
pub async fn login<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    ApiJson(req): ApiJson<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    let session = state.services.users.login(&req.email, &req.password).await?;
    Ok(Json(LoginResponse {
        token: session.token,
        token_type: "Bearer",
        expires_at: session.expires_at,
        user: UserResponse::from(session.user),
    }))
}
