use axum::{extract::State, http::HeaderMap, http::StatusCode, Json};
use serde::{Deserialize, Serialize};

use crate::errors::AppError;
use crate::session::bearer_token;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct SignInRequest {
    pub access_key: String,
}

#[derive(Serialize)]
pub struct SignInResponse {
    pub token: String,
}

#[derive(Serialize)]
pub struct SessionStatus {
    pub authenticated: bool,
}

/// POST /api/v1/auth/sign-in
pub async fn handle_sign_in(
    State(state): State<AppState>,
    Json(req): Json<SignInRequest>,
) -> Result<Json<SignInResponse>, AppError> {
    let token = state
        .sessions
        .sign_in(req.access_key.trim())
        .await?
        .ok_or(AppError::Unauthorized)?;
    Ok(Json(SignInResponse { token }))
}

/// POST /api/v1/auth/sign-out
pub async fn handle_sign_out(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<StatusCode, AppError> {
    if let Some(token) = bearer_token(&headers) {
        state.sessions.sign_out(token).await?;
    }
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/v1/auth/session
pub async fn handle_session(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<SessionStatus>, AppError> {
    let authenticated = match bearer_token(&headers) {
        Some(token) => state.sessions.is_authenticated(token).await?,
        None => false,
    };
    Ok(Json(SessionStatus { authenticated }))
}
