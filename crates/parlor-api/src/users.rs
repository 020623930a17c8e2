use axum::{extract::State, http::StatusCode, response::IntoResponse};
use serde::Deserialize;
use serde_json::json;
use tracing::info;
use uuid::Uuid;

use parlor_types::api::{CreateUserRequest, UpdateUserRequest};
use parlor_types::{AI_USER_EMAIL, AI_USER_ID};

use crate::error::ApiError;
use crate::extract::{Json, Path, Query};
use crate::state::{AppState, run_db};

#[derive(Debug, Deserialize)]
pub struct UserQuery {
    /// Exact email match; the sign-in screen uses it to find an existing account.
    pub email: Option<String>,
}

/// The assistant's id and email belong to the seeded AI user only.
fn reject_assistant_identity(id: Option<Uuid>, email: Option<&str>) -> Result<(), ApiError> {
    let email_taken = email.is_some_and(|e| e.trim().eq_ignore_ascii_case(AI_USER_EMAIL));
    if id == Some(AI_USER_ID) || email_taken {
        return Err(ApiError::BadRequest("This identity is reserved for the AI assistant".into()));
    }
    Ok(())
}

pub async fn list_users(
    State(state): State<AppState>,
    Query(query): Query<UserQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let users = run_db(&state, move |db| db.list_users(query.email.as_deref())).await?;
    Ok(Json(json!({ "users": users })))
}

pub async fn create_user(
    State(state): State<AppState>,
    Json(req): Json<CreateUserRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if req.email.trim().is_empty() || req.username.trim().is_empty() {
        return Err(ApiError::BadRequest("email and username are required".into()));
    }
    reject_assistant_identity(req.id, Some(&req.email))?;

    let user = run_db(&state, move |db| db.create_user(&req)).await?;
    info!("User {} ({}) registered", user.username, user.id);

    Ok((StatusCode::CREATED, Json(json!({ "user": user }))))
}

pub async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let user = run_db(&state, move |db| db.get_user(id))
        .await?
        .ok_or(ApiError::NotFound("User not found"))?;
    Ok(Json(json!({ "user": user })))
}

pub async fn update_user(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateUserRequest>,
) -> Result<impl IntoResponse, ApiError> {
    reject_assistant_identity(Some(id), req.email.as_deref())?;
    let user = run_db(&state, move |db| db.update_user(id, &req))
        .await?
        .ok_or(ApiError::NotFound("User not found"))?;
    Ok(Json(json!({ "user": user })))
}

pub async fn delete_user(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    if run_db(&state, move |db| db.delete_user(id)).await? {
        info!("User {} deleted", id);
    }
    Ok(Json(json!({ "message": "User deleted successfully" })))
}
