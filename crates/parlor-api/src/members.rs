use axum::{extract::State, http::StatusCode, response::IntoResponse};
use serde_json::json;
use uuid::Uuid;

use parlor_types::api::{AddMemberRequest, UpdateMemberRequest};

use crate::error::ApiError;
use crate::extract::{Json, Path};
use crate::state::{AppState, run_db};

pub async fn list_members(
    State(state): State<AppState>,
    Path(chat_room_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let members = run_db(&state, move |db| db.list_members(chat_room_id)).await?;
    Ok(Json(json!({ "members": members })))
}

pub async fn add_member(
    State(state): State<AppState>,
    Path(chat_room_id): Path<Uuid>,
    Json(req): Json<AddMemberRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let member = run_db(&state, move |db| db.add_member(chat_room_id, &req)).await?;
    Ok((StatusCode::CREATED, Json(json!({ "member": member }))))
}

pub async fn update_member(
    State(state): State<AppState>,
    Path((chat_room_id, user_id)): Path<(Uuid, Uuid)>,
    Json(req): Json<UpdateMemberRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let member = run_db(&state, move |db| db.update_member_role(chat_room_id, user_id, req.role))
        .await?
        .ok_or(ApiError::NotFound("Member not found"))?;
    Ok(Json(json!({ "member": member })))
}

pub async fn remove_member(
    State(state): State<AppState>,
    Path((chat_room_id, user_id)): Path<(Uuid, Uuid)>,
) -> Result<impl IntoResponse, ApiError> {
    run_db(&state, move |db| db.remove_member(chat_room_id, user_id)).await?;
    Ok(Json(json!({ "message": "Member removed successfully" })))
}
