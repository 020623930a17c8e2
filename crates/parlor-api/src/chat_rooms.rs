use axum::{extract::State, http::StatusCode, response::IntoResponse};
use serde::Deserialize;
use serde_json::json;
use tracing::info;
use uuid::Uuid;

use parlor_types::api::{CreateChatRoomRequest, UpdateChatRoomRequest};

use crate::error::ApiError;
use crate::extract::{Json, Path, Query};
use crate::state::{AppState, run_db};

#[derive(Debug, Deserialize)]
pub struct ChatRoomQuery {
    /// Only rooms this user is a member of.
    #[serde(rename = "userId")]
    pub user_id: Option<Uuid>,
}

pub async fn list_chat_rooms(
    State(state): State<AppState>,
    Query(query): Query<ChatRoomQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let rooms = run_db(&state, move |db| db.list_chat_rooms(query.user_id)).await?;
    Ok(Json(json!({ "chatRooms": rooms })))
}

/// Creates the room together with the creator's admin membership and the
/// assistant's membership.
pub async fn create_chat_room(
    State(state): State<AppState>,
    Json(req): Json<CreateChatRoomRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if req.name.trim().is_empty() {
        return Err(ApiError::BadRequest("name is required".into()));
    }

    let room = run_db(&state, move |db| db.create_chat_room(&req)).await?;
    info!("Chat room '{}' ({}) created by {}", room.name, room.id, room.created_by);

    Ok((StatusCode::CREATED, Json(json!({ "chatRoom": room }))))
}

pub async fn get_chat_room(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let room = run_db(&state, move |db| db.get_chat_room(id))
        .await?
        .ok_or(ApiError::NotFound("Chat room not found"))?;
    Ok(Json(json!({ "chatRoom": room })))
}

pub async fn update_chat_room(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateChatRoomRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let room = run_db(&state, move |db| db.update_chat_room(id, &req))
        .await?
        .ok_or(ApiError::NotFound("Chat room not found"))?;
    Ok(Json(json!({ "chatRoom": room })))
}

pub async fn delete_chat_room(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    if run_db(&state, move |db| db.delete_chat_room(id)).await? {
        info!("Chat room {} deleted", id);
    }
    Ok(Json(json!({ "message": "Chat room deleted successfully" })))
}
