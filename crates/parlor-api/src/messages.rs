use axum::{extract::State, http::StatusCode, response::IntoResponse};
use serde::Deserialize;
use serde_json::json;
use tracing::debug;
use uuid::Uuid;

use parlor_types::AI_USER_ID;
use parlor_types::api::{CreateMessageRequest, UpdateMessageRequest};
use parlor_types::events::GatewayEvent;

use crate::error::ApiError;
use crate::extract::{Json, Path, Query};
use crate::replies;
use crate::state::{AppState, run_db};

#[derive(Debug, Deserialize)]
pub struct MessageQuery {
    #[serde(rename = "chatRoomId")]
    pub chat_room_id: Option<Uuid>,
    #[serde(default = "default_limit")]
    pub limit: u32,
    /// Messages to skip, counted back from the newest.
    #[serde(default)]
    pub offset: u32,
}

fn default_limit() -> u32 {
    50
}

/// Also the polling fallback for clients whose realtime socket is down.
pub async fn list_messages(
    State(state): State<AppState>,
    Query(query): Query<MessageQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let chat_room_id = query
        .chat_room_id
        .ok_or_else(|| ApiError::BadRequest("chatRoomId is required".into()))?;
    let limit = query.limit.min(200);
    let offset = query.offset;

    let messages = run_db(&state, move |db| db.list_messages(chat_room_id, limit, offset)).await?;
    Ok(Json(json!({ "messages": messages })))
}

/// Stores the message, pushes it to subscribers and, for human authors,
/// kicks off an assistant reply in the background. The reply never delays
/// or fails this response.
pub async fn create_message(
    State(state): State<AppState>,
    Json(req): Json<CreateMessageRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if req.content.trim().is_empty() {
        return Err(ApiError::BadRequest("content is required".into()));
    }

    let message = run_db(&state, move |db| db.create_message(&req)).await?;
    debug!("Message {} posted in room {}", message.message.id, message.message.chat_room_id);

    state.dispatcher.broadcast(GatewayEvent::MessageCreate {
        message: message.clone(),
    });

    if message.message.user_id != AI_USER_ID {
        replies::spawn_reply(state.clone(), message.message.clone());
    }

    Ok((StatusCode::CREATED, Json(json!({ "message": message }))))
}

pub async fn get_message(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let message = run_db(&state, move |db| db.get_message(id))
        .await?
        .ok_or(ApiError::NotFound("Message not found"))?;
    Ok(Json(json!({ "message": message })))
}

pub async fn update_message(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateMessageRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let message = run_db(&state, move |db| db.update_message(id, &req))
        .await?
        .ok_or(ApiError::NotFound("Message not found"))?;

    state.dispatcher.broadcast(GatewayEvent::MessageUpdate {
        message: message.clone(),
    });

    Ok(Json(json!({ "message": message })))
}

pub async fn delete_message(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    if let Some(chat_room_id) = run_db(&state, move |db| db.delete_message(id)).await? {
        state.dispatcher.broadcast(GatewayEvent::MessageDelete { id, chat_room_id });
    }
    Ok(Json(json!({ "message": "Message deleted successfully" })))
}
