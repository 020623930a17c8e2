use tracing::{error, info};
use uuid::Uuid;

use parlor_assistant::{REPLY_FAILED_MESSAGE, format_history};
use parlor_types::AI_USER_ID;
use parlor_types::api::CreateMessageRequest;
use parlor_types::events::GatewayEvent;
use parlor_types::models::{Message, MessageType};

use crate::state::{AppState, run_db};

/// Answers `trigger` as the AI pseudo-user on a tracked background task.
pub fn spawn_reply(state: AppState, trigger: Message) {
    let tracker = state.replies.clone();
    tracker.spawn(async move {
        let room = trigger.chat_room_id;
        if let Err(e) = respond(&state, &trigger).await {
            error!("AI response generation failed for room {}: {:#}", room, e);
            post_as_assistant(&state, room, REPLY_FAILED_MESSAGE.to_string())
                .await
                .unwrap_or_else(|e| error!("Failed to send fallback AI message: {:#}", e));
        }
    });
}

async fn respond(state: &AppState, trigger: &Message) -> anyhow::Result<()> {
    let room = trigger.chat_room_id;
    let exclude = trigger.id;
    let limit = u32::try_from(state.assistant.config().history_limit).unwrap_or(u32::MAX);

    let recent = run_db(state, move |db| db.recent_messages(room, limit, Some(exclude))).await?;
    info!("Generating AI response for room {} with {} messages of history", room, recent.len());

    let reply = state
        .assistant
        .generate_reply(&trigger.content, format_history(&recent))
        .await;

    post_as_assistant(state, room, reply).await
}

async fn post_as_assistant(state: &AppState, room: Uuid, content: String) -> anyhow::Result<()> {
    let saved = run_db(state, move |db| {
        db.ensure_assistant_user()?;
        db.create_message(&CreateMessageRequest {
            id: None,
            content,
            user_id: AI_USER_ID,
            chat_room_id: room,
            message_type: Some(MessageType::Text),
        })
    })
    .await?;

    info!("AI message {} saved in room {}", saved.message.id, room);
    state.dispatcher.broadcast(GatewayEvent::MessageCreate { message: saved });
    Ok(())
}
