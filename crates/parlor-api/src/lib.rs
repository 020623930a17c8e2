pub mod chat_rooms;
pub mod error;
pub mod extract;
pub mod health;
pub mod members;
pub mod messages;
pub mod realtime;
pub mod replies;
pub mod state;
pub mod users;


use axum::{Router, routing::get};

use crate::state::AppState;

/// Every `/api` route. Transport layers (CORS, tracing) are added by the
/// server binary.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(health::health))
        .route("/api/users", get(users::list_users).post(users::create_user))
        .route(
            "/api/users/{id}",
            get(users::get_user).put(users::update_user).delete(users::delete_user),
        )
        .route(
            "/api/chat-rooms",
            get(chat_rooms::list_chat_rooms).post(chat_rooms::create_chat_room),
        )
        .route(
            "/api/chat-rooms/{id}",
            get(chat_rooms::get_chat_room)
                .put(chat_rooms::update_chat_room)
                .delete(chat_rooms::delete_chat_room),
        )
        .route(
            "/api/chat-rooms/{id}/members",
            get(members::list_members).post(members::add_member),
        )
        .route(
            "/api/chat-rooms/{id}/members/{user_id}",
            axum::routing::put(members::update_member).delete(members::remove_member),
        )
        .route("/api/messages", get(messages::list_messages).post(messages::create_message))
        .route(
            "/api/messages/{id}",
            get(messages::get_message)
                .put(messages::update_message)
                .delete(messages::delete_message),
        )
        .route("/api/realtime", get(realtime::ws_upgrade))
        .with_state(state)
}
