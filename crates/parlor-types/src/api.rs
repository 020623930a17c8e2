use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{MemberRole, MessageType};

// -- Users --

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct CreateUserRequest {
    #[serde(default)]
    pub id: Option<Uuid>,
    pub email: String,
    pub username: String,
    #[serde(default)]
    pub avatar_url: Option<String>,
}

/// Absent fields are left alone. `avatar_url: null` clears the avatar.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct UpdateUserRequest {
    pub email: Option<String>,
    pub username: Option<String>,
    #[serde(
        default,
        with = "::serde_with::rust::double_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub avatar_url: Option<Option<String>>,
}

// -- Chat rooms --

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct CreateChatRoomRequest {
    #[serde(default)]
    pub id: Option<Uuid>,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub created_by: Uuid,
}

/// `description: null` clears the description; leaving it out keeps it.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct UpdateChatRoomRequest {
    pub name: Option<String>,
    #[serde(
        default,
        with = "::serde_with::rust::double_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub description: Option<Option<String>>,
}

// -- Members --

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AddMemberRequest {
    pub user_id: Uuid,
    #[serde(default)]
    pub role: Option<MemberRole>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct UpdateMemberRequest {
    pub role: MemberRole,
}

// -- Messages --

/// `id` may be supplied by the client so an optimistic placeholder can be
/// matched with the stored row once it comes back.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct CreateMessageRequest {
    #[serde(default)]
    pub id: Option<Uuid>,
    pub content: String,
    pub user_id: Uuid,
    pub chat_room_id: Uuid,
    #[serde(default)]
    pub message_type: Option<MessageType>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct UpdateMessageRequest {
    pub content: Option<String>,
    pub message_type: Option<MessageType>,
}

// -- Health --

/// Presence of each configuration variable. Values are never echoed back.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvironmentStatus {
    pub has_database_url: bool,
    pub has_openai_key: bool,
    pub has_perplexity_key: bool,
    pub has_auth_secret: bool,
    pub ai_provider: String,
    pub database_url_preview: String,
}

impl EnvironmentStatus {
    pub fn all_required_set(&self) -> bool {
        self.has_database_url
    }
}
