pub mod api;
pub mod events;
pub mod models;

use uuid::Uuid;

/// Fixed id of the "AI Assistant" pseudo-user. Every assistant reply is
/// authored by this account.
pub const AI_USER_ID: Uuid = Uuid::from_u128(1);

pub const AI_USER_EMAIL: &str = "ai@chatapp.com";
pub const AI_USER_USERNAME: &str = "AI Assistant";
