use serde::{Deserialize, Serialize};

use parlor_types::AI_USER_ID;
use parlor_types::models::Message;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// One entry of a chat-completion conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: Role,
    pub content: String,
}

impl ChatTurn {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

/// Tags stored messages for the completion API: the AI pseudo-user's
/// messages become `assistant`, everyone else's `user`.
pub fn format_history(messages: &[Message]) -> Vec<ChatTurn> {
    messages
        .iter()
        .map(|m| {
            let role = if m.user_id == AI_USER_ID { Role::Assistant } else { Role::User };
            ChatTurn::new(role, m.content.clone())
        })
        .collect()
}

/// Keeps the last `limit` turns.
pub fn most_recent(mut turns: Vec<ChatTurn>, limit: usize) -> Vec<ChatTurn> {
    if turns.len() > limit {
        turns.drain(..turns.len() - limit);
    }
    turns
}

/// Makes roles strictly alternate. Of consecutive same-role turns only the
/// first survives, and a trailing user turn is dropped since the new user
/// message is appended right after the history.
pub fn enforce_alternation(turns: Vec<ChatTurn>) -> Vec<ChatTurn> {
    let mut out: Vec<ChatTurn> = Vec::with_capacity(turns.len());
    for turn in turns {
        if out.last().map(|prev| prev.role) != Some(turn.role) {
            out.push(turn);
        }
    }
    if out.last().is_some_and(|t| t.role == Role::User) {
        out.pop();
    }
    out
}
