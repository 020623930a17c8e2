use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::MessageView;

/// Events pushed over the realtime WebSocket.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum GatewayEvent {
    /// Sent once after the socket is accepted
    Ready { connection_id: Uuid },

    /// A message row was inserted
    MessageCreate { message: MessageView },

    /// A message row was edited
    MessageUpdate { message: MessageView },

    /// A message row was removed
    MessageDelete { id: Uuid, chat_room_id: Uuid },
}

impl GatewayEvent {
    /// Room the event belongs to. `None` means the event is connection-level
    /// and is never broadcast.
    pub fn chat_room_id(&self) -> Option<Uuid> {
        match self {
            Self::MessageCreate { message } | Self::MessageUpdate { message } => {
                Some(message.message.chat_room_id)
            }
            Self::MessageDelete { chat_room_id, .. } => Some(*chat_room_id),
            Self::Ready { .. } => None,
        }
    }
}

/// Commands sent from client to server.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum GatewayCommand {
    /// Start receiving message events for these rooms
    Subscribe { chat_room_ids: Vec<Uuid> },

    /// Stop receiving message events for these rooms
    Unsubscribe { chat_room_ids: Vec<Uuid> },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commands_are_tagged() {
        let room = Uuid::new_v4();
        let raw = format!(r#"{{"type":"Subscribe","data":{{"chat_room_ids":["{}"]}}}}"#, room);
        match serde_json::from_str::<GatewayCommand>(&raw).unwrap() {
            GatewayCommand::Subscribe { chat_room_ids } => assert_eq!(chat_room_ids, vec![room]),
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn delete_event_is_scoped_to_its_room() {
        let room = Uuid::new_v4();
        let event = GatewayEvent::MessageDelete { id: Uuid::new_v4(), chat_room_id: room };
        assert_eq!(event.chat_room_id(), Some(room));
        assert_eq!(GatewayEvent::Ready { connection_id: Uuid::nil() }.chat_room_id(), None);
    }
}
