use anyhow::{Result, anyhow};
use rusqlite::{Connection, OptionalExtension, Row};
use uuid::Uuid;

use parlor_types::api::{CreateMessageRequest, UpdateMessageRequest};
use parlor_types::models::{Message, MessageView, RoomRef};

use super::rooms::touch_room;
use super::{enum_col, now, opt_uuid_col, user_summary_cols, uuid_col};
use crate::Database;

// JOIN users to fetch the author in the same query
const MESSAGE_VIEW_SELECT: &str = "
    SELECT m.id, m.content, m.user_id, m.chat_room_id, m.message_type, m.created_at, m.updated_at,
           u.id, u.username, u.avatar_url,
           r.id, r.name
    FROM messages m
    LEFT JOIN users u ON u.id = m.user_id
    LEFT JOIN chat_rooms r ON r.id = m.chat_room_id";

impl Database {
    /// Stores a message and bumps the owning room's `updated_at` in the same
    /// transaction.
    pub fn create_message(&self, req: &CreateMessageRequest) -> Result<MessageView> {
        let id = req.id.unwrap_or_else(Uuid::new_v4);
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let ts = now();

            tx.execute(
                "INSERT INTO messages (id, content, user_id, chat_room_id, message_type, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)",
                rusqlite::params![
                    id.to_string(),
                    req.content,
                    req.user_id.to_string(),
                    req.chat_room_id.to_string(),
                    req.message_type.unwrap_or_default().as_str(),
                    ts
                ],
            )?;
            touch_room(&tx, req.chat_room_id, &ts)?;

            let message = query_message(&tx, id)?
                .map(without_room)
                .ok_or_else(|| anyhow!("Message {} vanished after insert", id))?;
            tx.commit()?;
            Ok(message)
        })
    }

    /// One page of a room's messages. The page is taken from the newest end
    /// (`offset` counts back from the latest message) and returned oldest first.
    pub fn list_messages(&self, chat_room_id: Uuid, limit: u32, offset: u32) -> Result<Vec<MessageView>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "{MESSAGE_VIEW_SELECT}
                 WHERE m.chat_room_id = ?1
                 ORDER BY m.created_at DESC, m.rowid DESC
                 LIMIT ?2 OFFSET ?3"
            ))?;
            let mut rows = stmt
                .query_map(rusqlite::params![chat_room_id.to_string(), limit, offset], |row| {
                    message_view_from_row(row).map(without_room)
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            rows.reverse();
            Ok(rows)
        })
    }

    /// The `limit` most recent messages of a room, oldest first, skipping
    /// `exclude`. Feeds the assistant's conversation history.
    pub fn recent_messages(&self, chat_room_id: Uuid, limit: u32, exclude: Option<Uuid>) -> Result<Vec<Message>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, content, user_id, chat_room_id, message_type, created_at, updated_at
                 FROM messages
                 WHERE chat_room_id = ?1 AND (?2 IS NULL OR id != ?2)
                 ORDER BY created_at DESC, rowid DESC
                 LIMIT ?3",
            )?;
            let mut rows = stmt
                .query_map(
                    rusqlite::params![chat_room_id.to_string(), exclude.map(|id| id.to_string()), limit],
                    message_from_row,
                )?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            rows.reverse();
            Ok(rows)
        })
    }

    /// A single message with its author and room.
    pub fn get_message(&self, id: Uuid) -> Result<Option<MessageView>> {
        self.with_conn(|conn| query_message(conn, id))
    }

    pub fn update_message(&self, id: Uuid, req: &UpdateMessageRequest) -> Result<Option<MessageView>> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE messages
                 SET content = COALESCE(?2, content),
                     message_type = COALESCE(?3, message_type),
                     updated_at = ?4
                 WHERE id = ?1",
                rusqlite::params![
                    id.to_string(),
                    req.content,
                    req.message_type.map(|t| t.as_str()),
                    now()
                ],
            )?;
            if changed == 0 {
                return Ok(None);
            }
            Ok(query_message(conn, id)?.map(without_room))
        })
    }

    /// Deletes a message, returning the room it belonged to.
    pub fn delete_message(&self, id: Uuid) -> Result<Option<Uuid>> {
        self.with_conn(|conn| {
            let room = conn
                .query_row(
                    "DELETE FROM messages WHERE id = ?1 RETURNING chat_room_id",
                    [id.to_string()],
                    |row| uuid_col(row, 0),
                )
                .optional()?;
            Ok(room)
        })
    }
}

fn query_message(conn: &Connection, id: Uuid) -> Result<Option<MessageView>> {
    let mut stmt = conn.prepare(&format!("{MESSAGE_VIEW_SELECT} WHERE m.id = ?1"))?;
    let row = stmt.query_row([id.to_string()], message_view_from_row).optional()?;
    Ok(row)
}

fn without_room(mut view: MessageView) -> MessageView {
    view.chat_room = None;
    view
}

fn message_from_row(row: &Row<'_>) -> rusqlite::Result<Message> {
    Ok(Message {
        id: uuid_col(row, 0)?,
        content: row.get(1)?,
        user_id: uuid_col(row, 2)?,
        chat_room_id: uuid_col(row, 3)?,
        message_type: enum_col(row, 4)?,
        created_at: row.get(5)?,
        updated_at: row.get(6)?,
    })
}

fn message_view_from_row(row: &Row<'_>) -> rusqlite::Result<MessageView> {
    let chat_room = match opt_uuid_col(row, 10)? {
        Some(id) => Some(RoomRef { id, name: row.get(11)? }),
        None => None,
    };
    Ok(MessageView {
        message: message_from_row(row)?,
        user: user_summary_cols(row, 7)?,
        chat_room,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use parlor_types::AI_USER_ID;
    use parlor_types::api::{CreateChatRoomRequest, CreateUserRequest};
    use parlor_types::models::MessageType;

    fn setup() -> (Database, Uuid, Uuid) {
        let db = Database::open_in_memory().unwrap();
        let user = db
            .create_user(&CreateUserRequest {
                id: None,
                email: "dana@example.com".into(),
                username: "dana".into(),
                avatar_url: None,
            })
            .unwrap();
        let room = db
            .create_chat_room(&CreateChatRoomRequest {
                id: None,
                name: "lobby".into(),
                description: None,
                created_by: user.id,
            })
            .unwrap();
        (db, user.id, room.id)
    }

    fn text(room: Uuid, author: Uuid, content: &str) -> CreateMessageRequest {
        CreateMessageRequest {
            id: None,
            content: content.into(),
            user_id: author,
            chat_room_id: room,
            message_type: None,
        }
    }

    #[test]
    fn posting_bumps_room_updated_at() {
        let (db, user, room) = setup();
        db.with_conn(|conn| {
            conn.execute(
                "UPDATE chat_rooms SET updated_at = '2000-01-01T00:00:00.000000Z' WHERE id = ?1",
                [room.to_string()],
            )?;
            Ok(())
        })
        .unwrap();
        let before = db.get_chat_room(room).unwrap().unwrap().room.updated_at;

        let posted = db.create_message(&text(room, user, "hello")).unwrap();

        let after = db.get_chat_room(room).unwrap().unwrap();
        assert!(after.room.updated_at > before);
        assert_eq!(after.room.updated_at, posted.message.created_at);
        assert_eq!(after.message_count, 1);
        assert_eq!(posted.message.message_type, MessageType::Text);
        assert_eq!(posted.user.unwrap().username, "dana");
    }

    #[test]
    fn message_in_unknown_room_is_rejected() {
        let (db, user, _room) = setup();
        assert!(db.create_message(&text(Uuid::new_v4(), user, "lost")).is_err());
    }

    #[test]
    fn pages_are_oldest_first_from_the_newest_end() {
        let (db, user, room) = setup();
        for i in 0..5 {
            db.create_message(&text(room, user, &format!("m{}", i))).unwrap();
        }

        let page: Vec<String> = db
            .list_messages(room, 2, 0)
            .unwrap()
            .into_iter()
            .map(|m| m.message.content)
            .collect();
        assert_eq!(page, vec!["m3", "m4"]);

        let older: Vec<String> = db
            .list_messages(room, 2, 2)
            .unwrap()
            .into_iter()
            .map(|m| m.message.content)
            .collect();
        assert_eq!(older, vec!["m1", "m2"]);
    }

    #[test]
    fn recent_messages_skip_the_trigger() {
        let (db, user, room) = setup();
        db.create_message(&text(room, user, "question")).unwrap();
        db.create_message(&text(room, AI_USER_ID, "answer")).unwrap();
        let trigger = db.create_message(&text(room, user, "follow-up")).unwrap();

        let history = db.recent_messages(room, 10, Some(trigger.message.id)).unwrap();
        let contents: Vec<&str> = history.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["question", "answer"]);
        assert_eq!(db.recent_messages(room, 1, None).unwrap()[0].content, "follow-up");
    }

    #[test]
    fn get_update_delete() {
        let (db, user, room) = setup();
        let posted = db.create_message(&text(room, user, "draft")).unwrap();

        let fetched = db.get_message(posted.message.id).unwrap().unwrap();
        assert_eq!(fetched.chat_room.unwrap().name, "lobby");

        let edited = db
            .update_message(
                posted.message.id,
                &UpdateMessageRequest {
                    content: Some("final".into()),
                    message_type: None,
                },
            )
            .unwrap()
            .unwrap();
        assert_eq!(edited.message.content, "final");

        assert_eq!(db.delete_message(posted.message.id).unwrap(), Some(room));
        assert_eq!(db.delete_message(posted.message.id).unwrap(), None);
        assert!(db.get_message(posted.message.id).unwrap().is_none());
    }
}
