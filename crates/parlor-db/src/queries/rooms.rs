use anyhow::{Result, anyhow};
use rusqlite::{Connection, OptionalExtension, Row};
use uuid::Uuid;

use parlor_types::AI_USER_ID;
use parlor_types::api::{CreateChatRoomRequest, UpdateChatRoomRequest};
use parlor_types::models::{ChatRoom, ChatRoomView, MemberRole};

use super::members::{insert_member, members_for_rooms};
use super::users::ensure_assistant_user;
use super::{now, user_summary_cols, uuid_col};
use crate::Database;

const ROOM_COLUMNS: &str = "id, name, description, created_by, created_at, updated_at";

// Room row, creator, and message count in one pass.
const ROOM_VIEW_SELECT: &str = "
    SELECT r.id, r.name, r.description, r.created_by, r.created_at, r.updated_at,
           u.id, u.username, u.avatar_url,
           (SELECT COUNT(*) FROM messages m WHERE m.chat_room_id = r.id)
    FROM chat_rooms r
    LEFT JOIN users u ON u.id = r.created_by";

impl Database {
    /// Inserts the room, makes the creator its admin, and adds the AI
    /// pseudo-user (created on demand) as a regular member. All or nothing.
    pub fn create_chat_room(&self, req: &CreateChatRoomRequest) -> Result<ChatRoom> {
        let id = req.id.unwrap_or_else(Uuid::new_v4);
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let ts = now();

            tx.execute(
                "INSERT INTO chat_rooms (id, name, description, created_by, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
                rusqlite::params![id.to_string(), req.name, req.description, req.created_by.to_string(), ts],
            )?;

            insert_member(&tx, id, req.created_by, MemberRole::Admin)?;

            if req.created_by != AI_USER_ID {
                ensure_assistant_user(&tx)?;
                insert_member(&tx, id, AI_USER_ID, MemberRole::Member)?;
            }

            let room = query_room(&tx, id)?.ok_or_else(|| anyhow!("Chat room {} vanished after insert", id))?;
            tx.commit()?;
            Ok(room)
        })
    }

    /// Rooms ordered by most recent activity. With `member`, only rooms that
    /// user belongs to.
    pub fn list_chat_rooms(&self, member: Option<Uuid>) -> Result<Vec<ChatRoomView>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "{ROOM_VIEW_SELECT}
                 WHERE ?1 IS NULL
                    OR r.id IN (SELECT chat_room_id FROM chat_room_members WHERE user_id = ?1)
                 ORDER BY r.updated_at DESC"
            ))?;
            let mut rooms = stmt
                .query_map([member.map(|m| m.to_string())], room_view_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            let ids: Vec<Uuid> = rooms.iter().map(|r| r.room.id).collect();
            let mut members = members_for_rooms(conn, &ids)?;
            for view in &mut rooms {
                view.members = members.remove(&view.room.id).unwrap_or_default();
            }
            Ok(rooms)
        })
    }

    pub fn get_chat_room(&self, id: Uuid) -> Result<Option<ChatRoomView>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!("{ROOM_VIEW_SELECT} WHERE r.id = ?1"))?;
            let Some(mut view) = stmt.query_row([id.to_string()], room_view_from_row).optional()? else {
                return Ok(None);
            };
            view.members = members_for_rooms(conn, &[id])?.remove(&id).unwrap_or_default();
            Ok(Some(view))
        })
    }

    pub fn update_chat_room(&self, id: Uuid, req: &UpdateChatRoomRequest) -> Result<Option<ChatRoom>> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE chat_rooms
                 SET name = COALESCE(?2, name),
                     description = CASE WHEN ?3 THEN ?4 ELSE description END,
                     updated_at = ?5
                 WHERE id = ?1",
                rusqlite::params![
                    id.to_string(),
                    req.name,
                    req.description.is_some(),
                    req.description.clone().flatten(),
                    now()
                ],
            )?;
            if changed == 0 {
                return Ok(None);
            }
            query_room(conn, id)
        })
    }

    pub fn delete_chat_room(&self, id: Uuid) -> Result<bool> {
        self.with_conn(|conn| {
            let removed = conn.execute("DELETE FROM chat_rooms WHERE id = ?1", [id.to_string()])?;
            Ok(removed > 0)
        })
    }
}

/// Bumps `updated_at` so the room sorts to the top of the list.
pub(crate) fn touch_room(conn: &Connection, id: Uuid, ts: &str) -> Result<()> {
    conn.execute(
        "UPDATE chat_rooms SET updated_at = ?2 WHERE id = ?1",
        rusqlite::params![id.to_string(), ts],
    )?;
    Ok(())
}

fn query_room(conn: &Connection, id: Uuid) -> Result<Option<ChatRoom>> {
    let mut stmt = conn.prepare(&format!("SELECT {ROOM_COLUMNS} FROM chat_rooms WHERE id = ?1"))?;
    let row = stmt.query_row([id.to_string()], room_from_row).optional()?;
    Ok(row)
}

fn room_from_row(row: &Row<'_>) -> rusqlite::Result<ChatRoom> {
    Ok(ChatRoom {
        id: uuid_col(row, 0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        created_by: uuid_col(row, 3)?,
        created_at: row.get(4)?,
        updated_at: row.get(5)?,
    })
}

fn room_view_from_row(row: &Row<'_>) -> rusqlite::Result<ChatRoomView> {
    Ok(ChatRoomView {
        room: room_from_row(row)?,
        created_by_user: user_summary_cols(row, 6)?,
        members: Vec::new(),
        message_count: row.get(9)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use parlor_types::api::CreateUserRequest;

    fn seed_user(db: &Database, name: &str) -> Uuid {
        db.create_user(&CreateUserRequest {
            id: None,
            email: format!("{}@example.com", name),
            username: name.into(),
            avatar_url: None,
        })
        .unwrap()
        .id
    }

    fn new_room(name: &str, creator: Uuid) -> CreateChatRoomRequest {
        CreateChatRoomRequest {
            id: None,
            name: name.into(),
            description: None,
            created_by: creator,
        }
    }

    #[test]
    fn creating_a_room_adds_creator_and_assistant() {
        let db = Database::open_in_memory().unwrap();
        let alice = seed_user(&db, "alice");

        let room = db.create_chat_room(&new_room("general", alice)).unwrap();
        let view = db.get_chat_room(room.id).unwrap().unwrap();

        assert_eq!(view.members.len(), 2);
        let creator = view.members.iter().find(|m| m.member.user_id == alice).unwrap();
        assert_eq!(creator.member.role, MemberRole::Admin);
        let ai = view.members.iter().find(|m| m.member.user_id == AI_USER_ID).unwrap();
        assert_eq!(ai.member.role, MemberRole::Member);
        assert_eq!(ai.user.as_ref().unwrap().username, "AI Assistant");
        assert_eq!(view.created_by_user.unwrap().username, "alice");
        assert_eq!(view.message_count, 0);
    }

    #[test]
    fn unknown_creator_leaves_nothing_behind() {
        let db = Database::open_in_memory().unwrap();
        assert!(db.create_chat_room(&new_room("orphan", Uuid::new_v4())).is_err());
        assert!(db.list_chat_rooms(None).unwrap().is_empty());
    }

    #[test]
    fn list_filters_by_membership() {
        let db = Database::open_in_memory().unwrap();
        let alice = seed_user(&db, "alice");
        let bob = seed_user(&db, "bob");
        let carol = seed_user(&db, "carol");

        db.create_chat_room(&new_room("a", alice)).unwrap();
        db.create_chat_room(&new_room("b", bob)).unwrap();

        let alices: Vec<String> = db
            .list_chat_rooms(Some(alice))
            .unwrap()
            .into_iter()
            .map(|r| r.room.name)
            .collect();
        assert_eq!(alices, vec!["a".to_string()]);
        assert_eq!(db.list_chat_rooms(Some(AI_USER_ID)).unwrap().len(), 2);
        assert!(db.list_chat_rooms(Some(carol)).unwrap().is_empty());
        assert_eq!(db.list_chat_rooms(None).unwrap().len(), 2);
    }

    #[test]
    fn update_and_delete() {
        let db = Database::open_in_memory().unwrap();
        let alice = seed_user(&db, "alice");
        let mut req = new_room("before", alice);
        req.description = Some("old topic".into());
        let room = db.create_chat_room(&req).unwrap();

        let renamed = db
            .update_chat_room(
                room.id,
                &UpdateChatRoomRequest {
                    name: Some("after".into()),
                    description: None,
                },
            )
            .unwrap()
            .unwrap();
        assert_eq!(renamed.name, "after");
        assert_eq!(renamed.description.as_deref(), Some("old topic"));

        let cleared = db
            .update_chat_room(
                room.id,
                &UpdateChatRoomRequest {
                    name: None,
                    description: Some(None),
                },
            )
            .unwrap()
            .unwrap();
        assert_eq!(cleared.name, "after");
        assert_eq!(cleared.description, None);

        assert!(db.delete_chat_room(room.id).unwrap());
        assert!(db.get_chat_room(room.id).unwrap().is_none());
        assert!(db.list_members(room.id).unwrap().is_empty());
    }
}
