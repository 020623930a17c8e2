use std::collections::HashMap;

use anyhow::{Result, anyhow};
use rusqlite::{Connection, OptionalExtension, Row};
use uuid::Uuid;

use parlor_types::api::AddMemberRequest;
use parlor_types::models::{ChatRoomMember, MemberRole, MemberView};

use super::{enum_col, now, placeholders, user_summary_cols, uuid_col};
use crate::Database;

const MEMBER_VIEW_SELECT: &str = "
    SELECT cm.id, cm.chat_room_id, cm.user_id, cm.role, cm.joined_at,
           u.id, u.username, u.avatar_url, u.email
    FROM chat_room_members cm
    LEFT JOIN users u ON u.id = cm.user_id";

impl Database {
    /// Members of a room in the order they joined.
    pub fn list_members(&self, chat_room_id: Uuid) -> Result<Vec<MemberView>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "{MEMBER_VIEW_SELECT}
                 WHERE cm.chat_room_id = ?1
                 ORDER BY cm.joined_at ASC, cm.rowid ASC"
            ))?;
            let rows = stmt
                .query_map([chat_room_id.to_string()], member_view_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn add_member(&self, chat_room_id: Uuid, req: &AddMemberRequest) -> Result<MemberView> {
        self.with_conn(|conn| {
            insert_member(conn, chat_room_id, req.user_id, req.role.unwrap_or_default())?;
            query_member(conn, chat_room_id, req.user_id)?
                .ok_or_else(|| anyhow!("Membership {}/{} vanished after insert", chat_room_id, req.user_id))
        })
    }

    pub fn update_member_role(
        &self,
        chat_room_id: Uuid,
        user_id: Uuid,
        role: MemberRole,
    ) -> Result<Option<MemberView>> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE chat_room_members SET role = ?3 WHERE chat_room_id = ?1 AND user_id = ?2",
                rusqlite::params![chat_room_id.to_string(), user_id.to_string(), role.as_str()],
            )?;
            if changed == 0 {
                return Ok(None);
            }
            query_member(conn, chat_room_id, user_id)
        })
    }

    pub fn remove_member(&self, chat_room_id: Uuid, user_id: Uuid) -> Result<bool> {
        self.with_conn(|conn| {
            let removed = conn.execute(
                "DELETE FROM chat_room_members WHERE chat_room_id = ?1 AND user_id = ?2",
                [chat_room_id.to_string(), user_id.to_string()],
            )?;
            Ok(removed > 0)
        })
    }
}

pub(crate) fn insert_member(
    conn: &Connection,
    chat_room_id: Uuid,
    user_id: Uuid,
    role: MemberRole,
) -> Result<()> {
    conn.execute(
        "INSERT INTO chat_room_members (id, chat_room_id, user_id, role, joined_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        rusqlite::params![
            Uuid::new_v4().to_string(),
            chat_room_id.to_string(),
            user_id.to_string(),
            role.as_str(),
            now()
        ],
    )?;
    Ok(())
}

/// Batch-fetch members for a set of rooms, grouped by room id.
pub(crate) fn members_for_rooms(
    conn: &Connection,
    room_ids: &[Uuid],
) -> Result<HashMap<Uuid, Vec<MemberView>>> {
    let mut grouped: HashMap<Uuid, Vec<MemberView>> = HashMap::new();
    if room_ids.is_empty() {
        return Ok(grouped);
    }

    let sql = format!(
        "{MEMBER_VIEW_SELECT}
         WHERE cm.chat_room_id IN ({})
         ORDER BY cm.joined_at ASC, cm.rowid ASC",
        placeholders(room_ids.len())
    );
    let mut stmt = conn.prepare(&sql)?;
    let ids: Vec<String> = room_ids.iter().map(Uuid::to_string).collect();
    let rows = stmt
        .query_map(rusqlite::params_from_iter(ids.iter()), member_view_from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    for view in rows {
        grouped.entry(view.member.chat_room_id).or_default().push(view);
    }
    Ok(grouped)
}

fn query_member(conn: &Connection, chat_room_id: Uuid, user_id: Uuid) -> Result<Option<MemberView>> {
    let mut stmt = conn.prepare(&format!(
        "{MEMBER_VIEW_SELECT} WHERE cm.chat_room_id = ?1 AND cm.user_id = ?2"
    ))?;
    let row = stmt
        .query_row([chat_room_id.to_string(), user_id.to_string()], member_view_from_row)
        .optional()?;
    Ok(row)
}

fn member_view_from_row(row: &Row<'_>) -> rusqlite::Result<MemberView> {
    let member = ChatRoomMember {
        id: uuid_col(row, 0)?,
        chat_room_id: uuid_col(row, 1)?,
        user_id: uuid_col(row, 2)?,
        role: enum_col(row, 3)?,
        joined_at: row.get(4)?,
    };
    let user = user_summary_cols(row, 5)?
        .map(|summary| -> rusqlite::Result<_> {
            Ok(parlor_types::models::UserSummary {
                email: row.get(8)?,
                ..summary
            })
        })
        .transpose()?;
    Ok(MemberView { member, user })
}
