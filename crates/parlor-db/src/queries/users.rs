use anyhow::Result;
use rusqlite::{Connection, OptionalExtension, Row};
use tracing::info;
use uuid::Uuid;

use parlor_types::api::{CreateUserRequest, UpdateUserRequest};
use parlor_types::models::User;
use parlor_types::{AI_USER_EMAIL, AI_USER_ID, AI_USER_USERNAME};

use super::{now, uuid_col};
use crate::Database;

const USER_COLUMNS: &str = "id, email, username, avatar_url, created_at, updated_at";

impl Database {
    pub fn create_user(&self, req: &CreateUserRequest) -> Result<User> {
        let id = req.id.unwrap_or_else(Uuid::new_v4);
        self.with_conn(|conn| {
            let ts = now();
            conn.execute(
                "INSERT INTO users (id, email, username, avatar_url, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
                rusqlite::params![id.to_string(), req.email, req.username, req.avatar_url, ts],
            )?;
            query_user(conn, id)?.ok_or_else(|| anyhow::anyhow!("User {} vanished after insert", id))
        })
    }

    /// All users, newest first. `email` narrows to an exact match, which is
    /// how the sign-in screen finds an existing account.
    pub fn list_users(&self, email: Option<&str>) -> Result<Vec<User>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {USER_COLUMNS} FROM users
                 WHERE ?1 IS NULL OR email = ?1
                 ORDER BY created_at DESC"
            ))?;
            let rows = stmt
                .query_map([email], user_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn get_user(&self, id: Uuid) -> Result<Option<User>> {
        self.with_conn(|conn| query_user(conn, id))
    }

    /// Applies the fields present in `req`. Returns `None` when no row has `id`.
    pub fn update_user(&self, id: Uuid, req: &UpdateUserRequest) -> Result<Option<User>> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE users
                 SET email = COALESCE(?2, email),
                     username = COALESCE(?3, username),
                     avatar_url = CASE WHEN ?4 THEN ?5 ELSE avatar_url END,
                     updated_at = ?6
                 WHERE id = ?1",
                rusqlite::params![
                    id.to_string(),
                    req.email,
                    req.username,
                    req.avatar_url.is_some(),
                    req.avatar_url.clone().flatten(),
                    now()
                ],
            )?;
            if changed == 0 {
                return Ok(None);
            }
            query_user(conn, id)
        })
    }

    pub fn delete_user(&self, id: Uuid) -> Result<bool> {
        self.with_conn(|conn| {
            let removed = conn.execute("DELETE FROM users WHERE id = ?1", [id.to_string()])?;
            Ok(removed > 0)
        })
    }

    /// Recreates the AI pseudo-user if it was deleted. Migrations seed it.
    pub fn ensure_assistant_user(&self) -> Result<()> {
        self.with_conn(ensure_assistant_user)
    }
}

pub(crate) fn ensure_assistant_user(conn: &Connection) -> Result<()> {
    let ts = now();
    let inserted = conn.execute(
        "INSERT INTO users (id, email, username, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?4)
         ON CONFLICT DO NOTHING",
        rusqlite::params![AI_USER_ID.to_string(), AI_USER_EMAIL, AI_USER_USERNAME, ts],
    )?;
    if inserted > 0 {
        info!("Created AI assistant user {}", AI_USER_ID);
    }
    Ok(())
}

fn query_user(conn: &Connection, id: Uuid) -> Result<Option<User>> {
    let mut stmt = conn.prepare(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"))?;
    let row = stmt.query_row([id.to_string()], user_from_row).optional()?;
    Ok(row)
}

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: uuid_col(row, 0)?,
        email: row.get(1)?,
        username: row.get(2)?,
        avatar_url: row.get(3)?,
        created_at: row.get(4)?,
        updated_at: row.get(5)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_user(email: &str, username: &str) -> CreateUserRequest {
        CreateUserRequest {
            id: None,
            email: email.into(),
            username: username.into(),
            avatar_url: None,
        }
    }

    #[test]
    fn create_then_lookup_by_email() {
        let db = Database::open_in_memory().unwrap();
        let alice = db.create_user(&new_user("alice@example.com", "alice")).unwrap();
        db.create_user(&new_user("bob@example.com", "bob")).unwrap();

        let found = db.list_users(Some("alice@example.com")).unwrap();
        assert_eq!(found, vec![alice.clone()]);
        // Plus the assistant, seeded by migrations.
        assert_eq!(db.list_users(None).unwrap().len(), 3);
        assert!(db.list_users(Some("nobody@example.com")).unwrap().is_empty());
        assert_eq!(db.get_user(alice.id).unwrap(), Some(alice));
    }

    #[test]
    fn duplicate_email_is_rejected() {
        let db = Database::open_in_memory().unwrap();
        db.create_user(&new_user("dup@example.com", "one")).unwrap();
        assert!(db.create_user(&new_user("dup@example.com", "two")).is_err());
    }

    #[test]
    fn partial_update_keeps_other_fields() {
        let db = Database::open_in_memory().unwrap();
        let user = db.create_user(&new_user("carol@example.com", "carol")).unwrap();

        let updated = db
            .update_user(
                user.id,
                &UpdateUserRequest {
                    avatar_url: Some(Some("https://img.example.com/c.png".into())),
                    ..Default::default()
                },
            )
            .unwrap()
            .unwrap();

        assert_eq!(updated.username, "carol");
        assert_eq!(updated.avatar_url.as_deref(), Some("https://img.example.com/c.png"));
        assert!(updated.updated_at >= user.updated_at);
        assert!(db.update_user(Uuid::new_v4(), &UpdateUserRequest::default()).unwrap().is_none());

        let cleared = db
            .update_user(
                user.id,
                &UpdateUserRequest {
                    avatar_url: Some(None),
                    ..Default::default()
                },
            )
            .unwrap()
            .unwrap();
        assert_eq!(cleared.avatar_url, None);
        assert_eq!(cleared.username, "carol");
    }

    #[test]
    fn assistant_user_exists_from_the_start() {
        let db = Database::open_in_memory().unwrap();
        let ai = db.get_user(AI_USER_ID).unwrap().unwrap();
        assert_eq!(ai.username, AI_USER_USERNAME);
        assert_eq!(ai.email, AI_USER_EMAIL);

        db.ensure_assistant_user().unwrap();
        assert_eq!(db.list_users(Some(AI_USER_EMAIL)).unwrap().len(), 1);
    }

    #[test]
    fn assistant_user_comes_back_after_delete() {
        let db = Database::open_in_memory().unwrap();
        assert!(db.delete_user(AI_USER_ID).unwrap());
        assert!(!db.delete_user(AI_USER_ID).unwrap());

        db.ensure_assistant_user().unwrap();
        db.ensure_assistant_user().unwrap();
        assert!(db.get_user(AI_USER_ID).unwrap().is_some());
    }
}
