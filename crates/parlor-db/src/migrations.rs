use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

use crate::queries::users::ensure_assistant_user;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version: i64 =
        conn.query_row("SELECT COALESCE(MAX(version), 0) FROM schema_version", [], |r| r.get(0))?;

    if version < 1 {
        info!("Running migration v1 (initial schema)");
        conn.execute_batch(
            "
            CREATE TABLE users (
                id          TEXT PRIMARY KEY,
                email       TEXT NOT NULL UNIQUE,
                username    TEXT NOT NULL,
                avatar_url  TEXT,
                created_at  TEXT NOT NULL,
                updated_at  TEXT NOT NULL
            );

            CREATE TABLE chat_rooms (
                id          TEXT PRIMARY KEY,
                name        TEXT NOT NULL,
                description TEXT,
                created_by  TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                created_at  TEXT NOT NULL,
                updated_at  TEXT NOT NULL
            );

            CREATE INDEX idx_chat_rooms_updated
                ON chat_rooms(updated_at);

            CREATE TABLE chat_room_members (
                id            TEXT PRIMARY KEY,
                chat_room_id  TEXT NOT NULL REFERENCES chat_rooms(id) ON DELETE CASCADE,
                user_id       TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                role          TEXT NOT NULL DEFAULT 'member' CHECK (role IN ('admin', 'member')),
                joined_at     TEXT NOT NULL,
                UNIQUE(chat_room_id, user_id)
            );

            CREATE INDEX idx_members_user
                ON chat_room_members(user_id);

            CREATE TABLE messages (
                id            TEXT PRIMARY KEY,
                content       TEXT NOT NULL,
                user_id       TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                chat_room_id  TEXT NOT NULL REFERENCES chat_rooms(id) ON DELETE CASCADE,
                message_type  TEXT NOT NULL DEFAULT 'text' CHECK (message_type IN ('text', 'image', 'file')),
                created_at    TEXT NOT NULL,
                updated_at    TEXT NOT NULL
            );

            CREATE INDEX idx_messages_room
                ON messages(chat_room_id, created_at);

            INSERT INTO schema_version (version) VALUES (1);
            ",
        )?;

        // Seeded with the schema so nobody can register its email first.
        ensure_assistant_user(conn)?;
    }

    info!("Database migrations complete");
    Ok(())
}
