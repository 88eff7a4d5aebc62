use sqlx::SqlitePool;
use tracing::debug;

// Timestamps are unix microseconds. `contacts_by_uid` is the reverse index:
// which owners hold a copy of a given user's profile.
const SCHEMA: &[&str] = &[
    r#"CREATE TABLE IF NOT EXISTS users (
        uid TEXT PRIMARY KEY NOT NULL,
        email TEXT NOT NULL DEFAULT '',
        name TEXT NOT NULL DEFAULT '',
        photo_url TEXT
    )"#,
    r#"CREATE TABLE IF NOT EXISTS contacts (
        owner TEXT NOT NULL,
        uid TEXT NOT NULL,
        email TEXT NOT NULL DEFAULT '',
        name TEXT NOT NULL DEFAULT '',
        photo_url TEXT,
        last_message TEXT NOT NULL DEFAULT '',
        last_message_at INTEGER,
        last_message_sender TEXT,
        last_message_read INTEGER NOT NULL DEFAULT 0,
        PRIMARY KEY (owner, uid)
    )"#,
    "CREATE INDEX IF NOT EXISTS contacts_by_uid ON contacts (uid)",
    r#"CREATE TABLE IF NOT EXISTS messages (
        id TEXT PRIMARY KEY NOT NULL,
        room_id TEXT NOT NULL,
        sender_id TEXT NOT NULL,
        receiver_id TEXT NOT NULL,
        text TEXT NOT NULL,
        sent_at INTEGER NOT NULL,
        is_read INTEGER NOT NULL DEFAULT 0
    )"#,
    "CREATE INDEX IF NOT EXISTS messages_by_room ON messages (room_id, sent_at)",
];

pub async fn migrate(db_pool: &SqlitePool) -> Result<(), sqlx::Error> {
    for statement in SCHEMA {
        sqlx::query(statement).execute(db_pool).await?;
    }
    debug!("schema ready");
    Ok(())
}
