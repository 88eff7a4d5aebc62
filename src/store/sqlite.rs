use std::{str::FromStr, time::Duration};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    SqliteConnection, SqlitePool,
};
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::{
    db,
    model::{Contact, LastMessage, Message, NewMessage, RoomId, User},
};

use super::{Change, DocumentStore, StoreError};

type UserRow = (String, String, String, Option<String>);
type ContactRow = (String, String, String, Option<String>, String, Option<i64>, Option<String>, bool);
type MessageRow = (String, String, String, String, i64, bool);

const CONTACT_COLUMNS: &str =
    "uid, email, name, photo_url, last_message, last_message_at, last_message_sender, last_message_read";

/// SQLite-backed document store. Cheap to clone; clones share the pool and
/// the change bus.
#[derive(Clone)]
pub struct SqliteStore {
    db_pool: SqlitePool,
    changes: broadcast::Sender<Change>,
}

impl SqliteStore {
    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);

        // an in-memory database lives and dies with its single connection
        let pool_options = if database_url.contains(":memory:") {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None::<Duration>)
                .max_lifetime(None::<Duration>)
        } else {
            SqlitePoolOptions::new().max_connections(16)
        };

        let db_pool = pool_options.connect_with(options).await?;
        Self::new(db_pool).await
    }

    pub async fn new(db_pool: SqlitePool) -> Result<Self, StoreError> {
        db::migrate(&db_pool).await?;
        Ok(Self {
            db_pool,
            changes: broadcast::channel(256).0,
        })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.db_pool
    }

    fn notify(&self, change: Change) {
        let _ = self.changes.send(change);
    }
}

fn now_micros() -> i64 {
    Utc::now().timestamp_micros()
}

fn from_micros(micros: i64) -> Result<DateTime<Utc>, StoreError> {
    DateTime::from_timestamp_micros(micros)
        .ok_or_else(|| StoreError::Corrupt(format!("timestamp {micros} out of range")))
}

fn user_from_row((uid, email, name, photo_url): UserRow) -> User {
    User { uid, email, name, photo_url }
}

fn contact_from_row(row: ContactRow) -> Result<Contact, StoreError> {
    let (uid, email, name, photo_url, last_message, last_message_at, last_message_sender, last_message_read) = row;
    Ok(Contact {
        uid,
        email,
        name,
        photo_url,
        last_message,
        last_message_at: last_message_at.map(from_micros).transpose()?,
        last_message_sender,
        last_message_read,
    })
}

fn message_from_row((id, sender_id, receiver_id, text, sent_at, read): MessageRow) -> Result<Message, StoreError> {
    Ok(Message {
        id: Uuid::parse_str(&id).map_err(|_| StoreError::Corrupt(format!("message id {id}")))?,
        sender_id,
        receiver_id,
        text,
        sent_at: from_micros(sent_at)?,
        read,
    })
}

async fn append_message_on(conn: &mut SqliteConnection, room: &RoomId, message: &NewMessage) -> Result<Message, StoreError> {
    // server timestamp, strictly after the newest message already in the room
    let (sent_at,): (i64,) = sqlx::query_as(
        "INSERT INTO messages (id, room_id, sender_id, receiver_id, text, sent_at, is_read)
         VALUES (?, ?, ?, ?, ?, MAX(?, COALESCE((SELECT MAX(sent_at) + 1 FROM messages WHERE room_id = ?), 0)), 0)
         RETURNING sent_at",
    )
    .bind(message.id.to_string())
    .bind(room.as_str())
    .bind(message.sender_id.as_str())
    .bind(message.receiver_id.as_str())
    .bind(message.text.as_str())
    .bind(now_micros())
    .bind(room.as_str())
    .fetch_one(&mut *conn)
    .await?;

    Ok(Message {
        id: message.id,
        sender_id: message.sender_id.clone(),
        receiver_id: message.receiver_id.clone(),
        text: message.text.clone(),
        sent_at: from_micros(sent_at)?,
        read: false,
    })
}

async fn upsert_summary_on(
    conn: &mut SqliteConnection,
    owner: &str,
    counterpart: &str,
    summary: &LastMessage,
    at: i64,
) -> Result<(), StoreError> {
    // concurrent first writes for the same pair resolve last-write-wins
    let upserted = sqlx::query(
        "INSERT INTO contacts (owner, uid, email, name, photo_url, last_message, last_message_at, last_message_sender, last_message_read)
         SELECT ?, uid, email, name, photo_url, ?, ?, ?, ? FROM users WHERE uid = ?
         ON CONFLICT (owner, uid) DO UPDATE SET
             last_message = excluded.last_message,
             last_message_at = excluded.last_message_at,
             last_message_sender = excluded.last_message_sender,
             last_message_read = excluded.last_message_read",
    )
    .bind(owner)
    .bind(summary.text.as_str())
    .bind(at)
    .bind(summary.sender_id.as_str())
    .bind(summary.read)
    .bind(counterpart)
    .execute(&mut *conn)
    .await?;
    if upserted.rows_affected() > 0 {
        return Ok(());
    }

    // counterpart has no user document, but a record may already exist
    let updated = sqlx::query(
        "UPDATE contacts SET last_message = ?, last_message_at = ?, last_message_sender = ?, last_message_read = ?
         WHERE owner = ? AND uid = ?",
    )
    .bind(summary.text.as_str())
    .bind(at)
    .bind(summary.sender_id.as_str())
    .bind(summary.read)
    .bind(owner)
    .bind(counterpart)
    .execute(&mut *conn)
    .await?;
    if updated.rows_affected() == 0 {
        return Err(StoreError::NotFound(format!("user {counterpart}")));
    }

    Ok(())
}

#[async_trait]
impl DocumentStore for SqliteStore {
    fn changes(&self) -> broadcast::Receiver<Change> {
        self.changes.subscribe()
    }

    async fn get_user(&self, uid: &str) -> Result<Option<User>, StoreError> {
        let row: Option<UserRow> = sqlx::query_as("SELECT uid, email, name, photo_url FROM users WHERE uid = ?")
            .bind(uid)
            .fetch_optional(&self.db_pool)
            .await?;
        Ok(row.map(user_from_row))
    }

    async fn put_user(&self, user: &User) -> Result<(), StoreError> {
        sqlx::query("INSERT OR REPLACE INTO users (uid, email, name, photo_url) VALUES (?, ?, ?, ?)")
            .bind(user.uid.as_str())
            .bind(user.email.as_str())
            .bind(user.name.as_str())
            .bind(user.photo_url.as_deref())
            .execute(&self.db_pool)
            .await?;
        self.notify(Change::User { uid: user.uid.clone() });
        Ok(())
    }

    async fn update_user_profile(&self, uid: &str, name: &str, photo_url: Option<&str>) -> Result<(), StoreError> {
        let result = sqlx::query("UPDATE users SET name = ?, photo_url = ? WHERE uid = ?")
            .bind(name)
            .bind(photo_url)
            .bind(uid)
            .execute(&self.db_pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("user {uid}")));
        }
        self.notify(Change::User { uid: uid.to_owned() });
        Ok(())
    }

    async fn list_user_ids(&self) -> Result<Vec<String>, StoreError> {
        let rows: Vec<(String,)> = sqlx::query_as("SELECT uid FROM users ORDER BY uid")
            .fetch_all(&self.db_pool)
            .await?;
        Ok(rows.into_iter().map(|(uid,)| uid).collect())
    }

    async fn list_contacts(&self, owner: &str) -> Result<Vec<Contact>, StoreError> {
        let rows: Vec<ContactRow> =
            sqlx::query_as(&format!("SELECT {CONTACT_COLUMNS} FROM contacts WHERE owner = ? ORDER BY uid"))
                .bind(owner)
                .fetch_all(&self.db_pool)
                .await?;
        rows.into_iter().map(contact_from_row).collect()
    }

    async fn get_contact(&self, owner: &str, uid: &str) -> Result<Option<Contact>, StoreError> {
        let row: Option<ContactRow> =
            sqlx::query_as(&format!("SELECT {CONTACT_COLUMNS} FROM contacts WHERE owner = ? AND uid = ?"))
                .bind(owner)
                .bind(uid)
                .fetch_optional(&self.db_pool)
                .await?;
        row.map(contact_from_row).transpose()
    }

    async fn put_contact(&self, owner: &str, contact: &Contact) -> Result<(), StoreError> {
        sqlx::query(&format!(
            "INSERT OR REPLACE INTO contacts (owner, {CONTACT_COLUMNS}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)"
        ))
        .bind(owner)
        .bind(contact.uid.as_str())
        .bind(contact.email.as_str())
        .bind(contact.name.as_str())
        .bind(contact.photo_url.as_deref())
        .bind(contact.last_message.as_str())
        .bind(contact.last_message_at.map(|at| at.timestamp_micros()))
        .bind(contact.last_message_sender.as_deref())
        .bind(contact.last_message_read)
        .execute(&self.db_pool)
        .await?;
        self.notify(Change::Contacts { owner: owner.to_owned() });
        Ok(())
    }

    async fn upsert_summary(&self, owner: &str, counterpart: &str, summary: &LastMessage) -> Result<(), StoreError> {
        let mut conn = self.db_pool.acquire().await?;
        upsert_summary_on(&mut conn, owner, counterpart, summary, now_micros()).await?;
        self.notify(Change::Contacts { owner: owner.to_owned() });
        Ok(())
    }

    async fn mark_summary_read(&self, owner: &str, counterpart: &str) -> Result<(), StoreError> {
        let result = sqlx::query("UPDATE contacts SET last_message_read = 1 WHERE owner = ? AND uid = ?")
            .bind(owner)
            .bind(counterpart)
            .execute(&self.db_pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("contact {counterpart} of {owner}")));
        }
        self.notify(Change::Contacts { owner: owner.to_owned() });
        Ok(())
    }

    async fn owners_referencing(&self, uid: &str) -> Result<Vec<String>, StoreError> {
        let rows: Vec<(String,)> = sqlx::query_as("SELECT owner FROM contacts WHERE uid = ? ORDER BY owner")
            .bind(uid)
            .fetch_all(&self.db_pool)
            .await?;
        Ok(rows.into_iter().map(|(owner,)| owner).collect())
    }

    async fn update_contact_profile(&self, owner: &str, uid: &str, name: &str, photo_url: Option<&str>) -> Result<(), StoreError> {
        let result = sqlx::query("UPDATE contacts SET name = ?, photo_url = ? WHERE owner = ? AND uid = ?")
            .bind(name)
            .bind(photo_url)
            .bind(owner)
            .bind(uid)
            .execute(&self.db_pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("contact {uid} of {owner}")));
        }
        self.notify(Change::Contacts { owner: owner.to_owned() });
        Ok(())
    }

    async fn append_message(&self, room: &RoomId, message: &NewMessage) -> Result<Message, StoreError> {
        let mut conn = self.db_pool.acquire().await?;
        let message = append_message_on(&mut conn, room, message).await?;
        self.notify(Change::Room { room_id: room.clone() });
        Ok(message)
    }

    async fn list_messages(&self, room: &RoomId) -> Result<Vec<Message>, StoreError> {
        let rows: Vec<MessageRow> = sqlx::query_as(
            "SELECT id, sender_id, receiver_id, text, sent_at, is_read FROM messages
             WHERE room_id = ? ORDER BY sent_at DESC",
        )
        .bind(room.as_str())
        .fetch_all(&self.db_pool)
        .await?;
        rows.into_iter().map(message_from_row).collect()
    }

    async fn mark_read(&self, room: &RoomId, ids: &[Uuid]) -> Result<u64, StoreError> {
        if ids.is_empty() {
            return Ok(0);
        }

        let mut tx = self.db_pool.begin().await?;
        let mut flipped = 0;
        for id in ids {
            flipped += sqlx::query("UPDATE messages SET is_read = 1 WHERE id = ? AND room_id = ? AND is_read = 0")
                .bind(id.to_string())
                .bind(room.as_str())
                .execute(&mut *tx)
                .await?
                .rows_affected();
        }
        tx.commit().await?;

        if flipped > 0 {
            self.notify(Change::Room { room_id: room.clone() });
        }
        Ok(flipped)
    }

    async fn commit_message(&self, room: &RoomId, message: &NewMessage) -> Result<Message, StoreError> {
        let mut tx = self.db_pool.begin().await?;
        let committed = append_message_on(&mut tx, room, message).await?;

        let summary = LastMessage {
            text: committed.text.clone(),
            sender_id: committed.sender_id.clone(),
            read: false,
        };
        let at = committed.sent_at.timestamp_micros();
        upsert_summary_on(&mut tx, &message.receiver_id, &message.sender_id, &summary, at).await?;
        upsert_summary_on(&mut tx, &message.sender_id, &message.receiver_id, &summary, at).await?;
        tx.commit().await?;

        self.notify(Change::Room { room_id: room.clone() });
        self.notify(Change::Contacts { owner: message.receiver_id.clone() });
        self.notify(Change::Contacts { owner: message.sender_id.clone() });
        Ok(committed)
    }
}
