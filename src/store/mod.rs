//! Document store collaborator.
//!
//! Collections are laid out as `users`, `users/{owner}/contacts`
//! and `chats/{room}/messages`. Every committed write is announced on the
//! change bus so realtime mirrors can re-read their snapshot.

mod sqlite;

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::model::{Contact, LastMessage, Message, NewMessage, RoomId, User};

pub use sqlite::SqliteStore;

pub type Store = Arc<dyn DocumentStore>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("{0} not found")]
    NotFound(String),

    #[error("corrupt record: {0}")]
    Corrupt(String),
}

/// Which collection a committed write touched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Change {
    User { uid: String },
    Contacts { owner: String },
    Room { room_id: RoomId },
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    fn changes(&self) -> broadcast::Receiver<Change>;

    async fn get_user(&self, uid: &str) -> Result<Option<User>, StoreError>;
    async fn put_user(&self, user: &User) -> Result<(), StoreError>;
    async fn update_user_profile(&self, uid: &str, name: &str, photo_url: Option<&str>) -> Result<(), StoreError>;
    async fn list_user_ids(&self) -> Result<Vec<String>, StoreError>;

    async fn list_contacts(&self, owner: &str) -> Result<Vec<Contact>, StoreError>;
    async fn get_contact(&self, owner: &str, uid: &str) -> Result<Option<Contact>, StoreError>;
    /// Overwrites the whole record.
    async fn put_contact(&self, owner: &str, contact: &Contact) -> Result<(), StoreError>;
    /// Writes the last-message fields with a server timestamp, creating the
    /// record from the counterpart's user document if it does not exist.
    async fn upsert_summary(&self, owner: &str, counterpart: &str, summary: &LastMessage) -> Result<(), StoreError>;
    async fn mark_summary_read(&self, owner: &str, counterpart: &str) -> Result<(), StoreError>;
    /// Owners holding a contact record for `uid`, answered from the reverse index.
    async fn owners_referencing(&self, uid: &str) -> Result<Vec<String>, StoreError>;
    async fn update_contact_profile(&self, owner: &str, uid: &str, name: &str, photo_url: Option<&str>) -> Result<(), StoreError>;

    async fn append_message(&self, room: &RoomId, message: &NewMessage) -> Result<Message, StoreError>;
    /// Newest first.
    async fn list_messages(&self, room: &RoomId) -> Result<Vec<Message>, StoreError>;
    /// Flips `read` on every listed message in one grouped write. Returns
    /// how many messages changed.
    async fn mark_read(&self, room: &RoomId, ids: &[Uuid]) -> Result<u64, StoreError>;
    /// Appends the message and writes both summaries in one transaction.
    async fn commit_message(&self, room: &RoomId, message: &NewMessage) -> Result<Message, StoreError>;
}
