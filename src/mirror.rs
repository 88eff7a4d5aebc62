//! Realtime mirror of one remote collection.
//!
//! A [`Subscription`] re-reads the full snapshot of its collection every
//! time the store announces a change to it and hands the snapshot to the
//! subscriber. Ordering and filtering happen locally on each snapshot. The
//! listener task lives exactly as long as the handle.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::{
    sync::{broadcast::error::RecvError, mpsc},
    task::JoinHandle,
};
use tracing::{debug, warn};

use crate::{
    model::{Contact, Message, RoomId},
    store::{Change, DocumentStore, Store, StoreError},
};

const PENDING_SNAPSHOTS: usize = 16;

pub type Snapshot<T> = Result<Vec<T>, StoreError>;

/// A remote collection that can be mirrored.
#[async_trait]
pub trait Source: Send + Sync + 'static {
    type Item: Send + 'static;

    fn is_affected_by(&self, change: &Change) -> bool;
    async fn fetch(&self, store: &dyn DocumentStore) -> Snapshot<Self::Item>;
}

/// `users/{owner}/contacts`
pub struct ContactsOf(pub String);

#[async_trait]
impl Source for ContactsOf {
    type Item = Contact;

    fn is_affected_by(&self, change: &Change) -> bool {
        matches!(change, Change::Contacts { owner } if *owner == self.0)
    }

    async fn fetch(&self, store: &dyn DocumentStore) -> Snapshot<Contact> {
        store.list_contacts(&self.0).await
    }
}

/// `chats/{room}/messages`, newest first.
pub struct RoomMessages(pub RoomId);

#[async_trait]
impl Source for RoomMessages {
    type Item = Message;

    fn is_affected_by(&self, change: &Change) -> bool {
        matches!(change, Change::Room { room_id } if *room_id == self.0)
    }

    async fn fetch(&self, store: &dyn DocumentStore) -> Snapshot<Message> {
        store.list_messages(&self.0).await
    }
}

pub struct Subscription<T> {
    snapshots: mpsc::Receiver<Snapshot<T>>,
    listener: JoinHandle<()>,
}

impl<T> Subscription<T> {
    /// Next full snapshot. Errors are delivered as items and do not end the
    /// subscription; `None` means the store went away.
    pub async fn next(&mut self) -> Option<Snapshot<T>> {
        self.snapshots.recv().await
    }

    /// Stops the listener; the work happens in `Drop`.
    pub fn cancel(self) {}

    pub fn is_active(&self) -> bool {
        !self.listener.is_finished()
    }
}

impl<T> Drop for Subscription<T> {
    fn drop(&mut self) {
        self.listener.abort();
    }
}

pub fn subscribe<S: Source>(store: Store, source: S) -> Subscription<S::Item> {
    let (tx, snapshots) = mpsc::channel(PENDING_SNAPSHOTS);
    // listen before the first read so no change slips in between
    let mut changes = store.changes();

    let listener = tokio::spawn(async move {
        loop {
            let snapshot = source.fetch(store.as_ref()).await;
            if let Err(e) = &snapshot {
                warn!("mirror read failed: {e}");
            }
            if tx.send(snapshot).await.is_err() {
                return;
            }

            loop {
                match changes.recv().await {
                    Ok(change) if source.is_affected_by(&change) => break,
                    Ok(_) => continue,
                    Err(RecvError::Lagged(missed)) => {
                        debug!("mirror lagged by {missed} changes, re-reading");
                        break;
                    }
                    Err(RecvError::Closed) => return,
                }
            }
        }
    });

    Subscription { snapshots, listener }
}

/// Most recent activity first; contacts without messages sort as if their
/// last message was at the unix epoch.
pub fn sort_by_recent_activity(contacts: &mut [Contact]) {
    let epoch = DateTime::<Utc>::UNIX_EPOCH;
    contacts.sort_by(|a, b| {
        b.last_message_at
            .unwrap_or(epoch)
            .cmp(&a.last_message_at.unwrap_or(epoch))
    });
}

/// Case-insensitive substring match on the contact name.
pub fn filter_by_name(contacts: Vec<Contact>, term: &str) -> Vec<Contact> {
    let term = term.to_lowercase();
    contacts
        .into_iter()
        .filter(|contact| contact.name.to_lowercase().contains(&term))
        .collect()
}

/// The home screen list: sorted, then filtered by the search term.
pub fn project_contacts(mut contacts: Vec<Contact>, term: &str) -> Vec<Contact> {
    sort_by_recent_activity(&mut contacts);
    filter_by_name(contacts, term)
}
