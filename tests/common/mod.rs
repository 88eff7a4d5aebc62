#![allow(dead_code)]

pub mod server;

use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Mutex,
};

use async_trait::async_trait;
use pairchat::{
    auth::{AuthError, AuthSession, Authenticator, ClientProvider, FreshToken},
    model::{Contact, LastMessage, Message, NewMessage, RoomId, User},
    objects::{ObjectError, ObjectStore},
    store::{Change, DocumentStore, SqliteStore, StoreError},
};
use tokio::sync::broadcast;
use uuid::Uuid;

pub async fn sqlite() -> SqliteStore {
    SqliteStore::connect("sqlite::memory:").await.unwrap()
}

pub fn user(uid: &str, name: &str) -> User {
    User {
        uid: uid.to_owned(),
        email: format!("{uid}@example.com"),
        name: name.to_owned(),
        photo_url: None,
    }
}

pub async fn seed_users(store: &dyn DocumentStore, users: &[(&str, &str)]) -> Vec<User> {
    let mut seeded = Vec::new();
    for (uid, name) in users {
        let user = user(uid, name);
        store.put_user(&user).await.unwrap();
        seeded.push(user);
    }
    seeded
}

/// SQLite store that counts writes and can be told to refuse some of them.
pub struct FlakyStore {
    pub inner: SqliteStore,
    writes: AtomicUsize,
    fail_contact_update_of: Option<String>,
}

impl FlakyStore {
    pub fn new(inner: SqliteStore) -> Self {
        Self {
            inner,
            writes: AtomicUsize::new(0),
            fail_contact_update_of: None,
        }
    }

    /// Contact profile rewrites in `owner`'s contacts fail.
    pub fn failing_contact_update_of(mut self, owner: &str) -> Self {
        self.fail_contact_update_of = Some(owner.to_owned());
        self
    }

    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    fn write(&self) {
        self.writes.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl DocumentStore for FlakyStore {
    fn changes(&self) -> broadcast::Receiver<Change> {
        self.inner.changes()
    }

    async fn get_user(&self, uid: &str) -> Result<Option<User>, StoreError> {
        self.inner.get_user(uid).await
    }

    async fn put_user(&self, user: &User) -> Result<(), StoreError> {
        self.write();
        self.inner.put_user(user).await
    }

    async fn update_user_profile(&self, uid: &str, name: &str, photo_url: Option<&str>) -> Result<(), StoreError> {
        self.write();
        self.inner.update_user_profile(uid, name, photo_url).await
    }

    async fn list_user_ids(&self) -> Result<Vec<String>, StoreError> {
        self.inner.list_user_ids().await
    }

    async fn list_contacts(&self, owner: &str) -> Result<Vec<Contact>, StoreError> {
        self.inner.list_contacts(owner).await
    }

    async fn get_contact(&self, owner: &str, uid: &str) -> Result<Option<Contact>, StoreError> {
        self.inner.get_contact(owner, uid).await
    }

    async fn put_contact(&self, owner: &str, contact: &Contact) -> Result<(), StoreError> {
        self.write();
        self.inner.put_contact(owner, contact).await
    }

    async fn upsert_summary(&self, owner: &str, counterpart: &str, summary: &LastMessage) -> Result<(), StoreError> {
        self.write();
        self.inner.upsert_summary(owner, counterpart, summary).await
    }

    async fn mark_summary_read(&self, owner: &str, counterpart: &str) -> Result<(), StoreError> {
        self.write();
        self.inner.mark_summary_read(owner, counterpart).await
    }

    async fn owners_referencing(&self, uid: &str) -> Result<Vec<String>, StoreError> {
        self.inner.owners_referencing(uid).await
    }

    async fn update_contact_profile(&self, owner: &str, uid: &str, name: &str, photo_url: Option<&str>) -> Result<(), StoreError> {
        self.write();
        if self.fail_contact_update_of.as_deref() == Some(owner) {
            return Err(StoreError::Database(sqlx::Error::PoolTimedOut));
        }
        self.inner.update_contact_profile(owner, uid, name, photo_url).await
    }

    async fn append_message(&self, room: &RoomId, message: &NewMessage) -> Result<Message, StoreError> {
        self.write();
        self.inner.append_message(room, message).await
    }

    async fn list_messages(&self, room: &RoomId) -> Result<Vec<Message>, StoreError> {
        self.inner.list_messages(room).await
    }

    async fn mark_read(&self, room: &RoomId, ids: &[Uuid]) -> Result<u64, StoreError> {
        self.write();
        self.inner.mark_read(room, ids).await
    }

    async fn commit_message(&self, room: &RoomId, message: &NewMessage) -> Result<Message, StoreError> {
        self.write();
        self.inner.commit_message(room, message).await
    }
}

/// Identity provider that accepts every account and remembers profile updates.
#[derive(Default)]
pub struct StubAuth {
    pub updates: Mutex<Vec<(String, String, Option<String>)>>,
    pub refreshes: Mutex<Vec<String>>,
}

impl StubAuth {
    fn account(email: &str) -> AuthSession {
        let uid = email.split('@').next().unwrap_or(email).to_owned();
        AuthSession {
            id_token: format!("token-{uid}"),
            uid: uid.clone(),
            email: email.to_owned(),
            display_name: None,
            photo_url: None,
            refresh_token: format!("refresh-{uid}"),
            expires_at: None,
        }
    }
}

#[async_trait]
impl Authenticator for StubAuth {
    async fn sign_up(&self, email: &str, _password: &str) -> Result<AuthSession, AuthError> {
        if email.starts_with("taken") {
            return Err(AuthError::Rejected("EMAIL_EXISTS".to_owned()));
        }
        Ok(Self::account(email))
    }

    async fn sign_in(&self, email: &str, _password: &str) -> Result<AuthSession, AuthError> {
        Ok(Self::account(email))
    }

    async fn sign_in_with_idp(&self, provider: ClientProvider, access_token: &str) -> Result<AuthSession, AuthError> {
        Ok(Self::account(&format!("{access_token}@{}", provider.id())))
    }

    async fn update_profile(&self, id_token: &str, name: &str, photo_url: Option<&str>) -> Result<(), AuthError> {
        self.updates
            .lock()
            .unwrap()
            .push((id_token.to_owned(), name.to_owned(), photo_url.map(str::to_owned)));
        Ok(())
    }

    async fn refresh(&self, refresh_token: &str) -> Result<FreshToken, AuthError> {
        self.refreshes.lock().unwrap().push(refresh_token.to_owned());
        Ok(FreshToken {
            id_token: format!("fresh-{refresh_token}"),
            refresh_token: refresh_token.to_owned(),
            expires_at: None,
        })
    }
}

/// Object storage that is always down.
pub struct BrokenObjects;

#[async_trait]
impl ObjectStore for BrokenObjects {
    async fn put(&self, path: &str, _bytes: Vec<u8>) -> Result<String, ObjectError> {
        Err(ObjectError::InvalidPath(path.to_owned()))
    }

    fn url(&self, path: &str) -> Result<String, ObjectError> {
        Err(ObjectError::InvalidPath(path.to_owned()))
    }
}
