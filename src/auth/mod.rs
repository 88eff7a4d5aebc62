use std::sync::Arc;

use async_trait::async_trait;
use axum::{routing::{get, post}, Router};
use chrono::{DateTime, Utc};
use rand::seq::IndexedRandom;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::broadcast;
use tower_sessions::Session;
use tracing::info;

use crate::{
    model::User,
    session::{store_tokens, USER_ID},
    store::{DocumentStore, StoreError},
    AppResult, AppState,
};

mod clients;
mod firebase;
mod lockin;
mod login;
mod logout;
mod register;

pub use clients::{ClientProvider, Clients};
pub use firebase::FirebaseAuth;
pub use register::{register, Registration};

pub type Auth = Arc<dyn Authenticator>;
pub type AuthEvents = broadcast::Sender<AuthEvent>;

#[derive(Debug, Error)]
pub enum AuthError {
    /// The identity provider refused; carries its raw message.
    #[error("{0}")]
    Rejected(String),

    #[error("identity provider unreachable: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("unexpected identity provider response: {0}")]
    Malformed(String),

    #[error("OAuth provider {0} keys not supplied")]
    UnknownProvider(ClientProvider),

    #[error("OAuth: {0}")]
    OAuth(String),
}

/// An account as the identity provider reports it after signing in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthSession {
    pub uid: String,
    pub email: String,
    pub display_name: Option<String>,
    pub photo_url: Option<String>,
    pub id_token: String,
    pub refresh_token: String,
    /// When `id_token` stops being accepted; `None` if the provider did not say.
    pub expires_at: Option<DateTime<Utc>>,
}

/// A new ID token obtained with a refresh token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FreshToken {
    pub id_token: String,
    pub refresh_token: String,
    pub expires_at: Option<DateTime<Utc>>,
}

#[async_trait]
pub trait Authenticator: Send + Sync {
    async fn sign_up(&self, email: &str, password: &str) -> Result<AuthSession, AuthError>;
    async fn sign_in(&self, email: &str, password: &str) -> Result<AuthSession, AuthError>;
    async fn sign_in_with_idp(&self, provider: ClientProvider, access_token: &str) -> Result<AuthSession, AuthError>;
    async fn update_profile(&self, id_token: &str, name: &str, photo_url: Option<&str>) -> Result<(), AuthError>;
    async fn refresh(&self, refresh_token: &str) -> Result<FreshToken, AuthError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthEvent {
    SignedIn { uid: String },
    SignedOut { uid: Option<String> },
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/register", post(register::register_form))
        .route("/login", post(login::password_login))
        .route("/login/{provider}", get(login::login))
        .route("/lockin/{provider}", get(lockin::lockin))
        .route("/logout", get(logout::logout))
}

pub(crate) async fn start_session(session: &Session, events: &AuthEvents, account: &AuthSession) -> AppResult<()> {
    session.cycle_id().await?;
    session.insert(USER_ID, account.uid.clone()).await?;
    store_tokens(session, &account.id_token, &account.refresh_token, account.expires_at).await?;

    let _ = events.send(AuthEvent::SignedIn { uid: account.uid.clone() });
    Ok(())
}

/// Returns the user document for `account`, creating it on first sign-in.
pub async fn ensure_user(store: &dyn DocumentStore, account: &AuthSession) -> Result<User, StoreError> {
    if let Some(user) = store.get_user(&account.uid).await? {
        return Ok(user);
    }

    let user = User {
        uid: account.uid.clone(),
        email: account.email.clone(),
        name: account
            .display_name
            .clone()
            .filter(|name| !name.trim().is_empty())
            .unwrap_or_else(random_alias),
        photo_url: account.photo_url.clone(),
    };
    info!("adding u/{} as {}", user.uid, user.name);
    store.put_user(&user).await?;
    Ok(user)
}

pub fn random_alias() -> String {
    const ADJECTIVES: &[&str] = &[
        "Quick", "Lazy", "Mysterious", "Jolly", "Brave", "Silent", "Witty", "Fierce",
        "Clever", "Gentle", "Wild", "Calm", "Bold", "Shy", "Proud", "Happy", "Sad",
        "Eager", "Fancy", "Rusty", "Golden", "Silver", "Bright", "Dark", "Lucky",
    ];
    const NOUNS: &[&str] = &[
        "Fox", "Bear", "Eagle", "Wolf", "Dragon", "Tiger", "Lion", "Owl", "Rabbit",
        "Falcon", "Hawk", "Shark", "Panda", "Kitten", "Puppy", "Phoenix", "Griffin",
        "Unicorn", "Turtle", "Dolphin", "Whale", "Elephant", "Giraffe", "Zebra",
    ];

    let mut rng = rand::rng();
    format!(
        "{} {}",
        ADJECTIVES.choose(&mut rng).copied().unwrap_or("Nameless"),
        NOUNS.choose(&mut rng).copied().unwrap_or("User"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::SqliteStore;

    fn account(uid: &str, display_name: Option<&str>) -> AuthSession {
        AuthSession {
            uid: uid.to_owned(),
            email: format!("{uid}@example.com"),
            display_name: display_name.map(str::to_owned),
            photo_url: None,
            id_token: "token".to_owned(),
            refresh_token: "refresh".to_owned(),
            expires_at: None,
        }
    }

    #[test]
    fn aliases_have_two_words() {
        let alias = random_alias();
        assert_eq!(alias.split(' ').count(), 2);
    }

    #[tokio::test]
    async fn first_sign_in_creates_the_user_once() {
        let store = SqliteStore::connect("sqlite::memory:").await.unwrap();

        let created = ensure_user(&store, &account("alice", Some("Alice"))).await.unwrap();
        assert_eq!(created.name, "Alice");

        let again = ensure_user(&store, &account("alice", Some("Someone Else"))).await.unwrap();
        assert_eq!(again.name, "Alice");
    }

    #[tokio::test]
    async fn nameless_accounts_get_an_alias() {
        let store = SqliteStore::connect("sqlite::memory:").await.unwrap();
        let user = ensure_user(&store, &account("ghost", Some("  "))).await.unwrap();
        assert!(!user.name.trim().is_empty());
    }
}
