use axum::{debug_handler, extract::State, http::StatusCode, Json};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::info;

use crate::{
    error::{ChatError, ChatResult},
    model::{Contact, User},
    session::signed_in,
    store::{DocumentStore, Store, StoreError},
    AppResult, AppState,
};

const UNKNOWN_NAME: &str = "Unknown";

#[derive(Debug, Deserialize)]
pub(crate) struct AddContactQuery {
    uid: String,
}

/// Writes the contact pair `me → target` and `target → me`, in that order.
/// The second write is not undone if it fails.
pub async fn add_contact(store: &dyn DocumentStore, me: &User, target: &User) -> ChatResult<()> {
    if target.uid.is_empty() {
        return Err(ChatError::invalid("contact id must not be empty"));
    }
    if target.uid == me.uid {
        return Err(ChatError::invalid("cannot add yourself as a contact"));
    }
    if store.get_contact(&me.uid, &target.uid).await?.is_some() {
        return Err(ChatError::AlreadyContact(target.name.clone()));
    }

    store.put_contact(&me.uid, &Contact::of(target)).await?;

    let mut reverse = Contact::of(me);
    if reverse.name.trim().is_empty() {
        reverse.name = UNKNOWN_NAME.to_owned();
    }
    store.put_contact(&target.uid, &reverse).await?;

    info!("u/{} added u/{}", me.uid, target.uid);
    Ok(())
}

#[debug_handler(state = AppState)]
pub(crate) async fn add_contact_handler(
    State(store): State<Store>,
    session: Session,
    Json(AddContactQuery { uid }): Json<AddContactQuery>,
) -> AppResult<(StatusCode, Json<Contact>)> {
    let me = signed_in(&session).await?;
    let me = store
        .get_user(&me.uid)
        .await?
        .ok_or_else(|| ChatError::Store(StoreError::NotFound(format!("user {}", me.uid))))?;
    let target = store
        .get_user(&uid)
        .await?
        .ok_or_else(|| ChatError::Store(StoreError::NotFound(format!("user {uid}"))))?;

    add_contact(store.as_ref(), &me, &target).await?;
    Ok((StatusCode::CREATED, Json(Contact::of(&target))))
}
