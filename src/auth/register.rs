use axum::{debug_handler, extract::{Multipart, State}, http::StatusCode, response::{IntoResponse, Response}, Json};
use tower_sessions::Session;
use tracing::{info, warn};

use crate::{
    error::ChatResult,
    form::PhotoForm,
    model::{within_limit, User, MAX_EMAIL_CHARS, MAX_NAME_CHARS, MAX_PASSWORD_CHARS},
    objects::{profile_photo_path, ObjectStore, Objects},
    store::{DocumentStore, Store},
    AppResult, AppState,
};

use super::{start_session, Auth, AuthEvents, AuthSession, Authenticator};

pub struct Registration {
    pub email: String,
    pub password: String,
    pub name: String,
    pub photo: Option<Vec<u8>>,
}

/// Creates the account, its optional photo and its user document. Missing
/// email, password or name makes this a no-op.
pub async fn register(
    store: &dyn DocumentStore,
    objects: &dyn ObjectStore,
    auth: &dyn Authenticator,
    registration: Registration,
) -> ChatResult<Option<(AuthSession, User)>> {
    let Registration { email, password, name, photo } = registration;
    let (email, name) = (email.trim(), name.trim());
    if email.is_empty() || password.is_empty() || name.is_empty() {
        return Ok(None);
    }
    within_limit("email", email, MAX_EMAIL_CHARS)?;
    within_limit("password", &password, MAX_PASSWORD_CHARS)?;
    within_limit("name", name, MAX_NAME_CHARS)?;

    let account = auth.sign_up(email, &password).await?;

    let photo_url = match photo {
        Some(bytes) => match objects.put(&profile_photo_path(&account.uid), bytes).await {
            Ok(url) => Some(url),
            Err(e) => {
                warn!("photo upload for u/{} failed, continuing without: {e}", account.uid);
                None
            }
        },
        None => None,
    };

    auth.update_profile(&account.id_token, name, photo_url.as_deref()).await?;

    let user = User {
        uid: account.uid.clone(),
        email: if account.email.is_empty() { email.to_owned() } else { account.email.clone() },
        name: name.to_owned(),
        photo_url: photo_url.clone(),
    };
    store.put_user(&user).await?;
    info!("registered u/{}, {}", user.uid, user.name);

    let account = AuthSession {
        display_name: Some(user.name.clone()),
        photo_url,
        ..account
    };
    Ok(Some((account, user)))
}

#[debug_handler(state = AppState)]
pub(crate) async fn register_form(
    State(store): State<Store>,
    State(objects): State<Objects>,
    State(auth): State<Auth>,
    State(events): State<AuthEvents>,
    session: Session,
    multipart: Multipart,
) -> AppResult<Response> {
    let mut form = PhotoForm::read(multipart).await?;
    let registration = Registration {
        email: form.text("email"),
        password: form.text("password"),
        name: form.text("name"),
        photo: form.photo.take(),
    };

    let Some((account, user)) = register(store.as_ref(), objects.as_ref(), auth.as_ref(), registration).await? else {
        return Ok(StatusCode::NO_CONTENT.into_response());
    };
    start_session(&session, &events, &account).await?;

    Ok((StatusCode::CREATED, Json(user)).into_response())
}
