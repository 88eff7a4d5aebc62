use std::sync::Arc;

use axum::{debug_handler, extract::{Multipart, State}, http::StatusCode, response::{IntoResponse, Response}, Json};
use tower_sessions::Session;

use crate::{
    auth::Auth,
    config::Config,
    error::ChatError,
    form::PhotoForm,
    model::User,
    objects::Objects,
    session::{signed_in, signed_in_fresh},
    store::{Store, StoreError},
    AppResult, AppState,
};

use super::fanout::{update_profile_info, PhotoChange, ProfileUpdate};

#[debug_handler(state = AppState)]
pub(crate) async fn profile(
    State(store): State<Store>,
    session: Session,
) -> AppResult<Json<User>> {
    let me = signed_in(&session).await?;

    let user = store
        .get_user(&me.uid)
        .await?
        .ok_or_else(|| ChatError::Store(StoreError::NotFound(format!("user {}", me.uid))))?;
    Ok(Json(user))
}

#[debug_handler(state = AppState)]
pub(crate) async fn save_profile(
    State(store): State<Store>,
    State(objects): State<Objects>,
    State(auth): State<Auth>,
    State(config): State<Arc<Config>>,
    session: Session,
    multipart: Multipart,
) -> AppResult<Response> {
    let me = signed_in_fresh(&session, auth.as_ref()).await?;
    let mut form = PhotoForm::read(multipart).await?;

    let update = ProfileUpdate {
        name: form.text("name"),
        photo: match form.photo.take() {
            Some(bytes) => PhotoChange::Upload(bytes),
            None => PhotoChange::Keep,
        },
    };

    match update_profile_info(store.as_ref(), objects.as_ref(), auth.as_ref(), config.fanout, &me, update).await? {
        Some(report) => Ok(Json(report).into_response()),
        None => Ok(StatusCode::NO_CONTENT.into_response()),
    }
}
