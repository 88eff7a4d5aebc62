use std::sync::Arc;

use axum::{debug_handler, extract::{Path, State}, http::StatusCode, response::{IntoResponse, Response}, Json};
use tower_sessions::Session;

use crate::{config::Config, model::Message, session::signed_in, store::Store, AppResult, AppState};

use super::{
    id::resolve_room_id,
    msg::{send_message, SendMessageQuery},
    receipts::{mark_visible_as_read, ReceiptOutcome, ViewableRef},
};

#[debug_handler(state = AppState)]
pub(crate) async fn messages(
    State(store): State<Store>,
    session: Session,
    Path(contact_id): Path<String>,
) -> AppResult<Json<Vec<Message>>> {
    let me = signed_in(&session).await?;
    let room = resolve_room_id(&me.uid, &contact_id)?;

    Ok(Json(store.list_messages(&room).await?))
}

#[debug_handler(state = AppState)]
pub(crate) async fn send(
    State(store): State<Store>,
    State(config): State<Arc<Config>>,
    session: Session,
    Path(contact_id): Path<String>,
    Json(SendMessageQuery { text }): Json<SendMessageQuery>,
) -> AppResult<Response> {
    let me = signed_in(&session).await?;
    let room = resolve_room_id(&me.uid, &contact_id)?;

    match send_message(store.as_ref(), config.dispatch, &room, &me.uid, &contact_id, &text).await? {
        Some(message) => Ok((StatusCode::CREATED, Json(message)).into_response()),
        None => Ok(StatusCode::NO_CONTENT.into_response()),
    }
}

#[debug_handler(state = AppState)]
pub(crate) async fn viewable(
    State(store): State<Store>,
    session: Session,
    Path(contact_id): Path<String>,
    Json(refs): Json<Vec<ViewableRef>>,
) -> AppResult<Json<ReceiptOutcome>> {
    let me = signed_in(&session).await?;
    let room = resolve_room_id(&me.uid, &contact_id)?;

    let snapshot = store.list_messages(&room).await?;
    let items = ViewableRef::resolve(&refs, &snapshot);
    Ok(Json(mark_visible_as_read(store.as_ref(), &me.uid, &contact_id, &room, &items).await))
}
