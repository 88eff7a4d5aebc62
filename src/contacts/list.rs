use axum::{
    debug_handler,
    extract::{ws::{Message as WsMessage, WebSocketUpgrade}, Query, State},
    response::{IntoResponse, Response},
    Json,
};
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tower_sessions::Session;
use tracing::{debug, warn};

use crate::{
    mirror::{self, project_contacts, ContactsOf},
    model::Contact,
    session::signed_in,
    store::Store,
    AppResult, AppState,
};

#[derive(Debug, Deserialize)]
pub(crate) struct ContactsQuery {
    #[serde(default)]
    q: String,
}

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContactsFrame<'a> {
    Snapshot { contacts: &'a [Contact] },
    Alert { message: String },
}

#[derive(Deserialize)]
struct SearchFrame {
    search: String,
}

#[debug_handler(state = AppState)]
pub(crate) async fn contacts(
    State(store): State<Store>,
    session: Session,
    Query(ContactsQuery { q }): Query<ContactsQuery>,
) -> AppResult<Json<Vec<Contact>>> {
    let me = signed_in(&session).await?;
    Ok(Json(project_contacts(store.list_contacts(&me.uid).await?, &q)))
}

/// Home screen: every change to the signed-in user's contacts pushes the
/// re-sorted, re-filtered list. `{"search": ".."}` frames change the filter.
#[debug_handler(state = AppState)]
pub(crate) async fn contacts_ws(
    State(store): State<Store>,
    session: Session,
    Query(ContactsQuery { q }): Query<ContactsQuery>,
    ws: WebSocketUpgrade,
) -> AppResult<Response> {
    let me = signed_in(&session).await?;

    Ok(ws.on_upgrade(move |socket| async move {
        let (mut sender, mut receiver) = socket.split();
        let mut subscription = mirror::subscribe(store, ContactsOf(me.uid.clone()));
        let mut latest: Vec<Contact> = Vec::new();
        let mut term = q;

        loop {
            let frame = tokio::select! {
                snapshot = subscription.next() => match snapshot {
                    Some(Ok(contacts)) => {
                        latest = contacts;
                        let projected = project_contacts(latest.clone(), &term);
                        serde_json::to_string(&ContactsFrame::Snapshot { contacts: &projected })
                    }
                    Some(Err(e)) => serde_json::to_string(&ContactsFrame::Alert { message: e.to_string() }),
                    None => break,
                },
                incoming = receiver.next() => match incoming {
                    Some(Ok(WsMessage::Text(text))) => {
                        let Ok(SearchFrame { search }) = serde_json::from_str(text.as_str()) else {
                            continue;
                        };
                        term = search;
                        let projected = project_contacts(latest.clone(), &term);
                        serde_json::to_string(&ContactsFrame::Snapshot { contacts: &projected })
                    }
                    Some(Ok(WsMessage::Close(_))) | Some(Err(_)) | None => break,
                    Some(Ok(_)) => continue,
                },
            };

            let frame = match frame {
                Ok(frame) => frame,
                Err(e) => {
                    warn!("encoding contacts frame failed: {e}");
                    continue;
                }
            };
            if sender.send(WsMessage::Text(frame.into())).await.is_err() {
                break;
            }
        }

        subscription.cancel();
        debug!("contacts mirror of u/{} closed", me.uid);
    })
    .into_response())
}
