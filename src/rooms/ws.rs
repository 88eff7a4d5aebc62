use std::sync::Arc;

use axum::{
    debug_handler,
    extract::{ws::{Message as WsMessage, WebSocketUpgrade}, Path, State},
    response::{IntoResponse, Response},
};
use futures_util::{stream::SplitSink, SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tower_sessions::Session;
use tracing::{debug, warn};

use crate::{
    config::Config,
    mirror::{self, RoomMessages},
    model::Message,
    session::signed_in,
    store::Store,
    AppResult, AppState,
};

use super::{
    id::resolve_room_id,
    msg::send_message,
    receipts::{mark_visible_as_read, ViewableRef},
};

#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ClientFrame {
    Send { text: String },
    Viewable { items: Vec<ViewableRef> },
}

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ServerFrame<'a> {
    Snapshot { messages: &'a [Message] },
    ComposerCleared,
    Alert { message: String },
}

type Sender = SplitSink<axum::extract::ws::WebSocket, WsMessage>;

async fn push(sender: &mut Sender, frame: &ServerFrame<'_>) -> bool {
    let text = match serde_json::to_string(frame) {
        Ok(text) => text,
        Err(e) => {
            warn!("encoding room frame failed: {e}");
            return true;
        }
    };
    sender.send(WsMessage::Text(text.into())).await.is_ok()
}

/// Chat screen: pushes the room's messages on every change, sends what the
/// client composes and marks what it reports as visible.
#[debug_handler(state = AppState)]
pub(crate) async fn room_ws(
    Path(contact_id): Path<String>,
    State(store): State<Store>,
    State(config): State<Arc<Config>>,
    session: Session,

    ws: WebSocketUpgrade,
) -> AppResult<Response> {
    let me = signed_in(&session).await?;
    let room = resolve_room_id(&me.uid, &contact_id)?;

    Ok(ws.on_upgrade(move |stream| async move {
        let (mut sender, mut receiver) = stream.split();
        let mut subscription = mirror::subscribe(store.clone(), RoomMessages(room.clone()));
        let mut latest: Vec<Message> = Vec::new();

        loop {
            let open = tokio::select! {
                snapshot = subscription.next() => match snapshot {
                    Some(Ok(messages)) => {
                        latest = messages;
                        push(&mut sender, &ServerFrame::Snapshot { messages: &latest }).await
                    }
                    Some(Err(e)) => push(&mut sender, &ServerFrame::Alert { message: e.to_string() }).await,
                    None => break,
                },
                incoming = receiver.next() => match incoming {
                    Some(Ok(WsMessage::Close(_))) | Some(Err(_)) | None => break,
                    Some(Ok(msg)) => {
                        let Ok(frame) = serde_json::from_slice::<ClientFrame>(&msg.into_data()) else {
                            continue
                        };

                        match frame {
                            ClientFrame::Send { text } => {
                                if text.trim().is_empty() {
                                    continue;
                                }
                                // the composer empties as soon as the writes are issued
                                if !push(&mut sender, &ServerFrame::ComposerCleared).await {
                                    break;
                                }
                                match send_message(store.as_ref(), config.dispatch, &room, &me.uid, &contact_id, &text).await {
                                    Ok(_) => true,
                                    Err(e) => push(&mut sender, &ServerFrame::Alert { message: e.to_string() }).await,
                                }
                            }
                            ClientFrame::Viewable { items } => {
                                let items = ViewableRef::resolve(&items, &latest);
                                mark_visible_as_read(store.as_ref(), &me.uid, &contact_id, &room, &items).await;
                                true
                            }
                        }
                    }
                },
            };

            if !open {
                break;
            }
        }

        subscription.cancel();
        debug!("room {room} mirror for u/{} closed", me.uid);
    })
    .into_response())
}
