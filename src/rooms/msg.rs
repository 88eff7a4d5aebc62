use std::str::FromStr;

use serde::Deserialize;
use tracing::{debug, warn};

use crate::{
    error::ChatResult,
    model::{within_limit, LastMessage, Message, NewMessage, RoomId, MAX_MESSAGE_CHARS},
    store::DocumentStore,
};

/// How the message and its two summaries reach the store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DispatchMode {
    /// Three independent concurrent writes. A failure leaves whatever the
    /// others committed in place.
    #[default]
    BestEffort,
    /// One transaction for all three writes.
    Atomic,
}

impl FromStr for DispatchMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "best_effort" | "best-effort" => Ok(Self::BestEffort),
            "atomic" => Ok(Self::Atomic),
            other => Err(format!("unknown dispatch mode {other:?}")),
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct SendMessageQuery {
    pub(crate) text: String,
}

/// Appends `text` to the room and refreshes both participants' summaries.
/// Blank text is dropped without touching the store; overlong text is refused.
pub async fn send_message(
    store: &dyn DocumentStore,
    mode: DispatchMode,
    room: &RoomId,
    sender_id: &str,
    receiver_id: &str,
    text: &str,
) -> ChatResult<Option<Message>> {
    let text = text.trim();
    if text.is_empty() {
        return Ok(None);
    }
    within_limit("message", text, MAX_MESSAGE_CHARS)?;

    let message = NewMessage::new(sender_id, receiver_id, text);

    let sent = match mode {
        DispatchMode::Atomic => store.commit_message(room, &message).await?,
        DispatchMode::BestEffort => {
            let summary = LastMessage {
                text: text.to_owned(),
                sender_id: sender_id.to_owned(),
                read: false,
            };

            let (appended, receiver_side, sender_side) = tokio::join!(
                store.append_message(room, &message),
                store.upsert_summary(receiver_id, sender_id, &summary),
                store.upsert_summary(sender_id, receiver_id, &summary),
            );

            let failed = [appended.is_err(), receiver_side.is_err(), sender_side.is_err()]
                .into_iter()
                .filter(|failed| *failed)
                .count();
            if failed > 0 && failed < 3 {
                warn!("partial send in {room}: {failed} of 3 writes failed, committed writes stay");
            }

            let appended = appended?;
            receiver_side?;
            sender_side?;
            appended
        }
    };

    debug!("{sender_id} -> {receiver_id} in {room}: message {}", sent.id);
    Ok(Some(sent))
}
