use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tracing::{debug, error};
use uuid::Uuid;

use crate::{
    model::{Message, RoomId},
    store::DocumentStore,
};

/// Share of a message's area that must be on screen for it to count as seen.
pub const VISIBILITY_THRESHOLD: u8 = 50;

#[derive(Debug, Clone)]
pub struct ViewableItem {
    pub message: Message,
    pub visible_percent: u8,
}

/// What the client reports: a message id and how much of it is on screen.
#[derive(Debug, Clone, Deserialize)]
pub struct ViewableRef {
    pub id: Uuid,
    pub visible_percent: u8,
}

impl ViewableRef {
    /// Pairs reported ids with the messages of the latest snapshot. Ids the
    /// snapshot does not know are ignored.
    pub fn resolve(refs: &[ViewableRef], snapshot: &[Message]) -> Vec<ViewableItem> {
        refs.iter()
            .filter_map(|r| {
                snapshot.iter().find(|m| m.id == r.id).map(|message| ViewableItem {
                    message: message.clone(),
                    visible_percent: r.visible_percent,
                })
            })
            .collect()
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ReceiptOutcome {
    pub batched: usize,
    pub flipped: u64,
    pub summaries_marked: usize,
}

/// Marks what `viewer` can see as read: one grouped write for the message
/// flags plus two point writes for the summaries. Failures are logged and
/// swallowed.
pub async fn mark_visible_as_read(
    store: &dyn DocumentStore,
    viewer: &str,
    counterpart: &str,
    room: &RoomId,
    items: &[ViewableItem],
) -> ReceiptOutcome {
    let mut seen = HashSet::new();
    let batch: Vec<Uuid> = items
        .iter()
        .filter(|item| item.visible_percent >= VISIBILITY_THRESHOLD)
        .map(|item| &item.message)
        .filter(|message| !message.read && message.sender_id != viewer)
        .filter(|message| seen.insert(message.id))
        .map(|message| message.id)
        .collect();

    if batch.is_empty() {
        return ReceiptOutcome::default();
    }

    let (flipped, theirs, mine) = tokio::join!(
        store.mark_read(room, &batch),
        store.mark_summary_read(counterpart, viewer),
        store.mark_summary_read(viewer, counterpart),
    );

    let mut outcome = ReceiptOutcome {
        batched: batch.len(),
        ..Default::default()
    };

    match flipped {
        Ok(n) => outcome.flipped = n,
        Err(e) => error!("marking {} messages read in {room} failed: {e}", batch.len()),
    }
    for (owner, result) in [(counterpart, theirs), (viewer, mine)] {
        match result {
            Ok(()) => outcome.summaries_marked += 1,
            Err(e) => error!("marking summary of {owner} read failed: {e}"),
        }
    }

    debug!("{viewer} read {} messages in {room}", outcome.flipped);
    outcome
}
