mod id;
mod msg;
mod receipts;
mod room;
mod ws;

use axum::{routing::{get, post}, Router};

use crate::AppState;

pub use id::resolve_room_id;
pub use msg::{send_message, DispatchMode};
pub use receipts::{mark_visible_as_read, ReceiptOutcome, ViewableItem, ViewableRef, VISIBILITY_THRESHOLD};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/{contact_id}", get(room::messages).post(room::send))
        .route("/{contact_id}/viewable", post(room::viewable))
        .route("/{contact_id}/ws", get(ws::room_ws))
}
