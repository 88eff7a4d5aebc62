mod add;
mod find;
mod list;

use axum::{routing::get, Router};

use crate::AppState;

pub use add::add_contact;
pub use find::{search_users, SearchResult};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list::contacts).post(add::add_contact_handler))
        .route("/ws", get(list::contacts_ws))
        .route("/search", get(find::search_handler))
}
