mod fanout;
mod page;

use axum::{routing::get, Router};

use crate::AppState;

pub use fanout::{update_profile_info, FanoutReport, FanoutStrategy, PhotoChange, ProfileUpdate};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/me", get(page::profile).post(page::save_profile))
}
