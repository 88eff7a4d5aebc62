pub mod appresult;
pub mod auth;
pub mod config;
pub mod contacts;
pub mod db;
pub mod error;
pub mod form;
pub mod mirror;
pub mod model;
pub mod objects;
pub mod profiles;
pub mod rooms;
pub mod search;
pub mod session;
pub mod store;

use std::sync::Arc;

use axum::{extract::FromRef, Router};
use tower_http::{services::ServeDir, trace::TraceLayer};

pub use appresult::{AppError, AppResult};

use crate::{
    auth::{Auth, AuthEvents, Clients},
    config::Config,
    objects::Objects,
    search::Search,
    store::Store,
};

#[derive(Clone, FromRef)]
pub struct AppState {
    pub store: Store,
    pub objects: Objects,
    pub search: Search,
    pub auth: Auth,
    pub clients: Clients,
    pub auth_events: AuthEvents,
    pub config: Arc<Config>,
}

/// Every route, with stored objects served from the configured directory.
/// Session handling is layered on by the caller.
pub fn app(state: AppState) -> Router {
    let objects_dir = state.config.objects_dir.clone();

    Router::new()
        .merge(auth::router())
        .nest("/c", contacts::router())
        .nest("/r", rooms::router())
        .nest("/p", profiles::router())
        .nest_service("/o", ServeDir::new(objects_dir))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}
