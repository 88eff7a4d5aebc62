use axum::{debug_handler, extract::{Query, State}, response::Redirect};
use serde::Deserialize;
use tower_sessions::Session;

use crate::{session::{local_return_url, USER_ID}, AppResult, AppState};

use super::{AuthEvent, AuthEvents};

#[derive(Deserialize)]
pub(crate) struct LogoutQuery {
    pub(crate) return_url: Option<String>,
}

#[debug_handler(state = AppState)]
pub(crate) async fn logout(
    Query(LogoutQuery { return_url }): Query<LogoutQuery>,
    State(events): State<AuthEvents>,
    session: Session
) -> AppResult<Redirect> {
    let uid = session.get::<String>(USER_ID).await?;
    session.flush().await?;

    let _ = events.send(AuthEvent::SignedOut { uid });
    Ok(Redirect::to(&local_return_url(return_url)))
}
