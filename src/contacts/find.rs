use axum::{debug_handler, extract::{Query, State}, Json};
use serde::{Deserialize, Serialize};
use tower_sessions::Session;

use crate::{
    error::ChatResult,
    model::User,
    search::{Search, SearchIndex},
    session::signed_in,
    store::{DocumentStore, Store},
    AppResult, AppState,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchResult {
    #[serde(flatten)]
    pub user: User,
    pub already_contact: bool,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SearchQuery {
    #[serde(default)]
    q: String,
}

/// Users matching `text`, without the searcher, each flagged if already in
/// the searcher's contacts. Blank text returns nothing without querying.
pub async fn search_users(
    search: &dyn SearchIndex,
    store: &dyn DocumentStore,
    me: &str,
    text: &str,
) -> ChatResult<Vec<SearchResult>> {
    let text = text.trim();
    if text.is_empty() {
        return Ok(Vec::new());
    }

    let hits = search.query(text).await?;
    let contacts = store.list_contacts(me).await?;

    Ok(hits
        .into_iter()
        .filter(|user| user.uid != me)
        .map(|user| SearchResult {
            already_contact: contacts.iter().any(|contact| contact.uid == user.uid),
            user,
        })
        .collect())
}

#[debug_handler(state = AppState)]
pub(crate) async fn search_handler(
    State(search): State<Search>,
    State(store): State<Store>,
    session: Session,
    Query(SearchQuery { q }): Query<SearchQuery>,
) -> AppResult<Json<Vec<SearchResult>>> {
    let me = signed_in(&session).await?;
    Ok(Json(search_users(search.as_ref(), store.as_ref(), &me.uid, &q).await?))
}
