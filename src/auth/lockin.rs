use std::sync::Arc;

use axum::{debug_handler, extract::{Path, Query, State}, response::{IntoResponse, Redirect}};
use oauth2::{AuthorizationCode, CsrfToken, PkceCodeVerifier, TokenResponse};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::info;

use crate::{config::Config, session::{local_return_url, CSRF_STATE, PKCE_VERIFIER, RETURN_URL}, store::Store, AppResult, AppState};

use super::{clients::ClientProvider, ensure_user, start_session, Auth, AuthError, AuthEvents, Clients};

#[derive(Deserialize)]
pub struct LockinQuery {
    pub state: Option<String>,
    pub code: Option<String>,
}

#[debug_handler(state = AppState)]
pub(crate) async fn lockin(
    Path(provider): Path<ClientProvider>,
    Query(LockinQuery { state, code }): Query<LockinQuery>,
    State(clients): State<Clients>,
    State(auth): State<Auth>,
    State(store): State<Store>,
    State(events): State<AuthEvents>,
    State(config): State<Arc<Config>>,
    session: Session,
) -> AppResult<impl IntoResponse> {
    let oauth = |what: &str| AuthError::OAuth(what.to_owned());

    let state = CsrfToken::new(state.ok_or_else(|| oauth("without state"))?);
    let code = AuthorizationCode::new(code.ok_or_else(|| oauth("without code"))?);

    let Some(stored_state) = session.remove::<String>(CSRF_STATE).await? else {
        return Err(oauth("no csrf_state").into());
    };

    if state.secret().as_str() != stored_state.as_str() {
        return Err(oauth("csrf tokens don't match").into());
    }

    let Some(pkce_verifier) = session.remove::<String>(PKCE_VERIFIER).await? else {
        return Err(oauth("no pkce_verifier").into());
    };

    let client = clients.get_client(provider)?;
    let http_client = reqwest::ClientBuilder::new()
        .redirect(reqwest::redirect::Policy::none())
        .timeout(config.remote_timeout)
        .build()?;
    let token_result = client
        .exchange_code(code)
        .set_pkce_verifier(PkceCodeVerifier::new(pkce_verifier))
        .request_async(&http_client)
        .await
        .map_err(|e| AuthError::OAuth(e.to_string()))?;

    let access_token = token_result.access_token().secret();
    let account = auth.sign_in_with_idp(provider, access_token).await?;
    let user = ensure_user(store.as_ref(), &account).await?;

    let return_url = session.remove::<String>(RETURN_URL).await?;
    start_session(&session, &events, &account).await?;

    info!("welcome u/{}, {}", user.uid, user.name);

    Ok(Redirect::to(&local_return_url(return_url)))
}
