use axum::{debug_handler, extract::{Path, Query, State}, http::StatusCode, response::{IntoResponse, Redirect, Response}, Json};
use oauth2::{CsrfToken, PkceCodeChallenge, Scope};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::info;

use crate::{session::{local_return_url, CSRF_STATE, PKCE_VERIFIER, RETURN_URL}, store::Store, AppResult, AppState};

use super::{clients::ClientProvider, ensure_user, start_session, Auth, AuthEvents, Clients};

#[derive(Deserialize)]
pub(crate) struct LoginQuery {
    pub(crate) return_url: Option<String>,
}

#[derive(Deserialize)]
pub(crate) struct PasswordLogin {
    email: String,
    password: String,
}

#[debug_handler(state = AppState)]
pub(crate) async fn login(
    Path(provider): Path<ClientProvider>,
    Query(LoginQuery { return_url }): Query<LoginQuery>,
    State(clients): State<Clients>,
    session: Session,
) -> AppResult<Response> {
    let client = clients.get_client(provider)?;

    let (pkce_code_challenge, pkce_verifier) = PkceCodeChallenge::new_random_sha256();

    let (authorize_url, csrf_state) = client.authorize_url(CsrfToken::new_random)
        .add_scope(Scope::new("openid".to_string()))
        .set_pkce_challenge(pkce_code_challenge)
        .url();

    session.insert(CSRF_STATE, csrf_state.secret()).await?;
    session.insert(PKCE_VERIFIER, pkce_verifier.secret()).await?;
    session.insert(RETURN_URL, local_return_url(return_url)).await?;

    Ok(Redirect::to(authorize_url.as_str()).into_response())
}

#[debug_handler(state = AppState)]
pub(crate) async fn password_login(
    State(auth): State<Auth>,
    State(store): State<Store>,
    State(events): State<AuthEvents>,
    session: Session,
    Json(PasswordLogin { email, password }): Json<PasswordLogin>,
) -> AppResult<Response> {
    let email = email.trim();
    if email.is_empty() || password.is_empty() {
        return Ok(StatusCode::NO_CONTENT.into_response());
    }

    let account = auth.sign_in(email, &password).await?;
    let user = ensure_user(store.as_ref(), &account).await?;
    start_session(&session, &events, &account).await?;
    info!("welcome u/{}", account.uid);

    Ok(Json(user).into_response())
}
